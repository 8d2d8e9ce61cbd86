//! `escan usage`: quota and per-feature access for the current session.

use anyhow::Result;
use escan_core::usage::MAX_ANONYMOUS_EXTRACTS;
use escan_core::{Access, Feature, RemainingUses};
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::context::AppContext;
use crate::cli::output::{print_json, print_table};

#[derive(Debug)]
pub struct UsageArgs {
    pub config: Option<PathBuf>,
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct FeatureAccess {
    feature: Feature,
    access: Access,
}

#[derive(Debug, Serialize)]
struct UsageReport {
    signed_in: bool,
    anonymous: bool,
    extract_count: i64,
    max_anonymous_extracts: i64,
    remaining: RemainingUses,
    exhausted: bool,
    features: Vec<FeatureAccess>,
}

pub fn run(args: UsageArgs) -> Result<()> {
    let ctx = AppContext::open(args.config.as_deref())?;
    let gate = &ctx.gate;

    let report = UsageReport {
        signed_in: gate.is_user_signed_in(),
        anonymous: gate.is_anonymous_user(),
        extract_count: gate.extract_feature_count(),
        max_anonymous_extracts: MAX_ANONYMOUS_EXTRACTS,
        remaining: gate.remaining_extract_uses(),
        exhausted: gate.is_anonymous_usage_exhausted(),
        features: Feature::ALL
            .into_iter()
            .map(|feature| FeatureAccess {
                feature,
                access: gate.check_access(feature),
            })
            .collect(),
    };

    if args.json {
        return print_json(&report);
    }

    let session = match (report.signed_in, report.anonymous) {
        (false, _) => "not signed in",
        (true, true) => "guest",
        (true, false) => "registered",
    };
    println!("Session:            {}", session);
    println!("Extract text uses:  {} remaining", report.remaining);
    if report.anonymous {
        println!(
            "Used:               {} of {}",
            report.extract_count, MAX_ANONYMOUS_EXTRACTS
        );
    }
    println!();
    print_table(
        &["FEATURE", "ACCESS"],
        report
            .features
            .iter()
            .map(|f| vec![f.feature.to_string(), access_label(f.access).to_string()])
            .collect(),
    );
    Ok(())
}

fn access_label(access: Access) -> &'static str {
    match access {
        Access::Allowed => "allowed",
        Access::SignInRequired => "sign in required",
        Access::QuotaExhausted => "limit reached",
        Access::RegistrationRequired => "registered users only",
    }
}
