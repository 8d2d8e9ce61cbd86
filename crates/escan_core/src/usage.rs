//! Usage gating for anonymous identities.
//!
//! Anonymous users may run text extraction [`MAX_ANONYMOUS_EXTRACTS`] times; every
//! other feature requires a permanent account. Permanent users are never counted.
//!
//! The counter lives in the `auth_prefs` preference store under
//! `extract_text_count` and is shared by all anonymous sessions on the device. It
//! is reset once when an anonymous session upgrades to a permanent one.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};

use crate::auth::{AuthBackend, AuthError, AuthOutcome, Credential, Identity};
use crate::error::Result as CoreResult;
use crate::prefs::PreferenceStore;

/// Name of the preference store holding the usage counter.
pub const USAGE_PREFS_NAME: &str = "auth_prefs";
pub const EXTRACT_TEXT_COUNT_KEY: &str = "extract_text_count";
pub const MAX_ANONYMOUS_EXTRACTS: i64 = 3;

/// Features offered from the home screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    ExtractText,
    ExtractHandwriting,
    Watermark,
    QrScan,
}

impl Feature {
    pub const ALL: [Feature; 4] = [
        Feature::ExtractText,
        Feature::ExtractHandwriting,
        Feature::Watermark,
        Feature::QrScan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::ExtractText => "extract_text",
            Feature::ExtractHandwriting => "extract_handwriting",
            Feature::Watermark => "watermark",
            Feature::QrScan => "qr_scan",
        }
    }

    /// Whether anonymous use of this feature is metered rather than refused.
    pub fn is_metered(&self) -> bool {
        matches!(self, Feature::ExtractText)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Feature::ALL
            .into_iter()
            .find(|f| f.as_str() == normalized)
            .ok_or_else(|| format!("unknown feature '{}'", s))
    }
}

/// Decision for one feature request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Allowed,
    /// No identity at all.
    SignInRequired,
    /// Anonymous extraction quota used up.
    QuotaExhausted,
    /// Feature is unavailable to anonymous users.
    RegistrationRequired,
}

impl Access {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Access::Allowed)
    }
}

/// Extraction uses left for the current identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainingUses {
    Unlimited,
    Limited(i64),
}

impl fmt::Display for RemainingUses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemainingUses::Unlimited => f.write_str("unlimited"),
            RemainingUses::Limited(n) => write!(f, "{}", n),
        }
    }
}

/// User-facing message explaining a gate decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub title: &'static str,
    pub message: String,
}

/// Shown to anonymous users before an extraction.
pub fn anonymous_limit_notice(remaining: i64) -> Notice {
    Notice {
        title: "Feature Restrictions",
        message: format!(
            "As an anonymous user, you can only use the Extract Text feature {} times.\n\n\
             You have {} uses remaining.\n\n\
             Sign in or create an account to unlock all features without limits.",
            MAX_ANONYMOUS_EXTRACTS,
            remaining.max(0)
        ),
    }
}

pub fn limit_reached_notice() -> Notice {
    Notice {
        title: "Usage Limit Reached",
        message: "You've reached the maximum number of uses for this feature as an \
                  anonymous user.\n\n\
                  Sign in or create an account to continue using all features without limits."
            .to_string(),
    }
}

pub fn feature_restricted_notice() -> Notice {
    Notice {
        title: "Feature Restricted",
        message: "This feature is only available to registered users.\n\n\
                  Sign in or create an account to unlock all features."
            .to_string(),
    }
}

pub fn sign_in_required_notice() -> Notice {
    Notice {
        title: "Sign In Required",
        message: "Sign in, create an account, or continue as a guest to use eScan.".to_string(),
    }
}

impl Access {
    /// Notice explaining a refusal. `None` for [`Access::Allowed`].
    pub fn notice(&self) -> Option<Notice> {
        match self {
            Access::Allowed => None,
            Access::SignInRequired => Some(sign_in_required_notice()),
            Access::QuotaExhausted => Some(limit_reached_notice()),
            Access::RegistrationRequired => Some(feature_restricted_notice()),
        }
    }
}

/// Combines the current identity with the persisted usage counter.
///
/// Counter reads never fail. [`UsageGate::consume`] refuses when the counter cannot
/// be persisted; the other writers log the storage error and carry on.
pub struct UsageGate {
    auth: Arc<dyn AuthBackend>,
    prefs: Arc<dyn PreferenceStore>,
}

impl UsageGate {
    pub fn new(auth: Arc<dyn AuthBackend>, prefs: Arc<dyn PreferenceStore>) -> Self {
        Self { auth, prefs }
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.auth.current_identity()
    }

    pub fn is_user_signed_in(&self) -> bool {
        self.auth.current_identity().is_some()
    }

    /// True only when an identity exists and it is anonymous.
    pub fn is_anonymous_user(&self) -> bool {
        self.auth
            .current_identity()
            .map(|id| id.is_anonymous)
            .unwrap_or(false)
    }

    pub fn extract_feature_count(&self) -> i64 {
        self.prefs.get_int(EXTRACT_TEXT_COUNT_KEY, 0)
    }

    pub fn can_use_extract_feature(&self) -> bool {
        if !self.is_anonymous_user() {
            return true;
        }
        self.extract_feature_count() < MAX_ANONYMOUS_EXTRACTS
    }

    /// Count one extraction and return `MAX_ANONYMOUS_EXTRACTS - new_count`.
    ///
    /// The counter is not clamped: calling past the limit drives the result
    /// negative. Callers check [`Self::can_use_extract_feature`] first.
    pub fn increment_extract_feature_count(&self) -> i64 {
        let count = match self
            .prefs
            .update_int(EXTRACT_TEXT_COUNT_KEY, 0, &mut |c| c.saturating_add(1))
        {
            Ok(count) => count,
            Err(e) => {
                error!(error = %e, "Failed to persist extract count");
                self.extract_feature_count().saturating_add(1)
            }
        };
        info!(count, "Extract feature used");
        MAX_ANONYMOUS_EXTRACTS - count
    }

    pub fn is_anonymous_usage_exhausted(&self) -> bool {
        self.is_anonymous_user() && self.extract_feature_count() >= MAX_ANONYMOUS_EXTRACTS
    }

    pub fn reset_usage_counts(&self) {
        if let Err(e) = self.prefs.put_int(EXTRACT_TEXT_COUNT_KEY, 0) {
            error!(error = %e, "Failed to reset usage counts");
        }
    }

    pub fn remaining_extract_uses(&self) -> RemainingUses {
        if !self.is_anonymous_user() {
            return RemainingUses::Unlimited;
        }
        RemainingUses::Limited((MAX_ANONYMOUS_EXTRACTS - self.extract_feature_count()).max(0))
    }

    /// Decide whether the current identity may start `feature`.
    pub fn check_access(&self, feature: Feature) -> Access {
        let Some(identity) = self.auth.current_identity() else {
            return Access::SignInRequired;
        };
        if !identity.is_anonymous {
            return Access::Allowed;
        }
        if !feature.is_metered() {
            return Access::RegistrationRequired;
        }
        if self.extract_feature_count() < MAX_ANONYMOUS_EXTRACTS {
            Access::Allowed
        } else {
            Access::QuotaExhausted
        }
    }

    /// Record one use of `feature`. Only anonymous text extraction is counted.
    ///
    /// Fails when the incremented counter cannot be stored, so a guest is never
    /// let through on a use that was not recorded.
    pub fn consume(&self, feature: Feature) -> CoreResult<RemainingUses> {
        if !(feature.is_metered() && self.is_anonymous_user()) {
            return Ok(self.remaining_extract_uses());
        }
        let count = self
            .prefs
            .update_int(EXTRACT_TEXT_COUNT_KEY, 0, &mut |c| c.saturating_add(1))?;
        info!(count, "Extract feature used");
        Ok(RemainingUses::Limited((MAX_ANONYMOUS_EXTRACTS - count).max(0)))
    }

    pub async fn sign_in_anonymously(&self) -> AuthOutcome {
        match self.auth.sign_in_anonymously().await {
            Ok(identity) => AuthOutcome::signed_in(identity),
            Err(e) => self.failed("anonymous sign-in", e),
        }
    }

    /// Permanent sign-in. An anonymous session that upgrades gets its counter reset.
    pub async fn sign_in_with_credential(&self, credential: &Credential) -> AuthOutcome {
        let was_anonymous = self.is_anonymous_user();
        match self.auth.sign_in_with_credential(credential).await {
            Ok(identity) => self.finish_permanent_sign_in(was_anonymous, identity),
            Err(e) => self.failed("sign-in", e),
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str, display_name: &str) -> AuthOutcome {
        let was_anonymous = self.is_anonymous_user();
        match self.auth.sign_up(email, password, display_name).await {
            Ok(identity) => self.finish_permanent_sign_in(was_anonymous, identity),
            Err(e) => self.failed("sign-up", e),
        }
    }

    pub async fn sign_out(&self) -> AuthOutcome {
        match self.auth.sign_out().await {
            Ok(()) => AuthOutcome::signed_out(),
            Err(e) => self.failed("sign-out", e),
        }
    }

    fn finish_permanent_sign_in(&self, was_anonymous: bool, identity: Identity) -> AuthOutcome {
        if was_anonymous && !identity.is_anonymous {
            info!(uid = %identity.uid, "Anonymous session upgraded; resetting usage counts");
            self.reset_usage_counts();
        }
        AuthOutcome::signed_in(identity)
    }

    fn failed(&self, op: &str, err: AuthError) -> AuthOutcome {
        info!(op, error = %err, "Auth operation failed");
        AuthOutcome::failed(&err)
    }
}
