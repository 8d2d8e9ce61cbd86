#![cfg(unix)]

mod cli_support;

use cli_support::{parse_json, TestHome};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct Document {
    id: i64,
    file_name: String,
    category: String,
    extracted_text: Option<String>,
    image_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Saved {
    status: String,
    document: Document,
    remaining: Value,
}

fn extract(home: &TestHome, text: &str, extra: &[&str]) -> Saved {
    let image = home.image("page.jpg", text);
    let image = image.to_string_lossy().to_string();
    let mut args = vec!["extract", image.as_str(), "--json"];
    args.extend_from_slice(extra);
    home.run_json(&args)
}

#[test]
fn test_config_json_reports_home_paths() {
    let home = TestHome::new();
    let config: Value = home.run_json(&["config", "--json"]);

    assert_eq!(config["home"].as_str().unwrap(), home.path().to_string_lossy());
    assert!(config["config"]["exists"].as_bool().unwrap());
    assert_eq!(config["recognition"]["program"], "cat");
    assert_eq!(
        config["categories"],
        serde_json::json!(["Personal", "Work", "School", "Others"])
    );
}

#[test]
fn test_guest_quota_blocks_fourth_extraction() {
    let home = TestHome::new();
    home.run_ok(&["auth", "guest"]);

    for expected in [2, 1, 0] {
        let saved = extract(&home, "Hello from eScan", &[]);
        assert_eq!(saved.status, "saved");
        assert_eq!(saved.remaining, serde_json::json!({ "limited": expected }));
        assert_eq!(saved.document.category, "Personal");
        assert!(saved.document.file_name.starts_with("Text_"));
        assert_eq!(saved.document.extracted_text.as_deref(), Some("Hello from eScan"));
    }

    let image = home.image("page.jpg", "again");
    let args = ["extract", image.to_str().unwrap(), "--json"];
    let output = home.run(&args);
    assert!(!output.status.success());
    let err: Value = parse_json(&output, &args);
    assert_eq!(err["error"]["message"], "Usage Limit Reached");

    let usage: Value = home.run_json(&["usage", "--json"]);
    assert_eq!(usage["anonymous"], true);
    assert_eq!(usage["extract_count"], 3);
    assert_eq!(usage["exhausted"], true);
    assert_eq!(usage["remaining"], serde_json::json!({ "limited": 0 }));

    let docs: Vec<Document> = home.run_json(&["library", "list", "--json"]);
    assert_eq!(docs.len(), 3);
}

#[test]
fn test_guest_cannot_extract_handwriting() {
    let home = TestHome::new();
    home.run_ok(&["auth", "guest"]);

    let image = home.image("note.jpg", "scribbles");
    let args = ["extract", image.to_str().unwrap(), "--handwriting", "--json"];
    let output = home.run(&args);
    assert!(!output.status.success());
    let err: Value = parse_json(&output, &args);
    assert_eq!(err["error"]["message"], "Feature Restricted");

    let usage: Value = home.run_json(&["usage", "--json"]);
    assert_eq!(usage["extract_count"], 0);
}

#[test]
fn test_sign_up_from_guest_resets_usage() {
    let home = TestHome::new();
    home.run_ok(&["auth", "guest"]);
    extract(&home, "first", &[]);
    extract(&home, "second", &[]);

    let outcome: Value = home.run_json(&[
        "auth",
        "sign-up",
        "--name",
        "Ada",
        "--email",
        "ada@example.com",
        "--password",
        "secret1",
        "--json",
    ]);
    assert_eq!(outcome["success"], true);
    assert_eq!(outcome["identity"]["is_anonymous"], false);

    let usage: Value = home.run_json(&["usage", "--json"]);
    assert_eq!(usage["extract_count"], 0);
    assert_eq!(usage["remaining"], "unlimited");
    assert!(usage["features"]
        .as_array()
        .unwrap()
        .iter()
        .all(|f| f["access"] == "allowed"));

    home.run_ok(&["auth", "sign-out"]);
    let status: Value = home.run_json(&["auth", "status", "--json"]);
    assert_eq!(status["signed_in"], false);

    home.run_ok(&[
        "auth",
        "sign-in",
        "--email",
        "ada@example.com",
        "--password",
        "secret1",
    ]);
    let status: Value = home.run_json(&["auth", "status", "--json"]);
    assert_eq!(status["identity"]["email"], "ada@example.com");
}

#[test]
fn test_wrong_password_is_reported() {
    let home = TestHome::new();
    home.run_ok(&[
        "auth", "sign-up", "--name", "Ada", "--email", "ada@example.com", "--password",
        "secret1",
    ]);

    let args = [
        "auth",
        "sign-in",
        "--email",
        "ada@example.com",
        "--password",
        "wrong-pw",
        "--json",
    ];
    let output = home.run(&args);
    assert!(!output.status.success());
    let err: Value = parse_json(&output, &args);
    assert_eq!(err["error"]["message"], "Sign-in failed");
}

#[test]
fn test_signed_out_extraction_requires_sign_in() {
    let home = TestHome::new();
    let image = home.image("page.jpg", "text");
    let output = home.run(&["extract", image.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Sign In Required"), "stderr: {}", stderr);
}

#[test]
fn test_library_lifecycle() {
    let home = TestHome::new();
    home.run_ok(&[
        "auth", "sign-up", "--name", "Ada", "--email", "ada@example.com", "--password",
        "secret1",
    ]);

    let work = extract(&home, "Quarterly report", &["--category", "work", "--name", "Report"]);
    assert_eq!(work.remaining, "unlimited");
    assert_eq!(work.document.category, "Work");
    assert_eq!(work.document.file_name, "Report");
    let image_path = work.document.image_path.clone().unwrap();
    assert!(std::path::Path::new(&image_path).starts_with(home.path().join("scans")));

    let personal = extract(&home, "Shopping list", &[]);

    let work_docs: Vec<Document> =
        home.run_json(&["library", "list", "--category", "Work", "--json"]);
    assert_eq!(work_docs.len(), 1);
    assert_eq!(work_docs[0].id, work.document.id);

    let id = work.document.id.to_string();
    home.run_ok(&["library", "rename", &id, "Q3 Report"]);
    home.run_ok(&["library", "move", &id, "School"]);

    let shown: Value = home.run_json(&["library", "show", &id, "--json"]);
    assert_eq!(shown["document"]["file_name"], "Q3 Report");
    assert_eq!(shown["document"]["category"], "School");
    assert_eq!(shown["info"]["text_length"], 16);

    let stats: Value = home.run_json(&["library", "stats", "--json"]);
    let count_for = |category: &str| {
        stats
            .as_array()
            .unwrap()
            .iter()
            .find(|row| row["category"] == category)
            .map(|row| row["documents"].as_i64().unwrap())
    };
    assert_eq!(count_for("School"), Some(1));
    assert_eq!(count_for("Personal"), Some(1));
    assert_eq!(count_for("Work"), Some(0));

    home.run_ok(&["library", "delete", &id]);
    assert!(!std::path::Path::new(&image_path).exists());

    let remaining: Vec<Document> = home.run_json(&["library", "list", "--json"]);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, personal.document.id);

    let output = home.run(&["library", "show", &id]);
    assert!(!output.status.success());
}

#[test]
fn test_unknown_category_is_rejected() {
    let home = TestHome::new();
    home.run_ok(&["auth", "guest"]);

    let image = home.image("page.jpg", "text");
    let args = ["extract", image.to_str().unwrap(), "--category", "Recipes", "--json"];
    let output = home.run(&args);
    assert!(!output.status.success());
    let err: Value = parse_json(&output, &args);
    assert_eq!(err["error"]["message"], "Unknown category: 'Recipes'");

    // Rejected before the gate, so no use was consumed.
    let usage: Value = home.run_json(&["usage", "--json"]);
    assert_eq!(usage["extract_count"], 0);
}
