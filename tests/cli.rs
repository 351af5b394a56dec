use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn setup_test_env(provider: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let info_dir = root.join("information");
    fs::create_dir_all(&info_dir).unwrap();
    fs::write(
        info_dir.join("about.md"),
        "# About\n\nA family law practice serving the harbor district.",
    )
    .unwrap();
    fs::write(
        info_dir.join("index.json"),
        r#"{
  "firm_name": "Harbor Family Law",
  "sections": [
    { "path": "about.md", "summary": "Firm history and partners" },
    { "path": "fees.md", "summary": "Consultation fees and payment plans" }
  ]
}"#,
    )
    .unwrap();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_content = format!(
        r#"[corpus]
root = "../information"
index = "../information/index.json"
overview = "../mini-context.md"

[oracle]
provider = "{}"

[server]
bind = "127.0.0.1:0"
"#,
        provider
    );
    let config_path = config_dir.join("concierge.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_concierge(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_concierge"))
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to run concierge binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_index_lists_sections() {
    let (_tmp, config_path) = setup_test_env("disabled");

    let (stdout, stderr, success) = run_concierge(&config_path, &["index"]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("firm: Harbor Family Law"));
    assert!(stdout.contains("overview: none (fast path disabled)"));
    assert!(stdout.contains("sections: 2"));
    assert!(stdout.contains("about.md"));
    assert!(stdout.contains("[ok]"));
    assert!(stdout.contains("[missing]"));
}

#[test]
fn test_index_reports_overview() {
    let (tmp, config_path) = setup_test_env("disabled");
    fs::write(tmp.path().join("mini-context.md"), "We help families.").unwrap();

    let (stdout, _, success) = run_concierge(&config_path, &["index"]);
    assert!(success);
    assert!(stdout.contains("overview: 17 bytes"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_concierge(&tmp.path().join("nope.toml"), &["index"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_invalid_config_fails() {
    let (_tmp, config_path) = setup_test_env("telepathy");
    let (_, stderr, success) = run_concierge(&config_path, &["index"]);
    assert!(!success);
    assert!(stderr.contains("Unknown oracle provider"));
}

#[test]
fn test_ask_with_disabled_oracle_fails() {
    let (_tmp, config_path) = setup_test_env("disabled");
    let (_, stderr, success) = run_concierge(&config_path, &["ask", "what are your fees?"]);
    assert!(!success);
    assert!(stderr.contains("disabled"));
}

#[test]
fn test_ask_empty_question_fails() {
    let (_tmp, config_path) = setup_test_env("disabled");
    let (_, stderr, success) = run_concierge(&config_path, &["ask", "   "]);
    assert!(!success);
    assert!(stderr.contains("must not be empty"));
}

#[test]
fn test_openai_without_key_fails() {
    let (_tmp, config_path) = setup_test_env("openai");
    let output = Command::new(env!("CARGO_BIN_EXE_concierge"))
        .arg("--config")
        .arg(&config_path)
        .args(["ask", "hello"])
        .env_remove("OPENAI_API_KEY")
        .env("RUST_LOG", "off")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("OPENAI_API_KEY"));
}
