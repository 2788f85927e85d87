use std::process::Command;
use tempfile::TempDir;

#[test]
fn failed_message_reports_once_and_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(
        &config,
        format!(
            "[llm]\nprovider = \"groq\"\napi_key = \"gsk_test\"\nmodel = \"m\"\nbase_url = \"http://127.0.0.1:1\"\n\n[tracking]\nuri = \"{}\"\n",
            dir.path().join("mlruns").display()
        ),
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_mlchat"))
        .args(["chat", "--config"])
        .arg(&config)
        .args(["--message", "list experiments"])
        .env("HOME", dir.path())
        .env_remove("RUST_LOG")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("❌ Error:").count(), 1, "{stderr}");
    assert!(!stderr.lines().any(|l| l.starts_with("Error:")), "{stderr}");
}

#[test]
fn missing_config_exits_with_status_one() {
    let dir = TempDir::new().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_mlchat"))
        .args(["chat", "--config"])
        .arg(dir.path().join("absent.toml"))
        .args(["--message", "hi"])
        .env("HOME", dir.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("mlchat init"));
}
