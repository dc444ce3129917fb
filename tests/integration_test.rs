use anyhow::Result;
use std::fs;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Runs the binary in mock mode with `home` as its home directory.
fn run_tweetmaster(home: &Path, args: &[&str]) -> Result<Output> {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tweetmaster"));
    cmd.args(args);

    // Enable mock mode for deterministic testing
    cmd.env("TWEETMASTER_USE_MOCK", "1");
    cmd.env("HOME", home);
    cmd.env_remove("GEMINI_API_KEY");
    cmd.stdin(Stdio::null());

    Ok(cmd.output()?)
}

fn saved_images(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|name| name.starts_with("tweet-image-") && name.ends_with(".png"))
                .collect()
        })
        .unwrap_or_default()
}

// =========================================================================
// API key management
// =========================================================================

#[test]
fn test_set_api_key_is_reported_by_config() -> Result<()> {
    let home = TempDir::new()?;

    let output = run_tweetmaster(home.path(), &["--set-api-key", "AIza-integration"])?;
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("APIキーを保存しました"));

    let stored = fs::read_to_string(
        home.path()
            .join(".tweetmaster")
            .join("tweetmaster-api-keys.json"),
    )?;
    assert!(stored.contains("AIza-integration"));

    let output = run_tweetmaster(home.path(), &["--config"])?;
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("APIキー: 設定済み"));

    Ok(())
}

#[test]
fn test_clear_api_key_unsets_it() -> Result<()> {
    let home = TempDir::new()?;

    run_tweetmaster(home.path(), &["--set-api-key", "AIza-integration"])?;
    let output = run_tweetmaster(home.path(), &["--clear-api-key"])?;
    assert!(output.status.success());

    let output = run_tweetmaster(home.path(), &["--config"])?;
    assert!(String::from_utf8_lossy(&output.stdout).contains("APIキー: 未設定"));

    Ok(())
}

// =========================================================================
// Generation
// =========================================================================

#[test]
fn test_keyword_run_saves_image_and_prints_post() -> Result<()> {
    let home = TempDir::new()?;
    let out_dir = TempDir::new()?;
    let out_arg = out_dir.path().to_string_lossy().into_owned();

    let output = run_tweetmaster(
        home.path(),
        &["--no-prompt", "--output-dir", &out_arg, "コーヒー"],
    )?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "run should succeed: {}", stdout);
    assert!(stdout.contains("コーヒーを楽しむひととき"));
    assert!(stdout.contains("[100%] 完了"));
    assert!(stdout.contains("https://twitter.com/intent/tweet?text="));

    let images = saved_images(out_dir.path());
    assert_eq!(images.len(), 1, "expected one saved image, got {:?}", images);

    Ok(())
}

#[test]
fn test_menu_quits_on_end_of_input() -> Result<()> {
    let home = TempDir::new()?;

    let output = run_tweetmaster(home.path(), &["週末"])?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("番号を選択してください"));

    Ok(())
}

#[test]
fn test_blank_keyword_fails_validation() -> Result<()> {
    let home = TempDir::new()?;

    let output = run_tweetmaster(home.path(), &["--no-prompt", "   "])?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!output.status.success());
    assert!(stdout.contains("エラーが発生しました"));
    assert!(stdout.contains("キーワードを入力してください。"));

    Ok(())
}

#[test]
fn test_missing_keyword_prints_usage_hint() -> Result<()> {
    let home = TempDir::new()?;

    let output = run_tweetmaster(home.path(), &[])?;

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("キーワードが指定されていません"));

    Ok(())
}

#[test]
fn test_regenerate_image_keeps_given_text() -> Result<()> {
    let home = TempDir::new()?;
    let out_dir = TempDir::new()?;
    let out_arg = out_dir.path().to_string_lossy().into_owned();

    let output = run_tweetmaster(
        home.path(),
        &[
            "--no-prompt",
            "--output-dir",
            &out_arg,
            "--regenerate-image",
            "朝の散歩が気持ちいい #散歩",
        ],
    )?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "run should succeed: {}", stdout);
    assert!(stdout.contains("朝の散歩が気持ちいい #散歩"));
    assert!(!stdout.contains("[ 33%]"), "image-only runs report no progress");
    assert_eq!(saved_images(out_dir.path()).len(), 1);

    Ok(())
}
