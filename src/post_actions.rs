//! Export actions for a finished post.
//!
//! Posting a result does three things, in order:
//! 1. copies the post text to the system clipboard
//! 2. decodes the image and saves it as `tweet-image-{millis}.png`
//! 3. opens the X/Twitter compose intent pre-filled with the text
//!
//! Clipboard and browser access go through platform programs (`pbcopy`,
//! `xdg-open`, ...) run via [`ProcessRunner`]. A failed copy or open is
//! reported and the remaining steps still run.

use crate::generation_client::GeneratedImage;
use crate::orchestrator::GenerationResult;
use crate::providers::{SystemTimeProvider, TimeProvider};
use anyhow::{Context, Result, anyhow};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tracing::{error, info, warn};

pub const INTENT_URL: &str = "https://twitter.com/intent/tweet";

// =============================================================================
// Traits for Dependency Injection
// =============================================================================

/// Trait for running system processes.
pub trait ProcessRunner: Send + Sync {
    /// Runs `program`, feeding `stdin` to it when given, and waits for it to exit.
    fn run(&self, program: &str, args: &[&str], stdin: Option<&[u8]>) -> Result<ExitStatus>;

    /// Checks if a program exists in PATH.
    fn program_exists(&self, program: &str) -> bool;
}

/// Default process runner using std::process::Command.
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, program: &str, args: &[&str], stdin: Option<&[u8]>) -> Result<ExitStatus> {
        // Clipboard daemons and browsers outlive the launcher; they must not
        // inherit a pipe we wait on.
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = cmd.spawn().with_context(|| format!("spawning {}", program))?;
        if let (Some(data), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(data)?;
        }
        Ok(child.wait()?)
    }

    fn program_exists(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// Clipboard writers to try, in order of preference.
#[cfg(target_os = "macos")]
const CLIPBOARD_COMMANDS: &[(&str, &[&str])] = &[("pbcopy", &[])];
#[cfg(windows)]
const CLIPBOARD_COMMANDS: &[(&str, &[&str])] = &[("clip", &[])];
#[cfg(not(any(target_os = "macos", windows)))]
const CLIPBOARD_COMMANDS: &[(&str, &[&str])] = &[
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
];

/// Program and leading arguments that open a URL in the default browser.
#[cfg(target_os = "macos")]
const URL_OPENER: (&str, &[&str]) = ("open", &[]);
#[cfg(windows)]
const URL_OPENER: (&str, &[&str]) = ("cmd", &["/C", "start", ""]);
#[cfg(not(any(target_os = "macos", windows)))]
const URL_OPENER: (&str, &[&str]) = ("xdg-open", &[]);

/// Compose-screen URL with `text` pre-filled.
pub fn intent_url(text: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(text.as_bytes()).collect();
    format!("{}?text={}", INTENT_URL, encoded)
}

pub fn image_file_name(timestamp_millis: u128) -> String {
    format!("tweet-image-{}.png", timestamp_millis)
}

/// Outcome of [`PostActions::post`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostReport {
    pub copied: bool,
    pub image_path: Option<PathBuf>,
    pub intent_url: String,
    pub opened: bool,
}

pub struct PostActions {
    runner: Box<dyn ProcessRunner>,
    time_provider: Box<dyn TimeProvider>,
}

impl PostActions {
    pub fn new() -> Self {
        Self::with_deps(Box::new(SystemProcessRunner), Box::new(SystemTimeProvider))
    }

    /// Creates `PostActions` with custom process and time providers (for testing).
    pub fn with_deps(runner: Box<dyn ProcessRunner>, time_provider: Box<dyn TimeProvider>) -> Self {
        Self {
            runner,
            time_provider,
        }
    }

    /// Copies `text` with the first clipboard program found on PATH.
    pub fn copy_text(&self, text: &str) -> Result<()> {
        let (program, args) = CLIPBOARD_COMMANDS
            .iter()
            .find(|(program, _)| self.runner.program_exists(program))
            .ok_or_else(|| anyhow!("no clipboard program found"))?;

        let status = self.runner.run(program, args, Some(text.as_bytes()))?;
        if !status.success() {
            return Err(anyhow!("{} exited with {}", program, status));
        }
        info!("Copied post text with {}", program);
        Ok(())
    }

    /// Decodes `image` and writes it into `dir`, returning the file path.
    pub fn save_image(&self, image: &GeneratedImage, dir: &Path) -> Result<PathBuf> {
        let bytes = image.decode().context("image data is not valid base64")?;
        std::fs::create_dir_all(dir)?;
        let path = dir.join(image_file_name(self.time_provider.now_millis()));
        std::fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
        info!("Saved image to {}", path.display());
        Ok(path)
    }

    /// Opens `url` in the default browser.
    pub fn open_url(&self, url: &str) -> Result<()> {
        let (program, prefix) = URL_OPENER;
        let mut args: Vec<&str> = prefix.to_vec();
        args.push(url);

        let status = self.runner.run(program, &args, None)?;
        if !status.success() {
            return Err(anyhow!("{} exited with {}", program, status));
        }
        Ok(())
    }

    /// Copies, saves and opens, writing a status line for each step.
    ///
    /// # Errors
    ///
    /// Fails only when there is no text to post or the image cannot be
    /// saved; clipboard and browser failures are reported in the output.
    pub fn post<W: Write>(&self, result: &GenerationResult, dir: &Path, output: &mut W) -> Result<PostReport> {
        if result.text.trim().is_empty() {
            writeln!(output, "❌ テキストがありません: 投稿するツイート本文が生成されていません。")?;
            return Err(anyhow!("no post text to share"));
        }

        let copied = match self.copy_text(&result.text) {
            Ok(()) => {
                writeln!(output, "📋 ツイート本文をクリップボードにコピーしました。")?;
                true
            }
            Err(e) => {
                warn!("Clipboard copy failed: {}", e);
                writeln!(output, "⚠️  クリップボードへのコピーに失敗しました: {}", e)?;
                false
            }
        };

        let image_path = match &result.image {
            Some(image) => {
                let path = self.save_image(image, dir)?;
                writeln!(output, "💾 画像を保存しました: {}", path.display())?;
                Some(path)
            }
            None => None,
        };

        let url = intent_url(&result.text);
        let opened = match self.open_url(&url) {
            Ok(()) => {
                writeln!(output, "🌐 投稿画面を開きました。")?;
                true
            }
            Err(e) => {
                error!("Failed to open browser: {}", e);
                writeln!(output, "🌐 ブラウザで次のURLを開いてください:\n{}", url)?;
                false
            }
        };

        Ok(PostReport {
            copied,
            image_path,
            intent_url: url,
            opened,
        })
    }
}

impl Default for PostActions {
    fn default() -> Self {
        Self::new()
    }
}
