//! Terminal presentation: progress, results, and the post-generation menu.
//!
//! Every method has a `_with_io` variant taking explicit reader/writer
//! streams so the output can be asserted in tests; the plain variants use
//! stdin/stdout.

use crate::orchestrator::{
    GenerationResult, PipelineEvent, PipelineObserver, PipelineState, Progress,
};
use anyhow::Result;
use std::io::{self, BufRead, Write};
use tracing::info;

/// What to do with a generated post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    /// Copy text, save image, open the compose screen.
    Post,
    RegenerateImage,
    EditText,
    RegenerateAll,
    Quit,
}

pub struct ConsoleUI {
    verbose: bool,
}

impl ConsoleUI {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Label shown next to a progress percentage.
    pub fn progress_label(progress: Progress) -> &'static str {
        match progress.percent() {
            p if p < 33 => "テキストを生成中...",
            p if p < 66 => "画像を生成するための準備中...",
            p if p < 100 => "画像を生成中...",
            _ => "完了",
        }
    }

    pub fn render_event_with_io<W: Write>(&self, event: &PipelineEvent, output: &mut W) -> Result<()> {
        match event {
            PipelineEvent::Progress(progress) => {
                writeln!(
                    output,
                    "[{:>3}%] {}",
                    progress.percent(),
                    Self::progress_label(*progress)
                )?;
            }
            PipelineEvent::TextReady(text) => {
                writeln!(output, "\n📝 {}\n", text)?;
            }
            PipelineEvent::RetryScheduled { delay } => {
                writeln!(
                    output,
                    "⏳ レートリミットに達しました。{}秒後に再試行します...",
                    delay.as_secs()
                )?;
            }
            PipelineEvent::Failed(err) => {
                writeln!(output, "\n❌ エラーが発生しました: {}", err)?;
            }
            PipelineEvent::State(state) if self.verbose => {
                writeln!(output, "   → {}", state_label(*state))?;
            }
            PipelineEvent::State(_) => {}
        }
        Ok(())
    }

    pub fn show_result_with_io<W: Write>(&self, result: &GenerationResult, output: &mut W) -> Result<()> {
        writeln!(output, "\n{}", "=".repeat(60))?;
        writeln!(output, "✅ 生成結果")?;
        writeln!(output, "{}", "=".repeat(60))?;
        writeln!(output)?;
        writeln!(output, "📝 ツイート本文 ({}文字):", result.text.chars().count())?;
        writeln!(output, "{}", result.text)?;
        writeln!(output)?;
        match &result.image {
            Some(image) => writeln!(
                output,
                "🖼️  画像: {} ({} bytes base64)",
                image.mime_type,
                image.data.len()
            )?,
            None => writeln!(output, "🖼️  画像: なし")?,
        }
        writeln!(output, "{}", "=".repeat(60))?;
        Ok(())
    }

    /// Asks what to do next. End of input counts as [`MenuChoice::Quit`].
    pub fn prompt_menu_with_io<R: BufRead, W: Write>(&self, input: &mut R, output: &mut W) -> Result<MenuChoice> {
        writeln!(output)?;
        writeln!(output, "  1️⃣  Xに投稿する     - 本文をコピーし、画像を保存して投稿画面を開く")?;
        writeln!(output, "  2️⃣  画像のみ再生成")?;
        writeln!(output, "  3️⃣  本文を編集")?;
        writeln!(output, "  4️⃣  すべて再生成")?;
        writeln!(output, "  5️⃣  終了")?;

        loop {
            write!(output, "\n番号を選択してください (1-5): ")?;
            output.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                return Ok(MenuChoice::Quit);
            }

            let choice = match line.trim() {
                "1" => MenuChoice::Post,
                "2" => MenuChoice::RegenerateImage,
                "3" => MenuChoice::EditText,
                "4" => MenuChoice::RegenerateAll,
                "5" | "q" => MenuChoice::Quit,
                _ => {
                    writeln!(output, "無効な選択です。1〜5の番号を入力してください。")?;
                    continue;
                }
            };
            info!("User chose {:?}", choice);
            return Ok(choice);
        }
    }

    /// Reads replacement post text. A blank line keeps the current text.
    pub fn prompt_text_edit_with_io<R: BufRead, W: Write>(
        &self,
        current: &str,
        input: &mut R,
        output: &mut W,
    ) -> Result<Option<String>> {
        writeln!(output, "現在の本文: {}", current)?;
        write!(output, "新しい本文 (空行で変更なし): ")?;
        output.flush()?;

        let mut line = String::new();
        input.read_line(&mut line)?;
        let edited = line.trim();
        if edited.is_empty() {
            Ok(None)
        } else {
            Ok(Some(edited.to_string()))
        }
    }

    // =========================================================================
    // Convenience methods using standard I/O
    // =========================================================================

    pub fn show_result(&self, result: &GenerationResult) {
        let _ = self.show_result_with_io(result, &mut io::stdout());
    }

    pub fn prompt_menu(&self) -> Result<MenuChoice> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        self.prompt_menu_with_io(&mut input, &mut io::stdout())
    }

    pub fn prompt_text_edit(&self, current: &str) -> Result<Option<String>> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        self.prompt_text_edit_with_io(current, &mut input, &mut io::stdout())
    }
}

impl PipelineObserver for ConsoleUI {
    fn on_event(&self, event: &PipelineEvent) {
        let _ = self.render_event_with_io(event, &mut io::stdout());
    }
}

fn state_label(state: PipelineState) -> &'static str {
    match state {
        PipelineState::Idle => "待機中",
        PipelineState::GeneratingText => "テキストを生成中",
        PipelineState::TranslatingPrompt => "ビジュアルプロンプトに変換中",
        PipelineState::GeneratingImage => "画像を生成中",
        PipelineState::RateLimited => "レートリミット待機中",
        PipelineState::Done => "完了",
        PipelineState::Error => "エラー",
    }
}
