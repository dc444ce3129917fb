//! Interactive session tying the orchestrator to the terminal.
//!
//! A session owns the orchestrator, the console UI and the post actions for
//! one invocation of the binary. It runs the first generation and then loops
//! over the post-generation menu until the user quits.

use crate::config::Config;
use crate::credential_store::Credential;
use crate::display::{ConsoleUI, MenuChoice};
use crate::error::GenerationError;
use crate::generation_client::GenerationClient;
use crate::orchestrator::{GenerationResult, Orchestrator, RetryPolicy};
use crate::post_actions::{PostActions, intent_url};
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Runs `fut` unless Ctrl-C arrives first. Dropping the future cancels any
/// pending rate-limit retry.
async fn until_interrupted<T>(fut: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        value = fut => Some(value),
        _ = tokio::signal::ctrl_c() => {
            println!("\n⛔ 中断しました。");
            None
        }
    }
}

pub struct Session<C: GenerationClient> {
    orchestrator: Orchestrator<C>,
    ui: Arc<ConsoleUI>,
    post_actions: PostActions,
    credential: Option<Credential>,
    output_dir: PathBuf,
}

impl<C: GenerationClient> Session<C> {
    pub fn new(client: C, config: &Config, credential: Option<Credential>, verbose: bool) -> Self {
        let ui = Arc::new(ConsoleUI::new(verbose));
        let orchestrator = Orchestrator::new(client)
            .with_retry_policy(RetryPolicy {
                delay: config.retry_delay(),
                ..RetryPolicy::default()
            })
            .with_observer(ui.clone());

        Self {
            orchestrator,
            ui,
            post_actions: PostActions::new(),
            credential,
            output_dir: config.output_dir(),
        }
    }

    /// Full run. `Ok(None)` means the user interrupted it.
    pub async fn generate(&self, keyword: &str) -> Result<Option<GenerationResult>, GenerationError> {
        println!("🚀 「{}」についてツイートを生成します...", keyword.trim());
        until_interrupted(self.orchestrator.run_full(self.credential.as_ref(), keyword))
            .await
            .transpose()
    }

    /// Image-only run on `result`. `Ok(false)` means the user interrupted it.
    pub async fn regenerate_image(&self, result: &mut GenerationResult) -> Result<bool, GenerationError> {
        println!("🎨 画像を再生成中...");
        match until_interrupted(self.orchestrator.regenerate_image(self.credential.as_ref(), result)).await {
            Some(outcome) => outcome.map(|()| true),
            None => Ok(false),
        }
    }

    /// Prints the result, saves the image and prints the compose URL.
    pub fn finish_without_prompt(&self, result: &GenerationResult) -> anyhow::Result<()> {
        self.ui.show_result(result);
        if let Some(image) = &result.image {
            let path = self.post_actions.save_image(image, &self.output_dir)?;
            println!("💾 画像を保存しました: {}", path.display());
        }
        println!("🔗 {}", intent_url(&result.text));
        Ok(())
    }

    /// Menu loop over an existing result. `keyword` enables "regenerate all".
    pub async fn interact(&self, mut result: GenerationResult, keyword: Option<&str>) -> anyhow::Result<()> {
        loop {
            self.ui.show_result(&result);

            match self.ui.prompt_menu()? {
                MenuChoice::Post => {
                    if let Err(e) = self
                        .post_actions
                        .post(&result, &self.output_dir, &mut io::stdout())
                    {
                        warn!("Posting failed: {}", e);
                    }
                }
                MenuChoice::RegenerateImage => {
                    // Failures are already shown by the UI observer.
                    let _ = self.regenerate_image(&mut result).await;
                }
                MenuChoice::EditText => {
                    if let Some(text) = self.ui.prompt_text_edit(&result.text)? {
                        info!("Post text edited by user");
                        result.text = text;
                    }
                }
                MenuChoice::RegenerateAll => match keyword {
                    Some(keyword) => {
                        if let Ok(Some(fresh)) = self.generate(keyword).await {
                            result = fresh;
                        }
                    }
                    None => println!("キーワードがないため、すべての再生成はできません。"),
                },
                MenuChoice::Quit => return Ok(()),
            }
        }
    }
}
