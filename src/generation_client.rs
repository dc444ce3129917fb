//! The two remote operations the pipeline depends on.
//!
//! [`GenerationClient`] is the seam between the orchestrator and the
//! provider. [`crate::gemini::GeminiClient`] talks to the real API;
//! [`MockGenerationClient`] answers offline with canned content.

use crate::credential_store::Credential;
use crate::error::ProviderError;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::info;

/// An image returned by the provider, still base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub mime_type: String,
    /// Base64 payload exactly as the provider sent it.
    pub data: String,
}

impl GeneratedImage {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.data.as_bytes())
    }
}

#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Single prompt in, completion text out.
    async fn generate_text(
        &self,
        credential: &Credential,
        prompt: &str,
    ) -> Result<String, ProviderError>;

    /// Visual prompt in, first image of the response out.
    async fn generate_image(
        &self,
        credential: &Credential,
        prompt: &str,
    ) -> Result<GeneratedImage, ProviderError>;
}

/// A 1x1 transparent PNG.
pub const MOCK_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// Offline client used in mock mode.
pub struct MockGenerationClient;

impl MockGenerationClient {
    pub fn new() -> Self {
        Self
    }

    fn mock_text(prompt: &str) -> String {
        let subject = quoted(prompt).unwrap_or("今日");
        if prompt.starts_with("以下の日本語の文章を") {
            format!(
                "A dreamy watercolor illustration inspired by \"{}\", soft morning light",
                subject
            )
        } else {
            let tag: String = subject.chars().filter(|c| !c.is_whitespace()).collect();
            format!("{}を楽しむひととき☕✨ #{}", subject, tag)
        }
    }
}

impl Default for MockGenerationClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Text between the last 「 and the following 」.
fn quoted(prompt: &str) -> Option<&str> {
    let start = prompt.rfind('「')? + '「'.len_utf8();
    let len = prompt[start..].find('」')?;
    Some(&prompt[start..start + len])
}

#[async_trait]
impl GenerationClient for MockGenerationClient {
    async fn generate_text(
        &self,
        _credential: &Credential,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        info!("Using mock text generation (TWEETMASTER_USE_MOCK=1)");
        Ok(Self::mock_text(prompt))
    }

    async fn generate_image(
        &self,
        _credential: &Credential,
        _prompt: &str,
    ) -> Result<GeneratedImage, ProviderError> {
        info!("Using mock image generation (TWEETMASTER_USE_MOCK=1)");
        Ok(GeneratedImage::new("image/png", MOCK_PNG_BASE64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts;

    fn credential() -> Credential {
        Credential::new("mock-key").unwrap()
    }

    #[test]
    fn test_mock_png_decodes_to_png_bytes() {
        let image = GeneratedImage::new("image/png", MOCK_PNG_BASE64);
        let bytes = image.decode().unwrap();
        assert_eq!(&bytes[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }

    #[test]
    fn test_invalid_base64_fails_to_decode() {
        let image = GeneratedImage::new("image/png", "not base64!!");
        assert!(image.decode().is_err());
    }

    #[tokio::test]
    async fn test_mock_tweet_mentions_keyword() {
        let client = MockGenerationClient::new();
        let text = client
            .generate_text(&credential(), &prompts::tweet_prompt("AIと未来"))
            .await
            .unwrap();
        assert_eq!(text, "AIと未来を楽しむひととき☕✨ #AIと未来");
    }

    #[tokio::test]
    async fn test_mock_translation_is_english() {
        let client = MockGenerationClient::new();
        let text = client
            .generate_text(&credential(), &prompts::translation_prompt("海辺の散歩"))
            .await
            .unwrap();
        assert!(text.starts_with("A dreamy watercolor illustration"));
        assert!(text.contains("海辺の散歩"));
    }

    #[tokio::test]
    async fn test_mock_image_is_png() {
        let client = MockGenerationClient::new();
        let image = client.generate_image(&credential(), "anything").await.unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, MOCK_PNG_BASE64);
    }

    #[test]
    fn test_quoted_takes_last_bracket_pair() {
        assert_eq!(quoted("a「x」b「y」"), Some("y"));
        assert_eq!(quoted("no brackets"), None);
    }
}
