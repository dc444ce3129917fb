//! Error taxonomy for the generation pipeline.
//!
//! Every failure the pipeline reports is one of three kinds:
//!
//! - [`ValidationError`] - the user has to fix the input first; nothing was sent
//! - [`ProviderError`] - a remote call failed; the provider message is kept
//! - [`GenerationError::Busy`] - another run is already in flight
//!
//! Rate limiting is not a separate variant. It is a [`ProviderError`] that
//! answers `true` to [`ProviderError::is_rate_limited`].

/// Prefix used on every provider error message.
pub const PROVIDER_ERROR_PREFIX: &str = "[GoogleGenerativeAI Error]: ";

/// Input problems detected before any remote call is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("キーワードを入力してください。")]
    EmptyKeyword,

    #[error("Gemini APIキーが設定されていません。`tweetmaster --set-api-key <KEY>` でキーを登録してください。")]
    MissingCredential,

    #[error("テキストがありません。先にツイート本文を生成してください。")]
    MissingText,
}

/// A remote call failed at the transport or API level.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    /// HTTP status, when the failure came from a response.
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    /// Error raised from a non-2xx response or a malformed body.
    pub fn api(status: Option<u16>, detail: impl AsRef<str>) -> Self {
        Self {
            status,
            message: format!("{}{}", PROVIDER_ERROR_PREFIX, detail.as_ref()),
        }
    }

    /// Error raised before a response was received.
    pub fn transport(detail: impl AsRef<str>) -> Self {
        Self::api(None, detail)
    }

    /// True when the provider throttled the call (HTTP 429).
    ///
    /// Some failures only carry the status inside the message text, so both
    /// are checked.
    pub fn is_rate_limited(&self) -> bool {
        self.status == Some(429) || self.message.contains("429")
    }
}

/// Errors returned by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("生成処理が実行中です。完了するまでお待ちください。")]
    Busy,
}

impl GenerationError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Provider(e) if e.is_rate_limited())
    }
}

pub type Result<T> = std::result::Result<T, GenerationError>;
