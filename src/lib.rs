//! Tweetmaster - keyword to illustrated post generation on the Gemini API.
//!
//! Given a keyword, the library runs a three step pipeline:
//!
//! - **Post text** written by the text model from the keyword
//! - **Visual prompt** in English, translated from the post text
//! - **Image** produced by the image model from the visual prompt
//!
//! A rate-limited (HTTP 429) step is retried once after a fixed delay, and
//! the image alone can be regenerated for an existing post text.
//!
//! # Architecture
//!
//! - [`config`] - Configuration management (mock mode, retry delay, paths)
//! - [`credential_store`] - Persistent API key storage
//! - [`error`] - Validation and provider error types
//! - [`http_client`] - HTTP client abstraction
//! - [`gemini`] - Gemini REST client
//! - [`generation_client`] - Text/image generation trait and mock client
//! - [`prompts`] - Prompt templates for the three steps
//! - [`orchestrator`] - Pipeline sequencing, progress and retry
//! - [`display`] - Terminal output and the post-generation menu
//! - [`post_actions`] - Clipboard, image saving and the compose URL
//! - [`session`] - Ties the above together for one CLI invocation
//! - [`providers`] - Shared dependency injection traits
//!
//! # Example
//!
//! ```ignore
//! use tweetmaster::credential_store::Credential;
//! use tweetmaster::generation_client::MockGenerationClient;
//! use tweetmaster::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let orchestrator = Orchestrator::new(MockGenerationClient::new());
//!     let credential = Credential::new("my-key");
//!
//!     let mut result = orchestrator.run_full(credential.as_ref(), "coffee").await?;
//!     println!("{}", result.text);
//!
//!     // Not happy with the picture? Keep the text, redo the image.
//!     orchestrator.regenerate_image(credential.as_ref(), &mut result).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod credential_store;
pub mod display;
pub mod error;
pub mod gemini;
pub mod generation_client;
pub mod http_client;
pub mod orchestrator;
pub mod post_actions;
pub mod prompts;
pub mod providers;
pub mod session;
