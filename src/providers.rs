//! Shared provider traits for dependency injection.

/// Trait for providing timestamps.
///
/// Saved images are named after the current time, so tests inject a fixed
/// clock to get predictable file names.
///
/// # Example
///
/// ```
/// use tweetmaster::providers::{TimeProvider, SystemTimeProvider};
///
/// let provider = SystemTimeProvider;
/// assert!(provider.now_millis() > 0);
/// ```
pub trait TimeProvider: Send + Sync {
    /// Returns the current Unix timestamp in milliseconds.
    fn now_millis(&self) -> u128;
}

/// Time provider backed by the system clock.
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> u128 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0)
    }
}
