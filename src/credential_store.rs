//! Durable storage for the Gemini API key.
//!
//! The key lives in a small JSON document named after a fixed namespace
//! inside the config directory:
//!
//! ```json
//! { "geminiApiKey": "AIza..." }
//! ```
//!
//! The store only loads and saves. Callers resolve the credential once and
//! pass it to the orchestrator explicitly.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Namespace of the persisted entry.
pub const STORE_NAMESPACE: &str = "tweetmaster-api-keys";

/// Environment variable that overrides the stored key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// An opaque API key.
///
/// `Debug` never prints the key itself.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a key. Blank input yields `None`; nothing else is validated.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Get/set/clear access to the single stored credential.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Result<Option<Credential>>;
    fn set(&self, value: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredKeys {
    #[serde(default)]
    gemini_api_key: Option<String>,
}

/// File-backed store under the config directory.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Store whose file lives inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(format!("{}.json", STORE_NAMESPACE)),
        }
    }

    /// Store at the default location, `~/.tweetmaster/`.
    pub fn open_default() -> Result<Self> {
        let dir = crate::config::Config::get_config_dir()?;
        Ok(Self::in_dir(&dir))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StoredKeys> {
        if !self.path.exists() {
            debug!("No credential file at {}", self.path.display());
            return Ok(StoredKeys::default());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let keys = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(keys)
    }

    fn write(&self, keys: &StoredKeys) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(keys)?;
        fs::write(&self.path, content)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Result<Option<Credential>> {
        Ok(self.read()?.gemini_api_key.and_then(Credential::new))
    }

    fn set(&self, value: &str) -> Result<()> {
        self.write(&StoredKeys {
            gemini_api_key: Some(value.to_string()),
        })?;
        info!("Saved API key to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.write(&StoredKeys {
            gemini_api_key: None,
        })?;
        info!("Cleared API key in {}", self.path.display());
        Ok(())
    }
}

/// Process-local store for tests.
#[derive(Default)]
pub struct MemoryCredentialStore {
    value: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Result<Option<Credential>> {
        let value = self
            .value
            .lock()
            .map_err(|_| anyhow::anyhow!("credential store lock poisoned"))?;
        Ok(value.clone().and_then(Credential::new))
    }

    fn set(&self, value: &str) -> Result<()> {
        let mut slot = self
            .value
            .lock()
            .map_err(|_| anyhow::anyhow!("credential store lock poisoned"))?;
        *slot = Some(value.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self
            .value
            .lock()
            .map_err(|_| anyhow::anyhow!("credential store lock poisoned"))?;
        *slot = None;
        Ok(())
    }
}

/// Resolves the credential for a run: a non-blank `override_value` (normally
/// the `GEMINI_API_KEY` variable) wins over the stored key.
pub fn resolve_credential(
    store: &dyn CredentialStore,
    override_value: Option<String>,
) -> Result<Option<Credential>> {
    if let Some(credential) = override_value.and_then(Credential::new) {
        debug!("Using API key from {}", API_KEY_ENV);
        return Ok(Some(credential));
    }
    store.get()
}
