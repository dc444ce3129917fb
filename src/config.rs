use anyhow::{Context, Result, anyhow};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub use_mock: bool,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_retry_delay_secs() -> u64 {
    DEFAULT_RETRY_DELAY_SECS
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            use_mock: false,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            output_dir: None,
            api_base: default_api_base(),
        }
    }
}

impl Config {
    /// Load configuration from file, environment variables, or create default
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file().unwrap_or_else(|_| {
            info!("No config file found, using defaults");
            Self::default()
        });

        // Environment variables override config file
        if std::env::var("TWEETMASTER_USE_MOCK").is_ok() {
            config.use_mock = true;
        }

        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        if config_path.exists() {
            let config = Self::load_from_path(&config_path)?;
            info!("Loaded config from: {}", config_path.display());
            Ok(config)
        } else {
            Err(anyhow!("Config file not found"))
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("config.toml"))
    }

    pub fn get_config_dir() -> Result<PathBuf> {
        let home = home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(home.join(".tweetmaster"))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Directory generated images are saved to; the working directory unless configured.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn is_mock_mode(&self) -> bool {
        self.use_mock
    }

    pub fn show_config_info(&self, api_key_set: bool) -> Result<()> {
        let config_path = Self::get_config_path()?;
        println!("設定ファイル: {}", config_path.display());
        println!(
            "状態: {}",
            if config_path.exists() { "読み込み済み" } else { "見つかりません (デフォルト値を使用)" }
        );
        println!("APIキー: {}", if api_key_set { "設定済み" } else { "未設定" });
        println!("モックモード: {}", self.use_mock);
        println!("リトライ待機時間: {}秒", self.retry_delay_secs);
        println!("画像の保存先: {}", self.output_dir().display());
        println!("APIベースURL: {}", self.api_base);

        println!("\nAPIキーを設定するには:");
        println!("  tweetmaster --set-api-key <your-key>");
        println!("\nまたは環境変数を設定してください:");
        println!("  export GEMINI_API_KEY=<your-key>");

        Ok(())
    }
}
