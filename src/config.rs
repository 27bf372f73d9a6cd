use crate::assistant::{AssistantSettings, PollPolicy};
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;

/// Default content API root of the lab platform.
pub const DEFAULT_CONTENT_BASE_URL: &str = "https://us-central1-olab-46253.cloudfunctions.net/app";

/// Account whose labs `get_lab` reads.
pub const DEFAULT_LAB_ACCOUNT_ID: &str = "1065649585";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Host to bind
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Enable rate limiting
    #[arg(long, env = "RATE_LIMIT_ENABLED")]
    pub rate_limit_enabled: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub assistant: AssistantConfig,
    pub content: ContentConfig,
    pub resilience: ResilienceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Deserialize, Clone)]
pub struct AssistantConfig {
    pub api_key: String,
    pub base_url: String,
    pub poll_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub retry_backoff_ms: u64,
    pub max_retries: u32,
}

impl std::fmt::Debug for AssistantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantConfig")
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("base_url", &self.base_url)
            .field("poll_timeout_ms", &self.poll_timeout_ms)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl AssistantConfig {
    pub fn settings(&self) -> AssistantSettings {
        AssistantSettings {
            base_url: self.base_url.clone(),
            api_key: Some(self.api_key.clone()).filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            timeout: Duration::from_millis(self.poll_timeout_ms),
            interval: Duration::from_millis(self.poll_interval_ms),
            max_retries: self.max_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContentConfig {
    pub base_url: String,
    pub account_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResilienceConfig {
    pub rate_limit_enabled: bool,
    pub rate_limit_max: u32,
    pub rate_limit_window_secs: u64,
    pub request_timeout_secs: u64,
}

/// Plain environment variables recognized alongside the `RELAY_` prefix.
const PLAIN_ENV_OVERRIDES: &[(&str, &str)] = &[
    ("OPENAI_API_KEY", "assistant.api_key"),
    ("ASSISTANT_TIMEOUT_MS", "assistant.poll_timeout_ms"),
    ("ASSISTANT_MAX_RETRIES", "assistant.max_retries"),
    ("CONTENT_API_BASE_URL", "content.base_url"),
];

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("assistant.api_key", "")?
            .set_default("assistant.base_url", "https://api.openai.com")?
            .set_default("assistant.poll_timeout_ms", 30_000)?
            .set_default("assistant.poll_interval_ms", 1_000)?
            .set_default("assistant.retry_backoff_ms", 2_000)?
            .set_default("assistant.max_retries", 3)?
            .set_default("content.base_url", DEFAULT_CONTENT_BASE_URL)?
            .set_default("content.account_id", DEFAULT_LAB_ACCOUNT_ID)?
            .set_default("resilience.rate_limit_enabled", true)?
            .set_default("resilience.rate_limit_max", 100)?
            .set_default("resilience.rate_limit_window_secs", 60)?
            .set_default("resilience.request_timeout_secs", 120)?;

        // 2. Config file: explicit path, else ./config.yaml when present
        if let Some(path) = &cli.config {
            builder = builder.add_source(File::with_name(path));
        } else if Path::new("config.yaml").exists() {
            builder = builder.add_source(File::with_name("config.yaml"));
        }

        // 3. Environment variables prefixed with RELAY_, e.g. RELAY_SERVER__PORT=8000
        builder = builder.add_source(
            Environment::with_prefix("RELAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // 4. Plain environment variables
        for (var, key) in PLAIN_ENV_OVERRIDES {
            if let Ok(val) = env::var(var) {
                if !val.trim().is_empty() {
                    builder = builder.set_override(*key, val)?;
                }
            }
        }

        // 5. CLI flags (clap also resolves PORT, HOST, ... here)
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", port)?;
        }
        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(rl) = cli.rate_limit_enabled {
            builder = builder.set_override("resilience.rate_limit_enabled", rl)?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }
}
