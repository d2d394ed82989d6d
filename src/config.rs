use serde::Deserialize;

use crate::fetcher::MAX_WINDOW_SECONDS;

/// Env vars consulted when the tokens are left empty in the file.
pub const TOKEN_ENV: &str = "UPYUN_TOKEN";
pub const BUCKET_TOKEN_ENV: &str = "UPYUN_BUCKET_TOKEN";


#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upyun: UpyunConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
}

fn default_metrics_path() -> String {
    "/metrics".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpyunConfig {
    /// Token for the statistics endpoints.
    #[serde(default)]
    pub token: String,
    /// Token for the bucket (domain) listing.
    #[serde(default)]
    pub bucket_token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://api.upyun.com".into()
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionConfig {
    /// Window start, seconds before now.
    #[serde(default = "default_range_seconds")]
    pub range_seconds: u64,
    /// Window end, seconds before now (upstream reporting lag).
    #[serde(default = "default_delay_seconds")]
    pub delay_seconds: u64,
    /// How often the domain list is refreshed.
    #[serde(default = "default_domain_refresh_secs")]
    pub domain_refresh_secs: u64,
    /// Also publish account-wide status shares.
    #[serde(default)]
    pub account_health: bool,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            range_seconds: default_range_seconds(),
            delay_seconds: default_delay_seconds(),
            domain_refresh_secs: default_domain_refresh_secs(),
            account_health: false,
        }
    }
}

fn default_range_seconds() -> u64 {
    1800
}

fn default_delay_seconds() -> u64 {
    300
}

fn default_domain_refresh_secs() -> u64 {
    10
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {}", path, e))?;
        let mut config: AppConfig = toml::from_str(&s)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate config from a string (e.g. for tests). Env vars are not consulted.
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Fills empty tokens from the environment lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.upyun.token.is_empty() {
            self.upyun.token = lookup(TOKEN_ENV).unwrap_or_default();
        }
        if self.upyun.bucket_token.is_empty() {
            self.upyun.bucket_token = lookup(BUCKET_TOKEN_ENV).unwrap_or_default();
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            self.server.metrics_path.starts_with('/') && self.server.metrics_path.len() > 1,
            "server.metrics_path must start with '/' and not be the root, got {:?}",
            self.server.metrics_path
        );
        anyhow::ensure!(
            !self.upyun.token.is_empty(),
            "upyun.token must be non-empty (or set {})",
            TOKEN_ENV
        );
        anyhow::ensure!(
            !self.upyun.bucket_token.is_empty(),
            "upyun.bucket_token must be non-empty (or set {})",
            BUCKET_TOKEN_ENV
        );
        anyhow::ensure!(
            self.upyun.api_base.starts_with("http://") || self.upyun.api_base.starts_with("https://"),
            "upyun.api_base must be an http(s) URL, got {:?}",
            self.upyun.api_base
        );
        anyhow::ensure!(
            self.upyun.request_timeout_secs > 0,
            "upyun.request_timeout_secs must be > 0, got {}",
            self.upyun.request_timeout_secs
        );
        anyhow::ensure!(
            self.collection.range_seconds > self.collection.delay_seconds,
            "collection.range_seconds must be greater than collection.delay_seconds, got {} <= {}",
            self.collection.range_seconds,
            self.collection.delay_seconds
        );
        anyhow::ensure!(
            self.collection.range_seconds <= MAX_WINDOW_SECONDS,
            "collection.range_seconds must be <= {}, got {}",
            MAX_WINDOW_SECONDS,
            self.collection.range_seconds
        );
        anyhow::ensure!(
            self.collection.domain_refresh_secs > 0,
            "collection.domain_refresh_secs must be > 0, got {}",
            self.collection.domain_refresh_secs
        );
        Ok(())
    }
}
