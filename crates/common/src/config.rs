use std::time::Duration;

use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Etherscan-compatible explorer API base URL
    pub explorer_api_url: String,

    /// Pool of explorer API keys, rotated round-robin
    pub explorer_api_keys: Vec<String>,

    /// Minimum spacing between two uses of the same API key (default: 200)
    pub key_spacing_ms: u64,

    /// Number of recent transactions requested per address (default: 50)
    pub fetch_limit: u32,

    /// Retries after the first failed upstream attempt (default: 3)
    pub fetch_max_retries: u32,

    /// Linear backoff step between retries in milliseconds (default: 1000)
    pub fetch_retry_base_delay_ms: u64,

    /// Per-request timeout in milliseconds (default: 10000)
    pub fetch_timeout_ms: u64,

    /// Delay between poll ticks in milliseconds (default: 1000)
    pub poll_interval_ms: u64,

    /// Interval of the bursting-address summary sweep in seconds (default: 300)
    pub summary_interval_secs: u64,

    /// Maximum concurrent address fetches per tick. `None` means all at once.
    pub fan_out_limit: Option<usize>,

    /// Chain height used when the height fetch fails and no wallet has been observed yet
    pub height_floor: Option<u64>,

    /// Webhook URL for alert delivery. Alerts are only logged when unset.
    pub webhook_url: Option<String>,

    /// Path of the JSON address registry
    pub registry_path: String,

    /// Bind address of the command API
    pub api_bind_addr: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let explorer_api_keys = parse_key_list(
            &std::env::var("EXPLORER_API_KEYS")
                .map_err(|_| anyhow::anyhow!("EXPLORER_API_KEYS environment variable is required"))?,
        );
        if explorer_api_keys.is_empty() {
            anyhow::bail!("EXPLORER_API_KEYS must contain at least one key");
        }

        let config = Self {
            explorer_api_url: std::env::var("EXPLORER_API_URL")
                .unwrap_or_else(|_| "https://api.etherscan.io/api".to_string()),
            explorer_api_keys,
            key_spacing_ms: std::env::var("KEY_SPACING_MS")
                .unwrap_or_else(|_| "200".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("KEY_SPACING_MS must be a valid u64"))?,
            fetch_limit: std::env::var("FETCH_LIMIT")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("FETCH_LIMIT must be a valid u32"))?,
            fetch_max_retries: std::env::var("FETCH_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("FETCH_MAX_RETRIES must be a valid u32"))?,
            fetch_retry_base_delay_ms: std::env::var("FETCH_RETRY_BASE_DELAY_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("FETCH_RETRY_BASE_DELAY_MS must be a valid u64"))?,
            fetch_timeout_ms: std::env::var("FETCH_TIMEOUT_MS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("FETCH_TIMEOUT_MS must be a valid u64"))?,
            poll_interval_ms: std::env::var("POLL_INTERVAL_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("POLL_INTERVAL_MS must be a valid u64"))?,
            summary_interval_secs: std::env::var("SUMMARY_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SUMMARY_INTERVAL_SECS must be a valid u64"))?,
            fan_out_limit: std::env::var("FAN_OUT_LIMIT")
                .ok()
                .map(|v| v.parse())
                .transpose()
                .map_err(|_| anyhow::anyhow!("FAN_OUT_LIMIT must be a valid usize"))?,
            height_floor: std::env::var("HEIGHT_FLOOR")
                .ok()
                .map(|v| v.parse())
                .transpose()
                .map_err(|_| anyhow::anyhow!("HEIGHT_FLOOR must be a valid u64"))?,
            webhook_url: std::env::var("WEBHOOK_URL").ok().filter(|v| !v.is_empty()),
            registry_path: std::env::var("REGISTRY_PATH")
                .unwrap_or_else(|_| "wallets.json".to_string()),
            api_bind_addr: std::env::var("API_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but cannot drive the poller.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.fetch_limit == 0 {
            anyhow::bail!("FETCH_LIMIT must be greater than 0");
        }
        if self.summary_interval_secs == 0 {
            anyhow::bail!("SUMMARY_INTERVAL_SECS must be greater than 0");
        }
        if self.fan_out_limit == Some(0) {
            anyhow::bail!("FAN_OUT_LIMIT must be greater than 0 when set");
        }
        Ok(())
    }

    pub fn key_spacing(&self) -> Duration {
        Duration::from_millis(self.key_spacing_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_retry_base_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn summary_interval(&self) -> Duration {
        Duration::from_secs(self.summary_interval_secs)
    }
}

/// Split a comma-separated key list, dropping blanks.
fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}
