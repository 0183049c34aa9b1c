use serde::Deserialize;
use std::time::Duration;

/// Column names used to pull fields out of the delimited input files.
/// Field names are configuration, not protocol.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub address: String,
    pub map_url: String,
    pub state: String,
    pub city: String,
    pub canonical_address: String,
    pub scraped_address: String,
}

impl Default for ColumnSpec {
    fn default() -> Self {
        Self {
            name: "Branch Name".to_string(),
            address: "Address".to_string(),
            map_url: "Google Maps Link".to_string(),
            state: "State".to_string(),
            city: "City".to_string(),
            canonical_address: "Address_Line_1__c".to_string(),
            scraped_address: "Address".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Concurrent workers for URL resolution.
    pub worker_count: usize,
    /// Per-request timeout ceiling in seconds.
    pub request_timeout_secs: u64,
    /// Attempts per item before it is marked failed.
    pub retry_attempts: u32,
    /// Incremental backup every N completed items.
    pub checkpoint_interval: usize,
    /// Delay between successive geocoding calls, in milliseconds.
    pub geocode_pacing_ms: u64,
    /// Forward-geocoding API key. Only required for the geocode pass.
    pub geocode_api_key: Option<String>,
    /// Forward-geocoding endpoint. Overridable so tests can point at a mock.
    pub geocode_base_url: String,
    /// Maximum redirects to follow when expanding short links.
    pub max_redirects: usize,
    pub columns: ColumnSpec,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            worker_count: std::env::var("GEO_WORKERS")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("GEO_WORKERS must be a positive integer"))
                .and_then(|n: usize| {
                    if n == 0 {
                        anyhow::bail!("GEO_WORKERS must be at least 1");
                    }
                    Ok(n)
                })?,
            request_timeout_secs: std::env::var("GEO_REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("GEO_REQUEST_TIMEOUT_SECS must be a number"))?,
            retry_attempts: std::env::var("GEO_RETRY_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("GEO_RETRY_ATTEMPTS must be a number"))
                .and_then(|n: u32| {
                    if n == 0 {
                        anyhow::bail!("GEO_RETRY_ATTEMPTS must be at least 1");
                    }
                    Ok(n)
                })?,
            checkpoint_interval: std::env::var("GEO_CHECKPOINT_INTERVAL")
                .unwrap_or_else(|_| "25".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("GEO_CHECKPOINT_INTERVAL must be a number"))
                .and_then(|n: usize| {
                    if n == 0 {
                        anyhow::bail!("GEO_CHECKPOINT_INTERVAL must be at least 1");
                    }
                    Ok(n)
                })?,
            geocode_pacing_ms: std::env::var("GEO_PACING_MS")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("GEO_PACING_MS must be a number"))?,
            geocode_api_key: std::env::var("GEOCODE_API_KEY")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            geocode_base_url: std::env::var("GEOCODE_BASE_URL")
                .unwrap_or_else(|_| {
                    "https://maps.googleapis.com/maps/api/geocode/json".to_string()
                })
                .trim()
                .to_string(),
            max_redirects: std::env::var("GEO_MAX_REDIRECTS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("GEO_MAX_REDIRECTS must be a number"))?,
            columns: ColumnSpec {
                name: std::env::var("GEO_NAME_COLUMN")
                    .unwrap_or_else(|_| "Branch Name".to_string()),
                address: std::env::var("GEO_ADDRESS_COLUMN")
                    .unwrap_or_else(|_| "Address".to_string()),
                map_url: std::env::var("GEO_URL_COLUMN")
                    .unwrap_or_else(|_| "Google Maps Link".to_string()),
                state: std::env::var("GEO_STATE_COLUMN")
                    .unwrap_or_else(|_| "State".to_string()),
                city: std::env::var("GEO_CITY_COLUMN").unwrap_or_else(|_| "City".to_string()),
                canonical_address: std::env::var("GEO_CANONICAL_ADDRESS_COLUMN")
                    .unwrap_or_else(|_| "Address_Line_1__c".to_string()),
                scraped_address: std::env::var("GEO_SCRAPED_ADDRESS_COLUMN")
                    .unwrap_or_else(|_| "Address".to_string()),
            },
        };

        if !config.geocode_base_url.starts_with("http://")
            && !config.geocode_base_url.starts_with("https://")
        {
            anyhow::bail!("GEOCODE_BASE_URL must start with http:// or https://");
        }

        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Workers: {}", config.worker_count);
        tracing::debug!("Request timeout: {}s", config.request_timeout_secs);
        tracing::debug!("Retry attempts: {}", config.retry_attempts);
        tracing::debug!("Checkpoint interval: {}", config.checkpoint_interval);
        tracing::debug!("Geocode base URL: {}", config.geocode_base_url);

        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn geocode_pacing(&self) -> Duration {
        Duration::from_millis(self.geocode_pacing_ms)
    }
}

impl Default for Config {
    /// Built-in defaults, used by tests and as the baseline for `from_env`.
    fn default() -> Self {
        Self {
            worker_count: 4,
            request_timeout_secs: 10,
            retry_attempts: 3,
            checkpoint_interval: 25,
            geocode_pacing_ms: 50,
            geocode_api_key: None,
            geocode_base_url: "https://maps.googleapis.com/maps/api/geocode/json".to_string(),
            max_redirects: 10,
            columns: ColumnSpec::default(),
        }
    }
}
