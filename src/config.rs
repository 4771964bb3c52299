//! Configuration management for bulario.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::scrapers::circuit_breaker::{
    CircuitBreakerConfig, DEFAULT_FAILURE_RATE_THRESHOLD, DEFAULT_HALF_OPEN_PROBES,
    DEFAULT_MINIMUM_CALLS, DEFAULT_WAIT_IN_OPEN, DEFAULT_WINDOW_SIZE,
};
use crate::scrapers::http_client::{DEFAULT_BACKOFF_BASE, DEFAULT_MAX_ATTEMPTS};
use crate::scrapers::rate_limiter::{DEFAULT_CAPACITY, DEFAULT_REFILL_PERIOD};

/// Default upstream portal.
pub const DEFAULT_BASE_URL: &str = "https://consultas.anvisa.gov.br";

/// Default request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default bounds for the randomized delay between requests, in milliseconds.
pub const DEFAULT_DELAY_MIN_MS: u64 = 1000;
pub const DEFAULT_DELAY_MAX_MS: u64 = 3000;

/// Default cache lifetimes, in minutes.
pub const DEFAULT_SEARCH_TTL_MINUTES: u64 = 360;
pub const DEFAULT_MEDICINE_TTL_MINUTES: u64 = 1440;
pub const DEFAULT_LEAFLET_TTL_MINUTES: u64 = 10080; // 7 days

/// Default interval between expired-entry sweeps, in seconds (once per day).
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 86400;

/// Runtime settings with all values resolved.
///
/// Built by [`load_settings`] from defaults, an optional config file, and
/// `BULARIO_*` environment variables, in that order of precedence.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Base URL of the consulta portal.
    pub base_url: String,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Minimum delay before each request, in milliseconds.
    pub delay_min_ms: u64,
    /// Maximum delay before each request, in milliseconds.
    pub delay_max_ms: u64,
    /// Attempts per request, including the first.
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts, in milliseconds.
    pub backoff_base_ms: u64,
    /// Requests admitted per refill period.
    pub rate_limit_capacity: u32,
    /// Refill period of the request budget, in seconds.
    pub rate_limit_period_secs: u64,
    /// Circuit breaker: outcomes in the sliding window.
    pub breaker_window_size: usize,
    /// Circuit breaker: outcomes required before the rate is evaluated.
    pub breaker_minimum_calls: usize,
    /// Circuit breaker: failure rate at or above which the circuit opens.
    pub breaker_failure_rate: f64,
    /// Circuit breaker: seconds spent open before admitting probes.
    pub breaker_wait_secs: u64,
    /// Circuit breaker: probe calls admitted while half-open.
    pub breaker_half_open_probes: usize,
    /// Lifetime of cached search results, in minutes.
    pub search_ttl_minutes: u64,
    /// Lifetime of cached medicine records, in minutes.
    pub medicine_ttl_minutes: u64,
    /// Lifetime of cached leaflets, in minutes.
    pub leaflet_ttl_minutes: u64,
    /// Interval between background sweeps of expired entries, in seconds.
    pub sweep_interval_secs: u64,
    /// File with one user agent per line. None uses the built-in pool.
    pub user_agents_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT_SECS,
            delay_min_ms: DEFAULT_DELAY_MIN_MS,
            delay_max_ms: DEFAULT_DELAY_MAX_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE.as_millis() as u64,
            rate_limit_capacity: DEFAULT_CAPACITY,
            rate_limit_period_secs: DEFAULT_REFILL_PERIOD.as_secs(),
            breaker_window_size: DEFAULT_WINDOW_SIZE,
            breaker_minimum_calls: DEFAULT_MINIMUM_CALLS,
            breaker_failure_rate: DEFAULT_FAILURE_RATE_THRESHOLD,
            breaker_wait_secs: DEFAULT_WAIT_IN_OPEN.as_secs(),
            breaker_half_open_probes: DEFAULT_HALF_OPEN_PROBES,
            search_ttl_minutes: DEFAULT_SEARCH_TTL_MINUTES,
            medicine_ttl_minutes: DEFAULT_MEDICINE_TTL_MINUTES,
            leaflet_ttl_minutes: DEFAULT_LEAFLET_TTL_MINUTES,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            user_agents_file: None,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn delay_min(&self) -> Duration {
        Duration::from_millis(self.delay_min_ms)
    }

    pub fn delay_max(&self) -> Duration {
        Duration::from_millis(self.delay_max_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn rate_limit_period(&self) -> Duration {
        Duration::from_secs(self.rate_limit_period_secs)
    }

    pub fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.search_ttl_minutes * 60)
    }

    pub fn medicine_ttl(&self) -> Duration {
        Duration::from_secs(self.medicine_ttl_minutes * 60)
    }

    pub fn leaflet_ttl(&self) -> Duration {
        Duration::from_secs(self.leaflet_ttl_minutes * 60)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Breaker tunables assembled from the flat settings fields.
    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            window_size: self.breaker_window_size,
            minimum_calls: self.breaker_minimum_calls,
            failure_rate_threshold: self.breaker_failure_rate,
            wait_in_open: Duration::from_secs(self.breaker_wait_secs),
            half_open_probes: self.breaker_half_open_probes,
        }
    }
}

/// Configuration file structure.
///
/// Every field is optional; absent fields keep their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the consulta portal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    /// Minimum delay before each request, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_min_ms: Option<u64>,
    /// Maximum delay before each request, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_max_ms: Option<u64>,
    /// Attempts per request, including the first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    /// Base delay for exponential backoff, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_base_ms: Option<u64>,
    /// Requests admitted per refill period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_capacity: Option<u32>,
    /// Refill period of the request budget, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_period_secs: Option<u64>,
    /// Circuit breaker sliding window size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breaker_window_size: Option<usize>,
    /// Circuit breaker minimum calls before evaluation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breaker_minimum_calls: Option<usize>,
    /// Circuit breaker failure rate threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breaker_failure_rate: Option<f64>,
    /// Circuit breaker open wait, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breaker_wait_secs: Option<u64>,
    /// Circuit breaker half-open probe budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breaker_half_open_probes: Option<usize>,
    /// Lifetime of cached search results, in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_ttl_minutes: Option<u64>,
    /// Lifetime of cached medicine records, in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medicine_ttl_minutes: Option<u64>,
    /// Lifetime of cached leaflets, in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaflet_ttl_minutes: Option<u64>,
    /// Interval between background sweeps, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep_interval_secs: Option<u64>,
    /// File with one user agent per line, relative paths resolved against
    /// the config file's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agents_file: Option<String>,

    /// Path this config was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a specific file path.
    /// Supports TOML and JSON based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    /// Returns the config file's parent directory if available, otherwise None.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Apply config file values to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref base_url) = self.base_url {
            settings.base_url = base_url.clone();
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(min) = self.delay_min_ms {
            settings.delay_min_ms = min;
        }
        if let Some(max) = self.delay_max_ms {
            settings.delay_max_ms = max;
        }
        if let Some(attempts) = self.max_attempts {
            settings.max_attempts = attempts;
        }
        if let Some(base) = self.backoff_base_ms {
            settings.backoff_base_ms = base;
        }
        if let Some(capacity) = self.rate_limit_capacity {
            settings.rate_limit_capacity = capacity;
        }
        if let Some(period) = self.rate_limit_period_secs {
            settings.rate_limit_period_secs = period;
        }
        if let Some(window) = self.breaker_window_size {
            settings.breaker_window_size = window;
        }
        if let Some(minimum) = self.breaker_minimum_calls {
            settings.breaker_minimum_calls = minimum;
        }
        if let Some(rate) = self.breaker_failure_rate {
            settings.breaker_failure_rate = rate;
        }
        if let Some(wait) = self.breaker_wait_secs {
            settings.breaker_wait_secs = wait;
        }
        if let Some(probes) = self.breaker_half_open_probes {
            settings.breaker_half_open_probes = probes;
        }
        if let Some(ttl) = self.search_ttl_minutes {
            settings.search_ttl_minutes = ttl;
        }
        if let Some(ttl) = self.medicine_ttl_minutes {
            settings.medicine_ttl_minutes = ttl;
        }
        if let Some(ttl) = self.leaflet_ttl_minutes {
            settings.leaflet_ttl_minutes = ttl;
        }
        if let Some(interval) = self.sweep_interval_secs {
            settings.sweep_interval_secs = interval;
        }
        if let Some(ref file) = self.user_agents_file {
            settings.user_agents_file = Some(resolve_path(file, base_dir));
        }
    }
}

/// Resolve settings from defaults, an optional config file, and the
/// environment, in that order of precedence.
///
/// An explicitly passed config path that fails to load is an error; when no
/// path is given, `bulario.toml` / `bulario.json` in the working directory
/// are tried and silently skipped if absent.
pub async fn load_settings(config_path: Option<&Path>) -> Result<Settings, String> {
    let mut settings = Settings::default();

    if let Some(path) = config_path {
        let config = Config::load_from_path(path).await?;
        let base_dir = config.base_dir().unwrap_or_else(|| PathBuf::from("."));
        config.apply_to_settings(&mut settings, &base_dir);
    } else if let Some(path) = find_default_config() {
        tracing::debug!("Found config file: {}", path.display());
        let config = Config::load_from_path(&path).await?;
        let base_dir = config.base_dir().unwrap_or_else(|| PathBuf::from("."));
        config.apply_to_settings(&mut settings, &base_dir);
    }

    apply_env_overrides(&mut settings);

    url::Url::parse(&settings.base_url)
        .map_err(|e| format!("Invalid base_url '{}': {}", settings.base_url, e))?;

    Ok(settings)
}

/// Look for a config file next to the working directory.
fn find_default_config() -> Option<PathBuf> {
    for name in ["bulario.toml", "bulario.json"] {
        let path = PathBuf::from(name);
        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Apply `BULARIO_*` environment variable overrides.
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Some(url) = env_string("BULARIO_BASE_URL") {
        settings.base_url = url;
    }
    if let Some(v) = env_parse("BULARIO_REQUEST_TIMEOUT") {
        settings.request_timeout = v;
    }
    if let Some(v) = env_parse("BULARIO_DELAY_MIN_MS") {
        settings.delay_min_ms = v;
    }
    if let Some(v) = env_parse("BULARIO_DELAY_MAX_MS") {
        settings.delay_max_ms = v;
    }
    if let Some(v) = env_parse("BULARIO_MAX_ATTEMPTS") {
        settings.max_attempts = v;
    }
    if let Some(v) = env_parse("BULARIO_BACKOFF_BASE_MS") {
        settings.backoff_base_ms = v;
    }
    if let Some(v) = env_parse("BULARIO_RATE_LIMIT_CAPACITY") {
        settings.rate_limit_capacity = v;
    }
    if let Some(v) = env_parse("BULARIO_RATE_LIMIT_PERIOD_SECS") {
        settings.rate_limit_period_secs = v;
    }
    if let Some(v) = env_parse("BULARIO_BREAKER_WINDOW_SIZE") {
        settings.breaker_window_size = v;
    }
    if let Some(v) = env_parse("BULARIO_BREAKER_MINIMUM_CALLS") {
        settings.breaker_minimum_calls = v;
    }
    if let Some(v) = env_parse("BULARIO_BREAKER_FAILURE_RATE") {
        settings.breaker_failure_rate = v;
    }
    if let Some(v) = env_parse("BULARIO_BREAKER_WAIT_SECS") {
        settings.breaker_wait_secs = v;
    }
    if let Some(v) = env_parse("BULARIO_BREAKER_HALF_OPEN_PROBES") {
        settings.breaker_half_open_probes = v;
    }
    if let Some(v) = env_parse("BULARIO_SEARCH_TTL_MINUTES") {
        settings.search_ttl_minutes = v;
    }
    if let Some(v) = env_parse("BULARIO_MEDICINE_TTL_MINUTES") {
        settings.medicine_ttl_minutes = v;
    }
    if let Some(v) = env_parse("BULARIO_LEAFLET_TTL_MINUTES") {
        settings.leaflet_ttl_minutes = v;
    }
    if let Some(v) = env_parse("BULARIO_SWEEP_INTERVAL_SECS") {
        settings.sweep_interval_secs = v;
    }
    if let Some(file) = env_string("BULARIO_USER_AGENTS_FILE") {
        settings.user_agents_file = Some(PathBuf::from(file));
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env_string(name)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring {}: could not parse {:?}", name, raw);
            None
        }
    }
}

fn resolve_path(path: &str, base_dir: &Path) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_component_constants() {
        let settings = Settings::default();
        assert_eq!(settings.base_url, "https://consultas.anvisa.gov.br");
        assert_eq!(settings.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(settings.rate_limit_capacity, DEFAULT_CAPACITY);
        assert_eq!(settings.breaker_window_size, DEFAULT_WINDOW_SIZE);
        assert_eq!(settings.leaflet_ttl_minutes, 10080);
    }

    #[test]
    fn toml_config_applies_over_defaults() {
        let config: Config = toml::from_str(
            r#"
            base_url = "https://example.test"
            request_timeout = 10
            breaker_failure_rate = 0.75
            user_agents_file = "agents.txt"
            "#,
        )
        .unwrap();

        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, Path::new("/etc/bulario"));

        assert_eq!(settings.base_url, "https://example.test");
        assert_eq!(settings.request_timeout, 10);
        assert_eq!(settings.breaker_failure_rate, 0.75);
        assert_eq!(
            settings.user_agents_file,
            Some(PathBuf::from("/etc/bulario/agents.txt"))
        );
        // Untouched fields keep their defaults.
        assert_eq!(settings.delay_min_ms, DEFAULT_DELAY_MIN_MS);
    }

    #[test]
    fn json_config_parses() {
        let config: Config =
            serde_json::from_str(r#"{"max_attempts": 5, "search_ttl_minutes": 15}"#).unwrap();

        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, Path::new("."));

        assert_eq!(settings.max_attempts, 5);
        assert_eq!(settings.search_ttl_minutes, 15);
    }

    #[tokio::test]
    async fn load_settings_rejects_unparseable_base_url() {
        let path = std::env::temp_dir().join("bulario-config-bad-url-test.toml");
        tokio::fs::write(&path, "base_url = \"not a url\"\n")
            .await
            .unwrap();

        let result = load_settings(Some(&path)).await;
        assert!(result.is_err());

        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn load_from_path_rejects_malformed_toml() {
        let path = std::env::temp_dir().join("bulario-config-malformed-test.toml");
        tokio::fs::write(&path, "base_url = ").await.unwrap();

        let result = Config::load_from_path(&path).await;
        assert!(result.is_err());

        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn load_from_path_resolves_relative_user_agents_file() {
        let dir = std::env::temp_dir();
        let path = dir.join("bulario-config-ua-test.toml");
        tokio::fs::write(&path, "user_agents_file = \"agents.txt\"\n")
            .await
            .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        let mut settings = Settings::default();
        let base_dir = config.base_dir().unwrap();
        config.apply_to_settings(&mut settings, &base_dir);

        assert_eq!(settings.user_agents_file, Some(dir.join("agents.txt")));

        tokio::fs::remove_file(&path).await.ok();
    }

    #[test]
    fn env_parse_ignores_garbage() {
        std::env::set_var("BULARIO_TEST_GARBAGE_VALUE", "not-a-number");
        let parsed: Option<u64> = env_parse("BULARIO_TEST_GARBAGE_VALUE");
        assert!(parsed.is_none());
        std::env::remove_var("BULARIO_TEST_GARBAGE_VALUE");
    }

    #[test]
    fn breaker_env_overrides_apply() {
        std::env::set_var("BULARIO_BREAKER_WINDOW_SIZE", "8");
        std::env::set_var("BULARIO_BREAKER_MINIMUM_CALLS", "4");
        std::env::set_var("BULARIO_BREAKER_FAILURE_RATE", "0.25");
        std::env::set_var("BULARIO_BREAKER_WAIT_SECS", "5");
        std::env::set_var("BULARIO_BREAKER_HALF_OPEN_PROBES", "1");

        let mut settings = Settings::default();
        apply_env_overrides(&mut settings);

        assert_eq!(settings.breaker_window_size, 8);
        assert_eq!(settings.breaker_minimum_calls, 4);
        assert_eq!(settings.breaker_failure_rate, 0.25);
        assert_eq!(settings.breaker_wait_secs, 5);
        assert_eq!(settings.breaker_half_open_probes, 1);

        for name in [
            "BULARIO_BREAKER_WINDOW_SIZE",
            "BULARIO_BREAKER_MINIMUM_CALLS",
            "BULARIO_BREAKER_FAILURE_RATE",
            "BULARIO_BREAKER_WAIT_SECS",
            "BULARIO_BREAKER_HALF_OPEN_PROBES",
        ] {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn durations_convert_from_flat_fields() {
        let settings = Settings {
            search_ttl_minutes: 2,
            breaker_wait_secs: 7,
            ..Default::default()
        };
        assert_eq!(settings.search_ttl(), Duration::from_secs(120));
        assert_eq!(
            settings.circuit_breaker_config().wait_in_open,
            Duration::from_secs(7)
        );
    }
}
