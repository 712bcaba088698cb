//! Environment-based configuration.
//!
//! Values are read from `TWSE_*` variables (after loading `.env`), then the
//! CLI may override the instrument list, lookback and output directory.

use std::path::PathBuf;
use std::time::Duration;

use twse_data::{FetchConfig, InstrumentCode, TransportOptions};

use crate::error::{CollectorError, Result};

/// Instruments downloaded when none are given.
pub const DEFAULT_SYMBOLS: &str = "0050,00830,00670L";

/// Collector settings
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Instrument codes to download
    pub symbols: Vec<String>,
    /// Lookback window in years
    pub lookback_years: u32,
    /// Directory receiving `<code>.csv`
    pub output_dir: PathBuf,
    /// Request and pacing settings
    pub fetch: FetchSettings,
    /// Retry once without certificate checks after a TLS failure
    pub allow_insecure_fallback: bool,
}

/// Request and pacing settings
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub base_url: String,
    /// Attempts per month
    pub max_attempts: u32,
    /// Delay after a failed attempt (milliseconds)
    pub retry_delay_ms: u64,
    /// Delay between consecutive months (milliseconds)
    pub request_delay_ms: u64,
    /// Per-attempt timeout (seconds)
    pub timeout_secs: u64,
    pub user_agent: String,
}

/// CLI values that take precedence over the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub symbols: Vec<String>,
    pub years: Option<u32>,
    pub output_dir: Option<PathBuf>,
}

impl CollectorConfig {
    /// Load settings from the environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through `lookup`, falling back to defaults for missing
    /// or unparsable values.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = FetchConfig::default();
        let symbols = lookup("TWSE_SYMBOLS").unwrap_or_else(|| DEFAULT_SYMBOLS.to_string());

        Self {
            symbols: split_symbols(&symbols),
            lookback_years: env_var_parse(&lookup, "TWSE_LOOKBACK_YEARS", 10),
            output_dir: lookup("TWSE_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            fetch: FetchSettings {
                base_url: lookup("TWSE_BASE_URL").unwrap_or(defaults.base_url),
                max_attempts: env_var_parse(&lookup, "TWSE_MAX_ATTEMPTS", defaults.max_attempts)
                    .max(1),
                retry_delay_ms: env_var_parse(&lookup, "TWSE_RETRY_DELAY_MS", 400),
                request_delay_ms: env_var_parse(&lookup, "TWSE_REQUEST_DELAY_MS", 400),
                timeout_secs: env_var_parse(&lookup, "TWSE_TIMEOUT_SECS", 30),
                user_agent: lookup("TWSE_USER_AGENT").unwrap_or(defaults.user_agent),
            },
            allow_insecure_fallback: env_var_bool(&lookup, "TWSE_ALLOW_INSECURE_FALLBACK", true),
        }
    }

    /// Apply CLI overrides. An empty symbol list keeps the configured one.
    pub fn apply(&mut self, overrides: Overrides) {
        let symbols: Vec<String> = overrides
            .symbols
            .iter()
            .flat_map(|s| split_symbols(s))
            .collect();
        if !symbols.is_empty() {
            self.symbols = symbols;
        }
        if let Some(years) = overrides.years {
            self.lookback_years = years;
        }
        if let Some(dir) = overrides.output_dir {
            self.output_dir = dir;
        }
    }

    /// Validated instrument codes, in configured order without repeats.
    pub fn instruments(&self) -> Result<Vec<InstrumentCode>> {
        let mut codes: Vec<InstrumentCode> = Vec::with_capacity(self.symbols.len());
        for symbol in &self.symbols {
            let code = InstrumentCode::new(symbol).map_err(|e| {
                CollectorError::Config(format!("invalid instrument {:?}: {}", symbol, e))
            })?;
            if !codes.contains(&code) {
                codes.push(code);
            }
        }

        if codes.is_empty() {
            return Err(CollectorError::Config("no instruments configured".to_string()));
        }
        Ok(codes)
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            base_url: self.fetch.base_url.clone(),
            max_attempts: self.fetch.max_attempts.max(1),
            retry_delay: self.fetch.retry_delay(),
            month_delay: self.fetch.request_delay(),
            timeout: self.fetch.timeout(),
            user_agent: self.fetch.user_agent.clone(),
        }
    }

    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            user_agent: self.fetch.user_agent.clone(),
            allow_insecure_fallback: self.allow_insecure_fallback,
        }
    }
}

impl FetchSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Split a symbol list on commas and whitespace.
fn split_symbols(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a variable, using `default` when missing or invalid.
fn env_var_parse<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parse a boolean variable (`true`/`1` or `false`/`0`).
fn env_var_bool<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).as_deref().map(str::trim) {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> CollectorConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CollectorConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);

        assert_eq!(config.symbols, vec!["0050", "00830", "00670L"]);
        assert_eq!(config.lookback_years, 10);
        assert_eq!(config.output_dir, PathBuf::from("."));
        assert!(config.allow_insecure_fallback);

        let fetch = config.fetch_config();
        assert_eq!(fetch.base_url, "https://www.twse.com.tw/exchangeReport/STOCK_DAY");
        assert_eq!(fetch.max_attempts, 3);
        assert_eq!(fetch.retry_delay, Duration::from_millis(400));
        assert_eq!(fetch.month_delay, Duration::from_millis(400));
        assert_eq!(fetch.timeout, Duration::from_secs(30));
        assert_eq!(fetch.user_agent, "Mozilla/5.0");
    }

    #[test]
    fn test_environment_values() {
        let config = config_from(&[
            ("TWSE_SYMBOLS", "2330, 0050"),
            ("TWSE_LOOKBACK_YEARS", "2"),
            ("TWSE_OUTPUT_DIR", "/tmp/closes"),
            ("TWSE_MAX_ATTEMPTS", "5"),
            ("TWSE_REQUEST_DELAY_MS", "1000"),
            ("TWSE_ALLOW_INSECURE_FALLBACK", "false"),
        ]);

        assert_eq!(config.symbols, vec!["2330", "0050"]);
        assert_eq!(config.lookback_years, 2);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/closes"));
        assert_eq!(config.fetch.max_attempts, 5);
        assert_eq!(config.fetch.request_delay(), Duration::from_secs(1));
        assert!(!config.transport_options().allow_insecure_fallback);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("TWSE_LOOKBACK_YEARS", "ten"),
            ("TWSE_MAX_ATTEMPTS", "0"),
            ("TWSE_ALLOW_INSECURE_FALLBACK", "maybe"),
        ]);

        assert_eq!(config.lookback_years, 10);
        assert_eq!(config.fetch.max_attempts, 1);
        assert!(config.allow_insecure_fallback);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = config_from(&[("TWSE_LOOKBACK_YEARS", "3")]);
        config.apply(Overrides {
            symbols: vec!["2330".to_string(), "0056,00878".to_string()],
            years: Some(1),
            output_dir: Some(PathBuf::from("out")),
        });

        assert_eq!(config.symbols, vec!["2330", "0056", "00878"]);
        assert_eq!(config.lookback_years, 1);
        assert_eq!(config.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_empty_override_keeps_symbols() {
        let mut config = config_from(&[]);
        config.apply(Overrides::default());
        assert_eq!(config.symbols.len(), 3);
        assert_eq!(config.lookback_years, 10);
    }

    #[test]
    fn test_instruments_dedupe_and_validate() {
        let config = config_from(&[("TWSE_SYMBOLS", "0050 0050 00830")]);
        let codes: Vec<String> = config
            .instruments()
            .unwrap()
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(codes, vec!["0050", "00830"]);

        let bad = config_from(&[("TWSE_SYMBOLS", "../etc")]);
        assert!(matches!(bad.instruments(), Err(CollectorError::Config(_))));

        let none = config_from(&[("TWSE_SYMBOLS", " , ")]);
        assert!(matches!(none.instruments(), Err(CollectorError::Config(_))));
    }
}
