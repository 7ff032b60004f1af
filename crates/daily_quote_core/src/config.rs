//! Engine configuration.
//!
//! # Invariants
//! - One `EngineConfig` is built at startup and shared by every service, so
//!   the day boundary never varies per request.

use chrono_tz::Tz;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_EXCLUSION_WINDOW_DAYS: u32 = 30;
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

pub const ENV_TIMEZONE: &str = "DAILY_QUOTE_TZ";
pub const ENV_WINDOW_DAYS: &str = "DAILY_QUOTE_WINDOW_DAYS";
pub const ENV_PIN_STRATEGY: &str = "DAILY_QUOTE_PIN_STRATEGY";

/// How the selection path resolves concurrent first reads of a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PinStrategy {
    /// Clear-then-set on every pin. Exclusivity always holds; concurrent
    /// first reads may flap between candidates.
    #[default]
    LastWriterWins,
    /// Pin only when nothing is pinned for the day yet; losers adopt the
    /// winner's quote.
    CompareAndSwap,
}

impl PinStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LastWriterWins => "last_writer_wins",
            Self::CompareAndSwap => "compare_and_swap",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "last_writer_wins" | "lww" => Ok(Self::LastWriterWins),
            "compare_and_swap" | "cas" => Ok(Self::CompareAndSwap),
            other => Err(ConfigError::InvalidPinStrategy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidTimezone(String),
    InvalidWindowDays(String),
    InvalidPinStrategy(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTimezone(value) => write!(f, "unknown timezone `{value}`"),
            Self::InvalidWindowDays(value) => {
                write!(f, "exclusion window must be a non-negative integer, got `{value}`")
            }
            Self::InvalidPinStrategy(value) => write!(
                f,
                "unsupported pin strategy `{value}`; expected last_writer_wins|compare_and_swap"
            ),
        }
    }
}

impl Error for ConfigError {}

/// Settings shared by the selection policy and the admin surface.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Trailing days (inclusive of the boundary day) during which a chosen
    /// quote is not eligible again.
    pub exclusion_window_days: u32,
    /// Timezone used to derive the `DateKey`.
    pub timezone: Tz,
    pub pin_strategy: PinStrategy,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            exclusion_window_days: DEFAULT_EXCLUSION_WINDOW_DAYS,
            timezone: chrono_tz::UTC,
            pin_strategy: PinStrategy::default(),
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl EngineConfig {
    /// Builds a config from process environment, falling back to defaults
    /// for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_TIMEZONE).filter(|v| !v.trim().is_empty()) {
            config.timezone = parse_timezone(&value)?;
        }
        if let Some(value) = lookup(ENV_WINDOW_DAYS).filter(|v| !v.trim().is_empty()) {
            config.exclusion_window_days = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidWindowDays(value.clone()))?;
        }
        if let Some(value) = lookup(ENV_PIN_STRATEGY).filter(|v| !v.trim().is_empty()) {
            config.pin_strategy = PinStrategy::parse(&value)?;
        }

        Ok(config)
    }

    /// Clamps a requested page/page size into `(page >= 1, 1..=max)`.
    pub fn normalize_page(&self, page: u32, page_size: u32) -> (u32, u32) {
        let page = page.max(1);
        let page_size = match page_size {
            0 => self.default_page_size,
            value if value > self.max_page_size => self.max_page_size,
            value => value,
        };
        (page, page_size)
    }
}

pub fn parse_timezone(value: &str) -> Result<Tz, ConfigError> {
    value
        .trim()
        .parse::<Tz>()
        .map_err(|_| ConfigError::InvalidTimezone(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{
        ConfigError, EngineConfig, PinStrategy, ENV_PIN_STRATEGY, ENV_TIMEZONE, ENV_WINDOW_DAYS,
    };
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = EngineConfig::from_lookup(lookup_from(&[])).expect("defaults");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.exclusion_window_days, 30);
        assert_eq!(config.timezone, chrono_tz::UTC);
    }

    #[test]
    fn reads_all_supported_keys() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            (ENV_TIMEZONE, "Europe/Berlin"),
            (ENV_WINDOW_DAYS, "7"),
            (ENV_PIN_STRATEGY, "CAS"),
        ]))
        .expect("valid config");
        assert_eq!(config.timezone, chrono_tz::Europe::Berlin);
        assert_eq!(config.exclusion_window_days, 7);
        assert_eq!(config.pin_strategy, PinStrategy::CompareAndSwap);
    }

    #[test]
    fn rejects_invalid_values() {
        let err = EngineConfig::from_lookup(lookup_from(&[(ENV_TIMEZONE, "Mars/Base")]))
            .expect_err("unknown tz must fail");
        assert!(matches!(err, ConfigError::InvalidTimezone(_)));

        let err = EngineConfig::from_lookup(lookup_from(&[(ENV_WINDOW_DAYS, "-1")]))
            .expect_err("negative window must fail");
        assert!(matches!(err, ConfigError::InvalidWindowDays(_)));
    }

    #[test]
    fn normalize_page_clamps_values() {
        let config = EngineConfig::default();
        assert_eq!(config.normalize_page(0, 0), (1, 20));
        assert_eq!(config.normalize_page(3, 500), (3, 100));
        assert_eq!(config.normalize_page(2, 15), (2, 15));
    }
}
