//! Logging for analysis runs.
//!
//! Everything is emitted through `tracing`. A run over a 10k-row export can
//! produce one event per distinct location code and one per candidate
//! anomaly, so those two families sit behind switches in [`LogConfig`], and
//! free-text fields taken from the export (raw codes, anomaly details) are
//! cut to [`LogConfig::max_field_length`] characters before they are logged.
//!
//! The binary installs a subscriber with [`setup::init_subscriber`]; library
//! users bring their own.

use std::borrow::Cow;

use tracing::Level;

/// Which run events the engine emits.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Most detailed level the engine bothers to format events for
    pub level: Level,
    /// Emit an event per rule and per candidate anomaly
    pub rule_events: bool,
    /// Emit an event per resolved location code
    pub location_events: bool,
    /// Attach counts and durations to the end-of-run event
    pub run_metrics: bool,
    /// Character limit for export-derived text in events
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            rule_events: false,
            location_events: false,
            run_metrics: true,
            max_field_length: 160,
        }
    }
}

impl LogConfig {
    /// Every event family on, with long fields. For tracing a single export.
    pub fn verbose() -> Self {
        Self {
            level: Level::TRACE,
            rule_events: true,
            location_events: true,
            run_metrics: true,
            max_field_length: 1024,
        }
    }

    /// Only the end-of-run summary and failures.
    pub fn quiet() -> Self {
        Self {
            level: Level::WARN,
            rule_events: false,
            location_events: false,
            run_metrics: false,
            max_field_length: 80,
        }
    }

    /// Cuts export-derived text to the configured length.
    pub fn field<'a>(&self, value: &'a str) -> Cow<'a, str> {
        truncate_field(value, self.max_field_length)
    }
}

/// Debug event that is skipped entirely unless the config allows debug.
#[macro_export]
macro_rules! perf_debug {
    ($config:expr, $($arg:tt)*) => {
        if $config.level >= tracing::Level::DEBUG {
            tracing::debug!($($arg)*);
        }
    };
}

/// Per-rule event, emitted only with `rule_events`.
#[macro_export]
macro_rules! log_rule {
    ($config:expr, $($arg:tt)*) => {
        if $config.rule_events {
            tracing::debug!($($arg)*);
        }
    };
}

/// Per-location event, emitted only with `location_events`.
#[macro_export]
macro_rules! log_location {
    ($config:expr, $($arg:tt)*) => {
        if $config.location_events {
            tracing::trace!($($arg)*);
        }
    };
}

/// Keeps the first `max_chars` characters of `value`, noting how many were
/// dropped.
pub fn truncate_field(value: &str, max_chars: usize) -> Cow<'_, str> {
    match value.char_indices().nth(max_chars) {
        None => Cow::Borrowed(value),
        Some((cut, _)) => {
            let dropped = value[cut..].chars().count();
            Cow::Owned(format!("{}... (+{dropped} chars)", &value[..cut]))
        }
    }
}

/// Subscriber installation for the binaries.
pub mod setup {
    use tracing::Level;

    /// Environment variable consulted before `RUST_LOG`.
    pub const LOG_ENV_VAR: &str = "WAREHOUSE_GUARD_LOG";

    /// Output settings for the global subscriber.
    #[derive(Debug, Clone)]
    pub struct SubscriberConfig {
        /// Level for dependencies
        pub default_level: Level,
        /// Level for `warehouse_guard` targets
        pub crate_level: Level,
        /// One JSON object per line instead of text
        pub json: bool,
        /// Complete filter directive, replacing both levels
        pub filter: Option<String>,
    }

    impl Default for SubscriberConfig {
        fn default() -> Self {
            Self::cli()
        }
    }

    impl SubscriberConfig {
        /// Human-readable output for command-line tools.
        pub fn cli() -> Self {
            Self {
                default_level: Level::WARN,
                crate_level: Level::INFO,
                json: false,
                filter: None,
            }
        }

        /// JSON lines for a log collector.
        pub fn service() -> Self {
            Self {
                default_level: Level::INFO,
                crate_level: Level::INFO,
                json: true,
                filter: None,
            }
        }

        pub fn with_json(mut self, json: bool) -> Self {
            self.json = json;
            self
        }

        pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
            self.filter = Some(filter.into());
            self
        }

        /// Filter directive built from the levels unless one was given.
        pub fn directive(&self) -> String {
            match &self.filter {
                Some(filter) => filter.clone(),
                None => format!(
                    "{},warehouse_guard={}",
                    self.default_level.as_str().to_lowercase(),
                    self.crate_level.as_str().to_lowercase()
                ),
            }
        }
    }

    /// Installs the global subscriber.
    ///
    /// [`LOG_ENV_VAR`], then `RUST_LOG`, override the configured directive.
    ///
    /// ```rust,no_run
    /// use warehouse_guard::logging::setup::{init_subscriber, SubscriberConfig};
    ///
    /// init_subscriber(SubscriberConfig::service()).unwrap();
    /// ```
    pub fn init_subscriber(config: SubscriberConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new(config.directive()));

        let output = if config.json {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().with_target(false).boxed()
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(output)
            .try_init()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::setup::SubscriberConfig;
    use super::*;

    #[test]
    fn test_default_keeps_per_item_events_off() {
        let config = LogConfig::default();
        assert!(!config.rule_events);
        assert!(!config.location_events);
        assert!(config.run_metrics);

        let quiet = LogConfig::quiet();
        assert_eq!(quiet.level, Level::WARN);
        assert!(!quiet.run_metrics);
        assert!(LogConfig::verbose().location_events);
    }

    #[test]
    fn test_field_truncation() {
        let config = LogConfig {
            max_field_length: 6,
            ..LogConfig::default()
        };
        assert_eq!(config.field("RECV-1"), "RECV-1");
        assert!(matches!(config.field("RECV-1"), Cow::Borrowed(_)));
        assert_eq!(
            config.field("FROZEN PEAS 24x500g"),
            "FROZEN... (+13 chars)"
        );
        // multi-byte characters are never split
        assert_eq!(truncate_field("Kühlware", 2), "Kü... (+6 chars)");
    }

    #[test]
    fn test_directive() {
        assert_eq!(SubscriberConfig::cli().directive(), "warn,warehouse_guard=info");
        let custom = SubscriberConfig::service().with_filter("warehouse_guard::rules=trace");
        assert_eq!(custom.directive(), "warehouse_guard::rules=trace");
        assert!(custom.json);
    }
}
