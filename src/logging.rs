//! # Structured Logging Module
//!
//! Environment-aware structured logging. Development output is human readable;
//! production (or `LOG_FORMAT=json`) emits one JSON object per event so log
//! shippers can index request ids and entity ids.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process.
///
/// `RUST_LOG` wins when set; otherwise the level follows the environment.
pub fn init_structured_logging(environment: &str, log_format: &str) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_log_level(environment)));
        let json = use_json_output(environment, log_format);

        let console_layer = if json {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(true)
                .boxed()
        };

        let subscriber = tracing_subscriber::registry()
            .with(console_layer.with_filter(filter));

        // A global subscriber may already exist (tests, embedding binaries)
        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(
            environment = %environment,
            json = json,
            "Structured logging initialized"
        );
    });
}

fn default_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info,sqlx=warn",
        _ => "debug,sqlx=warn,hyper=info",
    }
}

fn use_json_output(environment: &str, log_format: &str) -> bool {
    log_format.eq_ignore_ascii_case("json") || environment == "production"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_level_by_environment() {
        assert!(default_log_level("production").starts_with("info"));
        assert!(default_log_level("development").starts_with("debug"));
        assert!(default_log_level("test").starts_with("debug"));
    }

    #[test]
    fn test_json_output_selection() {
        assert!(use_json_output("development", "json"));
        assert!(use_json_output("production", "pretty"));
        assert!(!use_json_output("development", "pretty"));
    }

    #[test]
    fn test_init_is_idempotent() {
        init_structured_logging("test", "pretty");
        init_structured_logging("test", "json");
    }
}
