//! Tracing initialisation for the daemon.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// sqlx logs every statement at `info`; one line per row write drowns the
/// decode reports, so it is held at `warn` unless the filter names it.
const SQLX_DEFAULT: &str = "sqlx=warn";

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `info,ibcdecode_storage=debug`.
    pub filter: String,
    /// JSON lines instead of human-readable text.
    pub json: bool,
}

impl LogConfig {
    pub fn directives(&self) -> String {
        let filter = self.filter.trim();
        if filter.split(',').any(|d| d.trim_start().starts_with("sqlx")) {
            filter.to_string()
        } else {
            format!("{filter},{SQLX_DEFAULT}")
        }
    }
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_new(config.directives()).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directives(filter: &str) -> String {
        LogConfig {
            filter: filter.into(),
            json: false,
        }
        .directives()
    }

    #[test]
    fn sqlx_held_at_warn_by_default() {
        assert_eq!(directives("info"), "info,sqlx=warn");
        assert_eq!(
            directives("debug,ibcdecode_pipeline=trace"),
            "debug,ibcdecode_pipeline=trace,sqlx=warn"
        );
    }

    #[test]
    fn explicit_sqlx_directive_wins() {
        assert_eq!(directives("info, sqlx=debug"), "info, sqlx=debug");
    }
}
