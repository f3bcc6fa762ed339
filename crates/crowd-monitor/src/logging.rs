//! Structured area logging and subscriber setup.

use tracing::{debug, info, warn, Span};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crowd_models::AreaId;

/// Area logger for structured logging with consistent fields.
#[derive(Debug, Clone)]
pub struct AreaLogger {
    area: String,
    operation: String,
}

impl AreaLogger {
    /// Create a logger for an area and the operation running on it
    /// (e.g. `frame`, `record`, `zone_sync`).
    pub fn new(area: &AreaId, operation: &str) -> Self {
        Self {
            area: area.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Log a processed frame.
    pub fn log_frame(&self, live_people: u32, tracks: usize, created: usize) {
        debug!(
            area = %self.area,
            operation = %self.operation,
            live_people,
            tracks,
            created,
            "Frame processed"
        );
    }

    pub fn log_info(&self, message: &str) {
        info!(area = %self.area, operation = %self.operation, "{}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(area = %self.area, operation = %self.operation, "{}", message);
    }

    pub fn area(&self) -> &str {
        &self.area
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this area and operation.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "area",
            area = %self.area,
            operation = %self.operation
        )
    }
}

/// Install the global subscriber: colored output for dev, JSON when
/// `LOG_FORMAT=json`. `RUST_LOG` directives extend the `crowd=info` default.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "crowd=info".parse::<Directive>() {
        env_filter = env_filter.add_directive(directive);
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_logger_creation() {
        let logger = AreaLogger::new(&AreaId::from("entrance"), "frame");

        assert_eq!(logger.area(), "entrance");
        assert_eq!(logger.operation(), "frame");
    }
}
