//! Tracing initialization for the command-line front end.
//!
//! Logs are written to stderr so stdout carries only the JSON result.

use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{
        self,
        format::{Format, FormatEvent, FormatFields},
    },
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingConfig};

type Filtered = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<Filtered> + Send + Sync>;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level and filter.
pub fn init_tracing(logging: &LoggingConfig) {
    let fmt_layer = match logging.format {
        LogFormat::Pretty => stderr_layer(fmt::layer().pretty(), logging),
        LogFormat::Compact => stderr_layer(fmt::layer().compact(), logging),
        LogFormat::Json => stderr_layer(fmt::layer().json(), logging),
    };

    tracing_subscriber::registry()
        .with(build_env_filter(logging))
        .with(fmt_layer)
        .init();
}

fn stderr_layer<N, L, W>(
    layer: fmt::Layer<Filtered, N, Format<L>, W>,
    logging: &LoggingConfig,
) -> BoxedLayer
where
    N: for<'w> FormatFields<'w> + Send + Sync + 'static,
    L: Send + Sync + 'static,
    Format<L>: FormatEvent<Filtered, N>,
    Format<L, ()>: FormatEvent<Filtered, N>,
{
    let layer = layer
        .with_writer(std::io::stderr)
        .with_file(logging.file_line)
        .with_line_number(logging.file_line);

    if logging.timestamps {
        Box::new(layer)
    } else {
        Box::new(layer.without_time())
    }
}

fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    let base_level = config.level.as_str();

    if let Ok(env_filter) = std::env::var("RUST_LOG") {
        EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new(base_level))
    } else if let Some(filter) = &config.filter {
        let combined = format!("{},{}", base_level, filter);
        EnvFilter::try_new(combined).unwrap_or_else(|_| EnvFilter::new(base_level))
    } else {
        EnvFilter::new(base_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_filter_from_config() {
        temp_env::with_var_unset("RUST_LOG", || {
            let config = LoggingConfig {
                level: LogLevel::Debug,
                filter: Some("queryfront::lexer=trace".to_string()),
                ..Default::default()
            };
            let filter = build_env_filter(&config).to_string();
            assert!(filter.contains("queryfront::lexer=trace"));
            assert!(filter.contains("debug"));
        });
    }

    #[test]
    fn test_rust_log_wins() {
        temp_env::with_var("RUST_LOG", Some("error"), || {
            let config = LoggingConfig {
                level: LogLevel::Trace,
                ..Default::default()
            };
            assert_eq!(build_env_filter(&config).to_string(), "error");
        });
    }
}
