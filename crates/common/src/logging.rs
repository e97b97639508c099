//! Initializes logging to stderr and, when configured, OpenTelemetry trace export.
use std::env;

use opentelemetry::{trace::TracerProvider, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use thiserror::Error;
use tracing::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Environment variable holding the OTLP collector endpoint.
pub const OTLP_URL_ENVVAR: &str = "STAKEFLOW_OTLP_URL";

/// Environment variable holding a service label appended to the whoami string.
pub const SVC_LABEL_ENVVAR: &str = "STAKEFLOW_SVC_LABEL";

/// Environment variable that, when set to `1`, adds source locations to every log line.
pub const LOG_LOCATION_ENVVAR: &str = "STAKEFLOW_LOG_LOCATION";

/// Errors raised while setting up logging.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The OTLP exporter could not be built.
    #[error("could not build otlp exporter: {0}")]
    Exporter(String),

    /// A global subscriber is already installed.
    #[error("could not install subscriber: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

/// Configuration for the logger.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Identifies the process in logs and traces.
    whoami: String,

    /// OTLP endpoint traces are exported to.
    otel_url: Option<String>,

    /// Whether to print file and line of every event.
    with_location: bool,
}

impl LoggerConfig {
    /// Creates a config that only logs to stderr.
    pub const fn new(whoami: String) -> Self {
        Self {
            whoami,
            otel_url: None,
            with_location: false,
        }
    }

    /// Creates a config from the `STAKEFLOW_*` environment variables, using `base` as the
    /// whoami prefix.
    pub fn from_env(base: &str) -> Self {
        Self {
            whoami: whoami_string(base, env::var(SVC_LABEL_ENVVAR).ok().as_deref()),
            otel_url: env::var(OTLP_URL_ENVVAR).ok(),
            with_location: env::var(LOG_LOCATION_ENVVAR).is_ok_and(|v| v == "1"),
        }
    }

    /// Exports traces to `url`.
    pub fn with_otlp_url(self, url: String) -> Self {
        Self {
            otel_url: Some(url),
            ..self
        }
    }

    /// The whoami string.
    pub fn whoami(&self) -> &str {
        &self.whoami
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::new("stakeflow".to_owned())
    }
}

/// Installs the global subscriber described by `config`.
///
/// The filter is read from `RUST_LOG`. Logs go to stderr so that command output on stdout stays
/// machine-readable.
pub fn init(config: LoggerConfig) -> Result<(), LoggingError> {
    let filt = tracing_subscriber::EnvFilter::from_default_env();

    let stderr_sub = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_file(config.with_location)
        .with_line_number(config.with_location)
        .with_filter(filt);

    if let Some(otel_url) = &config.otel_url {
        let resource = Resource::builder()
            .with_attribute(KeyValue::new("service.name", config.whoami.clone()))
            .build();

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(otel_url)
            .build()
            .map_err(|e| LoggingError::Exporter(e.to_string()))?;

        let tp = opentelemetry_sdk::trace::SdkTracerProvider::builder()
            .with_resource(resource)
            .with_batch_exporter(exporter)
            .build();

        let otel_sub = tracing_opentelemetry::layer().with_tracer(tp.tracer("stakeflow"));

        tracing_subscriber::registry()
            .with(stderr_sub)
            .with(otel_sub)
            .try_init()?;
    } else {
        tracing_subscriber::registry().with(stderr_sub).try_init()?;
    }

    info!(whoami = %config.whoami, otlp = config.otel_url.is_some(), "logging started");
    Ok(())
}

fn whoami_string(base: &str, label: Option<&str>) -> String {
    match label {
        Some(label) => format!("{base}%{label}"),
        None => base.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whoami_appends_label() {
        assert_eq!(whoami_string("stakeflow-cli", None), "stakeflow-cli");
        assert_eq!(
            whoami_string("stakeflow-cli", Some("alice")),
            "stakeflow-cli%alice"
        );
    }

    #[test]
    fn otlp_url_is_opt_in() {
        let config = LoggerConfig::default();
        assert!(config.otel_url.is_none());

        let config = config.with_otlp_url("http://localhost:4317".to_owned());
        assert_eq!(config.otel_url.as_deref(), Some("http://localhost:4317"));
        assert_eq!(config.whoami(), "stakeflow");
    }
}
