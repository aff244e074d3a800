//! Structured logging and optional OTLP trace export
//!
//! Logs go to stdout as JSON unless `TESSERA_LOG_FORMAT=text`. When
//! `OTEL_EXPORTER_OTLP_ENDPOINT` is set, spans are also exported over
//! OTLP/gRPC, tagged with the pod attributes the Deployment passes in via the
//! downward API. Keep the returned [`TelemetryGuard`] alive for the life of
//! the process; dropping it flushes buffered spans.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::{runtime, Resource};
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Default log filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "info,tessera=debug,kube=info,tower=warn,hyper=warn";

const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
const LOG_FORMAT_ENV: &str = "TESSERA_LOG_FORMAT";

/// Downward API variables and the resource attribute each one fills
const POD_ATTRIBUTES: [(&str, &str); 3] = [
    ("POD_NAME", "k8s.pod.name"),
    ("POD_NAMESPACE", "k8s.namespace.name"),
    ("NODE_NAME", "k8s.node.name"),
];

/// Errors that can occur during telemetry initialization
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The OTLP span exporter could not be built
    #[error("failed to initialize tracer: {0}")]
    TracerInit(String),

    /// A global subscriber was already installed
    #[error("failed to initialize tracing subscriber: {0}")]
    SubscriberInit(String),
}

/// Output format of log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line, with the current span attached
    #[default]
    Json,
    /// Human-readable lines for local runs
    Text,
}

impl LogFormat {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("text") => LogFormat::Text,
            _ => LogFormat::Json,
        }
    }
}

/// Telemetry settings, normally read from the environment
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// `service.name` on exported spans
    pub service_name: String,
    /// OTLP collector endpoint; spans stay local when unset
    pub otlp_endpoint: Option<String>,
    /// Log line format
    pub log_format: LogFormat,
}

impl TelemetryConfig {
    /// Read settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            service_name: "tessera-operator".to_string(),
            otlp_endpoint: lookup(OTLP_ENDPOINT_ENV).filter(|e| !e.trim().is_empty()),
            log_format: LogFormat::parse(lookup(LOG_FORMAT_ENV).as_deref()),
        }
    }
}

/// Shuts the OTLP pipeline down when dropped
#[must_use = "dropping the guard stops span export"]
pub struct TelemetryGuard {
    provider: Option<TracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                tracing::warn!(error = %e, "Failed to flush pending spans");
            }
        }
    }
}

/// Install the global subscriber and, if configured, the OTLP exporter
///
/// ```ignore
/// let _telemetry = init_telemetry(TelemetryConfig::from_env())?;
/// ```
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let provider = config
        .otlp_endpoint
        .as_deref()
        .map(|endpoint| {
            let resource = build_resource(&config.service_name, |key| std::env::var(key).ok());
            otlp_provider(endpoint, resource)
        })
        .transpose()?;

    let otel_layer = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(config.service_name.clone()))
    });

    // Option<Layer> is a Layer, so exactly one of these formats lines
    let (json_layer, text_layer) = match config.log_format {
        LogFormat::Json => (
            Some(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            ),
            None,
        ),
        LogFormat::Text => (None, Some(fmt::layer().with_target(true))),
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;

    if let Some(provider) = &provider {
        global::set_tracer_provider(provider.clone());
    }

    Ok(TelemetryGuard { provider })
}

fn build_resource(service_name: &str, lookup: impl Fn(&str) -> Option<String>) -> Resource {
    let mut attributes = vec![
        KeyValue::new(SERVICE_NAME, service_name.to_string()),
        KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
    ];
    attributes.extend(
        POD_ATTRIBUTES
            .iter()
            .filter_map(|(var, key)| lookup(var).map(|value| KeyValue::new(*key, value))),
    );
    Resource::new(attributes)
}

fn otlp_provider(endpoint: &str, resource: Resource) -> Result<TracerProvider, TelemetryError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| TelemetryError::TracerInit(e.to_string()))?;

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(resource)
        .build())
}
