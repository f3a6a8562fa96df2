use opentelemetry_sdk::{logs::LoggerProvider, trace::TracerProvider as SdkTracerProvider};

/// Logging and export settings, built by the service from its own configuration
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Reported as `service.name` on exported spans and logs
    pub service_name: String,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_level: String,
    /// OTLP gRPC collector; `None` keeps output to JSON on stdout
    pub otlp_endpoint: Option<String>,
}

impl TelemetryConfig {
    /// JSON logging only
    pub fn new(service_name: impl Into<String>, log_level: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            log_level: log_level.into(),
            otlp_endpoint: None,
        }
    }

    /// Also export spans and log events to `endpoint`
    pub fn with_otlp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }
}

/// Exporter handles kept alive until shutdown flushes them
pub struct TelemetryProviders {
    pub tracer_provider: SdkTracerProvider,
    pub logger_provider: LoggerProvider,
}
