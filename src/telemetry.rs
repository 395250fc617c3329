use tracing_subscriber::{prelude::*, EnvFilter, Registry};

/// Initialize structured logging. Respects `RUST_LOG`, defaults to `info`.
pub fn init() {
    let logger = tracing_subscriber::fmt::layer().json();
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();

    let collector = Registry::default().with(logger).with(env_filter);
    tracing::subscriber::set_global_default(collector).unwrap();
}

/// Extracts the current tracing span's trace id for log correlation, the
/// same pattern the teacher's `NeonCluster`/`NeonStorage` reconcilers use
/// via `#[instrument(fields(trace_id))]`.
pub fn get_trace_id() -> String {
    use opentelemetry::trace::TraceContextExt as _;
    use tracing_opentelemetry::OpenTelemetrySpanExt as _;

    tracing::Span::current()
        .context()
        .span()
        .span_context()
        .trace_id()
        .to_string()
}
