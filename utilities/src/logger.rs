use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter,
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
// exporing the info! warn! etc tracing macro through this Library
pub use tracing;
pub use tracing::*;

/// Installs the json file layer and the stdout layer. Keep the returned guard
/// alive for as long as logs should be flushed to the file.
pub fn init_logger(service_name: &str, node_id: &str, level: &str, log_base: &str) -> WorkerGuard {
    let file_appender = RollingFileAppender::new(
        Rotation::NEVER,
        format!("{log_base}/{service_name}"),
        format!("{node_id}.log"),
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_line_number(true)
        .with_file(true)
        .with_thread_names(true)
        .with_current_span(true)
        .with_target(true)
        .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
        .flatten_event(true);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);
    let default_level = level.parse::<Level>().unwrap_or(Level::INFO);
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(default_level).into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(json_layer)
        .with(stdout_layer)
        .with(filter)
        .init();
    info!(service = %service_name, node_id = %node_id, %log_base, "Logging initialized");
    guard
}
