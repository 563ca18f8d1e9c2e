//! Tracing for the command line app
use super::LogLevel;
use std::path::Path;
use tracing::subscriber::set_global_default;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::{self, format::FmtSpan};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer, Registry};

/// Where the JSON record of each run is written, relative to the crate directory
const LOG_DIRECTORY: &str = "../results";
const LOG_FILE: &str = "poisson.log";

/// Installs the global subscriber for a run
///
/// The console shows events at `level`, or whatever `RUST_LOG` asks for. The JSON record keeps
/// debug events and the closing of every span regardless, so the residual history of each pass
/// and the time spent in each stage survive a quiet console. Dropping the guard flushes the
/// record.
pub(crate) fn install(level: LogLevel) -> color_eyre::Result<WorkerGuard> {
    install_in(Path::new(LOG_DIRECTORY), level)
}

fn install_in(directory: &Path, level: LogLevel) -> color_eyre::Result<WorkerGuard> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let console = fmt::layer()
        .with_writer(console::Term::stdout)
        .with_target(false)
        .without_time()
        .compact()
        .with_filter(console_filter);

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(directory, LOG_FILE));
    let record = fmt::layer()
        .with_writer(writer)
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(LevelFilter::DEBUG);

    LogTracer::builder()
        .with_max_level(level.as_log_filter())
        .init()?;
    set_global_default(Registry::default().with(console).with(record))?;
    Ok(guard)
}

#[cfg(test)]
mod test {
    use super::{install_in, LOG_FILE};
    use crate::app::LogLevel;

    #[test]
    fn record_keeps_debug_events_below_the_console_level() {
        let directory = std::env::temp_dir().join("transporter-poisson-telemetry");
        std::fs::create_dir_all(&directory).unwrap();
        let _ = std::fs::remove_file(directory.join(LOG_FILE));

        let guard = install_in(&directory, LogLevel::Warn).unwrap();
        tracing::debug!(relative_residual = 1e-3, "sweep finished");
        drop(guard);

        let record = std::fs::read_to_string(directory.join(LOG_FILE)).unwrap();
        let line = record
            .lines()
            .find(|line| line.contains("sweep finished"))
            .unwrap();
        assert!(line.contains("\"level\":\"DEBUG\""));
    }
}
