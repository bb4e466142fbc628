//! Tracing setup for the mjrun binary

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::settings::LogSettings;

/// Install the global subscriber.
///
/// Logs go to stderr so stdout stays clean for the resolved config. When
/// `log.file` is set, logs are also written there; the returned guard must
/// be held until exit so buffered lines are flushed.
pub fn init(log: &LogSettings, verbose: bool) -> Option<WorkerGuard> {
    let level = if verbose { "debug" } else { log.level.as_str() };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| format!("mjrun={level}").into());

    if log.file.is_empty() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
        return None;
    }

    let log_path = Path::new(&log.file);
    let log_dir = log_path.parent().unwrap_or(Path::new("."));
    let log_filename = log_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("mjrun.log");

    match ensure_writable(log_dir) {
        Ok(()) => {
            let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(non_blocking),
                )
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
            Some(guard)
        }
        Err(e) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
            tracing::warn!(
                "Could not set up file logging to '{}': {}. Using stderr only.",
                log.file,
                e
            );
            None
        }
    }
}

/// Create the log directory if needed and check that it accepts writes
fn ensure_writable(dir: &Path) -> std::io::Result<()> {
    if !dir.as_os_str().is_empty() && !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }
    let probe = dir.join(".mjrun_write_test");
    std::fs::write(&probe, "test")?;
    std::fs::remove_file(&probe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_writable_creates_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("logs").join("nested");

        ensure_writable(&dir).unwrap();

        assert!(dir.is_dir());
        assert!(!dir.join(".mjrun_write_test").exists());
    }

    #[test]
    fn test_ensure_writable_rejects_file_as_directory() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("not_a_dir");
        std::fs::write(&blocker, "x").unwrap();

        assert!(ensure_writable(&blocker).is_err());
    }
}
