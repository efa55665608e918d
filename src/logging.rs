//! Logging setup.
//!
//! Records go to stderr and, when [`Settings::log_path`] is set, to that file
//! as well. `RUST_LOG` overrides the configured level.

use crate::{config::Settings, Error, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber.
///
/// Keep the returned guard alive for as long as the program logs: dropping
/// it flushes and stops the file writer.
///
/// # Errors
///
/// Fails if a global subscriber is already installed or the log directory
/// can't be created.
pub fn init(settings: &Settings) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .map_err(|e| Error::Logging(format!("invalid log level {:?}: {e}", settings.log_level)))?;

    let (file_layer, guard) = match &settings.log_path {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    Ok(guard)
}

fn file_writer(path: &Path) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Logging(format!("log path {} has no file name", path.display())))?;

    std::fs::create_dir_all(directory)?;
    let appender = tracing_appender::rolling::never(directory, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_log_path_without_file_name() {
        let result = file_writer(&PathBuf::from("/"));
        assert!(matches!(result, Err(Error::Logging(_))));
    }
}
