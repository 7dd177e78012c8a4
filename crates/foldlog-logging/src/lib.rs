//! # foldlog-logging
//!
//! Logging and report output for foldlog.
//!
//! ## Key Types
//!
//! - [`Reporter`] - Renders report events to a writer
//! - [`ReportEvent`] - Report event types
//! - [`LogFormat`] - Output formats (Pretty, JSON, Compact)
//!
//! ## Log Formats
//!
//! - `Pretty` - Human-readable colored output
//! - `JSON` - Structured JSON lines
//! - `Compact` - Minimal text output

mod events;

pub use events::{LogFormat, ReportEvent, Reporter};

use std::io;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing for the application.
///
/// Diagnostics go to stderr. With `log_file` set, the same events are also
/// appended to that file as JSON lines.
pub fn init_tracing(level: &str, format: LogFormat, log_file: Option<&Path>) -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let file_layer = log_file
        .map(file_appender)
        .transpose()?
        .map(|appender| fmt::layer().json().with_ansi(false).with_writer(appender));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(file_layer)
                .with(fmt::layer().json().with_target(false).with_writer(io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(file_layer)
                .with(fmt::layer().with_target(false).with_writer(io::stderr))
                .init();
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(file_layer)
                .with(fmt::layer().compact().with_target(false).with_writer(io::stderr))
                .init();
        }
    }
    Ok(())
}

fn file_appender(path: &Path) -> io::Result<RollingFileAppender> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Log file path has no file name: {}", path.display()),
            )
        })?;

    std::fs::create_dir_all(dir)?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_appender_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("foldlog.log");

        let appender = file_appender(&path);
        assert!(appender.is_ok());
        assert!(dir.path().join("logs").is_dir());
    }

    #[test]
    fn test_file_appender_rejects_path_without_name() {
        let err = file_appender(Path::new("/")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
