use anyhow::{Context, Result};
use std::{fs, io, path::Path};
use tracing_appender::non_blocking;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

pub struct LogGuards {
    _console: non_blocking::WorkerGuard,
    _file: Option<non_blocking::WorkerGuard>,
}

pub fn setup_logging(log_file: Option<&Path>) -> Result<LogGuards> {
    let (console_writer, console_guard) = non_blocking(io::stderr());
    let console_layer = fmt::layer()
        .with_writer(console_writer)
        .with_ansi(true)
        .compact();

    let (file_layer, file_guard) = match log_file {
        Some(path) => {
            let f = io::BufWriter::new(
                fs::File::create(path)
                    .with_context(|| format!("failed to create log file {}", path.display()))?,
            );
            let (file_writer, guard) = non_blocking(f);
            let layer = fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(LevelFilter::TRACE);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("uproperty=info,uproperty_cli=info"));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .with(filter)
        .init();

    tracing::debug!("Logging initialized");

    Ok(LogGuards {
        _console: console_guard,
        _file: file_guard,
    })
}
