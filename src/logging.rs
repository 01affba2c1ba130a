use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Sets up the global subscriber. The returned guards must stay alive
/// for the whole process or buffered file output is lost.
pub fn init(level: Level, console: bool, log_file: Option<&Path>) -> Vec<WorkerGuard> {
    let mut guards = Vec::new();
    let format = tracing_subscriber::fmt::format()
        .with_level(true) // include levels in formatted output
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .compact(); // use the `Compact` formatting style.

    match log_file {
        Some(path) => {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            let name = path.file_name().unwrap_or_else(|| "rtdctl.log".as_ref());
            let (file_writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            guards.push(guard);
            if console {
                tracing_subscriber::fmt()
                    .event_format(format)
                    .with_max_level(level)
                    .with_writer(file_writer.and(std::io::stdout))
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .event_format(format)
                    .with_max_level(level)
                    .with_ansi(false)
                    .with_writer(file_writer)
                    .init();
            }
        }
        None => {
            tracing_subscriber::fmt()
                .event_format(format)
                .with_max_level(level)
                .init();
        }
    }
    guards
}
