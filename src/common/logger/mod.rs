use std::{fs, path::Path, sync::OnceLock};

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub mod formatter;
pub mod writer;

pub use formatter::*;
pub use writer::*;

use crate::configs::LoggingConfig;

pub(crate) static GLOBAL_FILE_WRITER: OnceLock<LineCappedWriter> = OnceLock::new();

/// Prints to stdout and mirrors the line into the log file when one is configured.
#[macro_export]
macro_rules! log_println {
    () => {{
        std::println!();
        $crate::common::logger::append_to_file_raw("\n");
    }};
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        std::println!("{}", msg);
        $crate::common::logger::append_to_file_raw(&format!("{}\n", msg));
    }};
}

pub fn append_to_file_raw(msg: &str) {
    if let Some(mut writer) = GLOBAL_FILE_WRITER.get().cloned() {
        use std::io::Write;
        let _ = writer.write_all(strip_ansi_escapes(msg).as_bytes());
    }
}

/// Builds the `EnvFilter` directive string from the configured level and extra filters.
pub fn filter_directives(logging: Option<&LoggingConfig>) -> String {
    let level = logging
        .and_then(|l| l.level.as_deref())
        .unwrap_or("info");
    let filters = logging
        .and_then(|l| l.filters.as_deref())
        .unwrap_or("");

    if filters.is_empty() {
        format!("{},symphonia=warn", level)
    } else {
        format!("{},symphonia=warn,{}", level, filters)
    }
}

pub fn init(logging: Option<&LoggingConfig>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(logging)));

    let stdout_layer = fmt::layer()
        .event_format(LineFormatter::new(true))
        .with_ansi(true);

    let file_layer = logging.and_then(|l| l.file.as_ref()).map(|file_config| {
        if let Some(parent) = Path::new(&file_config.path).parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("Failed to create log directory: {}", e);
            }
        }

        let writer = LineCappedWriter::new(file_config.path.clone(), file_config.max_lines);
        let _ = GLOBAL_FILE_WRITER.set(writer.clone());
        fmt::layer()
            .with_writer(writer)
            .event_format(LineFormatter::new(false))
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
}
