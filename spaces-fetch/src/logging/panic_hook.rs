//! Panic reporting.

use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::panic::{PanicHookInfo, take_hook};
use std::path::{Path, PathBuf};
use std::thread;

use super::LOG_FILE_PREFIX;

/// Report panics through `tracing`, chaining to the previous hook.
///
/// Release builds abort on panic before the non-blocking file writer flushes,
/// so in that configuration the record is also appended to today's log file
/// directly.
pub fn install_panic_hook(log_dir: &Path) {
    let log_dir = log_dir.to_path_buf();
    let previous = take_hook();

    std::panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
        let record = describe_panic(info);
        tracing::error!(target: "spaces_fetch::panic", "{record}");
        if cfg!(panic = "abort") {
            let _ = append_to_log(&log_dir, &record);
        }
        previous(info);
    }));
}

fn append_to_log(log_dir: &Path, record: &str) -> std::io::Result<()> {
    let path = PathBuf::from(log_dir).join(format!(
        "{LOG_FILE_PREFIX}.{}",
        Local::now().format("%Y-%m-%d")
    ));
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{record}")
}

fn describe_panic(info: &PanicHookInfo<'_>) -> String {
    let payload = info
        .payload()
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|| info.payload().downcast_ref::<String>().cloned())
        .unwrap_or_else(|| info.to_string());
    let location = info
        .location()
        .map(|loc| format!("{}:{}", loc.file(), loc.line()))
        .unwrap_or_else(|| "<unknown>".to_string());
    let thread_name = thread::current()
        .name()
        .unwrap_or("<unnamed>")
        .to_string();

    format!(
        "{} PANIC thread={thread_name} location={location} payload={payload}\n{}",
        Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"),
        std::backtrace::Backtrace::force_capture()
    )
}
