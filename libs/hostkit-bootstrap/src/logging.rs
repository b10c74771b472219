use crate::config::LoggingConfig;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// Keep a guard for non-blocking console to avoid being dropped.
static CONSOLE_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

/// "off"/"none" disable the sink entirely; unknown strings fall back to INFO.
fn parse_level_filter(s: &str) -> LevelFilter {
    match s.to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        "off" | "none" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

// ================= rotating writer for the file sink =================

use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};

#[derive(Clone)]
struct RotWriter(Arc<Mutex<FileRotate<AppendTimestamp>>>);

#[derive(Clone)]
struct RotWriterHandle(Arc<Mutex<FileRotate<AppendTimestamp>>>);

impl<'a> fmt::MakeWriter<'a> for RotWriter {
    type Writer = RotWriterHandle;
    fn make_writer(&'a self) -> Self::Writer {
        RotWriterHandle(self.0.clone())
    }
}

impl Write for RotWriterHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        self.0.lock().unwrap().flush()
    }
}

fn resolve_log_path(file: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

fn create_rotating_writer(cfg: &LoggingConfig, base_dir: &Path) -> Option<RotWriter> {
    let file = cfg.file.as_deref()?.trim();
    if file.is_empty() {
        return None;
    }

    let log_path = resolve_log_path(file, base_dir);
    if let Some(parent) = log_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("Failed to create log directory '{}': {e}", parent.display());
            return None;
        }
    }

    let max_bytes = cfg.max_size_mb.unwrap_or(100) as usize * 1024 * 1024;
    let limit = FileLimit::MaxFiles(cfg.max_backups.unwrap_or(3));

    let rot = FileRotate::new(
        &log_path,
        AppendTimestamp::default(limit),
        ContentLimit::BytesSurpassed(max_bytes),
        Compression::None,
        None,
    );
    Some(RotWriter(Arc::new(Mutex::new(rot))))
}

// ================= public init =================

/// Install the global subscriber: console to stderr, plus an optional JSON
/// file sink with size-based rotation. `RUST_LOG`, when set, caps both.
pub fn init_logging(cfg: &LoggingConfig, base_dir: &Path) {
    // Bridge `log` → `tracing` *before* installing the subscriber
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("LogTracer init skipped: {e}");
    }

    let env: Option<EnvFilter> = EnvFilter::try_from_default_env().ok();

    let (nb_stderr, guard) = tracing_appender::non_blocking(std::io::stderr());
    let _ = CONSOLE_GUARD.set(guard);

    let console_layer = fmt::layer()
        .with_writer(nb_stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true)
        .with_level(true)
        .with_filter(parse_level_filter(&cfg.console_level));

    let file_layer = create_rotating_writer(cfg, base_dir).map(|writer| {
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .with_writer(writer)
            .with_filter(parse_level_filter(&cfg.file_level))
    });

    let _ = tracing_subscriber::registry()
        .with(env)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

/// Minimal fallback when no logging section is configured: INFO to the
/// console, honoring `RUST_LOG`.
pub fn init_minimal() {
    let env = EnvFilter::try_from_default_env().ok();

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_filter(LevelFilter::INFO);

    let _ = tracing_subscriber::registry()
        .with(env)
        .with(fmt_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!(parse_level_filter("DEBUG"), LevelFilter::DEBUG);
        assert_eq!(parse_level_filter("off"), LevelFilter::OFF);
        assert_eq!(parse_level_filter("bogus"), LevelFilter::INFO);
    }

    #[test]
    fn relative_log_paths_resolve_against_base_dir() {
        assert_eq!(
            resolve_log_path("logs/harness.log", Path::new("/srv/app")),
            Path::new("/srv/app/logs/harness.log")
        );
        assert_eq!(
            resolve_log_path("/var/log/harness.log", Path::new("/srv/app")),
            Path::new("/var/log/harness.log")
        );
    }

    #[test]
    fn writer_is_skipped_without_a_file() {
        let cfg = LoggingConfig::default();
        assert!(create_rotating_writer(&cfg, Path::new(".")).is_none());

        let blank = LoggingConfig {
            file: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(create_rotating_writer(&blank, Path::new(".")).is_none());
    }

    #[test]
    fn writer_is_created_for_a_configured_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = LoggingConfig {
            file: Some("logs/harness.log".to_string()),
            ..Default::default()
        };
        assert!(create_rotating_writer(&cfg, dir.path()).is_some());
        assert!(dir.path().join("logs").is_dir());
    }
}
