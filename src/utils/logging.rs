// Tue Jan 13 2026 - Alex

use log::LevelFilter;

pub fn level_from_str(s: &str) -> LevelFilter {
    match s.to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// Installs `env_logger` at the given level. Later calls are ignored.
pub fn init_logger(level: &str) {
    let _ = env_logger::Builder::new()
        .filter_level(level_from_str(level))
        .format_timestamp(None)
        .try_init();
}
