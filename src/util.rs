use std::path::PathBuf;

const TELEMETRY_DB: &str = "TELEMETRY_DB";

pub fn get_db_path() -> Option<PathBuf> {
    std::env::var(TELEMETRY_DB).ok().map(PathBuf::from)
}

const TELEMETRY_PORT: &str = "TELEMETRY_PORT";

pub fn get_port() -> Option<u16> {
    std::env::var(TELEMETRY_PORT).ok()?.parse().ok()
}

const TELEMETRY_INTERVAL: &str = "TELEMETRY_INTERVAL";

pub fn get_interval() -> Option<u64> {
    std::env::var(TELEMETRY_INTERVAL).ok()?.parse().ok()
}

const TELEMETRY_LOG: &str = "TELEMETRY_LOG";

pub fn get_log_level() -> Option<tracing::level_filters::LevelFilter> {
    std::env::var(TELEMETRY_LOG).ok()?.parse().ok()
}
