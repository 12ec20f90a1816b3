use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Parsing and validation live here, decoupled from the process environment,
/// so tests can drive it with a plain `HashMap`.
#[allow(clippy::too_many_lines)]
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_minutes = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let value = parse_u64(var, default)?;
        if value == 0 {
            return Err(invalid(var, "must be at least 1 minute".to_string()));
        }
        Ok(value)
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        let raw = or_default(var, default);
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" | "" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got '{other}'"))),
        }
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("REELSCOPE_ENV", "development"))?;
    let bind_addr = parse_addr("REELSCOPE_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("REELSCOPE_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("REELSCOPE_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("REELSCOPE_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("REELSCOPE_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let source_base_url = or_default("REELSCOPE_SOURCE_BASE_URL", "http://127.0.0.1:8085");
    let source_username = optional("REELSCOPE_SOURCE_USERNAME");
    let source_password = optional("REELSCOPE_SOURCE_PASSWORD");
    let source_request_timeout_secs = parse_u64("REELSCOPE_SOURCE_REQUEST_TIMEOUT_SECS", "30")?;
    let source_max_retries = parse_u32("REELSCOPE_SOURCE_MAX_RETRIES", "3")?;
    let source_retry_backoff_base_ms =
        parse_u64("REELSCOPE_SOURCE_RETRY_BACKOFF_BASE_MS", "2000")?;

    let channel_delay_min_secs = parse_u64("REELSCOPE_CHANNEL_DELAY_MIN_SECS", "5")?;
    let channel_delay_max_secs = parse_u64("REELSCOPE_CHANNEL_DELAY_MAX_SECS", "15")?;
    if channel_delay_max_secs < channel_delay_min_secs {
        return Err(invalid(
            "REELSCOPE_CHANNEL_DELAY_MAX_SECS",
            format!(
                "must be >= REELSCOPE_CHANNEL_DELAY_MIN_SECS ({channel_delay_min_secs})"
            ),
        ));
    }
    let force_check_all = parse_bool("REELSCOPE_FORCE_CHECK_ALL", "false")?;

    let google_api_key = optional("GOOGLE_API_KEY");
    let vision_model = or_default("REELSCOPE_VISION_MODEL", "gemini-2.0-flash-lite");
    let summary_model = or_default("REELSCOPE_SUMMARY_MODEL", "gemini-2.5-flash");

    let temp_dir = PathBuf::from(or_default("REELSCOPE_TEMP_DIR", "temp_files"));
    let done_log_path = optional("REELSCOPE_DONE_LOG")
        .map_or_else(|| temp_dir.join("done.log"), PathBuf::from);

    let ffmpeg_bin = or_default("REELSCOPE_FFMPEG_BIN", "ffmpeg");
    let ffprobe_bin = or_default("REELSCOPE_FFPROBE_BIN", "ffprobe");
    let whisper_bin = or_default("REELSCOPE_WHISPER_BIN", "whisper");
    let tesseract_bin = or_default("REELSCOPE_TESSERACT_BIN", "tesseract");
    let downloader_bin = or_default("REELSCOPE_DOWNLOADER_BIN", "gallery-dl");
    let downloader_cookies = optional("REELSCOPE_DOWNLOADER_COOKIES").map(PathBuf::from);

    let discover_interval_mins = parse_minutes("REELSCOPE_DISCOVER_INTERVAL_MINS", "30")?;
    let worker_interval_mins = parse_minutes("REELSCOPE_WORKER_INTERVAL_MINS", "5")?;
    let processing_lease_mins = parse_minutes("REELSCOPE_PROCESSING_LEASE_MINS", "120")?;
    let worker_id = optional("REELSCOPE_WORKER_ID")
        .unwrap_or_else(|| format!("worker_{}", std::process::id()));

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        source_base_url,
        source_username,
        source_password,
        source_request_timeout_secs,
        source_max_retries,
        source_retry_backoff_base_ms,
        channel_delay_min_secs,
        channel_delay_max_secs,
        force_check_all,
        google_api_key,
        vision_model,
        summary_model,
        temp_dir,
        done_log_path,
        ffmpeg_bin,
        ffprobe_bin,
        whisper_bin,
        tesseract_bin,
        downloader_bin,
        downloader_cookies,
        discover_interval_mins,
        worker_interval_mins,
        processing_lease_mins,
        worker_id,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "REELSCOPE_ENV".to_string(),
            reason: format!("expected development, test, or production; got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
