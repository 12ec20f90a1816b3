use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub source_base_url: String,
    pub source_username: Option<String>,
    pub source_password: Option<String>,
    pub source_request_timeout_secs: u64,
    pub source_max_retries: u32,
    pub source_retry_backoff_base_ms: u64,
    pub channel_delay_min_secs: u64,
    pub channel_delay_max_secs: u64,
    pub force_check_all: bool,
    pub google_api_key: Option<String>,
    pub vision_model: String,
    pub summary_model: String,
    pub temp_dir: PathBuf,
    pub done_log_path: PathBuf,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub whisper_bin: String,
    pub tesseract_bin: String,
    pub downloader_bin: String,
    pub downloader_cookies: Option<PathBuf>,
    pub discover_interval_mins: u64,
    pub worker_interval_mins: u64,
    pub processing_lease_mins: u64,
    pub worker_id: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("source_base_url", &self.source_base_url)
            .field("source_username", &self.source_username)
            .field(
                "source_password",
                &self.source_password.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "source_request_timeout_secs",
                &self.source_request_timeout_secs,
            )
            .field("source_max_retries", &self.source_max_retries)
            .field(
                "source_retry_backoff_base_ms",
                &self.source_retry_backoff_base_ms,
            )
            .field("channel_delay_min_secs", &self.channel_delay_min_secs)
            .field("channel_delay_max_secs", &self.channel_delay_max_secs)
            .field("force_check_all", &self.force_check_all)
            .field(
                "google_api_key",
                &self.google_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("vision_model", &self.vision_model)
            .field("summary_model", &self.summary_model)
            .field("temp_dir", &self.temp_dir)
            .field("done_log_path", &self.done_log_path)
            .field("ffmpeg_bin", &self.ffmpeg_bin)
            .field("ffprobe_bin", &self.ffprobe_bin)
            .field("whisper_bin", &self.whisper_bin)
            .field("tesseract_bin", &self.tesseract_bin)
            .field("downloader_bin", &self.downloader_bin)
            .field("downloader_cookies", &self.downloader_cookies)
            .field("discover_interval_mins", &self.discover_interval_mins)
            .field("worker_interval_mins", &self.worker_interval_mins)
            .field("processing_lease_mins", &self.processing_lease_mins)
            .field("worker_id", &self.worker_id)
            .finish()
    }
}
