use std::env;
use std::str::FromStr;
use std::time::Duration;

use strum::{Display, EnumString};

use crate::db::Database;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const PORT: &str = "PORT";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const MESSAGE_BUS: &str = "MESSAGE_BUS";
    pub const REDIS_URL: &str = "REDIS_URL";
    // Executor kernel
    pub const KERNEL_LOCATION: &str = "KERNEL_LOCATION";
    pub const KERNEL_API_VERSION: &str = "KERNEL_API_VERSION";
    pub const KERNEL_HTTP_TIMEOUT_SECS: &str = "KERNEL_HTTP_TIMEOUT_SECS";
    pub const API_BASE_URLS: &str = "KUWA_API_BASE_URLS";
    pub const SAFETY_GUARD_LOCATION: &str = "SAFETY_GUARD_LOCATION";
    pub const BRAND_KEYWORD: &str = "BRAND_KEYWORD";
    // Job queue
    pub const MAX_CONCURRENT_CHAT_JOBS: &str = "MAX_CONCURRENT_CHAT_JOBS";
    pub const MAX_CONCURRENT_BATCH_JOBS: &str = "MAX_CONCURRENT_BATCH_JOBS";
    pub const CHAT_JOB_TIMEOUT_SECS: &str = "CHAT_JOB_TIMEOUT_SECS";
    pub const BATCH_JOB_TIMEOUT_SECS: &str = "BATCH_JOB_TIMEOUT_SECS";
    pub const BUSY_BACKOFF_SECS: &str = "BUSY_BACKOFF_SECS";
    pub const BATCH_POLL_INTERVAL_MS: &str = "BATCH_POLL_INTERVAL_MS";
    pub const LANE_TTL_SECS: &str = "LANE_TTL_SECS";
    // Health check ticker (0 = disabled)
    pub const HEALTH_CHECK_INTERVAL_SECS: &str = "HEALTH_CHECK_INTERVAL_SECS";
    pub const PROXY_PUBLISH_MODE: &str = "PROXY_PUBLISH_MODE";
}

/// Default values
pub mod defaults {
    use super::{BusBackend, PublishGranularity};

    pub const PORT: u16 = 9100;
    pub const DATABASE_URL: &str = "./.db/multichat.db";
    pub const MESSAGE_BUS: BusBackend = BusBackend::Redis;
    pub const REDIS_URL: &str = "redis://127.0.0.1:6379";
    pub const KERNEL_LOCATION: &str = "http://127.0.0.1:9000";
    pub const KERNEL_API_VERSION: &str = "v1.0";
    pub const KERNEL_HTTP_TIMEOUT_SECS: u64 = 300;
    pub const BRAND_KEYWORD: &str = "kuwa";
    pub const MAX_CONCURRENT_CHAT_JOBS: usize = 32;
    pub const MAX_CONCURRENT_BATCH_JOBS: usize = 8;
    pub const CHAT_JOB_TIMEOUT_SECS: u64 = 600;
    pub const BATCH_JOB_TIMEOUT_SECS: u64 = 6000;
    pub const BUSY_BACKOFF_SECS: u64 = 10;
    pub const BATCH_POLL_INTERVAL_MS: u64 = 500;
    pub const LANE_TTL_SECS: u64 = 1200;
    pub const HEALTH_CHECK_INTERVAL_SECS: u64 = 10;
    pub const PROXY_PUBLISH_MODE: PublishGranularity = PublishGranularity::Chunk;
}

/// Keys of the `system_settings` table that override env fallbacks at run time.
pub mod settings_keys {
    pub const KERNEL_LOCATION: &str = "kernel_location";
    pub const SAFETY_GUARD_LOCATION: &str = "safety_guard_location";
}

/// Which pub/sub + lane backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BusBackend {
    Redis,
    Memory,
}

/// How raw text is published on proxied channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PublishGranularity {
    /// One event per decoded chunk.
    Chunk,
    /// One event per character (legacy consumers).
    Char,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("Invalid value for {}: {:?}, using default", name, raw);
            default
        }),
        Err(_) => default,
    }
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub message_bus: BusBackend,
    pub redis_url: String,
    pub kernel_location: String,
    pub kernel_api_version: String,
    pub kernel_http_timeout: Duration,
    pub api_base_urls: String,
    pub safety_guard_location: String,
    pub brand_keyword: String,
    pub max_concurrent_chat_jobs: usize,
    pub max_concurrent_batch_jobs: usize,
    pub chat_job_timeout: Duration,
    pub batch_job_timeout: Duration,
    pub busy_backoff: Duration,
    pub batch_poll_interval: Duration,
    pub lane_ttl: Duration,
    /// `None` disables the periodic health check.
    pub health_check_interval: Option<Duration>,
    pub proxy_publish_mode: PublishGranularity,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: defaults::PORT,
            database_url: defaults::DATABASE_URL.to_string(),
            message_bus: defaults::MESSAGE_BUS,
            redis_url: defaults::REDIS_URL.to_string(),
            kernel_location: defaults::KERNEL_LOCATION.to_string(),
            kernel_api_version: defaults::KERNEL_API_VERSION.to_string(),
            kernel_http_timeout: Duration::from_secs(defaults::KERNEL_HTTP_TIMEOUT_SECS),
            api_base_urls: String::new(),
            safety_guard_location: String::new(),
            brand_keyword: defaults::BRAND_KEYWORD.to_string(),
            max_concurrent_chat_jobs: defaults::MAX_CONCURRENT_CHAT_JOBS,
            max_concurrent_batch_jobs: defaults::MAX_CONCURRENT_BATCH_JOBS,
            chat_job_timeout: Duration::from_secs(defaults::CHAT_JOB_TIMEOUT_SECS),
            batch_job_timeout: Duration::from_secs(defaults::BATCH_JOB_TIMEOUT_SECS),
            busy_backoff: Duration::from_secs(defaults::BUSY_BACKOFF_SECS),
            batch_poll_interval: Duration::from_millis(defaults::BATCH_POLL_INTERVAL_MS),
            lane_ttl: Duration::from_secs(defaults::LANE_TTL_SECS),
            health_check_interval: Some(Duration::from_secs(defaults::HEALTH_CHECK_INTERVAL_SECS)),
            proxy_publish_mode: defaults::PROXY_PUBLISH_MODE,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let health_secs = env_or(env_vars::HEALTH_CHECK_INTERVAL_SECS, defaults::HEALTH_CHECK_INTERVAL_SECS);

        Self {
            port: env_or(env_vars::PORT, defaults::PORT),
            database_url: env_string(env_vars::DATABASE_URL, defaults::DATABASE_URL),
            message_bus: env_or(env_vars::MESSAGE_BUS, defaults::MESSAGE_BUS),
            redis_url: env_string(env_vars::REDIS_URL, defaults::REDIS_URL),
            kernel_location: env_string(env_vars::KERNEL_LOCATION, defaults::KERNEL_LOCATION),
            kernel_api_version: env_string(env_vars::KERNEL_API_VERSION, defaults::KERNEL_API_VERSION),
            kernel_http_timeout: Duration::from_secs(env_or(
                env_vars::KERNEL_HTTP_TIMEOUT_SECS,
                defaults::KERNEL_HTTP_TIMEOUT_SECS,
            )),
            api_base_urls: env_string(env_vars::API_BASE_URLS, ""),
            safety_guard_location: env_string(env_vars::SAFETY_GUARD_LOCATION, ""),
            brand_keyword: env_string(env_vars::BRAND_KEYWORD, defaults::BRAND_KEYWORD),
            max_concurrent_chat_jobs: env_or(env_vars::MAX_CONCURRENT_CHAT_JOBS, defaults::MAX_CONCURRENT_CHAT_JOBS).max(1),
            max_concurrent_batch_jobs: env_or(env_vars::MAX_CONCURRENT_BATCH_JOBS, defaults::MAX_CONCURRENT_BATCH_JOBS).max(1),
            chat_job_timeout: Duration::from_secs(env_or(env_vars::CHAT_JOB_TIMEOUT_SECS, defaults::CHAT_JOB_TIMEOUT_SECS)),
            batch_job_timeout: Duration::from_secs(env_or(env_vars::BATCH_JOB_TIMEOUT_SECS, defaults::BATCH_JOB_TIMEOUT_SECS)),
            busy_backoff: Duration::from_secs(env_or(env_vars::BUSY_BACKOFF_SECS, defaults::BUSY_BACKOFF_SECS)),
            batch_poll_interval: Duration::from_millis(env_or(
                env_vars::BATCH_POLL_INTERVAL_MS,
                defaults::BATCH_POLL_INTERVAL_MS,
            )),
            lane_ttl: Duration::from_secs(env_or(env_vars::LANE_TTL_SECS, defaults::LANE_TTL_SECS)),
            health_check_interval: (health_secs > 0).then(|| Duration::from_secs(health_secs)),
            proxy_publish_mode: env_or(env_vars::PROXY_PUBLISH_MODE, defaults::PROXY_PUBLISH_MODE),
        }
    }

    /// Kernel base URL: the `kernel_location` system setting when non-blank,
    /// otherwise the env fallback. Trailing slashes are stripped.
    pub fn kernel_location(&self, db: &Database) -> String {
        let location = setting_or(db, settings_keys::KERNEL_LOCATION, &self.kernel_location);
        location.trim_end_matches('/').to_string()
    }

    /// `{kernel_location}/{api_version}`, the prefix of every kernel route.
    pub fn kernel_base(&self, db: &Database) -> String {
        format!("{}/{}", self.kernel_location(db), self.kernel_api_version)
    }

    /// Whether a safety guard is configured (system setting first, then env).
    pub fn safety_guard_configured(&self, db: &Database) -> bool {
        !setting_or(db, settings_keys::SAFETY_GUARD_LOCATION, &self.safety_guard_location)
            .trim()
            .is_empty()
    }
}

fn setting_or(db: &Database, key: &str, fallback: &str) -> String {
    match db.get_setting(key) {
        Ok(Some(value)) if !value.trim().is_empty() => value,
        Ok(_) => fallback.to_string(),
        Err(e) => {
            log::warn!("[DB] Failed to read system setting {}: {}", key, e);
            fallback.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_parsing_is_case_insensitive() {
        assert_eq!("Memory".parse::<BusBackend>().unwrap(), BusBackend::Memory);
        assert_eq!("CHAR".parse::<PublishGranularity>().unwrap(), PublishGranularity::Char);
        assert!("bogus".parse::<PublishGranularity>().is_err());
    }

    #[test]
    fn test_default_backends() {
        let config = Config::default();
        assert_eq!(config.message_bus, BusBackend::Redis);
        assert_eq!(config.proxy_publish_mode, PublishGranularity::Chunk);
    }

    #[test]
    fn test_settings_override_env_fallback() {
        let db = Database::new(":memory:").unwrap();
        let config = Config::default();

        assert_eq!(config.kernel_location(&db), defaults::KERNEL_LOCATION);
        assert!(!config.safety_guard_configured(&db));

        db.set_setting(settings_keys::KERNEL_LOCATION, "http://kernel:9000/").unwrap();
        db.set_setting(settings_keys::SAFETY_GUARD_LOCATION, "http://guard").unwrap();
        assert_eq!(config.kernel_location(&db), "http://kernel:9000");
        assert!(config.safety_guard_configured(&db));

        db.set_setting(settings_keys::KERNEL_LOCATION, "  ").unwrap();
        assert_eq!(config.kernel_location(&db), defaults::KERNEL_LOCATION);
    }
}
