// src/config.rs

use std::{env, str::FromStr, time::Duration};

use dotenvy::dotenv;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub rust_log: String,
    pub port: u16,

    /// Number of practice question ids; the practice line is `1..=total_questions`.
    pub total_questions: usize,

    pub media_dir: String,
    pub cors_origins: Vec<String>,

    /// How long a new connection waits for the connection it replaces to close.
    pub supersede_timeout: Duration,

    /// Ping period of every websocket.
    pub heartbeat_interval: Duration,

    /// A connection with no inbound frame (pongs included) for this long is dropped.
    pub heartbeat_timeout: Duration,

    pub reaper: ReaperConfig,
}

/// Settings of the background account and handler sweeps.
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    pub orphan_interval: Duration,
    pub forgotten_interval: Duration,

    /// Accounts that reached this practice index are never reaped.
    pub min_practice_index: i32,

    /// Accounts younger than this are never reaped.
    pub grace_period: Duration,

    /// Named accounts starting with this prefix are reaped like anonymous ones.
    pub test_account_prefix: String,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            orphan_interval: Duration::from_secs(30),
            forgotten_interval: Duration::from_secs(60),
            min_practice_index: 5,
            grace_period: Duration::from_secs(5 * 60),
            test_account_prefix: "test-".to_string(),
        }
    }
}

fn var_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid value '{}' for {}", raw, key);
            default
        }),
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let defaults = ReaperConfig::default();
        let reaper = ReaperConfig {
            orphan_interval: Duration::from_secs(var_or("ORPHAN_SWEEP_SECS", 30)),
            forgotten_interval: Duration::from_secs(var_or("FORGOTTEN_SWEEP_SECS", 60)),
            min_practice_index: var_or("REAP_MIN_PRACTICE_INDEX", defaults.min_practice_index),
            grace_period: Duration::from_secs(var_or("REAP_GRACE_SECS", 300)),
            test_account_prefix: env::var("TEST_ACCOUNT_PREFIX")
                .unwrap_or(defaults.test_account_prefix),
        };

        Self {
            database_url,
            rust_log,
            port: var_or("PORT", 8000),
            total_questions: var_or("TOTAL_QUESTIONS", 2016),
            media_dir: env::var("MEDIA_DIR").unwrap_or_else(|_| "../media".to_string()),
            cors_origins,
            supersede_timeout: Duration::from_millis(var_or("SUPERSEDE_TIMEOUT_MS", 2000)),
            heartbeat_interval: Duration::from_secs(var_or("HEARTBEAT_INTERVAL_SECS", 20u64).max(1)),
            heartbeat_timeout: Duration::from_secs(var_or("HEARTBEAT_TIMEOUT_SECS", 60)),
            reaper,
        }
    }
}
