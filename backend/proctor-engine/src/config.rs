use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::PassPolicy;
use crate::utils::retry::RetryConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    pub tick_interval_ms: u64,
    pub escalation_threshold: u32,
    pub event_buffer: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            escalation_threshold: 3,
            event_buffer: 64,
        }
    }
}

impl SessionSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GradingSettings {
    pub pass_threshold_percent: u32,
}

impl Default for GradingSettings {
    fn default() -> Self {
        Self {
            pass_threshold_percent: PassPolicy::default().threshold_percent,
        }
    }
}

impl GradingSettings {
    pub fn pass_policy(&self) -> PassPolicy {
        PassPolicy {
            threshold_percent: self.pass_threshold_percent,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliverySettings {
    pub max_attempts: usize,
    pub base_backoff_ms: u64,
    pub results_path: Option<PathBuf>,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff_ms: 50,
            results_path: None,
        }
    }
}

impl DeliverySettings {
    pub fn retry_config(&self) -> RetryConfig {
        let base_backoff = Duration::from_millis(self.base_backoff_ms);
        RetryConfig {
            max_attempts: self.max_attempts,
            base_backoff,
            max_backoff: base_backoff * 16,
            jitter_max: Some(base_backoff / 2),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub session: SessionSettings,
    pub grading: GradingSettings,
    pub delivery: DeliverySettings,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/*.toml + ENV overrides (prefix: APP_)
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let session_defaults = SessionSettings::default();
        let delivery_defaults = DeliverySettings::default();

        let tick_interval_ms = settings
            .get_int("session.tick_interval_ms")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .or_else(|| env_number("SESSION_TICK_INTERVAL_MS"))
            .filter(|v| *v > 0)
            .unwrap_or(session_defaults.tick_interval_ms);

        let escalation_threshold = settings
            .get_int("session.escalation_threshold")
            .ok()
            .and_then(|v| u32::try_from(v).ok())
            .or_else(|| env_number("INTEGRITY_ESCALATION_THRESHOLD"))
            .filter(|v| *v > 0)
            .unwrap_or(session_defaults.escalation_threshold);

        let event_buffer = settings
            .get_int("session.event_buffer")
            .ok()
            .and_then(|v| usize::try_from(v).ok())
            .or_else(|| env_number("SESSION_EVENT_BUFFER"))
            .filter(|v| *v > 0)
            .unwrap_or(session_defaults.event_buffer);

        let pass_threshold_percent = settings
            .get_int("grading.pass_threshold_percent")
            .ok()
            .and_then(|v| u32::try_from(v).ok())
            .or_else(|| env_number("PASS_THRESHOLD_PERCENT"))
            .filter(|v| *v <= 100)
            .unwrap_or_else(|| GradingSettings::default().pass_threshold_percent);

        let max_attempts = settings
            .get_int("delivery.max_attempts")
            .ok()
            .and_then(|v| usize::try_from(v).ok())
            .or_else(|| env_number("RESULT_DELIVERY_ATTEMPTS"))
            .filter(|v| *v > 0)
            .unwrap_or(delivery_defaults.max_attempts);

        let base_backoff_ms = settings
            .get_int("delivery.base_backoff_ms")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .or_else(|| env_number("RESULT_DELIVERY_BACKOFF_MS"))
            .unwrap_or(delivery_defaults.base_backoff_ms);

        let results_path = settings
            .get_string("delivery.results_path")
            .or_else(|_| env::var("RESULTS_PATH"))
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(Config {
            session: SessionSettings {
                tick_interval_ms,
                escalation_threshold,
                event_buffer,
            },
            grading: GradingSettings {
                pass_threshold_percent,
            },
            delivery: DeliverySettings {
                max_attempts,
                base_backoff_ms,
                results_path,
            },
        })
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}
