use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub booking: BookingConfig,
    pub features: FeatureFlags,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    pub acquire_timeout_seconds: u64,
}

// Настройки Redis. Без REDIS_URL кеш мест выключен
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub seat_cache_ttl_seconds: u64,
}

// Холды и свипер
#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    pub hold_seconds: i64,
    pub sweep_interval_seconds: u64,
}

impl BookingConfig {
    pub fn default_hold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.hold_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

// Feature flags для включения/выключения функциональности
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlags {
    pub seed_demo_data: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Сборка конфигурации из произвольного источника переменных (удобно в тестах).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let hold_seconds: i64 = parse_or(&lookup, "BOOKING_HOLD_SECONDS", 300)?;
        if hold_seconds < 0 || chrono::Duration::try_seconds(hold_seconds).is_none() {
            anyhow::bail!("BOOKING_HOLD_SECONDS is out of range, got {}", hold_seconds);
        }
        let sweep_interval_seconds: u64 = parse_or(&lookup, "SWEEP_INTERVAL_SECONDS", 60)?;
        if sweep_interval_seconds == 0 {
            anyhow::bail!("SWEEP_INTERVAL_SECONDS must be greater than zero");
        }

        Ok(Config {
            app: AppConfig {
                host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&lookup, "PORT", 8000)?,
                environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
                rust_log: lookup("RUST_LOG")
                    .unwrap_or_else(|| "seat_reservation=debug,tower_http=debug".to_string()),
            },
            database: DatabaseConfig {
                url: lookup("DATABASE_URL").context("DATABASE_URL must be set")?,
                pool_size: parse_or(&lookup, "DB_POOL_SIZE", 20)?,
                acquire_timeout_seconds: parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECONDS", 5)?,
            },
            redis: RedisConfig {
                url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
                seat_cache_ttl_seconds: parse_or(&lookup, "SEAT_CACHE_TTL_SECONDS", 30)?,
            },
            booking: BookingConfig {
                hold_seconds,
                sweep_interval_seconds,
            },
            features: FeatureFlags {
                seed_demo_data: parse_or(&lookup, "SEED_DEMO_DATA", false)?,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has invalid value {:?}", key, raw)),
        None => Ok(default),
    }
}
