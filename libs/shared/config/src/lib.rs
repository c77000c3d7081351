use std::env;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const CANCELLATION_NOTICE_HOURS: RangeInclusive<i64> = 0..=720;
pub const MAX_ADVANCE_BOOKING_DAYS: RangeInclusive<i64> = 1..=3650;
pub const DEFAULT_APPOINTMENT_MINUTES: RangeInclusive<i64> = 1..=1440;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database_path: String,
    pub jwt_secret: String,
    pub server_port: u16,
    pub busy_timeout_ms: u64,
    pub cancellation_notice_hours: i64,
    pub max_advance_booking_days: i64,
    pub default_appointment_minutes: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: "clinic.db".to_string(),
            jwt_secret: String::new(),
            server_port: 3000,
            busy_timeout_ms: 5000,
            cancellation_notice_hours: 24,
            max_advance_booking_days: 90,
            default_appointment_minutes: 60,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| {
                    warn!("DATABASE_PATH not set, using {}", defaults.database_path);
                    defaults.database_path.clone()
                }),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            server_port: parse_or("SERVER_PORT", defaults.server_port),
            busy_timeout_ms: parse_or("DATABASE_BUSY_TIMEOUT_MS", defaults.busy_timeout_ms),
            cancellation_notice_hours: parse_in_range(
                "CANCELLATION_NOTICE_HOURS",
                defaults.cancellation_notice_hours,
                CANCELLATION_NOTICE_HOURS,
            ),
            max_advance_booking_days: parse_in_range(
                "MAX_ADVANCE_BOOKING_DAYS",
                defaults.max_advance_booking_days,
                MAX_ADVANCE_BOOKING_DAYS,
            ),
            default_appointment_minutes: parse_in_range(
                "DEFAULT_APPOINTMENT_MINUTES",
                defaults.default_appointment_minutes,
                DEFAULT_APPOINTMENT_MINUTES,
            ),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.jwt_secret.is_empty() && !self.database_path.is_empty()
    }

    /// True when the database lives only in memory (tests, ephemeral runs).
    pub fn is_in_memory_database(&self) -> bool {
        self.database_path == ":memory:"
    }
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => {
            warn!("{} not set, using default {}", key, default);
            default
        }
    }
}

fn parse_in_range(key: &str, default: i64, range: RangeInclusive<i64>) -> i64 {
    let value = parse_or(key, default);
    if range.contains(&value) {
        value
    } else {
        warn!(
            "{} must be within {}..={}, got {}, using default {}",
            key,
            range.start(),
            range.end(),
            value,
            default
        );
        default
    }
}
