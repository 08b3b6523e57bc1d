use std::env;
use std::str::FromStr;

use anyhow::{Context, anyhow};
use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;
use dotenvy::dotenv;

use crate::ledger::lateness::WorkSchedule;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    pub log_dir: String,
    pub log_level: String,

    pub schedule: WorkSchedule,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests don't touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{key} must be set"));

        let schedule = WorkSchedule {
            work_start: parse_or(&lookup, "WORK_START_TIME", "09:00", parse_time)?,
            work_end: parse_or(&lookup, "WORK_END_TIME", "18:00", parse_time)?,
            late_threshold_minutes: parse_or(&lookup, "LATE_THRESHOLD_MINUTES", "15", parse_from_str)?,
            early_checkout_threshold_minutes: parse_or(
                &lookup,
                "EARLY_CHECKOUT_THRESHOLD_MINUTES",
                "15",
                parse_from_str,
            )?,
            weekly_off: parse_or(&lookup, "WEEKLY_OFF_DAY", "Sun", parse_weekday)?,
            time_zone: parse_or(&lookup, "APP_TIMEZONE", "UTC", parse_time_zone)?,
        };

        if schedule.work_end <= schedule.work_start {
            return Err(anyhow!("WORK_END_TIME must be after WORK_START_TIME"));
        }

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parse_or(&lookup, "ACCESS_TOKEN_TTL", "900", parse_from_str)?, // 15 min
            refresh_token_ttl: parse_or(&lookup, "REFRESH_TOKEN_TTL", "604800", parse_from_str)?, // 7 days

            rate_login_per_min: parse_or(&lookup, "RATE_LOGIN_PER_MIN", "60", parse_from_str)?,
            rate_register_per_min: parse_or(&lookup, "RATE_REGISTER_PER_MIN", "30", parse_from_str)?,
            rate_refresh_per_min: parse_or(&lookup, "RATE_REFRESH_PER_MIN", "30", parse_from_str)?,
            rate_protected_per_min: parse_or(
                &lookup,
                "RATE_PROTECTED_PER_MIN",
                "1000",
                parse_from_str,
            )?,

            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api".to_string()),
            log_dir: lookup("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),

            schedule,
        })
    }
}

fn parse_or<F, T>(
    lookup: &F,
    key: &str,
    default: &str,
    parse: fn(&str) -> anyhow::Result<T>,
) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    parse(raw.trim()).with_context(|| format!("invalid {key} value: {raw:?}"))
}

fn parse_from_str<T>(raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(raw.parse::<T>()?)
}

fn parse_time(raw: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(Into::into)
}

fn parse_weekday(raw: &str) -> anyhow::Result<Weekday> {
    raw.parse::<Weekday>()
        .map_err(|_| anyhow!("expected a weekday such as Sun or Friday"))
}

fn parse_time_zone(raw: &str) -> anyhow::Result<Tz> {
    raw.parse::<Tz>().map_err(|e| anyhow!("{e}"))
}
