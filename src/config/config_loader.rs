use std::{str::FromStr, thread};

use anyhow::{Context, Result, anyhow};

use crate::config::{
    config_model::{Database, DotEnvyConfig, Server},
    stage::Stage,
};

pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 10;
pub const DEFAULT_CONNECT_BACKOFF_SECS: u64 = 2;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 5;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    load_from(|key| std::env::var(key).ok())
}

/// Builds the config from an arbitrary key lookup so it can be exercised
/// without touching the process environment.
pub fn load_from<F>(lookup: F) -> Result<DotEnvyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let server = Server {
        port: required(&lookup, "SERVER_PORT")?,
        body_limit: required(&lookup, "SERVER_BODY_LIMIT")?,
        timeout: required(&lookup, "SERVER_TIMEOUT")?,
    };

    let database = Database {
        url: lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("DATABASE_URL is invalid"))?,
        max_pool_size: optional(&lookup, "DATABASE_MAX_POOL_SIZE", default_pool_size)?,
        connect_attempts: optional(&lookup, "DATABASE_CONNECT_ATTEMPTS", || {
            DEFAULT_CONNECT_ATTEMPTS
        })?,
        connect_backoff: optional(&lookup, "DATABASE_CONNECT_BACKOFF", || {
            DEFAULT_CONNECT_BACKOFF_SECS
        })?,
        query_timeout: optional(&lookup, "DATABASE_QUERY_TIMEOUT", || {
            DEFAULT_QUERY_TIMEOUT_SECS
        })?,
    };

    if database.max_pool_size == 0 {
        return Err(anyhow!("DATABASE_MAX_POOL_SIZE must be greater than zero"));
    }

    Ok(DotEnvyConfig { server, database })
}

pub fn get_stage() -> Stage {
    dotenvy::dotenv().ok();

    let stage_str = std::env::var("STAGE").unwrap_or("".to_string());
    Stage::try_from(&stage_str).unwrap_or_default()
}

/// One connection per available processor.
fn default_pool_size() -> u32 {
    thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}

fn required<F, T>(lookup: &F, key: &str) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = lookup(key).ok_or_else(|| anyhow!("{} is invalid", key))?;
    raw.trim()
        .parse()
        .with_context(|| format!("{} is invalid", key))
}

fn optional<F, T, D>(lookup: &F, key: &str, default: D) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    D: FnOnce() -> T,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} is invalid", key)),
        None => Ok(default()),
    }
}
