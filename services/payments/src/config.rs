use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context as _, anyhow};
use secrecy::SecretString;

use paygate_core::telemetry::LogFormat;

use crate::domain::types::DEFAULT_PAYMENT_EVENTS_QUEUE;

/// Payments service configuration loaded from environment variables.
#[derive(Debug)]
pub struct PaymentsConfig {
    /// PostgreSQL connection URL. Env var: `DATABASE_URL`.
    pub database_url: String,
    /// Redis URL backing the message transport (default "redis://127.0.0.1:6379").
    pub redis_url: String,
    /// Queue receiving payment events (default "payment_events").
    pub payment_events_queue: String,
    /// Base URL of the Wise API, e.g. "https://api.sandbox.transferwise.tech".
    pub wise_api_url: String,
    pub wise_api_key: SecretString,
    pub wise_profile_id: u64,
    /// Currency payouts are quoted into (default "INR").
    pub payout_target_currency: String,
    /// Per-request timeout for provider calls (default 30s).
    pub provider_timeout: Duration,
    /// Bound for each message transport round trip (default 5s).
    pub transport_timeout: Duration,
    /// TCP port for the HTTP server (default 3001). Env var: `PAYMENTS_PORT`.
    pub payments_port: u16,
    /// Reconnect interval for the message transport; `None` disables the loop.
    pub event_reconnect_interval: Option<Duration>,
    /// Bound of the in-memory mirror of stored payment events (default 100).
    pub recent_events_capacity: usize,
    pub log_format: LogFormat,
}

impl PaymentsConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &str| var(name).ok_or_else(|| anyhow!("{name} must be set"));

        let reconnect_secs: u64 = parse_or(&var, "EVENT_RECONNECT_INTERVAL_SECS", 0)?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            redis_url: var("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_owned()),
            payment_events_queue: var("PAYMENT_EVENTS_QUEUE")
                .unwrap_or_else(|| DEFAULT_PAYMENT_EVENTS_QUEUE.to_owned()),
            wise_api_url: required("WISE_API_URL")?,
            wise_api_key: SecretString::from(required("WISE_API_KEY")?),
            wise_profile_id: required("WISE_PROFILE_ID")?
                .parse()
                .context("WISE_PROFILE_ID must be an unsigned integer")?,
            payout_target_currency: var("PAYOUT_TARGET_CURRENCY")
                .map(|c| c.to_ascii_uppercase())
                .unwrap_or_else(|| "INR".to_owned()),
            provider_timeout: Duration::from_secs(parse_or(&var, "PROVIDER_TIMEOUT_SECS", 30)?),
            transport_timeout: Duration::from_secs(parse_or(&var, "TRANSPORT_TIMEOUT_SECS", 5)?),
            payments_port: parse_or(&var, "PAYMENTS_PORT", 3001)?,
            event_reconnect_interval: (reconnect_secs > 0)
                .then(|| Duration::from_secs(reconnect_secs)),
            recent_events_capacity: parse_or(&var, "RECENT_EVENTS_CAPACITY", 100)?,
            log_format: match var("LOG_FORMAT") {
                Some(v) => v.parse().map_err(anyhow::Error::msg)?,
                None => LogFormat::default(),
            },
        })
    }
}

fn parse_or<T>(var: impl Fn(&str) -> Option<String>, name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} is malformed: {raw:?}")),
        None => Ok(default),
    }
}
