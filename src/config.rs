use std::env;
use std::time::Duration;

use crate::error::AppError;
use crate::notify::DEFAULT_OUTBOX_CAPACITY;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_buffer_size: usize,
    pub assignment_interval: Duration,
    pub search_radii_m: Vec<u32>,
    pub gateway_timeout: Duration,
    pub admin_email: String,
    pub geocoder: GeocoderConfig,
    pub mailer: MailerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    pub mapquest_key: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub api_key: Option<String>,
    pub sender_email: String,
    pub sender_name: String,
    pub base_url: String,
    /// Emails the in-memory outbox keeps when no API key is set.
    pub outbox_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        };

        let radii_raw =
            env::var("SEARCH_RADII_METERS").unwrap_or_else(|_| "5000,15000,50000".to_string());

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            assignment_interval: Duration::from_secs(parse_or_default(
                "ASSIGNMENT_INTERVAL_SECS",
                120,
            )?),
            search_radii_m: parse_radii(&radii_raw)?,
            gateway_timeout: Duration::from_millis(parse_or_default("GATEWAY_TIMEOUT_MS", 10_000)?),
            admin_email: env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@yourapp.com".to_string()),
            geocoder: GeocoderConfig {
                mapquest_key: non_empty_var("MAPQUEST_KEY"),
                base_url: env::var("GEOCODER_URL").unwrap_or_else(|_| {
                    "https://www.mapquestapi.com/geocoding/v1/address".to_string()
                }),
            },
            mailer: MailerConfig {
                api_key: non_empty_var("MAILERSEND_API_KEY"),
                sender_email: env::var("SENDER_EMAIL")
                    .unwrap_or_else(|_| "no-reply@yourapp.com".to_string()),
                sender_name: env::var("SENDER_NAME").unwrap_or_else(|_| "Food Dispatch".to_string()),
                base_url: env::var("MAILER_URL")
                    .unwrap_or_else(|_| "https://api.mailersend.com/v1/email".to_string()),
                outbox_capacity: parse_or_default("OUTBOX_CAPACITY", DEFAULT_OUTBOX_CAPACITY)?,
            },
        })
    }
}

/// Parses a comma separated list of search radii in meters. The list must be
/// non-empty and strictly ascending.
pub fn parse_radii(raw: &str) -> Result<Vec<u32>, AppError> {
    let radii = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u32>()
                .map_err(|err| AppError::Internal(format!("invalid SEARCH_RADII_METERS: {err}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if radii.is_empty() {
        return Err(AppError::Internal(
            "SEARCH_RADII_METERS must name at least one radius".to_string(),
        ));
    }

    if radii.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(AppError::Internal(
            "SEARCH_RADII_METERS must be strictly ascending".to_string(),
        ));
    }

    Ok(radii)
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
