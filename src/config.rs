// config.rs
use std::ops::RangeInclusive;

use thiserror::Error;

/// Accepted range for `LISTING_TTL_DAYS`.
pub const LISTING_TTL_DAYS_RANGE: RangeInclusive<i64> = 1..=3650;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Credentials for the media host that receives signed direct uploads.
#[derive(Debug, Clone, Default)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub upload_preset: Option<String>,
}

impl CloudinaryConfig {
    pub fn is_configured(&self) -> bool {
        !self.cloud_name.is_empty() && !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub port: u16,
    pub redis_url: Option<String>,
    pub cors_origins: Vec<String>,
    pub cloudinary: CloudinaryConfig,
    // Listing lifecycle
    pub listing_sweep_interval_secs: u64,
    pub listing_sweep_on_request: bool,
    pub listing_ttl_days: i64,
}

impl Config {
    pub fn init() -> Result<Config, ConfigError> {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET_KEY")?;

        let jwt_maxage = parse_or("JWT_MAXAGE", optional("JWT_MAXAGE"), 60)?;
        let port = parse_or("PORT", optional("PORT"), 8000)?;

        let cors_origins = optional("CORS_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec!["http://localhost:5173".to_string(), "http://localhost:8000".to_string()]);

        let cloudinary = CloudinaryConfig {
            cloud_name: optional("CLOUDINARY_CLOUD_NAME").unwrap_or_default(),
            api_key: optional("CLOUDINARY_API_KEY").unwrap_or_default(),
            api_secret: optional("CLOUDINARY_API_SECRET").unwrap_or_default(),
            upload_preset: optional("CLOUDINARY_UPLOAD_PRESET"),
        };

        let listing_sweep_interval_secs = parse_or(
            "LISTING_SWEEP_INTERVAL_SECS",
            optional("LISTING_SWEEP_INTERVAL_SECS"),
            300,
        )?;
        let listing_sweep_on_request = parse_or(
            "LISTING_SWEEP_ON_REQUEST",
            optional("LISTING_SWEEP_ON_REQUEST"),
            false,
        )?;
        let listing_ttl_days = parse_or("LISTING_TTL_DAYS", optional("LISTING_TTL_DAYS"), 30)?;
        if !LISTING_TTL_DAYS_RANGE.contains(&listing_ttl_days) {
            return Err(ConfigError::Invalid {
                key: "LISTING_TTL_DAYS",
                value: listing_ttl_days.to_string(),
            });
        }

        Ok(Config {
            database_url,
            jwt_secret,
            jwt_maxage,
            port,
            redis_url: optional("REDIS_URL"),
            cors_origins,
            cloudinary,
            listing_sweep_interval_secs,
            listing_sweep_on_request,
            listing_ttl_days,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}
