use std::{env, time::Duration};

use anyhow::{Context, bail};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub carrier: CarrierConfig,
    /// Seconds between background status sync runs; `0` disables the job.
    pub status_sync_interval_secs: u64,
}

/// Connection and shipment defaults for the EcoTrack carrier API.
#[derive(Debug, Clone)]
pub struct CarrierConfig {
    pub base_url: String,
    pub api_token: String,
    pub shop_id: Option<String>,
    pub timeout: Duration,
    pub deduct_stock: bool,
    pub default_weight: u32,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = required("JWT_SECRET")?;
        let status_sync_interval_secs = env::var("STATUS_SYNC_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(300);

        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            carrier: CarrierConfig::from_env()?,
            status_sync_interval_secs,
        })
    }
}

impl CarrierConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let base_url = required("ECOTRACK_BASE_URL")?;
        let api_token = required("ECOTRACK_API_TOKEN")?;
        let shop_id = env::var("ECOTRACK_SHOP_ID")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let timeout_secs = env::var("ECOTRACK_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);
        let deduct_stock = env::var("ECOTRACK_DEDUCT_STOCK")
            .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let default_weight = env::var("ECOTRACK_DEFAULT_WEIGHT")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(1);

        Self::new(base_url, api_token).map(|cfg| Self {
            shop_id,
            timeout: Duration::from_secs(timeout_secs),
            deduct_stock,
            default_weight,
            ..cfg
        })
    }

    /// Builds a config with defaults, rejecting a blank url or token.
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> anyhow::Result<Self> {
        let base_url = base_url.into();
        let api_token = api_token.into();
        if base_url.trim().is_empty() {
            bail!("carrier base url must not be empty");
        }
        if api_token.trim().is_empty() {
            bail!("carrier api token must not be empty");
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
            shop_id: None,
            timeout: Duration::from_secs(30),
            deduct_stock: false,
            default_weight: 1,
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    let value = env::var(key).with_context(|| format!("{key} is not set"))?;
    if value.trim().is_empty() {
        bail!("{key} is set but empty");
    }
    Ok(value)
}
