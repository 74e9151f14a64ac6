use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub payment_window_secs: u32,
    pub local_utc_offset_hours: i32,
    pub wallet: WalletConfig,
}

#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub endpoint: String,
    pub partner_code: String,
    pub access_key: String,
    pub secret_key: String,
    pub return_url: String,
    pub ipn_url: String,
}

impl Config {
    pub fn local_offset(&self) -> Result<chrono::FixedOffset, AppError> {
        self.local_utc_offset_hours
            .checked_mul(3600)
            .and_then(chrono::FixedOffset::east_opt)
            .ok_or_else(|| {
                AppError::Server(format!(
                    "invalid LOCAL_UTC_OFFSET_HOURS: {}",
                    self.local_utc_offset_hours
                ))
            })
    }

    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            payment_window_secs: parse_or_default("PAYMENT_WINDOW_SECS", 300)?,
            local_utc_offset_hours: parse_or_default("LOCAL_UTC_OFFSET_HOURS", 7)?,
            wallet: WalletConfig {
                endpoint: env_or("WALLET_ENDPOINT", "http://localhost:9090/v2/gateway/create"),
                partner_code: env_or("WALLET_PARTNER_CODE", "PARTNER_DEV"),
                access_key: env_or("WALLET_ACCESS_KEY", "dev-access-key"),
                secret_key: env_or("WALLET_SECRET_KEY", "dev-secret-key"),
                return_url: env_or("WALLET_RETURN_URL", "http://localhost:3000/payments/return"),
                ipn_url: env_or("WALLET_IPN_URL", "http://localhost:3000/payments/ipn"),
            },
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Server(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
