// /flight-booking/services/payment-service/src/utils/config.rs

use std::{env, str::FromStr, time::Duration};
use chrono::FixedOffset;
use crate::{
    core::confirmation::GATEWAY_REFERENCE_MAX_LEN,
    utils::error::{AppError, AppResult},
};

/// Konfigurasi VNPay (terminal, secret, endpoint)
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub tmn_code: String,
    pub hash_secret: String,
    pub pay_url: String,
    pub api_url: String,
    pub return_url: String,
    pub timeout: Duration,
    /// Offset timezone gateway dalam jam (VNPay pakai GMT+7)
    pub utc_offset_hours: i32,
    /// IP server yang dikirim sebagai vnp_IpAddr ke merchant API
    pub server_ip: String,
}

impl GatewayConfig {
    pub fn offset(&self) -> AppResult<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).ok_or_else(|| {
            AppError::Configuration(format!("Invalid gateway UTC offset: {}", self.utc_offset_hours))
        })
    }
}

/// Semua konfigurasi service, dibaca sekali saat startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub port: u16,
    pub booking_service_url: String,
    pub backend_timeout: Duration,
    pub request_timeout: Duration,
    pub gateway: GatewayConfig,
    pub confirmation_prefix: String,
    pub reference_max_len: usize,
    pub guest_capacity: usize,
    pub guest_ttl: Duration,
    pub refund_ledger_ttl: Duration,
    pub redis_url: String,
    pub jwt_secret: String,
    /// Shared secret dari API gateway. Tanpa ini header X-User-* tidak pernah dipercaya.
    pub internal_secret: Option<String>,
    pub allowed_origins: Vec<String>,
}

impl AppConfig {
    /// Build config dari environment variable. Secret yang wajib tidak punya default.
    pub fn from_env() -> AppResult<Self> {
        let gateway = GatewayConfig {
            tmn_code: required("VNPAY_TMN_CODE")?,
            hash_secret: required("VNPAY_HASH_SECRET")?,
            pay_url: var_or("VNPAY_PAY_URL", "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html"),
            api_url: var_or(
                "VNPAY_API_URL",
                "https://sandbox.vnpayment.vn/merchant_webapi/api/transaction",
            ),
            return_url: var_or("VNPAY_RETURN_URL", "http://localhost:8080/payment/return"),
            timeout: Duration::from_secs(parse_or("VNPAY_TIMEOUT_SECONDS", 10)?),
            utc_offset_hours: parse_or("VNPAY_UTC_OFFSET_HOURS", 7)?,
            server_ip: var_or("SERVER_PUBLIC_IP", "127.0.0.1"),
        };
        gateway.offset()?;

        let reference_max_len = parse_or("GATEWAY_REFERENCE_MAX_LEN", GATEWAY_REFERENCE_MAX_LEN)?;
        if reference_max_len > GATEWAY_REFERENCE_MAX_LEN {
            return Err(AppError::Configuration(format!(
                "GATEWAY_REFERENCE_MAX_LEN {} melebihi batas VNPay {}",
                reference_max_len, GATEWAY_REFERENCE_MAX_LEN
            )));
        }

        let guest_capacity = parse_or("GUEST_BOOKING_CAPACITY", 10usize)?;
        if guest_capacity == 0 {
            return Err(AppError::Configuration("GUEST_BOOKING_CAPACITY harus > 0".to_string()));
        }

        Ok(Self {
            environment: var_or("ENVIRONMENT", "development").to_lowercase(),
            port: parse_or("PAYMENT_SERVICE_PORT", 3003u16)?,
            booking_service_url: var_or("BOOKING_SERVICE_URL", "http://localhost:3002"),
            backend_timeout: Duration::from_secs(parse_or("BOOKING_SERVICE_TIMEOUT_SECONDS", 5)?),
            request_timeout: Duration::from_secs(parse_or("REQUEST_TIMEOUT_SECONDS", 30)?),
            gateway,
            confirmation_prefix: var_or("CONFIRMATION_PREFIX", "FMS"),
            reference_max_len,
            guest_capacity,
            guest_ttl: Duration::from_secs(parse_or("GUEST_BOOKING_TTL_SECONDS", 30 * 24 * 3600)?),
            refund_ledger_ttl: Duration::from_secs(parse_or("REFUND_LEDGER_TTL_SECONDS", 400 * 24 * 3600)?),
            redis_url: var_or("REDIS_URL", "redis://localhost:6379"),
            jwt_secret: required("JWT_SECRET")?,
            internal_secret: env::var("INTERNAL_GATEWAY_SECRET")
                .ok()
                .filter(|secret| !secret.trim().is_empty()),
            allowed_origins: var_or("ALLOWED_ORIGINS", "http://localhost:8080")
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn required(key: &str) -> AppResult<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AppError::Configuration(format!("{} harus di-set di environment", key))),
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> AppResult<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Configuration(format!("{} tidak valid: '{}'", key, raw))),
        Err(_) => Ok(default),
    }
}
