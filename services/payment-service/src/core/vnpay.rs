// /flight-booking/services/payment-service/src/core/vnpay.rs

use std::collections::BTreeMap;
use async_trait::async_trait;
use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha512;
use uuid::Uuid;
use crate::{
    core::confirmation::TransactionReference,
    models::*,
    utils::config::GatewayConfig,
    utils::error::{AppError, AppResult},
};

type HmacSha512 = Hmac<Sha512>;

/// Versi API VNPay yang dipakai untuk pay URL dan merchant API
pub const VNPAY_VERSION: &str = "2.1.0";

/// Format tanggal VNPay (yyyyMMddHHmmss, waktu GMT+7)
pub const VNPAY_DATE_FORMAT: &str = "%Y%m%d%H%M%S";

const PAYMENT_EXPIRY_MINUTES: i64 = 15;

/// Payment gateway yang dipakai orchestrator. Charge/refund dieksekusi di sini,
/// keputusan boleh/tidaknya di orchestrator.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Build redirect URL untuk membayar `amount` dengan reference tertentu
    async fn create_payment_url(&self, request: &PaymentUrlRequest) -> AppResult<String>;

    /// Query status transaksi (querydr)
    async fn query_transaction(
        &self,
        reference: &TransactionReference,
        transaction_date: &str,
    ) -> AppResult<GatewayTransactionStatus>;

    /// Refund sebagian atau seluruh transaksi
    async fn refund(&self, request: &GatewayRefundRequest) -> AppResult<GatewayRefundResult>;
}

/// HMAC-SHA512 hex (lowercase) atas data dengan shared secret
pub fn sign(secret: &str, data: &str) -> String {
    let mut mac = <HmacSha512 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(data.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify signature hex secara constant-time. Hex yang rusak dianggap invalid.
pub fn verify_signature(secret: &str, data: &str, signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex) else {
        return false;
    };

    let mut mac = <HmacSha512 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(data.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

/// Canonical query string VNPay: key diurutkan, value di-encode, spasi jadi '+'
pub fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value).replace("%20", "+")
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Convert VND amount ke minor unit VNPay (x100). VND tidak punya pecahan.
pub fn to_minor_units(amount: &BigDecimal) -> AppResult<i64> {
    if amount <= &BigDecimal::zero() {
        return Err(AppError::InvalidAmount(format!("Amount {} harus lebih besar dari 0", amount)));
    }

    if !amount.is_integer() {
        return Err(AppError::InvalidAmount(format!("Amount {} tidak boleh pecahan untuk VND", amount)));
    }

    (amount.clone() * BigDecimal::from(100))
        .to_i64()
        .ok_or_else(|| AppError::InvalidAmount(format!("Amount {} terlalu besar", amount)))
}

/// Convert minor unit VNPay balik ke VND
pub fn from_minor_units(raw: &str) -> Option<BigDecimal> {
    raw.parse::<i64>()
        .ok()
        .map(|minor| BigDecimal::from(minor) / BigDecimal::from(100))
}

/// Client untuk integrasi dengan VNPay payment gateway
pub struct VnpayClient {
    client: Client,
    config: GatewayConfig,
    offset: FixedOffset,
}

impl VnpayClient {
    /// Initialize VNPay client
    pub fn new(config: GatewayConfig) -> AppResult<Self> {
        let offset = config.offset()?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config, offset })
    }

    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }

    /// Kirim request ke merchant API dan verify checksum response
    async fn call_merchant_api<T: serde::Serialize + Sync>(
        &self,
        request: &T,
        response_fields: &[&str],
    ) -> AppResult<VnpayApiResponse> {
        let response = self.client
            .post(&self.config.api_url)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::GatewayUnavailable(format!(
                "VNPay merchant API returned {}: {}",
                status, error_text
            )));
        }

        let body: serde_json::Value = response.json().await
            .map_err(|e| AppError::GatewayUnavailable(format!("Failed to parse VNPay response: {}", e)))?;

        // Response tanpa checksum tidak pernah dipercaya
        let Some(signature) = body.get("vnp_SecureHash").and_then(|v| v.as_str()) else {
            tracing::warn!(target: "audit", "VNPay merchant API response without checksum");
            return Err(AppError::SignatureInvalid("VNPay response has no checksum".to_string()));
        };

        let data = response_fields
            .iter()
            .map(|field| body.get(*field).map(json_to_plain).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("|");

        if !verify_signature(&self.config.hash_secret, &data, signature) {
            tracing::warn!(target: "audit", "VNPay merchant API response checksum mismatch");
            return Err(AppError::SignatureInvalid("VNPay response checksum mismatch".to_string()));
        }

        serde_json::from_value(body)
            .map_err(|e| AppError::GatewayUnavailable(format!("Unexpected VNPay response shape: {}", e)))
    }
}

fn json_to_plain(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

const QUERY_RESPONSE_FIELDS: &[&str] = &[
    "vnp_ResponseId",
    "vnp_Command",
    "vnp_ResponseCode",
    "vnp_Message",
    "vnp_TmnCode",
    "vnp_TxnRef",
    "vnp_Amount",
    "vnp_BankCode",
    "vnp_PayDate",
    "vnp_TransactionNo",
    "vnp_TransactionType",
    "vnp_TransactionStatus",
    "vnp_OrderInfo",
    "vnp_PromotionCode",
    "vnp_PromotionAmount",
];

const REFUND_RESPONSE_FIELDS: &[&str] = &[
    "vnp_ResponseId",
    "vnp_Command",
    "vnp_ResponseCode",
    "vnp_Message",
    "vnp_TmnCode",
    "vnp_TxnRef",
    "vnp_Amount",
    "vnp_BankCode",
    "vnp_PayDate",
    "vnp_TransactionNo",
    "vnp_TransactionType",
    "vnp_TransactionStatus",
    "vnp_OrderInfo",
];

#[async_trait]
impl GatewayClient for VnpayClient {
    async fn create_payment_url(&self, request: &PaymentUrlRequest) -> AppResult<String> {
        let minor_units = to_minor_units(&request.amount)?;
        let created_at = self.now();
        let expires_at = created_at + Duration::minutes(PAYMENT_EXPIRY_MINUTES);

        let mut params = BTreeMap::new();
        params.insert("vnp_Version".to_string(), VNPAY_VERSION.to_string());
        params.insert("vnp_Command".to_string(), "pay".to_string());
        params.insert("vnp_TmnCode".to_string(), self.config.tmn_code.clone());
        params.insert("vnp_Amount".to_string(), minor_units.to_string());
        params.insert("vnp_CurrCode".to_string(), "VND".to_string());
        params.insert("vnp_TxnRef".to_string(), request.reference.clone());
        params.insert("vnp_OrderInfo".to_string(), request.order_info.clone());
        params.insert("vnp_OrderType".to_string(), "other".to_string());
        params.insert("vnp_Locale".to_string(), "vn".to_string());
        params.insert("vnp_ReturnUrl".to_string(), self.config.return_url.clone());
        params.insert("vnp_IpAddr".to_string(), request.client_ip.clone());
        params.insert("vnp_CreateDate".to_string(), created_at.format(VNPAY_DATE_FORMAT).to_string());
        params.insert("vnp_ExpireDate".to_string(), expires_at.format(VNPAY_DATE_FORMAT).to_string());

        let query = canonical_query(&params);
        let secure_hash = sign(&self.config.hash_secret, &query);

        tracing::debug!("VNPay payment URL built for reference {}", request.reference);

        Ok(format!("{}?{}&vnp_SecureHash={}", self.config.pay_url, query, secure_hash))
    }

    async fn query_transaction(
        &self,
        reference: &TransactionReference,
        transaction_date: &str,
    ) -> AppResult<GatewayTransactionStatus> {
        let request_id = Uuid::new_v4().simple().to_string();
        let create_date = self.now().format(VNPAY_DATE_FORMAT).to_string();
        let order_info = format!("Query transaction {}", reference);

        let hash_data = [
            request_id.as_str(),
            VNPAY_VERSION,
            "querydr",
            self.config.tmn_code.as_str(),
            reference.as_str(),
            transaction_date,
            create_date.as_str(),
            self.config.server_ip.as_str(),
            order_info.as_str(),
        ]
        .join("|");

        let request = VnpayQueryRequest {
            vnp_SecureHash: sign(&self.config.hash_secret, &hash_data),
            vnp_RequestId: request_id,
            vnp_Version: VNPAY_VERSION.to_string(),
            vnp_Command: "querydr".to_string(),
            vnp_TmnCode: self.config.tmn_code.clone(),
            vnp_TxnRef: reference.as_str().to_string(),
            vnp_OrderInfo: order_info,
            vnp_TransactionDate: transaction_date.to_string(),
            vnp_CreateDate: create_date,
            vnp_IpAddr: self.config.server_ip.clone(),
        };

        let response = self.call_merchant_api(&request, QUERY_RESPONSE_FIELDS).await?;

        if response.vnp_ResponseCode != "00" {
            return Err(AppError::GatewayRejected {
                code: response.vnp_ResponseCode,
                message: response.vnp_Message.unwrap_or_else(|| "querydr failed".to_string()),
            });
        }

        if response.vnp_TxnRef.as_deref() != Some(reference.as_str()) {
            tracing::warn!(
                target: "audit",
                "VNPay querydr answered {:?} for reference {}",
                response.vnp_TxnRef,
                reference
            );
            return Err(AppError::GatewayUnavailable(format!(
                "VNPay querydr response is for a different reference than {}",
                reference
            )));
        }

        let amount = response
            .vnp_Amount
            .as_deref()
            .and_then(from_minor_units)
            .ok_or_else(|| {
                AppError::GatewayUnavailable(format!("VNPay querydr response for {} has no valid amount", reference))
            })?;

        tracing::info!(
            "VNPay querydr for {}: transaction_status={:?}",
            reference,
            response.vnp_TransactionStatus
        );

        Ok(GatewayTransactionStatus {
            reference: reference.as_str().to_string(),
            transaction_status: response.vnp_TransactionStatus.unwrap_or_default(),
            transaction_no: response.vnp_TransactionNo,
            amount: Some(amount),
            bank_code: response.vnp_BankCode,
            pay_date: response.vnp_PayDate,
            message: response.vnp_Message,
        })
    }

    async fn refund(&self, request: &GatewayRefundRequest) -> AppResult<GatewayRefundResult> {
        let minor_units = to_minor_units(&request.amount)?.to_string();
        let request_id = Uuid::new_v4().simple().to_string();
        let create_date = self.now().format(VNPAY_DATE_FORMAT).to_string();
        // 02 = full refund, 03 = partial refund
        let transaction_type = if request.full_refund { "02" } else { "03" };

        let hash_data = [
            request_id.as_str(),
            VNPAY_VERSION,
            "refund",
            self.config.tmn_code.as_str(),
            transaction_type,
            request.reference.as_str(),
            minor_units.as_str(),
            request.transaction_no.as_str(),
            request.transaction_date.as_str(),
            request.created_by.as_str(),
            create_date.as_str(),
            self.config.server_ip.as_str(),
            request.reason.as_str(),
        ]
        .join("|");

        let body = VnpayRefundRequest {
            vnp_SecureHash: sign(&self.config.hash_secret, &hash_data),
            vnp_RequestId: request_id,
            vnp_Version: VNPAY_VERSION.to_string(),
            vnp_Command: "refund".to_string(),
            vnp_TmnCode: self.config.tmn_code.clone(),
            vnp_TransactionType: transaction_type.to_string(),
            vnp_TxnRef: request.reference.clone(),
            vnp_Amount: minor_units,
            vnp_TransactionNo: request.transaction_no.clone(),
            vnp_TransactionDate: request.transaction_date.clone(),
            vnp_CreateBy: request.created_by.clone(),
            vnp_CreateDate: create_date,
            vnp_IpAddr: self.config.server_ip.clone(),
            vnp_OrderInfo: request.reason.clone(),
        };

        let response = self.call_merchant_api(&body, REFUND_RESPONSE_FIELDS).await?;

        if response.vnp_ResponseCode != "00" {
            return Err(AppError::GatewayRejected {
                code: response.vnp_ResponseCode,
                message: response.vnp_Message.unwrap_or_else(|| "refund failed".to_string()),
            });
        }

        Ok(GatewayRefundResult {
            response_code: response.vnp_ResponseCode,
            transaction_no: response.vnp_TransactionNo,
            message: response.vnp_Message,
        })
    }
}
