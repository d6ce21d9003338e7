// /flight-booking/services/payment-service/src/core/gateway_return.rs

use std::collections::{BTreeMap, HashMap};
use bigdecimal::BigDecimal;
use crate::{
    core::confirmation::ConfirmationCodeCodec,
    core::vnpay::{canonical_query, from_minor_units, verify_signature},
    models::*,
};

/// Field callback VNPay 2.1.0 yang wajib ada
const REQUIRED_FIELDS: &[&str] = &[
    "vnp_TmnCode",
    "vnp_Amount",
    "vnp_TxnRef",
    "vnp_ResponseCode",
    "vnp_SecureHash",
];

/// Field callback VNPay 2.1.0 yang boleh ada
const OPTIONAL_FIELDS: &[&str] = &[
    "vnp_TransactionNo",
    "vnp_BankCode",
    "vnp_BankTranNo",
    "vnp_CardType",
    "vnp_PayDate",
    "vnp_OrderInfo",
    "vnp_TransactionStatus",
    "vnp_SecureHashType",
];

/// Field yang tidak ikut di-sign
const UNSIGNED_FIELDS: &[&str] = &["vnp_SecureHash", "vnp_SecureHashType"];

/// Callback return/IPN yang sudah di-parse dari query string
#[derive(Debug, Clone)]
pub struct GatewayCallback {
    pub tmn_code: String,
    pub amount: BigDecimal,
    pub reference: String,
    pub response_code: GatewayResponseCode,
    pub transaction_no: Option<String>,
    pub transaction_status: Option<String>,
    pub pay_date: Option<String>,
    pub secure_hash: String,
    signed_params: BTreeMap<String, String>,
}

impl GatewayCallback {
    /// Parse query param jadi struct. Field di luar daftar ditolak.
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, String> {
        if let Some(unknown) = params
            .keys()
            .find(|key| !REQUIRED_FIELDS.contains(&key.as_str()) && !OPTIONAL_FIELDS.contains(&key.as_str()))
        {
            return Err(format!("unexpected field {}", unknown));
        }

        let required = |field: &str| -> Result<String, String> {
            params
                .get(field)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| format!("missing {}", field))
        };

        let raw_amount = required("vnp_Amount")?;
        let amount = from_minor_units(&raw_amount)
            .ok_or_else(|| format!("vnp_Amount '{}' is not a number", raw_amount))?;

        let optional = |field: &str| params.get(field).filter(|value| !value.is_empty()).cloned();

        let signed_params = params
            .iter()
            .filter(|(key, _)| !UNSIGNED_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            tmn_code: required("vnp_TmnCode")?,
            amount,
            reference: required("vnp_TxnRef")?,
            response_code: GatewayResponseCode::from_wire(&required("vnp_ResponseCode")?),
            transaction_no: optional("vnp_TransactionNo"),
            transaction_status: optional("vnp_TransactionStatus"),
            pay_date: optional("vnp_PayDate"),
            secure_hash: required("vnp_SecureHash")?,
            signed_params,
        })
    }

    /// Data yang di-sign gateway (semua field kecuali hash)
    pub fn signed_data(&self) -> String {
        canonical_query(&self.signed_params)
    }
}

/// Klasifikasi callback: RECEIVED -> SIGNATURE_CHECKED -> ACCEPTED/REJECTED.
/// Tidak ada mutation, aman dipanggil berulang untuk callback yang sama.
#[derive(Clone)]
pub struct GatewayReturnProcessor {
    hash_secret: String,
    tmn_code: String,
}

impl GatewayReturnProcessor {
    pub fn new(hash_secret: impl Into<String>, tmn_code: impl Into<String>) -> Self {
        Self {
            hash_secret: hash_secret.into(),
            tmn_code: tmn_code.into(),
        }
    }

    pub fn process(&self, params: &HashMap<String, String>) -> ReturnOutcome {
        let callback = match GatewayCallback::from_query(params) {
            Ok(callback) => callback,
            Err(detail) => {
                tracing::warn!("Malformed gateway callback: {}", detail);
                return ReturnOutcome::rejected(RejectReason::MalformedCallback(detail), false);
            }
        };

        if !verify_signature(&self.hash_secret, &callback.signed_data(), &callback.secure_hash) {
            tracing::warn!(
                target: "audit",
                reference = %callback.reference,
                response_code = callback.response_code.as_wire(),
                "Gateway callback signature mismatch"
            );

            let mut outcome = ReturnOutcome::rejected(RejectReason::SignatureInvalid, false);
            outcome.raw_response_code = Some(callback.response_code.as_wire().to_string());
            outcome.reference = Some(callback.reference);
            return outcome;
        }

        if callback.tmn_code != self.tmn_code {
            tracing::warn!(
                target: "audit",
                "Gateway callback for foreign terminal {} (expected {})",
                callback.tmn_code,
                self.tmn_code
            );
            return ReturnOutcome::rejected(
                RejectReason::MalformedCallback(format!("unexpected terminal {}", callback.tmn_code)),
                true,
            );
        }

        // ResponseCode sukses belum cukup kalau TransactionStatus bilang transaksi belum selesai
        let unsettled = callback
            .transaction_status
            .as_deref()
            .filter(|status| *status != TRANSACTION_STATUS_SUCCESS);

        let (success, status) = match (&callback.response_code, unsettled) {
            (code, Some(transaction_status)) if code.is_success_family() => {
                tracing::warn!(
                    target: "audit",
                    "Gateway callback {} has response_code={} but transaction_status={}",
                    callback.reference,
                    code.as_wire(),
                    transaction_status
                );
                (
                    false,
                    ReturnStatus::Rejected {
                        reason: RejectReason::Declined(format!(
                            "Transaction not completed at gateway (status {})",
                            transaction_status
                        )),
                    },
                )
            }
            (GatewayResponseCode::Success, None) => {
                (true, ReturnStatus::Accepted { kind: AcceptedKind::Fresh })
            }
            (GatewayResponseCode::AlreadyConfirmed, None) => {
                (true, ReturnStatus::Accepted { kind: AcceptedKind::AlreadyConfirmed })
            }
            (declined, _) => (
                false,
                ReturnStatus::Rejected {
                    reason: RejectReason::Declined(declined.reason().to_string()),
                },
            ),
        };

        let confirmation_code = match ConfirmationCodeCodec::decode_from_gateway(&callback.reference) {
            Ok(code) => Some(code.as_str().to_string()),
            Err(e) => {
                tracing::warn!(
                    "Gateway reference {} cannot be decoded, needs manual lookup: {}",
                    callback.reference,
                    e
                );
                None
            }
        };

        let reason = match &status {
            ReturnStatus::Rejected { reason: RejectReason::Declined(reason) } => reason.clone(),
            _ => callback.response_code.reason().to_string(),
        };

        tracing::info!(
            "Gateway callback {} classified: response_code={} success={}",
            callback.reference,
            callback.response_code.as_wire(),
            success
        );

        ReturnOutcome {
            success,
            status,
            confirmation_code,
            raw_response_code: Some(callback.response_code.as_wire().to_string()),
            signature_valid: true,
            reason,
            reference: Some(callback.reference),
            transaction_no: callback.transaction_no,
            amount: Some(callback.amount),
        }
    }
}
