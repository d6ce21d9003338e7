// /flight-booking/services/payment-service/src/api/handlers.rs

use std::collections::HashMap;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    Extension,
};
use serde::Serialize;
use crate::{
    core::orchestrator::ipn_acknowledgement,
    middleware::auth::Caller,
    models::*,
    utils::{
        error::{AppError, AppResult},
        validator::{normalize_confirmation_code, validate_email_basic, validate_request},
    },
    AppState,
};

/// Hasil return callback untuk halaman konfirmasi
#[derive(Debug, Serialize)]
pub struct ReturnView {
    pub outcome: ReturnOutcome,
    pub reconciliation: ReconciliationResult,
}

// ========================= PAYMENT HANDLERS =========================

/// POST /api/payments/{code}
pub async fn create_payment(
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> AppResult<(StatusCode, Json<ApiResponse<PaymentRedirect>>)> {
    let code = normalize_confirmation_code(&code)?;
    let client_ip = client_ip(&headers);

    let redirect = state.orchestrator.create_payment(&code, &client_ip).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Payment URL berhasil dibuat", redirect)),
    ))
}

/// GET /api/payments/{code}/status
pub async fn payment_status(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<Json<ApiResponse<BookingPaymentStatus>>> {
    let code = normalize_confirmation_code(&code)?;
    let status = state.orchestrator.query_status(&code).await?;

    Ok(Json(ApiResponse::ok("Status pembayaran", status)))
}

/// PUT /api/payments/{code}/cancel
pub async fn cancel_payment(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(code): Path<String>,
) -> AppResult<Json<ApiResponse<CancellationResult>>> {
    let code = normalize_confirmation_code(&code)?;
    let result = state.orchestrator.cancel_payment(&code).await?;

    if let Some(owner) = caller.owner_key() {
        if let Err(e) = state.guest_cache.remove(&owner, &code).await {
            tracing::warn!("Gagal hapus guest booking {}: {}", code, e);
        }
    }

    Ok(Json(ApiResponse::ok("Booking berhasil dibatalkan", result)))
}

/// GET /api/payments/vnpay-return
/// Browser redirect dari VNPay. Classify, reconcile, lalu simpan ke guest cache.
pub async fn vnpay_return(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<ApiResponse<ReturnView>>> {
    let outcome = state.return_processor.process(&params);
    let reconciliation = state.orchestrator.confirm_return(&outcome).await?;

    if outcome.is_accepted() {
        if let (Some(owner), Some(code)) = (caller.owner_key(), outcome.confirmation_code.as_deref()) {
            if let Err(e) = state.guest_cache.remember(&owner, code).await {
                tracing::warn!("Gagal simpan guest booking {}: {}", code, e);
            }
        }
    }

    let message = match &reconciliation {
        ReconciliationResult::Confirmed { .. } => "Pembayaran berhasil".to_string(),
        ReconciliationResult::AlreadyPaid { .. } => "Pembayaran sudah dikonfirmasi sebelumnya".to_string(),
        ReconciliationResult::ManualReview { reason, .. } => {
            format!("Pembayaran diterima, menunggu verifikasi: {}", reason)
        }
        // SignatureInvalid ditampilkan sama seperti rejected biasa
        ReconciliationResult::Rejected { .. } if !outcome.signature_valid => "Pembayaran ditolak".to_string(),
        ReconciliationResult::Rejected { reason } => format!("Pembayaran ditolak: {}", reason),
    };

    Ok(Json(ApiResponse {
        success: outcome.success,
        message,
        data: Some(ReturnView { outcome, reconciliation }),
    }))
}

/// GET /api/payments/vnpay-ipn
/// Server-to-server notification. Selalu balas format RspCode VNPay.
pub async fn vnpay_ipn(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<IpnAcknowledgement> {
    let outcome = state.return_processor.process(&params);

    let ack = match state.orchestrator.confirm_return(&outcome).await {
        Ok(result) => ipn_acknowledgement(&outcome, &result),
        Err(e) => {
            tracing::error!("IPN reconcile gagal untuk {:?}: {}", outcome.reference, e);
            IpnAcknowledgement::new("99", "Unknown error")
        }
    };

    tracing::info!("IPN {:?} acknowledged with {}", outcome.reference, ack.rsp_code);
    Json(ack)
}

// ========================= ADMIN HANDLERS =========================

/// POST /api/admin/payments/{code}/refund
pub async fn admin_refund(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(code): Path<String>,
    Json(payload): Json<RefundRequest>,
) -> AppResult<Json<ApiResponse<RefundRecord>>> {
    validate_request(&payload)?;
    let code = normalize_confirmation_code(&code)?;

    let operator = caller
        .operator()
        .ok_or_else(|| AppError::Unauthorized("Operator tidak teridentifikasi".to_string()))?;

    let record = state
        .orchestrator
        .refund(&code, payload.amount, &payload.reason, operator)
        .await?;

    Ok(Json(ApiResponse::ok("Refund berhasil diproses", record)))
}

/// POST /api/admin/payments/reconcile
pub async fn admin_reconcile(
    State(state): State<AppState>,
    Json(payload): Json<ReconcileRequest>,
) -> AppResult<Json<ApiResponse<ReconciliationResult>>> {
    validate_request(&payload)?;

    let result = state
        .orchestrator
        .reconcile_reference(payload.reference.trim(), &payload.transaction_date)
        .await?;

    Ok(Json(ApiResponse::ok("Reconcile selesai", result)))
}

// ========================= GUEST BOOKING HANDLERS =========================

/// GET /api/guest-bookings
pub async fn list_guest_bookings(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> AppResult<Json<ApiResponse<Vec<GuestBookingRecord>>>> {
    let owner = require_owner(&caller)?;
    let records = state.guest_cache.list(&owner).await?;

    Ok(Json(ApiResponse::ok("Guest bookings", records)))
}

/// GET /api/guest-bookings/{code}?email=
pub async fn lookup_guest_booking(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(code): Path<String>,
    Query(query): Query<GuestLookupQuery>,
) -> AppResult<Json<ApiResponse<GuestBookingRecord>>> {
    let code = normalize_confirmation_code(&code)?;
    let email = query.email.as_deref().map(str::trim).filter(|e| !e.is_empty());

    if let Some(email) = email {
        validate_email_basic(email)?;
    }

    let owner = caller.owner_key();
    if owner.is_none() && email.is_none() {
        return Err(AppError::BadRequest(
            "Email penumpang wajib diisi untuk lookup tanpa session".to_string(),
        ));
    }

    let record = state
        .guest_cache
        .lookup(owner.as_deref(), &code, email)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking tidak ditemukan".to_string()))?;

    Ok(Json(ApiResponse::ok("Booking ditemukan", record)))
}

/// DELETE /api/guest-bookings/{code}
pub async fn remove_guest_booking(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(code): Path<String>,
) -> AppResult<StatusCode> {
    let owner = require_owner(&caller)?;
    let code = normalize_confirmation_code(&code)?;

    state.guest_cache.remove(&owner, &code).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ========================= HEALTH =========================

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "flight-payment-service",
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "guest_cache": if state.cache_manager.is_using_redis() { "redis" } else { "in_memory" },
        "environment": state.config.environment,
    }))
}

fn require_owner(caller: &Caller) -> AppResult<String> {
    caller
        .owner_key()
        .ok_or_else(|| AppError::Unauthorized("Guest session atau login diperlukan".to_string()))
}

/// IP client untuk vnp_IpAddr (dari proxy header kalau ada)
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("X-Forwarded-For")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            headers
                .get("X-Real-IP")
                .and_then(|value| value.to_str().ok())
                .map(|ip| ip.trim().to_string())
        })
        .unwrap_or_else(|| "127.0.0.1".to_string())
}
