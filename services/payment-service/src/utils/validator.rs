// /flight-booking/services/payment-service/src/utils/validator.rs

use crate::{
    core::confirmation::ConfirmationCode,
    utils::error::{AppError, AppResult},
};
use validator::Validate;

/// Normalize confirmation code dari path/query (trim + uppercase) lalu cek format
pub fn normalize_confirmation_code(raw: &str) -> AppResult<String> {
    let normalized = raw.trim().to_uppercase();

    ConfirmationCode::parse(&normalized)
        .map(|code| code.as_str().to_string())
        .ok_or_else(|| AppError::BadRequest(format!("Format confirmation code tidak valid: {}", raw)))
}

/// Validasi email format basic
pub fn validate_email_basic(email: &str) -> AppResult<()> {
    if !email.contains('@') || !email.contains('.') || email.len() < 5 {
        return Err(AppError::BadRequest("Format email tidak valid".to_string()));
    }

    if email.len() > 255 {
        return Err(AppError::BadRequest("Email terlalu panjang (max 255 karakter)".to_string()));
    }

    Ok(())
}

/// Jalankan validator derive dan convert error-nya
pub fn validate_request<T: Validate>(request: &T) -> AppResult<()> {
    request
        .validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))
}
