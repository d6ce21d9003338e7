// /flight-booking/services/payment-service/src/middleware/auth.rs

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::{
    models::Operator,
    utils::error::{AppError, AppResult},
    AppState,
};

pub const GUEST_SESSION_HEADER: &str = "X-Guest-Session";
pub const INTERNAL_SECRET_HEADER: &str = "X-Internal-Secret";

/// Siapa yang memanggil endpoint. Semua endpoint optional-auth kecuali /api/admin.
#[derive(Debug, Clone, PartialEq)]
pub enum Caller {
    User { id: Uuid, role: String, email: String },
    Guest { session: String },
    Anonymous,
}

impl Caller {
    /// Key pemilik guest booking cache
    pub fn owner_key(&self) -> Option<String> {
        match self {
            Caller::User { id, .. } => Some(format!("user:{}", id)),
            Caller::Guest { session } => Some(format!("guest:{}", session)),
            Caller::Anonymous => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Caller::User { role, .. } if role == "admin")
    }

    /// Identitas operator untuk audit refund
    pub fn operator(&self) -> Option<Operator> {
        match self {
            Caller::User { id, email, .. } => Some(Operator {
                id: *id,
                email: email.clone(),
            }),
            _ => None,
        }
    }
}

/// Claims JWT dari auth service
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

/// Verify JWT HS256 dengan shared secret
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.leeway = 60;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> AppResult<Caller> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AppError::Unauthorized(format!("Token tidak valid atau expired: {}", e)))?;

        let id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| AppError::Unauthorized("Format user ID tidak valid".to_string()))?;

        Ok(Caller::User {
            id,
            role: data.claims.role,
            email: data.claims.email,
        })
    }
}

/// Resolve caller lalu cek akses admin. Caller selalu di-insert ke extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = req.uri().path().to_string();
    let caller = resolve_caller(req.headers(), &state.jwt, state.config.internal_secret.as_deref())?;

    if path.starts_with("/api/admin") {
        match &caller {
            Caller::User { id, role, .. } if role != "admin" => {
                tracing::warn!(target: "audit", "Non-admin user {} mencoba akses admin: {}", id, path);
                return Err(AppError::Forbidden("Akses admin diperlukan".to_string()));
            }
            Caller::User { id, .. } => {
                tracing::info!(target: "audit", "Admin access: {} by user {}", path, id);
            }
            _ => return Err(AppError::Unauthorized("Authorization header diperlukan".to_string())),
        }
    }

    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}

fn resolve_caller(headers: &HeaderMap, jwt: &JwtVerifier, internal_secret: Option<&str>) -> AppResult<Caller> {
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());

    // Header identitas hanya dipercaya dari API gateway yang membawa shared secret
    if header("X-Gateway-Request").is_some() {
        let from_gateway = match (internal_secret, header(INTERNAL_SECRET_HEADER)) {
            (Some(expected), Some(presented)) => {
                constant_time_eq::constant_time_eq(expected.as_bytes(), presented.as_bytes())
            }
            _ => false,
        };

        if !from_gateway {
            tracing::warn!(target: "audit", "Gateway identity headers without valid internal secret ignored");
        } else if let Some(id) = header("X-User-Id").and_then(|raw| Uuid::parse_str(raw).ok()) {
            return Ok(Caller::User {
                id,
                role: header("X-User-Role").unwrap_or("customer").to_string(),
                email: header("X-User-Email").unwrap_or("").to_string(),
            });
        }
    }

    if let Some(token) = header("Authorization").and_then(|value| value.strip_prefix("Bearer ")) {
        return jwt.verify(token.trim());
    }

    if let Some(session) = header(GUEST_SESSION_HEADER) {
        let session = session.trim();
        if !is_valid_session(session) {
            return Err(AppError::BadRequest("Guest session tidak valid".to_string()));
        }
        return Ok(Caller::Guest { session: session.to_string() });
    }

    Ok(Caller::Anonymous)
}

fn is_valid_session(session: &str) -> bool {
    (16..=128).contains(&session.len())
        && session.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
