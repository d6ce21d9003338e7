// /flight-booking/services/payment-service/src/core/confirmation.rs

use std::fmt;
use chrono::{Datelike, Timelike};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use crate::utils::error::{AppError, AppResult, CodecError};

/// Batas panjang vnp_TxnRef dari VNPay
pub const GATEWAY_REFERENCE_MAX_LEN: usize = 100;

const SUFFIX_ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SUFFIX_LEN: usize = 4;
const TIME_COMPONENT_LEN: usize = 6;

static CONFIRMATION_CODE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z]{2,4}-[0-9]{8}-[A-Z0-9]{4}$").expect("confirmation code pattern is valid")
});

static REFERENCE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{6}[0-9a-fA-F]+$").expect("reference pattern is valid")
});

static PREFIX_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z]{2,4}$").expect("prefix pattern is valid")
});

/// Confirmation code booking, format `PREFIX-YYYYMMDD-XXXX`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfirmationCode(String);

impl ConfirmationCode {
    /// Parse code dari input user/path. Harus sudah uppercase (caller yang normalize).
    pub fn parse(raw: &str) -> Option<Self> {
        if CONFIRMATION_CODE_PATTERN.is_match(raw) {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    /// Apakah code sesuai format canonical. Code hasil decode gateway bisa saja legacy.
    pub fn is_canonical(&self) -> bool {
        CONFIRMATION_CODE_PATTERN.is_match(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfirmationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// String yang dikirim ke gateway di slot vnp_TxnRef: `HHMMSS` + hex(code)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TransactionReference(String);

impl TransactionReference {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for TransactionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generate confirmation code dan encode/decode ke transaction reference gateway.
/// Semua operasi pure, tidak ada I/O.
#[derive(Debug, Clone)]
pub struct ConfirmationCodeCodec {
    prefix: String,
    max_reference_len: usize,
}

impl ConfirmationCodeCodec {
    pub fn new(prefix: &str, max_reference_len: usize) -> AppResult<Self> {
        if !PREFIX_PATTERN.is_match(prefix) {
            return Err(AppError::Configuration(format!(
                "Confirmation prefix '{}' must be 2-4 uppercase letters",
                prefix
            )));
        }

        Ok(Self {
            prefix: prefix.to_string(),
            max_reference_len,
        })
    }

    /// Generate code baru dengan thread-local RNG
    pub fn generate(&self, today: &impl Datelike) -> ConfirmationCode {
        self.generate_with(&mut rand::rng(), today)
    }

    /// Generate code dengan RNG dari caller (dipakai test untuk hasil deterministik).
    /// Uniqueness dijaga booking store (unique constraint + regenerate).
    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R, today: &impl Datelike) -> ConfirmationCode {
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| SUFFIX_ALPHABET[rng.random_range(0..SUFFIX_ALPHABET.len())] as char)
            .collect();

        ConfirmationCode(format!(
            "{}-{:04}{:02}{:02}-{}",
            self.prefix,
            today.year(),
            today.month(),
            today.day(),
            suffix
        ))
    }

    /// Encode code ke transaction reference. Tidak pernah truncate.
    pub fn encode_for_gateway(
        &self,
        code: &ConfirmationCode,
        now: &impl Timelike,
    ) -> Result<TransactionReference, CodecError> {
        let reference = format!(
            "{:02}{:02}{:02}{}",
            now.hour(),
            now.minute(),
            now.second(),
            hex::encode(code.as_str().as_bytes())
        );

        if reference.len() > self.max_reference_len {
            return Err(CodecError::EncodingTooLong {
                length: reference.len(),
                limit: self.max_reference_len,
            });
        }

        Ok(TransactionReference(reference))
    }

    /// Decode reference dari gateway. Reference yang tidak cocok pattern selalu ParseError,
    /// tidak pernah ditebak jadi code lain.
    pub fn decode_from_gateway(reference: &str) -> Result<ConfirmationCode, CodecError> {
        if !REFERENCE_PATTERN.is_match(reference) {
            return Err(CodecError::ParseError(format!(
                "reference '{}' does not match HHMMSS + hex layout",
                reference
            )));
        }

        let body = &reference[TIME_COMPONENT_LEN..];
        let bytes = hex::decode(body)
            .map_err(|e| CodecError::ParseError(format!("invalid hex body: {}", e)))?;

        let code = String::from_utf8(bytes)
            .map_err(|_| CodecError::ParseError("decoded body is not valid UTF-8".to_string()))?;

        Ok(ConfirmationCode(code))
    }

    /// Parse reference gateway jadi TransactionReference tanpa decode body
    pub fn parse_reference(reference: &str) -> Result<TransactionReference, CodecError> {
        Self::decode_from_gateway(reference)?;
        Ok(TransactionReference(reference.to_string()))
    }
}
