// /flight-booking/services/payment-service/src/utils/mod.rs
pub mod error;
pub mod validator;
pub mod config;
pub mod logger;
pub mod cors;
pub mod banner;
pub mod cache;
