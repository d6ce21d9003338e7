// /flight-booking/services/payment-service/src/core/mod.rs

pub mod aggregator;
pub mod confirmation;
pub mod gateway_return;
pub mod guest;
pub mod orchestrator;
pub mod vnpay;

// Re-export untuk kemudahan akses
pub mod services {
    pub use super::confirmation::ConfirmationCodeCodec;
    pub use super::gateway_return::GatewayReturnProcessor;
    pub use super::guest::GuestBookingCache;
    pub use super::orchestrator::PaymentOrchestrator;
    pub use super::vnpay::{GatewayClient, VnpayClient};
}
