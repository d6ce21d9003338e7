// /flight-booking/services/payment-service/src/api/routes.rs

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use crate::AppState;
use super::handlers;

/// Create semua routes untuk payment service
pub fn create_routes() -> Router<AppState> {
    Router::new()
        // Gateway callbacks (public, diverifikasi lewat signature)
        .route("/api/payments/vnpay-return", get(handlers::vnpay_return))
        .route("/api/payments/vnpay-ipn", get(handlers::vnpay_ipn))

        // Payment per confirmation code
        .route("/api/payments/{code}", post(handlers::create_payment))
        .route("/api/payments/{code}/status", get(handlers::payment_status))
        .route("/api/payments/{code}/cancel", put(handlers::cancel_payment))

        // Guest bookings
        .route("/api/guest-bookings", get(handlers::list_guest_bookings))
        .route("/api/guest-bookings/{code}", get(handlers::lookup_guest_booking))
        .route("/api/guest-bookings/{code}", delete(handlers::remove_guest_booking))

        // Admin routes
        .route("/api/admin/payments/{code}/refund", post(handlers::admin_refund))
        .route("/api/admin/payments/reconcile", post(handlers::admin_reconcile))

        .route("/health", get(handlers::health_check))
}
