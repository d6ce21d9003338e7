// /flight-booking/services/payment-service/src/utils/banner.rs

/// Print startup banner
pub fn print_startup_banner(bind_address: &str, cache_backend: &str) {
    println!(r#"
╔══════════════════════════════════════════════════════════╗
║              FLIGHT PAYMENT SERVICE v1.0.0                ║
║                VNPay reconciliation                       ║
╚══════════════════════════════════════════════════════════╝
    "#);

    tracing::info!("🚀 Flight Payment Service starting at {} (guest cache: {})", bind_address, cache_backend);
    tracing::info!("📋 Available endpoints:");
    tracing::info!("  Public:");
    tracing::info!("    GET  /api/payments/vnpay-return          - Browser return callback");
    tracing::info!("    GET  /api/payments/vnpay-ipn             - Gateway IPN");
    tracing::info!("    POST /api/payments/{{code}}                - Create payment");
    tracing::info!("    GET  /api/payments/{{code}}/status         - Payment status");
    tracing::info!("    PUT  /api/payments/{{code}}/cancel         - Cancel unpaid tickets");
    tracing::info!("  Guest:");
    tracing::info!("    GET  /api/guest-bookings                 - Guest bookings");
    tracing::info!("    GET  /api/guest-bookings/{{code}}          - Lookup booking");
    tracing::info!("    DELETE /api/guest-bookings/{{code}}        - Forget booking");
    tracing::info!("  Admin:");
    tracing::info!("    POST /api/admin/payments/{{code}}/refund   - Refund");
    tracing::info!("    POST /api/admin/payments/reconcile       - Re-query gateway");
}
