// /flight-booking/services/payment-service/src/repository/mod.rs

pub mod booking;
pub mod guest;
pub mod refund;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use uuid::Uuid;
use crate::{
    models::{GuestBookingRecord, RefundRecord, Ticket},
    utils::error::AppResult,
};

pub use booking::HttpBookingStore;
pub use guest::CacheGuestBookingRepository;
pub use refund::CacheRefundLedger;

/// Booking/ticket store eksternal. Mutation harus idempotent di sisi store:
/// mark_paid untuk ticket yang sudah PAID dengan txn id yang sama adalah no-op.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn tickets_by_confirmation_code(&self, confirmation_code: &str) -> AppResult<Vec<Ticket>>;

    async fn mark_paid(&self, ticket_ids: &[Uuid], gateway_txn_id: &str, reference: &str) -> AppResult<()>;

    async fn cancel(&self, ticket_ids: &[Uuid]) -> AppResult<()>;

    /// Lookup booking di server (guest yang tidak punya cache lokal). Email passenger wajib,
    /// None kalau tidak ada atau email tidak cocok.
    async fn lookup_booking(
        &self,
        confirmation_code: &str,
        email: &str,
    ) -> AppResult<Option<GuestBookingRecord>>;
}

/// Penyimpanan guest booking per pemilik (guest session)
#[async_trait]
pub trait GuestBookingRepository: Send + Sync {
    async fn list(&self, owner: &str) -> AppResult<Vec<GuestBookingRecord>>;

    /// Replace seluruh koleksi milik owner sekaligus
    async fn store(&self, owner: &str, records: &[GuestBookingRecord]) -> AppResult<()>;

    /// Hapus seluruh koleksi milik owner
    async fn remove(&self, owner: &str) -> AppResult<()>;
}

/// Catatan refund per transaksi gateway. Dicek sebelum refund berikutnya
/// supaya retry operator tidak me-refund dua kali.
#[async_trait]
pub trait RefundLedger: Send + Sync {
    async fn refunded_total(&self, transaction_no: &str) -> AppResult<BigDecimal>;

    async fn record(&self, transaction_no: &str, record: &RefundRecord) -> AppResult<()>;
}
