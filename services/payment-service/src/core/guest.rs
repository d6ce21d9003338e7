// /flight-booking/services/payment-service/src/core/guest.rs

use std::sync::Arc;
use crate::{
    models::GuestBookingRecord,
    repository::{BookingStore, GuestBookingRepository},
    utils::error::AppResult,
};

/// Guest booking per guest session, maksimal `capacity` booking terbaru.
/// Last-write-wins antar request paralel dari session yang sama.
pub struct GuestBookingCache {
    repository: Arc<dyn GuestBookingRepository>,
    bookings: Arc<dyn BookingStore>,
    capacity: usize,
}

impl GuestBookingCache {
    pub fn new(
        repository: Arc<dyn GuestBookingRepository>,
        bookings: Arc<dyn BookingStore>,
        capacity: usize,
    ) -> Self {
        Self {
            repository,
            bookings,
            capacity,
        }
    }

    pub async fn list(&self, owner: &str) -> AppResult<Vec<GuestBookingRecord>> {
        self.repository.list(owner).await
    }

    /// Append lalu buang yang paling lama kalau melebihi capacity.
    /// Code yang sama di-replace dan pindah ke posisi terbaru.
    pub async fn store(&self, owner: &str, record: GuestBookingRecord) -> AppResult<()> {
        let mut records = self.repository.list(owner).await?;
        records.retain(|existing| existing.confirmation_code != record.confirmation_code);
        records.push(record);

        if records.len() > self.capacity {
            let overflow = records.len() - self.capacity;
            let evicted: Vec<_> = records.drain(..overflow).collect();
            for old in &evicted {
                tracing::debug!("Guest booking {} evicted for {}", old.confirmation_code, owner);
            }
        }

        self.repository.store(owner, &records).await
    }

    /// Ambil snapshot ticket terbaru dari booking store lalu simpan
    pub async fn remember(&self, owner: &str, confirmation_code: &str) -> AppResult<Option<GuestBookingRecord>> {
        let tickets = self.bookings.tickets_by_confirmation_code(confirmation_code).await?;
        if tickets.is_empty() {
            return Ok(None);
        }

        let record = GuestBookingRecord::from_tickets(confirmation_code, tickets);
        self.store(owner, record.clone()).await?;
        Ok(Some(record))
    }

    /// Exact match, tanpa case folding
    pub async fn find(&self, owner: &str, confirmation_code: &str) -> AppResult<Option<GuestBookingRecord>> {
        Ok(self
            .repository
            .list(owner)
            .await?
            .into_iter()
            .find(|record| record.confirmation_code == confirmation_code))
    }

    /// Lookup lokal dulu (kalau ada owner), lalu ke server.
    /// Email yang tidak cocok dianggap tidak ditemukan.
    pub async fn lookup(
        &self,
        owner: Option<&str>,
        confirmation_code: &str,
        email: Option<&str>,
    ) -> AppResult<Option<GuestBookingRecord>> {
        if let Some(owner) = owner {
            if let Some(record) = self.find(owner, confirmation_code).await? {
                return Ok(match email {
                    Some(email) if !matches_passenger(&record, email) => {
                        tracing::debug!("Guest lookup {} email mismatch", confirmation_code);
                        None
                    }
                    _ => Some(record),
                });
            }
        }

        // Server lookup tanpa email passenger akan membuka booking orang lain
        match email {
            Some(email) => self.bookings.lookup_booking(confirmation_code, email).await,
            None => Ok(None),
        }
    }

    /// Hapus satu booking. No-op kalau tidak ada.
    pub async fn remove(&self, owner: &str, confirmation_code: &str) -> AppResult<()> {
        let mut records = self.repository.list(owner).await?;
        let before = records.len();
        records.retain(|record| record.confirmation_code != confirmation_code);

        if records.len() == before {
            return Ok(());
        }

        if records.is_empty() {
            self.repository.remove(owner).await
        } else {
            self.repository.store(owner, &records).await
        }
    }
}

fn matches_passenger(record: &GuestBookingRecord, email: &str) -> bool {
    let email = email.trim();
    record
        .passenger_emails()
        .any(|candidate| candidate.eq_ignore_ascii_case(email))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::{
        core::aggregator::tests::ticket,
        core::orchestrator::tests::MemoryBookingStore,
        models::TicketStatus,
        repository::CacheGuestBookingRepository,
        utils::cache::CacheManager,
    };

    const OWNER: &str = "guest-session-1";

    fn cache_with(store: Arc<MemoryBookingStore>) -> GuestBookingCache {
        let repository = CacheGuestBookingRepository::new(
            CacheManager::new_in_memory("test"),
            Duration::from_secs(600),
        );
        GuestBookingCache::new(Arc::new(repository), store, 10)
    }

    fn cache() -> GuestBookingCache {
        cache_with(MemoryBookingStore::with(vec![]))
    }

    fn record(code: &str, email: &str) -> GuestBookingRecord {
        let mut t = ticket(code, 100, TicketStatus::Unpaid);
        t.passenger_email = Some(email.to_string());
        GuestBookingRecord::from_tickets(code, vec![t])
    }

    fn code(i: usize) -> String {
        format!("FMS-20250527-{:04}", i)
    }

    #[tokio::test]
    async fn test_eleventh_booking_evicts_oldest() {
        let cache = cache();
        for i in 0..10 {
            cache.store(OWNER, record(&code(i), "a@example.com")).await.unwrap();
        }
        assert_eq!(cache.list(OWNER).await.unwrap().len(), 10);

        cache.store(OWNER, record(&code(10), "a@example.com")).await.unwrap();

        let records = cache.list(OWNER).await.unwrap();
        assert_eq!(records.len(), 10);
        assert!(cache.find(OWNER, &code(10)).await.unwrap().is_some());
        assert!(cache.find(OWNER, &code(0)).await.unwrap().is_none());
        assert!(cache.find(OWNER, &code(1)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_restoring_same_code_does_not_duplicate() {
        let cache = cache();
        cache.store(OWNER, record(&code(1), "a@example.com")).await.unwrap();
        cache.store(OWNER, record(&code(2), "a@example.com")).await.unwrap();
        cache.store(OWNER, record(&code(1), "b@example.com")).await.unwrap();

        let records = cache.list(OWNER).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records.last().unwrap().confirmation_code, code(1));
    }

    #[tokio::test]
    async fn test_find_is_exact_match() {
        let cache = cache();
        cache.store(OWNER, record("FMS-20250527-A1B2", "a@example.com")).await.unwrap();

        assert!(cache.find(OWNER, "FMS-20250527-A1B2").await.unwrap().is_some());
        assert!(cache.find(OWNER, "fms-20250527-a1b2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lookup_email_check_is_case_insensitive() {
        let cache = cache();
        cache.store(OWNER, record("FMS-20250527-A1B2", "Guest@Example.com")).await.unwrap();

        assert!(cache
            .lookup(Some(OWNER), "FMS-20250527-A1B2", Some("guest@example.COM"))
            .await
            .unwrap()
            .is_some());
        assert!(cache.lookup(Some(OWNER), "FMS-20250527-A1B2", None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lookup_email_mismatch_is_not_found() {
        let cache = cache();
        cache.store(OWNER, record("FMS-20250527-A1B2", "guest@example.com")).await.unwrap();

        let result = cache
            .lookup(Some(OWNER), "FMS-20250527-A1B2", Some("attacker@example.com"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_lookup_falls_back_to_server() {
        let store = MemoryBookingStore::with(vec![ticket("FMS-20250527-ZZZZ", 100, TicketStatus::Paid)]);
        let cache = cache_with(store);

        let found = cache
            .lookup(Some(OWNER), "FMS-20250527-ZZZZ", Some("passenger@example.com"))
            .await
            .unwrap();
        assert_eq!(found.unwrap().confirmation_code, "FMS-20250527-ZZZZ");

        let missing = cache
            .lookup(Some(OWNER), "FMS-20250527-NONE", Some("passenger@example.com"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_server_lookup_requires_email() {
        let store = MemoryBookingStore::with(vec![ticket("FMS-20250527-ZZZZ", 100, TicketStatus::Paid)]);
        let cache = cache_with(store);

        // Booking ada di server, tapi session ini tidak pernah menyimpannya
        assert!(cache.lookup(Some(OWNER), "FMS-20250527-ZZZZ", None).await.unwrap().is_none());
        assert!(cache.lookup(None, "FMS-20250527-ZZZZ", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_is_noop_when_absent() {
        let cache = cache();
        cache.store(OWNER, record(&code(1), "a@example.com")).await.unwrap();

        cache.remove(OWNER, &code(9)).await.unwrap();
        assert_eq!(cache.list(OWNER).await.unwrap().len(), 1);

        cache.remove(OWNER, &code(1)).await.unwrap();
        assert!(cache.list(OWNER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remember_snapshots_tickets() {
        let store = MemoryBookingStore::with(vec![
            ticket("FMS-20250527-A1B2", 100, TicketStatus::Paid),
            ticket("FMS-20250527-A1B2", 200, TicketStatus::Paid),
        ]);
        let cache = cache_with(store);

        let record = cache.remember(OWNER, "FMS-20250527-A1B2").await.unwrap().unwrap();
        assert_eq!(record.tickets.len(), 2);
        assert!(cache.find(OWNER, "FMS-20250527-A1B2").await.unwrap().is_some());

        assert!(cache.remember(OWNER, "FMS-20250527-NONE").await.unwrap().is_none());
    }
}
