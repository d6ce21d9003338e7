// /flight-booking/services/payment-service/src/repository/guest.rs

use std::time::Duration;
use async_trait::async_trait;
use crate::{
    models::GuestBookingRecord,
    repository::GuestBookingRepository,
    utils::{cache::CacheManager, error::AppResult},
};

/// Guest booking disimpan sebagai satu JSON array per guest session.
/// Satu key, satu SET, jadi replace koleksi selalu atomic.
pub struct CacheGuestBookingRepository {
    cache: CacheManager,
    ttl: Duration,
}

impl CacheGuestBookingRepository {
    pub fn new(cache: CacheManager, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    fn key(owner: &str) -> String {
        format!("guest_bookings:{}", owner)
    }
}

#[async_trait]
impl GuestBookingRepository for CacheGuestBookingRepository {
    async fn list(&self, owner: &str) -> AppResult<Vec<GuestBookingRecord>> {
        Ok(self
            .cache
            .get::<Vec<GuestBookingRecord>>(&Self::key(owner))
            .await?
            .unwrap_or_default())
    }

    async fn store(&self, owner: &str, records: &[GuestBookingRecord]) -> AppResult<()> {
        self.cache.set(&Self::key(owner), &records, self.ttl).await
    }

    async fn remove(&self, owner: &str) -> AppResult<()> {
        self.cache.delete(&Self::key(owner)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str) -> GuestBookingRecord {
        GuestBookingRecord::from_tickets(code, Vec::new())
    }

    #[tokio::test]
    async fn test_store_replaces_collection() {
        let repo = CacheGuestBookingRepository::new(
            CacheManager::new_in_memory("test"),
            Duration::from_secs(60),
        );

        repo.store("guest-1", &[record("FMS-20250527-AAAA"), record("FMS-20250527-BBBB")])
            .await
            .unwrap();
        repo.store("guest-1", &[record("FMS-20250527-CCCC")]).await.unwrap();

        let records = repo.list("guest-1").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].confirmation_code, "FMS-20250527-CCCC");
    }

    #[tokio::test]
    async fn test_owners_are_isolated() {
        let repo = CacheGuestBookingRepository::new(
            CacheManager::new_in_memory("test"),
            Duration::from_secs(60),
        );

        repo.store("guest-1", &[record("FMS-20250527-AAAA")]).await.unwrap();
        assert!(repo.list("guest-2").await.unwrap().is_empty());

        repo.remove("guest-1").await.unwrap();
        assert!(repo.list("guest-1").await.unwrap().is_empty());
    }
}
