// /flight-booking/services/payment-service/src/repository/refund.rs

use std::time::Duration;
use async_trait::async_trait;
use bigdecimal::{BigDecimal, Zero};
use crate::{
    models::RefundRecord,
    repository::RefundLedger,
    utils::{cache::CacheManager, error::AppResult},
};

/// Refund per transaksi gateway disimpan sebagai satu JSON array di cache
pub struct CacheRefundLedger {
    cache: CacheManager,
    ttl: Duration,
}

impl CacheRefundLedger {
    pub fn new(cache: CacheManager, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    fn key(transaction_no: &str) -> String {
        format!("refunds:{}", transaction_no)
    }

    async fn records(&self, transaction_no: &str) -> AppResult<Vec<RefundRecord>> {
        Ok(self
            .cache
            .get::<Vec<RefundRecord>>(&Self::key(transaction_no))
            .await?
            .unwrap_or_default())
    }
}

#[async_trait]
impl RefundLedger for CacheRefundLedger {
    async fn refunded_total(&self, transaction_no: &str) -> AppResult<BigDecimal> {
        Ok(self
            .records(transaction_no)
            .await?
            .iter()
            .fold(BigDecimal::zero(), |total, record| total + &record.amount))
    }

    async fn record(&self, transaction_no: &str, record: &RefundRecord) -> AppResult<()> {
        let mut records = self.records(transaction_no).await?;
        records.push(record.clone());
        self.cache.set(&Self::key(transaction_no), &records, self.ttl).await
    }
}
