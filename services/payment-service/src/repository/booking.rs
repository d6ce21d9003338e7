// /flight-booking/services/payment-service/src/repository/booking.rs

use std::time::Duration;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use uuid::Uuid;
use crate::{
    models::{GuestBookingRecord, Ticket},
    repository::BookingStore,
    utils::error::{AppError, AppResult},
};

/// Client REST ke booking service
pub struct HttpBookingStore {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MarkPaidBody<'a> {
    ticket_ids: &'a [Uuid],
    gateway_txn_id: &'a str,
    payment_reference: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CancelBody<'a> {
    ticket_ids: &'a [Uuid],
}

impl HttpBookingStore {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| AppError::Configuration(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_tickets(&self, url: &str, query: &[(&str, &str)]) -> AppResult<Option<Vec<Ticket>>> {
        let response = self.client.get(url).query(query).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let tickets = response.json::<Vec<Ticket>>().await.map_err(|e| {
                    AppError::Internal(format!("Booking service response tidak valid: {}", e))
                })?;
                Ok(Some(tickets))
            }
            status => Err(backend_error(status, response).await),
        }
    }

    async fn post_command<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> AppResult<()> {
        let response = self.client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(backend_error(response.status(), response).await)
        }
    }
}

async fn backend_error(status: StatusCode, response: reqwest::Response) -> AppError {
    let body = response.text().await.unwrap_or_default();
    tracing::error!("Booking service returned {}: {}", status, body);

    if status == StatusCode::CONFLICT {
        AppError::BadRequest(format!("Booking service menolak perubahan: {}", body))
    } else {
        AppError::GatewayUnavailable(format!("Booking service returned {}", status))
    }
}

#[async_trait]
impl BookingStore for HttpBookingStore {
    async fn tickets_by_confirmation_code(&self, confirmation_code: &str) -> AppResult<Vec<Ticket>> {
        let url = format!(
            "{}/api/bookings/{}/tickets",
            self.base_url,
            urlencoding::encode(confirmation_code)
        );

        Ok(self.fetch_tickets(&url, &[]).await?.unwrap_or_default())
    }

    async fn mark_paid(&self, ticket_ids: &[Uuid], gateway_txn_id: &str, reference: &str) -> AppResult<()> {
        if ticket_ids.is_empty() {
            return Ok(());
        }

        self.post_command(
            "/api/tickets/mark-paid",
            &MarkPaidBody {
                ticket_ids,
                gateway_txn_id,
                payment_reference: reference,
            },
        )
        .await
    }

    async fn cancel(&self, ticket_ids: &[Uuid]) -> AppResult<()> {
        if ticket_ids.is_empty() {
            return Ok(());
        }

        self.post_command("/api/tickets/cancel", &CancelBody { ticket_ids }).await
    }

    async fn lookup_booking(
        &self,
        confirmation_code: &str,
        email: &str,
    ) -> AppResult<Option<GuestBookingRecord>> {
        let url = format!(
            "{}/api/bookings/{}/lookup",
            self.base_url,
            urlencoding::encode(confirmation_code)
        );
        Ok(self
            .fetch_tickets(&url, &[("email", email)])
            .await?
            .filter(|tickets| !tickets.is_empty())
            .map(|tickets| GuestBookingRecord::from_tickets(confirmation_code, tickets)))
    }
}
