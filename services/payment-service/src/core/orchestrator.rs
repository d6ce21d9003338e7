// /flight-booking/services/payment-service/src/core/orchestrator.rs

use std::sync::Arc;
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, FixedOffset, Utc};
use uuid::Uuid;
use crate::{
    core::{
        aggregator::aggregate,
        confirmation::{ConfirmationCode, ConfirmationCodeCodec},
        vnpay::{GatewayClient, VNPAY_DATE_FORMAT},
    },
    models::*,
    repository::{BookingStore, RefundLedger},
    utils::error::{AppError, AppResult},
};

/// Pemilik keputusan payment: kapan boleh charge, cancel, refund.
/// Eksekusi charge/refund didelegasikan ke gateway, state ticket ke booking store.
pub struct PaymentOrchestrator {
    bookings: Arc<dyn BookingStore>,
    gateway: Arc<dyn GatewayClient>,
    refunds: Arc<dyn RefundLedger>,
    codec: ConfirmationCodeCodec,
    gateway_offset: FixedOffset,
}

impl PaymentOrchestrator {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        gateway: Arc<dyn GatewayClient>,
        refunds: Arc<dyn RefundLedger>,
        codec: ConfirmationCodeCodec,
        gateway_offset: FixedOffset,
    ) -> Self {
        Self {
            bookings,
            gateway,
            refunds,
            codec,
            gateway_offset,
        }
    }

    fn gateway_now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.gateway_offset)
    }

    /// Ambil ticket terbaru dan hitung ulang status. Tidak pernah di-cache.
    async fn load(&self, confirmation_code: &str) -> AppResult<(Vec<Ticket>, BookingPaymentStatus)> {
        let tickets = self.bookings.tickets_by_confirmation_code(confirmation_code).await?;
        let status = aggregate(confirmation_code, &tickets);
        Ok((tickets, status))
    }

    /// Status pembayaran live untuk satu booking
    pub async fn query_status(&self, confirmation_code: &str) -> AppResult<BookingPaymentStatus> {
        let (_, status) = self.load(confirmation_code).await?;
        Ok(status)
    }

    /// Buat payment URL untuk sisa yang belum dibayar (unpaid_amount, bukan total)
    pub async fn create_payment(&self, confirmation_code: &str, client_ip: &str) -> AppResult<PaymentRedirect> {
        let code = ConfirmationCode::parse(confirmation_code).ok_or_else(|| {
            AppError::BadRequest(format!("Format confirmation code tidak valid: {}", confirmation_code))
        })?;

        let (_, status) = self.load(code.as_str()).await?;

        if !status.payment_required {
            return Err(AppError::invalid_transition(
                if status.booking_paid {
                    "Booking sudah lunas"
                } else {
                    "Booking tidak memiliki tiket yang perlu dibayar"
                },
                &status,
            ));
        }

        let reference = self.codec.encode_for_gateway(&code, &self.gateway_now())?;
        let amount = status.unpaid_amount.clone();

        let payment_url = self.gateway
            .create_payment_url(&PaymentUrlRequest {
                amount: amount.clone(),
                reference: reference.as_str().to_string(),
                order_info: format!("Thanh toan ve may bay {}", code),
                client_ip: client_ip.to_string(),
            })
            .await?;

        tracing::info!(
            "Payment created for {}: reference={}, amount={} ({} unpaid tickets)",
            code,
            reference,
            amount,
            status.unpaid_tickets
        );

        Ok(PaymentRedirect {
            confirmation_code: code.as_str().to_string(),
            reference: reference.into_string(),
            amount,
            payment_url,
        })
    }

    /// Cancel semua ticket UNPAID. Kalau ada yang sudah PAID, harus lewat refund.
    pub async fn cancel_payment(&self, confirmation_code: &str) -> AppResult<CancellationResult> {
        let (tickets, status) = self.load(confirmation_code).await?;

        if status.paid_tickets > 0 {
            return Err(AppError::RequiresRefund { status: Box::new(status) });
        }

        let unpaid_ids: Vec<Uuid> = tickets
            .iter()
            .filter(|ticket| ticket.status == TicketStatus::Unpaid)
            .map(|ticket| ticket.id)
            .collect();

        if unpaid_ids.is_empty() {
            return Err(AppError::invalid_transition("Tidak ada tiket yang bisa dibatalkan", &status));
        }

        self.bookings.cancel(&unpaid_ids).await?;

        tracing::info!(
            target: "audit",
            "Booking {} cancelled: {} tickets",
            confirmation_code,
            unpaid_ids.len()
        );

        let status = self.query_status(confirmation_code).await?;

        Ok(CancellationResult {
            confirmation_code: confirmation_code.to_string(),
            cancelled_ticket_ids: unpaid_ids,
            status,
        })
    }

    /// Refund atas transaksi gateway terakhir. Full refund membatalkan ticket transaksi tersebut.
    pub async fn refund(
        &self,
        confirmation_code: &str,
        amount: Option<BigDecimal>,
        reason: &str,
        operator: Operator,
    ) -> AppResult<RefundRecord> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::ValidationError("Alasan refund wajib diisi".to_string()));
        }

        let (tickets, status) = self.load(confirmation_code).await?;

        if status.paid_tickets == 0 {
            return Err(AppError::invalid_transition("Tidak ada tiket PAID untuk di-refund", &status));
        }

        let amount = amount.unwrap_or_else(|| status.paid_amount.clone());
        if amount <= BigDecimal::zero() {
            return Err(AppError::InvalidAmount("Jumlah refund harus lebih besar dari 0".to_string()));
        }

        if amount > status.paid_amount {
            return Err(AppError::invalid_transition(
                format!("Jumlah refund {} melebihi paid amount {}", amount, status.paid_amount),
                &status,
            ));
        }

        let transaction = latest_transaction(&tickets).ok_or_else(|| {
            AppError::invalid_transition("Tiket PAID tidak punya gateway transaction id", &status)
        })?;

        // Sisa yang masih bisa di-refund dari transaksi ini
        let already_refunded = self.refunds.refunded_total(&transaction.transaction_no).await?;
        let refundable = &transaction.amount - &already_refunded;

        if refundable <= BigDecimal::zero() || amount > refundable {
            return Err(AppError::invalid_transition(
                format!(
                    "Jumlah refund {} melebihi sisa transaksi {} ({} dari {} sudah di-refund)",
                    amount, transaction.transaction_no, already_refunded, transaction.amount
                ),
                &status,
            ));
        }

        let full_refund = already_refunded.is_zero() && amount == transaction.amount;
        let closes_transaction = amount == refundable;

        let result = self.gateway
            .refund(&GatewayRefundRequest {
                reference: transaction.reference.clone(),
                amount: amount.clone(),
                full_refund,
                transaction_no: transaction.transaction_no.clone(),
                transaction_date: transaction
                    .paid_at
                    .with_timezone(&self.gateway_offset)
                    .format(VNPAY_DATE_FORMAT)
                    .to_string(),
                created_by: operator.email.clone(),
                reason: reason.to_string(),
            })
            .await?;

        // Uang sudah kembali di gateway: dari sini error tidak boleh membatalkan record
        let mut follow_up_required = false;

        let cancelled_ticket_ids = if closes_transaction {
            match self.bookings.cancel(&transaction.ticket_ids).await {
                Ok(()) => transaction.ticket_ids.clone(),
                Err(e) => {
                    tracing::error!(
                        target: "audit",
                        "Refund {} for {} succeeded but ticket cancel failed: {}",
                        transaction.transaction_no,
                        confirmation_code,
                        e
                    );
                    follow_up_required = true;
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        tracing::info!(
            target: "audit",
            "Refund {} for {} by {} ({}): full={}, txn={}, reason={}",
            amount,
            confirmation_code,
            operator.email,
            operator.id,
            full_refund,
            transaction.transaction_no,
            reason
        );

        let mut record = RefundRecord {
            confirmation_code: confirmation_code.to_string(),
            amount,
            full_refund,
            reason: reason.to_string(),
            operator,
            gateway_transaction_no: result
                .transaction_no
                .unwrap_or_else(|| transaction.transaction_no.clone()),
            gateway_response_code: result.response_code,
            cancelled_ticket_ids,
            follow_up_required,
            refunded_at: Utc::now(),
        };

        if let Err(e) = self.refunds.record(&transaction.transaction_no, &record).await {
            tracing::error!(
                target: "audit",
                "Refund {} for {} succeeded but ledger write failed: {}",
                transaction.transaction_no,
                confirmation_code,
                e
            );
            record.follow_up_required = true;
        }

        Ok(record)
    }

    /// Terapkan callback yang sudah diklasifikasi ke ticket state. Replay aman:
    /// booking yang sudah lunas jadi AlreadyPaid, bukan error.
    pub async fn confirm_return(&self, outcome: &ReturnOutcome) -> AppResult<ReconciliationResult> {
        if !outcome.is_accepted() {
            return Ok(ReconciliationResult::Rejected { reason: outcome.reason.clone() });
        }

        let Some(code) = outcome.confirmation_code.as_deref() else {
            tracing::warn!(
                target: "audit",
                "Accepted payment with undecodable reference {:?}, needs manual review",
                outcome.reference
            );
            return Ok(ReconciliationResult::ManualReview {
                cause: ReviewCause::UndecodableReference,
                reason: "Reference pembayaran tidak bisa dipetakan ke booking".to_string(),
            });
        };

        let (tickets, status) = self.load(code).await?;

        if status.total_tickets == 0 {
            tracing::warn!(target: "audit", "Accepted payment for unknown booking {}", code);
            return Ok(ReconciliationResult::ManualReview {
                cause: ReviewCause::BookingNotFound,
                reason: format!("Booking {} tidak ditemukan", code),
            });
        }

        if !status.payment_required {
            tracing::info!("Duplicate confirmation for {} ignored, booking already paid", code);
            return Ok(ReconciliationResult::AlreadyPaid { status });
        }

        // Tanpa amount dari gateway tidak ada bukti jumlah yang dibayar
        let Some(amount) = outcome.amount.as_ref() else {
            tracing::warn!(target: "audit", "Accepted payment for {} without gateway amount", code);
            return Ok(ReconciliationResult::ManualReview {
                cause: ReviewCause::AmountMismatch,
                reason: format!("Gateway tidak mengirim jumlah untuk {}", code),
            });
        };

        if *amount != status.unpaid_amount {
            tracing::warn!(
                target: "audit",
                "Amount mismatch for {}: gateway={}, unpaid={}",
                code,
                amount,
                status.unpaid_amount
            );
            return Ok(ReconciliationResult::ManualReview {
                cause: ReviewCause::AmountMismatch,
                reason: format!(
                    "Jumlah dari gateway {} tidak sama dengan sisa tagihan {}",
                    amount, status.unpaid_amount
                ),
            });
        }

        let reference = outcome.reference.clone().unwrap_or_default();
        let gateway_txn_id = outcome.transaction_no.clone().unwrap_or_else(|| reference.clone());

        let ticket_ids: Vec<Uuid> = tickets
            .iter()
            .filter(|ticket| ticket.status == TicketStatus::Unpaid)
            .map(|ticket| ticket.id)
            .collect();

        self.bookings.mark_paid(&ticket_ids, &gateway_txn_id, &reference).await?;

        tracing::info!(
            target: "audit",
            "Booking {} confirmed: {} tickets paid via {}",
            code,
            ticket_ids.len(),
            gateway_txn_id
        );

        let status = self.query_status(code).await?;
        Ok(ReconciliationResult::Confirmed { ticket_ids, status })
    }

    /// Re-query gateway untuk reference tertentu lalu reconcile seperti callback
    pub async fn reconcile_reference(
        &self,
        reference: &str,
        transaction_date: &str,
    ) -> AppResult<ReconciliationResult> {
        let parsed = ConfirmationCodeCodec::parse_reference(reference)?;
        let code = ConfirmationCodeCodec::decode_from_gateway(reference)?;

        let transaction = self.gateway.query_transaction(&parsed, transaction_date).await?;

        if !transaction.is_paid() {
            return Ok(ReconciliationResult::Rejected {
                reason: format!(
                    "Transaksi belum sukses di gateway (status {})",
                    transaction.transaction_status
                ),
            });
        }

        let outcome = ReturnOutcome {
            success: true,
            status: ReturnStatus::Accepted { kind: AcceptedKind::Fresh },
            confirmation_code: Some(code.as_str().to_string()),
            raw_response_code: Some(transaction.transaction_status.clone()),
            signature_valid: true,
            reason: "Confirmed by gateway query".to_string(),
            reference: Some(transaction.reference),
            transaction_no: transaction.transaction_no,
            amount: transaction.amount,
        };

        self.confirm_return(&outcome).await
    }
}

/// Balasan IPN untuk VNPay berdasarkan klasifikasi dan hasil reconcile
pub fn ipn_acknowledgement(outcome: &ReturnOutcome, result: &ReconciliationResult) -> IpnAcknowledgement {
    match (&outcome.status, result) {
        (ReturnStatus::Rejected { reason: RejectReason::SignatureInvalid }, _) => {
            IpnAcknowledgement::new("97", "Invalid signature")
        }
        (ReturnStatus::Rejected { reason: RejectReason::MalformedCallback(_) }, _) => {
            IpnAcknowledgement::new("99", "Invalid request")
        }
        // Pembayaran gagal tetap di-ack supaya gateway berhenti retry
        (ReturnStatus::Rejected { reason: RejectReason::Declined(_) }, _) => {
            IpnAcknowledgement::new("00", "Confirm Success")
        }
        (ReturnStatus::Accepted { .. }, ReconciliationResult::Confirmed { .. }) => {
            IpnAcknowledgement::new("00", "Confirm Success")
        }
        (ReturnStatus::Accepted { .. }, ReconciliationResult::AlreadyPaid { .. }) => {
            IpnAcknowledgement::new("02", "Order already confirmed")
        }
        (ReturnStatus::Accepted { .. }, ReconciliationResult::ManualReview { cause, .. }) => match cause {
            ReviewCause::AmountMismatch => IpnAcknowledgement::new("04", "Invalid amount"),
            ReviewCause::UndecodableReference | ReviewCause::BookingNotFound => {
                IpnAcknowledgement::new("01", "Order not found")
            }
        },
        (ReturnStatus::Accepted { .. }, ReconciliationResult::Rejected { .. }) => {
            IpnAcknowledgement::new("99", "Unknown error")
        }
    }
}

struct PaidTransaction {
    transaction_no: String,
    reference: String,
    paid_at: DateTime<Utc>,
    amount: BigDecimal,
    ticket_ids: Vec<Uuid>,
}

/// Transaksi gateway terakhir dari ticket PAID (group by gateway_txn_id)
fn latest_transaction(tickets: &[Ticket]) -> Option<PaidTransaction> {
    let latest = tickets
        .iter()
        .filter(|ticket| ticket.status == TicketStatus::Paid && ticket.gateway_txn_id.is_some())
        .max_by_key(|ticket| ticket.paid_at)?;

    let transaction_no = latest.gateway_txn_id.clone()?;
    let members: Vec<&Ticket> = tickets
        .iter()
        .filter(|ticket| {
            ticket.status == TicketStatus::Paid
                && ticket.gateway_txn_id.as_deref() == Some(transaction_no.as_str())
        })
        .collect();

    let amount = members
        .iter()
        .fold(BigDecimal::zero(), |total, ticket| total + &ticket.fare);

    Some(PaidTransaction {
        reference: latest.payment_reference.clone().unwrap_or_else(|| transaction_no.clone()),
        paid_at: latest.paid_at.unwrap_or_else(Utc::now),
        amount,
        ticket_ids: members.iter().map(|ticket| ticket.id).collect(),
        transaction_no,
    })
}
