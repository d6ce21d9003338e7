// /flight-booking/services/payment-service/src/models.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use validator::Validate;
use bigdecimal::BigDecimal;

// ========================= DOMAIN MODELS =========================

/// Ticket dari booking backend. Satu confirmation code bisa punya banyak ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Uuid,
    pub confirmation_code: String,
    pub fare: BigDecimal,
    pub status: TicketStatus,
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub gateway_txn_id: Option<String>,
    #[serde(default)]
    pub payment_reference: Option<String>,
    pub passenger_name: String,
    #[serde(default)]
    pub passenger_email: Option<String>,
    #[serde(default)]
    pub flight: Option<FlightSummary>,
}

/// Snapshot flight yang ikut disimpan di guest booking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlightSummary {
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: Option<DateTime<Utc>>,
    pub seat_class: Option<String>,
}

/// Rollup status pembayaran per confirmation code. Selalu dihitung ulang, tidak pernah disimpan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingPaymentStatus {
    pub confirmation_code: String,
    pub total_tickets: usize,
    pub paid_tickets: usize,
    pub unpaid_tickets: usize,
    pub total_amount: BigDecimal,
    pub paid_amount: BigDecimal,
    pub unpaid_amount: BigDecimal,
    pub booking_paid: bool,
    pub partially_paid: bool,
    pub payment_required: bool,
}

/// Guest booking yang disimpan per guest session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GuestBookingRecord {
    pub confirmation_code: String,
    pub tickets: Vec<Ticket>,
    pub stored_at: DateTime<Utc>,
}

impl GuestBookingRecord {
    /// Build record dari ticket snapshot terbaru
    pub fn from_tickets(confirmation_code: &str, tickets: Vec<Ticket>) -> Self {
        Self {
            confirmation_code: confirmation_code.to_string(),
            tickets,
            stored_at: Utc::now(),
        }
    }

    /// Email semua penumpang di booking ini
    pub fn passenger_emails(&self) -> impl Iterator<Item = &str> {
        self.tickets
            .iter()
            .filter_map(|ticket| ticket.passenger_email.as_deref())
    }
}

/// Hasil createPayment yang dikirim ke frontend untuk redirect
#[derive(Debug, Clone, Serialize)]
pub struct PaymentRedirect {
    pub confirmation_code: String,
    pub reference: String,
    pub amount: BigDecimal,
    pub payment_url: String,
}

/// Hasil cancelPayment
#[derive(Debug, Clone, Serialize)]
pub struct CancellationResult {
    pub confirmation_code: String,
    pub cancelled_ticket_ids: Vec<Uuid>,
    pub status: BookingPaymentStatus,
}

/// Identitas operator yang melakukan refund (untuk audit)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Operator {
    pub id: Uuid,
    pub email: String,
}

/// Refund record yang dikembalikan ke caller dan disimpan di refund ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRecord {
    pub confirmation_code: String,
    pub amount: BigDecimal,
    pub full_refund: bool,
    pub reason: String,
    pub operator: Operator,
    pub gateway_transaction_no: String,
    pub gateway_response_code: String,
    pub cancelled_ticket_ids: Vec<Uuid>,
    /// Gateway sudah refund tapi update ticket/ledger gagal, perlu ditindaklanjuti operator
    #[serde(default)]
    pub follow_up_required: bool,
    pub refunded_at: DateTime<Utc>,
}

/// Hasil reconcile callback terhadap ticket state
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ReconciliationResult {
    Confirmed {
        ticket_ids: Vec<Uuid>,
        status: BookingPaymentStatus,
    },
    AlreadyPaid {
        status: BookingPaymentStatus,
    },
    Rejected {
        reason: String,
    },
    ManualReview {
        cause: ReviewCause,
        reason: String,
    },
}

/// Kenapa callback yang valid tetap butuh penanganan manual
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewCause {
    UndecodableReference,
    BookingNotFound,
    AmountMismatch,
}

// ========================= REQUEST DTOs =========================

/// Request untuk refund booking (admin)
#[derive(Debug, Deserialize, Validate)]
pub struct RefundRequest {
    /// Jumlah refund (optional, default seluruh paid amount)
    pub amount: Option<BigDecimal>,

    #[validate(length(min = 5, max = 500, message = "Alasan refund wajib diisi (5-500 karakter)"))]
    pub reason: String,
}

/// Request untuk re-query transaksi ke gateway (admin)
#[derive(Debug, Deserialize, Validate)]
pub struct ReconcileRequest {
    #[validate(length(min = 7, max = 100))]
    pub reference: String,

    /// Tanggal transaksi format yyyyMMddHHmmss (waktu gateway)
    #[validate(length(equal = 14))]
    pub transaction_date: String,
}

/// Query parameter untuk guest lookup
#[derive(Debug, Deserialize)]
pub struct GuestLookupQuery {
    pub email: Option<String>,
}

// ========================= RESPONSE DTOs =========================

/// Standard response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

/// Standard error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub error_code: Option<String>,
    pub details: Option<serde_json::Value>,
}

/// Response untuk IPN gateway. Format ditentukan VNPay.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct IpnAcknowledgement {
    #[serde(rename = "RspCode")]
    pub rsp_code: String,
    #[serde(rename = "Message")]
    pub message: String,
}

impl IpnAcknowledgement {
    pub fn new(rsp_code: &str, message: &str) -> Self {
        Self {
            rsp_code: rsp_code.to_string(),
            message: message.to_string(),
        }
    }
}

// ========================= PAYMENT GATEWAY DTOs =========================

/// Input untuk membuat payment URL
#[derive(Debug, Clone)]
pub struct PaymentUrlRequest {
    pub amount: BigDecimal,
    pub reference: String,
    pub order_info: String,
    pub client_ip: String,
}

/// vnp_TransactionStatus untuk transaksi yang sudah selesai di gateway
pub const TRANSACTION_STATUS_SUCCESS: &str = "00";

/// Status transaksi dari querydr
#[derive(Debug, Clone, Serialize)]
pub struct GatewayTransactionStatus {
    pub reference: String,
    pub transaction_status: String,
    pub transaction_no: Option<String>,
    pub amount: Option<BigDecimal>,
    pub bank_code: Option<String>,
    pub pay_date: Option<String>,
    pub message: Option<String>,
}

impl GatewayTransactionStatus {
    pub fn is_paid(&self) -> bool {
        self.transaction_status == TRANSACTION_STATUS_SUCCESS
    }
}

/// Input untuk refund ke gateway
#[derive(Debug, Clone)]
pub struct GatewayRefundRequest {
    pub reference: String,
    pub amount: BigDecimal,
    pub full_refund: bool,
    pub transaction_no: String,
    pub transaction_date: String,
    pub created_by: String,
    pub reason: String,
}

/// Hasil refund dari gateway
#[derive(Debug, Clone, Serialize)]
pub struct GatewayRefundResult {
    pub response_code: String,
    pub transaction_no: Option<String>,
    pub message: Option<String>,
}

/// VNPay merchant API request (querydr)
#[derive(Debug, Serialize)]
#[allow(non_snake_case)]
pub struct VnpayQueryRequest {
    pub vnp_RequestId: String,
    pub vnp_Version: String,
    pub vnp_Command: String,
    pub vnp_TmnCode: String,
    pub vnp_TxnRef: String,
    pub vnp_OrderInfo: String,
    pub vnp_TransactionDate: String,
    pub vnp_CreateDate: String,
    pub vnp_IpAddr: String,
    pub vnp_SecureHash: String,
}

/// VNPay merchant API request (refund)
#[derive(Debug, Serialize)]
#[allow(non_snake_case)]
pub struct VnpayRefundRequest {
    pub vnp_RequestId: String,
    pub vnp_Version: String,
    pub vnp_Command: String,
    pub vnp_TmnCode: String,
    pub vnp_TransactionType: String,
    pub vnp_TxnRef: String,
    pub vnp_Amount: String,
    pub vnp_TransactionNo: String,
    pub vnp_TransactionDate: String,
    pub vnp_CreateBy: String,
    pub vnp_CreateDate: String,
    pub vnp_IpAddr: String,
    pub vnp_OrderInfo: String,
    pub vnp_SecureHash: String,
}

/// VNPay merchant API response (querydr dan refund pakai bentuk yang sama)
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
pub struct VnpayApiResponse {
    pub vnp_ResponseId: Option<String>,
    pub vnp_Command: Option<String>,
    pub vnp_ResponseCode: String,
    pub vnp_Message: Option<String>,
    pub vnp_TmnCode: Option<String>,
    pub vnp_TxnRef: Option<String>,
    pub vnp_Amount: Option<String>,
    pub vnp_OrderInfo: Option<String>,
    pub vnp_BankCode: Option<String>,
    pub vnp_PayDate: Option<String>,
    pub vnp_TransactionNo: Option<String>,
    pub vnp_TransactionType: Option<String>,
    pub vnp_TransactionStatus: Option<String>,
    pub vnp_PromotionCode: Option<String>,
    pub vnp_PromotionAmount: Option<String>,
    pub vnp_SecureHash: Option<String>,
}

// ========================= ENUMS =========================

/// Ticket status. Wire value dari booking backend: 0 / 1 / 2.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub enum TicketStatus {
    Unpaid,
    Paid,
    Cancelled,
}

impl TicketStatus {
    /// Mapping table ke wire value backend
    pub const fn wire_value(self) -> u8 {
        match self {
            TicketStatus::Unpaid => 0,
            TicketStatus::Paid => 1,
            TicketStatus::Cancelled => 2,
        }
    }
}

impl TryFrom<u8> for TicketStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TicketStatus::Unpaid),
            1 => Ok(TicketStatus::Paid),
            2 => Ok(TicketStatus::Cancelled),
            other => Err(format!("unknown ticket status {}", other)),
        }
    }
}

impl From<TicketStatus> for u8 {
    fn from(status: TicketStatus) -> Self {
        status.wire_value()
    }
}

/// Response code VNPay (vnp_ResponseCode). Satu-satunya tempat mapping wire code ke outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayResponseCode {
    Success,
    AlreadyConfirmed,
    SuspectedFraud,
    InternetBankingNotRegistered,
    AuthenticationFailed,
    PaymentTimeout,
    AccountLocked,
    WrongOtp,
    CancelledByCustomer,
    InsufficientBalance,
    DailyLimitExceeded,
    BankMaintenance,
    TooManyPasswordAttempts,
    Other(String),
}

impl GatewayResponseCode {
    pub fn from_wire(code: &str) -> Self {
        match code {
            "00" => GatewayResponseCode::Success,
            "01" => GatewayResponseCode::AlreadyConfirmed,
            "07" => GatewayResponseCode::SuspectedFraud,
            "09" => GatewayResponseCode::InternetBankingNotRegistered,
            "10" => GatewayResponseCode::AuthenticationFailed,
            "11" => GatewayResponseCode::PaymentTimeout,
            "12" => GatewayResponseCode::AccountLocked,
            "13" => GatewayResponseCode::WrongOtp,
            "24" => GatewayResponseCode::CancelledByCustomer,
            "51" => GatewayResponseCode::InsufficientBalance,
            "65" => GatewayResponseCode::DailyLimitExceeded,
            "75" => GatewayResponseCode::BankMaintenance,
            "79" => GatewayResponseCode::TooManyPasswordAttempts,
            other => GatewayResponseCode::Other(other.to_string()),
        }
    }

    pub fn as_wire(&self) -> &str {
        match self {
            GatewayResponseCode::Success => "00",
            GatewayResponseCode::AlreadyConfirmed => "01",
            GatewayResponseCode::SuspectedFraud => "07",
            GatewayResponseCode::InternetBankingNotRegistered => "09",
            GatewayResponseCode::AuthenticationFailed => "10",
            GatewayResponseCode::PaymentTimeout => "11",
            GatewayResponseCode::AccountLocked => "12",
            GatewayResponseCode::WrongOtp => "13",
            GatewayResponseCode::CancelledByCustomer => "24",
            GatewayResponseCode::InsufficientBalance => "51",
            GatewayResponseCode::DailyLimitExceeded => "65",
            GatewayResponseCode::BankMaintenance => "75",
            GatewayResponseCode::TooManyPasswordAttempts => "79",
            GatewayResponseCode::Other(code) => code,
        }
    }

    /// "00" dan "01" dianggap sukses, tapi tetap dibedakan untuk audit
    pub fn is_success_family(&self) -> bool {
        matches!(self, GatewayResponseCode::Success | GatewayResponseCode::AlreadyConfirmed)
    }

    /// Reason yang bisa ditampilkan ke user
    pub fn reason(&self) -> &'static str {
        match self {
            GatewayResponseCode::Success => "Payment successful",
            GatewayResponseCode::AlreadyConfirmed => "Payment was already confirmed",
            GatewayResponseCode::SuspectedFraud => "Amount deducted but the transaction is flagged as suspicious",
            GatewayResponseCode::InternetBankingNotRegistered => "Card or account is not registered for internet banking",
            GatewayResponseCode::AuthenticationFailed => "Card or account verification failed too many times",
            GatewayResponseCode::PaymentTimeout => "Payment window expired",
            GatewayResponseCode::AccountLocked => "Card or account is locked",
            GatewayResponseCode::WrongOtp => "Wrong one-time password",
            GatewayResponseCode::CancelledByCustomer => "Payment cancelled by customer",
            GatewayResponseCode::InsufficientBalance => "Insufficient balance",
            GatewayResponseCode::DailyLimitExceeded => "Daily transaction limit exceeded",
            GatewayResponseCode::BankMaintenance => "Issuing bank is under maintenance",
            GatewayResponseCode::TooManyPasswordAttempts => "Too many wrong payment password attempts",
            GatewayResponseCode::Other(_) => "Payment failed",
        }
    }
}

impl Serialize for GatewayResponseCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

/// Outcome classification untuk return callback
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReturnStatus {
    Accepted { kind: AcceptedKind },
    Rejected { reason: RejectReason },
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AcceptedKind {
    Fresh,
    AlreadyConfirmed,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RejectReason {
    MalformedCallback(String),
    SignatureInvalid,
    Declined(String),
}

/// Hasil klasifikasi satu return callback. Tidak ada mutation di sini.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReturnOutcome {
    pub success: bool,
    pub status: ReturnStatus,
    pub confirmation_code: Option<String>,
    pub raw_response_code: Option<String>,
    pub signature_valid: bool,
    pub reason: String,
    pub reference: Option<String>,
    pub transaction_no: Option<String>,
    pub amount: Option<BigDecimal>,
}

impl ReturnOutcome {
    /// Outcome untuk callback yang ditolak sebelum atau saat cek signature
    pub fn rejected(reason: RejectReason, signature_valid: bool) -> Self {
        let text = match &reason {
            RejectReason::MalformedCallback(detail) => format!("Malformed callback: {}", detail),
            RejectReason::SignatureInvalid => "Invalid signature".to_string(),
            RejectReason::Declined(detail) => detail.clone(),
        };

        Self {
            success: false,
            status: ReturnStatus::Rejected { reason },
            confirmation_code: None,
            raw_response_code: None,
            signature_valid,
            reason: text,
            reference: None,
            transaction_no: None,
            amount: None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.status, ReturnStatus::Accepted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_status_wire_mapping() {
        assert_eq!(TicketStatus::try_from(0), Ok(TicketStatus::Unpaid));
        assert_eq!(TicketStatus::try_from(1), Ok(TicketStatus::Paid));
        assert_eq!(TicketStatus::try_from(2), Ok(TicketStatus::Cancelled));
        assert!(TicketStatus::try_from(3).is_err());

        let json = serde_json::to_string(&TicketStatus::Cancelled).unwrap();
        assert_eq!(json, "2");
    }

    #[test]
    fn test_ticket_deserializes_backend_payload() {
        let payload = serde_json::json!({
            "id": "6f1c2a9e-8d8b-4a55-9a43-1e0a4c0b7d11",
            "confirmationCode": "FMS-20250527-A1B2",
            "fare": "1500000",
            "status": 1,
            "paidAt": "2025-05-27T05:14:08Z",
            "gatewayTxnId": "14012345",
            "passengerName": "Nguyen Van A",
            "passengerEmail": "a@example.com"
        });

        let ticket: Ticket = serde_json::from_value(payload).unwrap();
        assert_eq!(ticket.status, TicketStatus::Paid);
        assert_eq!(ticket.fare, BigDecimal::from(1_500_000));
        assert!(ticket.flight.is_none());
        assert!(ticket.payment_reference.is_none());
    }

    #[test]
    fn test_response_code_table() {
        assert!(GatewayResponseCode::from_wire("00").is_success_family());
        assert!(GatewayResponseCode::from_wire("01").is_success_family());
        assert_ne!(GatewayResponseCode::from_wire("00"), GatewayResponseCode::from_wire("01"));
        assert!(!GatewayResponseCode::from_wire("24").is_success_family());
        assert_eq!(GatewayResponseCode::from_wire("42").as_wire(), "42");
        assert_eq!(GatewayResponseCode::from_wire("51").reason(), "Insufficient balance");
    }
}
