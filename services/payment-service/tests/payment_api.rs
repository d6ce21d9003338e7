// /flight-booking/services/payment-service/tests/payment_api.rs

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    time::Duration,
};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use bigdecimal::BigDecimal;
use chrono::{FixedOffset, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use tokio_test::assert_ok;
use tower::ServiceExt;
use uuid::Uuid;
use flight_payment_service::{
    build_router,
    core::{
        confirmation::TransactionReference,
        services::*,
        vnpay::{canonical_query, sign},
    },
    middleware::auth::{Claims, JwtVerifier},
    models::*,
    repository::{BookingStore, CacheGuestBookingRepository, CacheRefundLedger},
    utils::{
        cache::CacheManager,
        config::{AppConfig, GatewayConfig},
        error::{AppError, AppResult},
    },
    AppState,
};

const SECRET: &str = "TESTSECRETKEY0123456789";
const TMN: &str = "FMSTEST1";
const INTERNAL_SECRET: &str = "gateway-shared-secret";
const JWT_SECRET: &str = "integration-test-jwt-secret-0123456789";
const CODE: &str = "FMS-20250527-A1B2";
const GUEST: &str = "guest-session-0001";

#[derive(Default)]
struct FakeBookings {
    tickets: Mutex<Vec<Ticket>>,
}

#[async_trait]
impl BookingStore for FakeBookings {
    async fn tickets_by_confirmation_code(&self, code: &str) -> AppResult<Vec<Ticket>> {
        Ok(self
            .tickets
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.confirmation_code == code)
            .cloned()
            .collect())
    }

    async fn mark_paid(&self, ids: &[Uuid], txn: &str, reference: &str) -> AppResult<()> {
        for t in self.tickets.lock().unwrap().iter_mut() {
            if ids.contains(&t.id) && t.status == TicketStatus::Unpaid {
                t.status = TicketStatus::Paid;
                t.paid_at = Some(Utc::now());
                t.gateway_txn_id = Some(txn.to_string());
                t.payment_reference = Some(reference.to_string());
            }
        }
        Ok(())
    }

    async fn cancel(&self, ids: &[Uuid]) -> AppResult<()> {
        for t in self.tickets.lock().unwrap().iter_mut() {
            if ids.contains(&t.id) {
                t.status = TicketStatus::Cancelled;
            }
        }
        Ok(())
    }

    async fn lookup_booking(&self, code: &str, email: &str) -> AppResult<Option<GuestBookingRecord>> {
        let tickets = self.tickets_by_confirmation_code(code).await?;
        let matches = tickets
            .iter()
            .any(|t| t.passenger_email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email)));
        Ok(matches.then(|| GuestBookingRecord::from_tickets(code, tickets)))
    }
}

struct FakeGateway;

#[async_trait]
impl GatewayClient for FakeGateway {
    async fn create_payment_url(&self, request: &PaymentUrlRequest) -> AppResult<String> {
        Ok(format!("https://sandbox.vnpayment.vn/pay?vnp_TxnRef={}", request.reference))
    }

    async fn query_transaction(&self, reference: &TransactionReference, _date: &str) -> AppResult<GatewayTransactionStatus> {
        Err(AppError::GatewayRejected {
            code: "91".to_string(),
            message: format!("{} not found", reference),
        })
    }

    async fn refund(&self, request: &GatewayRefundRequest) -> AppResult<GatewayRefundResult> {
        Ok(GatewayRefundResult {
            response_code: "00".to_string(),
            transaction_no: Some(request.transaction_no.clone()),
            message: Some("Refund success".to_string()),
        })
    }
}

fn ticket(fare: i64, status: TicketStatus) -> Ticket {
    Ticket {
        id: Uuid::new_v4(),
        confirmation_code: CODE.to_string(),
        fare: BigDecimal::from(fare),
        status,
        paid_at: None,
        gateway_txn_id: None,
        payment_reference: None,
        passenger_name: "Tran Thi B".to_string(),
        passenger_email: Some("guest@example.com".to_string()),
        flight: None,
    }
}

fn paid_ticket(fare: i64) -> Ticket {
    let mut t = ticket(fare, TicketStatus::Paid);
    t.paid_at = Some(Utc::now());
    t.gateway_txn_id = Some("14010000".to_string());
    t.payment_reference = Some(format!("051408{}", hex::encode(CODE)));
    t
}

fn config() -> AppConfig {
    AppConfig {
        environment: "development".to_string(),
        port: 0,
        booking_service_url: "http://127.0.0.1:1".to_string(),
        backend_timeout: Duration::from_secs(1),
        request_timeout: Duration::from_secs(5),
        gateway: GatewayConfig {
            tmn_code: TMN.to_string(),
            hash_secret: SECRET.to_string(),
            pay_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
            api_url: "http://127.0.0.1:1".to_string(),
            return_url: "http://localhost:8080/payment/return".to_string(),
            timeout: Duration::from_secs(1),
            utc_offset_hours: 7,
            server_ip: "127.0.0.1".to_string(),
        },
        confirmation_prefix: "FMS".to_string(),
        reference_max_len: 100,
        guest_capacity: 10,
        guest_ttl: Duration::from_secs(600),
        refund_ledger_ttl: Duration::from_secs(3600),
        redis_url: "redis://127.0.0.1:1".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        internal_secret: Some(INTERNAL_SECRET.to_string()),
        allowed_origins: vec!["http://localhost:8080".to_string()],
    }
}

fn app(tickets: Vec<Ticket>) -> (Router, Arc<FakeBookings>) {
    app_with(tickets, config())
}

fn app_with(tickets: Vec<Ticket>, config: AppConfig) -> (Router, Arc<FakeBookings>) {
    let bookings = Arc::new(FakeBookings {
        tickets: Mutex::new(tickets),
    });
    let cache_manager = CacheManager::new_in_memory("test");

    let state = AppState {
        orchestrator: Arc::new(PaymentOrchestrator::new(
            bookings.clone(),
            Arc::new(FakeGateway),
            Arc::new(CacheRefundLedger::new(cache_manager.clone(), config.refund_ledger_ttl)),
            ConfirmationCodeCodec::new("FMS", 100).unwrap(),
            FixedOffset::east_opt(7 * 3600).unwrap(),
        )),
        return_processor: Arc::new(GatewayReturnProcessor::new(SECRET, TMN)),
        guest_cache: Arc::new(GuestBookingCache::new(
            Arc::new(CacheGuestBookingRepository::new(cache_manager.clone(), config.guest_ttl)),
            bookings.clone(),
            config.guest_capacity,
        )),
        cache_manager,
        jwt: Arc::new(JwtVerifier::new(JWT_SECRET)),
        config: Arc::new(config),
    };

    (build_router(state), bookings)
}

fn signed_query(response_code: &str, minor_amount: &str) -> String {
    let mut params = BTreeMap::new();
    params.insert("vnp_TmnCode".to_string(), TMN.to_string());
    params.insert("vnp_Amount".to_string(), minor_amount.to_string());
    params.insert("vnp_TxnRef".to_string(), format!("051408{}", hex::encode(CODE)));
    params.insert("vnp_ResponseCode".to_string(), response_code.to_string());
    params.insert("vnp_TransactionNo".to_string(), "14012345".to_string());
    params.insert("vnp_TransactionStatus".to_string(), response_code.to_string());
    params.insert("vnp_OrderInfo".to_string(), "Thanh toan ve may bay".to_string());

    let query = canonical_query(&params);
    let signature = sign(SECRET, &query);
    format!("{}&vnp_SecureHash={}", query, signature)
}

fn token(role: &str) -> String {
    let claims = Claims {
        sub: Uuid::new_v4().to_string(),
        email: "ops@example.com".to_string(),
        role: role.to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes())).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_has_security_headers() {
    let (app, _) = app(vec![]);
    let response = app.clone().oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert!(response.headers().get("strict-transport-security").is_none());

    let production = AppConfig {
        environment: "production".to_string(),
        ..config()
    };
    let (app, _) = app_with(vec![], production);
    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert!(response.headers()["strict-transport-security"]
        .to_str()
        .unwrap()
        .starts_with("max-age="));
}

#[tokio::test]
async fn status_reports_live_totals() {
    let (app, _) = app(vec![paid_ticket(100), ticket(200, TicketStatus::Unpaid)]);
    let (status, body) = send(&app, get("/api/payments/FMS-20250527-A1B2/status")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_tickets"], 2);
    assert_eq!(body["data"]["partially_paid"], true);
    assert_eq!(body["data"]["booking_paid"], false);
}

#[tokio::test]
async fn create_payment_normalizes_code_and_charges_remainder() {
    let (app, _) = app(vec![paid_ticket(100), ticket(200, TicketStatus::Unpaid)]);
    let request = Request::builder()
        .method("POST")
        .uri("/api/payments/fms-20250527-a1b2")
        .header("X-Forwarded-For", "203.0.113.7")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["confirmation_code"], CODE);

    let amount: BigDecimal = body["data"]["amount"].as_str().unwrap().parse().unwrap();
    assert_eq!(amount, BigDecimal::from(200));
}

#[tokio::test]
async fn malformed_code_is_bad_request() {
    let (app, _) = app(vec![]);
    let (status, body) = send(&app, get("/api/payments/not-a-code/status")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "BAD_REQUEST");
}

#[tokio::test]
async fn cancel_with_paid_ticket_requires_refund() {
    let (app, bookings) = app(vec![paid_ticket(100), ticket(200, TicketStatus::Unpaid)]);
    let request = Request::builder()
        .method("PUT")
        .uri("/api/payments/FMS-20250527-A1B2/cancel")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_code"], "REQUIRES_REFUND");
    assert_eq!(body["details"]["paid_tickets"], 1);
    assert!(bookings
        .tickets
        .lock()
        .unwrap()
        .iter()
        .all(|t| t.status != TicketStatus::Cancelled));
}

#[tokio::test]
async fn return_callback_confirms_and_remembers_guest_booking() {
    let (app, bookings) = app(vec![ticket(100, TicketStatus::Unpaid), ticket(200, TicketStatus::Unpaid)]);

    let request = Request::builder()
        .uri(format!("/api/payments/vnpay-return?{}", signed_query("00", "30000")))
        .header("X-Guest-Session", GUEST)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["reconciliation"]["result"], "confirmed");
    assert!(bookings.tickets.lock().unwrap().iter().all(|t| t.status == TicketStatus::Paid));

    let request = Request::builder()
        .uri("/api/guest-bookings")
        .header("X-Guest-Session", GUEST)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["confirmationCode"], CODE);
}

#[tokio::test]
async fn tampered_return_is_rejected_without_detail() {
    let (app, bookings) = app(vec![ticket(300, TicketStatus::Unpaid)]);
    let query = signed_query("24", "30000").replace("vnp_ResponseCode=24", "vnp_ResponseCode=00");

    let (status, body) = send(&app, get(&format!("/api/payments/vnpay-return?{}", query))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Pembayaran ditolak");
    assert_eq!(body["data"]["outcome"]["signature_valid"], false);
    assert!(bookings.tickets.lock().unwrap().iter().all(|t| t.status == TicketStatus::Unpaid));
}

#[tokio::test]
async fn ipn_replay_is_acknowledged_as_already_confirmed() {
    let (app, _) = app(vec![ticket(300, TicketStatus::Unpaid)]);
    let uri = format!("/api/payments/vnpay-ipn?{}", signed_query("00", "30000"));

    let (_, first) = send(&app, get(&uri)).await;
    assert_eq!(first["RspCode"], "00");

    let (_, second) = send(&app, get(&uri)).await;
    assert_eq!(second["RspCode"], "02");

    let (_, tampered) = send(&app, get(&uri.replace("vnp_Amount=30000", "vnp_Amount=100"))).await;
    assert_eq!(tampered["RspCode"], "97");
}

#[tokio::test]
async fn admin_refund_requires_admin_role() {
    let (app, _) = app(vec![paid_ticket(300)]);
    let refund = |auth: Option<String>| {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/admin/payments/FMS-20250527-A1B2/refund")
            .header("Content-Type", "application/json");
        if let Some(token) = auth {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        builder
            .body(Body::from(r#"{"reason":"Flight cancelled by airline"}"#))
            .unwrap()
    };

    let (status, _) = send(&app, refund(None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, refund(Some(token("customer")))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, refund(Some(token("admin")))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["full_refund"], true);
    assert_eq!(body["data"]["operator"]["email"], "ops@example.com");

    // Retry refund yang sama ditolak, transaksi sudah habis di-refund
    let (status, body) = send(&app, refund(Some(token("admin")))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_code"], "INVALID_STATE_TRANSITION");
}

#[tokio::test]
async fn identity_headers_need_internal_secret() {
    let (app, bookings) = app(vec![paid_ticket(300)]);
    let refund = |secret: Option<&str>| {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/admin/payments/FMS-20250527-A1B2/refund")
            .header("Content-Type", "application/json")
            .header("X-Gateway-Request", "true")
            .header("X-User-Id", Uuid::new_v4().to_string())
            .header("X-User-Role", "admin")
            .header("X-User-Email", "ops@example.com");
        if let Some(secret) = secret {
            builder = builder.header("X-Internal-Secret", secret);
        }
        builder
            .body(Body::from(r#"{"reason":"Flight cancelled by airline"}"#))
            .unwrap()
    };

    let (status, _) = send(&app, refund(None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, refund(Some("wrong-secret"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(bookings.tickets.lock().unwrap().iter().all(|t| t.status == TicketStatus::Paid));

    let (status, _) = send(&app, refund(Some(INTERNAL_SECRET))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn guest_endpoints_need_identity() {
    let (app, _) = app(vec![ticket(300, TicketStatus::Unpaid)]);

    let (status, _) = send(&app, get("/api/guest-bookings")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, get("/api/guest-bookings/FMS-20250527-A1B2")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        get("/api/guest-bookings/FMS-20250527-A1B2?email=guest@example.com"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["confirmationCode"], CODE);

    let (status, _) = send(
        &app,
        get("/api/guest-bookings/FMS-20250527-A1B2?email=someone@example.com"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn guest_session_cannot_read_unsaved_booking_without_email() {
    let (app, _) = app(vec![ticket(300, TicketStatus::Unpaid)]);
    let lookup = |uri: &str| {
        Request::builder()
            .uri(uri)
            .header("X-Guest-Session", "f3a9c2d1-fresh-session-0001")
            .body(Body::empty())
            .unwrap()
    };

    let (status, _) = send(&app, lookup("/api/guest-bookings/FMS-20250527-A1B2")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        lookup("/api/guest-bookings/FMS-20250527-A1B2?email=guest@example.com"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn guest_remove_is_idempotent() {
    let (app, _) = app(vec![]);
    let remove = || {
        Request::builder()
            .method("DELETE")
            .uri("/api/guest-bookings/FMS-20250527-A1B2")
            .header("X-Guest-Session", GUEST)
            .body(Body::empty())
            .unwrap()
    };

    let response = assert_ok!(app.clone().oneshot(remove()).await);
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = assert_ok!(app.clone().oneshot(remove()).await);
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
