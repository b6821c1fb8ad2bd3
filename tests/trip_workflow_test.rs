use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use async_trait::async_trait;
use dispatch_admin::auth::create_jwt;
use dispatch_admin::config::Config;
use dispatch_admin::infrastructure::AppState;
use dispatch_admin::models::{facility, managed_client, profile, trip};
use dispatch_admin::modules::integrations::{ChargeOutcome, ChargeRequest, PaymentGateway};
use dispatch_admin::{db, server};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::util::ServiceExt; // for `oneshot`
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct TestApp {
    app: Router,
    db: DatabaseConnection,
    token: String,
    client_id: i32,
}

async fn setup_with(config: Config) -> TestApp {
    build(config, |_| None).await
}

/// App whose payment gateway is built from the test database
async fn setup_with_gateway(
    make: impl FnOnce(&DatabaseConnection) -> Arc<dyn PaymentGateway>,
) -> TestApp {
    build(Config::for_tests(), |db| Some(make(db))).await
}

async fn build(
    config: Config,
    gateway: impl FnOnce(&DatabaseConnection) -> Option<Arc<dyn PaymentGateway>>,
) -> TestApp {
    let db = db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB");
    let dispatcher = create_profile(&db, "dispatch@example.com", "dispatcher").await;
    let client_id = create_profile(&db, "rider@example.com", "client").await;
    let token = create_jwt("test-secret", dispatcher, "dispatcher").unwrap();
    let mut state = AppState::new(db.clone(), config);
    if let Some(gateway) = gateway(&db) {
        state = state.with_payment_gateway(gateway);
    }
    TestApp {
        app: server::build_router(state),
        db,
        token,
        client_id,
    }
}

async fn setup() -> TestApp {
    setup_with(Config::for_tests()).await
}

/// Config whose payment service is the given mock server
fn config_for(server: &MockServer, timeout: Duration) -> Config {
    let mut config = Config::for_tests();
    config.payment_service_url = Some(url::Url::parse(&server.uri()).unwrap());
    config.payment_timeout = timeout;
    config
}

async fn create_profile(db: &DatabaseConnection, email: &str, role: &str) -> i32 {
    let now = chrono::Utc::now().to_rfc3339();
    profile::ActiveModel {
        email: Set(email.to_string()),
        password_hash: Set("unused".to_string()),
        first_name: Set("Test".to_string()),
        last_name: Set(role.to_string()),
        role: Set(role.to_string()),
        status: Set("active".to_string()),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create profile")
    .id
}

async fn insert_trip(
    db: &DatabaseConnection,
    user_id: Option<i32>,
    status: &str,
    payment_method: Option<&str>,
) -> i32 {
    let now = chrono::Utc::now().to_rfc3339();
    trip::ActiveModel {
        user_id: Set(user_id),
        pickup_address: Set("1 Main St".to_string()),
        destination_address: Set("2 Clinic Rd".to_string()),
        pickup_time: Set("2026-05-04T09:30:00Z".to_string()),
        is_round_trip: Set(false),
        additional_passengers: Set(0),
        price: Set(Some(45.0)),
        status: Set(status.to_string()),
        payment_method_id: Set(payment_method.map(str::to_string)),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create trip")
    .id
}

async fn stored_trip(db: &DatabaseConnection, id: i32) -> trip::Model {
    trip::Entity::find_by_id(id).one(db).await.unwrap().unwrap()
}

async fn post(app: &Router, token: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, token, "POST", uri, body).await
}

async fn put(app: &Router, token: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, token, "PUT", uri, body).await
}

async fn send(
    app: &Router,
    token: &str,
    method: &str,
    uri: &str,
    body: Value,
) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn act(t: &TestApp, trip_id: i32, action: &str, reason: Option<&str>) -> (StatusCode, Value) {
    post(
        &t.app,
        &t.token,
        "/api/trips/actions",
        json!({ "trip_id": trip_id, "action": action, "reason": reason }),
    )
    .await
}

#[tokio::test]
async fn test_approve_rejects_every_status_but_pending() {
    let t = setup().await;

    for status in [
        "upcoming",
        "approved_pending_payment",
        "paid_in_progress",
        "completed",
        "cancelled",
    ] {
        let id = insert_trip(&t.db, Some(t.client_id), status, Some("pm_1")).await;
        let (code, body) = act(&t, id, "approve", None).await;
        assert_eq!(code, StatusCode::BAD_REQUEST, "approve from {}", status);
        assert_eq!(body["success"], false);
        assert_eq!(stored_trip(&t.db, id).await.status, status);
    }
}

#[tokio::test]
async fn test_approve_charges_eligible_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/stripe/charge-payment"))
        .and(body_partial_json(json!({ "payment_method_id": "pm_card", "amount": 45.0 })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true, "paymentIntentId": "pi_123" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let t = setup_with(config_for(&server, Duration::from_secs(5))).await;
    let id = insert_trip(&t.db, Some(t.client_id), "pending", Some("pm_card")).await;

    let (code, body) = act(&t, id, "approve", None).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["payment"]["charged"], true);
    assert_eq!(body["payment"]["fallback"], false);
    assert_eq!(body["trip"]["status"], "paid_in_progress");

    let stored = stored_trip(&t.db, id).await;
    assert_eq!(stored.status, "paid_in_progress");
    assert_eq!(stored.payment_status.as_deref(), Some("paid"));
    assert_eq!(stored.payment_intent_id.as_deref(), Some("pi_123"));
    assert!(stored.approved_at.is_some());
}

#[tokio::test]
async fn test_failed_charge_still_approves_with_pending_marker() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/stripe/charge-payment"))
        .respond_with(
            ResponseTemplate::new(402).set_body_json(json!({ "error": "card_declined" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let t = setup_with(config_for(&server, Duration::from_secs(5))).await;
    let id = insert_trip(&t.db, Some(t.client_id), "pending", Some("pm_card")).await;

    let (code, body) = act(&t, id, "approve", None).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["payment"]["fallback"], true);

    let stored = stored_trip(&t.db, id).await;
    assert_eq!(stored.status, "approved_pending_payment");
    assert_eq!(stored.payment_status.as_deref(), Some("pending"));
    assert_eq!(
        stored.payment_note.as_deref(),
        Some("Payment pending: card_declined")
    );
    assert!(stored.payment_intent_id.is_none());
}

#[tokio::test]
async fn test_payment_timeout_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/stripe/charge-payment"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true, "payment_intent_id": "pi_late" }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let t = setup_with(config_for(&server, Duration::from_millis(200))).await;
    let id = insert_trip(&t.db, Some(t.client_id), "pending", Some("pm_card")).await;

    let (code, body) = act(&t, id, "approve", None).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["payment"]["fallback"], true);

    let stored = stored_trip(&t.db, id).await;
    assert_eq!(stored.status, "approved_pending_payment");
    assert!(
        stored
            .payment_note
            .as_deref()
            .unwrap()
            .starts_with("Payment pending: payment service timed out")
    );
}

#[tokio::test]
async fn test_approve_without_payment_method_skips_charge() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let t = setup_with(config_for(&server, Duration::from_secs(5))).await;
    let id = insert_trip(&t.db, Some(t.client_id), "pending", None).await;

    let (code, body) = post(&t.app, &t.token, &format!("/api/trips/{}/approve", id), json!({})).await;
    assert_eq!(code, StatusCode::OK);
    assert!(body["payment"].is_null());
    assert_eq!(stored_trip(&t.db, id).await.status, "upcoming");
}

#[tokio::test]
async fn test_unconfigured_payment_service_falls_back() {
    let t = setup().await;
    let id = insert_trip(&t.db, Some(t.client_id), "pending", Some("pm_card")).await;

    let (code, body) = act(&t, id, "approve", None).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["payment"]["fallback"], true);
    assert_eq!(stored_trip(&t.db, id).await.status, "approved_pending_payment");
}

#[tokio::test]
async fn test_reject_stores_reason_verbatim() {
    let t = setup().await;
    let reason = "  Rider called: appointment moved to Friday  ";

    for status in ["pending", "upcoming", "approved_pending_payment"] {
        let id = insert_trip(&t.db, Some(t.client_id), status, None).await;
        let (code, body) = act(&t, id, "reject", Some(reason)).await;
        assert_eq!(code, StatusCode::OK, "reject from {}", status);
        assert_eq!(body["trip"]["status"], "cancelled");

        let stored = stored_trip(&t.db, id).await;
        assert_eq!(stored.status, "cancelled");
        assert_eq!(stored.cancellation_reason.as_deref(), Some(reason));
        assert!(stored.cancelled_at.is_some());
    }
}

#[tokio::test]
async fn test_reject_requires_reason_and_open_status() {
    let t = setup().await;

    let id = insert_trip(&t.db, Some(t.client_id), "pending", None).await;
    for reason in [None, Some(""), Some("   ")] {
        let (code, _) = act(&t, id, "reject", reason).await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
    }
    let (code, _) = post(&t.app, &t.token, &format!("/api/trips/{}/reject", id), json!({})).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert_eq!(stored_trip(&t.db, id).await.status, "pending");

    for status in ["paid_in_progress", "completed", "cancelled"] {
        let id = insert_trip(&t.db, Some(t.client_id), status, None).await;
        let (code, _) = act(&t, id, "reject", Some("no longer needed")).await;
        assert_eq!(code, StatusCode::BAD_REQUEST, "reject from {}", status);
        assert_eq!(stored_trip(&t.db, id).await.status, status);
    }
}

#[tokio::test]
async fn test_complete_only_from_paid_or_upcoming() {
    let t = setup().await;

    for status in ["paid_in_progress", "upcoming"] {
        let id = insert_trip(&t.db, Some(t.client_id), status, None).await;
        let (code, body) =
            post(&t.app, &t.token, &format!("/api/trips/{}/complete", id), json!({})).await;
        assert_eq!(code, StatusCode::OK, "complete from {}", status);
        assert_eq!(body["trip"]["status"], "completed");
        assert!(stored_trip(&t.db, id).await.completed_at.is_some());
    }

    for status in ["pending", "approved_pending_payment", "completed", "cancelled"] {
        let id = insert_trip(&t.db, Some(t.client_id), status, None).await;
        let (code, _) = act(&t, id, "complete", None).await;
        assert_eq!(code, StatusCode::BAD_REQUEST, "complete from {}", status);
        assert_eq!(stored_trip(&t.db, id).await.status, status);
    }
}

#[tokio::test]
async fn test_unknown_action_and_missing_trip() {
    let t = setup().await;
    let id = insert_trip(&t.db, Some(t.client_id), "pending", None).await;

    let (code, body) = act(&t, id, "teleport", None).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("teleport"));

    let (code, body) = act(&t, 9999, "approve", None).await;
    assert_eq!(code, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Trip not found");
}

#[tokio::test]
async fn test_rider_is_notified_of_action() {
    let t = setup().await;
    let id = insert_trip(&t.db, Some(t.client_id), "pending", None).await;
    act(&t, id, "approve", None).await;

    let rider_token = create_jwt("test-secret", t.client_id, "client").unwrap();
    let req = Request::builder()
        .uri("/api/notifications")
        .header(header::AUTHORIZATION, format!("Bearer {}", rider_token))
        .body(Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["unread"], 1);
    assert_eq!(body["notifications"][0]["related_trip_id"], id);
    assert_eq!(body["notifications"][0]["title"], "Trip approved");
}

#[tokio::test]
async fn test_create_trip_rules() {
    let t = setup().await;
    let now = chrono::Utc::now().to_rfc3339();
    let facility = facility::ActiveModel {
        name: Set("Oak Grove".to_string()),
        is_active: Set(true),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    }
    .insert(&t.db)
    .await
    .unwrap();
    let resident = managed_client::ActiveModel {
        facility_id: Set(facility.id),
        first_name: Set("Ada".to_string()),
        last_name: Set("Moss".to_string()),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&t.db)
    .await
    .unwrap();

    let base = json!({
        "pickup_address": "Oak Grove",
        "destination_address": "Dialysis Center",
        "pickup_time": "2026-06-01T08:00:00Z"
    });
    let with = |extra: Value| {
        let mut body = base.clone();
        for (k, v) in extra.as_object().unwrap() {
            body[k] = v.clone();
        }
        body
    };

    // Facility rider: facility copied, starts upcoming
    let (code, body) = post(
        &t.app,
        &t.token,
        "/api/trips",
        with(json!({ "managed_client_id": resident.id })),
    )
    .await;
    assert_eq!(code, StatusCode::CREATED);
    assert_eq!(body["trip"]["facility_id"], facility.id);
    assert_eq!(body["trip"]["status"], "upcoming");

    // Individual rider starts pending
    let (code, body) = post(
        &t.app,
        &t.token,
        "/api/trips",
        with(json!({ "user_id": t.client_id, "payment_method_id": "pm_1" })),
    )
    .await;
    assert_eq!(code, StatusCode::CREATED);
    assert_eq!(body["trip"]["status"], "pending");

    // Both or neither rider
    for extra in [
        json!({ "user_id": t.client_id, "managed_client_id": resident.id }),
        json!({}),
    ] {
        let (code, _) = post(&t.app, &t.token, "/api/trips", with(extra)).await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
    }

    // Blank address
    let (code, _) = post(
        &t.app,
        &t.token,
        "/api/trips",
        with(json!({ "user_id": t.client_id, "pickup_address": " " })),
    )
    .await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_assign_driver_checks_driver_and_trip() {
    let t = setup().await;
    let driver = create_profile(&t.db, "driver@example.com", "driver").await;
    let trip_id = insert_trip(&t.db, Some(t.client_id), "upcoming", None).await;

    let uri = format!("/api/trips/{}/assign-driver", trip_id);
    let (code, body) = post(&t.app, &t.token, &uri, json!({ "driver_id": driver })).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["trip"]["driver_id"], driver);

    // A client is not a driver
    let (code, _) = post(&t.app, &t.token, &uri, json!({ "driver_id": t.client_id })).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);

    let done = insert_trip(&t.db, Some(t.client_id), "completed", None).await;
    let (code, _) = post(
        &t.app,
        &t.token,
        &format!("/api/trips/{}/assign-driver", done),
        json!({ "driver_id": driver }),
    )
    .await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
}

/// Records every amount it is asked to charge
#[derive(Default)]
struct RecordingGateway {
    amounts: Mutex<Vec<f64>>,
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn charge(&self, request: &ChargeRequest) -> ChargeOutcome {
        self.amounts.lock().unwrap().push(request.amount);
        ChargeOutcome::Charged {
            payment_intent_id: Some("pi_recorded".to_string()),
        }
    }
}

/// Cancels the trip while the charge is in flight, then reports success
struct CancelDuringCharge {
    db: DatabaseConnection,
}

#[async_trait]
impl PaymentGateway for CancelDuringCharge {
    async fn charge(&self, request: &ChargeRequest) -> ChargeOutcome {
        let mut row: trip::ActiveModel = stored_trip(&self.db, request.trip_id).await.into();
        row.status = Set("cancelled".to_string());
        row.cancellation_reason = Set(Some("rider called".to_string()));
        row.update(&self.db).await.unwrap();
        ChargeOutcome::Charged {
            payment_intent_id: Some("pi_late".to_string()),
        }
    }
}

async fn set_price(db: &DatabaseConnection, id: i32, price: Option<f64>) {
    let mut row: trip::ActiveModel = stored_trip(db, id).await.into();
    row.price = Set(price);
    row.update(db).await.unwrap();
}

#[tokio::test]
async fn test_cancel_during_charge_is_not_overwritten() {
    let t = setup_with_gateway(|db| {
        let gateway: Arc<dyn PaymentGateway> = Arc::new(CancelDuringCharge { db: db.clone() });
        gateway
    })
    .await;
    let id = insert_trip(&t.db, Some(t.client_id), "pending", Some("pm_1")).await;

    let (code, body) = act(&t, id, "approve", None).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["trip"]["status"], "cancelled");
    assert_eq!(body["payment"]["fallback"], true);

    let stored = stored_trip(&t.db, id).await;
    assert_eq!(stored.status, "cancelled");
    assert_eq!(stored.cancellation_reason.as_deref(), Some("rider called"));
    assert_ne!(stored.payment_status.as_deref(), Some("paid"));
}

#[tokio::test]
async fn test_unpriced_trip_is_approved_without_charge() {
    let recorder = Arc::new(RecordingGateway::default());
    let gateway: Arc<dyn PaymentGateway> = recorder.clone();
    let t = setup_with_gateway(move |_| gateway).await;
    let id = insert_trip(&t.db, Some(t.client_id), "pending", Some("pm_1")).await;
    set_price(&t.db, id, None).await;

    let (code, body) = act(&t, id, "approve", None).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["trip"]["status"], "upcoming");
    assert!(body["payment"].is_null());
    assert!(recorder.amounts.lock().unwrap().is_empty());

    // A priced trip charges its price
    let priced = insert_trip(&t.db, Some(t.client_id), "pending", Some("pm_1")).await;
    let (code, body) = act(&t, priced, "approve", None).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["trip"]["status"], "paid_in_progress");
    assert_eq!(*recorder.amounts.lock().unwrap(), vec![45.0]);
}

#[tokio::test]
async fn test_update_trip_price_rules() {
    let t = setup().await;
    let pending = insert_trip(&t.db, Some(t.client_id), "pending", Some("pm_1")).await;
    let uri = format!("/api/trips/{}", pending);

    let (code, _) = put(&t.app, &t.token, &uri, json!({ "price": -5.0 })).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert_eq!(stored_trip(&t.db, pending).await.price, Some(45.0));

    let (code, body) = put(&t.app, &t.token, &uri, json!({ "price": 50.0 })).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["trip"]["price"], 50.0);

    // Once a charge is attempted the amount is fixed; other fields stay editable
    let charging = insert_trip(&t.db, Some(t.client_id), "approved_pending_payment", Some("pm_1")).await;
    let uri = format!("/api/trips/{}", charging);
    let (code, _) = put(&t.app, &t.token, &uri, json!({ "price": 99.0 })).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    let (code, _) = put(&t.app, &t.token, &uri, json!({ "notes": "Gate code 1234" })).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(stored_trip(&t.db, charging).await.price, Some(45.0));
}

#[tokio::test]
async fn test_malformed_action_body_is_a_json_400() {
    let t = setup().await;

    let (code, body) = post(&t.app, &t.token, "/api/trips/actions", json!({ "action": "approve" })).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("trip_id"));
}
