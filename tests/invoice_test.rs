use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use dispatch_admin::auth::create_jwt;
use dispatch_admin::config::Config;
use dispatch_admin::infrastructure::AppState;
use dispatch_admin::models::{facility, invoice, profile, trip};
use dispatch_admin::services::invoice_service;
use dispatch_admin::{db, server};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde_json::{Value, json};
use tower::util::ServiceExt; // for `oneshot`

struct TestApp {
    app: Router,
    db: DatabaseConnection,
    token: String,
    facility_id: i32,
}

async fn setup() -> TestApp {
    let db = db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB");
    let dispatcher = create_profile(&db, "dispatch@example.com", "dispatcher", None).await;
    let token = create_jwt("test-secret", dispatcher, "dispatcher").unwrap();

    let now = chrono::Utc::now().to_rfc3339();
    let facility_id = facility::ActiveModel {
        name: Set("Willow Care".to_string()),
        is_active: Set(true),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&db)
    .await
    .unwrap()
    .id;

    let state = AppState::new(db.clone(), Config::for_tests());
    TestApp {
        app: server::build_router(state),
        db,
        token,
        facility_id,
    }
}

async fn create_profile(
    db: &DatabaseConnection,
    email: &str,
    role: &str,
    facility_id: Option<i32>,
) -> i32 {
    let now = chrono::Utc::now().to_rfc3339();
    profile::ActiveModel {
        email: Set(email.to_string()),
        password_hash: Set("unused".to_string()),
        first_name: Set("Test".to_string()),
        last_name: Set(role.to_string()),
        role: Set(role.to_string()),
        status: Set("active".to_string()),
        facility_id: Set(facility_id),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
    .id
}

async fn facility_trip(db: &DatabaseConnection, facility_id: i32, pickup: &str, status: &str, price: f64) -> i32 {
    let now = chrono::Utc::now().to_rfc3339();
    trip::ActiveModel {
        facility_id: Set(Some(facility_id)),
        pickup_address: Set("Willow Care".to_string()),
        destination_address: Set("Clinic".to_string()),
        pickup_time: Set(pickup.to_string()),
        is_round_trip: Set(false),
        additional_passengers: Set(0),
        price: Set(Some(price)),
        status: Set(status.to_string()),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
    .id
}

async fn call(app: &Router, token: &str, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn march(facility_id: i32) -> Value {
    json!({
        "facility_id": facility_id,
        "period_start": "2026-03-01",
        "period_end": "2026-03-31"
    })
}

#[tokio::test]
async fn test_generate_bills_completed_trips_once() {
    let t = setup().await;
    let a = facility_trip(&t.db, t.facility_id, "2026-03-01T08:00:00Z", "completed", 50.0).await;
    let b = facility_trip(&t.db, t.facility_id, "2026-03-31T17:30:00Z", "completed", 25.5).await;
    // Not billable: open, cancelled, outside the period
    facility_trip(&t.db, t.facility_id, "2026-03-10T08:00:00Z", "upcoming", 99.0).await;
    facility_trip(&t.db, t.facility_id, "2026-03-11T08:00:00Z", "cancelled", 99.0).await;
    facility_trip(&t.db, t.facility_id, "2026-04-01T08:00:00Z", "completed", 99.0).await;

    let (code, body) = call(&t.app, &t.token, "POST", "/api/invoices/generate", Some(march(t.facility_id))).await;
    assert_eq!(code, StatusCode::CREATED);
    let inv = &body["invoice"];
    assert_eq!(inv["amount"], 75.5);
    assert_eq!(inv["status"], "pending");
    assert_eq!(inv["period_start"], "2026-03-01");
    let number = inv["invoice_number"].as_str().unwrap();
    assert!(number.starts_with("INV-"));
    assert_eq!(number.len(), "INV-YYYYMM-".len() + 8);

    let id = inv["id"].as_i64().unwrap();
    let (code, body) = call(&t.app, &t.token, "GET", &format!("/api/invoices/{}", id), None).await;
    assert_eq!(code, StatusCode::OK);
    let trip_ids: Vec<i64> = body["invoice"]["trips"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_i64().unwrap())
        .collect();
    assert_eq!(trip_ids, vec![a as i64, b as i64]);
    assert_eq!(body["invoice"]["facility_name"], "Willow Care");

    // Same period again: everything already billed
    let (code, body) = call(&t.app, &t.token, "POST", "/api/invoices/generate", Some(march(t.facility_id))).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("No billable trips"));

    // Cancelling the invoice frees its trips
    let (code, _) = call(
        &t.app,
        &t.token,
        "PUT",
        &format!("/api/invoices/{}/status", id),
        Some(json!({ "status": "cancelled" })),
    )
    .await;
    assert_eq!(code, StatusCode::OK);
    let (code, _) = call(&t.app, &t.token, "POST", "/api/invoices/generate", Some(march(t.facility_id))).await;
    assert_eq!(code, StatusCode::CREATED);
}

#[tokio::test]
async fn test_generate_validation() {
    let t = setup().await;

    let (code, _) = call(
        &t.app,
        &t.token,
        "POST",
        "/api/invoices/generate",
        Some(json!({ "facility_id": t.facility_id, "period_start": "2026-03-31", "period_end": "2026-03-01" })),
    )
    .await;
    assert_eq!(code, StatusCode::BAD_REQUEST);

    let (code, _) = call(
        &t.app,
        &t.token,
        "POST",
        "/api/invoices/generate",
        Some(json!({ "facility_id": t.facility_id, "period_start": "March", "period_end": "2026-03-01" })),
    )
    .await;
    assert_eq!(code, StatusCode::BAD_REQUEST);

    let (code, _) = call(&t.app, &t.token, "POST", "/api/invoices/generate", Some(march(4040))).await;
    assert_eq!(code, StatusCode::NOT_FOUND);

    let (code, _) = call(
        &t.app,
        &t.token,
        "PUT",
        "/api/invoices/1/status",
        Some(json!({ "status": "lost" })),
    )
    .await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_payment_claim_and_verification() {
    let t = setup().await;
    facility_trip(&t.db, t.facility_id, "2026-03-03T08:00:00Z", "completed", 40.0).await;
    let (_, body) = call(&t.app, &t.token, "POST", "/api/invoices/generate", Some(march(t.facility_id))).await;
    let id = body["invoice"]["id"].as_i64().unwrap();

    // Nothing claimed yet
    let verify_uri = format!("/api/invoices/{}/verify-payment", id);
    let (code, _) = call(&t.app, &t.token, "POST", &verify_uri, Some(json!({ "approved": true }))).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);

    let staff = create_profile(&t.db, "ap@willow.example", "facility", Some(t.facility_id)).await;
    let staff_token = create_jwt("test-secret", staff, "facility").unwrap();
    let outsider = create_profile(&t.db, "ap@elsewhere.example", "facility", None).await;
    let outsider_token = create_jwt("test-secret", outsider, "facility").unwrap();

    let claim_uri = format!("/api/invoices/{}/claim-payment", id);
    let (code, _) = call(
        &t.app,
        &outsider_token,
        "POST",
        &claim_uri,
        Some(json!({ "payment_reference": "CHK-1" })),
    )
    .await;
    assert_eq!(code, StatusCode::NOT_FOUND);

    let (code, body) = call(
        &t.app,
        &staff_token,
        "POST",
        &claim_uri,
        Some(json!({ "payment_reference": "CHK-2291" })),
    )
    .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["invoice"]["payment_reference"], "CHK-2291");

    let (_, body) = call(&t.app, &t.token, "GET", "/api/payment-verification", None).await;
    assert_eq!(body["total"], 1);
    let (_, body) = call(&t.app, &t.token, "GET", "/api/dashboard/stats", None).await;
    assert_eq!(body["stats"]["payments_awaiting_verification"], 1);

    // A cancelled invoice leaves the queue and the dashboard count together
    let status_uri = format!("/api/invoices/{}/status", id);
    for (status, expected) in [("cancelled", 0), ("pending", 1)] {
        let (code, _) = call(&t.app, &t.token, "PUT", &status_uri, Some(json!({ "status": status }))).await;
        assert_eq!(code, StatusCode::OK);
        let (_, body) = call(&t.app, &t.token, "GET", "/api/payment-verification", None).await;
        assert_eq!(body["total"], expected);
        let (_, body) = call(&t.app, &t.token, "GET", "/api/dashboard/stats", None).await;
        assert_eq!(body["stats"]["payments_awaiting_verification"], expected);
    }

    // Rejected claim goes back to pending with the claim cleared
    let (code, body) = call(
        &t.app,
        &t.token,
        "POST",
        &verify_uri,
        Some(json!({ "approved": false, "notes": "No such cheque" })),
    )
    .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["invoice"]["status"], "pending");
    assert!(body["invoice"]["payment_claimed_at"].is_null());
    assert_eq!(body["invoice"]["verification_notes"], "No such cheque");

    call(
        &t.app,
        &staff_token,
        "POST",
        &claim_uri,
        Some(json!({ "payment_reference": "ACH-5531" })),
    )
    .await;
    let (code, body) = call(&t.app, &t.token, "POST", &verify_uri, Some(json!({ "approved": true }))).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["invoice"]["status"], "paid");
    assert!(body["invoice"]["payment_verified_at"].is_string());
    assert!(body["invoice"]["verified_by"].is_number());

    let (_, body) = call(&t.app, &t.token, "GET", "/api/payment-verification", None).await;
    assert_eq!(body["total"], 0);

    // Paid invoices stay
    let (code, _) = call(&t.app, &t.token, "DELETE", &format!("/api/invoices/{}", id), None).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_manual_invoice_and_csv_export() {
    let t = setup().await;
    let client = create_profile(&t.db, "rider@example.com", "client", None).await;

    let (code, _) = call(
        &t.app,
        &t.token,
        "POST",
        "/api/invoices",
        Some(json!({ "user_id": client, "amount": 0 })),
    )
    .await;
    assert_eq!(code, StatusCode::BAD_REQUEST);

    let (code, body) = call(
        &t.app,
        &t.token,
        "POST",
        "/api/invoices",
        Some(json!({ "user_id": client, "amount": 62.25, "due_date": "2026-07-01", "notes": "Missed card charge" })),
    )
    .await;
    assert_eq!(code, StatusCode::CREATED);
    assert_eq!(body["invoice"]["due_date"], "2026-07-01");

    let req = Request::builder()
        .uri("/api/invoices/export?status=pending")
        .header(header::AUTHORIZATION, format!("Bearer {}", t.token))
        .body(Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/csv")
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("invoice_number,billed_to,amount"));
    assert!(lines[1].contains(",Test client,62.25,pending,"));
}

#[tokio::test]
async fn test_mark_overdue() {
    let t = setup().await;
    let now = chrono::Utc::now().to_rfc3339();
    for (number, due, status) in [
        ("INV-202601-00000001", "2026-01-31", "pending"),
        ("INV-202601-00000002", "2026-01-31", "paid"),
        ("INV-202601-00000003", "2099-01-31", "pending"),
    ] {
        invoice::ActiveModel {
            invoice_number: Set(number.to_string()),
            facility_id: Set(Some(t.facility_id)),
            amount: Set(10.0),
            status: Set(status.to_string()),
            due_date: Set(due.to_string()),
            trip_ids: Set("[]".to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        }
        .insert(&t.db)
        .await
        .unwrap();
    }

    let today = chrono::NaiveDate::from_ymd_opt(2026, 2, 15).unwrap();
    let updated = invoice_service::mark_overdue(&t.db, today).await.unwrap();
    assert_eq!(updated, 1);

    let statuses: Vec<String> = invoice::Entity::find()
        .all(&t.db)
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.status)
        .collect();
    assert_eq!(statuses, vec!["overdue", "paid", "pending"]);
}
