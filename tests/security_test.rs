use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use dispatch_admin::auth::{create_jwt, hash_password};
use dispatch_admin::config::Config;
use dispatch_admin::infrastructure::AppState;
use dispatch_admin::{db, server};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde_json::Value;
use tower::util::ServiceExt; // for `oneshot`

const SECRET: &str = "test-secret";

async fn setup() -> (Router, DatabaseConnection) {
    let db = db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB");
    let state = AppState::new(db.clone(), Config::for_tests());
    (server::build_router(state), db)
}

async fn create_profile(db: &DatabaseConnection, email: &str, role: &str, status: &str) -> i32 {
    let now = chrono::Utc::now().to_rfc3339();
    let profile = dispatch_admin::models::profile::ActiveModel {
        email: Set(email.to_string()),
        password_hash: Set(hash_password("password123").unwrap()),
        first_name: Set("Test".to_string()),
        last_name: Set(role.to_string()),
        role: Set(role.to_string()),
        status: Set(status.to_string()),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    profile.insert(db).await.expect("Failed to create profile").id
}

fn token_for(id: i32, role: &str) -> String {
    create_jwt(SECRET, id, role).expect("Failed to create token")
}

fn request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = if method == "GET" {
        Body::empty()
    } else {
        Body::from("{}")
    };
    builder.body(body).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

const DISPATCHER_ENDPOINTS: &[(&str, &str)] = &[
    ("GET", "/api/trips"),
    ("POST", "/api/trips"),
    ("GET", "/api/trips/1"),
    ("PUT", "/api/trips/1"),
    ("DELETE", "/api/trips/1"),
    ("POST", "/api/trips/actions"),
    ("POST", "/api/trips/1/approve"),
    ("POST", "/api/trips/1/reject"),
    ("POST", "/api/trips/1/complete"),
    ("POST", "/api/trips/1/assign-driver"),
    ("GET", "/api/drivers"),
    ("POST", "/api/drivers"),
    ("DELETE", "/api/drivers/1"),
    ("GET", "/api/clients"),
    ("GET", "/api/managed-clients"),
    ("GET", "/api/facilities"),
    ("POST", "/api/facilities"),
    ("GET", "/api/invoices"),
    ("POST", "/api/invoices/generate"),
    ("GET", "/api/invoices/export"),
    ("POST", "/api/invoices/mark-overdue"),
    ("POST", "/api/invoices/1/verify-payment"),
    ("GET", "/api/payment-verification"),
    ("GET", "/api/dashboard/stats"),
];

const SESSION_ENDPOINTS: &[(&str, &str)] = &[
    ("GET", "/api/auth/me"),
    ("GET", "/api/notifications"),
    ("POST", "/api/notifications/read-all"),
    ("POST", "/api/push-tokens"),
    ("GET", "/api/messages/conversations"),
    ("POST", "/api/invoices/1/claim-payment"),
];

#[tokio::test]
async fn test_missing_session_is_unauthorized_everywhere() {
    let (app, _db) = setup().await;

    for (method, uri) in DISPATCHER_ENDPOINTS.iter().chain(SESSION_ENDPOINTS) {
        let response = app.clone().oneshot(request(method, uri, None)).await.unwrap();
        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "{} {} should require a session",
            method,
            uri
        );
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_invalid_tokens_are_unauthorized() {
    let (app, db) = setup().await;
    let dispatcher = create_profile(&db, "d@example.com", "dispatcher", "active").await;

    let forged = create_jwt("some-other-secret", dispatcher, "dispatcher").unwrap();
    for token in ["garbage", forged.as_str()] {
        let response = app
            .clone()
            .oneshot(request("GET", "/api/trips", Some(token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // Wrong scheme
    let req = Request::builder()
        .uri("/api/trips")
        .header(header::AUTHORIZATION, format!("Token {}", token_for(dispatcher, "dispatcher")))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_for_deleted_or_inactive_profile_is_unauthorized() {
    let (app, db) = setup().await;
    let inactive = create_profile(&db, "gone@example.com", "dispatcher", "inactive").await;
    let response = app
        .clone()
        .oneshot(request("GET", "/api/trips", Some(&token_for(inactive, "dispatcher"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let removed = create_profile(&db, "removed@example.com", "dispatcher", "active").await;
    dispatch_admin::models::profile::Entity::delete_by_id(removed)
        .exec(&db)
        .await
        .unwrap();
    let response = app
        .oneshot(request("GET", "/api/trips", Some(&token_for(removed, "dispatcher"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_dispatcher_roles_are_forbidden() {
    let (app, db) = setup().await;

    for role in ["driver", "client", "facility"] {
        let id = create_profile(&db, &format!("{}@example.com", role), role, "active").await;
        let token = token_for(id, role);

        for (method, uri) in DISPATCHER_ENDPOINTS {
            let response = app
                .clone()
                .oneshot(request(method, uri, Some(&token)))
                .await
                .unwrap();
            assert_eq!(
                response.status(),
                StatusCode::FORBIDDEN,
                "{} {} should be dispatcher-only (role {})",
                method,
                uri,
                role
            );
        }
    }
}

#[tokio::test]
async fn test_role_comes_from_profile_not_token() {
    let (app, db) = setup().await;
    let driver = create_profile(&db, "driver@example.com", "driver", "active").await;

    // A token claiming dispatcher does not override the stored role
    let response = app
        .oneshot(request("GET", "/api/trips", Some(&token_for(driver, "dispatcher"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_login_flow() {
    let (app, db) = setup().await;
    create_profile(&db, "dispatch@example.com", "dispatcher", "active").await;
    create_profile(&db, "old@example.com", "dispatcher", "inactive").await;

    let login = |email: &str, password: &str| {
        Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({ "email": email, "password": password }).to_string(),
            ))
            .unwrap()
    };

    let response = app
        .clone()
        .oneshot(login("Dispatch@Example.com", "password123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["profile"]["role"], "dispatcher");
    assert!(body["profile"].get("password_hash").is_none());
    let token = body["token"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(request("GET", "/api/auth/me", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["profile"]["email"], "dispatch@example.com");

    let response = app
        .clone()
        .oneshot(login("dispatch@example.com", "wrong"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(login("nobody@example.com", "password123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(login("old@example.com", "password123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _db) = setup().await;
    let response = app
        .oneshot(request("GET", "/api/health", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_bad_input_gets_json_error_body() {
    let (app, db) = setup().await;
    let dispatcher = create_profile(&db, "d@example.com", "dispatcher", "active").await;
    let token = token_for(dispatcher, "dispatcher");

    let send = |method: &str, uri: &str, body: &str| {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from(body.to_string()))
            .unwrap()
    };

    let cases = [
        ("POST", "/api/trips/actions", r#"{"action":"approve"}"#),
        ("POST", "/api/trips", "{not json"),
        ("GET", "/api/trips/abc", ""),
        ("GET", "/api/trips?driver_id=abc", ""),
    ];
    for (method, uri, body) in cases {
        let response = app.clone().oneshot(send(method, uri, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{} {}", method, uri);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());
    }
}
