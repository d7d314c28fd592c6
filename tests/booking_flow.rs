use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use ulid::Ulid;

use atelier::engine::Engine;
use atelier::http::{AppState, router};
use atelier::mailer::NullMailer;

const ADMIN_TOKEN: &str = "test-admin-token";

// ── Test infrastructure ──────────────────────────────────────

fn test_data_dir() -> PathBuf {
    let dir = std::env::temp_dir()
        .join("atelier_int_test")
        .join(Ulid::new().to_string());
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn test_app() -> Router {
    let engine = Engine::open(&test_data_dir(), Arc::new(NullMailer), None).unwrap();
    router(AppState {
        engine: Arc::new(engine),
        admin_token: Arc::new(ADMIN_TOKEN.to_string()),
    })
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_admin(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}"))
        .body(Body::empty())
        .unwrap()
}

fn send_json(method: &str, uri: &str, body: &Value, admin: bool) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if admin {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn submission(date: &str, start: Option<&str>) -> Value {
    let mut body = json!({
        "lastName": "Doe",
        "firstName": "Jane",
        "email": "jane@example.com",
        "serviceType": "Portrait",
        "date": date,
        "location": "Studio",
    });
    if let Some(start) = start {
        body["startTime"] = json!(start);
    }
    body
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_ok() {
    let app = test_app();
    let response = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn booking_lifecycle_over_http() {
    let app = test_app();

    // Public submission on a Saturday.
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/bookings",
            &submission("2026-01-17", Some("10:00")),
            false,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["status"], "pending");
    let id = created["id"].as_str().unwrap().to_string();

    // The admin list needs a token.
    let response = app.clone().oneshot(get("/api/bookings")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.clone().oneshot(get_admin("/api/bookings")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = body_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    // Overlapping submission is refused with the conflicting window named.
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/bookings",
            &submission("2026-01-17", Some("12:00")),
            false,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let conflict = body_json(response).await;
    assert!(
        conflict["error"]
            .as_str()
            .unwrap()
            .contains("from 10:00 to 13:00")
    );

    // A slot starting exactly at the previous end is fine.
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/bookings",
            &submission("2026-01-17", Some("13:00")),
            false,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Admin confirms the first booking.
    let response = app
        .clone()
        .oneshot(send_json(
            "PATCH",
            &format!("/api/bookings/{id}"),
            &json!({ "status": "confirmed" }),
            true,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["booking"]["status"], "confirmed");

    // Both active windows show up for the public time picker.
    let response = app
        .clone()
        .oneshot(get("/api/bookings/booked-times?date=2026-01-17"))
        .await
        .unwrap();
    let slots = body_json(response).await;
    assert_eq!(slots.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn availability_endpoints() {
    let app = test_app();

    // Monday is refused by default.
    let response = app
        .clone()
        .oneshot(get("/api/availability/check?date=2026-01-19"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let monday = body_json(response).await;
    assert_eq!(monday["available"], false);
    assert!(monday["reason"].as_str().unwrap().contains("weekends"));

    // Override updates need the admin token.
    let block = json!({ "action": "block", "date": "2026-01-17" });
    let response = app
        .clone()
        .oneshot(send_json("POST", "/api/availability/update", &block, false))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(send_json("POST", "/api/availability/update", &block, true))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The Saturday is now blocked, and the public list shows it.
    let response = app
        .clone()
        .oneshot(get("/api/availability/check?date=2026-01-17"))
        .await
        .unwrap();
    let saturday = body_json(response).await;
    assert_eq!(saturday["available"], false);
    assert!(saturday["reason"].as_str().unwrap().contains("blocked"));

    let response = app
        .clone()
        .oneshot(get("/api/availability/public"))
        .await
        .unwrap();
    let overrides = body_json(response).await;
    assert_eq!(overrides["blocked"][0], "2026-01-17");
}

#[tokio::test]
async fn slot_check_rejects_late_start() {
    let app = test_app();
    let response = app
        .oneshot(send_json(
            "POST",
            "/api/bookings/check-time",
            &json!({ "date": "2026-01-17", "startTime": "18:00" }),
            false,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["available"], false);
    assert!(body["reason"].as_str().unwrap().contains("17:00"));
}

#[tokio::test]
async fn unknown_gallery_code_is_not_found() {
    let app = test_app();
    let response = app
        .oneshot(get("/api/gallery/verify?code=NOPE1234"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn testimonial_moderation_flow() {
    let app = test_app();

    // Admin issues a verification code for the client.
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/testimonials/codes",
            &json!({ "email": "jane@example.com", "code": "abcd1234", "action": "add" }),
            true,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // The client-side check accepts any casing.
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/testimonials/verify",
            &json!({ "email": "Jane@Example.com", "code": "ABCD1234" }),
            false,
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["valid"], true);

    // Client submission with the code lands unapproved.
    let testimonial = json!({
        "testimonial": {
            "name": "Jane",
            "quote": "Wonderful session.",
            "email": "jane@example.com",
        },
        "verificationCode": "abcd1234",
    });
    let response = app
        .clone()
        .oneshot(send_json("POST", "/api/testimonials", &testimonial, false))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["approved"], false);
    let id = created["id"].as_str().unwrap().to_string();

    // Invisible publicly until approved.
    let response = app.clone().oneshot(get("/api/testimonials")).await.unwrap();
    assert!(body_json(response).await.as_array().unwrap().is_empty());

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            &format!("/api/testimonials/{id}/approve"),
            &json!({}),
            true,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(get("/api/testimonials")).await.unwrap();
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);
}
