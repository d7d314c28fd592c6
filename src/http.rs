use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::AdminAuth;
use crate::engine::{Engine, EngineError, TestimonialSubmitter};
use crate::model::*;

/// Shared state for all handlers. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub admin_token: Arc<String>,
}

#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    Unauthorized,
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, body) = match &self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                json!({ "error": "admin token required" }),
            ),
            ApiError::Engine(e) => match e {
                EngineError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", json!({ "error": msg }))
                }
                EngineError::Conflict(msg) => {
                    (StatusCode::CONFLICT, "CONFLICT", json!({ "error": msg }))
                }
                EngineError::NotFound(what) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    json!({ "error": format!("{what} not found") }),
                ),
                EngineError::Expired { expires_at } => (
                    StatusCode::FORBIDDEN,
                    "GALLERY_EXPIRED",
                    json!({
                        "error": "this gallery has expired",
                        "expired": true,
                        "expiresAt": expires_at,
                    }),
                ),
                EngineError::Email(msg) => {
                    (StatusCode::BAD_GATEWAY, "EMAIL_FAILED", json!({ "error": msg }))
                }
                EngineError::Unavailable(msg) => {
                    tracing::error!(error = %msg, "store unavailable");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "UNAVAILABLE",
                        json!({ "error": "temporarily unavailable" }),
                    )
                }
            },
        };

        let mut body = body;
        body["code"] = json!(code);
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/availability/check", get(check_date))
        .route("/api/availability/public", get(public_overrides))
        .route("/api/availability/list", get(list_overrides))
        .route("/api/availability/update", post(update_overrides))
        .route("/api/bookings", post(create_booking).get(list_bookings))
        .route("/api/bookings/check-time", post(check_slot))
        .route("/api/bookings/booked-times", get(booked_times))
        .route("/api/bookings/{id}", patch(update_booking).delete(delete_booking))
        .route("/api/bookings/{id}/gallery-email", post(dispatch_gallery_email))
        .route("/api/gallery/verify", get(verify_gallery))
        .route("/api/testimonials", get(public_testimonials).post(add_testimonial))
        .route("/api/testimonials/all", get(all_testimonials))
        .route("/api/testimonials/verify", post(verify_testimonial_code))
        .route("/api/testimonials/codes", get(list_codes).post(update_codes))
        .route("/api/testimonials/{id}/approve", post(approve_testimonial))
        .route("/api/testimonials/{id}", delete(delete_testimonial))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health ───────────────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", version: env!("CARGO_PKG_VERSION") })
}

// ── Availability ─────────────────────────────────────────────

#[derive(Deserialize)]
struct DateQuery {
    date: String,
}

async fn check_date(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<Availability>> {
    Ok(Json(state.engine.check_date(&query.date).await?))
}

async fn public_overrides(State(state): State<AppState>) -> Json<Overrides> {
    Json(state.engine.overrides().await)
}

async fn list_overrides(_auth: AdminAuth, State(state): State<AppState>) -> Json<Overrides> {
    Json(state.engine.overrides().await)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OverrideRequest {
    action: OverrideAction,
    date: Option<String>,
    #[serde(default)]
    dates: Vec<String>,
}

async fn update_overrides(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Json(req): Json<OverrideRequest>,
) -> ApiResult<Json<Overrides>> {
    let mut raw = req.dates;
    if let Some(date) = req.date {
        raw.push(date);
    }
    let mut dates = Vec::with_capacity(raw.len());
    for s in &raw {
        let parsed: NaiveDate = s.trim().parse().map_err(|_| {
            EngineError::Validation(format!("invalid date {s:?}, expected YYYY-MM-DD"))
        })?;
        dates.push(parsed);
    }
    Ok(Json(state.engine.apply_override(req.action, dates).await?))
}

// ── Bookings ─────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckSlotRequest {
    date: String,
    start_time: String,
    duration_hours: Option<u32>,
}

async fn check_slot(
    State(state): State<AppState>,
    Json(req): Json<CheckSlotRequest>,
) -> ApiResult<Json<Availability>> {
    let result = state
        .engine
        .check_slot(&req.date, &req.start_time, req.duration_hours)
        .await?;
    Ok(Json(result))
}

async fn booked_times(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<Vec<BookedSlot>>> {
    Ok(Json(state.engine.booked_times(&query.date).await?))
}

async fn create_booking(
    State(state): State<AppState>,
    Json(new): Json<NewBooking>,
) -> ApiResult<(StatusCode, Json<Booking>)> {
    let booking = state.engine.create_booking(new).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn list_bookings(_auth: AdminAuth, State(state): State<AppState>) -> Json<Vec<Booking>> {
    Json(state.engine.list_bookings().await)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBookingResponse {
    booking: Booking,
    /// Present when a best-effort side effect (confirmation email) failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

async fn update_booking(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<BookingPatch>,
) -> ApiResult<Json<UpdateBookingResponse>> {
    let (booking, warning) = state.engine.update_booking(&id, patch).await?;
    Ok(Json(UpdateBookingResponse { booking, warning }))
}

async fn delete_booking(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.engine.remove_booking(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GalleryEmailRequest {
    gallery_url: String,
}

async fn dispatch_gallery_email(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<GalleryEmailRequest>,
) -> ApiResult<Json<GalleryDispatch>> {
    let dispatch = state
        .engine
        .dispatch_gallery_email(&id, &req.gallery_url)
        .await?;
    Ok(Json(dispatch))
}

// ── Client gallery ───────────────────────────────────────────

#[derive(Deserialize)]
struct CodeQuery {
    code: String,
}

async fn verify_gallery(
    State(state): State<AppState>,
    Query(query): Query<CodeQuery>,
) -> ApiResult<Json<GalleryView>> {
    Ok(Json(state.engine.verify_gallery(&query.code).await?))
}

// ── Testimonials ─────────────────────────────────────────────

async fn public_testimonials(State(state): State<AppState>) -> Json<Vec<Testimonial>> {
    Json(state.engine.list_testimonials(false).await)
}

async fn all_testimonials(
    _auth: AdminAuth,
    State(state): State<AppState>,
) -> Json<Vec<Testimonial>> {
    Json(state.engine.list_testimonials(true).await)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddTestimonialRequest {
    testimonial: NewTestimonial,
    verification_code: Option<String>,
}

fn is_admin(headers: &HeaderMap, state: &AppState) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == state.admin_token.as_str())
}

async fn add_testimonial(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AddTestimonialRequest>,
) -> ApiResult<(StatusCode, Json<Testimonial>)> {
    let submitter = if is_admin(&headers, &state) {
        TestimonialSubmitter::Admin
    } else {
        let verification_code = req.verification_code.ok_or_else(|| {
            EngineError::Validation("verificationCode is required".into())
        })?;
        TestimonialSubmitter::Client { verification_code }
    };
    let testimonial = state.engine.add_testimonial(req.testimonial, submitter).await?;
    Ok((StatusCode::CREATED, Json(testimonial)))
}

async fn approve_testimonial(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Testimonial>> {
    Ok(Json(state.engine.approve_testimonial(&id).await?))
}

async fn delete_testimonial(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.engine.remove_testimonial(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum CodeAction {
    Add,
    Remove,
}

#[derive(Deserialize)]
struct CodesRequest {
    email: String,
    code: Option<String>,
    action: CodeAction,
}

async fn list_codes(
    _auth: AdminAuth,
    State(state): State<AppState>,
) -> Json<std::collections::BTreeMap<String, String>> {
    Json(state.engine.verification_codes().await)
}

async fn update_codes(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Json(req): Json<CodesRequest>,
) -> ApiResult<StatusCode> {
    match req.action {
        CodeAction::Add => {
            let code = req
                .code
                .ok_or_else(|| EngineError::Validation("code is required".into()))?;
            state.engine.set_verification_code(&req.email, &code).await?;
        }
        CodeAction::Remove => {
            state.engine.remove_verification_code(&req.email).await?;
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct VerifyCodeRequest {
    email: String,
    code: String,
}

async fn verify_testimonial_code(
    State(state): State<AppState>,
    Json(req): Json<VerifyCodeRequest>,
) -> Json<serde_json::Value> {
    let valid = state
        .engine
        .verify_testimonial_code(&req.email, &req.code)
        .await;
    Json(json!({ "valid": valid }))
}
