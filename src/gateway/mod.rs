//! HTTP surface of the call gateway.
//!
//! `trigger_call` walks a request through, in order: method check, rate limit,
//! credential format, credential value, phone, business name, upstream call.
//! The first failing step ends the request. A rate-limit slot is spent as soon
//! as a POST is admitted, so failed credential guesses still count.
//!
//! @copyright 2025

pub mod error;

use axum::body::to_bytes;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::credential::CredentialChecker;
use crate::rate_limit::{Decision, RateLimiter};
use crate::validation::{
    mask_phone, normalize_owner_name, validate_business_name, validate_phone, CallRequest,
};
use crate::voice::{CallPlacer, OutboundCall};
pub use error::GatewayError;

/// Request bodies larger than this are rejected as invalid.
const MAX_BODY_BYTES: usize = 16 * 1024;

const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub limiter: RateLimiter,
    pub credentials: CredentialChecker,
    pub placer: Arc<dyn CallPlacer>,
    /// Key callers by `X-Forwarded-For`/`X-Real-IP`. Only safe behind a proxy that overwrites them.
    pub trust_forwarded_headers: bool,
}

#[derive(Debug, Serialize)]
struct CallInitiated {
    success: bool,
    conversation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    call_sid: Option<String>,
    status: &'static str,
    message: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/trigger-call", any(trigger_call))
        .route("/api/trigger-call", any(trigger_call))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

pub async fn trigger_call(State(state): State<AppState>, request: Request) -> Response {
    let client = client_key(
        request.headers(),
        request.extensions().get::<ConnectInfo<SocketAddr>>(),
        state.trust_forwarded_headers,
    );
    let span = info_span!("trigger_call", request_id = %Uuid::new_v4(), client = %client);

    // error rendering logs, so it has to run inside the span too
    let response = async {
        match handle(&state, &client, request).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        }
    }
    .instrument(span)
    .await;
    with_cors(response)
}

async fn handle(state: &AppState, client: &str, request: Request) -> Result<Response, GatewayError> {
    match *request.method() {
        Method::OPTIONS => return Ok(StatusCode::OK.into_response()),
        Method::POST => {}
        _ => return Err(GatewayError::MethodNotAllowed),
    }

    let decision = state.limiter.check_rate_limit(client).await;
    if !decision.allowed {
        return Err(GatewayError::RateLimited {
            retry_after_secs: decision.retry_after_secs,
        });
    }

    let body = to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|_| GatewayError::InvalidBody)?;
    let req: CallRequest = if body.is_empty() {
        CallRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|_| GatewayError::InvalidBody)?
    };

    let token = req.credential()?;
    state.credentials.check(token)?;
    let phone = validate_phone(req.phone_number())?;
    let business_name = validate_business_name(req.business_name())?;
    let owner_name = normalize_owner_name(req.owner_name());

    info!(to = %mask_phone(phone), business = %business_name, "Placing demo call");

    let placed = state
        .placer
        .place_call(OutboundCall {
            to_number: phone.to_string(),
            business_name: business_name.to_string(),
            owner_name: owner_name.map(str::to_string),
        })
        .await?;

    let body = CallInitiated {
        success: true,
        conversation_id: placed.conversation_id,
        call_sid: placed.call_sid,
        status: "initiated",
        message: format!("Demo call initiated to {}", business_name),
    };
    let mut response = Json(body).into_response();
    insert_rate_limit_headers(response.headers_mut(), state.limiter.config().max_requests, decision);
    Ok(response)
}

/// Socket peer address. When `trust_forwarded` is set, the first hop of
/// `X-Forwarded-For` and then `X-Real-IP` take precedence.
fn client_key(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>, trust_forwarded: bool) -> String {
    let peer = peer.map(|ConnectInfo(addr)| addr.ip().to_string());
    if !trust_forwarded {
        return peer.unwrap_or_else(|| "unknown".to_string());
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or(real_ip)
        .map(str::to_string)
        .or(peer)
        .unwrap_or_else(|| "unknown".to_string())
}

fn insert_rate_limit_headers(headers: &mut HeaderMap, limit: u32, decision: Decision) {
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));
}

fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}
