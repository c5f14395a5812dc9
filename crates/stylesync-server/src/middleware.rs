use std::{collections::HashSet, sync::Arc};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::Instrument;
use uuid::Uuid;

use crate::api::ApiError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
/// Longer caller-supplied ids are replaced rather than echoed into logs.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Request ID stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Bearer tokens accepted on job submission.
#[derive(Debug, Clone)]
pub struct AuthState {
    api_keys: Arc<HashSet<String>>,
    pub enabled: bool,
}

impl AuthState {
    /// Builds auth config from `STYLESYNC_API_KEYS`.
    ///
    /// No keys disables auth in development and fails startup elsewhere:
    /// every job drives the back office with the configured login.
    pub fn new(keys: &[String], is_development: bool) -> anyhow::Result<Self> {
        let keys: HashSet<String> = keys
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(ToOwned::to_owned)
            .collect();

        if keys.is_empty() && !is_development {
            anyhow::bail!(
                "STYLESYNC_API_KEYS is required outside development; \
                 provide comma-separated bearer tokens"
            );
        }
        if keys.is_empty() {
            tracing::warn!("STYLESYNC_API_KEYS not set; job submission is open in development");
        }

        Ok(Self {
            enabled: !keys.is_empty(),
            api_keys: Arc::new(keys),
        })
    }

    fn allows(&self, token: &str) -> bool {
        self.api_keys.contains(token)
    }
}

fn caller_request_id(value: Option<&HeaderValue>) -> Option<String> {
    value
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map(ToOwned::to_owned)
}

/// Adopt the caller's `x-request-id` (or mint a `UUIDv4`), expose it to
/// handlers as [`RequestId`], echo it on the response, and run the request
/// inside a span carrying it so job logs can be traced back to the request.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = caller_request_id(req.headers().get(REQUEST_ID_HEADER))
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut().insert(RequestId(id.clone()));

    let span = tracing::info_span!(
        "request",
        request_id = %id,
        method = %req.method(),
        path = %req.uri().path(),
    );
    let mut res = next.run(req).instrument(span).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert(REQUEST_ID_HEADER, val);
    }
    res
}

/// Reject job submissions without a known bearer token, using the same
/// error envelope as the handlers.
pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    if !auth.enabled {
        return next.run(req).await;
    }

    let rejection = match extract_bearer_token(req.headers().get(AUTHORIZATION)) {
        Some(token) if auth.allows(token) => None,
        Some(_) => Some("unknown bearer token"),
        None => Some("missing bearer token"),
    };
    let Some(message) = rejection else {
        return next.run(req).await;
    };

    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|r| r.0.clone())
        .unwrap_or_default();
    tracing::warn!(%request_id, reason = message, "job submission rejected");
    ApiError::new(request_id, "unauthorized", message).into_response()
}

/// Token of an `Authorization: Bearer <token>` header; the scheme is
/// matched case-insensitively.
fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    let raw = value.and_then(|v| v.to_str().ok())?;
    let (scheme, token) = raw.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}
