use std::{sync::Arc, time::Instant};

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::{common::errors::ErrorResponse, server::AppState};

pub const API_VERSION_HEADER: &str = "Voxline-Api-Version";
pub const RESPONSE_TIME_HEADER: &str = "Voxline-Response-Time";

/// Outcome of comparing the `Authorization` header with the server password.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthCheck {
    Granted,
    Missing,
    Wrong,
}

pub fn authorize(headers: &HeaderMap, password: &str) -> AuthCheck {
    match headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        None => AuthCheck::Missing,
        Some(given) if given == password => AuthCheck::Granted,
        Some(_) => AuthCheck::Wrong,
    }
}

/// Rejects `/v1` requests that do not carry the configured password.
pub async fn require_password(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let reason = match authorize(req.headers(), &state.config.server.password) {
        AuthCheck::Granted => return next.run(req).await,
        AuthCheck::Missing => "missing Authorization header",
        AuthCheck::Wrong => "invalid password",
    };

    let path = req.uri().path().to_string();
    warn!("{} rejected: {}", path, reason);
    let status = StatusCode::UNAUTHORIZED;
    let body = ErrorResponse::new(status.as_u16(), "Unauthorized", reason, path);
    (status, Json(body)).into_response()
}

/// Tags every response with the API version and the handling time in ms.
pub async fn stamp_responses(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(API_VERSION_HEADER, HeaderValue::from_static("1"));
    if let Ok(elapsed) = HeaderValue::from_str(&started.elapsed().as_millis().to_string()) {
        headers.insert(RESPONSE_TIME_HEADER, elapsed);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(auth: Option<&'static str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = auth {
            headers.insert("authorization", HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn authorization_is_an_exact_match() {
        assert_eq!(authorize(&headers(Some("hunter2")), "hunter2"), AuthCheck::Granted);
        assert_eq!(authorize(&headers(Some("Hunter2")), "hunter2"), AuthCheck::Wrong);
        assert_eq!(authorize(&headers(Some("Bearer hunter2")), "hunter2"), AuthCheck::Wrong);
        assert_eq!(authorize(&headers(None), "hunter2"), AuthCheck::Missing);
    }
}
