use axum::{
    Json,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::common::errors::{ErrorResponse, VoiceError};

/// A [`VoiceError`] tagged with the request path it failed on.
#[derive(Debug)]
pub struct ApiError {
    pub error: VoiceError,
    pub path: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Attaches the request path to a failed command.
pub trait WithPath<T> {
    fn at(self, uri: &Uri) -> ApiResult<T>;
}

impl<T> WithPath<T> for Result<T, VoiceError> {
    fn at(self, uri: &Uri) -> ApiResult<T> {
        self.map_err(|error| ApiError {
            error,
            path: uri.path().to_string(),
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.error.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            warn!("{} failed: {}", self.path, self.error);
        } else {
            debug!("{} rejected: {}", self.path, self.error);
        }
        let body = ErrorResponse::new(
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown"),
            self.error.to_string(),
            self.path,
        );
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::GuildId;

    #[test]
    fn errors_carry_status_and_path() {
        let uri: Uri = "/v1/sessions/4?x=1".parse().unwrap();
        let err = Err::<(), _>(VoiceError::NotConnected(GuildId(4)))
            .at(&uri)
            .unwrap_err();
        assert_eq!(err.path, "/v1/sessions/4");

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn persistence_failures_are_server_errors() {
        let uri: Uri = "/v1/guilds/1/settings".parse().unwrap();
        let response = Err::<(), _>(VoiceError::ConfigPersistence("disk full".into()))
            .at(&uri)
            .unwrap_err()
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
