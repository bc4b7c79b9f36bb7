pub mod info;
pub mod music;
pub mod sessions;
pub mod settings;
pub mod speech;

use axum::{
    Json,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::{
    player::{PendingLoad, TrackInfo},
    transport::{ApiResult, WithPath},
};

/// `?value=` of the toggle endpoints. A missing value flips the setting.
#[derive(Debug, Default, Deserialize)]
pub struct ToggleQuery {
    pub value: Option<bool>,
}

/// `?wait=true` holds the response until a started load has finished.
#[derive(Debug, Default, Deserialize)]
pub struct WaitQuery {
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Serialize)]
struct AcceptedBody {
    status: &'static str,
}

/// Reply to a command that starts a load.
#[derive(Debug)]
pub enum LoadResponse {
    /// 202: the load keeps running after the response.
    Accepted,
    /// 201: the load finished and the track is queued.
    Queued(TrackInfo),
}

impl IntoResponse for LoadResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Accepted => {
                (StatusCode::ACCEPTED, Json(AcceptedBody { status: "loading" })).into_response()
            }
            Self::Queued(track) => (StatusCode::CREATED, Json(track)).into_response(),
        }
    }
}

/// Answers right away unless the caller asked to wait for the load.
pub(crate) async fn reply_to_load(
    pending: PendingLoad,
    wait: bool,
    uri: &Uri,
) -> ApiResult<LoadResponse> {
    if !wait {
        return Ok(LoadResponse::Accepted);
    }
    pending.outcome().await.map(LoadResponse::Queued).at(uri)
}
