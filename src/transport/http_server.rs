use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    server::AppState,
    transport::{
        middleware::{require_password, stamp_responses},
        routes::{info, music, sessions, settings, speech},
    },
};

const API_V1: &str = "/v1";

pub fn router(state: Arc<AppState>) -> Router {
    let v1_routes = Router::new()
        .route("/info", get(info::get_info))
        .route("/voices", get(info::get_voices))
        .route("/sessions", get(sessions::list_sessions))
        .route(
            "/sessions/{guild_id}",
            get(sessions::get_session)
                .post(sessions::connect)
                .delete(sessions::disconnect),
        )
        .route("/sessions/{guild_id}/music", get(music::get_queue))
        .route(
            "/sessions/{guild_id}/music/tracks",
            post(music::play).delete(music::clear),
        )
        .route(
            "/sessions/{guild_id}/music/tracks/{position}",
            delete(music::remove),
        )
        .route("/sessions/{guild_id}/music/skip", post(music::skip))
        .route("/sessions/{guild_id}/music/pause", post(music::pause))
        .route("/sessions/{guild_id}/music/resume", post(music::resume))
        .route("/sessions/{guild_id}/music/loop", post(music::toggle_loop))
        .route("/sessions/{guild_id}/music/volume", put(music::set_volume))
        .route("/sessions/{guild_id}/music/position", put(music::seek))
        .route(
            "/sessions/{guild_id}/speech",
            get(speech::get_queue)
                .post(speech::speak)
                .delete(speech::stop),
        )
        .route(
            "/sessions/{guild_id}/speech/messages",
            post(speech::relay_message),
        )
        .route("/sessions/{guild_id}/speech/skip", post(speech::skip))
        .route(
            "/guilds/{guild_id}/settings",
            get(settings::get_guild).patch(settings::update_guild),
        )
        .route("/guilds/{guild_id}/music/toggle", post(settings::toggle_music))
        .route("/guilds/{guild_id}/tts/toggle", post(settings::toggle_guild_tts))
        .route("/guilds/{guild_id}/links", get(settings::list_links))
        .route(
            "/guilds/{guild_id}/links/{text_channel_id}",
            put(settings::link).delete(settings::unlink),
        )
        .route(
            "/members/{user_id}/settings",
            get(settings::get_member).patch(settings::update_member),
        )
        .route("/members/{user_id}/tts/toggle", post(settings::toggle_member_tts));

    Router::new()
        .nest(API_V1, v1_routes)
        .layer(middleware::from_fn_with_state(state.clone(), require_password))
        .route("/health", get(info::health))
        .layer(middleware::from_fn(stamp_responses))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
