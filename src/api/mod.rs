pub mod auth;
pub mod middleware;
pub mod progress;
pub mod video;

use crate::config::AppConfig;
use crate::notifications::Mailer;
use crate::queue::JobQueue;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use sea_orm::DatabaseConnection;
use serde_json::json;
use std::sync::Arc;

/// Name of the cookie carrying the login token.
pub const TOKEN_COOKIE: &str = "videoflix_token";

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({"error": message.into()}))).into_response()
}

pub(crate) fn internal_error(e: impl std::fmt::Display) -> Response {
    tracing::Span::current().record("error", tracing::field::display(&e));
    error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// The application routes with their shared state. Transport concerns
/// (tracing, CORS, metrics) are layered on by the server binary.
pub fn router(
    db: DatabaseConnection,
    queue: Arc<dyn JobQueue>,
    mailer: Mailer,
    config: Arc<AppConfig>,
) -> Router {
    let auth_routes = Router::new()
        .route("/api/registration", post(auth::register))
        .route("/api/activate/:uid/:token", get(auth::activate))
        .route("/api/login", post(auth::login))
        .route("/api/password-reset", post(auth::request_password_reset))
        .route(
            "/api/reset-password/:uid/:token",
            post(auth::confirm_password_reset),
        );

    let protected_routes = Router::new()
        .route(
            "/api/videos",
            get(video::list_videos).post(video::create_video),
        )
        .route(
            "/api/videos/:id",
            get(video::get_video)
                .patch(video::update_video)
                .delete(video::delete_video),
        )
        .route("/api/videos/:id/reprocess", post(video::reprocess_video))
        .route("/api/videos/:id/stream", get(video::stream_video))
        .route(
            "/api/progress",
            get(progress::list_progress).post(progress::create_progress),
        )
        .route(
            "/api/progress/:id",
            get(progress::get_progress)
                .patch(progress::update_progress)
                .delete(progress::delete_progress),
        )
        .route_layer(axum::middleware::from_fn(middleware::auth_middleware));

    let body_limit = config.max_upload_bytes;

    Router::new()
        .route("/health", get(health_check))
        .merge(auth_routes)
        .merge(protected_routes)
        .layer(Extension(db))
        .layer(Extension(queue))
        .layer(Extension(mailer))
        .layer(Extension(config))
        .layer(tower_cookies::CookieManagerLayer::new())
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

async fn health_check() -> &'static str {
    "OK"
}
