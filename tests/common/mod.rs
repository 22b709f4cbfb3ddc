#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use tower::ServiceExt;

use videoflix_server::api;
use videoflix_server::api::auth::{hash_password, new_token};
use videoflix_server::config::AppConfig;
use videoflix_server::entities::video::Category;
use videoflix_server::entities::{auth_token, user, video};
use videoflix_server::migrator::Migrator;
use videoflix_server::notifications::Mailer;
use videoflix_server::queue::{JobQueue, QueueError, TranscodeRequest};

pub const PASSWORD: &str = "secret123";

/// Fresh in-memory SQLite database with every migration applied. A single
/// pooled connection keeps the in-memory database alive for the whole test.
pub async fn test_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options)
        .await
        .expect("in-memory sqlite should open");
    Migrator::up(&db, None)
        .await
        .expect("migrations should apply");
    db
}

/// Queue double that records every enqueued job instead of talking to Redis.
#[derive(Default)]
pub struct FakeQueue {
    pub jobs: Mutex<Vec<TranscodeRequest>>,
}

impl FakeQueue {
    pub fn video_ids(&self) -> Vec<i32> {
        self.jobs.lock().unwrap().iter().map(|j| j.video_id).collect()
    }
}

#[async_trait]
impl JobQueue for FakeQueue {
    async fn enqueue(&self, request: TranscodeRequest) -> Result<(), QueueError> {
        self.jobs.lock().unwrap().push(request);
        Ok(())
    }
}

pub fn test_config(media_root: &Path) -> AppConfig {
    let media_root = media_root.to_string_lossy().into_owned();
    AppConfig::from_lookup(|key| match key {
        "DATABASE_URL" => Some("sqlite::memory:".to_string()),
        "MEDIA_ROOT" => Some(media_root.clone()),
        "MEDIA_BASE_URL" => Some("http://testserver/media".to_string()),
        "FRONTEND_URL" => Some("http://frontend.test".to_string()),
        "BACKEND_URL" => Some("http://backend.test".to_string()),
        _ => None,
    })
    .expect("test config should be valid")
}

/// The application router wired to the given database, a recording queue and
/// a mailer without API key (mails are only logged).
pub fn build_test_app(db: DatabaseConnection, queue: Arc<FakeQueue>, media_root: &Path) -> Router {
    let config = test_config(media_root);
    let mailer = Mailer::new(&config.mail);
    api::router(db, queue as Arc<dyn JobQueue>, mailer, Arc::new(config))
}

pub async fn create_user(db: &DatabaseConnection, email: &str, active: bool) -> user::Model {
    let now = chrono::Utc::now().naive_utc();
    user::ActiveModel {
        email: Set(email.to_string()),
        password_hash: Set(hash_password(PASSWORD).unwrap()),
        is_active: Set(active),
        activation_token: Set(if active { None } else { Some(new_token()) }),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("user insert should succeed")
}

/// Active user plus a login token for it.
pub async fn create_logged_in_user(db: &DatabaseConnection, email: &str) -> (user::Model, String) {
    let user = create_user(db, email, true).await;
    let token = auth_token::ActiveModel {
        key: Set(new_token()),
        user_id: Set(user.id),
        created_at: Set(chrono::Utc::now().naive_utc()),
    }
    .insert(db)
    .await
    .expect("token insert should succeed");
    (user, token.key)
}

pub async fn create_video(db: &DatabaseConnection, video_file: &str) -> video::Model {
    video::ActiveModel {
        title: Set("Clip".to_string()),
        description: Set("A short clip".to_string()),
        category: Set(Category::Action),
        video_file: Set(video_file.to_string()),
        created_at: Set(chrono::Utc::now().fixed_offset()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("video insert should succeed")
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Token {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn get_auth(app: &Router, uri: &str, token: &str) -> Response {
    let request = Request::get(uri)
        .header(AUTHORIZATION, format!("Token {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response {
    send(app, json_request(Method::POST, uri, None, &body)).await
}

pub async fn post_json_auth(app: &Router, uri: &str, token: &str, body: Value) -> Response {
    send(app, json_request(Method::POST, uri, Some(token), &body)).await
}

pub async fn patch_json_auth(app: &Router, uri: &str, token: &str, body: Value) -> Response {
    send(app, json_request(Method::PATCH, uri, Some(token), &body)).await
}

pub async fn delete_auth(app: &Router, uri: &str, token: &str) -> Response {
    let request = Request::delete(uri)
        .header(AUTHORIZATION, format!("Token {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

const BOUNDARY: &str = "videoflix-test-boundary";

/// Builds a `multipart/form-data` body from text fields and an optional file.
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"video_file\"; filename=\"{filename}\"\r\nContent-Type: video/mp4\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn post_multipart_auth(app: &Router, uri: &str, token: &str, body: Vec<u8>) -> Response {
    let request = Request::post(uri)
        .header(AUTHORIZATION, format!("Token {token}"))
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}
