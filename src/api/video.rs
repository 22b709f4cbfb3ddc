use super::{error_response, internal_error};
use crate::config::AppConfig;
use crate::entities::video::{self, Category};
use crate::entities::Video;
use crate::media::Resolution;
use crate::queue::{JobQueue, TranscodeRequest};
use crate::upload_trigger;
use axum::{
    body::Body,
    extract::{Extension, Multipart, Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

pub const MAX_TITLE_LEN: usize = 80;
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Video as returned to clients: derived files as absolute URLs, `null`
/// until the transcode job produced them.
#[derive(Debug, Serialize)]
pub struct VideoResponse {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub video_file: String,
    pub thumbnail: Option<String>,
    pub video_120p: Option<String>,
    pub video_360p: Option<String>,
    pub video_720p: Option<String>,
    pub video_1080p: Option<String>,
    pub created_at: chrono::DateTime<chrono::FixedOffset>,
}

impl VideoResponse {
    pub fn new(video: video::Model, media_base_url: &str) -> Self {
        let url = |path: &str| format!("{}/{}", media_base_url.trim_end_matches('/'), path);
        Self {
            id: video.id,
            video_file: url(&video.video_file),
            thumbnail: video.thumbnail.as_deref().map(url),
            video_120p: video.video_120p.as_deref().map(url),
            video_360p: video.video_360p.as_deref().map(url),
            video_720p: video.video_720p.as_deref().map(url),
            video_1080p: video.video_1080p.as_deref().map(url),
            title: video.title,
            description: video.description,
            category: video.category,
            created_at: video.created_at,
        }
    }
}

/// Keeps the final path component and replaces anything outside
/// `[A-Za-z0-9._-]`, so the stored name is safe to use as a path segment.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() || FsPath::new(cleaned).file_stem().is_none() {
        "upload.mp4".to_string()
    } else {
        cleaned.to_string()
    }
}

const MAX_NAME_ATTEMPTS: usize = 8;

/// Creates `videos/<name>` exclusively or, if taken, `videos/<stem>_<suffix>.<ext>`.
/// Returns the media-root relative path and the freshly created file; an
/// existing upload is never opened, let alone truncated.
async fn create_source_file(
    media_root: &FsPath,
    filename: &str,
) -> std::io::Result<(String, tokio::fs::File)> {
    tokio::fs::create_dir_all(media_root.join("videos")).await?;

    let path = FsPath::new(filename);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());

    let mut candidate = format!("videos/{filename}");
    for _ in 0..MAX_NAME_ATTEMPTS {
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(media_root.join(&candidate))
            .await
        {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let suffix = &uuid::Uuid::new_v4().simple().to_string()[..7];
                candidate = match &extension {
                    Some(ext) => format!("videos/{stem}_{suffix}.{ext}"),
                    None => format!("videos/{stem}_{suffix}"),
                };
            }
            Err(e) => return Err(e),
        }
    }
    Err(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("no free file name for {filename}"),
    ))
}

#[derive(Default)]
struct UploadForm {
    title: Option<String>,
    description: Option<String>,
    category: Option<String>,
    video_file: Option<String>,
}

fn check_text(value: Option<&str>, max: usize) -> Result<(), String> {
    match value.map(str::trim) {
        None | Some("") => Err("This field is required.".to_string()),
        Some(v) if v.chars().count() > max => Err(format!(
            "Ensure this field has no more than {max} characters."
        )),
        _ => Ok(()),
    }
}

fn field_errors(form: &UploadForm) -> Map<String, Value> {
    let mut errors = Map::new();
    let mut add = |field: &str, message: String| {
        errors.insert(field.to_string(), json!([message]));
    };

    if let Err(message) = check_text(form.title.as_deref(), MAX_TITLE_LEN) {
        add("title", message);
    }
    if let Err(message) = check_text(form.description.as_deref(), MAX_DESCRIPTION_LEN) {
        add("description", message);
    }
    match form.category.as_deref() {
        None => add("category", "This field is required.".to_string()),
        Some(c) => {
            if let Err(message) = c.parse::<Category>() {
                add("category", message);
            }
        }
    }
    if form.video_file.is_none() {
        add("video_file", "No file was submitted.".to_string());
    }
    errors
}

pub async fn create_video(
    Extension(db): Extension<DatabaseConnection>,
    Extension(queue): Extension<Arc<dyn JobQueue>>,
    Extension(config): Extension<Arc<AppConfig>>,
    mut multipart: Multipart,
) -> Response {
    let mut form = UploadForm::default();
    let mut stored: Option<PathBuf> = None;

    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(e) => {
                discard(stored.as_deref()).await;
                return error_response(StatusCode::BAD_REQUEST, e.to_string());
            }
        };

        let name = field.name().unwrap_or("").to_string();
        let result = match name.as_str() {
            "title" => field.text().await.map(|t| form.title = Some(t)),
            "description" => field.text().await.map(|d| form.description = Some(d)),
            "category" => field.text().await.map(|c| form.category = Some(c)),
            "video_file" if stored.is_none() => {
                let filename = sanitize_filename(field.file_name().unwrap_or("upload.mp4"));
                let (relative, file) = match create_source_file(&config.media_root, &filename).await {
                    Ok(created) => created,
                    Err(e) => return internal_error(e),
                };
                let absolute = config.media_root.join(&relative);
                if let Err(e) = save_field(&mut field, file).await {
                    discard(Some(&absolute)).await;
                    return internal_error(e);
                }
                stored = Some(absolute);
                form.video_file = Some(relative);
                Ok(())
            }
            // Anything else, including thumbnail and video_<label>, is
            // drained and ignored: those columns belong to the transcode job.
            _ => {
                tracing::debug!(field = %name, "ignoring multipart field");
                field.bytes().await.map(|_| ())
            }
        };
        if let Err(e) = result {
            discard(stored.as_deref()).await;
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
    }

    let errors = field_errors(&form);
    if !errors.is_empty() {
        discard(stored.as_deref()).await;
        return (StatusCode::BAD_REQUEST, Json(Value::Object(errors))).into_response();
    }

    let (Some(title), Some(description), Some(category), Some(video_file)) = (
        form.title,
        form.description,
        form.category.and_then(|c| c.parse::<Category>().ok()),
        form.video_file,
    ) else {
        discard(stored.as_deref()).await;
        return error_response(StatusCode::BAD_REQUEST, "Invalid upload");
    };

    let new_video = video::ActiveModel {
        title: Set(title.trim().to_string()),
        description: Set(description.trim().to_string()),
        category: Set(category),
        video_file: Set(video_file),
        created_at: Set(chrono::Utc::now().fixed_offset()),
        ..Default::default()
    };

    let saved = match new_video.insert(&db).await {
        Ok(v) => v,
        Err(e) => {
            discard(stored.as_deref()).await;
            return internal_error(e);
        }
    };

    tracing::Span::current()
        .record("table", "videos")
        .record("action", "upload_video")
        .record("business_event", "Video uploaded");
    crate::metrics::increment_videos_uploaded();

    upload_trigger::on_video_created(queue.as_ref(), &saved).await;

    (
        StatusCode::CREATED,
        Json(VideoResponse::new(saved, &config.media_base_url)),
    )
        .into_response()
}

async fn save_field(
    field: &mut axum::extract::multipart::Field<'_>,
    mut file: tokio::fs::File,
) -> std::io::Result<()> {
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?
    {
        file.write_all(&chunk).await?;
    }
    file.flush().await
}

async fn discard(path: Option<&FsPath>) {
    if let Some(path) = path {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %e, "could not remove discarded upload");
        }
    }
}

pub async fn list_videos(
    Extension(db): Extension<DatabaseConnection>,
    Extension(config): Extension<Arc<AppConfig>>,
) -> Response {
    match Video::find()
        .order_by_desc(video::Column::CreatedAt)
        .order_by_desc(video::Column::Id)
        .all(&db)
        .await
    {
        Ok(videos) => {
            let videos: Vec<VideoResponse> = videos
                .into_iter()
                .map(|v| VideoResponse::new(v, &config.media_base_url))
                .collect();
            (StatusCode::OK, Json(videos)).into_response()
        }
        Err(e) => internal_error(e),
    }
}

pub async fn get_video(
    Extension(db): Extension<DatabaseConnection>,
    Extension(config): Extension<Arc<AppConfig>>,
    Path(video_id): Path<i32>,
) -> Response {
    match Video::find_by_id(video_id).one(&db).await {
        Ok(Some(v)) => (
            StatusCode::OK,
            Json(VideoResponse::new(v, &config.media_base_url)),
        )
            .into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Video not found"),
        Err(e) => internal_error(e),
    }
}

/// Only the descriptive fields are writable; derived file fields sent by a
/// client are dropped by deserialization.
#[derive(Debug, Deserialize)]
pub struct UpdateVideoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
}

pub async fn update_video(
    Extension(db): Extension<DatabaseConnection>,
    Extension(config): Extension<Arc<AppConfig>>,
    Path(video_id): Path<i32>,
    Json(payload): Json<UpdateVideoRequest>,
) -> Response {
    let existing = match Video::find_by_id(video_id).one(&db).await {
        Ok(Some(v)) => v,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Video not found"),
        Err(e) => return internal_error(e),
    };

    let mut errors = Map::new();
    if payload.title.is_some() {
        if let Err(message) = check_text(payload.title.as_deref(), MAX_TITLE_LEN) {
            errors.insert("title".to_string(), json!([message]));
        }
    }
    if payload.description.is_some() {
        if let Err(message) = check_text(payload.description.as_deref(), MAX_DESCRIPTION_LEN) {
            errors.insert("description".to_string(), json!([message]));
        }
    }
    if !errors.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(Value::Object(errors))).into_response();
    }

    let mut active_video = existing.into_active_model();
    if let Some(title) = payload.title {
        active_video.title = Set(title.trim().to_string());
    }
    if let Some(description) = payload.description {
        active_video.description = Set(description.trim().to_string());
    }
    if let Some(category) = payload.category {
        active_video.category = Set(category);
    }

    match active_video.update(&db).await {
        Ok(v) => (
            StatusCode::OK,
            Json(VideoResponse::new(v, &config.media_base_url)),
        )
            .into_response(),
        Err(e) => internal_error(e),
    }
}

pub async fn delete_video(
    Extension(db): Extension<DatabaseConnection>,
    Extension(config): Extension<Arc<AppConfig>>,
    Path(video_id): Path<i32>,
) -> Response {
    let existing = match Video::find_by_id(video_id).one(&db).await {
        Ok(Some(v)) => v,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Video not found"),
        Err(e) => return internal_error(e),
    };

    match Video::delete_by_id(video_id).exec(&db).await {
        Ok(res) if res.rows_affected == 0 => {
            return error_response(StatusCode::NOT_FOUND, "Video not found")
        }
        Ok(_) => {}
        Err(e) => return internal_error(e),
    }
    crate::metrics::decrement_videos();

    for file in existing.stored_files() {
        let path = config.media_root.join(file);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!(video_id, path = %path.display(), error = %e, "could not remove media file");
        }
    }

    (StatusCode::NO_CONTENT, ()).into_response()
}

pub async fn reprocess_video(
    Extension(db): Extension<DatabaseConnection>,
    Extension(queue): Extension<Arc<dyn JobQueue>>,
    Path(video_id): Path<i32>,
) -> Response {
    match Video::find_by_id(video_id).one(&db).await {
        Ok(Some(_)) => {}
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Video not found"),
        Err(e) => return internal_error(e),
    }

    match queue.enqueue(TranscodeRequest { video_id }).await {
        Ok(()) => {
            tracing::info!(video_id, "reprocessing requested");
            (
                StatusCode::ACCEPTED,
                Json(json!({"status": "video processing started"})),
            )
                .into_response()
        }
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    pub resolution: Option<String>,
}

pub async fn stream_video(
    Extension(db): Extension<DatabaseConnection>,
    Extension(config): Extension<Arc<AppConfig>>,
    Path(video_id): Path<i32>,
    Query(params): Query<StreamParams>,
) -> Response {
    let video = match Video::find_by_id(video_id).one(&db).await {
        Ok(Some(v)) => v,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Video not found"),
        Err(e) => return internal_error(e),
    };

    let relative = match params.resolution.as_deref() {
        None => Some(video.video_file.as_str()),
        Some(label) => match label.parse::<Resolution>() {
            Ok(resolution) => video.rendition(resolution),
            Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
        },
    };
    let Some(relative) = relative else {
        return error_response(StatusCode::NOT_FOUND, "Resolution not available");
    };

    let path = config.media_root.join(relative);
    let file = match tokio::fs::File::open(&path).await {
        Ok(f) => f,
        Err(e) => {
            tracing::error!(video_id, path = %path.display(), error = %e, "media file missing");
            return error_response(StatusCode::NOT_FOUND, "Media file not found");
        }
    };
    let length = file.metadata().await.map(|m| m.len()).ok();
    let mime_type = mime_guess::from_path(&path)
        .first_or_octet_stream()
        .to_string();

    let mut response = axum::http::Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime_type)
        .header(header::CACHE_CONTROL, "public, max-age=3600");
    if let Some(length) = length {
        response = response.header(header::CONTENT_LENGTH, length);
    }

    match response.body(Body::from_stream(ReaderStream::new(file))) {
        Ok(r) => r,
        Err(e) => internal_error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_directories_and_odd_characters() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\clips\\my clip.mp4"), "my_clip.mp4");
        assert_eq!(sanitize_filename("clip.mp4"), "clip.mp4");
        assert_eq!(sanitize_filename(""), "upload.mp4");
        assert_eq!(sanitize_filename(".."), "upload.mp4");
    }

    #[tokio::test]
    async fn taken_names_get_a_suffix_and_are_not_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let (first, _file) = create_source_file(dir.path(), "clip.mp4").await.unwrap();
        assert_eq!(first, "videos/clip.mp4");
        tokio::fs::write(dir.path().join("videos/clip.mp4"), b"first upload")
            .await
            .unwrap();

        let (renamed, _file) = create_source_file(dir.path(), "clip.mp4").await.unwrap();
        assert!(renamed.starts_with("videos/clip_"), "{renamed}");
        assert!(renamed.ends_with(".mp4"), "{renamed}");
        assert_ne!(renamed, first);

        let kept = tokio::fs::read(dir.path().join("videos/clip.mp4")).await.unwrap();
        assert_eq!(kept, b"first upload");
    }

    #[tokio::test]
    async fn concurrent_uploads_of_one_name_never_share_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let root = root.clone();
                tokio::spawn(async move { create_source_file(&root, "clip.mp4").await.unwrap().0 })
            })
            .collect();
        let mut names = Vec::new();
        for task in tasks {
            names.push(task.await.unwrap());
        }

        names.sort();
        names.dedup();
        assert_eq!(names.len(), 8);
        assert!(names.contains(&"videos/clip.mp4".to_string()));
    }

    #[test]
    fn upload_form_requires_every_field() {
        let errors = field_errors(&UploadForm::default());
        for field in ["title", "description", "category", "video_file"] {
            assert!(errors.contains_key(field), "missing error for {field}");
        }
    }

    #[test]
    fn unknown_category_is_rejected() {
        let form = UploadForm {
            title: Some("Clip".into()),
            description: Some("A clip".into()),
            category: Some("horror".into()),
            video_file: Some("videos/clip.mp4".into()),
        };
        let errors = field_errors(&form);
        assert_eq!(errors.len(), 1);
        assert!(errors.contains_key("category"));
    }
}
