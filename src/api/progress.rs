use super::{error_response, internal_error};
use crate::entities::{user_video_progress, UserVideoProgress, Video};
use crate::progress::{record_progress, validate_position, ProgressReport};
use axum::{
    extract::{Extension, Json, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct ProgressFilter {
    pub video: Option<i32>,
}

pub async fn list_progress(
    Extension(db): Extension<DatabaseConnection>,
    Extension(user_id): Extension<i32>,
    Query(filter): Query<ProgressFilter>,
) -> Response {
    let mut query = UserVideoProgress::find()
        .filter(user_video_progress::Column::UserId.eq(user_id))
        .order_by_desc(user_video_progress::Column::LastViewedAt);
    if let Some(video_id) = filter.video {
        query = query.filter(user_video_progress::Column::VideoId.eq(video_id));
    }

    match query.all(&db).await {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProgressRequest {
    pub video: i32,
    #[serde(default)]
    pub last_viewed_position: f64,
    #[serde(default)]
    pub viewed: bool,
}

fn position_error(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"last_viewed_position": [message]})),
    )
        .into_response()
}

/// Creates the caller's record for a video, or updates it in place when one
/// exists. 201 on create, 200 on update.
pub async fn create_progress(
    Extension(db): Extension<DatabaseConnection>,
    Extension(user_id): Extension<i32>,
    Json(payload): Json<CreateProgressRequest>,
) -> Response {
    if let Err(message) = validate_position(payload.last_viewed_position) {
        return position_error(message);
    }

    match Video::find_by_id(payload.video).one(&db).await {
        Ok(Some(_)) => {}
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Video not found"),
        Err(e) => return internal_error(e),
    }

    let report = ProgressReport {
        video_id: payload.video,
        last_viewed_position: payload.last_viewed_position,
        viewed: payload.viewed,
    };

    match record_progress(&db, user_id, report).await {
        Ok((record, created)) => {
            tracing::debug!(
                user_id,
                video_id = record.video_id,
                created,
                position = record.last_viewed_position,
                "progress recorded"
            );
            let status = if created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            (status, Json(record)).into_response()
        }
        Err(e) => internal_error(e),
    }
}

async fn find_owned(
    db: &DatabaseConnection,
    user_id: i32,
    id: i32,
) -> Result<user_video_progress::Model, Response> {
    match UserVideoProgress::find_by_id(id)
        .filter(user_video_progress::Column::UserId.eq(user_id))
        .one(db)
        .await
    {
        Ok(Some(record)) => Ok(record),
        Ok(None) => Err(error_response(StatusCode::NOT_FOUND, "Progress not found")),
        Err(e) => Err(internal_error(e)),
    }
}

pub async fn get_progress(
    Extension(db): Extension<DatabaseConnection>,
    Extension(user_id): Extension<i32>,
    Path(id): Path<i32>,
) -> Response {
    match find_owned(&db, user_id, id).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(response) => response,
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateProgressRequest {
    pub last_viewed_position: Option<f64>,
    pub viewed: Option<bool>,
}

pub async fn update_progress(
    Extension(db): Extension<DatabaseConnection>,
    Extension(user_id): Extension<i32>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateProgressRequest>,
) -> Response {
    let record = match find_owned(&db, user_id, id).await {
        Ok(record) => record,
        Err(response) => return response,
    };

    let mut active = record.into_active_model();
    if let Some(position) = payload.last_viewed_position {
        if let Err(message) = validate_position(position) {
            return position_error(message);
        }
        active.last_viewed_position = Set(position);
    }
    if let Some(viewed) = payload.viewed {
        active.viewed = Set(viewed);
    }

    match active.update(&db).await {
        Ok(updated) => (StatusCode::OK, Json(updated)).into_response(),
        Err(e) => internal_error(e),
    }
}

pub async fn delete_progress(
    Extension(db): Extension<DatabaseConnection>,
    Extension(user_id): Extension<i32>,
    Path(id): Path<i32>,
) -> Response {
    let record = match find_owned(&db, user_id, id).await {
        Ok(record) => record,
        Err(response) => return response,
    };

    match UserVideoProgress::delete_by_id(record.id).exec(&db).await {
        Ok(_) => (StatusCode::NO_CONTENT, ()).into_response(),
        Err(e) => internal_error(e),
    }
}
