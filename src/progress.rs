use crate::entities::{user_video_progress, UserVideoProgress};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, Set,
};

/// A playback report from a client.
#[derive(Debug, Clone, Copy)]
pub struct ProgressReport {
    pub video_id: i32,
    pub last_viewed_position: f64,
    pub viewed: bool,
}

pub fn validate_position(position: f64) -> Result<(), &'static str> {
    if position.is_finite() && position >= 0.0 {
        Ok(())
    } else {
        Err("Ensure this value is greater than or equal to 0.")
    }
}

pub async fn find_for_user(
    db: &DatabaseConnection,
    user_id: i32,
    video_id: i32,
) -> Result<Option<user_video_progress::Model>, DbErr> {
    UserVideoProgress::find()
        .filter(user_video_progress::Column::UserId.eq(user_id))
        .filter(user_video_progress::Column::VideoId.eq(video_id))
        .one(db)
        .await
}

/// Stores `report` for `user_id`. The first report for a (user, video) pair
/// creates the record; later ones update it in place. The boolean is true
/// when a record was created.
pub async fn record_progress(
    db: &DatabaseConnection,
    user_id: i32,
    report: ProgressReport,
) -> Result<(user_video_progress::Model, bool), DbErr> {
    if let Some(existing) = find_for_user(db, user_id, report.video_id).await? {
        return Ok((apply(db, existing, report).await?, false));
    }

    let record = user_video_progress::ActiveModel {
        user_id: Set(user_id),
        video_id: Set(report.video_id),
        last_viewed_position: Set(report.last_viewed_position),
        viewed: Set(report.viewed),
        ..Default::default()
    };

    match record.insert(db).await {
        Ok(created) => Ok((created, true)),
        // A concurrent report for the same pair won the insert; the unique
        // constraint rejected ours, so update the winner instead.
        Err(e) => match find_for_user(db, user_id, report.video_id).await? {
            Some(existing) => Ok((apply(db, existing, report).await?, false)),
            None => Err(e),
        },
    }
}

async fn apply(
    db: &DatabaseConnection,
    existing: user_video_progress::Model,
    report: ProgressReport,
) -> Result<user_video_progress::Model, DbErr> {
    let mut active = existing.into_active_model();
    active.last_viewed_position = Set(report.last_viewed_position);
    active.viewed = Set(report.viewed);
    active.update(db).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_and_non_finite_positions_are_rejected() {
        assert!(validate_position(0.0).is_ok());
        assert!(validate_position(12.5).is_ok());
        assert!(validate_position(-1.0).is_err());
        assert!(validate_position(f64::NAN).is_err());
        assert!(validate_position(f64::INFINITY).is_err());
    }
}
