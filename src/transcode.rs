//! The transcode job: one thumbnail plus one encode per ladder resolution
//! for a single video, persisted step by step.

use crate::entities::{video, Video};
use crate::media::{Encoder, MediaError, Resolution, Thumbnailer};
use futures::FutureExt;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Instrument;

#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("video {0} not found")]
    VideoNotFound(i32),

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

/// Result of a single thumbnail or encode step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The artifact was written and its path stored on the video.
    Produced(String),
    /// Nothing to do, e.g. a source too short for a thumbnail.
    Skipped,
    /// The external process failed; the field stays as it was.
    Failed(String),
}

impl StepOutcome {
    fn as_label(&self) -> &'static str {
        match self {
            StepOutcome::Produced(_) => "produced",
            StepOutcome::Skipped => "skipped",
            StepOutcome::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranscodeReport {
    pub video_id: i32,
    pub thumbnail: StepOutcome,
    pub renditions: Vec<(Resolution, StepOutcome)>,
}

impl TranscodeReport {
    /// True when no step failed. Skipped steps do not count as failures.
    pub fn is_complete(&self) -> bool {
        self.failed_steps() == 0
    }

    pub fn failed_steps(&self) -> usize {
        std::iter::once(&self.thumbnail)
            .chain(self.renditions.iter().map(|(_, outcome)| outcome))
            .filter(|outcome| matches!(outcome, StepOutcome::Failed(_)))
            .count()
    }

    pub fn outcome(&self, resolution: Resolution) -> Option<&StepOutcome> {
        self.renditions
            .iter()
            .find(|(r, _)| *r == resolution)
            .map(|(_, outcome)| outcome)
    }
}

pub struct Transcoder {
    db: DatabaseConnection,
    encoder: Arc<dyn Encoder>,
    thumbnailer: Arc<dyn Thumbnailer>,
    media_root: PathBuf,
}

impl Transcoder {
    pub fn new(
        db: DatabaseConnection,
        encoder: Arc<dyn Encoder>,
        thumbnailer: Arc<dyn Thumbnailer>,
        media_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            db,
            encoder,
            thumbnailer,
            media_root: media_root.into(),
        }
    }

    /// Runs the job and absorbs every failure at this boundary. Returns true
    /// when the job ran to completion, even if individual resolutions failed;
    /// those are reported through logs and metrics.
    pub async fn process(&self, video_id: i32) -> bool {
        let span = tracing::info_span!("transcode_job", "otel.name" = "transcode_job", video_id);
        let start_time = std::time::Instant::now();

        let result = AssertUnwindSafe(self.run(video_id).instrument(span.clone()))
            .catch_unwind()
            .await;

        let _enter = span.enter();
        let completed = match result {
            Ok(Ok(report)) => {
                if report.is_complete() {
                    tracing::info!("video processed successfully");
                } else {
                    tracing::warn!(
                        failed_steps = report.failed_steps(),
                        "video processed with failed steps"
                    );
                }
                true
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "transcode job failed");
                false
            }
            Err(_) => {
                tracing::error!("transcode job panicked");
                false
            }
        };

        metrics::histogram!(
            "videoflix_transcode_job_duration_seconds",
            "completed" => if completed { "true" } else { "false" }
        )
        .record(start_time.elapsed().as_secs_f64());

        completed
    }

    /// Runs the thumbnail step and then each ladder resolution in turn.
    /// Every produced path is written to the video record as soon as it
    /// exists, so an interrupted job keeps what it already finished.
    pub async fn run(&self, video_id: i32) -> Result<TranscodeReport, TranscodeError> {
        let video = Video::find_by_id(video_id)
            .one(&self.db)
            .await?
            .ok_or(TranscodeError::VideoNotFound(video_id))?;

        let source = self.media_root.join(&video.video_file);
        tracing::info!(source = %source.display(), "starting transcode");

        let thumbnail = match self.thumbnailer.extract(&source).await {
            Ok(Some(path)) => {
                self.store(video_id, video::Column::Thumbnail, &path).await?;
                tracing::info!(path = %path, "thumbnail generated");
                StepOutcome::Produced(path)
            }
            Ok(None) => StepOutcome::Skipped,
            Err(e) => {
                log_step_failure("thumbnail", &e);
                StepOutcome::Failed(e.to_string())
            }
        };
        record_step("thumbnail", &thumbnail);

        let mut renditions = Vec::with_capacity(Resolution::LADDER.len());
        for resolution in Resolution::LADDER {
            let outcome = match self.encoder.encode(&source, resolution).await {
                Ok(path) => {
                    self.store(video_id, video::Column::for_resolution(resolution), &path)
                        .await?;
                    tracing::info!(resolution = %resolution, path = %path, "rendition encoded");
                    StepOutcome::Produced(path)
                }
                Err(e) => {
                    log_step_failure(resolution.label(), &e);
                    StepOutcome::Failed(e.to_string())
                }
            };
            record_step(resolution.label(), &outcome);
            renditions.push((resolution, outcome));
        }

        Ok(TranscodeReport {
            video_id,
            thumbnail,
            renditions,
        })
    }

    /// Writes a single column so concurrent writers of other columns are
    /// not overwritten. A video deleted mid-job stops the job.
    async fn store(
        &self,
        video_id: i32,
        column: video::Column,
        path: &str,
    ) -> Result<(), TranscodeError> {
        let result = Video::update_many()
            .col_expr(column, Expr::value(path.to_string()))
            .filter(video::Column::Id.eq(video_id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            tracing::warn!(path, "video deleted while transcoding, stopping");
            if let Err(e) = tokio::fs::remove_file(self.media_root.join(path)).await {
                tracing::warn!(path, error = %e, "could not remove orphaned artifact");
            }
            return Err(TranscodeError::VideoNotFound(video_id));
        }
        Ok(())
    }
}

fn log_step_failure(step: &str, error: &MediaError) {
    tracing::error!(
        step,
        error = %error,
        stderr = error.stderr().unwrap_or(""),
        "transcode step failed"
    );
}

fn record_step(step: &'static str, outcome: &StepOutcome) {
    metrics::counter!(
        "videoflix_transcode_steps_total",
        "step" => step,
        "outcome" => outcome.as_label()
    )
    .increment(1);
}
