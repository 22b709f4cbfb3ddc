//! Transcode job against fake encoder/thumbnailer implementations.

mod common;

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel, Set};

use videoflix_server::entities::{video, Video};
use videoflix_server::media::{
    rendition_path, source_stem, thumbnail_path, Encoder, MediaError, MediaResult, Resolution,
    Thumbnailer,
};
use videoflix_server::transcode::{StepOutcome, TranscodeError, Transcoder};

/// Encoder that "produces" the deterministic path without running anything,
/// failing for the configured resolutions.
#[derive(Default)]
struct FakeEncoder {
    failing: HashSet<Resolution>,
    calls: Mutex<Vec<Resolution>>,
}

impl FakeEncoder {
    fn failing(resolutions: &[Resolution]) -> Self {
        Self {
            failing: resolutions.iter().copied().collect(),
            calls: Mutex::default(),
        }
    }
}

#[async_trait]
impl Encoder for FakeEncoder {
    async fn encode(&self, source: &Path, resolution: Resolution) -> MediaResult<String> {
        self.calls.lock().unwrap().push(resolution);
        if self.failing.contains(&resolution) {
            return Err(MediaError::Failed {
                program: "ffmpeg".to_string(),
                exit_code: Some(1),
                stderr: format!("Error while encoding {resolution}"),
            });
        }
        Ok(rendition_path(&source_stem(source), resolution))
    }
}

/// Thumbnailer with a fixed source duration, mirroring the two second cutoff.
struct FakeThumbnailer {
    duration: f64,
}

#[async_trait]
impl Thumbnailer for FakeThumbnailer {
    async fn extract(&self, source: &Path) -> MediaResult<Option<String>> {
        if self.duration < 2.0 {
            return Ok(None);
        }
        Ok(Some(thumbnail_path(&source_stem(source))))
    }
}

struct BrokenThumbnailer;

#[async_trait]
impl Thumbnailer for BrokenThumbnailer {
    async fn extract(&self, _source: &Path) -> MediaResult<Option<String>> {
        Err(MediaError::Failed {
            program: "ffmpeg".to_string(),
            exit_code: Some(1),
            stderr: "moov atom not found".to_string(),
        })
    }
}

fn transcoder(
    db: &DatabaseConnection,
    encoder: Arc<FakeEncoder>,
    thumbnailer: Arc<dyn Thumbnailer>,
) -> Transcoder {
    Transcoder::new(db.clone(), encoder, thumbnailer, "media")
}

async fn reload(db: &DatabaseConnection, id: i32) -> video::Model {
    Video::find_by_id(id).one(db).await.unwrap().unwrap()
}

#[tokio::test]
async fn ten_second_clip_gets_thumbnail_and_full_ladder() {
    let db = common::test_db().await;
    let video = common::create_video(&db, "videos/clip.mp4").await;
    let encoder = Arc::new(FakeEncoder::default());
    let job = transcoder(&db, encoder.clone(), Arc::new(FakeThumbnailer { duration: 10.0 }));

    assert!(job.process(video.id).await);

    let stored = reload(&db, video.id).await;
    assert_eq!(stored.thumbnail.as_deref(), Some("thumbnails/clip_thumb.jpg"));
    assert_eq!(stored.video_120p.as_deref(), Some("videos/120p/clip_120p.mp4"));
    assert_eq!(stored.video_360p.as_deref(), Some("videos/360p/clip_360p.mp4"));
    assert_eq!(stored.video_720p.as_deref(), Some("videos/720p/clip_720p.mp4"));
    assert_eq!(stored.video_1080p.as_deref(), Some("videos/1080p/clip_1080p.mp4"));
    assert_eq!(stored.video_file, "videos/clip.mp4");

    // Highest resolution first, one invocation each.
    assert_eq!(
        *encoder.calls.lock().unwrap(),
        vec![
            Resolution::P1080,
            Resolution::P720,
            Resolution::P360,
            Resolution::P120
        ]
    );
}

#[tokio::test]
async fn failing_resolution_does_not_stop_the_others() {
    let db = common::test_db().await;
    let video = common::create_video(&db, "videos/clip.mp4").await;
    let encoder = Arc::new(FakeEncoder::failing(&[Resolution::P360]));
    let job = transcoder(&db, encoder.clone(), Arc::new(FakeThumbnailer { duration: 10.0 }));

    let report = job.run(video.id).await.unwrap();
    assert!(!report.is_complete());
    assert_eq!(report.failed_steps(), 1);
    assert!(matches!(
        report.outcome(Resolution::P360),
        Some(StepOutcome::Failed(_))
    ));
    assert_eq!(encoder.calls.lock().unwrap().len(), 4);

    let stored = reload(&db, video.id).await;
    assert!(stored.video_360p.is_none());
    assert_eq!(stored.video_1080p.as_deref(), Some("videos/1080p/clip_1080p.mp4"));
    assert_eq!(stored.video_720p.as_deref(), Some("videos/720p/clip_720p.mp4"));
    assert_eq!(stored.video_120p.as_deref(), Some("videos/120p/clip_120p.mp4"));

    // The job still counts as having run to completion.
    assert!(job.process(video.id).await);
}

#[tokio::test]
async fn short_source_skips_thumbnail_silently() {
    let db = common::test_db().await;
    let video = common::create_video(&db, "videos/blip.mp4").await;
    let job = transcoder(
        &db,
        Arc::new(FakeEncoder::default()),
        Arc::new(FakeThumbnailer { duration: 1.5 }),
    );

    let report = job.run(video.id).await.unwrap();
    assert_eq!(report.thumbnail, StepOutcome::Skipped);
    assert!(report.is_complete());

    let stored = reload(&db, video.id).await;
    assert!(stored.thumbnail.is_none());
    assert_eq!(stored.video_120p.as_deref(), Some("videos/120p/blip_120p.mp4"));
}

#[tokio::test]
async fn thumbnail_failure_is_recorded_and_encoding_continues() {
    let db = common::test_db().await;
    let video = common::create_video(&db, "videos/clip.mp4").await;
    let job = transcoder(&db, Arc::new(FakeEncoder::default()), Arc::new(BrokenThumbnailer));

    let report = job.run(video.id).await.unwrap();
    assert!(matches!(report.thumbnail, StepOutcome::Failed(_)));
    assert_eq!(report.failed_steps(), 1);

    let stored = reload(&db, video.id).await;
    assert!(stored.thumbnail.is_none());
    assert!(stored.video_1080p.is_some());
}

#[tokio::test]
async fn missing_video_aborts_without_invoking_encoder() {
    let db = common::test_db().await;
    let encoder = Arc::new(FakeEncoder::default());
    let job = transcoder(&db, encoder.clone(), Arc::new(FakeThumbnailer { duration: 10.0 }));

    assert!(matches!(
        job.run(4242).await,
        Err(TranscodeError::VideoNotFound(4242))
    ));
    assert!(!job.process(4242).await);
    assert!(encoder.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn rerunning_the_job_yields_identical_fields() {
    let db = common::test_db().await;
    let video = common::create_video(&db, "videos/clip.mp4").await;
    let job = transcoder(
        &db,
        Arc::new(FakeEncoder::default()),
        Arc::new(FakeThumbnailer { duration: 10.0 }),
    );

    assert!(job.process(video.id).await);
    let first = reload(&db, video.id).await;
    assert!(job.process(video.id).await);
    let second = reload(&db, video.id).await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn job_leaves_descriptive_fields_alone() {
    let db = common::test_db().await;
    let video = common::create_video(&db, "videos/clip.mp4").await;

    // An edit lands between creation and the job; the job must not undo it.
    let mut edit = video.clone().into_active_model();
    edit.title = Set("Renamed".to_string());
    edit.update(&db).await.unwrap();

    let job = transcoder(
        &db,
        Arc::new(FakeEncoder::default()),
        Arc::new(FakeThumbnailer { duration: 10.0 }),
    );
    assert!(job.process(video.id).await);

    let stored = reload(&db, video.id).await;
    assert_eq!(stored.title, "Renamed");
    assert_eq!(stored.description, video.description);
    assert_eq!(stored.category, video.category);
}

/// Encoder whose first encode coincides with the video being deleted.
struct DeletingEncoder {
    db: DatabaseConnection,
    video_id: i32,
    calls: Mutex<Vec<Resolution>>,
}

#[async_trait]
impl Encoder for DeletingEncoder {
    async fn encode(&self, source: &Path, resolution: Resolution) -> MediaResult<String> {
        self.calls.lock().unwrap().push(resolution);
        Video::delete_by_id(self.video_id)
            .exec(&self.db)
            .await
            .unwrap();
        Ok(rendition_path(&source_stem(source), resolution))
    }
}

#[tokio::test]
async fn video_deleted_mid_job_stops_the_ladder() {
    let db = common::test_db().await;
    let video = common::create_video(&db, "videos/clip.mp4").await;
    let encoder = Arc::new(DeletingEncoder {
        db: db.clone(),
        video_id: video.id,
        calls: Mutex::default(),
    });
    let job = Transcoder::new(
        db.clone(),
        encoder.clone(),
        Arc::new(FakeThumbnailer { duration: 1.0 }),
        "media",
    );

    assert!(matches!(
        job.run(video.id).await,
        Err(TranscodeError::VideoNotFound(id)) if id == video.id
    ));
    assert_eq!(*encoder.calls.lock().unwrap(), vec![Resolution::P1080]);
    assert!(Video::find_by_id(video.id).one(&db).await.unwrap().is_none());
}
