use crate::entities::video;
use crate::queue::{JobQueue, TranscodeRequest};

/// Schedules the transcode job for a freshly created video. Called once by
/// the creation handler; later updates never re-trigger it. Returns whether
/// a job was queued. Enqueue failures are logged, not propagated, since the
/// upload itself already succeeded.
pub async fn on_video_created(queue: &dyn JobQueue, video: &video::Model) -> bool {
    if video.video_file.is_empty() {
        tracing::warn!(video_id = video.id, "video has no source file, not scheduling transcode");
        return false;
    }

    match queue.enqueue(TranscodeRequest { video_id: video.id }).await {
        Ok(()) => {
            tracing::info!(video_id = video.id, "enqueued transcode job");
            metrics::counter!("videoflix_transcode_jobs_enqueued_total").increment(1);
            true
        }
        Err(e) => {
            tracing::error!(video_id = video.id, error = %e, "failed to enqueue transcode job");
            false
        }
    }
}
