//! Consumer side of the transcode queue.

use crate::queue::{TranscodeRequest, TRANSCODE_QUEUE};
use crate::transcode::Transcoder;
use async_trait::async_trait;
use redis::AsyncCommands;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Lifetime of the per-video lease. Long enough to cover a full ladder on a
/// long source; a crashed worker's lease expires after it.
const LEASE_TTL_SECS: u64 = 6 * 60 * 60;

/// Deletes the lease only while it still holds the caller's token, so a run
/// that outlived its TTL cannot drop a lease another worker took since.
const RELEASE_LEASE: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

pub fn lease_key(video_id: i32) -> String {
    format!("transcode_lease:{video_id}")
}

pub fn decode_job(payload: &str) -> Result<TranscodeRequest, serde_json::Error> {
    serde_json::from_str(payload)
}

/// At most one transcode per video in flight across all workers.
#[async_trait]
pub trait JobLease: Send + Sync {
    /// Takes the lease for `video_id`. `Ok(Some(token))` when taken,
    /// `Ok(None)` when another run holds it.
    async fn acquire(&self, video_id: i32) -> redis::RedisResult<Option<String>>;

    /// Gives the lease back if it is still held under `token`.
    async fn release(&self, video_id: i32, token: &str) -> redis::RedisResult<()>;
}

#[derive(Clone)]
pub struct RedisLease {
    client: redis::Client,
}

impl RedisLease {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobLease for RedisLease {
    async fn acquire(&self, video_id: i32) -> redis::RedisResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let token = uuid::Uuid::new_v4().simple().to_string();
        let taken: Option<String> = redis::cmd("SET")
            .arg(lease_key(video_id))
            .arg(&token)
            .arg("NX")
            .arg("EX")
            .arg(LEASE_TTL_SECS)
            .query_async(&mut conn)
            .await?;
        Ok(taken.map(|_| token))
    }

    async fn release(&self, video_id: i32, token: &str) -> redis::RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _deleted: i32 = redis::Script::new(RELEASE_LEASE)
            .key(lease_key(video_id))
            .arg(token)
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }
}

// Queue Monitoring
pub async fn start_queue_monitor(redis_client: redis::Client) {
    tokio::spawn(async move {
        tracing::info!("Queue Monitor started");
        loop {
            match redis_client.get_multiplexed_async_connection().await {
                Ok(mut conn) => {
                    let depth: redis::RedisResult<u64> = conn.llen(TRANSCODE_QUEUE).await;
                    match depth {
                        Ok(len) => crate::metrics::set_queue_depth(TRANSCODE_QUEUE, len),
                        Err(e) => tracing::error!("Failed to get {} len: {}", TRANSCODE_QUEUE, e),
                    }
                }
                Err(e) => tracing::error!("Queue Monitor: Failed to get redis conn: {}", e),
            }
            tokio::time::sleep(Duration::from_secs(15)).await;
        }
    });
}

/// Spawns `concurrency` consumer loops. Each loop handles one job at a time,
/// so the ladder of a single video is always encoded sequentially.
pub async fn start_workers(
    redis_client: redis::Client,
    transcoder: Arc<Transcoder>,
    concurrency: usize,
) {
    start_queue_monitor(redis_client.clone()).await;

    let lease: Arc<dyn JobLease> = Arc::new(RedisLease::new(redis_client.clone()));
    let redis_client = Arc::new(redis_client);

    for i in 0..concurrency {
        let redis_client = redis_client.clone();
        let transcoder = transcoder.clone();
        let lease = lease.clone();

        tokio::spawn(async move {
            tracing::info!("Worker {} started", i);
            loop {
                let mut conn = match redis_client.get_multiplexed_async_connection().await {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::error!("Worker {}: Failed to get redis conn: {}", i, e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let result: redis::RedisResult<(String, String)> =
                    conn.blpop(TRANSCODE_QUEUE, 0.0).await;

                match result {
                    Ok((_key, payload)) => {
                        let request = match decode_job(&payload) {
                            Ok(r) => r,
                            Err(e) => {
                                tracing::error!("Worker {}: Bad payload {:?}: {}", i, payload, e);
                                continue;
                            }
                        };
                        let video_id = request.video_id;
                        tracing::info!("Dequeued video {} from {}", video_id, TRANSCODE_QUEUE);

                        if let Some(completed) =
                            run_leased(lease.as_ref(), video_id, i, || transcoder.process(video_id))
                                .await
                        {
                            metrics::counter!(
                                "videoflix_transcode_jobs_total",
                                "completed" => if completed { "true" } else { "false" }
                            )
                            .increment(1);
                        }
                    }
                    Err(e) => {
                        tracing::error!("Worker {}: Redis error: {}", i, e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });
    }
}

/// Runs `job` only if no other worker currently holds the lease for the same
/// video. Returns `None` when the job was dropped as a duplicate, otherwise
/// the job's result.
pub async fn run_leased<F, Fut>(
    lease: &dyn JobLease,
    video_id: i32,
    worker_id: usize,
    job: F,
) -> Option<bool>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = bool>,
{
    let token = match lease.acquire(video_id).await {
        Ok(Some(token)) => Some(token),
        Ok(None) => {
            tracing::warn!(
                video_id,
                "Worker {}: transcode already in flight, dropping duplicate job",
                worker_id
            );
            metrics::counter!("videoflix_transcode_jobs_deduplicated_total").increment(1);
            return None;
        }
        Err(e) => {
            // Redis hiccup on the lease should not lose the job.
            tracing::warn!(video_id, error = %e, "Worker {}: could not take lease, running anyway", worker_id);
            None
        }
    };

    let completed = job().await;

    if let Some(token) = token {
        if let Err(e) = lease.release(video_id, &token).await {
            tracing::warn!(video_id, error = %e, "Worker {}: failed to release lease", worker_id);
        }
    }

    Some(completed)
}
