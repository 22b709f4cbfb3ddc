//! Producer side of the transcode work queue.

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

/// Redis list the web server pushes to and the worker pops from.
pub const TRANSCODE_QUEUE: &str = "transcode_queue";

/// Job descriptor carried on the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeRequest {
    pub video_id: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("could not encode job: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, request: TranscodeRequest) -> Result<(), QueueError>;
}

#[derive(Clone)]
pub struct RedisJobQueue {
    client: redis::Client,
}

impl RedisJobQueue {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, request: TranscodeRequest) -> Result<(), QueueError> {
        let payload = serde_json::to_string(&request)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.rpush(TRANSCODE_QUEUE, payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_is_a_bare_video_id() {
        let json = serde_json::to_string(&TranscodeRequest { video_id: 42 }).unwrap();
        assert_eq!(json, r#"{"video_id":42}"#);
    }
}
