pub mod api;
pub mod config;
pub mod entities;
pub mod media;
pub mod metrics;
pub mod migrator;
pub mod notifications;
pub mod progress;
pub mod queue;
pub mod telemetry;
pub mod transcode;
pub mod upload_trigger;
pub mod worker;

pub use sea_orm;
pub use redis;
