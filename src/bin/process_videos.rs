//! Runs the transcode job for every stored video, one after another, and
//! prints the outcome per video. Meant for re-processing after the ladder or
//! encoder settings changed.

use sea_orm::{Database, EntityTrait, QueryOrder};
use std::sync::Arc;
use videoflix_server::config::AppConfig;
use videoflix_server::entities::{video, Video};
use videoflix_server::media::{FfmpegEncoder, FfmpegThumbnailer};
use videoflix_server::transcode::Transcoder;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    videoflix_server::telemetry::init_telemetry("videoflix-process-videos");

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    let db = Database::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    let ids: Vec<i32> = Video::find()
        .order_by_asc(video::Column::Id)
        .all(&db)
        .await
        .expect("Failed to load videos")
        .into_iter()
        .map(|v| v.id)
        .collect();

    let transcoder = Transcoder::new(
        db,
        Arc::new(FfmpegEncoder::new(&config.media_root, config.ffmpeg.clone())),
        Arc::new(FfmpegThumbnailer::new(&config.media_root, config.ffmpeg.clone())),
        &config.media_root,
    );

    let mut failures = 0;
    for id in &ids {
        if transcoder.process(*id).await {
            println!("Processed video {id}");
        } else {
            failures += 1;
            eprintln!("Failed to process video {id}");
        }
    }

    println!("Done: {} videos, {} failed", ids.len(), failures);
    if failures > 0 {
        std::process::exit(1);
    }
}
