use sea_orm::Database;
use std::sync::Arc;
use videoflix_server::config::AppConfig;
use videoflix_server::media::{FfmpegEncoder, FfmpegThumbnailer};
use videoflix_server::transcode::Transcoder;
use videoflix_server::worker;

#[tokio::main]
async fn main() {
    // Load .env if present (dotenvy)
    dotenvy::dotenv().ok();

    videoflix_server::telemetry::init_telemetry("videoflix-worker");

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let (prometheus_layer, metric_handle) = axum_prometheus::PrometheusMetricLayer::pair();

    // Spawn metrics server
    tokio::spawn(async move {
        let app = videoflix_server::metrics::metrics_router(metric_handle).layer(prometheus_layer);
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], 9091));
        tracing::info!("Metrics server listening on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        axum::serve(listener, app).await.unwrap();
    });

    // Database Connection
    let db = Database::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Redis Connection
    let redis_client = redis::Client::open(config.redis_url.as_str()).expect("Invalid Redis URL");

    let transcoder = Arc::new(Transcoder::new(
        db,
        Arc::new(FfmpegEncoder::new(&config.media_root, config.ffmpeg.clone())),
        Arc::new(FfmpegThumbnailer::new(&config.media_root, config.ffmpeg.clone())),
        &config.media_root,
    ));

    tracing::info!(
        concurrency = config.worker_concurrency,
        "Starting transcode worker..."
    );
    worker::start_workers(redis_client, transcoder, config.worker_concurrency).await;

    // Keep the main process alive
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutting down worker process"),
        Err(err) => tracing::error!("Unable to listen for shutdown signal: {}", err),
    }
}
