use crate::entities::{User, Video};
use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait};

/// Seeds the gauges that are otherwise only incremented at runtime.
pub async fn init_metrics(db: &DatabaseConnection) {
    let user_count = User::find().count(db).await.unwrap_or(0);
    metrics::gauge!("videoflix_users_total").set(user_count as f64);

    let video_count = Video::find().count(db).await.unwrap_or(0);
    metrics::gauge!("videoflix_videos_total").set(video_count as f64);

    tracing::info!(
        "Initialized metrics: Users={}, Videos={}",
        user_count,
        video_count
    );
}

pub fn increment_users_registered() {
    metrics::counter!("videoflix_users_registered_total").increment(1);
    metrics::gauge!("videoflix_users_total").increment(1.0);
}

pub fn increment_videos_uploaded() {
    metrics::counter!("videoflix_videos_uploaded_total").increment(1);
    metrics::gauge!("videoflix_videos_total").increment(1.0);
}

pub fn decrement_videos() {
    metrics::gauge!("videoflix_videos_total").decrement(1.0);
}

pub fn increment_mails_sent(kind: &'static str) {
    metrics::counter!("videoflix_mails_sent_total", "kind" => kind).increment(1);
}

pub fn increment_mails_failed(kind: &'static str) {
    metrics::counter!("videoflix_mails_failed_total", "kind" => kind).increment(1);
}

pub fn set_queue_depth(queue: &'static str, depth: u64) {
    metrics::gauge!("videoflix_queue_depth", "queue" => queue).set(depth as f64);
}

/// `GET /metrics` in the Prometheus text format. Shared by the server and
/// the worker's side listener.
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new().route("/metrics", get(|| async move { handle.render() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    #[tokio::test]
    async fn metrics_route_renders_the_handle() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let response = metrics_router(handle)
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
