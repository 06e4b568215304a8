use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use log::error;

use crate::ApiState;

pub fn create_router() -> Router<ApiState> {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/-/healthy", get(ok))
        .route("/-/ready", get(ok))
}

/// Liveness and readiness are the same thing here: the process is up.
/// Neither probe checks the backend.
async fn ok() -> &'static str {
    "OK"
}

async fn metrics(State(state): State<ApiState>) -> Response {
    match state.metrics.render() {
        Ok((content_type, body)) => ([(header::CONTENT_TYPE, content_type)], body).into_response(),
        Err(e) => {
            error!("error rendering metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
