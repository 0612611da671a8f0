use axum::{extract::Request, middleware::Next, response::Response};
use chrono::Utc;
use std::time::Instant;
use tracing::info;

pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let remote_addr = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .or_else(|| {
            request
                .headers()
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
        })
        .unwrap_or("-")
        .to_string();

    let response = next.run(request).await;

    let duration = start.elapsed();
    info!(
        target: "access_log",
        "{} {} \"{} {}\" {} {}ms",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        remote_addr,
        method,
        uri,
        response.status().as_u16(),
        duration.as_millis(),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, response::Html, routing::get, Router};
    use axum_test::TestServer;

    #[tokio::test]
    async fn test_logging_middleware_passes_responses_through() {
        let app = Router::new()
            .route("/test", get(|| async { Html("ok") }))
            .layer(axum::middleware::from_fn(logging_middleware));

        let server = TestServer::new(app).unwrap();
        let response = server.get("/test").await;

        assert_eq!(response.status_code(), StatusCode::OK);
    }
}
