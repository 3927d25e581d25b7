//! Keep-alive HTTP endpoint for external uptime checks.

use std::net::SocketAddr;

use axum::{Router, routing::get};
use axum_server::{Handle, Server};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::Error;

pub const LIVENESS_BODY: &str = "🤖 Voice Bot is Running!";

pub fn router() -> Router {
    Router::new()
        .route("/", get(liveness))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

async fn liveness() -> &'static str {
    LIVENESS_BODY
}

/// Binds `0.0.0.0:<port>` and serves in the background. Send on (or drop) the
/// returned sender to shut the listener down gracefully.
pub async fn start_liveness_server(
    port: u16,
) -> Result<(JoinHandle<()>, oneshot::Sender<()>), Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = std::net::TcpListener::bind(addr)?;
    listener.set_nonblocking(true)?;

    let (shutdown_send, shutdown_recv) = oneshot::channel::<()>();
    let handle = Handle::new();
    let handle_clone = handle.clone();

    tokio::spawn(async move {
        let _ = shutdown_recv.await;
        handle_clone.graceful_shutdown(None);
    });

    let server = Server::from_tcp(listener)
        .handle(handle)
        .serve(router().into_make_service());

    info!("✅ Keep-alive server ready on http://{}", addr);

    let task = tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Keep-alive server error: {}", e);
        }
        info!("Keep-alive server shut down.");
    });

    Ok((task, shutdown_send))
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    async fn get_root() -> (StatusCode, String) {
        let resp = router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn root_returns_fixed_body() {
        let (status, body) = get_root().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "🤖 Voice Bot is Running!");
    }

    #[tokio::test]
    async fn repeated_requests_are_identical() {
        for _ in 0..3 {
            assert_eq!(get_root().await, (StatusCode::OK, LIVENESS_BODY.to_string()));
        }
    }

    #[tokio::test]
    async fn other_paths_are_not_found() {
        let resp = router()
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
