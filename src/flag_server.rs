//! Capture-the-flag endpoint: a plain-text body on every path.

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub fn router(body: impl Into<String>) -> Router {
    let body: Arc<str> = Arc::from(body.into());
    Router::new()
        .route("/", get(flag))
        .fallback(flag)
        .with_state(body)
}

async fn flag(State(body): State<Arc<str>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body.to_string(),
    )
}

/// Serve the flag on an already-bound listener until `cancel` fires.
pub async fn serve(listener: TcpListener, body: String, cancel: CancellationToken) -> Result<()> {
    let addr = listener.local_addr().context("Listener has no local address")?;
    info!("Flag server listening on http://{}", addr);

    axum::serve(listener, router(body))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("Flag server failed")?;

    info!("Flag server stopped");
    Ok(())
}

/// Bind `addr` and serve until Ctrl+C.
pub async fn run(addr: &str, body: String) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind flag server to {}", addr))?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    serve(listener, body, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_body_on_any_path_and_stops_on_cancel() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let server = tokio::spawn(serve(listener, "FLAG{test}".into(), cancel.clone()));

        let client = reqwest::Client::new();
        for path in ["/", "/anything/else"] {
            let resp = client
                .get(format!("http://{}{}", addr, path))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 200);
            assert!(resp.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain"));
            assert_eq!(resp.text().await.unwrap(), "FLAG{test}");
        }

        cancel.cancel();
        server.await.unwrap().unwrap();
    }
}
