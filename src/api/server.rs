//! API server lifecycle: bind, serve, shut down gracefully on a signal.
//!
//! `serve` is what the binary runs (stops on Ctrl-C). It is a thin wrapper over
//! `serve_with_shutdown`, which takes an already-bound listener and any
//! shutdown future.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::api::router::api_router;
use crate::pipeline::InferencePipeline;

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, pipeline: Arc<InferencePipeline>) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    serve_with_shutdown(listener, pipeline, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
        }
    })
    .await
}

/// Serve on `listener` until `shutdown` resolves, then drain in-flight requests.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    pipeline: Arc<InferencePipeline>,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    let app = api_router(pipeline);

    tracing::info!(%addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("API server received shutdown signal");
        })
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}
