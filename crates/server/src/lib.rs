//! Websocket transport: one `/ws` endpoint streaming models to observers and
//! accepting edited models back.

mod ws;

use axum::Router;
use axum::routing::get;
use std::sync::Arc;
use std::time::Duration;
use structscope_core::{Pipeline, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Interval between pings sent to an observer.
pub const PING_PERIOD: Duration = Duration::from_secs(54);
/// An observer that sends nothing (not even a pong) for this long is dropped.
pub const READ_DEADLINE: Duration = Duration::from_secs(60);
pub const WRITE_DEADLINE: Duration = Duration::from_secs(10);
pub const MAX_MESSAGE_SIZE: usize = 512 * 1024;
/// Upper bound on draining connections after shutdown is requested.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub(crate) struct AppState {
    pipeline: Arc<Pipeline>,
    cancel: CancellationToken,
}

pub fn router(pipeline: Arc<Pipeline>, cancel: CancellationToken) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(AppState { pipeline, cancel })
}

/// Serves observers on `listener` until `cancel` fires.
///
/// On cancellation every observer queue is closed so writers send a close
/// frame and exit.
pub async fn serve(pipeline: Arc<Pipeline>, listener: TcpListener, cancel: CancellationToken) -> Result<()> {
    let addr = listener.local_addr()?;
    let hub = pipeline.hub().clone();
    let app = router(pipeline, cancel.clone());

    tracing::info!("Websocket server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
            tracing::info!("Shutting down, disconnecting {} observers", hub.len());
            hub.close_all();
        })
        .await?;
    Ok(())
}
