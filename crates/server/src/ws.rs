use crate::{AppState, MAX_MESSAGE_SIZE, PING_PERIOD, READ_DEADLINE, WRITE_DEADLINE};
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use structscope_api::{Model, Outbound};
use structscope_core::{ClientId, Pipeline, Result, StructscopeError};
use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at, timeout};
use tokio_util::sync::CancellationToken;

pub(crate) async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let pipeline = state.pipeline;
    let hub = pipeline.hub().clone();
    let (id, rx) = hub.register(pipeline.settings().outbound_queue);
    tracing::info!("Observer {} connected", id);

    if let Err(err) = pipeline.send_current_model(id).await {
        tracing::warn!("No model for observer {}: {}", id, err);
        hub.send_to(id, Outbound::error(err.to_string()));
    }

    let (sink, stream) = socket.split();
    let cancel = state.cancel.child_token();
    let mut writer = tokio::spawn(write_loop(sink, rx, cancel.clone()));
    let mut reader = tokio::spawn(read_loop(stream, pipeline.clone(), id, cancel.clone()));

    // Whichever side ends first takes the other down with it.
    tokio::select! {
        res = &mut writer => {
            log_exit(id, "writer", res);
            cancel.cancel();
            hub.unregister(id);
            let _ = reader.await;
        }
        res = &mut reader => {
            log_exit(id, "reader", res);
            cancel.cancel();
            hub.unregister(id);
            let _ = writer.await;
        }
    }
    tracing::info!("Observer {} disconnected", id);
}

fn log_exit(id: ClientId, side: &str, res: std::result::Result<Result<()>, tokio::task::JoinError>) {
    match res {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::debug!("Observer {} {} stopped: {}", id, side, err),
        Err(err) => tracing::warn!("Observer {} {} task failed: {}", id, side, err),
    }
}

async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Outbound>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut ping = interval_at(Instant::now() + PING_PERIOD, PING_PERIOD);

    let result = loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break Ok(()),
            msg = rx.recv() => match msg {
                Some(msg) => Message::Text(serde_json::to_string(&msg)?.into()),
                // Dropped by the hub or shut down.
                None => break Ok(()),
            },
            _ = ping.tick() => Message::Ping(Bytes::new()),
        };
        if let Err(err) = send(&mut sink, frame).await {
            break Err(err);
        }
    };

    let _ = timeout(WRITE_DEADLINE, sink.send(Message::Close(None))).await;
    result
}

async fn send(sink: &mut SplitSink<WebSocket, Message>, frame: Message) -> Result<()> {
    match timeout(WRITE_DEADLINE, sink.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(StructscopeError::Transport(err.to_string())),
        Err(_) => Err(StructscopeError::Transport("write deadline exceeded".to_string())),
    }
}

async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    pipeline: Arc<Pipeline>,
    id: ClientId,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        // Any inbound frame, pongs included, resets the deadline.
        let next = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            next = timeout(READ_DEADLINE, stream.next()) => next,
        };
        let msg = match next {
            Err(_) => return Err(StructscopeError::Transport("read deadline exceeded".to_string())),
            Ok(None) => return Ok(()),
            Ok(Some(Err(err))) => return Err(StructscopeError::Transport(err.to_string())),
            Ok(Some(Ok(msg))) => msg,
        };

        match msg {
            Message::Text(text) => handle_edit(&pipeline, id, text.as_str()).await,
            Message::Binary(_) => {
                pipeline
                    .hub()
                    .send_to(id, Outbound::error("binary messages are not supported"));
            }
            Message::Close(_) => return Ok(()),
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
}

async fn handle_edit(pipeline: &Pipeline, id: ClientId, text: &str) {
    let model: Model = match serde_json::from_str(text) {
        Ok(model) => model,
        Err(err) => {
            tracing::debug!("Observer {} sent an invalid model: {}", id, err);
            pipeline
                .hub()
                .send_to(id, Outbound::error(format!("invalid model: {}", err)));
            return;
        }
    };

    let edits = pipeline.submit_edited_model(model).await;
    let failed = edits.iter().filter(|e| !e.ok).count();
    tracing::info!(
        "Observer {} edited {} files ({} failed)",
        id,
        edits.len(),
        failed
    );
    pipeline.hub().send_to(id, Outbound::Edits { edits });
}
