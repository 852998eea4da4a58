use crate::{AppState, error::ApiError};
use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use flowsim::SnapshotStream;
use tokio::select;
use tracing::{debug, warn};

/// Upgrade to a WebSocket carrying one JSON text frame per tick.
///
/// The subscription is taken before the upgrade so an unknown session
/// is answered with a plain `404`.
pub async fn ws_handler(
    upgrade: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let snapshots = state.registry.subscribe(&id).await?;
    Ok(upgrade.on_upgrade(move |socket| forward(socket, snapshots)))
}

/// Forward snapshots until the session stops or the client goes away.
async fn forward(mut socket: WebSocket, mut snapshots: SnapshotStream) {
    debug!(session = %snapshots.session(), "subscriber connected");

    loop {
        select! {
            snapshot = snapshots.next() => {
                let Some(snapshot) = snapshot else {
                    // session stopped
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                };
                let text = match serde_json::to_string(&*snapshot) {
                    Ok(text) => text,
                    Err(error) => {
                        warn!(session = %snapshots.session(), %error, "cannot encode snapshot");
                        continue;
                    }
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            message = socket.recv() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // inbound frames carry no commands
                Some(Ok(_)) => {}
            },
        }
    }

    debug!(session = %snapshots.session(), "subscriber disconnected");
}
