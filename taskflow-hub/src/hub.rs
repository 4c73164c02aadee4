//! Hub server core: shared state, WebSocket handler, session registry,
//! and request dispatch.
//!
//! Each WebSocket connection is one session, scoped to a single account by
//! its opening `Hello`. Requests are served in arrival order and answered
//! on the same connection. After every successful mutation the hub pushes
//! a [`ServerMessage::Changed`] notification to all live sessions of the
//! account — including the session that performed the write, so a client's
//! own write echoes back as a change signal.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use taskflow_proto::codec;
use taskflow_proto::wire::{ClientMessage, ServerMessage};

use crate::store::RowStore;

/// Shared hub state holding the session registry and row store.
pub struct HubState {
    /// Account id -> (session id -> channel to that session's writer task).
    sessions: RwLock<HashMap<String, HashMap<Uuid, mpsc::UnboundedSender<Message>>>>,
    /// Account-scoped task rows.
    pub store: RowStore,
}

impl Default for HubState {
    fn default() -> Self {
        Self::new()
    }
}

impl HubState {
    /// Creates a new hub state with an empty session registry and store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            store: RowStore::new(),
        }
    }

    /// Registers a session under its account.
    pub async fn register(
        &self,
        account_id: &str,
        session_id: Uuid,
        sender: mpsc::UnboundedSender<Message>,
    ) {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(account_id.to_string())
            .or_default()
            .insert(session_id, sender);
    }

    /// Removes a session, dropping the account entry when it empties.
    pub async fn unregister(&self, account_id: &str, session_id: Uuid) {
        let mut sessions = self.sessions.write().await;
        if let Some(account) = sessions.get_mut(account_id) {
            account.remove(&session_id);
            if account.is_empty() {
                sessions.remove(account_id);
            }
        }
    }

    /// Pushes a `Changed` notification to every live session of an account.
    ///
    /// Send failures are ignored: a dead channel just means the session's
    /// writer task is already shutting down.
    pub async fn notify_changed(&self, account_id: &str) {
        let frame = match codec::encode_server(&ServerMessage::Changed) {
            Ok(bytes) => Message::Binary(bytes.into()),
            Err(e) => {
                tracing::error!(error = %e, "failed to encode Changed notification");
                return;
            }
        };
        let sessions = self.sessions.read().await;
        if let Some(account) = sessions.get(account_id) {
            tracing::debug!(
                account_id = %account_id,
                sessions = account.len(),
                "broadcasting change notification"
            );
            for sender in account.values() {
                let _ = sender.send(frame.clone());
            }
        }
    }

    /// Returns the number of live sessions for an account.
    pub async fn session_count(&self, account_id: &str) -> usize {
        let sessions = self.sessions.read().await;
        sessions.get(account_id).map_or(0, HashMap::len)
    }
}

/// Handles an upgraded WebSocket connection for a single session.
///
/// The connection lifecycle:
/// 1. Wait for a `Hello` message naming the account.
/// 2. Register the session and send `Welcome` back.
/// 3. Enter the request loop, answering each request in order and
///    broadcasting `Changed` after mutations.
/// 4. On disconnect, unregister the session.
pub async fn handle_socket(socket: WebSocket, state: Arc<HubState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let Some(account_id) = wait_for_hello(&mut ws_receiver).await else {
        tracing::warn!("connection closed before Hello");
        return;
    };

    let session_id = Uuid::now_v7();
    tracing::info!(account_id = %account_id, session_id = %session_id, "session opening");

    // Channel feeding this session's writer task. Responses and change
    // notifications share it, so per-connection ordering is preserved.
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    state.register(&account_id, session_id, tx.clone()).await;

    let welcome = ServerMessage::Welcome {
        account_id: account_id.clone(),
    };
    if send_response(&tx, &welcome).is_err() {
        state.unregister(&account_id, session_id).await;
        return;
    }

    // Writer task: forwards queued frames to the WebSocket.
    let writer_account = account_id.clone();
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!(account_id = %writer_account, "WebSocket write failed");
                break;
            }
        }
    });

    // Reader task: serve requests until the client goes away.
    let reader_state = Arc::clone(&state);
    let reader_account = account_id.clone();
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Binary(data) => {
                    serve_request(&reader_account, &data, &reader_state, &tx).await;
                }
                Message::Close(_) => {
                    tracing::info!(account_id = %reader_account, "received close frame");
                    break;
                }
                _ => {
                    // Ignore text, ping, pong frames.
                }
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    state.unregister(&account_id, session_id).await;
    tracing::info!(account_id = %account_id, session_id = %session_id, "session closed");
}

/// Waits for the first message on the WebSocket, expecting a `Hello`.
///
/// Returns the account id, or `None` if the connection closes or an
/// invalid message arrives first.
async fn wait_for_hello(
    receiver: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
) -> Option<String> {
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Binary(data) => match codec::decode_client(&data) {
                Ok(ClientMessage::Hello { account_id }) => {
                    if account_id.is_empty() {
                        tracing::warn!("received Hello with empty account_id");
                        return None;
                    }
                    return Some(account_id);
                }
                Ok(other) => {
                    tracing::warn!(msg = ?other, "expected Hello, got different message");
                    return None;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to decode Hello message");
                    return None;
                }
            },
            Message::Close(_) => return None,
            _ => {
                // Skip non-binary frames during the handshake.
            }
        }
    }
    None
}

/// Decodes and serves one client request, then broadcasts `Changed` if the
/// request mutated the account's rows.
async fn serve_request(
    account_id: &str,
    data: &[u8],
    state: &Arc<HubState>,
    reply: &mpsc::UnboundedSender<Message>,
) {
    let request = match codec::decode_client(data) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(account_id = %account_id, error = %e, "failed to decode request");
            let _ = send_response(
                reply,
                &ServerMessage::Error {
                    reason: format!("bad request: {e}"),
                },
            );
            return;
        }
    };

    let (response, mutated) = match request {
        ClientMessage::Hello { .. } => (
            ServerMessage::Error {
                reason: "session is already scoped to an account".to_string(),
            },
            false,
        ),
        ClientMessage::FetchAll => {
            let rows = state.store.list(account_id).await;
            tracing::debug!(account_id = %account_id, rows = rows.len(), "serving FetchAll");
            (ServerMessage::Rows(rows), false)
        }
        ClientMessage::ListIds => (ServerMessage::Ids(state.store.ids(account_id).await), false),
        ClientMessage::Insert(row) => {
            let count = state.store.upsert(account_id, scoped(row, account_id)).await;
            tracing::debug!(account_id = %account_id, rows = count, "row inserted");
            (ServerMessage::Ack, true)
        }
        ClientMessage::InsertMany(batch) => {
            let mutated = !batch.is_empty();
            let batch: Vec<_> = batch.into_iter().map(|r| scoped(r, account_id)).collect();
            let count = state.store.upsert_many(account_id, batch).await;
            tracing::info!(account_id = %account_id, rows = count, "batch inserted");
            (ServerMessage::Ack, mutated)
        }
        ClientMessage::Update(row) => {
            state.store.upsert(account_id, scoped(row, account_id)).await;
            (ServerMessage::Ack, true)
        }
        ClientMessage::Delete { id } => {
            let existed = state.store.delete(account_id, &id).await;
            tracing::debug!(account_id = %account_id, id = %id, existed, "row deleted");
            (ServerMessage::Ack, existed)
        }
    };

    if send_response(reply, &response).is_err() {
        tracing::warn!(account_id = %account_id, "session channel closed mid-request");
        return;
    }
    if mutated {
        state.notify_changed(account_id).await;
    }
}

/// Stamps a row with the session's account, enforcing row-level isolation
/// regardless of what the client put in `user_id`.
fn scoped(mut row: taskflow_proto::row::TaskRow, account_id: &str) -> taskflow_proto::row::TaskRow {
    row.user_id = account_id.to_string();
    row
}

/// Encodes a [`ServerMessage`] and queues it on a session channel.
fn send_response(
    tx: &mpsc::UnboundedSender<Message>,
    msg: &ServerMessage,
) -> Result<(), SendFailed> {
    let bytes = codec::encode_server(msg).map_err(|e| {
        tracing::error!(error = %e, "failed to encode response");
        SendFailed
    })?;
    tx.send(Message::Binary(bytes.into())).map_err(|_| SendFailed)
}

/// Marker for a response that could not be queued.
struct SendFailed;

/// Starts the hub server on the given address.
///
/// Returns the bound address (useful with `127.0.0.1:0`) and a
/// [`tokio::task::JoinHandle`] for the serving task.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(HubState::new())).await
}

/// Starts the hub server with a pre-configured [`HubState`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<HubState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "hub server error");
        }
    });

    Ok((bound_addr, handle))
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<HubState>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}
