//! WebSocket remote store.
//!
//! Implements [`RemoteStore`] over a WebSocket connection to a `TaskFlow`
//! hub. Created via [`WsRemote::connect`], which establishes the
//! connection, performs the `Hello`/`Welcome` handshake to scope the
//! session to an account, and spawns a background reader task.
//!
//! The protocol keeps at most one request in flight per session and the
//! hub answers requests in order, so correlation is positional: the reader
//! task routes `Changed` notifications to the broadcast channel and every
//! other server message to the response channel, and `request` pairs each
//! send with the next response. A request timeout breaks that pairing (a
//! late response would answer the wrong request), so timing out marks the
//! session dead and every later request fails with [`RemoteError::Closed`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use taskflow_proto::codec;
use taskflow_proto::row::TaskRow;
use taskflow_proto::task::{Task, TaskId};
use taskflow_proto::wire::{ClientMessage, ServerMessage};

use crate::identity::AccountId;
use crate::remote::{RemoteError, RemoteStore};

/// Write half of the WebSocket connection.
type WsSender = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

/// Read half of the WebSocket connection.
type WsReader =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Timeout for establishing the WebSocket connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the `Welcome` handshake response.
const HELLO_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for any single request/response exchange.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// WebSocket-backed [`RemoteStore`] scoped to one account session.
pub struct WsRemote {
    account: AccountId,
    request_timeout: Duration,
    /// Write half, shared with nothing but guarded for exclusive sends.
    ws_sender: Arc<Mutex<WsSender>>,
    /// Responses routed by the reader task. Locked for the duration of a
    /// request, which serializes requests on this session.
    responses: Mutex<mpsc::Receiver<ServerMessage>>,
    /// Fan-out of `Changed` notifications.
    changes: broadcast::Sender<()>,
    /// Whether the WebSocket connection is still live.
    connected: Arc<AtomicBool>,
    /// Keeps the background reader alive for the adapter's lifetime.
    _reader_handle: tokio::task::JoinHandle<()>,
}

impl WsRemote {
    /// Connects to a hub and opens a session for `account`.
    ///
    /// 1. Establishes the WebSocket connection to `hub_url` (10s timeout)
    /// 2. Sends `Hello` with the account id
    /// 3. Waits for the `Welcome` acknowledgment (5s timeout)
    /// 4. Spawns the background reader task
    ///
    /// # Errors
    ///
    /// - [`RemoteError::InvalidUrl`] if `hub_url` is not a ws/wss URL.
    /// - [`RemoteError::Timeout`] if connecting or the handshake times out.
    /// - [`RemoteError::Unreachable`] if the hub cannot be reached.
    /// - [`RemoteError::Rejected`] if the hub refuses the session.
    /// - [`RemoteError::Closed`] if the hub hangs up mid-handshake.
    pub async fn connect(hub_url: &str, account: AccountId) -> Result<Self, RemoteError> {
        let parsed =
            url::Url::parse(hub_url).map_err(|e| RemoteError::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(RemoteError::InvalidUrl(format!(
                "unsupported scheme {:?}",
                parsed.scheme()
            )));
        }

        let (ws_stream, _response) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(hub_url))
            .await
            .map_err(|_| {
                tracing::warn!(url = hub_url, "hub WebSocket connect timed out");
                RemoteError::Timeout
            })?
            .map_err(|e| {
                tracing::warn!(url = hub_url, err = %e, "hub WebSocket connect failed");
                RemoteError::Unreachable(e.to_string())
            })?;

        let (mut ws_sender, mut ws_reader) = ws_stream.split();

        let hello = ClientMessage::Hello {
            account_id: account.as_str().to_string(),
        };
        let hello_bytes = codec::encode_client(&hello)?;
        ws_sender
            .send(Message::Binary(hello_bytes.into()))
            .await
            .map_err(|e| {
                tracing::warn!(err = %e, "failed to send Hello");
                RemoteError::Unreachable(e.to_string())
            })?;

        let ack = tokio::time::timeout(HELLO_TIMEOUT, ws_reader.next())
            .await
            .map_err(|_| {
                tracing::warn!(url = hub_url, "hub handshake timed out");
                RemoteError::Timeout
            })?;

        match ack {
            Some(Ok(Message::Binary(data))) => match codec::decode_server(&data)? {
                ServerMessage::Welcome { account_id } => {
                    tracing::info!(account = %account_id, url = hub_url, "hub session established");
                }
                ServerMessage::Error { reason } => {
                    tracing::warn!(reason = %reason, "hub rejected session");
                    return Err(RemoteError::Rejected(reason));
                }
                other => {
                    tracing::warn!(?other, "unexpected hub response during handshake");
                    return Err(RemoteError::Protocol(
                        "unexpected response during handshake".to_string(),
                    ));
                }
            },
            Some(Ok(Message::Close(_))) | None => {
                tracing::warn!("hub closed connection during handshake");
                return Err(RemoteError::Closed);
            }
            Some(Ok(_)) => {
                tracing::warn!("unexpected non-binary frame during handshake");
                return Err(RemoteError::Protocol(
                    "unexpected non-binary frame during handshake".to_string(),
                ));
            }
            Some(Err(e)) => {
                tracing::warn!(err = %e, "WebSocket error during handshake");
                return Err(RemoteError::Unreachable(e.to_string()));
            }
        }

        let (response_tx, response_rx) = mpsc::channel(16);
        let (changes, _) = broadcast::channel(64);
        let connected = Arc::new(AtomicBool::new(true));
        let reader_handle = tokio::spawn(reader_loop(
            ws_reader,
            response_tx,
            changes.clone(),
            Arc::clone(&connected),
        ));

        Ok(Self {
            account,
            request_timeout: REQUEST_TIMEOUT,
            ws_sender: Arc::new(Mutex::new(ws_sender)),
            responses: Mutex::new(response_rx),
            changes,
            connected,
            _reader_handle: reader_handle,
        })
    }

    /// Whether the WebSocket connection is still live.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    fn set_request_timeout(&mut self, timeout: Duration) {
        self.request_timeout = timeout;
    }

    /// Sends a request and waits for its response.
    ///
    /// Holds the response receiver for the whole exchange, which keeps at
    /// most one request in flight on this session. A timeout leaves the
    /// response unclaimed in the channel, where it would pair with the
    /// next request; the session is marked dead instead of serving
    /// misaligned responses.
    async fn request(&self, msg: &ClientMessage) -> Result<ServerMessage, RemoteError> {
        let mut responses = self.responses.lock().await;

        if !self.connected.load(Ordering::Relaxed) {
            return Err(RemoteError::Closed);
        }

        let bytes = codec::encode_client(msg)?;
        {
            let mut sender = self.ws_sender.lock().await;
            sender
                .send(Message::Binary(bytes.into()))
                .await
                .map_err(|e| {
                    tracing::warn!(err = %e, "hub send failed");
                    self.connected.store(false, Ordering::Relaxed);
                    RemoteError::Closed
                })?;
        }

        let response = tokio::time::timeout(self.request_timeout, responses.recv())
            .await
            .map_err(|_| {
                tracing::warn!("hub request timed out, marking session dead");
                self.connected.store(false, Ordering::Relaxed);
                RemoteError::Timeout
            })?
            .ok_or(RemoteError::Closed)?;

        if let ServerMessage::Error { reason } = response {
            return Err(RemoteError::Rejected(reason));
        }
        Ok(response)
    }

    /// Sends a mutating request and checks for the `Ack` response.
    async fn request_ack(&self, msg: &ClientMessage) -> Result<(), RemoteError> {
        match self.request(msg).await? {
            ServerMessage::Ack => Ok(()),
            other => Err(RemoteError::Protocol(format!(
                "expected Ack, got {other:?}"
            ))),
        }
    }
}

impl RemoteStore for WsRemote {
    async fn fetch_all(&self) -> Result<Vec<Task>, RemoteError> {
        match self.request(&ClientMessage::FetchAll).await? {
            ServerMessage::Rows(rows) => {
                let tasks = rows
                    .into_iter()
                    .map(TaskRow::into_task)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(tasks)
            }
            other => Err(RemoteError::Protocol(format!(
                "expected Rows, got {other:?}"
            ))),
        }
    }

    async fn list_ids(&self) -> Result<Vec<String>, RemoteError> {
        match self.request(&ClientMessage::ListIds).await? {
            ServerMessage::Ids(ids) => Ok(ids),
            other => Err(RemoteError::Protocol(format!(
                "expected Ids, got {other:?}"
            ))),
        }
    }

    async fn insert(&self, task: &Task) -> Result<(), RemoteError> {
        let row = TaskRow::from_task(task, self.account.as_str());
        self.request_ack(&ClientMessage::Insert(row)).await
    }

    async fn insert_many(&self, tasks: &[Task]) -> Result<(), RemoteError> {
        if tasks.is_empty() {
            return Ok(());
        }
        let rows = tasks
            .iter()
            .map(|task| TaskRow::from_task(task, self.account.as_str()))
            .collect();
        self.request_ack(&ClientMessage::InsertMany(rows)).await
    }

    async fn update(&self, task: &Task) -> Result<(), RemoteError> {
        let row = TaskRow::from_task(task, self.account.as_str());
        self.request_ack(&ClientMessage::Update(row)).await
    }

    async fn delete(&self, id: &TaskId) -> Result<(), RemoteError> {
        self.request_ack(&ClientMessage::Delete { id: id.to_string() })
            .await
    }

    fn changes(&self) -> broadcast::Receiver<()> {
        self.changes.subscribe()
    }

    fn account_id(&self) -> &AccountId {
        &self.account
    }
}

/// Background task reading WebSocket frames and routing server messages.
///
/// `Changed` notifications go to the broadcast channel; everything else is
/// a response to the request currently in flight and goes to `responses`.
/// Malformed frames are logged and skipped. Sets `connected` to `false`
/// when the WebSocket closes or errors out.
async fn reader_loop(
    mut ws_reader: WsReader,
    responses: mpsc::Sender<ServerMessage>,
    changes: broadcast::Sender<()>,
    connected: Arc<AtomicBool>,
) {
    while let Some(frame) = ws_reader.next().await {
        match frame {
            Ok(Message::Binary(data)) => match codec::decode_server(&data) {
                Ok(ServerMessage::Changed) => {
                    let _ = changes.send(());
                }
                Ok(msg) => {
                    if responses.send(msg).await.is_err() {
                        // Adapter dropped, exit.
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(err = %e, "malformed hub frame, skipping");
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!("hub WebSocket closed by server");
                break;
            }
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Text(_) | Message::Frame(_)) => {}
            Err(e) => {
                tracing::warn!(err = %e, "hub WebSocket read error");
                break;
            }
        }
    }
    connected.store(false, Ordering::Relaxed);
}
