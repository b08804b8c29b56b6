//! DevTools WebSocket connection
//!
//! One connection per driver. The read half runs as a dedicated task that
//! routes responses back to waiting commands, so a slow page on one session
//! never stalls commands on another.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use super::types::{CdpNotification, CdpRequest, CdpRpcResponse};
use crate::Error;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Pending command response
struct PendingCommand {
    /// Response channel sender
    sender: oneshot::Sender<CdpRpcResponse>,
    /// Command method (for logging)
    method: String,
}

/// DevTools WebSocket connection
pub struct CdpConnection {
    /// WebSocket URL
    url: String,
    /// Write half of the socket
    writer: Arc<Mutex<WsSink>>,
    /// Next command ID
    next_id: AtomicU64,
    /// Pending commands (ID -> response sender)
    pending: Arc<Mutex<HashMap<u64, PendingCommand>>>,
    /// Is connection active
    is_active: Arc<AtomicBool>,
}

impl fmt::Debug for CdpConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdpConnection")
            .field("url", &self.url)
            .field("is_active", &self.is_active.load(Ordering::SeqCst))
            .finish()
    }
}

impl CdpConnection {
    /// Connect to a DevTools target WebSocket URL
    pub async fn connect<S: Into<String>>(url: S) -> Result<Arc<Self>, Error> {
        let url = url.into();
        debug!("Connecting to DevTools WebSocket: {}", url);

        let (ws_stream, _) = connect_async(&url)
            .await
            .map_err(|e| Error::websocket(format!("Failed to connect to {}: {}", url, e)))?;
        let (sink, source) = ws_stream.split();

        let connection = Arc::new(Self {
            url,
            writer: Arc::new(Mutex::new(sink)),
            next_id: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
            is_active: Arc::new(AtomicBool::new(true)),
        });

        tokio::spawn(Self::read_loop(
            source,
            Arc::clone(&connection.writer),
            Arc::clone(&connection.pending),
            Arc::clone(&connection.is_active),
        ));

        Ok(connection)
    }

    /// Send a CDP command and wait for its result value
    pub async fn send_command(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, Error> {
        if !self.is_active.load(Ordering::SeqCst) {
            return Err(Error::websocket("Connection is not active"));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = CdpRequest {
            id,
            method: method.to_string(),
            params: if params.is_null() { None } else { Some(params) },
        };

        let json = serde_json::to_string(&request)
            .map_err(|e| Error::cdp(format!("Failed to serialize request: {}", e)))?;

        let (sender, receiver) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(
                id,
                PendingCommand {
                    sender,
                    method: method.to_string(),
                },
            );
        }

        debug!("Sending CDP command {}: {}", id, method);

        if let Err(e) = self.send_message(Message::Text(json)).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let timeout = Self::timeout_for(method);
        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(response)) => {
                if let Some(error) = response.error {
                    return Err(Error::cdp(format!(
                        "{} failed: {} (code: {})",
                        method, error.message, error.code
                    )));
                }
                Ok(response.result)
            }
            Ok(Err(_)) => Err(Error::websocket(format!(
                "Connection closed before {} completed",
                method
            ))),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(Error::timeout(format!(
                    "Command {} timed out after {:?}",
                    method, timeout
                )))
            }
        }
    }

    /// Close the connection
    pub async fn close(&self) -> Result<(), Error> {
        debug!("Closing DevTools connection to {}", self.url);
        self.is_active.store(false, Ordering::SeqCst);

        let mut writer = self.writer.lock().await;
        writer
            .close()
            .await
            .map_err(|e| Error::websocket(format!("Failed to close WebSocket: {}", e)))?;

        Ok(())
    }

    /// Check if connection is active
    pub fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }

    /// Per-command timeout: screenshots and navigations get longer bounds
    fn timeout_for(method: &str) -> tokio::time::Duration {
        let method_lower = method.to_lowercase();

        if method_lower.contains("screenshot") || method_lower.contains("capture") {
            return tokio::time::Duration::from_secs(90);
        }

        if method_lower.contains("navigate") || method_lower.contains("reload") {
            return tokio::time::Duration::from_secs(60);
        }

        tokio::time::Duration::from_secs(30)
    }

    /// Send a WebSocket message
    async fn send_message(&self, message: Message) -> Result<(), Error> {
        let mut writer = self.writer.lock().await;
        writer
            .send(message)
            .await
            .map_err(|e| Error::websocket(format!("Failed to send message: {}", e)))
    }

    /// Message processing loop, runs until the socket closes
    async fn read_loop(
        mut source: WsSource,
        writer: Arc<Mutex<WsSink>>,
        pending: Arc<Mutex<HashMap<u64, PendingCommand>>>,
        is_active: Arc<AtomicBool>,
    ) {
        while let Some(message) = source.next().await {
            match message {
                Ok(Message::Text(text)) => Self::dispatch(&text, &pending).await,
                Ok(Message::Ping(data)) => {
                    let mut w = writer.lock().await;
                    if let Err(e) = w.send(Message::Pong(data)).await {
                        warn!("Failed to send pong: {}", e);
                        break;
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("WebSocket close frame received");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("WebSocket read error: {}", e);
                    break;
                }
            }

            if !is_active.load(Ordering::SeqCst) {
                break;
            }
        }

        is_active.store(false, Ordering::SeqCst);

        // Dropping the senders wakes every waiter with a channel-closed error
        let mut p = pending.lock().await;
        if !p.is_empty() {
            debug!("Dropping {} pending commands after connection loss", p.len());
        }
        p.clear();
    }

    /// Route one incoming frame to its waiting command, or log the event
    async fn dispatch(text: &str, pending: &Arc<Mutex<HashMap<u64, PendingCommand>>>) {
        if let Ok(response) = serde_json::from_str::<CdpRpcResponse>(text) {
            let mut p = pending.lock().await;
            if let Some(cmd) = p.remove(&response.id) {
                debug!("Received response for {} ({})", cmd.method, response.id);
                let _ = cmd.sender.send(response);
            } else {
                warn!("Received response for unknown command ID: {}", response.id);
            }
            return;
        }

        if let Ok(event) = serde_json::from_str::<CdpNotification>(text) {
            debug!("Received event: {}", event.method);
            return;
        }

        warn!("Unknown message format: {}", text);
    }
}
