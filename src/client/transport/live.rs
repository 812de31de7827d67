//! Live Channel Client
//!
//! WebSocket client for the server's push channel. A subscription owns one
//! background task that keeps the connection alive:
//!
//! - sends `authenticate(token)` as the first frame of every connection
//! - turns server frames into [`LiveEvent`]s on an mpsc channel
//! - forwards outbound [`ClientFrame`]s while connected
//! - reconnects with exponential backoff (1s doubling up to 30s)
//! - stops for good when the server answers with `auth-error`
//!
//! Delivery is at-least-once from the controller's point of view: a
//! reconnect may replay messages the client already has.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::client::config::Config;
use crate::client::error::TransportError;
use crate::shared::event::{ClientFrame, LiveEvent, ServerFrame};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const EVENT_BUFFER: usize = 256;
const OUTGOING_BUFFER: usize = 64;

/// Reconnect delay policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(1000),
            max: Duration::from_secs(30),
        }
    }
}

impl Backoff {
    fn next(&self, current: Duration) -> Duration {
        std::cmp::min(current * 2, self.max)
    }
}

/// Factory for live subscriptions
#[derive(Debug, Clone)]
pub struct LiveClient {
    url: String,
    backoff: Backoff,
}

impl LiveClient {
    pub fn new(config: &Config) -> Self {
        Self {
            url: config.live_url().to_string(),
            backoff: Backoff::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Open a subscription. Must be called from within a Tokio runtime.
    pub fn subscribe(&self, token: impl Into<String>) -> LiveSubscription {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTGOING_BUFFER);
        let connected = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(run_connection(
            self.url.clone(),
            token.into(),
            self.backoff,
            event_tx,
            outgoing_rx,
            Arc::clone(&connected),
        ));

        LiveSubscription {
            events: event_rx,
            sender: LiveSender {
                outgoing: outgoing_tx,
                connected,
            },
            task,
        }
    }
}

/// Outbound half of a subscription. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LiveSender {
    outgoing: mpsc::Sender<ClientFrame>,
    connected: Arc<AtomicBool>,
}

impl LiveSender {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Queue a frame on the current connection.
    ///
    /// Frames are not held for a future connection: while disconnected this
    /// fails with [`TransportError::Closed`].
    pub async fn send(&self, frame: ClientFrame) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Closed);
        }
        self.outgoing
            .send(frame)
            .await
            .map_err(|_| TransportError::Closed)
    }
}

/// A cancellable live subscription. Dropping it closes the connection.
#[derive(Debug)]
pub struct LiveSubscription {
    events: mpsc::Receiver<LiveEvent>,
    sender: LiveSender,
    task: JoinHandle<()>,
}

impl LiveSubscription {
    /// Next event, or `None` once the subscription has ended
    pub async fn recv(&mut self) -> Option<LiveEvent> {
        self.events.recv().await
    }

    pub fn sender(&self) -> LiveSender {
        self.sender.clone()
    }

    pub fn cancel(self) {
        self.task.abort();
    }
}

impl Drop for LiveSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

enum SessionEnd {
    /// Connection dropped; reconnect
    Lost,
    /// Server refused the token
    AuthRejected,
    /// Subscriber is gone
    Shutdown,
}

async fn run_connection(
    url: String,
    token: String,
    backoff: Backoff,
    events: mpsc::Sender<LiveEvent>,
    mut outgoing: mpsc::Receiver<ClientFrame>,
    connected: Arc<AtomicBool>,
) {
    let mut delay = backoff.initial;

    loop {
        tracing::info!("[LIVE] Connecting to {}", url);
        match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((socket, _)) => {
                delay = backoff.initial;
                let end = run_session(socket, &token, &events, &mut outgoing, &connected).await;
                let was_connected = connected.swap(false, Ordering::SeqCst);
                match end {
                    SessionEnd::Shutdown => {
                        tracing::debug!("[LIVE] Subscriber dropped, closing");
                        return;
                    }
                    SessionEnd::AuthRejected => {
                        tracing::error!("[LIVE] Authentication rejected, not reconnecting");
                        return;
                    }
                    SessionEnd::Lost => {
                        tracing::warn!("[LIVE] Connection lost, reconnecting in {:?}", delay);
                        if was_connected && events.send(LiveEvent::Disconnected).await.is_err() {
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!("[LIVE] Connection failed (will retry in {:?}): {}", delay, e);
            }
        }

        tokio::time::sleep(delay).await;
        delay = backoff.next(delay);
    }
}

async fn run_session(
    socket: Socket,
    token: &str,
    events: &mpsc::Sender<LiveEvent>,
    outgoing: &mut mpsc::Receiver<ClientFrame>,
    connected: &AtomicBool,
) -> SessionEnd {
    let (mut sink, mut stream) = socket.split();

    let hello = match ClientFrame::Authenticate(token.to_string()).encode() {
        Ok(text) => text,
        Err(e) => {
            tracing::error!("[LIVE] Failed to encode handshake: {}", e);
            return SessionEnd::Lost;
        }
    };
    if let Err(e) = sink.send(WsMessage::text(hello)).await {
        tracing::warn!("[LIVE] Handshake failed: {}", e);
        return SessionEnd::Lost;
    }

    connected.store(true, Ordering::SeqCst);
    tracing::info!("[LIVE] Connected");
    if events.send(LiveEvent::Connected).await.is_err() {
        return SessionEnd::Shutdown;
    }

    loop {
        tokio::select! {
            frame = outgoing.recv() => {
                let Some(frame) = frame else {
                    return SessionEnd::Shutdown;
                };
                match frame.encode() {
                    Ok(text) => {
                        if let Err(e) = sink.send(WsMessage::text(text)).await {
                            tracing::warn!("[LIVE] Send failed: {}", e);
                            return SessionEnd::Lost;
                        }
                    }
                    Err(e) => tracing::warn!("[LIVE] Dropping unencodable frame: {}", e),
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => match ServerFrame::decode(text.as_str()) {
                        Ok(Some(frame)) => {
                            let event = LiveEvent::from(frame);
                            let rejected = matches!(event, LiveEvent::AuthError(_));
                            if events.send(event).await.is_err() {
                                return SessionEnd::Shutdown;
                            }
                            if rejected {
                                let _ = sink.close().await;
                                return SessionEnd::AuthRejected;
                            }
                        }
                        Ok(None) => tracing::trace!("[LIVE] Ignoring unknown event"),
                        Err(e) => tracing::warn!("[LIVE] Undecodable frame: {}", e),
                    },
                    Some(Ok(WsMessage::Close(_))) | None => return SessionEnd::Lost,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("[LIVE] Read error: {}", e);
                        return SessionEnd::Lost;
                    }
                }
            }
        }
    }
}
