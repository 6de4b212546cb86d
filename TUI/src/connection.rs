//! Socket lifecycle for the chat server.
//!
//! The socket runs on its own tokio task. Everything it observes is reported
//! to the app as a [`SocketEvent`] over a channel; outbound frames travel the
//! other way over a second channel. There is no reconnect: once the task has
//! reported [`SocketEvent::Closed`] the connection is finished.

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{ClientError, Result};
use crate::protocol::ClientMessage;

/// Everything the socket task reports back to the app, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Opened,
    Message(String),
    Error(String),
    Closed {
        clean: bool,
        code: Option<u16>,
        reason: String,
    },
}

/// Connection status as seen by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Connecting,
    Open,
    ClosedClean,
    ClosedError,
}

impl ConnectionStatus {
    /// Transition on a socket event. Both closed states are terminal.
    pub fn apply(self, event: &SocketEvent) -> Self {
        use ConnectionStatus::*;

        match (self, event) {
            (ClosedClean | ClosedError, _) => self,
            (_, SocketEvent::Opened) => Open,
            (_, SocketEvent::Closed { clean: true, .. }) => ClosedClean,
            (_, SocketEvent::Closed { clean: false, .. }) => ClosedError,
            (status, SocketEvent::Message(_) | SocketEvent::Error(_)) => status,
        }
    }

    pub fn is_open(self) -> bool {
        self == ConnectionStatus::Open
    }

    pub fn is_closed(self) -> bool {
        matches!(self, ConnectionStatus::ClosedClean | ConnectionStatus::ClosedError)
    }

    pub fn label(self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Open => "connected",
            ConnectionStatus::ClosedClean => "closed",
            ConnectionStatus::ClosedError => "disconnected",
        }
    }
}

/// Socket endpoint for a page URL: `https` pages get `wss`, everything else `ws`.
pub fn socket_url(page: &Url, path: &str) -> Result<Url> {
    let scheme = match page.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(ClientError::InvalidUrl(format!(
                "page URL must use http:// or https:// scheme, got: {}",
                other
            )))
        }
    };

    let host = page
        .host_str()
        .ok_or_else(|| ClientError::InvalidUrl(format!("page URL has no host: {}", page)))?;
    let authority = match page.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };

    Ok(Url::parse(&format!("{}://{}{}", scheme, authority, path))?)
}

/// Handle to a running socket task.
pub struct Connection {
    url: Url,
    outbound: mpsc::UnboundedSender<Message>,
    task: JoinHandle<()>,
}

impl Connection {
    /// Start connecting in the background. Progress arrives on `events`.
    pub fn spawn(
        url: Url,
        connect_timeout: Duration,
        events: mpsc::UnboundedSender<SocketEvent>,
    ) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let task_url = url.clone();
        let task = tokio::spawn(async move {
            run(task_url, connect_timeout, outbound_rx, events).await;
        });

        Self { url, outbound, task }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Queue a message for the writer.
    pub fn send(&self, message: &ClientMessage) -> Result<()> {
        let text = message.encode()?;
        self.outbound
            .send(Message::Text(text.into()))
            .map_err(|_| ClientError::NotConnected)
    }

    /// Send a close frame and wait up to `grace` for the closing handshake.
    /// The final `Closed` event arrives on the channel before this returns,
    /// unless the peer never answers.
    pub async fn close(mut self, grace: Duration) {
        if self.outbound.send(Message::Close(None)).is_err() {
            return;
        }
        if timeout(grace, &mut self.task).await.is_err() {
            warn!("peer did not finish closing {} within {:?}", self.url, grace);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn report_failure(events: &mpsc::UnboundedSender<SocketEvent>, message: String) {
    let _ = events.send(SocketEvent::Error(message.clone()));
    let _ = events.send(SocketEvent::Closed {
        clean: false,
        code: None,
        reason: message,
    });
}

async fn run(
    url: Url,
    connect_timeout: Duration,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    events: mpsc::UnboundedSender<SocketEvent>,
) {
    info!("connecting to {}", url);

    let stream = match timeout(connect_timeout, connect_async(url.as_str())).await {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(err)) => {
            error!("connect to {} failed: {}", url, err);
            report_failure(&events, ClientError::WebSocket(err.to_string()).to_string());
            return;
        }
        Err(_) => {
            error!("connect to {} timed out", url);
            let err = ClientError::Timeout(format!("connection timeout after {:?}", connect_timeout));
            report_failure(&events, err.to_string());
            return;
        }
    };

    info!("connection to {} opened", url);
    if events.send(SocketEvent::Opened).is_err() {
        return;
    }

    let (mut writer, mut reader) = stream.split();

    loop {
        tokio::select! {
            frame = reader.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    debug!("received {} bytes", text.len());
                    if events.send(SocketEvent::Message(text.to_string())).is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (Some(u16::from(f.code)), f.reason.to_string()))
                        .unwrap_or((None, String::new()));
                    info!("connection closed by peer: {:?} {}", code, reason);
                    let _ = events.send(SocketEvent::Closed { clean: true, code, reason });
                    break;
                }
                Some(Ok(Message::Ping(payload))) => {
                    debug!("received ping ({} bytes)", payload.len());
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!("websocket read error on {}: {}", url, err);
                    report_failure(&events, err.to_string());
                    break;
                }
                None => {
                    warn!("connection to {} ended without close frame", url);
                    let _ = events.send(SocketEvent::Closed {
                        clean: false,
                        code: None,
                        reason: String::new(),
                    });
                    break;
                }
            },
            outgoing = outbound.recv() => match outgoing {
                Some(message) => {
                    if message.is_close() {
                        info!("closing connection to {}", url);
                    }
                    if let Err(err) = writer.send(message).await {
                        warn!("websocket write error on {}: {}", url, err);
                        report_failure(&events, err.to_string());
                        break;
                    }
                }
                // Handle dropped; the task is about to be aborted anyway.
                None => break,
            },
        }
    }
}
