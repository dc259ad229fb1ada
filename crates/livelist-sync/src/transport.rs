// File: livelist-sync/src/transport.rs
// Purpose: WebSocket push channel feeding the message bus, with reconnection

use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::bus::MessageBus;
use crate::config::LiveListConfig;
use crate::error::{Result, SyncError};
use crate::event::PushFrame;

/// Observable state of the push connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    /// Lost or refused; a reconnect is scheduled
    Disconnected,
    /// Shut down or out of reconnect attempts
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushChannelConfig {
    pub url: String,
    pub token: Option<String>,
    pub reconnect_delay: Duration,
    /// 0 means retry forever
    pub max_reconnect_attempts: u32,
}

impl PushChannelConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_attempts: 0,
        }
    }

    /// URL actually dialled, with the token as a `token` query parameter
    pub fn connect_url(&self) -> String {
        match self.token.as_deref().filter(|token| !token.is_empty()) {
            Some(token) => {
                let separator = if self.url.contains('?') { '&' } else { '?' };
                format!("{}{}token={}", self.url, separator, urlencoding::encode(token))
            }
            None => self.url.clone(),
        }
    }
}

impl From<&LiveListConfig> for PushChannelConfig {
    fn from(config: &LiveListConfig) -> Self {
        Self {
            url: config.push_url(),
            token: config.api.token.clone(),
            reconnect_delay: config.push.reconnect_delay(),
            max_reconnect_attempts: config.push.max_reconnect_attempts,
        }
    }
}

/// How one connection ended
enum SessionEnd {
    Shutdown,
    Closed,
}

/// Background task owning the push connection.
///
/// Every text frame, and every binary frame, is published to the bus
/// untouched; decoding happens in each view.
pub struct PushChannel {
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
    status: watch::Receiver<ConnectionStatus>,
}

impl PushChannel {
    pub fn spawn(config: PushChannelConfig, bus: MessageBus) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);

        let task = tokio::spawn(run(config, bus, shutdown_rx, status_tx));

        Self {
            task,
            shutdown: shutdown_tx,
            status: status_rx,
        }
    }

    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Close the connection and wait for the task to end
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!("Push channel task failed: {}", e);
        }
    }
}

async fn run(
    config: PushChannelConfig,
    bus: MessageBus,
    mut shutdown: watch::Receiver<bool>,
    status: watch::Sender<ConnectionStatus>,
) {
    let url = config.connect_url();
    let mut failed_attempts: u32 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        status.send_replace(ConnectionStatus::Connecting);
        match session(&url, &config.url, &bus, &mut shutdown, &status).await {
            Ok(SessionEnd::Shutdown) => break,
            Ok(SessionEnd::Closed) => {
                tracing::info!(url = %config.url, "Push connection closed by server");
                failed_attempts = 0;
            }
            Err(e) => {
                tracing::error!(url = %config.url, error = %e, "Push connection failed");
                failed_attempts += 1;
            }
        }

        status.send_replace(ConnectionStatus::Disconnected);

        if config.max_reconnect_attempts > 0 && failed_attempts >= config.max_reconnect_attempts {
            tracing::warn!(
                attempts = failed_attempts,
                "Giving up on push connection after too many failed attempts"
            );
            break;
        }

        tracing::debug!("Reconnecting push channel in {:?}", config.reconnect_delay);
        let stop = tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay) => false,
            changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
        };
        if stop {
            break;
        }
    }

    status.send_replace(ConnectionStatus::Stopped);
    tracing::debug!("Push channel stopped");
}

/// One connection, from handshake to close
async fn session(
    url: &str,
    display_url: &str,
    bus: &MessageBus,
    shutdown: &mut watch::Receiver<bool>,
    status: &watch::Sender<ConnectionStatus>,
) -> Result<SessionEnd> {
    let (stream, _) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| SyncError::Transport(e.to_string()))?;

    tracing::info!(url = %display_url, "Push channel connected");
    status.send_replace(ConnectionStatus::Connected);

    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                // A dropped sender also means shut down
                if changed.is_err() || *shutdown.borrow() {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(SessionEnd::Shutdown);
                }
            }
            message = read.next() => {
                let message = match message {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => return Err(SyncError::Transport(e.to_string())),
                    None => return Ok(SessionEnd::Closed),
                };

                match message {
                    Message::Text(text) => {
                        let receivers = bus.publish(PushFrame::text(text.as_str()));
                        tracing::trace!(receivers, "Push frame published");
                    }
                    Message::Binary(bytes) => {
                        bus.publish(PushFrame::binary(bytes.to_vec()));
                    }
                    Message::Close(frame) => {
                        tracing::debug!(?frame, "Close frame received");
                        return Ok(SessionEnd::Closed);
                    }
                    // Pongs are answered by tungstenite itself
                    Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
                }
            }
        }
    }
}
