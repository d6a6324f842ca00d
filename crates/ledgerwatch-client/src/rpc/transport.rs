//! Socket transport for the monitor loop
//!
//! [`Transport`] is the seam between the monitor loop and the network: a
//! send primitive and a receive primitive bounded by a timeout. The
//! production implementation is [`SocketClient`], a single WebSocket
//! connection. Tests substitute a scripted transport.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace};

use super::ClientError;

/// A message-oriented connection with a bounded receive
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Write one serialized request
    async fn send(&mut self, frame: String) -> Result<(), ClientError>;

    /// Wait up to `timeout` for the next decoded message
    ///
    /// Returns `Ok(None)` if nothing arrived in time (an empty poll).
    async fn recv(&mut self, timeout: Duration) -> Result<Option<Value>, ClientError>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Client for a single persistent WebSocket connection
///
/// The connection is opened once with [`SocketClient::open`] and then used
/// for the rest of the client's life. There is no reconnect: once the
/// server goes away every call fails.
///
/// # Example
///
/// ```ignore
/// let mut client = SocketClient::new("wss://s.altnet.rippletest.net:51233");
/// client.open().await?;
/// client.send(r#"{"command":"server_info","id":1}"#.to_string()).await?;
/// let reply = client.recv(Duration::from_millis(200)).await?;
/// ```
#[derive(Debug)]
pub struct SocketClient {
    url: String,
    stream: Option<WsStream>,
}

impl SocketClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stream: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Establish the WebSocket connection
    ///
    /// Calling `open` on an already open client does nothing.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::ConnectionFailed` if the TCP connection, TLS
    /// setup or WebSocket handshake fails.
    pub async fn open(&mut self) -> Result<(), ClientError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let (stream, response) =
            connect_async(self.url.as_str())
                .await
                .map_err(|source| ClientError::ConnectionFailed {
                    url: self.url.clone(),
                    source,
                })?;

        info!(url = %self.url, status = %response.status(), "WebSocket connected");
        self.stream = Some(stream);
        Ok(())
    }
}

impl Transport for SocketClient {
    async fn send(&mut self, frame: String) -> Result<(), ClientError> {
        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;
        stream
            .send(Message::Text(frame.into()))
            .await
            .map_err(ClientError::SendFailed)
    }

    async fn recv(&mut self, timeout: Duration) -> Result<Option<Value>, ClientError> {
        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;
        // Control frames do not restart the wait
        let deadline = Instant::now() + timeout;

        loop {
            let message = match timeout_at(deadline, stream.next()).await {
                Err(_) => return Ok(None),
                Ok(None) => return Err(ClientError::ConnectionClosed),
                Ok(Some(message)) => message.map_err(ClientError::ReceiveFailed)?,
            };

            let decoded = match message {
                Message::Text(text) => serde_json::from_str::<Value>(text.as_str()),
                Message::Binary(bytes) => serde_json::from_slice::<Value>(&bytes),
                Message::Close(frame) => {
                    debug!(?frame, "Server closed the WebSocket");
                    return Err(ClientError::ConnectionClosed);
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            };

            let value = decoded.map_err(ClientError::DeserializeFailed)?;
            trace!(message = %value, "Inbound frame");
            return Ok(Some(value));
        }
    }
}
