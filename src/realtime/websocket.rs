//! Websocket transport.
//!
//! JSON text frames `{"event": ..., "data": ...}` over a websocket opened with
//! an `Authorization: Bearer` header. Each session runs a reader task and a
//! writer task; dropping the session's outbound sender closes the socket.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

use crate::interfaces::transport::{
    DisconnectReason, Frame, RealtimeTransport, Result, TransportError, TransportEvent,
    TransportSession,
};

const SESSION_BUFFER: usize = 256;

/// Opens websocket sessions against one URL.
pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Decode a text payload into a frame.
pub fn parse_frame(text: &str) -> std::result::Result<Frame, serde_json::Error> {
    serde_json::from_str(text)
}

#[async_trait]
impl RealtimeTransport for WebSocketTransport {
    #[tracing::instrument(name = "ws.open", skip(self, token), fields(url = %self.url))]
    async fn open(&self, token: Option<&str>) -> Result<TransportSession> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?;

        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| TransportError::Handshake(e.to_string()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (socket, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| match e {
                WsError::Http(response) => {
                    TransportError::Handshake(format!("HTTP {}", response.status()))
                }
                WsError::Url(e) => TransportError::InvalidEndpoint(e.to_string()),
                other => TransportError::Connection(other.to_string()),
            })?;
        info!("Websocket connected");

        let (mut sink, mut stream) = socket.split();
        let (inbound_tx, inbound_rx) = mpsc::channel(SESSION_BUFFER);
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Frame>(SESSION_BUFFER);

        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(event = %frame.event, error = %e, "Failed to encode frame");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    debug!(error = %e, "Websocket write failed");
                    return;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            let reason = loop {
                let text = match stream.next().await {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => text,
                        Err(_) => {
                            warn!("Dropping non-UTF-8 binary frame");
                            continue;
                        }
                    },
                    Some(Ok(Message::Close(close))) => {
                        debug!(?close, "Server closed websocket");
                        break DisconnectReason::ServerInitiated;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break DisconnectReason::Transport(e.to_string()),
                    None => break DisconnectReason::Transport("stream ended".to_string()),
                };

                match parse_frame(&text) {
                    Ok(frame) => {
                        if inbound_tx.send(TransportEvent::Frame(frame)).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!(error = %e, "Dropping malformed websocket frame"),
                }
            };
            let _ = inbound_tx.send(TransportEvent::Closed(reason)).await;
        });

        Ok(TransportSession {
            inbound: inbound_rx,
            outbound: outbound_tx,
        })
    }

    fn name(&self) -> &str {
        "websocket"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame() {
        let frame = parse_frame(r#"{"event":"eta:updated","data":{"assignmentId":1}}"#).unwrap();
        assert_eq!(frame.event, "eta:updated");
        assert_eq!(frame.data["assignmentId"], 1);
    }

    #[test]
    fn test_parse_frame_without_data() {
        let frame = parse_frame(r#"{"event":"ping"}"#).unwrap();
        assert!(frame.data.is_null());
    }

    #[test]
    fn test_parse_frame_rejects_garbage() {
        assert!(parse_frame("hello").is_err());
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected() {
        let transport = WebSocketTransport::new("not a url");
        assert!(matches!(
            transport.open(None).await,
            Err(TransportError::InvalidEndpoint(_))
        ));
    }
}
