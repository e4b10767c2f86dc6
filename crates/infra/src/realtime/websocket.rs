use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tidelink_core::{DuplexTransport, SessionError};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, instrument};

use crate::errors::InfraError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket [`DuplexTransport`] over `tokio-tungstenite`.
///
/// The socket is split after the handshake so the session's listener can
/// block in [`DuplexTransport::receive`] while heartbeats and application
/// messages go out through the write half.
pub struct WebSocketTransport {
    url: String,
    writer: Mutex<Option<SplitSink<WsStream, Message>>>,
    reader: Mutex<Option<SplitStream<WsStream>>>,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), writer: Mutex::new(None), reader: Mutex::new(None) }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn session_error(err: tokio_tungstenite::tungstenite::Error) -> SessionError {
    let InfraError(mapped) = InfraError::from(err);
    SessionError::Transport(mapped.to_string())
}

#[async_trait]
impl DuplexTransport for WebSocketTransport {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn connect(&self) -> Result<(), SessionError> {
        let (stream, response) = connect_async(self.url.as_str()).await.map_err(session_error)?;
        debug!(status = response.status().as_u16(), "WebSocket handshake complete");

        let (writer, reader) = stream.split();
        *self.writer.lock().await = Some(writer);
        *self.reader.lock().await = Some(reader);
        Ok(())
    }

    async fn send(&self, message: &str) -> Result<(), SessionError> {
        let mut writer = self.writer.lock().await;
        let Some(writer) = writer.as_mut() else {
            return Err(SessionError::Transport("WebSocket is not connected".into()));
        };
        writer.send(Message::Text(message.to_string())).await.map_err(session_error)
    }

    async fn receive(&self) -> Result<Option<String>, SessionError> {
        let mut reader = self.reader.lock().await;
        let Some(reader) = reader.as_mut() else {
            return Err(SessionError::Transport("WebSocket is not connected".into()));
        };

        loop {
            match reader.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Binary(bytes))) => {
                    return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "WebSocket close frame received");
                    return Ok(None);
                }
                Some(Err(
                    tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::AlreadyClosed,
                ))
                | None => return Ok(None),
                Some(Err(err)) => return Err(session_error(err)),
            }
        }
    }

    #[instrument(skip(self), fields(url = %self.url))]
    async fn close(&self) -> Result<(), SessionError> {
        let writer = self.writer.lock().await.take();
        // The listener may still hold the read half; it is replaced on the
        // next connect.
        if let Ok(mut reader) = self.reader.try_lock() {
            reader.take();
        }

        let Some(mut writer) = writer else {
            return Ok(());
        };
        match writer.send(Message::Close(None)).await {
            Ok(())
            | Err(
                tokio_tungstenite::tungstenite::Error::ConnectionClosed
                | tokio_tungstenite::tungstenite::Error::AlreadyClosed,
            ) => {}
            Err(err) => return Err(session_error(err)),
        }
        writer.close().await.or_else(|err| match err {
            tokio_tungstenite::tungstenite::Error::ConnectionClosed
            | tokio_tungstenite::tungstenite::Error::AlreadyClosed => Ok(()),
            other => Err(session_error(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    use super::*;

    /// Echoes text frames back; closes after `close_after` messages.
    async fn echo_server(close_after: Option<usize>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();
            let mut seen = 0;
            while let Some(Ok(message)) = ws.next().await {
                if let Message::Text(text) = message {
                    ws.send(Message::Text(format!("echo:{text}"))).await.unwrap();
                    seen += 1;
                    if close_after == Some(seen) {
                        ws.close(None).await.ok();
                        break;
                    }
                }
            }
        });
        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn sends_and_receives_text() {
        let transport = WebSocketTransport::new(echo_server(None).await);
        transport.connect().await.unwrap();

        transport.send("hello").await.unwrap();
        assert_eq!(transport.receive().await.unwrap().as_deref(), Some("echo:hello"));

        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn server_close_reads_as_end_of_stream() {
        let transport = WebSocketTransport::new(echo_server(Some(1)).await);
        transport.connect().await.unwrap();

        transport.send("only").await.unwrap();
        assert_eq!(transport.receive().await.unwrap().as_deref(), Some("echo:only"));
        assert_eq!(transport.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn operations_before_connect_fail() {
        let transport = WebSocketTransport::new("ws://127.0.0.1:9");
        assert!(transport.send("x").await.is_err());
        assert!(transport.receive().await.is_err());
        assert!(transport.close().await.is_ok());
    }

    #[tokio::test]
    async fn refused_handshake_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = WebSocketTransport::new(format!("ws://{addr}"));
        assert!(matches!(transport.connect().await, Err(SessionError::Transport(_))));
    }
}
