//! WebSocket client transport.
//!
//! Connects with `tokio_tungstenite::connect_async` and adapts the split
//! stream halves to [`FrameWriter`] / [`FrameReader`]. Only text frames
//! reach the channel; ping/pong are answered by tungstenite and binary
//! frames are skipped.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tracing::{debug, trace};

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};

use super::{Connector, FrameReader, FrameWriter, Link};

// ============================================================================
// WsConnector
// ============================================================================

/// Connector for `ws://` and `wss://` endpoints.
///
/// `wss://` requires the `tls` cargo feature; without it the connect
/// fails and the channel keeps retrying.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl WsConnector {
    /// Builds the handshake request, adding `Sec-WebSocket-Protocol` when a
    /// subprotocol is requested.
    ///
    /// # Errors
    ///
    /// - [`Error::WebSocket`] if the endpoint cannot form a request
    /// - [`Error::Config`] if the protocol is not a valid header value
    pub fn build_request(endpoint: &Endpoint, protocol: Option<&str>) -> Result<Request> {
        let mut request = endpoint.as_str().into_client_request()?;

        if let Some(protocol) = protocol {
            let value = HeaderValue::from_str(protocol)
                .map_err(|e| Error::config(format!("Invalid subprotocol '{protocol}': {e}")))?;
            request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
        }

        Ok(request)
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, endpoint: &Endpoint, protocol: Option<&str>) -> Result<Link> {
        let request = Self::build_request(endpoint, protocol)?;
        let (ws_stream, response) = tokio_tungstenite::connect_async(request).await?;

        debug!(%endpoint, status = %response.status(), "WebSocket handshake completed");

        Ok(split(ws_stream))
    }
}

// ============================================================================
// Stream Halves
// ============================================================================

/// Splits an established WebSocket stream into channel frame halves.
///
/// Works for client streams and for streams accepted on the server side.
pub fn split<S>(ws_stream: WebSocketStream<S>) -> Link
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sink, stream) = ws_stream.split();
    (Box::new(WsWriter { sink }), Box::new(WsReader { stream }))
}

/// Write half over a tungstenite sink.
struct WsWriter<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
}

#[async_trait]
impl<S> FrameWriter for WsWriter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.sink.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.sink.close().await?;
        Ok(())
    }
}

/// Read half over a tungstenite stream.
struct WsReader<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

#[async_trait]
impl<S> FrameReader for WsReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn next_text(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),

                Ok(Message::Close(frame)) => {
                    trace!(?frame, "Close frame received");
                    return None;
                }

                // Ignore Binary, Ping, Pong, raw frames
                Ok(_) => {}

                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::net::TcpListener;

    #[test]
    fn test_build_request_plain() {
        let endpoint = Endpoint::parse("ws://127.0.0.1:9000/chat/1/").unwrap();
        let request = WsConnector::build_request(&endpoint, None).unwrap();

        assert_eq!(request.uri().to_string(), "ws://127.0.0.1:9000/chat/1/");
        assert!(request.headers().get(SEC_WEBSOCKET_PROTOCOL).is_none());
    }

    #[test]
    fn test_build_request_with_protocol() {
        let endpoint = Endpoint::parse("ws://127.0.0.1:9000/chat/1/").unwrap();
        let request = WsConnector::build_request(&endpoint, Some("chat.v1")).unwrap();

        assert_eq!(
            request.headers().get(SEC_WEBSOCKET_PROTOCOL).unwrap(),
            "chat.v1"
        );
    }

    #[test]
    fn test_build_request_rejects_bad_protocol() {
        let endpoint = Endpoint::parse("ws://127.0.0.1:9000/").unwrap();
        let err = WsConnector::build_request(&endpoint, Some("bad\nvalue")).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_connect_refused_is_error() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let endpoint = Endpoint::parse(&format!("ws://127.0.0.1:{port}/")).unwrap();
        let result = WsConnector.connect(&endpoint, None).await;

        assert!(result.is_err());
        assert!(result.err().unwrap().is_connection_error());
    }

    #[tokio::test]
    async fn test_text_round_trip_skips_binary() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await?;
            let mut ws = tokio_tungstenite::accept_async(stream).await?;
            ws.send(Message::Binary(vec![1, 2, 3].into())).await?;
            ws.send(Message::Text("hello".into())).await?;

            let reply = ws.next().await.expect("client reply")?;
            assert_eq!(reply.into_text()?.as_str(), "world");
            ws.close(None).await?;
            anyhow::Ok(())
        });

        let endpoint = Endpoint::parse(&format!("ws://127.0.0.1:{port}/chat/"))?;
        let (mut writer, mut reader) = WsConnector.connect(&endpoint, None).await?;

        assert_eq!(reader.next_text().await.expect("text frame")?, "hello");
        writer.send_text("world".to_owned()).await?;
        assert!(reader.next_text().await.is_none());

        server.await??;
        Ok(())
    }
}
