use crate::types::Result;
use async_trait::async_trait;
use futures::stream::StreamExt;
use futures::SinkExt;
use std::borrow::Cow;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// One inbound frame as seen by a stream controller.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// A text frame; always expected to be JSON.
    Text(String),
    /// The transport closed, by the server or by a read error.
    Closed {
        code: Option<u16>,
        reason: String,
    },
}

/// Write half of an open socket.
#[async_trait]
pub trait SocketSink: Send {
    async fn send_text(&mut self, text: &str) -> Result<()>;
    async fn close(&mut self, code: u16, reason: &str) -> Result<()>;
}

/// Creates socket connections. The production impl speaks tungstenite; tests
/// use [`MockTransport`](crate::socket::MockTransport).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens a connection and resolves once the handshake completes, yielding
    /// the write half and a stream of inbound frames. The frame channel ends
    /// when the connection does.
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn SocketSink>, mpsc::Receiver<InboundFrame>)>;
}

/// Production transport over tokio-tungstenite.
#[derive(Debug, Default)]
pub struct TungsteniteTransport;

struct TungsteniteSink {
    write: futures::stream::SplitSink<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
        Message,
    >,
}

#[async_trait]
impl SocketSink for TungsteniteSink {
    async fn send_text(&mut self, text: &str) -> Result<()> {
        self.write.send(Message::Text(text.to_string())).await?;
        Ok(())
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: Cow::Owned(reason.to_string()),
        };
        self.write.send(Message::Close(Some(frame))).await?;
        Ok(())
    }
}

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn SocketSink>, mpsc::Receiver<InboundFrame>)> {
        let (ws_stream, _response) = tokio_tungstenite::connect_async(url).await?;
        let (write, mut read) = ws_stream.split();

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            while let Some(msg_result) = read.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => {
                        tracing::debug!("received text frame: {}", text);
                        if tx.send(InboundFrame::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        let (code, reason) = match frame {
                            Some(f) => (Some(u16::from(f.code)), f.reason.to_string()),
                            None => (None, String::new()),
                        };
                        tracing::debug!("socket closed: code={:?} reason={:?}", code, reason);
                        let _ = tx.send(InboundFrame::Closed { code, reason }).await;
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        tracing::debug!("received ping ({} bytes)", data.len());
                    }
                    Ok(Message::Pong(data)) => {
                        tracing::debug!("received pong ({} bytes)", data.len());
                    }
                    Ok(Message::Binary(data)) => {
                        tracing::warn!("unexpected binary frame ({} bytes)", data.len());
                    }
                    Ok(Message::Frame(_)) => {}
                    Err(e) => {
                        tracing::error!("socket read error: {}", e);
                        let _ = tx
                            .send(InboundFrame::Closed {
                                code: None,
                                reason: format!("read error: {}", e),
                            })
                            .await;
                        break;
                    }
                }
            }
        });

        Ok((Box::new(TungsteniteSink { write }), rx))
    }
}
