//! WebSocket transport over `tokio-tungstenite`.
//!
//! [`WsTransport::open`] performs the client handshake, then spawns a pump
//! task that bridges the socket channels and the WebSocket stream until
//! either side closes.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, instrument, warn};
use tungstenite::protocol::CloseFrame;

use crate::error::{CloseCode, SessionResult};
use crate::message::Message;
use crate::transport::{BoxFuture, Outbound, PeerHandle, Socket, SocketPeer, Transport};

/// The default transport: real WebSockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl WsTransport {
    /// Create a new transport.
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WsTransport {
    fn open(&self, url: &str) -> BoxFuture<'static, SessionResult<Socket>> {
        let url = url.to_string();
        Box::pin(async move {
            let (stream, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
            let (socket, peer) = Socket::pair();
            peer.handle().mark_open();
            debug!(socket_id = %socket.id(), url = %url, "WebSocket open");
            tokio::spawn(pump(stream, peer));
            Ok(socket)
        })
    }
}

/// Bridge one WebSocket stream and its socket channels.
#[instrument(skip_all, fields(socket_id = %peer.handle().id()))]
async fn pump<S>(stream: WebSocketStream<S>, peer: SocketPeer)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (handle, mut outbound) = peer.into_parts();
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            request = outbound.recv() => match request {
                Some(Outbound::Message(message)) => {
                    if let Err(e) = sink.send(tungstenite::Message::from(message)).await {
                        warn!(error = %e, "Failed to send frame");
                        handle.fail(e.to_string());
                        handle.closed(Some(CloseCode::Abnormal.as_u16()), e.to_string());
                        break;
                    }
                }
                Some(Outbound::Close { code, reason }) => {
                    let frame = CloseFrame {
                        code: code.into(),
                        reason: reason.clone().into(),
                    };
                    if let Err(e) = sink.send(tungstenite::Message::Close(Some(frame))).await {
                        debug!(error = %e, "Close frame not delivered");
                    }
                    let _ = sink.close().await;
                    handle.closed(Some(code), reason);
                    break;
                }
                None => {
                    let _ = sink.close().await;
                    handle.closed(Some(CloseCode::Normal.as_u16()), "socket released");
                    break;
                }
            },
            frame = source.next() => match frame {
                Some(Ok(tungstenite::Message::Close(frame))) => {
                    report_close(&handle, frame);
                    break;
                }
                Some(Ok(frame)) => {
                    if let Some(message) = Message::from_frame(frame) {
                        handle.deliver(message);
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error");
                    handle.fail(e.to_string());
                    handle.closed(Some(CloseCode::Abnormal.as_u16()), e.to_string());
                    break;
                }
                None => {
                    handle.closed(Some(CloseCode::Abnormal.as_u16()), "stream ended");
                    break;
                }
            },
        }
    }

    debug!("WebSocket pump finished");
}

fn report_close(handle: &PeerHandle, frame: Option<CloseFrame>) {
    match frame {
        Some(frame) => {
            debug!(close_code = u16::from(frame.code), "Received close frame");
            handle.closed(Some(frame.code.into()), frame.reason.to_string());
        }
        None => {
            handle.closed(None, "");
        }
    }
}
