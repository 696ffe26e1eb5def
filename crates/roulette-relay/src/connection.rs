//! Per-connection handler: hello handshake, command dispatch, delivery.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use roulette_common::{Outbound, UserId};
use roulette_core::SessionController;

use crate::protocol::{self, ClientFrame, ServerFrame};
use crate::registry::UserRegistry;

/// Handle a single WebSocket connection.
pub async fn handle_connection(
    ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    addr: SocketAddr,
    controller: Arc<SessionController>,
    registry: UserRegistry,
    hello_timeout: Duration,
) {
    let (mut sink, mut stream) = ws.split();

    // 1. Read the hello frame to identify this client.
    let user = match read_hello(&mut stream, addr, hello_timeout).await {
        Some(v) => v,
        None => return,
    };

    // 2. Create our delivery channel and register.
    let (tx, mut rx) = mpsc::channel::<String>(256);
    if let Err(e) = registry.register(user, tx.clone()).await {
        let _ = send_frame(
            &mut sink,
            &ServerFrame::Error {
                message: e.to_string(),
            },
        )
        .await;
        return;
    }

    tracing::info!(peer = %addr, user = %user, "Client registered");

    // 3. Greet. A failure here means the socket is already dead.
    if send_frame(&mut sink, &protocol::welcome(user)).await.is_err() {
        registry.unregister(user, &tx).await;
        return;
    }

    // 4. Dispatch loop.
    loop {
        tokio::select! {
            // Items addressed to this user → their WebSocket.
            Some(json) = rx.recv() => {
                if sink.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }

            // Frames from this client → session controller.
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(ClientFrame::Hello { .. }) => {
                                let _ = send_frame(&mut sink, &ServerFrame::Error {
                                    message: "already identified".into(),
                                }).await;
                            }
                            Ok(ClientFrame::Find) => {
                                deliver(&registry, controller.on_find(user).await).await;
                            }
                            Ok(ClientFrame::Next) => {
                                deliver(&registry, controller.on_next(user).await).await;
                            }
                            Ok(ClientFrame::Stop) => {
                                deliver(&registry, controller.on_stop(user).await).await;
                            }
                            Ok(ClientFrame::Say { content }) => {
                                deliver(&registry, controller.on_message(user, &content).await).await;
                            }
                            Ok(ClientFrame::Help) => {
                                let _ = send_frame(&mut sink, &protocol::help()).await;
                            }
                            Err(e) => {
                                tracing::debug!(peer = %addr, error = %e, "Unparseable frame");
                                let _ = send_frame(&mut sink, &ServerFrame::Error {
                                    message: format!("invalid frame: {e}"),
                                }).await;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %addr, error = %e, "WS error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // 5. Cleanup. The pairing record stays: a waiting or paired user may
    // reconnect and pick up where they left off.
    tracing::info!(peer = %addr, user = %user, "Client disconnected");
    registry.unregister(user, &tx).await;
}

/// Deliver engine outbound items to their recipients.
///
/// Each item is an independent send: a closed or missing recipient is
/// logged and skipped, never allowed to suppress the other items.
async fn deliver(registry: &UserRegistry, items: Vec<Outbound>) {
    for item in items {
        let json = match serde_json::to_string(&protocol::frame_for(&item)) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(to = %item.to, error = %e, "Frame serialization failed");
                continue;
            }
        };
        match registry.sender(item.to).await {
            Some(tx) => {
                if tx.send(json).await.is_err() {
                    tracing::debug!(to = %item.to, "Recipient channel closed");
                }
            }
            None => {
                tracing::debug!(to = %item.to, "Recipient not connected, dropping item");
            }
        }
    }
}

/// Read and parse the first frame as a hello.
async fn read_hello(
    stream: &mut futures_util::stream::SplitStream<
        tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    >,
    addr: SocketAddr,
    timeout: Duration,
) -> Option<UserId> {
    let frame = tokio::time::timeout(timeout, stream.next()).await;

    match frame {
        Ok(Some(Ok(Message::Text(text)))) => match serde_json::from_str::<ClientFrame>(&text) {
            Ok(ClientFrame::Hello { user_id }) => Some(UserId::new(user_id)),
            Ok(_) => {
                tracing::warn!(peer = %addr, "First frame was not a hello");
                None
            }
            Err(e) => {
                tracing::warn!(peer = %addr, error = %e, "Invalid hello frame");
                None
            }
        },
        Ok(Some(Ok(_))) => {
            tracing::warn!(peer = %addr, "Expected text hello, got binary");
            None
        }
        Ok(Some(Err(e))) => {
            tracing::warn!(peer = %addr, error = %e, "WS error during hello");
            None
        }
        Ok(None) => {
            tracing::debug!(peer = %addr, "Connection closed before hello");
            None
        }
        Err(_) => {
            tracing::warn!(peer = %addr, "Hello timeout ({}s)", timeout.as_secs());
            None
        }
    }
}

/// Send a ServerFrame as a JSON text frame.
async fn send_frame(
    sink: &mut futures_util::stream::SplitSink<
        tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
        Message,
    >,
    frame: &ServerFrame,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let json = serde_json::to_string(frame).unwrap_or_else(|_| {
        r#"{"type":"error","message":"internal serialization failure"}"#.to_string()
    });
    sink.send(Message::Text(json.into())).await
}
