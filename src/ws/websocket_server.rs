use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

use crate::daemon::{Endpoint, encode_broadcast};
use crate::error::Result;

pub async fn start_websocket_server(addr: SocketAddr, endpoint: Endpoint) -> Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "WebSocket server listening");
    serve(listener, endpoint).await;
    Ok(())
}

pub async fn serve(listener: TcpListener, endpoint: Endpoint) {
    while let Ok((stream, peer_addr)) = listener.accept().await {
        info!(%peer_addr, "new WebSocket connection");
        tokio::spawn(handle_connection(stream, peer_addr, endpoint.clone()));
    }
}

async fn handle_connection(stream: TcpStream, peer_addr: SocketAddr, endpoint: Endpoint) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer_addr, error = %e, "WebSocket handshake failed");
            return;
        }
    };

    debug!(%peer_addr, "WebSocket handshake completed");

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let mut updates = endpoint.listeners.subscribe();

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                let Some(msg) = msg else { break };
                match msg {
                    Ok(Message::Text(text)) => {
                        if let Some(reply) = endpoint.handle_text(&text).await {
                            if let Err(e) = ws_sender.send(Message::Text(reply)).await {
                                warn!(%peer_addr, error = %e, "failed to send reply");
                                break;
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!(%peer_addr, "connection closed by peer");
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        if let Err(e) = ws_sender.send(Message::Pong(data)).await {
                            warn!(%peer_addr, error = %e, "failed to send pong");
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(%peer_addr, error = %e, "WebSocket error");
                        break;
                    }
                }
            }
            update = updates.recv() => match update {
                Ok(snapshot) => {
                    if let Some(text) = encode_broadcast(snapshot) {
                        if ws_sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                }
                // A slow client only misses intermediate snapshots.
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
        }
    }

    info!(%peer_addr, "WebSocket connection terminated");
}
