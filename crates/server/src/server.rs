//! WebSocket transport.
//!
//! One task per connection. The first frame must be an `identify`
//! message; after that the loop multiplexes inbound frames, the
//! player's outbound queue and the shutdown signal. Moves are handled
//! inline on the read path, so one player's moves reach the engine in
//! the order the transport delivered them.

use crate::config::Config;
use crate::engine::Engine;
use crate::hub::{ClientHub, OUTBOUND_QUEUE};
use crate::store::{JsonlMatchStore, TextLibrary};
use futures_util::{SinkExt, StreamExt};
use protocol::PlayerId;
use protocol::messages::{ClientMessage, ErrorReply, ServerMessage};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::{WebSocketStream, accept_async, tungstenite::Message};
use tracing::{error, info, warn};

/// How long a fresh connection gets to send its identify frame.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection tracking state (shared across connection handlers).
struct ConnectionState {
    ip_connections: HashMap<IpAddr, usize>,
    total_connections: usize,
}

impl ConnectionState {
    fn new() -> Self {
        Self {
            ip_connections: HashMap::new(),
            total_connections: 0,
        }
    }

    /// Try to add a connection, returns true if allowed.
    fn try_add_connection(&mut self, ip: IpAddr, max_total: usize, max_per_ip: usize) -> bool {
        if self.total_connections >= max_total {
            return false;
        }
        let current = self.ip_connections.get(&ip).copied().unwrap_or(0);
        if current >= max_per_ip {
            return false;
        }
        *self.ip_connections.entry(ip).or_insert(0) += 1;
        self.total_connections += 1;
        true
    }

    fn remove_connection(&mut self, ip: IpAddr) {
        if let Some(count) = self.ip_connections.get_mut(&ip) {
            if *count > 0 {
                *count -= 1;
                self.total_connections = self.total_connections.saturating_sub(1);
            }
            if *count == 0 {
                self.ip_connections.remove(&ip);
            }
        }
    }
}

/// Run the session server until the shutdown signal flips.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on ws://{}", addr);

    let hub = Arc::new(ClientHub::new(
        config.broadcast.write_timeout(),
        config.broadcast.fanout_timeout(),
    ));
    let store = Arc::new(JsonlMatchStore::new(&config.text.results_path));
    let texts = TextLibrary::load(Path::new(&config.text.dir));

    let max_connections = config.server.max_connections;
    let ip_limit = config.server.ip_limit;

    let engine = Arc::new(Engine::new(config, Arc::clone(&hub), store, texts));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    engine.spawn_tickers(shutdown_rx.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let conn_state = Arc::new(Mutex::new(ConnectionState::new()));
    let mut shutdown = shutdown_rx.clone();

    loop {
        let (stream, addr) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = shutdown.changed() => {
                info!("Accept loop stopped");
                return Ok(());
            }
        };
        let ip = addr.ip();

        {
            let mut state = conn_state.lock().await;
            if !state.try_add_connection(ip, max_connections, ip_limit) {
                warn!("Connection rejected (limit reached): {}", addr);
                continue;
            }
        }

        let engine = Arc::clone(&engine);
        let hub = Arc::clone(&hub);
        let conn_state = Arc::clone(&conn_state);
        let shutdown = shutdown_rx.clone();

        tokio::spawn(async move {
            let result = handle_connection(stream, addr, engine, hub, shutdown).await;
            conn_state.lock().await.remove_connection(ip);
            if let Err(e) = result {
                error!("Connection error from {}: {}", addr, e);
            }
        });
    }
}

type WsSink = futures_util::stream::SplitSink<WebSocketStream<TcpStream>, Message>;

async fn send_json(write: &mut WsSink, message: &ServerMessage) -> anyhow::Result<()> {
    let json = serde_json::to_string(message)?;
    write.send(Message::Text(json.into())).await?;
    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    engine: Arc<Engine>,
    hub: Arc<ClientHub>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New connection from {}", addr);

    let (mut write, mut read) = ws_stream.split();

    // Identify phase: the first frame names the player or the
    // connection is dropped.
    let first = match timeout(IDENTIFY_TIMEOUT, read.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(_))) | Ok(None) | Err(_) => {
            warn!("Connection from {} never identified", addr);
            return Ok(());
        }
        Ok(Some(Err(e))) => return Err(e.into()),
    };
    let (player_id, display_name) = match serde_json::from_str::<ClientMessage>(&first) {
        Ok(ClientMessage::Identify {
            player_id,
            display_name,
        }) => (player_id, display_name),
        _ => {
            send_json(
                &mut write,
                &ServerMessage::Error(ErrorReply::new("identify_required")),
            )
            .await?;
            return Ok(());
        }
    };

    let (tx, mut rx) = mpsc::channel::<ServerMessage>(OUTBOUND_QUEUE);
    if !hub.register(&player_id, &display_name, tx) {
        warn!("Duplicate connection for player {} from {}", player_id, addr);
        send_json(
            &mut write,
            &ServerMessage::Error(ErrorReply::new("already_connected")),
        )
        .await?;
        return Ok(());
    }
    info!("Player {} identified from {}", player_id, addr);

    let ack = ServerMessage::Identified {
        player_id: player_id.clone(),
    };
    let result = match send_json(&mut write, &ack).await {
        Ok(()) => {
            connection_loop(&mut write, &mut read, &mut rx, &mut shutdown, &engine, &player_id)
                .await
        }
        Err(e) => Err(e),
    };

    // Cleanup runs for every exit path: hub slot, queue/proposal
    // membership, running session.
    engine.handle_disconnect(&player_id).await;
    result
}

async fn connection_loop(
    write: &mut WsSink,
    read: &mut futures_util::stream::SplitStream<WebSocketStream<TcpStream>>,
    rx: &mut mpsc::Receiver<ServerMessage>,
    shutdown: &mut watch::Receiver<bool>,
    engine: &Arc<Engine>,
    player_id: &PlayerId,
) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(message) => {
                                if let Err(e) = engine.handle_message(player_id, message).await {
                                    send_json(write, &ServerMessage::Error(e.reply())).await?;
                                }
                            }
                            Err(e) => {
                                warn!("Malformed message from {}: {}", player_id, e);
                                send_json(
                                    write,
                                    &ServerMessage::Error(ErrorReply::new("malformed_message")),
                                )
                                .await?;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Player {} closed the connection", player_id);
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error from {}: {}", player_id, e);
                        return Ok(());
                    }
                    None => return Ok(()),
                    _ => {}
                }
            }
            outbound = rx.recv() => {
                match outbound {
                    Some(message) => send_json(write, &message).await?,
                    None => return Ok(()),
                }
            }
            _ = shutdown.changed() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_limits() {
        let mut state = ConnectionState::new();
        let ip1: IpAddr = "10.0.0.1".parse().unwrap();
        let ip2: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(state.try_add_connection(ip1, 3, 2));
        assert!(state.try_add_connection(ip1, 3, 2));
        // Per-IP cap.
        assert!(!state.try_add_connection(ip1, 3, 2));
        assert!(state.try_add_connection(ip2, 3, 2));
        // Total cap.
        assert!(!state.try_add_connection(ip2, 3, 2));

        state.remove_connection(ip1);
        assert!(state.try_add_connection(ip2, 3, 2));
        assert_eq!(state.total_connections, 3);

        // Removing an unknown IP is harmless.
        state.remove_connection("10.9.9.9".parse().unwrap());
        assert_eq!(state.total_connections, 3);
    }
}
