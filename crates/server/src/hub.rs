//! Client hub: the per-player outbound transport map.
//!
//! The connection handler registers one bounded outbound channel per
//! identified player; everything else in the server talks to clients
//! through [`ClientHub::send`]. Sends carry a write timeout so a dead
//! client cannot stall the sender, and the two-player fan-out is
//! bounded by a best-effort overall timeout that logs and gives up
//! rather than hanging.

use protocol::PlayerId;
use protocol::messages::ServerMessage;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::warn;

/// Outbound queue depth per client; a slow client that falls this far
/// behind starts eating into the write timeout instead.
pub const OUTBOUND_QUEUE: usize = 64;

struct ClientHandle {
    display_name: String,
    tx: mpsc::Sender<ServerMessage>,
}

pub struct ClientHub {
    clients: RwLock<HashMap<PlayerId, ClientHandle>>,
    write_timeout: Duration,
    fanout_timeout: Duration,
}

impl ClientHub {
    pub fn new(write_timeout: Duration, fanout_timeout: Duration) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            write_timeout,
            fanout_timeout,
        }
    }

    /// Register a player's outbound channel. Refuses a second live
    /// connection for the same player.
    pub fn register(
        &self,
        player_id: &PlayerId,
        display_name: &str,
        tx: mpsc::Sender<ServerMessage>,
    ) -> bool {
        let mut clients = self.clients.write().expect("hub lock poisoned");
        if clients.contains_key(player_id) {
            return false;
        }
        clients.insert(
            player_id.clone(),
            ClientHandle {
                display_name: display_name.to_string(),
                tx,
            },
        );
        true
    }

    pub fn unregister(&self, player_id: &PlayerId) {
        self.clients
            .write()
            .expect("hub lock poisoned")
            .remove(player_id);
    }

    pub fn is_connected(&self, player_id: &PlayerId) -> bool {
        self.clients
            .read()
            .expect("hub lock poisoned")
            .contains_key(player_id)
    }

    pub fn display_name(&self, player_id: &PlayerId) -> Option<String> {
        self.clients
            .read()
            .expect("hub lock poisoned")
            .get(player_id)
            .map(|c| c.display_name.clone())
    }

    fn sender_for(&self, player_id: &PlayerId) -> Option<mpsc::Sender<ServerMessage>> {
        self.clients
            .read()
            .expect("hub lock poisoned")
            .get(player_id)
            .map(|c| c.tx.clone())
    }

    /// Deliver one message to one player, bounded by the write
    /// timeout.
    pub async fn send(&self, player_id: &PlayerId, message: ServerMessage) -> anyhow::Result<()> {
        let Some(tx) = self.sender_for(player_id) else {
            anyhow::bail!("player {} is not connected", player_id);
        };
        match timeout(self.write_timeout, tx.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => anyhow::bail!("player {} outbound channel closed", player_id),
            Err(_) => anyhow::bail!("write to player {} timed out", player_id),
        }
    }

    /// Fan one message out to both players of a session. Best effort:
    /// failures and the overall timeout are logged, never propagated.
    pub async fn send_pair(&self, players: [&PlayerId; 2], message: ServerMessage) {
        let fanout = async {
            for player_id in players {
                if let Err(e) = self.send(player_id, message.clone()).await {
                    warn!("Broadcast to {} failed: {}", player_id, e);
                }
            }
        };
        if timeout(self.fanout_timeout, fanout).await.is_err() {
            warn!(
                "Fan-out to {} and {} exceeded {:?}, giving up",
                players[0], players[1], self.fanout_timeout
            );
        }
    }
}
