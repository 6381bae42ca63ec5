//! Pre-play countdown barrier.
//!
//! Every session starts with `active = true`, which
//! [`Session::process_move`](super::Session::process_move) treats as
//! an authoritative block regardless of whether the broadcast
//! sequence has begun. Once both clients report ready, [`run`] drives
//! the 3-2-1 ticks and the terminal GO, then flips `active` off.

use super::Session;
use crate::hub::ClientHub;
use protocol::messages::{CountdownValue, ServerMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::info;

/// Whether the pre-play barrier is still holding moves back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownState {
    /// Guard flag: the broadcast sequence has been triggered. Checked
    /// under the session lock so racing ready events start it at most
    /// once.
    pub started: bool,
    /// While true, no move mutates player state.
    pub active: bool,
    pub ticks_remaining: u8,
}

impl CountdownState {
    pub fn new(from: u8) -> Self {
        Self {
            started: false,
            active: true,
            ticks_remaining: from,
        }
    }
}

/// Drive one session's countdown sequence. Spawned once per session,
/// after the second ready arrives.
pub async fn run(
    session: Arc<Mutex<Session>>,
    hub: Arc<ClientHub>,
    from: u8,
    interval: Duration,
) {
    let (game_id, players) = {
        let session = session.lock().await;
        (session.game_id, session.player_ids())
    };
    info!("Session {} countdown started", game_id);

    for value in (1..=from).rev() {
        {
            let mut session = session.lock().await;
            session.countdown.ticks_remaining = value;
        }
        hub.send_pair(
            [&players[0], &players[1]],
            ServerMessage::Countdown {
                value: CountdownValue::Tick(value),
                active: true,
            },
        )
        .await;
        sleep(interval).await;
    }

    {
        let mut session = session.lock().await;
        session.countdown.ticks_remaining = 0;
        session.countdown.active = false;
    }
    hub.send_pair(
        [&players[0], &players[1]],
        ServerMessage::Countdown {
            value: CountdownValue::go(),
            active: false,
        },
    )
    .await;
    info!("Session {} is live", game_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::matchmaking::Matchmaker;
    use tokio::sync::mpsc;

    fn hub_with(players: [&str; 2]) -> (Arc<ClientHub>, [mpsc::Receiver<ServerMessage>; 2]) {
        let hub = Arc::new(ClientHub::new(
            Duration::from_millis(100),
            Duration::from_millis(250),
        ));
        let (tx1, rx1) = mpsc::channel(16);
        let (tx2, rx2) = mpsc::channel(16);
        hub.register(&players[0].to_string(), players[0], tx1);
        hub.register(&players[1].to_string(), players[1], tx2);
        (hub, [rx1, rx2])
    }

    fn test_session() -> Session {
        let mm = Matchmaker::new(8, Duration::from_secs(60), Duration::from_secs(15));
        mm.join("p1".to_string(), "one".to_string(), "caret".to_string())
            .unwrap();
        mm.join("p2".to_string(), "two".to_string(), "block".to_string())
            .unwrap();
        let proposal = mm.pair_waiting().remove(0);
        let mut rng = rand::rng();
        Session::create(1, &proposal, "hello world", &GameConfig::default(), &mut rng)
    }

    #[tokio::test]
    async fn test_sequence_counts_down_then_goes() {
        let (hub, [mut rx1, mut rx2]) = hub_with(["p1", "p2"]);
        let session = Arc::new(Mutex::new(test_session()));

        run(Arc::clone(&session), hub, 3, Duration::from_millis(1)).await;

        for rx in [&mut rx1, &mut rx2] {
            for expected in [3u8, 2, 1] {
                match rx.recv().await {
                    Some(ServerMessage::Countdown { value, active }) => {
                        assert_eq!(value, CountdownValue::Tick(expected));
                        assert!(active);
                    }
                    other => panic!("unexpected message {other:?}"),
                }
            }
            match rx.recv().await {
                Some(ServerMessage::Countdown { value, active }) => {
                    assert_eq!(value, CountdownValue::go());
                    assert!(!active);
                }
                other => panic!("unexpected message {other:?}"),
            }
        }

        let session = session.lock().await;
        assert!(!session.countdown.active);
        assert_eq!(session.countdown.ticks_remaining, 0);
    }
}
