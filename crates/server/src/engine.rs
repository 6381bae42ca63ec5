//! Session engine: wires the matchmaker, session registry, client hub,
//! worker pools and the persistence seam together.
//!
//! One [`Engine`] exists per process, explicitly constructed and
//! handed to the transport layer. Client messages arrive through
//! [`Engine::handle_message`] in connection order, so moves from one
//! player are never reordered; the periodic tickers drive pairing and
//! the timeout sweeps.

use crate::broadcast::WorkerPool;
use crate::config::Config;
use crate::error::GameError;
use crate::hub::ClientHub;
use crate::matchmaking::{MatchDecision, MatchProposal, Matchmaker};
use crate::motion::CellTag;
use crate::session::{EndReason, MoveOutcome, Session, SessionRegistry, countdown};
use crate::store::{MatchStore, TextLibrary};
use protocol::messages::{ClientMessage, ErrorReply, ServerMessage};
use protocol::{GameId, ParsedCommand, PlayerId, parse_command};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Explicit count fields from the wire are clamped to the same bound
/// the command grammar enforces.
const MAX_WIRE_COUNT: u32 = 9999;

pub struct Engine {
    config: Config,
    hub: Arc<ClientHub>,
    matchmaker: Matchmaker,
    registry: SessionRegistry,
    notify_pool: WorkerPool,
    store_pool: WorkerPool,
    store: Arc<dyn MatchStore>,
    texts: TextLibrary,
}

impl Engine {
    pub fn new(
        config: Config,
        hub: Arc<ClientHub>,
        store: Arc<dyn MatchStore>,
        texts: TextLibrary,
    ) -> Self {
        let notify_pool = WorkerPool::new(
            "notify",
            config.broadcast.notify_workers,
            config.broadcast.notify_queue,
        );
        let store_pool = WorkerPool::new(
            "store",
            config.broadcast.store_workers,
            config.broadcast.store_queue,
        );
        let matchmaker = Matchmaker::new(
            config.queue.capacity,
            config.queue.wait_timeout(),
            config.queue.accept_timeout(),
        );
        Self {
            config,
            hub,
            matchmaker,
            registry: SessionRegistry::new(),
            notify_pool,
            store_pool,
            store,
            texts,
        }
    }

    /// Dispatch one client message. Errors are returned for the
    /// transport to answer with the uniform envelope; they never tear
    /// anything down.
    pub async fn handle_message(
        &self,
        player_id: &PlayerId,
        message: ClientMessage,
    ) -> Result<(), GameError> {
        match message {
            ClientMessage::Identify { .. } => {
                // The transport consumed the handshake already.
                warn!("Player {} sent a second identify, ignoring", player_id);
                Ok(())
            }
            ClientMessage::QueueJoin { character } => self.queue_join(player_id, character).await,
            ClientMessage::QueueLeave => self.queue_leave(player_id).await,
            ClientMessage::MatchRespond { match_id, accept } => {
                self.match_respond(player_id, match_id, accept).await
            }
            ClientMessage::Ready { game_id } => self.ready(player_id, game_id).await,
            ClientMessage::Move {
                game_id,
                command,
                count,
                has_explicit_count,
            } => {
                let mut parsed = parse_command(&command)?;
                if let Some(count) = count {
                    parsed.count = count.clamp(1, MAX_WIRE_COUNT);
                    parsed.has_explicit_count = has_explicit_count.unwrap_or(true);
                }
                self.process_move(player_id, game_id, parsed).await
            }
        }
    }

    async fn queue_join(&self, player_id: &PlayerId, character: String) -> Result<(), GameError> {
        let display_name = self
            .hub
            .display_name(player_id)
            .ok_or(GameError::NotConnected)?;
        self.matchmaker
            .join(player_id.clone(), display_name, character)?;
        self.send_to(player_id, ServerMessage::QueueJoined).await;

        let store = Arc::clone(&self.store);
        let id = player_id.clone();
        self.store_pool
            .submit(async move {
                if let Err(e) = store.record_queue_join(&id).await {
                    error!("Failed to record queue join for {}: {}", id, e);
                }
            })
            .await;
        Ok(())
    }

    async fn queue_leave(&self, player_id: &PlayerId) -> Result<(), GameError> {
        self.matchmaker.leave(player_id)?;
        self.send_to(player_id, ServerMessage::QueueLeft).await;

        let store = Arc::clone(&self.store);
        let id = player_id.clone();
        self.store_pool
            .submit(async move {
                if let Err(e) = store.record_queue_leave(&id).await {
                    error!("Failed to record queue leave for {}: {}", id, e);
                }
            })
            .await;
        Ok(())
    }

    async fn match_respond(
        &self,
        player_id: &PlayerId,
        match_id: protocol::MatchId,
        accept: bool,
    ) -> Result<(), GameError> {
        match self.matchmaker.respond(match_id, player_id, accept)? {
            MatchDecision::Waiting { opponent_id } => {
                self.send_to(player_id, ServerMessage::MatchAccepted).await;
                self.send_to(&opponent_id, ServerMessage::OpponentAccepted)
                    .await;
            }
            MatchDecision::Rejected {
                rejecter_id,
                other_id,
            } => {
                self.send_to(&rejecter_id, ServerMessage::MatchRejected)
                    .await;
                self.send_to(&other_id, ServerMessage::OpponentRejected)
                    .await;
            }
            MatchDecision::Ready(proposal) => {
                self.send_to(player_id, ServerMessage::MatchAccepted).await;
                self.start_session(proposal).await;
            }
        }
        Ok(())
    }

    /// Build a session from a both-accepted proposal and tell both
    /// clients to render it.
    async fn start_session(&self, proposal: MatchProposal) {
        let game_id = self.registry.allocate_id();
        let session = {
            let mut rng = rand::rng();
            let text_source = self.texts.pick(&mut rng).to_string();
            Session::create(game_id, &proposal, &text_source, &self.config.game, &mut rng)
        };
        let players = session.player_ids();
        let started = ServerMessage::MatchStarted {
            match_id: session.match_id,
            game_id,
            lines: session.text.to_lines(),
            player1_id: session.players[0].player_id.clone(),
            player1_name: session.players[0].display_name.clone(),
            player2_id: session.players[1].player_id.clone(),
            player2_name: session.players[1].display_name.clone(),
            hazards: session.occupancy.cells_tagged(CellTag::Hazard),
            update: session.snapshot(),
        };
        self.registry.insert(session);
        self.hub
            .send_pair([&players[0], &players[1]], started)
            .await;
    }

    async fn ready(&self, player_id: &PlayerId, game_id: GameId) -> Result<(), GameError> {
        let session = self.registry.get(game_id)?;
        let start = {
            let mut session = session.lock().await;
            session.mark_ready(player_id)?
        };
        if start {
            let hub = Arc::clone(&self.hub);
            let from = self.config.game.countdown_from;
            let interval = Duration::from_millis(self.config.game.countdown_interval_ms);
            tokio::spawn(countdown::run(session, hub, from, interval));
        }
        Ok(())
    }

    /// Process one move under the session's own lock. The broadcast is
    /// enqueued while the lock is held; the pool's inline fallback
    /// keeps that bounded instead of unboundedly queued.
    async fn process_move(
        &self,
        player_id: &PlayerId,
        game_id: GameId,
        parsed: ParsedCommand,
    ) -> Result<(), GameError> {
        let session = self.registry.get(game_id)?;
        let mut session = session.lock().await;
        let outcome = {
            let mut rng = rand::rng();
            session.process_move(player_id, parsed, &mut rng)?
        };

        match outcome {
            MoveOutcome::Applied {
                result,
                opponent_id,
                completion,
            } => {
                let hub = Arc::clone(&self.hub);
                let mover = player_id.clone();
                let update = result.update.clone();
                self.notify_pool
                    .submit(async move {
                        if let Err(e) = hub.send(&mover, ServerMessage::MoveResult(result)).await {
                            warn!("Move result to {} failed: {}", mover, e);
                        }
                        if let Err(e) = hub
                            .send(&opponent_id, ServerMessage::GameUpdate(update))
                            .await
                        {
                            warn!("Game update to {} failed: {}", opponent_id, e);
                        }
                    })
                    .await;

                if let Some(completed) = completion {
                    let complete_msg = ServerMessage::GameComplete {
                        winner_id: completed.winner_id.clone(),
                        player1_score: completed.player1_score,
                        player2_score: completed.player2_score,
                        duration_seconds: completed.duration_seconds,
                    };
                    let hub = Arc::clone(&self.hub);
                    let players = session.player_ids();
                    self.notify_pool
                        .submit(async move {
                            hub.send_pair([&players[0], &players[1]], complete_msg)
                                .await;
                        })
                        .await;

                    let store = Arc::clone(&self.store);
                    self.store_pool
                        .submit(async move {
                            if let Err(e) = store.save_completed_match(&completed).await {
                                error!(
                                    "Failed to persist game {}: {}",
                                    completed.game_id, e
                                );
                            }
                        })
                        .await;
                }
            }
            MoveOutcome::Blocked { update, .. } => {
                let hub = Arc::clone(&self.hub);
                let mover = player_id.clone();
                self.notify_pool
                    .submit(async move {
                        let envelope =
                            ServerMessage::Error(ErrorReply::new("move_blocked"));
                        if let Err(e) = hub.send(&mover, envelope).await {
                            warn!("Blocked-move reply to {} failed: {}", mover, e);
                            return;
                        }
                        if let Err(e) = hub.send(&mover, ServerMessage::GameUpdate(update)).await {
                            warn!("State echo to {} failed: {}", mover, e);
                        }
                    })
                    .await;
            }
        }
        Ok(())
    }

    /// Transport-level disconnect: free the hub slot, drop any queue
    /// or proposal membership, and end a running game.
    pub async fn handle_disconnect(&self, player_id: &PlayerId) {
        self.hub.unregister(player_id);

        if let Some(proposal) = self.matchmaker.remove_player(player_id) {
            if let Some(opponent) = proposal.opponent_of(player_id) {
                self.send_to(&opponent.player_id, ServerMessage::OpponentRejected)
                    .await;
            }
        }

        if let Some(game_id) = self.registry.game_for_player(player_id) {
            if let Ok(session) = self.registry.get(game_id) {
                let opponent = {
                    let mut session = session.lock().await;
                    if session.completed {
                        None
                    } else {
                        session.end(EndReason::Disconnect);
                        session
                            .player_ids()
                            .into_iter()
                            .find(|p| p != player_id)
                    }
                };
                if let Some(opponent) = opponent {
                    self.send_to(
                        &opponent,
                        ServerMessage::PlayerDisconnected {
                            reason: EndReason::Disconnect.as_str().to_string(),
                        },
                    )
                    .await;
                }
            }
        }
        info!("Player {} disconnected", player_id);
    }

    /// One pairing pass over the queue.
    pub async fn tick_pairing(&self) {
        let now = Instant::now();
        for proposal in self.matchmaker.pair_waiting() {
            for side in 0..2 {
                let own = &proposal.sides[side].entry;
                let opponent = &proposal.sides[1 - side].entry;
                self.send_to(
                    &own.player_id,
                    ServerMessage::MatchFound {
                        match_id: proposal.match_id,
                        own_character: own.character.clone(),
                        opponent_character: opponent.character.clone(),
                        opponent_name: opponent.display_name.clone(),
                        accept_deadline_ms: proposal.remaining_ms(now),
                    },
                )
                .await;
            }
        }
    }

    /// Evict players who waited past the queue timeout.
    pub async fn tick_queue_sweep(&self) {
        for entry in self.matchmaker.sweep_queue() {
            self.send_to(&entry.player_id, ServerMessage::QueueTimeout)
                .await;
        }
    }

    /// Cancel proposals past their acceptance deadline; a mutual
    /// timeout sends both players back to idle.
    pub async fn tick_proposal_sweep(&self) {
        for proposal in self.matchmaker.sweep_proposals() {
            for side in &proposal.sides {
                self.send_to(&side.entry.player_id, ServerMessage::MatchRejected)
                    .await;
            }
        }
    }

    /// Expire inactive and over-long sessions; drop completed ones
    /// after the cleanup grace window.
    pub async fn tick_session_sweep(&self) {
        let now = Instant::now();
        let grace = self.config.game.cleanup_grace();
        let inactivity = self.config.game.inactivity_timeout();
        let max_duration = self.config.game.max_duration();

        for (game_id, shared) in self.registry.all() {
            let mut session = shared.lock().await;
            if session.completed {
                let expired_grace = session
                    .ended_at
                    .is_none_or(|t| now.duration_since(t) >= grace);
                if expired_grace {
                    drop(session);
                    self.registry.remove(game_id);
                    info!("Session {} cleaned up", game_id);
                }
                continue;
            }
            let reason = if now.duration_since(session.created_at) >= max_duration {
                Some(EndReason::MaxDuration)
            } else if now.duration_since(session.last_activity) >= inactivity {
                Some(EndReason::Inactivity)
            } else {
                None
            };
            if let Some(reason) = reason {
                session.end(reason);
                let players = session.player_ids();
                drop(session);
                self.hub
                    .send_pair(
                        [&players[0], &players[1]],
                        ServerMessage::GameExpired {
                            reason: reason.as_str().to_string(),
                        },
                    )
                    .await;
            }
        }
    }

    /// Spawn the periodic tickers; each stops when the shutdown signal
    /// flips.
    pub fn spawn_tickers(self: &Arc<Self>, shutdown: watch::Receiver<bool>) {
        let pairing = Duration::from_millis(self.config.queue.pairing_interval_ms);
        let queue_sweep = Duration::from_millis(self.config.queue.sweep_interval_ms);
        let session_sweep = Duration::from_millis(self.config.game.sweep_interval_ms);

        let engine = Arc::clone(self);
        let mut rx = shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(pairing);
            loop {
                tokio::select! {
                    _ = ticker.tick() => engine.tick_pairing().await,
                    _ = rx.changed() => break,
                }
            }
        });

        let engine = Arc::clone(self);
        let mut rx = shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(queue_sweep);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        engine.tick_queue_sweep().await;
                        engine.tick_proposal_sweep().await;
                    }
                    _ = rx.changed() => break,
                }
            }
        });

        let engine = Arc::clone(self);
        let mut rx = shutdown;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(session_sweep);
            loop {
                tokio::select! {
                    _ = ticker.tick() => engine.tick_session_sweep().await,
                    _ = rx.changed() => break,
                }
            }
        });
    }

    /// Best-effort single send; delivery failures are logged, not
    /// propagated into the state machine.
    async fn send_to(&self, player_id: &PlayerId, message: ServerMessage) {
        if let Err(e) = self.hub.send(player_id, message).await {
            warn!("Send to {} failed: {}", player_id, e);
        }
    }

    #[cfg(test)]
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CompletedMatch;
    use async_trait::async_trait;
    use protocol::messages::CountdownValue;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    struct RecordingStore {
        saved: StdMutex<Vec<CompletedMatch>>,
    }

    #[async_trait]
    impl MatchStore for RecordingStore {
        async fn save_completed_match(&self, result: &CompletedMatch) -> anyhow::Result<()> {
            self.saved.lock().unwrap().push(result.clone());
            Ok(())
        }
        async fn record_queue_join(&self, _: &PlayerId) -> anyhow::Result<()> {
            Ok(())
        }
        async fn record_queue_leave(&self, _: &PlayerId) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct Fixture {
        engine: Arc<Engine>,
        store: Arc<RecordingStore>,
        rx: [mpsc::Receiver<ServerMessage>; 2],
    }

    fn fixture() -> Fixture {
        let mut config = Config::default();
        config.game.countdown_from = 1;
        config.game.countdown_interval_ms = 5;
        config.game.hazard_count = 0;
        fixture_with(config)
    }

    fn fixture_with(config: Config) -> Fixture {
        let hub = Arc::new(ClientHub::new(
            Duration::from_millis(200),
            Duration::from_millis(500),
        ));
        let store = Arc::new(RecordingStore {
            saved: StdMutex::new(Vec::new()),
        });
        let texts = TextLibrary::load(std::path::Path::new("no/texts/here"));

        let (tx1, rx1) = mpsc::channel(64);
        let (tx2, rx2) = mpsc::channel(64);
        hub.register(&"p1".to_string(), "One", tx1);
        hub.register(&"p2".to_string(), "Two", tx2);

        let engine = Arc::new(Engine::new(
            config,
            hub,
            Arc::clone(&store) as Arc<dyn MatchStore>,
            texts,
        ));
        Fixture {
            engine,
            store,
            rx: [rx1, rx2],
        }
    }

    async fn recv(rx: &mut mpsc::Receiver<ServerMessage>) -> ServerMessage {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("channel closed")
    }

    async fn queue_both(f: &mut Fixture) {
        for (i, id) in ["p1", "p2"].iter().enumerate() {
            f.engine
                .handle_message(
                    &id.to_string(),
                    ClientMessage::QueueJoin {
                        character: "caret".to_string(),
                    },
                )
                .await
                .unwrap();
            assert_eq!(recv(&mut f.rx[i]).await, ServerMessage::QueueJoined);
        }
    }

    /// Drive a fixture through queueing, pairing and acceptance,
    /// returning the new game id.
    async fn into_game(f: &mut Fixture) -> GameId {
        queue_both(f).await;
        f.engine.tick_pairing().await;

        let match_id = match recv(&mut f.rx[0]).await {
            ServerMessage::MatchFound {
                match_id,
                opponent_name,
                ..
            } => {
                assert_eq!(opponent_name, "Two");
                match_id
            }
            other => panic!("unexpected message {other:?}"),
        };
        assert!(matches!(
            recv(&mut f.rx[1]).await,
            ServerMessage::MatchFound { .. }
        ));

        f.engine
            .handle_message(
                &"p1".to_string(),
                ClientMessage::MatchRespond {
                    match_id,
                    accept: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(recv(&mut f.rx[0]).await, ServerMessage::MatchAccepted);
        assert_eq!(recv(&mut f.rx[1]).await, ServerMessage::OpponentAccepted);

        f.engine
            .handle_message(
                &"p2".to_string(),
                ClientMessage::MatchRespond {
                    match_id,
                    accept: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(recv(&mut f.rx[1]).await, ServerMessage::MatchAccepted);

        let game_id = match recv(&mut f.rx[0]).await {
            ServerMessage::MatchStarted { game_id, .. } => game_id,
            other => panic!("unexpected message {other:?}"),
        };
        assert!(matches!(
            recv(&mut f.rx[1]).await,
            ServerMessage::MatchStarted { .. }
        ));
        game_id
    }

    #[tokio::test]
    async fn test_queue_to_running_game() {
        let mut f = fixture();
        let game_id = into_game(&mut f).await;

        // Moves are gated until the countdown has run.
        let err = f
            .engine
            .handle_message(
                &"p1".to_string(),
                ClientMessage::Move {
                    game_id,
                    command: "w".to_string(),
                    count: None,
                    has_explicit_count: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::CountdownActive));

        for id in ["p1", "p2"] {
            f.engine
                .handle_message(&id.to_string(), ClientMessage::Ready { game_id })
                .await
                .unwrap();
        }
        // 1-tick countdown configured in the fixture: one tick + GO.
        for rx in f.rx.iter_mut() {
            assert!(matches!(
                recv(rx).await,
                ServerMessage::Countdown {
                    value: CountdownValue::Tick(1),
                    active: true
                }
            ));
            match recv(rx).await {
                ServerMessage::Countdown { active, .. } => assert!(!active),
                other => panic!("unexpected message {other:?}"),
            }
        }

        // Now a move goes through and both players hear about it.
        f.engine
            .handle_message(
                &"p1".to_string(),
                ClientMessage::Move {
                    game_id,
                    command: "w".to_string(),
                    count: None,
                    has_explicit_count: None,
                },
            )
            .await
            .unwrap();
        match recv(&mut f.rx[0]).await {
            ServerMessage::MoveResult(result) => {
                assert_eq!(result.current_player, "p1");
                match recv(&mut f.rx[1]).await {
                    ServerMessage::GameUpdate(update) => assert_eq!(result.update, update),
                    other => panic!("unexpected message {other:?}"),
                }
            }
            // p1's spawn corner may make `w` a wall move; then the
            // mover gets the envelope plus the state echo instead.
            ServerMessage::Error(reply) => {
                assert_eq!(reply.error, "move_blocked");
                assert!(matches!(
                    recv(&mut f.rx[0]).await,
                    ServerMessage::GameUpdate(_)
                ));
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejection_cancels_for_both() {
        let mut f = fixture();
        queue_both(&mut f).await;
        f.engine.tick_pairing().await;
        let match_id = match recv(&mut f.rx[0]).await {
            ServerMessage::MatchFound { match_id, .. } => match_id,
            other => panic!("unexpected message {other:?}"),
        };
        recv(&mut f.rx[1]).await;

        f.engine
            .handle_message(
                &"p2".to_string(),
                ClientMessage::MatchRespond {
                    match_id,
                    accept: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(recv(&mut f.rx[1]).await, ServerMessage::MatchRejected);
        assert_eq!(recv(&mut f.rx[0]).await, ServerMessage::OpponentRejected);

        // Both are idle again and may re-queue.
        queue_both(&mut f).await;
    }

    #[tokio::test]
    async fn test_invalid_command_is_reported() {
        let mut f = fixture();
        let game_id = into_game(&mut f).await;
        let err = f
            .engine
            .handle_message(
                &"p1".to_string(),
                ClientMessage::Move {
                    game_id,
                    command: "q".to_string(),
                    count: None,
                    has_explicit_count: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_command");
    }

    #[tokio::test]
    async fn test_disconnect_ends_session_and_tells_opponent() {
        let mut f = fixture();
        let game_id = into_game(&mut f).await;

        f.engine.handle_disconnect(&"p2".to_string()).await;
        assert!(matches!(
            recv(&mut f.rx[0]).await,
            ServerMessage::PlayerDisconnected { .. }
        ));
        let session = f.engine.registry().get(game_id).unwrap();
        let session = session.lock().await;
        assert!(session.completed);
        assert_eq!(session.end_reason, Some(EndReason::Disconnect));
        assert!(session.winner_id.is_none());
    }

    #[tokio::test]
    async fn test_win_persists_result() {
        let mut f = fixture();
        let game_id = into_game(&mut f).await;
        {
            // Shortcut the countdown and put p1 one point from winning
            // with the collectible next door.
            let session = f.engine.registry().get(game_id).unwrap();
            let mut s = session.lock().await;
            s.countdown.active = false;
            let slot = s
                .players
                .iter()
                .position(|p| p.player_id == "p1")
                .unwrap();
            let pos = s.players[slot].position;
            let target = if pos.col == 0 {
                protocol::Position::new(pos.row, 1)
            } else {
                protocol::Position::new(pos.row, pos.col - 1)
            };
            s.players[slot].score = 49;
            s.occupancy.set(s.collectible, CellTag::Empty);
            s.collectible = target;
            s.occupancy.set(target, CellTag::Collectible);

            let command = if pos.col == 0 { "l" } else { "h" };
            drop(s);
            f.engine
                .handle_message(
                    &"p1".to_string(),
                    ClientMessage::Move {
                        game_id,
                        command: command.to_string(),
                        count: None,
                        has_explicit_count: None,
                    },
                )
                .await
                .unwrap();
        }

        // The mover hears both the move result and the completion; the
        // two pool tasks may land in either order.
        let mut saw_result = false;
        let mut saw_complete = false;
        for _ in 0..2 {
            match recv(&mut f.rx[0]).await {
                ServerMessage::MoveResult(result) => {
                    assert!(result.completed);
                    saw_result = true;
                }
                ServerMessage::GameComplete { winner_id, .. } => {
                    assert_eq!(winner_id, "p1");
                    saw_complete = true;
                }
                other => panic!("unexpected message {other:?}"),
            }
        }
        assert!(saw_result && saw_complete);

        // Persistence runs through the store pool.
        timeout(Duration::from_secs(2), async {
            loop {
                if !f.store.saved.lock().unwrap().is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("result never persisted");
        let saved = f.store.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].winner_id, "p1");
        assert_eq!(saved[0].game_id, game_id);
    }

    #[tokio::test]
    async fn test_queue_timeout_sweep_notifies() {
        let mut config = Config::default();
        config.queue.wait_timeout_secs = 0;
        let hub = Arc::new(ClientHub::new(
            Duration::from_millis(200),
            Duration::from_millis(500),
        ));
        let (tx, mut rx) = mpsc::channel(16);
        hub.register(&"p1".to_string(), "One", tx);
        let store = Arc::new(RecordingStore {
            saved: StdMutex::new(Vec::new()),
        });
        let engine = Engine::new(
            config,
            hub,
            store as Arc<dyn MatchStore>,
            TextLibrary::load(std::path::Path::new("no/texts/here")),
        );

        engine
            .handle_message(
                &"p1".to_string(),
                ClientMessage::QueueJoin {
                    character: "caret".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(recv(&mut rx).await, ServerMessage::QueueJoined);
        engine.tick_queue_sweep().await;
        assert_eq!(recv(&mut rx).await, ServerMessage::QueueTimeout);
    }

    #[tokio::test]
    async fn test_session_sweep_expires_and_cleans_up() {
        // Zero ceiling and zero grace: the first sweep expires the
        // session, the second forgets it.
        let mut config = Config::default();
        config.game.countdown_from = 1;
        config.game.countdown_interval_ms = 5;
        config.game.hazard_count = 0;
        config.game.max_duration_secs = 0;
        config.game.cleanup_grace_secs = 0;
        let mut f = fixture_with(config);
        let game_id = into_game(&mut f).await;

        f.engine.tick_session_sweep().await;
        for rx in f.rx.iter_mut() {
            match recv(rx).await {
                ServerMessage::GameExpired { reason } => {
                    assert_eq!(reason, "max_duration_reached");
                }
                other => panic!("unexpected message {other:?}"),
            }
        }

        f.engine.tick_session_sweep().await;
        assert!(matches!(
            f.engine.registry().get(game_id),
            Err(GameError::GameNotFound)
        ));
    }
}
