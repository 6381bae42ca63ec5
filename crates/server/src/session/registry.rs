//! The set of currently-running sessions.
//!
//! The registry's read/write lock guards only the lookup maps; it is
//! never held across a move. Each session sits behind its own
//! `tokio::sync::Mutex`, cloned out as an `Arc` so callers lock the
//! game they need and nothing else.

use super::Session;
use crate::error::GameError;
use protocol::{GameId, MatchId, PlayerId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

type SharedSession = Arc<Mutex<Session>>;

struct Entry {
    session: SharedSession,
    match_id: MatchId,
    players: [PlayerId; 2],
}

#[derive(Default)]
struct RegistryInner {
    sessions: HashMap<GameId, Entry>,
    match_to_game: HashMap<MatchId, GameId>,
    player_to_game: HashMap<PlayerId, GameId>,
    next_game_id: GameId,
}

#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<RegistryInner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh id for a session about to be created.
    pub fn allocate_id(&self) -> GameId {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.next_game_id += 1;
        inner.next_game_id
    }

    /// Register a freshly created session under its game id and the
    /// originating match id.
    pub fn insert(&self, session: Session) -> SharedSession {
        let game_id = session.game_id;
        let match_id = session.match_id;
        let players = session.player_ids();
        let shared = Arc::new(Mutex::new(session));
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.match_to_game.insert(match_id, game_id);
        for player in &players {
            inner.player_to_game.insert(player.clone(), game_id);
        }
        inner.sessions.insert(
            game_id,
            Entry {
                session: Arc::clone(&shared),
                match_id,
                players,
            },
        );
        shared
    }

    pub fn get(&self, game_id: GameId) -> Result<SharedSession, GameError> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .sessions
            .get(&game_id)
            .map(|e| Arc::clone(&e.session))
            .ok_or(GameError::GameNotFound)
    }

    pub fn game_for_match(&self, match_id: MatchId) -> Option<GameId> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .match_to_game
            .get(&match_id)
            .copied()
    }

    pub fn game_for_player(&self, player_id: &PlayerId) -> Option<GameId> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .player_to_game
            .get(player_id)
            .copied()
    }

    /// Drop a session and all of its lookup aliases.
    pub fn remove(&self, game_id: GameId) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if let Some(entry) = inner.sessions.remove(&game_id) {
            inner.match_to_game.remove(&entry.match_id);
            for player in &entry.players {
                // A player may already sit in a newer game.
                if inner.player_to_game.get(player) == Some(&game_id) {
                    inner.player_to_game.remove(player);
                }
            }
        }
    }

    /// Snapshot of all live sessions, for the expiry sweep. The
    /// registry lock is released before any session gets locked.
    pub fn all(&self) -> Vec<(GameId, SharedSession)> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .sessions
            .iter()
            .map(|(id, e)| (*id, Arc::clone(&e.session)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .sessions
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
