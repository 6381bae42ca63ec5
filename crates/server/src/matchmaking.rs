//! Waiting queue and match proposal state machine.
//!
//! Per player the flow is Idle → Searching → MatchFound →
//! WaitingAccept → accepted (into a session) or back to Idle on
//! rejection or timeout. The matchmaker is an owned service with its
//! own lock, independent of the session locks; critical sections only
//! touch the in-memory queue and proposal table.

use crate::error::GameError;
use protocol::{MatchId, PlayerId};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::info;

/// One waiting player.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub player_id: PlayerId,
    pub display_name: String,
    pub character: String,
    pub queued_at: Instant,
}

/// One player's half of a proposal.
#[derive(Debug, Clone)]
pub struct ProposalSide {
    pub entry: QueueEntry,
    pub responded: bool,
    pub accepted: bool,
}

/// A timed accept/reject handshake between two paired players.
#[derive(Debug, Clone)]
pub struct MatchProposal {
    pub match_id: MatchId,
    pub sides: [ProposalSide; 2],
    pub created_at: Instant,
    pub deadline: Instant,
}

impl MatchProposal {
    pub fn side_of(&self, player_id: &PlayerId) -> Option<usize> {
        self.sides
            .iter()
            .position(|s| s.entry.player_id == *player_id)
    }

    pub fn opponent_of(&self, player_id: &PlayerId) -> Option<&QueueEntry> {
        let side = self.side_of(player_id)?;
        Some(&self.sides[1 - side].entry)
    }

    pub fn both_accepted(&self) -> bool {
        self.sides.iter().all(|s| s.responded && s.accepted)
    }

    /// Milliseconds left to accept, for the client's timer.
    pub fn remaining_ms(&self, now: Instant) -> u64 {
        self.deadline.saturating_duration_since(now).as_millis() as u64
    }
}

/// Outcome of one `respond` call.
#[derive(Debug)]
pub enum MatchDecision {
    /// The responder accepted; the opponent has not answered yet.
    Waiting { opponent_id: PlayerId },
    /// The responder rejected; the proposal is gone.
    Rejected {
        rejecter_id: PlayerId,
        other_id: PlayerId,
    },
    /// Both accepted; the proposal is consumed and a session should
    /// be created from it.
    Ready(MatchProposal),
}

struct MatchmakerInner {
    queue: VecDeque<QueueEntry>,
    proposals: HashMap<MatchId, MatchProposal>,
    next_match_id: MatchId,
}

impl MatchmakerInner {
    fn is_engaged(&self, player_id: &PlayerId) -> bool {
        self.queue.iter().any(|e| e.player_id == *player_id)
            || self
                .proposals
                .values()
                .any(|p| p.side_of(player_id).is_some())
    }
}

pub struct Matchmaker {
    inner: Mutex<MatchmakerInner>,
    capacity: usize,
    wait_timeout: Duration,
    accept_timeout: Duration,
}

impl Matchmaker {
    pub fn new(capacity: usize, wait_timeout: Duration, accept_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(MatchmakerInner {
                queue: VecDeque::new(),
                proposals: HashMap::new(),
                next_match_id: 1,
            }),
            capacity,
            wait_timeout,
            accept_timeout,
        }
    }

    /// Enter the waiting queue. Connectivity is the caller's check;
    /// uniqueness and capacity are enforced here.
    pub fn join(
        &self,
        player_id: PlayerId,
        display_name: String,
        character: String,
    ) -> Result<(), GameError> {
        let mut inner = self.inner.lock().expect("matchmaker lock poisoned");
        if inner.is_engaged(&player_id) {
            return Err(GameError::AlreadyQueued);
        }
        if inner.queue.len() >= self.capacity {
            return Err(GameError::QueueFull);
        }
        info!("Player {} joined the queue as '{}'", player_id, display_name);
        inner.queue.push_back(QueueEntry {
            player_id,
            display_name,
            character,
            queued_at: Instant::now(),
        });
        Ok(())
    }

    pub fn leave(&self, player_id: &PlayerId) -> Result<(), GameError> {
        let mut inner = self.inner.lock().expect("matchmaker lock poisoned");
        let before = inner.queue.len();
        inner.queue.retain(|e| e.player_id != *player_id);
        if inner.queue.len() == before {
            return Err(GameError::NotInQueue);
        }
        info!("Player {} left the queue", player_id);
        Ok(())
    }

    /// One pairing pass: pops waiting players two at a time in queue
    /// order and turns each pair into a proposal. Returns the fresh
    /// proposals for notification outside the lock.
    pub fn pair_waiting(&self) -> Vec<MatchProposal> {
        let mut inner = self.inner.lock().expect("matchmaker lock poisoned");
        let mut created = Vec::new();
        while inner.queue.len() >= 2 {
            let first = inner.queue.pop_front().expect("checked length");
            let second = inner.queue.pop_front().expect("checked length");
            let match_id = inner.next_match_id;
            inner.next_match_id += 1;
            let now = Instant::now();
            let proposal = MatchProposal {
                match_id,
                sides: [
                    ProposalSide {
                        entry: first,
                        responded: false,
                        accepted: false,
                    },
                    ProposalSide {
                        entry: second,
                        responded: false,
                        accepted: false,
                    },
                ],
                created_at: now,
                deadline: now + self.accept_timeout,
            };
            info!(
                "Match {} proposed: {} vs {}",
                match_id, proposal.sides[0].entry.player_id, proposal.sides[1].entry.player_id
            );
            created.push(proposal.clone());
            inner.proposals.insert(match_id, proposal);
        }
        created
    }

    /// Evict entries that waited past the queue timeout. Returns the
    /// evicted players for notification.
    pub fn sweep_queue(&self) -> Vec<QueueEntry> {
        let mut inner = self.inner.lock().expect("matchmaker lock poisoned");
        let now = Instant::now();
        let timeout = self.wait_timeout;
        let mut evicted = Vec::new();
        inner.queue.retain(|e| {
            if now.duration_since(e.queued_at) >= timeout {
                evicted.push(e.clone());
                false
            } else {
                true
            }
        });
        for entry in &evicted {
            info!("Player {} evicted from queue after timeout", entry.player_id);
        }
        evicted
    }

    /// Cancel proposals past their acceptance deadline (a mutual
    /// timeout: both players go back to Idle). Returns the cancelled
    /// proposals for notification.
    pub fn sweep_proposals(&self) -> Vec<MatchProposal> {
        let mut inner = self.inner.lock().expect("matchmaker lock poisoned");
        let now = Instant::now();
        let expired_ids: Vec<MatchId> = inner
            .proposals
            .values()
            .filter(|p| now >= p.deadline)
            .map(|p| p.match_id)
            .collect();
        expired_ids
            .into_iter()
            .filter_map(|id| {
                let proposal = inner.proposals.remove(&id)?;
                info!("Match {} expired without both players accepting", id);
                Some(proposal)
            })
            .collect()
    }

    /// Record an accept/reject from one player.
    pub fn respond(
        &self,
        match_id: MatchId,
        player_id: &PlayerId,
        accept: bool,
    ) -> Result<MatchDecision, GameError> {
        let mut inner = self.inner.lock().expect("matchmaker lock poisoned");
        let proposal = inner
            .proposals
            .get_mut(&match_id)
            .ok_or(GameError::MatchNotFound)?;
        if Instant::now() >= proposal.deadline {
            // Left in place for the expiry sweep, which notifies both
            // players of the mutual timeout.
            return Err(GameError::MatchExpired);
        }
        let side = proposal
            .side_of(player_id)
            .ok_or(GameError::MatchNotFound)?;
        if proposal.sides[side].responded {
            return Err(GameError::MatchAlreadyResponded);
        }
        proposal.sides[side].responded = true;
        proposal.sides[side].accepted = accept;

        if !accept {
            let proposal = inner.proposals.remove(&match_id).expect("present above");
            info!("Match {} rejected by {}", match_id, player_id);
            return Ok(MatchDecision::Rejected {
                rejecter_id: player_id.clone(),
                other_id: proposal.sides[1 - side].entry.player_id.clone(),
            });
        }
        if proposal.both_accepted() {
            let proposal = inner.proposals.remove(&match_id).expect("present above");
            info!("Match {} accepted by both players", match_id);
            return Ok(MatchDecision::Ready(proposal));
        }
        Ok(MatchDecision::Waiting {
            opponent_id: proposal.sides[1 - side].entry.player_id.clone(),
        })
    }

    /// Disconnect path: drop the player's queue entry and cancel any
    /// proposal they sit in. Returns the cancelled proposal so the
    /// opponent can be told.
    pub fn remove_player(&self, player_id: &PlayerId) -> Option<MatchProposal> {
        let mut inner = self.inner.lock().expect("matchmaker lock poisoned");
        inner.queue.retain(|e| e.player_id != *player_id);
        let match_id = inner
            .proposals
            .values()
            .find(|p| p.side_of(player_id).is_some())
            .map(|p| p.match_id)?;
        inner.proposals.remove(&match_id)
    }

    pub fn queue_len(&self) -> usize {
        self.inner.lock().expect("matchmaker lock poisoned").queue.len()
    }
}
