//! Keyduel session server library.
//!
//! The real-time core of the game: the deterministic motion engine,
//! the match queue and proposal state machine, the session registry
//! with per-game locking, the countdown barrier and the bounded
//! broadcast pools. Accounts, payments and the leaderboard SQL live in
//! external collaborators behind the seams in [`store`] and [`hub`].

pub mod broadcast;
pub mod config;
pub mod engine;
pub mod error;
pub mod hub;
pub mod matchmaking;
pub mod motion;
pub mod server;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use engine::Engine;
pub use error::GameError;
pub use server::run;
