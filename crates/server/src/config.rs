//! Server configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub text: TextConfig,
}

impl Config {
    /// Load configuration from `config.toml` or use defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = Path::new("config.toml");
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            info!("No config.toml found, creating default config");
            let default_config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            Ok(default_config)
        }
    }
}

/// Server networking and general settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Connections per IP limit.
    #[serde(default = "default_ip_limit")]
    pub ip_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            max_connections: default_max_connections(),
            ip_limit: default_ip_limit(),
        }
    }
}

fn default_port() -> u16 {
    9800
}
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_max_connections() -> usize {
    500
}
fn default_ip_limit() -> usize {
    10
}

/// Waiting queue and match proposal settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Hard cap on simultaneously queued players.
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
    /// Seconds a player may wait before being evicted.
    #[serde(default = "default_queue_wait_timeout")]
    pub wait_timeout_secs: u64,
    /// Interval between pairing passes, in milliseconds.
    #[serde(default = "default_pairing_interval")]
    pub pairing_interval_ms: u64,
    /// Seconds both players have to accept a proposal.
    #[serde(default = "default_accept_timeout")]
    pub accept_timeout_secs: u64,
    /// Interval between eviction/expiry sweeps, in milliseconds.
    #[serde(default = "default_queue_sweep_interval")]
    pub sweep_interval_ms: u64,
}

impl QueueConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
    pub fn accept_timeout(&self) -> Duration {
        Duration::from_secs(self.accept_timeout_secs)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            wait_timeout_secs: default_queue_wait_timeout(),
            pairing_interval_ms: default_pairing_interval(),
            accept_timeout_secs: default_accept_timeout(),
            sweep_interval_ms: default_queue_sweep_interval(),
        }
    }
}

fn default_queue_capacity() -> usize {
    64
}
fn default_queue_wait_timeout() -> u64 {
    60
}
fn default_pairing_interval() -> u64 {
    2000
}
fn default_accept_timeout() -> u64 {
    15
}
fn default_queue_sweep_interval() -> u64 {
    1000
}

/// Gameplay settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GameConfig {
    /// Score that ends the game.
    #[serde(default = "default_win_score")]
    pub win_score: u32,
    /// Points deducted when a move runs into a hazard.
    #[serde(default = "default_hazard_penalty")]
    pub hazard_penalty: u32,
    /// Number of hazard cells scattered at session start.
    #[serde(default = "default_hazard_count")]
    pub hazard_count: usize,
    /// First countdown value (3 gives 3-2-1-GO).
    #[serde(default = "default_countdown_from")]
    pub countdown_from: u8,
    /// Milliseconds between countdown values.
    #[serde(default = "default_countdown_interval")]
    pub countdown_interval_ms: u64,
    /// Seconds without a move from either player before the session
    /// is expired.
    #[serde(default = "default_inactivity_timeout")]
    pub inactivity_timeout_secs: u64,
    /// Absolute ceiling on a session's lifetime, in seconds.
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: u64,
    /// Grace window before a finished session is dropped from the
    /// registry, in seconds.
    #[serde(default = "default_cleanup_grace")]
    pub cleanup_grace_secs: u64,
    /// Interval between session expiry sweeps, in milliseconds.
    #[serde(default = "default_session_sweep_interval")]
    pub sweep_interval_ms: u64,
}

impl GameConfig {
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }
    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_secs(self.cleanup_grace_secs)
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            win_score: default_win_score(),
            hazard_penalty: default_hazard_penalty(),
            hazard_count: default_hazard_count(),
            countdown_from: default_countdown_from(),
            countdown_interval_ms: default_countdown_interval(),
            inactivity_timeout_secs: default_inactivity_timeout(),
            max_duration_secs: default_max_duration(),
            cleanup_grace_secs: default_cleanup_grace(),
            sweep_interval_ms: default_session_sweep_interval(),
        }
    }
}

fn default_win_score() -> u32 {
    50
}
fn default_hazard_penalty() -> u32 {
    1
}
fn default_hazard_count() -> usize {
    6
}
fn default_countdown_from() -> u8 {
    3
}
fn default_countdown_interval() -> u64 {
    1000
}
fn default_inactivity_timeout() -> u64 {
    90
}
fn default_max_duration() -> u64 {
    600
}
fn default_cleanup_grace() -> u64 {
    10
}
fn default_session_sweep_interval() -> u64 {
    5000
}

/// Broadcast worker pool settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BroadcastConfig {
    /// Workers draining the client-notification queue.
    #[serde(default = "default_notify_workers")]
    pub notify_workers: usize,
    /// Depth of the client-notification queue.
    #[serde(default = "default_notify_queue")]
    pub notify_queue: usize,
    /// Workers draining the persistence queue.
    #[serde(default = "default_store_workers")]
    pub store_workers: usize,
    /// Depth of the persistence queue.
    #[serde(default = "default_store_queue")]
    pub store_queue: usize,
    /// Per-client write timeout, in milliseconds.
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,
    /// Best-effort ceiling on a two-client fan-out, in milliseconds.
    #[serde(default = "default_fanout_timeout")]
    pub fanout_timeout_ms: u64,
}

impl BroadcastConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
    pub fn fanout_timeout(&self) -> Duration {
        Duration::from_millis(self.fanout_timeout_ms)
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            notify_workers: default_notify_workers(),
            notify_queue: default_notify_queue(),
            store_workers: default_store_workers(),
            store_queue: default_store_queue(),
            write_timeout_ms: default_write_timeout(),
            fanout_timeout_ms: default_fanout_timeout(),
        }
    }
}

fn default_notify_workers() -> usize {
    4
}
fn default_notify_queue() -> usize {
    256
}
fn default_store_workers() -> usize {
    2
}
fn default_store_queue() -> usize {
    128
}
fn default_write_timeout() -> u64 {
    2000
}
fn default_fanout_timeout() -> u64 {
    3000
}

/// Text resource settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TextConfig {
    /// Directory of `*.txt` snippets; built-in snippets are used when
    /// it is missing or empty.
    #[serde(default = "default_text_dir")]
    pub dir: String,
    /// Path the default match store appends completed results to.
    #[serde(default = "default_results_path")]
    pub results_path: String,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            dir: default_text_dir(),
            results_path: default_results_path(),
        }
    }
}

fn default_text_dir() -> String {
    "texts".to_string()
}
fn default_results_path() -> String {
    "results.jsonl".to_string()
}
