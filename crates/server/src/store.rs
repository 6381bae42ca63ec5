//! Persistence seam.
//!
//! The relational store behind accounts and leaderboards is an
//! external collaborator. The session engine only needs this narrow
//! contract, always invoked through the persistence worker pool:
//! failures are logged, gameplay never waits on them.

use async_trait::async_trait;
use protocol::{GameId, MatchId, PlayerId};
use rand::Rng;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// A finished game, ready for the leaderboard pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedMatch {
    pub game_id: GameId,
    pub match_id: MatchId,
    pub winner_id: PlayerId,
    pub player1_id: PlayerId,
    pub player1_score: u32,
    pub player2_id: PlayerId,
    pub player2_score: u32,
    pub duration_seconds: u64,
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn save_completed_match(&self, result: &CompletedMatch) -> anyhow::Result<()>;
    async fn record_queue_join(&self, player_id: &PlayerId) -> anyhow::Result<()>;
    async fn record_queue_leave(&self, player_id: &PlayerId) -> anyhow::Result<()>;
}

/// Default store: appends completed matches as JSON lines and logs
/// queue churn. Stands in for the external database.
pub struct JsonlMatchStore {
    path: PathBuf,
}

impl JsonlMatchStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MatchStore for JsonlMatchStore {
    async fn save_completed_match(&self, result: &CompletedMatch) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(result)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }

    async fn record_queue_join(&self, player_id: &PlayerId) -> anyhow::Result<()> {
        info!("Queue join recorded for {}", player_id);
        Ok(())
    }

    async fn record_queue_leave(&self, player_id: &PlayerId) -> anyhow::Result<()> {
        info!("Queue leave recorded for {}", player_id);
        Ok(())
    }
}

/// Built-in snippets used when no text directory is configured. Small
/// code-shaped texts with brackets, punctuation and paragraph breaks
/// so every motion family has something to chew on.
const BUILTIN_TEXTS: [&str; 3] = [
    "fn main() {\n    let greeting = \"hello world\";\n    println!(\"{}\", greeting);\n}\n\nfn helper(x: i32) -> i32 {\n    x * 2\n}",
    "The quick brown fox jumps over the lazy dog.\nPack my box with five dozen liquor jugs!\n\nHow vexingly quick daft zebras jump?\nSphinx of black quartz, judge my vow.",
    "items = [1, 2, 3]\nfor item in items:\n    total += weights[item]\n\nif total > limit:\n    raise ValueError(\"too heavy\")\n\nprint(total)",
];

/// The set of playable text snippets for a server run.
pub struct TextLibrary {
    texts: Vec<String>,
}

impl TextLibrary {
    /// Load `*.txt` files from `dir`, falling back to the built-in
    /// snippets when the directory is missing or empty.
    pub fn load(dir: &Path) -> Self {
        let mut texts = Vec::new();
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "txt") {
                    match std::fs::read_to_string(&path) {
                        Ok(contents) if !contents.trim().is_empty() => texts.push(contents),
                        Ok(_) => {}
                        Err(e) => warn!("Failed to read text {:?}: {}", path, e),
                    }
                }
            }
        }
        if texts.is_empty() {
            info!("No text snippets under {:?}, using built-ins", dir);
            texts = BUILTIN_TEXTS.iter().map(|t| t.to_string()).collect();
        } else {
            info!("Loaded {} text snippets from {:?}", texts.len(), dir);
        }
        Self { texts }
    }

    /// Pick a random snippet for a new session.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        &self.texts[rng.random_range(0..self.texts.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_fallback() {
        let library = TextLibrary::load(Path::new("definitely/not/here"));
        let mut rng = rand::rng();
        let text = library.pick(&mut rng);
        assert!(!text.is_empty());
    }

    #[tokio::test]
    async fn test_jsonl_store_appends() {
        let dir = std::env::temp_dir().join(format!("keyduel-store-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("results.jsonl");
        let store = JsonlMatchStore::new(&path);
        let result = CompletedMatch {
            game_id: 1,
            match_id: 2,
            winner_id: "p1".to_string(),
            player1_id: "p1".to_string(),
            player1_score: 50,
            player2_id: "p2".to_string(),
            player2_score: 31,
            duration_seconds: 73,
        };
        store.save_completed_match(&result).await.unwrap();
        store.save_completed_match(&result).await.unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains(r#""winner_id":"p1""#));
        std::fs::remove_dir_all(&dir).ok();
    }
}
