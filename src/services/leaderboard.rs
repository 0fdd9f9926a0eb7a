//! The shared top-N leaderboard.
//!
//! The whole board is one JSON array under a fixed key. `submit` is a
//! read-modify-write of that value: append, stable sort ascending by
//! `captchaSeconds`, truncate, overwrite. Under [`WriteMode::LastWriteWins`]
//! two concurrent submits may read the same snapshot and the later write drops
//! the earlier entry. [`WriteMode::Serialized`] holds a writer lock across the
//! whole cycle so no update is lost within one process.

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::error::AppError;
use crate::models::leaderboard::ScoreEntry;
use crate::store::{KvStore, StoreError};

pub const LEADERBOARD_KEY: &str = "captcha-race-leaderboard";
pub const DEFAULT_CAPACITY: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    LastWriteWins,
    Serialized,
}

impl FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last-write-wins" | "lww" => Ok(WriteMode::LastWriteWins),
            "serialized" => Ok(WriteMode::Serialized),
            other => Err(format!(
                "unknown write mode `{other}` (expected last-write-wins or serialized)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LeaderboardOptions {
    pub key: String,
    pub capacity: usize,
    pub write_mode: WriteMode,
    pub require_name: bool,
    /// Surface store outages on reads instead of answering with an empty board.
    pub strict_reads: bool,
}

impl Default for LeaderboardOptions {
    fn default() -> Self {
        Self {
            key: LEADERBOARD_KEY.to_string(),
            capacity: DEFAULT_CAPACITY,
            write_mode: WriteMode::LastWriteWins,
            require_name: false,
            strict_reads: false,
        }
    }
}

pub struct LeaderboardStore {
    store: Arc<dyn KvStore>,
    options: LeaderboardOptions,
    write_lock: Mutex<()>,
}

impl LeaderboardStore {
    pub fn new(store: Arc<dyn KvStore>, options: LeaderboardOptions) -> Self {
        Self {
            store,
            options,
            write_lock: Mutex::new(()),
        }
    }

    pub fn options(&self) -> &LeaderboardOptions {
        &self.options
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Returns the stored board as persisted. Ordering was applied on write.
    pub fn list(&self) -> Result<Vec<ScoreEntry>, AppError> {
        match self.load() {
            Ok(entries) => Ok(entries),
            Err(e) if self.options.strict_reads => Err(e.into()),
            Err(e) => {
                warn!(key = %self.options.key, error = %e, "leaderboard read failed, serving empty board");
                Ok(Vec::new())
            }
        }
    }

    /// Appends `entry` and persists the re-ranked board, returning it.
    ///
    /// Unparsable stored data is discarded like an absent key. A store that
    /// cannot be read or written fails the submit and nothing is persisted.
    pub fn submit(&self, entry: ScoreEntry) -> Result<Vec<ScoreEntry>, AppError> {
        let _guard = match self.options.write_mode {
            WriteMode::Serialized => Some(
                self.write_lock
                    .lock()
                    .map_err(|_| StoreError::Unavailable("leaderboard writer lock poisoned".into()))?,
            ),
            WriteMode::LastWriteWins => None,
        };

        let mut entries = self.load()?;
        let entry_id = entry.id.clone();
        let seconds = entry.captcha_seconds;
        entries.push(entry);
        rank_entries(&mut entries, self.options.capacity);

        let encoded = serde_json::to_string(&entries).map_err(StoreError::from)?;
        self.store.put(&self.options.key, &encoded)?;

        match entries.iter().position(|e| e.id == entry_id) {
            Some(idx) => info!(id = %entry_id, seconds, rank = idx + 1, "score accepted"),
            None => info!(id = %entry_id, seconds, "score accepted outside top {}", self.options.capacity),
        }
        Ok(entries)
    }

    /// Reads the store without touching the board. Used by the health check.
    pub fn probe(&self) -> Result<(), StoreError> {
        self.store.get(&self.options.key).map(|_| ())
    }

    fn load(&self) -> Result<Vec<ScoreEntry>, StoreError> {
        let Some(raw) = self.store.get(&self.options.key)? else {
            return Ok(Vec::new());
        };
        let items: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(e) => {
                warn!(key = %self.options.key, error = %e, "stored leaderboard is malformed, treating as empty");
                return Ok(Vec::new());
            }
        };

        // A single bad element costs only that element, not the board.
        let entries = items
            .into_iter()
            .enumerate()
            .filter_map(|(idx, item)| match serde_json::from_value::<ScoreEntry>(item) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(key = %self.options.key, index = idx, error = %e, "skipping malformed stored entry");
                    None
                }
            })
            .collect();
        Ok(entries)
    }
}

/// Stable ascending sort by `captcha_seconds`, then keep the first `capacity`.
/// Ties keep insertion order.
pub fn rank_entries(entries: &mut Vec<ScoreEntry>, capacity: usize) {
    entries.sort_by(|a, b| a.captcha_seconds.total_cmp(&b.captcha_seconds));
    entries.truncate(capacity);
}
