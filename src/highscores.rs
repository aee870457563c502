//! Persist the leaderboard to disk (XDG config or ~/.config/sumstack).

use crate::Mode;
use anyhow::Result;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// Entries kept per mode.
pub const LEADERBOARD_CAP: usize = 10;

const FILENAME: &str = "leaderboard.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed leaderboard file: {0}")]
    Format(#[from] serde_json::Error),
}

/// One finished round on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    pub score: u32,
    /// Calendar date of the round, e.g. "2026-08-06".
    pub date: String,
}

/// Top rounds per mode, sorted descending by score and truncated on insert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Leaderboard {
    pub classic: Vec<Entry>,
    pub time: Vec<Entry>,
    /// Last name entered, used as the next name-entry default.
    #[serde(default)]
    pub last_name: String,
}

impl Leaderboard {
    pub fn entries(&self, mode: Mode) -> &[Entry] {
        match mode {
            Mode::Classic => &self.classic,
            Mode::Time => &self.time,
        }
    }

    fn entries_mut(&mut self, mode: Mode) -> &mut Vec<Entry> {
        match mode {
            Mode::Classic => &mut self.classic,
            Mode::Time => &mut self.time,
        }
    }

    /// Best score for a mode; 0 when the board is empty.
    pub fn best(&self, mode: Mode) -> u32 {
        self.entries(mode).first().map_or(0, |e| e.score)
    }

    /// Whether `score` would make it onto the board (name entry is offered).
    pub fn qualifies(&self, mode: Mode, score: u32) -> bool {
        if score == 0 {
            return false;
        }
        let board = self.entries(mode);
        board.len() < LEADERBOARD_CAP || board.last().is_none_or(|e| score > e.score)
    }

    /// Insert a round, keep the board sorted descending and capped.
    /// Stable sort: on ties the older entry keeps its rank.
    pub fn record(&mut self, mode: Mode, name: &str, score: u32) {
        let entry = Entry {
            name: name.to_string(),
            score,
            date: Local::now().format("%Y-%m-%d").to_string(),
        };
        let board = self.entries_mut(mode);
        board.push(entry);
        board.sort_by(|a, b| b.score.cmp(&a.score));
        board.truncate(LEADERBOARD_CAP);
        self.last_name = name.to_string();
    }
}

/// Returns the path to the leaderboard file (config dir / sumstack / leaderboard.json).
fn config_path() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if xdg.is_empty() {
            std::env::var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".config")
        } else {
            PathBuf::from(xdg)
        }
    } else {
        std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".config"))
            .unwrap_or_else(|_| PathBuf::from("."))
    };
    base.join("sumstack").join(FILENAME)
}

/// Load the leaderboard from disk; missing or malformed files give an empty board.
pub fn load() -> Leaderboard {
    try_load().unwrap_or_default()
}

fn try_load() -> Result<Leaderboard, StoreError> {
    let content = fs::read_to_string(config_path())?;
    Ok(serde_json::from_str(&content)?)
}

/// Save the leaderboard to disk. Creates the config directory if needed.
pub fn save(board: &Leaderboard) -> Result<()> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(board)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_sorts_descending_and_truncates() {
        let mut board = Leaderboard::default();
        for score in [30, 10, 50, 20, 70, 40, 90, 60, 80, 100, 5, 110] {
            board.record(Mode::Classic, "p", score);
        }
        let scores: Vec<u32> = board.classic.iter().map(|e| e.score).collect();
        assert_eq!(scores, vec![110, 100, 90, 80, 70, 60, 50, 40, 30, 20]);
        assert_eq!(board.classic.len(), LEADERBOARD_CAP);
    }

    #[test]
    fn modes_have_separate_boards() {
        let mut board = Leaderboard::default();
        board.record(Mode::Classic, "a", 10);
        board.record(Mode::Time, "b", 20);
        assert_eq!(board.best(Mode::Classic), 10);
        assert_eq!(board.best(Mode::Time), 20);
        assert_eq!(board.entries(Mode::Classic).len(), 1);
    }

    #[test]
    fn qualify_rules() {
        let mut board = Leaderboard::default();
        assert!(!board.qualifies(Mode::Classic, 0));
        assert!(board.qualifies(Mode::Classic, 1));
        for score in 1..=10 {
            board.record(Mode::Classic, "p", score * 10);
        }
        // Board is full at scores 10..=100.
        assert!(!board.qualifies(Mode::Classic, 10));
        assert!(board.qualifies(Mode::Classic, 11));
        assert!(board.qualifies(Mode::Classic, 500));
    }

    #[test]
    fn ties_keep_older_entry_first() {
        let mut board = Leaderboard::default();
        board.record(Mode::Time, "first", 50);
        board.record(Mode::Time, "second", 50);
        assert_eq!(board.time[0].name, "first");
        assert_eq!(board.time[1].name, "second");
    }

    #[test]
    fn last_name_follows_record() {
        let mut board = Leaderboard::default();
        board.record(Mode::Classic, "ada", 10);
        assert_eq!(board.last_name, "ada");
    }
}
