//! Durable storage for finished games
//!
//! The engine only talks to the [`ResultStore`] trait. [`FileStore`] keeps
//! aggregate per-user stats in a CSV file and writes one JSON transcript per
//! finish; [`MemoryStore`] keeps everything in memory for tests and for runs
//! that should leave nothing on disk.

use crate::error::PersistenceError;
use crate::registry::AnswerRecord;
use chrono::{DateTime, Local};
use log::debug;
use serde::{Deserialize, Serialize};
use shared::Difficulty;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

pub const USERS_FILE: &str = "users.csv";
pub const SESSIONS_DIR: &str = "sessions";

/// Progress made since the user's previous finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserStatsDelta {
    pub name: String,
    pub playtime_seconds: u64,
    pub correct: u32,
    pub wrong: u32,
    pub score: u32,
    pub played_at: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub title: String,
    pub user_id: String,
    pub name: String,
    pub difficulty: Difficulty,
    pub position: u32,
    pub score: u32,
    pub correct_count: u32,
    pub wrong_count: u32,
    pub answered_count: u32,
    pub min_questions: u32,
    pub alive: bool,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub answers: Vec<AnswerRecord>,
}

/// One row of the users file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "UserID")]
    pub user_id: String,
    #[serde(rename = "Playtime")]
    pub playtime: u64,
    #[serde(rename = "CorrectAnswers")]
    pub correct_answers: u32,
    #[serde(rename = "WrongAnswers")]
    pub wrong_answers: u32,
    #[serde(rename = "TotalScore")]
    pub total_score: u32,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "LastPlayed")]
    pub last_played: String,
}

impl UserRecord {
    fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            playtime: 0,
            correct_answers: 0,
            wrong_answers: 0,
            total_score: 0,
            name: String::new(),
            last_played: String::new(),
        }
    }

    fn apply(&mut self, delta: &UserStatsDelta) {
        self.playtime += delta.playtime_seconds;
        self.correct_answers += delta.correct;
        self.wrong_answers += delta.wrong;
        self.total_score += delta.score;
        self.name = delta.name.clone();
        self.last_played = delta.played_at.format("%Y-%m-%d %H:%M:%S").to_string();
    }
}

/// Append-only sink for game results. Calls may block on I/O.
pub trait ResultStore: Send + Sync {
    fn record_user_stats(&self, user_id: &str, delta: &UserStatsDelta) -> Result<(), PersistenceError>;

    fn record_session_transcript(&self, snapshot: &SessionSnapshot) -> Result<(), PersistenceError>;
}

/// Flat-file store rooted at a data directory.
///
/// Clones share one write lock, so concurrent finishes never lose each
/// other's rows. The users file is replaced by rename and is never seen
/// half written.
#[derive(Debug, Clone)]
pub struct FileStore {
    users_path: PathBuf,
    sessions_dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            users_path: data_dir.join(USERS_FILE),
            sessions_dir: data_dir.join(SESSIONS_DIR),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn users_path(&self) -> &Path {
        &self.users_path
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    /// Reads every user row. A missing file means no users yet.
    pub fn load_user_stats(&self) -> Result<Vec<UserRecord>, PersistenceError> {
        if !self.users_path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.users_path)?;
        let mut records = Vec::new();
        for row in reader.deserialize::<UserRecord>() {
            records.push(row?);
        }
        Ok(records)
    }

    /// Reads every stored transcript, oldest first.
    pub fn load_session_transcripts(&self) -> Result<Vec<SessionSnapshot>, PersistenceError> {
        if !self.sessions_dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&self.sessions_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().map_or(false, |ext| ext == "json"))
            .collect();
        paths.sort();

        let mut sessions = Vec::with_capacity(paths.len());
        for path in paths {
            let contents = fs::read_to_string(&path)?;
            sessions.push(serde_json::from_str::<SessionSnapshot>(&contents)?);
        }
        Ok(sessions)
    }

    fn write_user_stats(&self, records: &[UserRecord]) -> Result<(), PersistenceError> {
        if let Some(parent) = self.users_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let staging = self.users_path.with_extension("csv.tmp");
        let mut writer = csv::Writer::from_path(&staging)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        drop(writer);

        fs::rename(&staging, &self.users_path)?;
        Ok(())
    }
}

impl ResultStore for FileStore {
    fn record_user_stats(&self, user_id: &str, delta: &UserStatsDelta) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut records = self.load_user_stats()?;

        match records.iter_mut().find(|r| r.user_id == user_id) {
            Some(record) => record.apply(delta),
            None => {
                let mut record = UserRecord::new(user_id);
                record.apply(delta);
                records.push(record);
            }
        }

        self.write_user_stats(&records)?;
        debug!("Recorded stats for {} in {}", user_id, self.users_path.display());
        Ok(())
    }

    fn record_session_transcript(&self, snapshot: &SessionSnapshot) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.sessions_dir)?;

        let path = self.sessions_dir.join(transcript_file_name(snapshot));
        let contents = serde_json::to_string_pretty(snapshot)?;
        fs::write(&path, contents)?;
        debug!("Wrote session transcript {}", path.display());
        Ok(())
    }
}

fn transcript_file_name(snapshot: &SessionSnapshot) -> String {
    let user: String = snapshot
        .user_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!(
        "session_{}_{}.json",
        snapshot.finished_at.format("%Y%m%d_%H%M%S_%3f"),
        user
    )
}

/// In-memory store with the same aggregation rules as [`FileStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, UserRecord>>,
    sessions: Mutex<Vec<SessionSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&self, user_id: &str) -> Option<UserRecord> {
        let users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        users.get(user_id).cloned()
    }

    pub fn sessions(&self) -> Vec<SessionSnapshot> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ResultStore for MemoryStore {
    fn record_user_stats(&self, user_id: &str, delta: &UserStatsDelta) -> Result<(), PersistenceError> {
        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        users
            .entry(user_id.to_string())
            .or_insert_with(|| UserRecord::new(user_id))
            .apply(delta);
        Ok(())
    }

    fn record_session_transcript(&self, snapshot: &SessionSnapshot) -> Result<(), PersistenceError> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(snapshot.clone());
        Ok(())
    }
}
