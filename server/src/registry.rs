//! Player registration and per-player state storage
//!
//! The registry maps player ids to slots. Each slot sits behind its own async
//! mutex, so updates for one player are applied one at a time while requests
//! for different players never wait on each other. The map lock is only held
//! long enough to look up or insert a slot handle.

use crate::error::GameError;
use crate::question_bank::Question;
use chrono::{DateTime, Local};
use clap::ValueEnum;
use log::info;
use serde::{Deserialize, Serialize};
use shared::{Difficulty, PlayerState};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// What happens when a join arrives for an id that is already registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejoinPolicy {
    /// Overwrite the previous progress with a fresh player
    #[default]
    Reset,
    /// Refuse the join with `DuplicatePlayer`
    Reject,
}

/// One answered question in a player's transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question: String,
    pub given: String,
    pub expected: String,
    pub correct: bool,
}

/// Totals already handed to persistence by earlier finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordedTally {
    pub correct: u32,
    pub wrong: u32,
    pub score: u32,
    pub playtime_seconds: u64,
}

/// Everything the engine tracks for a single player.
#[derive(Debug)]
pub struct PlayerSlot {
    pub state: PlayerState,
    /// Live assignment, replaced on every new problem
    pub problem: Option<Arc<Question>>,
    pub joined_at: DateTime<Local>,
    pub transcript: Vec<AnswerRecord>,
    pub recorded: RecordedTally,
}

impl PlayerSlot {
    fn new(state: PlayerState, problem: Option<Arc<Question>>) -> Self {
        Self {
            state,
            problem,
            joined_at: Local::now(),
            transcript: Vec::new(),
            recorded: RecordedTally::default(),
        }
    }
}

pub type PlayerHandle = Arc<Mutex<PlayerSlot>>;

pub struct PlayerRegistry {
    players: RwLock<HashMap<String, PlayerHandle>>,
    rejoin: RejoinPolicy,
}

impl PlayerRegistry {
    pub fn new(rejoin: RejoinPolicy) -> Self {
        Self {
            players: RwLock::new(HashMap::new()),
            rejoin,
        }
    }

    /// Registers a player with a fresh state and the given first problem.
    ///
    /// An existing id is reset in place under [`RejoinPolicy::Reset`], so a
    /// submission already waiting on the old slot sees the new state.
    pub async fn join(
        &self,
        id: &str,
        name: &str,
        difficulty: Difficulty,
        problem: Option<Arc<Question>>,
    ) -> Result<PlayerState, GameError> {
        let state = PlayerState::new(id, name, difficulty);
        let mut players = self.players.write().await;

        if let Some(existing) = players.get(id) {
            if self.rejoin == RejoinPolicy::Reject {
                return Err(GameError::DuplicatePlayer(id.to_string()));
            }

            let mut slot = existing.lock().await;
            *slot = PlayerSlot::new(state.clone(), problem);
            info!("Player {} ({}) rejoined, progress reset", id, name);
            return Ok(state);
        }

        players.insert(
            id.to_string(),
            Arc::new(Mutex::new(PlayerSlot::new(state.clone(), problem))),
        );
        info!("Player {} ({}) joined at {} difficulty", id, name, difficulty);
        Ok(state)
    }

    pub async fn handle(&self, id: &str) -> Result<PlayerHandle, GameError> {
        let players = self.players.read().await;
        players
            .get(id)
            .cloned()
            .ok_or_else(|| GameError::PlayerNotFound(id.to_string()))
    }

    pub async fn lookup(&self, id: &str) -> Result<PlayerState, GameError> {
        let handle = self.handle(id).await?;
        let slot = handle.lock().await;
        Ok(slot.state.clone())
    }

    /// Snapshot of every player, leaders first.
    pub async fn standings(&self) -> Vec<PlayerState> {
        let handles: Vec<PlayerHandle> = {
            let players = self.players.read().await;
            players.values().cloned().collect()
        };

        let mut states = Vec::with_capacity(handles.len());
        for handle in handles {
            states.push(handle.lock().await.state.clone());
        }

        states.sort_by(|a, b| {
            b.position
                .cmp(&a.position)
                .then(b.score.cmp(&a.score))
                .then_with(|| a.id.cmp(&b.id))
        });
        states
    }

    pub async fn len(&self) -> usize {
        self.players.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.players.read().await.is_empty()
    }
}
