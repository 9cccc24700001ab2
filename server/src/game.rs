//! Authoritative quiz session state
//!
//! [`SessionEngine`] owns every player's progression and live problem. The
//! request layer holds it behind an `Arc` and calls into it once per request;
//! the engine never does I/O itself except through the [`ResultStore`] it is
//! given, which runs on the blocking pool.

use crate::error::{GameError, PersistenceError};
use crate::persistence::{ResultStore, SessionSnapshot, UserStatsDelta};
use crate::question_bank::{Question, QuestionBank, TestConfig};
use crate::registry::{AnswerRecord, PlayerRegistry, RecordedTally, RejoinPolicy};
use crate::selector;
use chrono::Local;
use log::{debug, error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{AnswerOutcome, Difficulty, FinishSummary, PlayerState, ProblemView, POINTS_PER_CORRECT};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Tunable game rules, fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionRules {
    pub rejoin: RejoinPolicy,
    /// Consecutive wrong answers that eliminate a player. `None` never eliminates.
    pub max_consecutive_wrong: Option<u32>,
}

pub struct SessionEngine {
    bank: Arc<QuestionBank>,
    config: TestConfig,
    rules: SessionRules,
    registry: PlayerRegistry,
    rng: Mutex<StdRng>,
    store: Arc<dyn ResultStore>,
}

impl SessionEngine {
    pub fn new(
        bank: Arc<QuestionBank>,
        config: TestConfig,
        rules: SessionRules,
        store: Arc<dyn ResultStore>,
    ) -> Self {
        Self::with_rng(bank, config, rules, store, StdRng::from_entropy())
    }

    /// Builds an engine drawing problems from the given generator.
    pub fn with_rng(
        bank: Arc<QuestionBank>,
        config: TestConfig,
        rules: SessionRules,
        store: Arc<dyn ResultStore>,
        rng: StdRng,
    ) -> Self {
        Self {
            bank,
            config,
            registry: PlayerRegistry::new(rules.rejoin),
            rules,
            rng: Mutex::new(rng),
            store,
        }
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    pub fn rules(&self) -> SessionRules {
        self.rules
    }

    async fn next_problem(&self, difficulty: Difficulty) -> Result<Arc<Question>, GameError> {
        let mut rng = self.rng.lock().await;
        selector::select(&self.bank, difficulty, &mut *rng)
    }

    /// Registers a player and assigns their first problem.
    ///
    /// Surrounding whitespace is stripped from the id and the name.
    /// Nothing is registered when the bank cannot supply a problem.
    pub async fn join(
        &self,
        id: &str,
        name: &str,
        difficulty: Difficulty,
    ) -> Result<PlayerState, GameError> {
        let (id, name) = (id.trim(), name.trim());
        if id.is_empty() {
            return Err(GameError::InvalidJoin("user id is empty".to_string()));
        }
        if name.is_empty() {
            return Err(GameError::InvalidJoin("name is empty".to_string()));
        }

        let problem = self.next_problem(difficulty).await?;
        self.registry.join(id, name, difficulty, Some(problem)).await
    }

    pub async fn lookup(&self, id: &str) -> Result<PlayerState, GameError> {
        self.registry.lookup(id).await
    }

    pub async fn standings(&self) -> Vec<PlayerState> {
        self.registry.standings().await
    }

    pub async fn player_count(&self) -> usize {
        self.registry.len().await
    }

    /// Returns the player's live problem, assigning one if none is set.
    pub async fn get_current_problem(&self, id: &str) -> Result<ProblemView, GameError> {
        let handle = self.registry.handle(id).await?;
        let mut slot = handle.lock().await;

        let problem = match &slot.problem {
            Some(problem) => Arc::clone(problem),
            None => {
                let problem = self.next_problem(slot.state.difficulty).await?;
                slot.problem = Some(Arc::clone(&problem));
                problem
            }
        };

        Ok(ProblemView {
            problem: problem.text.clone(),
            image: problem.image.clone(),
            can_finish: slot.state.can_finish(self.config.min_questions),
            answered_count: slot.state.answered_count,
            min_questions: self.config.min_questions,
        })
    }

    /// Checks an answer against the live problem and moves on to the next one.
    ///
    /// The follow-up problem is drawn before the player is touched, so every
    /// error leaves the player exactly as it was.
    pub async fn submit_answer(&self, id: &str, answer: &str) -> Result<AnswerOutcome, GameError> {
        let handle = self.registry.handle(id).await?;
        let mut guard = handle.lock().await;
        let slot = &mut *guard;

        if !slot.state.alive {
            return Err(GameError::PlayerEliminated(id.to_string()));
        }
        let current = slot
            .problem
            .clone()
            .ok_or_else(|| GameError::NoActiveProblem(id.to_string()))?;
        let next = self.next_problem(slot.state.difficulty).await?;

        let correct = current.accepts(answer);
        let state = &mut slot.state;
        if correct {
            state.position += 1;
            state.score += POINTS_PER_CORRECT;
            state.correct_count += 1;
            state.consecutive_wrong = 0;
        } else {
            state.wrong_count += 1;
            state.consecutive_wrong += 1;
            if let Some(limit) = self.rules.max_consecutive_wrong {
                if state.consecutive_wrong >= limit {
                    state.alive = false;
                    info!(
                        "Player {} eliminated after {} wrong answers in a row",
                        id, state.consecutive_wrong
                    );
                }
            }
        }
        state.answered_count += 1;

        let min_questions = self.config.min_questions;
        let outcome = AnswerOutcome {
            correct,
            position: state.position,
            alive: state.alive,
            score: state.score,
            next_problem: next.text.clone(),
            next_image: next.image.clone(),
            can_finish: state.can_finish(min_questions),
            answered_count: state.answered_count,
            min_questions,
        };

        slot.transcript.push(AnswerRecord {
            question: current.text.clone(),
            given: answer.to_string(),
            expected: current.answer.clone(),
            correct,
        });
        slot.problem = Some(next);

        debug!(
            "Player {} answered {} ({}/{})",
            id,
            if correct { "correctly" } else { "wrong" },
            outcome.answered_count,
            min_questions
        );
        Ok(outcome)
    }

    /// Records the player's results through the result store.
    ///
    /// Allowed once the can-finish gate is met, or at any time after the
    /// player has been eliminated. Only progress made since the previous
    /// finish is added to the user's stats. Storage failures are logged and
    /// reported through `recorded`, never as an error.
    pub async fn finish(&self, id: &str) -> Result<FinishSummary, GameError> {
        let handle = self.registry.handle(id).await?;

        let (delta, snapshot, summary) = {
            let mut guard = handle.lock().await;
            let slot = &mut *guard;
            let state = &slot.state;
            let min_questions = self.config.min_questions;

            if state.alive && !state.can_finish(min_questions) {
                return Err(GameError::FinishGateNotMet {
                    id: id.to_string(),
                    answered: state.answered_count,
                    required: min_questions,
                });
            }

            let now = Local::now();
            let playtime_seconds = (now - slot.joined_at).num_seconds().max(0) as u64;

            let delta = UserStatsDelta {
                name: state.name.clone(),
                playtime_seconds: playtime_seconds.saturating_sub(slot.recorded.playtime_seconds),
                correct: state.correct_count.saturating_sub(slot.recorded.correct),
                wrong: state.wrong_count.saturating_sub(slot.recorded.wrong),
                score: state.score.saturating_sub(slot.recorded.score),
                played_at: now,
            };

            let snapshot = SessionSnapshot {
                title: self.config.title.clone(),
                user_id: state.id.clone(),
                name: state.name.clone(),
                difficulty: state.difficulty,
                position: state.position,
                score: state.score,
                correct_count: state.correct_count,
                wrong_count: state.wrong_count,
                answered_count: state.answered_count,
                min_questions,
                alive: state.alive,
                started_at: slot.joined_at,
                finished_at: now,
                answers: slot.transcript.clone(),
            };

            let summary = FinishSummary {
                user_id: state.id.clone(),
                score: state.score,
                position: state.position,
                correct_count: state.correct_count,
                wrong_count: state.wrong_count,
                answered_count: state.answered_count,
                playtime_seconds,
                recorded: false,
            };

            slot.recorded = RecordedTally {
                correct: state.correct_count,
                wrong: state.wrong_count,
                score: state.score,
                playtime_seconds,
            };

            (delta, snapshot, summary)
        };

        let recorded = self.persist(id, delta, snapshot).await;
        info!(
            "Player {} finished with score {} after {} questions",
            id, summary.score, summary.answered_count
        );
        Ok(FinishSummary { recorded, ..summary })
    }

    async fn persist(&self, id: &str, delta: UserStatsDelta, snapshot: SessionSnapshot) -> bool {
        let store = Arc::clone(&self.store);
        let user_id = id.to_string();

        let result = tokio::task::spawn_blocking(move || {
            let stats = store.record_user_stats(&user_id, &delta);
            let transcript = store.record_session_transcript(&snapshot);
            (stats, transcript)
        })
        .await;

        let (stats, transcript) = match result {
            Ok(results) => results,
            Err(e) => {
                let err = PersistenceError::Task(e.to_string());
                error!("Failed to record results for {}: {}", id, err);
                return false;
            }
        };

        let mut recorded = true;
        if let Err(e) = stats {
            error!("Failed to record user stats for {}: {}", id, e);
            recorded = false;
        }
        if let Err(e) = transcript {
            error!("Failed to record session transcript for {}: {}", id, e);
            recorded = false;
        }
        recorded
    }
}
