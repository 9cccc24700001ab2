use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const POINTS_PER_CORRECT: u32 = 10;
pub const DEFAULT_MIN_QUESTIONS: u32 = 3;
pub const DEFAULT_TIME_LIMIT_SECONDS: u32 = 60;
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Difficulty tier shared by questions and players.
///
/// Tiers are ordinal: 1 = easy, 2 = medium, 3 = hard. Question bank
/// documents carry the numeric tier while join requests use the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn tier(&self) -> u8 {
        match self {
            Difficulty::Easy => 1,
            Difficulty::Medium => 2,
            Difficulty::Hard => 3,
        }
    }

    pub fn from_tier(tier: i64) -> Option<Self> {
        match tier {
            1 => Some(Difficulty::Easy),
            2 => Some(Difficulty::Medium),
            3 => Some(Difficulty::Hard),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" | "1" => Ok(Difficulty::Easy),
            "medium" | "2" => Ok(Difficulty::Medium),
            "hard" | "3" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Packet {
    Join {
        user_id: String,
        name: String,
        difficulty: Option<Difficulty>,
    },
    RequestProblem {
        user_id: String,
    },
    Answer {
        user_id: String,
        answer: String,
    },
    Finish {
        user_id: String,
    },
    RequestStandings,

    Joined {
        player: PlayerState,
    },
    Problem(ProblemView),
    AnswerResult(AnswerOutcome),
    Finished(FinishSummary),
    Standings {
        players: Vec<PlayerState>,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl Packet {
    /// True for packets a client sends and the server answers.
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            Packet::Join { .. }
                | Packet::RequestProblem { .. }
                | Packet::Answer { .. }
                | Packet::Finish { .. }
                | Packet::RequestStandings
        )
    }
}

/// Per-player progression as tracked by the session engine.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerState {
    pub id: String,
    pub name: String,
    pub position: u32,
    pub score: u32,
    pub alive: bool,
    pub difficulty: Difficulty,
    pub correct_count: u32,
    pub wrong_count: u32,
    pub answered_count: u32,
    pub consecutive_wrong: u32,
}

impl PlayerState {
    pub fn new(id: impl Into<String>, name: impl Into<String>, difficulty: Difficulty) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            position: 0,
            score: 0,
            alive: true,
            difficulty,
            correct_count: 0,
            wrong_count: 0,
            answered_count: 0,
            consecutive_wrong: 0,
        }
    }

    pub fn can_finish(&self, min_questions: u32) -> bool {
        self.answered_count >= min_questions
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProblemView {
    pub problem: String,
    pub image: Option<String>,
    pub can_finish: bool,
    pub answered_count: u32,
    pub min_questions: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub position: u32,
    pub alive: bool,
    pub score: u32,
    pub next_problem: String,
    pub next_image: Option<String>,
    pub can_finish: bool,
    pub answered_count: u32,
    pub min_questions: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FinishSummary {
    pub user_id: String,
    pub score: u32,
    pub position: u32,
    pub correct_count: u32,
    pub wrong_count: u32,
    pub answered_count: u32,
    pub playtime_seconds: u64,
    /// False when the results could not be persisted.
    pub recorded: bool,
}

/// Wire-level error category, one per engine failure.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NoQuestionsAvailable,
    PlayerNotFound,
    PlayerEliminated,
    NoActiveProblem,
    InvalidJoin,
    DuplicatePlayer,
    FinishGateNotMet,
    /// The response could not fit in a single datagram
    ResponseTooLarge,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_tiers() {
        for difficulty in Difficulty::ALL {
            assert_eq!(Difficulty::from_tier(difficulty.tier() as i64), Some(difficulty));
        }
        assert_eq!(Difficulty::from_tier(0), None);
        assert_eq!(Difficulty::from_tier(4), None);
    }

    #[test]
    fn test_difficulty_parsing() {
        assert_eq!("easy".parse::<Difficulty>(), Ok(Difficulty::Easy));
        assert_eq!(" Medium ".parse::<Difficulty>(), Ok(Difficulty::Medium));
        assert_eq!("3".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert!("extreme".parse::<Difficulty>().is_err());
        assert_eq!(Difficulty::default(), Difficulty::Medium);
    }

    #[test]
    fn test_player_creation() {
        let player = PlayerState::new("p1", "Ada", Difficulty::Hard);
        assert_eq!(player.id, "p1");
        assert_eq!(player.position, 0);
        assert_eq!(player.score, 0);
        assert!(player.alive);
        assert_eq!(player.answered_count, 0);
        assert_eq!(player.correct_count + player.wrong_count, 0);
    }

    #[test]
    fn test_can_finish_gate() {
        let mut player = PlayerState::new("p1", "Ada", Difficulty::Easy);
        assert!(player.can_finish(0));
        assert!(!player.can_finish(1));
        player.answered_count = 1;
        assert!(player.can_finish(1));
        assert!(!player.can_finish(2));
    }

    #[test]
    fn test_request_classification() {
        assert!(Packet::RequestStandings.is_request());
        assert!(Packet::Answer {
            user_id: "p1".to_string(),
            answer: "4".to_string(),
        }
        .is_request());
        assert!(!Packet::Error {
            kind: ErrorKind::PlayerNotFound,
            message: "missing".to_string(),
        }
        .is_request());
    }

    #[test]
    fn test_packet_serialization_answer_result() {
        let packet = Packet::AnswerResult(AnswerOutcome {
            correct: true,
            position: 3,
            alive: true,
            score: 30,
            next_problem: "7*6?".to_string(),
            next_image: None,
            can_finish: true,
            answered_count: 4,
            min_questions: 3,
        });

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();
        assert_eq!(deserialized, packet);
    }

    #[test]
    fn test_truncated_packet_rejected() {
        let packet = Packet::Join {
            user_id: "p1".to_string(),
            name: "Ada".to_string(),
            difficulty: Some(Difficulty::Easy),
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let result: Result<Packet, _> = bincode::deserialize(&serialized[..serialized.len() / 2]);
        assert!(result.is_err());
    }
}
