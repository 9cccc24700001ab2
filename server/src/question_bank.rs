//! Question bank loading and the immutable test configuration
//!
//! A bank is read once at startup from a JSON document of the form
//!
//! ```json
//! {
//!   "title": "Math Test",
//!   "Time": "60",
//!   "Difficulty": "2",
//!   "MinQuestion": "3",
//!   "questions": [
//!     { "text": "2+2?", "image": "", "answer": "4", "difficulty": "1" }
//!   ]
//! }
//! ```
//!
//! Loading never fails hard. A missing or corrupt document produces an empty
//! bank and the default configuration, and each question entry is validated on
//! its own so one bad entry only drops that entry. An empty bank leaves the
//! server running but unable to hand out problems.

use crate::error::LoadError;
use base64::{engine::general_purpose, Engine as _};
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::Value;
use shared::{Difficulty, DEFAULT_MIN_QUESTIONS, DEFAULT_TIME_LIMIT_SECONDS};
use std::fs;
use std::path::Path;
use std::sync::Arc;

const DEFAULT_TITLE: &str = "Math Test";

/// Largest image accepted from a bank. Its base64 form plus a short question
/// still fits one response datagram.
pub const MAX_IMAGE_BYTES: usize = 45_000;

/// A single quiz item. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub text: String,
    /// Base64 encoded image content, opaque to the engine
    pub image: Option<String>,
    pub answer: String,
    pub difficulty: Difficulty,
}

impl Question {
    pub fn new(text: impl Into<String>, answer: impl Into<String>, difficulty: Difficulty) -> Self {
        Self {
            text: text.into(),
            image: None,
            answer: answer.into(),
            difficulty,
        }
    }

    /// Case-insensitive comparison, ignoring surrounding whitespace.
    pub fn accepts(&self, given: &str) -> bool {
        given.trim().to_lowercase() == self.answer.trim().to_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestConfig {
    pub title: String,
    pub time_limit_seconds: u32,
    pub difficulty: Difficulty,
    pub min_questions: u32,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            time_limit_seconds: DEFAULT_TIME_LIMIT_SECONDS,
            difficulty: Difficulty::Medium,
            min_questions: DEFAULT_MIN_QUESTIONS,
        }
    }
}

/// Ordered, read-only collection of questions shared by every request.
#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    questions: Vec<Arc<Question>>,
}

impl QuestionBank {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions: questions.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn questions(&self) -> &[Arc<Question>] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn count_for(&self, difficulty: Difficulty) -> usize {
        self.questions
            .iter()
            .filter(|q| q.difficulty == difficulty)
            .count()
    }
}

#[derive(Debug, Deserialize)]
struct BankDocument {
    #[serde(default)]
    title: Option<Value>,
    #[serde(rename = "Time", default)]
    time: Option<Value>,
    #[serde(rename = "Difficulty", default)]
    difficulty: Option<Value>,
    #[serde(rename = "MinQuestion", default)]
    min_question: Option<Value>,
    #[serde(default)]
    questions: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    #[serde(default)]
    text: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    answer: Option<Value>,
    #[serde(default)]
    difficulty: Option<Value>,
}

/// Loads a bank from disk, degrading to an empty bank on any failure.
pub fn load(path: &Path) -> (QuestionBank, TestConfig) {
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let result = fs::read_to_string(path)
        .map_err(LoadError::from)
        .and_then(|contents| parse(&contents, base_dir));

    match result {
        Ok((bank, config)) => {
            if bank.is_empty() {
                error!("No valid questions found in {}", path.display());
            } else {
                info!(
                    "Loaded {} questions for '{}' ({} easy, {} medium, {} hard)",
                    bank.len(),
                    config.title,
                    bank.count_for(Difficulty::Easy),
                    bank.count_for(Difficulty::Medium),
                    bank.count_for(Difficulty::Hard)
                );
            }
            (bank, config)
        }
        Err(e) => {
            error!("{} ({})", e, path.display());
            (QuestionBank::default(), TestConfig::default())
        }
    }
}

/// Parses a bank document. Image paths resolve against `base_dir`.
pub fn parse(contents: &str, base_dir: &Path) -> Result<(QuestionBank, TestConfig), LoadError> {
    let document: BankDocument = serde_json::from_str(contents)?;
    let config = parse_config(&document);

    let mut questions = Vec::with_capacity(document.questions.len());
    for (index, entry) in document.questions.into_iter().enumerate() {
        match parse_question(entry, base_dir) {
            Ok(question) => questions.push(question),
            Err(reason) => warn!("Skipping invalid question #{}: {}", index + 1, reason),
        }
    }

    Ok((QuestionBank::new(questions), config))
}

fn parse_config(document: &BankDocument) -> TestConfig {
    let defaults = TestConfig::default();

    let title = match &document.title {
        Some(Value::String(title)) if !title.trim().is_empty() => title.clone(),
        Some(Value::String(_)) | None => defaults.title,
        Some(other) => other.to_string(),
    };

    let time_limit_seconds =
        config_count(&document.time, "Time").unwrap_or(defaults.time_limit_seconds);

    let difficulty = match config_number(&document.difficulty, "Difficulty") {
        Some(tier) => Difficulty::from_tier(tier).unwrap_or_else(|| {
            warn!("Difficulty {} out of range, using {}", tier, defaults.difficulty);
            defaults.difficulty
        }),
        None => defaults.difficulty,
    };

    let min_questions =
        config_count(&document.min_question, "MinQuestion").unwrap_or(defaults.min_questions);

    TestConfig {
        title,
        time_limit_seconds,
        difficulty,
        min_questions,
    }
}

fn config_number(value: &Option<Value>, field: &str) -> Option<i64> {
    let value = value.as_ref()?;
    let parsed = numeric(value);
    if parsed.is_none() {
        warn!("Ignoring unparsable {} value {}", field, value);
    }
    parsed
}

/// A non-negative count. Out-of-range values are ignored with a warning.
fn config_count(value: &Option<Value>, field: &str) -> Option<u32> {
    let n = config_number(value, field)?;
    match u32::try_from(n) {
        Ok(count) => Some(count),
        Err(_) => {
            warn!("{} value {} out of range, using default", field, n);
            None
        }
    }
}

/// Accepts JSON numbers and numeric strings, as written by the quiz builder.
fn numeric(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_question(entry: Value, base_dir: &Path) -> Result<Question, String> {
    let raw: RawQuestion = serde_json::from_value(entry).map_err(|e| e.to_string())?;

    let difficulty = match &raw.difficulty {
        None | Some(Value::Null) => Difficulty::Medium,
        Some(value) => {
            let tier = numeric(value).ok_or_else(|| format!("unparsable difficulty {}", value))?;
            Difficulty::from_tier(tier).ok_or_else(|| format!("difficulty {} out of range", tier))?
        }
    };

    let answer = match &raw.answer {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        None | Some(Value::Null) => String::new(),
        Some(other) => return Err(format!("unsupported answer {}", other)),
    };
    if answer.is_empty() {
        return Err("missing answer".to_string());
    }

    let image = match raw.image.as_deref().map(str::trim) {
        Some(path) if !path.is_empty() => encode_image(&base_dir.join(path)),
        _ => None,
    };

    if raw.text.trim().is_empty() && image.is_none() {
        return Err("neither text nor a readable image".to_string());
    }

    Ok(Question {
        text: raw.text,
        image,
        answer,
        difficulty,
    })
}

fn encode_image(path: &Path) -> Option<String> {
    match fs::read(path) {
        Ok(bytes) if bytes.len() > MAX_IMAGE_BYTES => {
            warn!(
                "Image {} is {} bytes, over the {} byte limit",
                path.display(),
                bytes.len(),
                MAX_IMAGE_BYTES
            );
            None
        }
        Ok(bytes) => Some(general_purpose::STANDARD.encode(bytes)),
        Err(e) => {
            warn!("Could not read image {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use std::io::Write;

    fn parse_str(contents: &str) -> (QuestionBank, TestConfig) {
        parse(contents, Path::new(".")).unwrap()
    }

    #[test]
    fn test_answer_matching_ignores_case() {
        let question = Question::new("Capital of France?", "paris", Difficulty::Easy);
        assert!(question.accepts("Paris"));
        assert!(question.accepts("paris"));
        assert!(question.accepts("  PARIS\n"));
        assert!(!question.accepts("Lyon"));
        assert!(!question.accepts("par is"));
    }

    #[test]
    fn test_parse_builder_document() {
        let (bank, config) = parse_str(
            r#"{
                "title": "Arithmetic",
                "Time": "90",
                "Difficulty": "3",
                "MinQuestion": "5",
                "questions": [
                    {"text": "2+2?", "image": "", "answer": "4", "difficulty": "1"},
                    {"text": "12*12?", "image": "", "answer": " 144 ", "difficulty": "3"}
                ]
            }"#,
        );

        assert_eq!(config.title, "Arithmetic");
        assert_eq!(config.time_limit_seconds, 90);
        assert_eq!(config.difficulty, Difficulty::Hard);
        assert_eq!(config.min_questions, 5);

        assert_eq!(bank.len(), 2);
        assert_eq!(bank.questions()[0].text, "2+2?");
        assert_eq!(bank.questions()[0].difficulty, Difficulty::Easy);
        assert_eq!(bank.questions()[0].image, None);
        assert_eq!(bank.questions()[1].answer, "144");
    }

    #[test]
    fn test_numeric_fields_accept_numbers() {
        let (bank, config) = parse_str(
            r#"{"Time": 30, "MinQuestion": 0,
                "questions": [{"text": "1+1?", "answer": "2", "difficulty": 2}]}"#,
        );
        assert_eq!(config.time_limit_seconds, 30);
        assert_eq!(config.min_questions, 0);
        assert_eq!(config.title, "Math Test");
        assert_eq!(bank.questions()[0].difficulty, Difficulty::Medium);
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let (bank, _) = parse_str(
            r#"{"questions": [
                {"text": "ok?", "answer": "yes", "difficulty": "2"},
                {"text": "bad tier", "answer": "x", "difficulty": "7"},
                {"text": "not a number", "answer": "x", "difficulty": "hard"},
                {"text": "no answer", "answer": "  "},
                {"text": "", "image": "missing.png", "answer": "x"},
                "not even an object",
                {"text": "default tier", "answer": "z"}
            ]}"#,
        );

        let texts: Vec<&str> = bank.questions().iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts, vec!["ok?", "default tier"]);
        assert_eq!(bank.questions()[1].difficulty, Difficulty::Medium);
    }

    #[test]
    fn test_numeric_answers_are_accepted() {
        let (bank, _) = parse_str(
            r#"{"questions": [
                {"text": "2+2?", "answer": 4, "difficulty": 1},
                {"text": "Half of 5?", "answer": 2.5},
                {"text": "Pick one", "answer": ["a", "b"]}
            ]}"#,
        );

        assert_eq!(bank.len(), 2);
        assert_eq!(bank.questions()[0].answer, "4");
        assert!(bank.questions()[0].accepts(" 4 "));
        assert_eq!(bank.questions()[1].answer, "2.5");
    }

    #[test]
    fn test_negative_counts_fall_back_to_defaults() {
        let (_, config) = parse_str(r#"{"Time": -30, "MinQuestion": "-2", "questions": []}"#);
        assert_eq!(config.time_limit_seconds, DEFAULT_TIME_LIMIT_SECONDS);
        assert_eq!(config.min_questions, DEFAULT_MIN_QUESTIONS);

        assert_eq!(config_count(&Some(Value::from(-1)), "MinQuestion"), None);
        assert_eq!(config_count(&Some(Value::from("7")), "MinQuestion"), Some(7));
        assert_eq!(config_count(&None, "MinQuestion"), None);
    }

    #[test]
    fn test_bad_config_values_fall_back_to_defaults() {
        let (_, config) = parse_str(
            r#"{"Time": "soon", "Difficulty": "9", "MinQuestion": "-2", "questions": []}"#,
        );
        assert_eq!(config, TestConfig::default());
    }

    #[test]
    fn test_corrupt_document_is_an_error() {
        assert!(parse("{ not json", Path::new(".")).is_err());
    }

    #[test]
    fn test_load_missing_file_degrades_to_empty_bank() {
        let dir = tempfile::tempdir().unwrap();
        let (bank, config) = load(&dir.path().join("questions.json"));
        assert!(bank.is_empty());
        assert_eq!(config, TestConfig::default());
    }

    #[test]
    fn test_load_encodes_images_relative_to_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut image = fs::File::create(dir.path().join("triangle.png")).unwrap();
        image.write_all(b"png-bytes").unwrap();

        let path = dir.path().join("questions.json");
        fs::write(
            &path,
            r#"{"questions": [{"text": "", "image": "triangle.png", "answer": "3", "difficulty": "1"}]}"#,
        )
        .unwrap();

        let (bank, _) = load(&path);
        assert_eq!(bank.len(), 1);
        assert_eq!(
            bank.questions()[0].image.as_deref(),
            Some(general_purpose::STANDARD.encode(b"png-bytes").as_str())
        );
    }

    #[test]
    fn test_oversized_images_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("small.png"), vec![7u8; MAX_IMAGE_BYTES]).unwrap();
        fs::write(dir.path().join("huge.png"), vec![7u8; MAX_IMAGE_BYTES + 1]).unwrap();

        let path = dir.path().join("questions.json");
        fs::write(
            &path,
            r#"{"questions": [
                {"text": "At the limit", "image": "small.png", "answer": "a"},
                {"text": "Over the limit", "image": "huge.png", "answer": "b"},
                {"text": "", "image": "huge.png", "answer": "c"}
            ]}"#,
        )
        .unwrap();

        let (bank, _) = load(&path);
        assert_eq!(bank.len(), 2);
        assert!(bank.questions()[0].image.is_some());
        assert_eq!(bank.questions()[1].image, None);
    }
}
