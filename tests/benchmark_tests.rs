//! Performance benchmarks for critical session paths

use bincode::{deserialize, serialize};
use rand::rngs::StdRng;
use rand::SeedableRng;
use server::game::{SessionEngine, SessionRules};
use server::persistence::MemoryStore;
use server::question_bank::{self, Question, QuestionBank, TestConfig};
use server::selector;
use shared::{AnswerOutcome, Difficulty, Packet, PlayerState};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

fn large_bank(per_tier: usize) -> QuestionBank {
    let mut questions = Vec::with_capacity(per_tier * 3);
    for difficulty in Difficulty::ALL {
        for i in 0..per_tier {
            questions.push(Question::new(
                format!("{} question {}", difficulty, i),
                i.to_string(),
                difficulty,
            ));
        }
    }
    QuestionBank::new(questions)
}

/// Benchmarks the biased problem draw over a large bank
#[test]
fn benchmark_problem_selection() {
    let bank = large_bank(1_000);
    let mut rng = StdRng::seed_from_u64(1);

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = selector::select(&bank, Difficulty::Medium, &mut rng).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Problem selection: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 5 seconds even in debug builds
    assert!(duration.as_secs() < 5);
}

/// Benchmarks answer submission through the engine
#[test]
fn benchmark_answer_submission() {
    let engine = SessionEngine::with_rng(
        Arc::new(large_bank(100)),
        TestConfig::default(),
        SessionRules::default(),
        Arc::new(MemoryStore::new()),
        StdRng::seed_from_u64(2),
    );

    let iterations = 10_000;
    let start = Instant::now();

    tokio_test::block_on(async {
        engine.join("bench", "Bench", Difficulty::Hard).await.unwrap();
        for i in 0..iterations {
            engine.submit_answer("bench", &i.to_string()).await.unwrap();
        }
    });

    let duration = start.elapsed();
    println!(
        "Answer submission: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    let player = tokio_test::block_on(engine.lookup("bench")).unwrap();
    assert_eq!(player.answered_count, iterations);
    assert!(duration.as_secs() < 5);
}

/// Benchmarks packet serialization performance
#[test]
fn benchmark_packet_serialization() {
    let packet = Packet::AnswerResult(AnswerOutcome {
        correct: true,
        position: 12,
        alive: true,
        score: 120,
        next_problem: "What is 17 * 23?".to_string(),
        next_image: None,
        can_finish: true,
        answered_count: 15,
        min_questions: 3,
    });

    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let data = serialize(&packet).unwrap();
        let _: Packet = deserialize(&data).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Packet serialization: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_secs() < 5);
}

/// Stress test: standings packet for a crowded session still fits a datagram
#[test]
fn stress_test_large_standings() {
    let players: Vec<PlayerState> = (0..500)
        .map(|i| {
            let mut player =
                PlayerState::new(format!("user-{}", i), format!("Player {}", i), Difficulty::Easy);
            player.position = i;
            player
        })
        .collect();

    let data = serialize(&Packet::Standings { players }).unwrap();
    println!("Standings for 500 players: {} bytes", data.len());
    assert!(data.len() <= shared::MAX_DATAGRAM_SIZE);
}

/// Benchmarks parsing a large bank document
#[test]
fn benchmark_bank_parsing() {
    let entries: Vec<String> = (0..5_000)
        .map(|i| {
            format!(
                r#"{{"text": "{} + {}?", "image": "", "answer": "{}", "difficulty": "{}"}}"#,
                i,
                i,
                i * 2,
                i % 3 + 1
            )
        })
        .collect();
    let document = format!(
        r#"{{"title": "Big Test", "Time": "60", "Difficulty": "2", "MinQuestion": "3", "questions": [{}]}}"#,
        entries.join(",")
    );

    let start = Instant::now();
    let (bank, config) = question_bank::parse(&document, Path::new(".")).unwrap();
    let duration = start.elapsed();

    println!("Parsed {} questions in {:?}", bank.len(), duration);
    assert_eq!(bank.len(), 5_000);
    assert_eq!(config.title, "Big Test");
    assert!(duration.as_secs() < 5);
}
