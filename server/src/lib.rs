//! # Quiz Race Server Library
//!
//! This library provides the authoritative server for the multiplayer quiz
//! race. Players join a shared session, answer a stream of questions drawn
//! from a question bank, and move forward on every correct answer. The server
//! keeps the canonical state of every player and records finished games.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Session State
//! All scoring and progression decisions are made here. Clients only ever
//! see the results the engine reports back, so a modified client cannot move
//! itself forward or award itself points.
//!
//! ### Problem Assignment
//! Every player holds exactly one live problem. A new one is drawn after each
//! submission, mostly from the player's own difficulty tier with a fixed share
//! of off-tier questions mixed in.
//!
//! ### Completion Gate
//! Each answer response reports whether the player has met the configured
//! minimum number of questions. The gate is advisory: the engine keeps
//! serving problems until the client decides to finish.
//!
//! ## Module Organization
//!
//! ### Question Bank (`question_bank`)
//! Loads the immutable bank and test configuration from a JSON document,
//! skipping malformed entries and encoding referenced images.
//!
//! ### Selector (`selector`)
//! The biased random draw, written against an explicit random source.
//!
//! ### Registry (`registry`)
//! Per-player slots, each behind its own lock, plus the rejoin policy.
//!
//! ### Game (`game`)
//! The [`game::SessionEngine`]: join, problem retrieval, answer submission,
//! finishing and standings.
//!
//! ### Persistence (`persistence`)
//! The [`persistence::ResultStore`] seam with a flat-file and an in-memory
//! implementation.
//!
//! ### Network (`network`)
//! UDP request handling with bincode encoded [`shared::Packet`]s.
//!
//! ## Concurrency
//!
//! Requests are handled on independent tasks. Updates to one player are
//! serialized by that player's lock, while different players proceed in
//! parallel. The bank and test configuration are shared read-only.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::game::{SessionEngine, SessionRules};
//! use server::network::Server;
//! use server::persistence::FileStore;
//! use server::question_bank;
//! use std::path::Path;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (bank, config) = question_bank::load(Path::new("questions.json"));
//!     let engine = SessionEngine::new(
//!         Arc::new(bank),
//!         config,
//!         SessionRules::default(),
//!         Arc::new(FileStore::new(Path::new("."))),
//!     );
//!
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         Arc::new(engine),
//!         Duration::from_secs(60),
//!     )
//!     .await?;
//!     server.run().await.map_err(|e| e as Box<dyn std::error::Error>)?;
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod game;
pub mod network;
pub mod persistence;
pub mod question_bank;
pub mod registry;
pub mod selector;
