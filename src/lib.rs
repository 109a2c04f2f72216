//! # Festquest - Progress and Quest Engine for Live Events
//!
//! Festquest tracks how far each participant has come through the event's activities
//! (casino games, a dungeon crawler, a code-editor game) and unlocks quests as progress
//! accumulates. Game clients report named flag deltas; the engine applies them, derives
//! secondary effects, and advances each category's quest track.
//!
//! ## Features
//!
//! - **Additive flags**: open-ended named counters, created on first report.
//! - **Derived effects**: one rule table (`games_played` bump, coins-to-currency credit)
//!   evaluated once per batch.
//! - **Quest tracks**: three independent per-category levels with curated catalog entries
//!   and randomized, participant-relative generated quests.
//! - **Atomic updates**: flag increments and quest evaluation commit in one
//!   compare-and-swap on the participant's sled record.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use festquest::config::Config;
//! use festquest::progress::{FlagUpdate, FlagUpdateEngine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("festquest.toml").await?;
//!     let engine = FlagUpdateEngine::from_config(&config)?;
//!
//!     engine.provision_participant("aB3xY9")?;
//!     let outcome = engine.apply_updates(
//!         "aB3xY9",
//!         &[FlagUpdate::new("dungeon_enemies_defeated", 1)],
//!     )?;
//!     println!("games played: {}", outcome.record.flag("games_played"));
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`progress`] - records, catalog, rules, generator, evaluator, engine and store
//! - [`validation`] - structural checks for reported batches and identifiers
//! - [`config`] - TOML configuration
//! - [`metrics`] - in-process counters
//! - [`logutil`] - log-safe rendering of reporter-supplied strings
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ Reporter (HTTP, │ ← transport and auth live outside this crate
//! │  CLI, ...)      │
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ FlagUpdateEngine│ ← validation, rule table, quest evaluation
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ ProgressStore   │ ← sled, compare-and-swap per participant
//! └─────────────────┘
//! ```

pub mod config;
pub mod logutil;
pub mod metrics;
pub mod progress;
pub mod validation;
