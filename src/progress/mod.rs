//! Participant progress: flag updates, derived effects and quest progression.
//!
//! The flow for one reported batch is
//! `validation` → [`rules::evaluate_batch`] → [`storage::ProgressStore::update_participant`]
//! with [`progression::QuestProgressionEvaluator::evaluate`] running inside the same
//! compare-and-swap, so flags and quest state always commit together.

pub mod catalog;
pub mod engine;
pub mod errors;
pub mod generator;
pub mod progression;
pub mod rules;
pub mod storage;
pub mod types;

pub use catalog::{default_catalog_seed, QuestCatalog};
pub use engine::{ApplyOutcome, EngineSettings, FlagUpdateEngine};
pub use errors::ProgressError;
pub use generator::{generate_quest, templates_for, QuestGenerator, QuestTemplate, MAX_DIFFICULTY_TIER};
pub use progression::{Advancement, ProgressionOutcome, QuestProgressionEvaluator};
pub use rules::{evaluate_batch, BatchDelta, DerivedRule, RuleEffect, DERIVED_RULES, PLAYED_FLAGS};
pub use storage::{Mutation, ProgressStore, ProgressStoreBuilder};
pub use types::*;
