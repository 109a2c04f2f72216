//! Flag update engine.
//!
//! A reported batch is validated, folded into a single delta by the derived-effect rules,
//! and then applied together with quest evaluation inside one compare-and-swap on the
//! participant's record. Two concurrent batches for the same participant therefore never
//! lose an increment, and a level transition is decided on the exact flags it commits with.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::config::Config;
use crate::logutil::escape_log;
use crate::metrics;
use crate::progress::catalog::QuestCatalog;
use crate::progress::errors::ProgressError;
use crate::progress::generator::{generate_quest, QuestGenerator};
use crate::progress::progression::{ProgressionOutcome, QuestProgressionEvaluator};
use crate::progress::rules::evaluate_batch;
use crate::progress::storage::{Mutation, ProgressStore};
use crate::progress::types::{ActiveQuest, FlagUpdate, ParticipantRecord, UpdateLogEntry};
use crate::validation::{parse_update_batch, validate_batch, validate_participant_id};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub max_level: u32,
    pub starting_currency: u64,
    pub generator: QuestGenerator,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_level: 10,
            starting_currency: 100,
            generator: QuestGenerator::default(),
        }
    }
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_level: config.quests.max_level,
            starting_currency: config.provisioning.starting_currency,
            generator: QuestGenerator::new(
                config.quests.currency_per_difficulty,
                config.quests.experience_per_difficulty,
            ),
        }
    }
}

/// Result of one applied batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOutcome {
    pub batch_id: String,
    pub record: ParticipantRecord,
    pub currency_credit: u64,
    pub rules_fired: Vec<&'static str>,
    pub progression: ProgressionOutcome,
}

pub struct FlagUpdateEngine {
    store: Arc<ProgressStore>,
    catalog: QuestCatalog,
    settings: EngineSettings,
    rng: Mutex<StdRng>,
}

impl FlagUpdateEngine {
    pub fn new(store: Arc<ProgressStore>, catalog: QuestCatalog, settings: EngineSettings) -> Self {
        Self {
            store,
            catalog,
            settings,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Replace the random source, e.g. with a seeded generator for reproducible runs.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// Open the store under the configured data directory and build the catalog from it.
    /// A configured catalog seed file is merged into the store first.
    pub fn from_config(config: &Config) -> Result<Self, ProgressError> {
        let store = ProgressStore::open(Path::new(&config.storage.data_dir).join("progress"))?;
        if let Some(ref seed) = config.quests.catalog_file {
            let seeded = QuestCatalog::load_json(seed)?;
            for definition in seeded.definitions() {
                store.put_quest_definition(definition.clone())?;
            }
            info!("Merged {} curated quest definitions from {}", seeded.len(), seed);
        }
        let catalog = QuestCatalog::from_store(&store)?;
        Ok(Self::new(Arc::new(store), catalog, EngineSettings::from(config)))
    }

    pub fn store(&self) -> &ProgressStore {
        &self.store
    }

    pub fn catalog(&self) -> &QuestCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn evaluator(&self) -> QuestProgressionEvaluator<'_> {
        QuestProgressionEvaluator::new(&self.catalog, self.settings.generator, self.settings.max_level)
    }

    // The generator state stays usable after a panicking holder.
    fn lock_rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get_participant(&self, participant_id: &str) -> Result<ParticipantRecord, ProgressError> {
        self.store.get_participant(participant_id)
    }

    /// Create one participant with zeroed flags, starting currency and a level-1 quest per
    /// category. Fails with `Conflict` when the id already exists.
    pub fn provision_participant(&self, participant_id: &str) -> Result<ParticipantRecord, ProgressError> {
        validate_participant_id(participant_id)?;
        let mut record = ParticipantRecord::new(participant_id, self.settings.starting_currency);
        {
            let mut rng = self.lock_rng();
            self.evaluator().assign_missing(&mut record, &mut *rng);
        }
        let record = self.store.create_participant(record)?;
        info!("Provisioned participant {}", participant_id);
        Ok(record)
    }

    /// Apply an untyped batch as reporters send it over the wire.
    pub fn apply_raw(&self, participant_id: &str, raw: &Value) -> Result<ApplyOutcome, ProgressError> {
        let updates = parse_update_batch(raw).map_err(|e| {
            metrics::inc_batches_rejected();
            warn!("Rejected batch for {}: {}", escape_log(participant_id), e);
            e
        })?;
        self.apply_updates(participant_id, &updates)
    }

    /// Apply a batch of flag deltas and evaluate quest progression in the same write.
    pub fn apply_updates(
        &self,
        participant_id: &str,
        updates: &[FlagUpdate],
    ) -> Result<ApplyOutcome, ProgressError> {
        if let Err(e) = validate_batch(updates) {
            metrics::inc_batches_rejected();
            warn!("Rejected batch for {}: {}", escape_log(participant_id), e);
            return Err(e);
        }
        validate_participant_id(participant_id)?;

        let delta = evaluate_batch(updates);
        let evaluator = self.evaluator();

        let (record, progression) = self.store.update_participant(participant_id, |record| {
            delta.apply_to(&mut record.flags);
            record.currency = record.currency.saturating_add(delta.currency);
            let mut rng = self.lock_rng();
            let outcome = evaluator.evaluate(record, &mut *rng);
            Ok(Mutation::Commit(outcome))
        })?;

        metrics::inc_batches_applied(updates.len());
        for advancement in &progression.advanced {
            metrics::record_quest_completion(
                advancement.category,
                advancement.to,
                advancement.reward_currency,
                advancement.reward_experience,
            );
            info!(
                "Participant {} completed {} quest '{}' (level {} -> {:?}, +{} currency, +{} exp)",
                participant_id,
                advancement.category,
                advancement.completed_quest,
                advancement.from_level,
                advancement.to,
                advancement.reward_currency,
                advancement.reward_experience
            );
        }

        let batch_id = Uuid::new_v4().to_string();
        let entry = UpdateLogEntry {
            batch_id: batch_id.clone(),
            participant_id: participant_id.to_string(),
            applied_at: Utc::now(),
            updates: updates.to_vec(),
            currency_credit: delta.currency,
            advanced: progression.advanced.iter().map(|a| a.category).collect(),
            schema_version: 0,
        };
        // The record is already committed; a failed audit write must not report the batch as lost.
        if let Err(e) = self.store.append_update_log(entry) {
            warn!("Failed to log batch {} for {}: {}", batch_id, participant_id, e);
        }

        debug!(
            "Applied batch {} to {}: {} entries, rules {:?}, {} advancement(s)",
            batch_id,
            participant_id,
            updates.len(),
            delta.fired,
            progression.advanced.len()
        );

        Ok(ApplyOutcome {
            batch_id,
            record,
            currency_credit: delta.currency,
            rules_fired: delta.fired,
            progression,
        })
    }

    /// Run quest evaluation alone. The record is written only if a category changed.
    pub fn evaluate_participant(
        &self,
        participant_id: &str,
    ) -> Result<(ParticipantRecord, ProgressionOutcome), ProgressError> {
        let evaluator = self.evaluator();
        self.store.update_participant(participant_id, |record| {
            let mut rng = self.lock_rng();
            let outcome = evaluator.evaluate(record, &mut *rng);
            Ok(if outcome.changed() {
                Mutation::Commit(outcome)
            } else {
                Mutation::Discard(outcome)
            })
        })
    }

    /// Generate a quest for a category name against arbitrary flags without storing it.
    pub fn preview_quest(&self, category: &str, flags: &BTreeMap<String, i64>) -> Result<Option<ActiveQuest>, ProgressError> {
        let mut rng = self.lock_rng();
        Ok(generate_quest(&self.settings.generator, category, flags, &mut *rng))
    }

    pub fn history(&self, participant_id: &str, limit: usize) -> Result<Vec<UpdateLogEntry>, ProgressError> {
        if !self.store.participant_exists(participant_id)? {
            return Err(ProgressError::NotFound(format!("participant: {}", participant_id)));
        }
        self.store.recent_updates(participant_id, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::storage::ProgressStoreBuilder;
    use crate::progress::types::Category;
    use tempfile::TempDir;

    fn engine(seed: u64) -> (TempDir, FlagUpdateEngine) {
        let dir = TempDir::new().expect("tempdir");
        let store = ProgressStoreBuilder::new(dir.path())
            .without_catalog_seed()
            .open()
            .expect("store");
        let engine = FlagUpdateEngine::new(Arc::new(store), QuestCatalog::empty(), EngineSettings::default())
            .with_rng(StdRng::seed_from_u64(seed));
        (dir, engine)
    }

    #[test]
    fn provisioning_assigns_a_quest_per_category() {
        let (_dir, engine) = engine(1);
        let record = engine.provision_participant("Ab12cd").unwrap();
        assert_eq!(record.currency, 100);
        for category in Category::ALL {
            let quest = record.active_quest(category).expect("quest assigned");
            assert_eq!(quest.start_value, 0);
        }
        let err = engine.provision_participant("Ab12cd").unwrap_err();
        assert!(matches!(err, ProgressError::Conflict(_)));
    }

    #[test]
    fn poisoned_rng_lock_does_not_take_the_engine_down() {
        let (_dir, engine) = engine(4);
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = engine.rng.lock().unwrap();
            panic!("holder died");
        }));
        assert!(engine.rng.is_poisoned());

        engine.provision_participant("p1").unwrap();
        let outcome = engine
            .apply_updates("p1", &[FlagUpdate::new("casino_losses", 1)])
            .unwrap();
        assert_eq!(outcome.record.flag("casino_losses"), 1);
    }

    #[test]
    fn rejected_batch_leaves_record_untouched() {
        let (_dir, engine) = engine(2);
        let before = engine.provision_participant("p1").unwrap();
        let err = engine
            .apply_updates("p1", &[FlagUpdate::new("casino_losses", 1), FlagUpdate::new("", 1)])
            .unwrap_err();
        assert!(err.is_invalid_input());
        let after = engine.get_participant("p1").unwrap();
        assert_eq!(after.flags, before.flags);
        assert!(engine.history("p1", 10).unwrap().is_empty());
    }

    #[test]
    fn applied_batches_are_logged() {
        let (_dir, engine) = engine(3);
        engine.provision_participant("p1").unwrap();
        let outcome = engine
            .apply_updates("p1", &[FlagUpdate::new("casino_coins_earned", 30)])
            .unwrap();
        assert_eq!(outcome.currency_credit, 30);
        assert_eq!(outcome.rules_fired, vec!["casino.coins_to_currency"]);
        let history = engine.history("p1", 5).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].batch_id, outcome.batch_id);
        assert_eq!(history[0].currency_credit, 30);
    }

    #[test]
    fn evaluate_participant_skips_write_when_nothing_changes() {
        let (_dir, engine) = engine(4);
        let provisioned = engine.provision_participant("p1").unwrap();
        let (record, outcome) = engine.evaluate_participant("p1").unwrap();
        assert!(!outcome.changed());
        let stored = engine.get_participant("p1").unwrap();
        assert_eq!(stored.updated_at, provisioned.updated_at);
        assert_eq!(record.active_quests, provisioned.active_quests);
    }

    #[test]
    fn preview_of_unknown_category_is_none() {
        let (_dir, engine) = engine(5);
        assert!(engine.preview_quest("karaoke", &BTreeMap::new()).unwrap().is_none());
        assert!(engine.preview_quest("dungeon", &BTreeMap::new()).unwrap().is_some());
    }
}
