//! Quest progression.
//!
//! Each category is an independent track: `Locked(level)` until the level passes
//! `max_level`, then `Cleared` for good. One evaluation advances a satisfied track by
//! exactly one level, even if the surplus would cover further quests; the next level is
//! only checked on the next reported update.

use rand::Rng;
use serde::Serialize;

use crate::progress::catalog::QuestCatalog;
use crate::progress::generator::QuestGenerator;
use crate::progress::types::{ActiveQuest, Category, ParticipantRecord, QuestTrack};

/// One category moving up a level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Advancement {
    pub category: Category,
    pub completed_quest: String,
    pub from_level: u32,
    pub to: QuestTrack,
    pub reward_currency: u64,
    pub reward_experience: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionOutcome {
    pub advanced: Vec<Advancement>,
    /// Categories that were missing an active quest and received one without reward.
    pub assigned: Vec<Category>,
}

impl ProgressionOutcome {
    pub fn changed(&self) -> bool {
        !self.advanced.is_empty() || !self.assigned.is_empty()
    }
}

pub struct QuestProgressionEvaluator<'a> {
    catalog: &'a QuestCatalog,
    generator: QuestGenerator,
    max_level: u32,
}

impl<'a> QuestProgressionEvaluator<'a> {
    pub fn new(catalog: &'a QuestCatalog, generator: QuestGenerator, max_level: u32) -> Self {
        Self {
            catalog,
            generator,
            max_level,
        }
    }

    /// Quest for `(category, level)`: the curated definition when one exists, a generated
    /// quest otherwise.
    pub fn select_quest<R: Rng + ?Sized>(
        &self,
        category: Category,
        level: u32,
        record: &ParticipantRecord,
        rng: &mut R,
    ) -> ActiveQuest {
        match self.catalog.find_definition(category, level) {
            Some(definition) => definition.materialize(&record.flags),
            None => self.generator.generate(category, &record.flags, rng),
        }
    }

    /// Give every uncleared category without an active quest its current-level quest.
    pub fn assign_missing<R: Rng + ?Sized>(
        &self,
        record: &mut ParticipantRecord,
        rng: &mut R,
    ) -> Vec<Category> {
        let mut assigned = Vec::new();
        for category in Category::ALL {
            let QuestTrack::Locked(level) = record.track(category, self.max_level) else {
                continue;
            };
            if record.active_quests.contains_key(&category) {
                continue;
            }
            let quest = self.select_quest(category, level, record, rng);
            record.active_quests.insert(category, quest);
            assigned.push(category);
        }
        assigned
    }

    /// Check all categories against the record's flags, granting rewards and moving
    /// satisfied tracks up one level. Pure with respect to storage.
    pub fn evaluate<R: Rng + ?Sized>(
        &self,
        record: &mut ParticipantRecord,
        rng: &mut R,
    ) -> ProgressionOutcome {
        let mut outcome = ProgressionOutcome::default();

        for category in Category::ALL {
            let level = match record.track(category, self.max_level) {
                QuestTrack::Cleared => {
                    record.active_quests.remove(&category);
                    continue;
                }
                QuestTrack::Locked(level) => level,
            };

            if !record.active_quests.contains_key(&category) {
                let quest = self.select_quest(category, level, record, rng);
                record.active_quests.insert(category, quest);
                outcome.assigned.push(category);
                continue;
            }

            let quest = &record.active_quests[&category];
            if !quest.is_satisfied_by(&record.flags) {
                continue;
            }

            let completed = quest.clone();
            record.currency = record.currency.saturating_add(completed.reward_currency);
            record.experience = record.experience.saturating_add(completed.reward_experience);

            let next_level = level + 1;
            record.quest_levels.insert(category, next_level);
            let to = QuestTrack::from_level(next_level, self.max_level);
            match to {
                QuestTrack::Cleared => {
                    record.active_quests.remove(&category);
                }
                QuestTrack::Locked(next) => {
                    let quest = self.select_quest(category, next, record, rng);
                    record.active_quests.insert(category, quest);
                }
            }

            outcome.advanced.push(Advancement {
                category,
                completed_quest: completed.quest_id,
                from_level: level,
                to,
                reward_currency: completed.reward_currency,
                reward_experience: completed.reward_experience,
            });
        }

        outcome
    }
}
