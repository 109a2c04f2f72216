//! Curated quest catalog.
//!
//! Definitions are keyed uniquely by `(category, level)` and pin the quest a participant
//! receives on reaching that level. Levels without a curated entry fall back to the
//! randomized [`QuestGenerator`](crate::progress::generator::QuestGenerator).
//!
//! Seeds are plain JSON arrays so organizers can adjust the curated ladder without
//! recompiling:
//!
//! ```json
//! [
//!   { "category": "dungeon", "level": 1, "targetFlag": "dungeon_enemies_defeated",
//!     "targetValue": 1, "rewardCurrency": 30, "rewardExperience": 60 }
//! ]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::progress::errors::ProgressError;
use crate::progress::storage::ProgressStore;
use crate::progress::types::{Category, QuestDefinition};

/// Read-mostly lookup table of curated definitions.
#[derive(Debug, Clone, Default)]
pub struct QuestCatalog {
    definitions: BTreeMap<(Category, u32), QuestDefinition>,
}

impl QuestCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a catalog, rejecting duplicate `(category, level)` keys and malformed entries.
    pub fn from_definitions(definitions: Vec<QuestDefinition>) -> Result<Self, ProgressError> {
        let mut table = BTreeMap::new();
        for definition in definitions {
            if definition.level == 0 {
                return Err(ProgressError::InvalidInput(format!(
                    "quest definition for {} has level 0",
                    definition.category
                )));
            }
            if definition.target_flag.trim().is_empty() {
                return Err(ProgressError::InvalidInput(format!(
                    "quest definition {} level {} has no target flag",
                    definition.category, definition.level
                )));
            }
            if definition.target_value < 1 {
                return Err(ProgressError::InvalidInput(format!(
                    "quest definition {} level {} needs a positive target value",
                    definition.category, definition.level
                )));
            }
            let key = (definition.category, definition.level);
            if table.insert(key, definition).is_some() {
                return Err(ProgressError::Conflict(format!(
                    "duplicate quest definition: {} level {}",
                    key.0, key.1
                )));
            }
        }
        Ok(Self { definitions: table })
    }

    /// Load the curated definitions persisted in the store.
    pub fn from_store(store: &ProgressStore) -> Result<Self, ProgressError> {
        Self::from_definitions(store.list_quest_definitions()?)
    }

    /// Load definitions from a JSON seed file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, ProgressError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let definitions: Vec<QuestDefinition> = serde_json::from_str(&contents)?;
        Self::from_definitions(definitions)
    }

    pub fn find_definition(&self, category: Category, level: u32) -> Option<&QuestDefinition> {
        self.definitions.get(&(category, level))
    }

    pub fn definitions(&self) -> impl Iterator<Item = &QuestDefinition> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Introductory first quest for each category; later levels are generated.
pub fn default_catalog_seed() -> Vec<QuestDefinition> {
    vec![
        QuestDefinition::new(Category::Casino, 1, "casino_roulette_played", 1)
            .with_rewards(10, 20)
            .with_description("Play your first round of roulette"),
        QuestDefinition::new(Category::Dungeon, 1, "dungeon_enemies_defeated", 1)
            .with_rewards(30, 60)
            .with_description("Defeat your first enemy"),
        QuestDefinition::new(Category::CodeEditor, 1, "code_problems_solved", 1)
            .with_rewards(20, 40)
            .with_description("Solve your first problem"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn find_definition_by_category_and_level() {
        let catalog = QuestCatalog::from_definitions(default_catalog_seed()).unwrap();
        assert_eq!(catalog.len(), 3);
        let def = catalog.find_definition(Category::CodeEditor, 1).unwrap();
        assert_eq!(def.target_flag, "code_problems_solved");
        assert!(catalog.find_definition(Category::CodeEditor, 2).is_none());
    }

    #[test]
    fn duplicate_keys_conflict() {
        let defs = vec![
            QuestDefinition::new(Category::Casino, 2, "casino_poker_played", 3),
            QuestDefinition::new(Category::Casino, 2, "casino_blackjack_played", 3),
        ];
        let err = QuestCatalog::from_definitions(defs).unwrap_err();
        assert!(matches!(err, ProgressError::Conflict(_)));
    }

    #[test]
    fn level_zero_is_rejected() {
        let defs = vec![QuestDefinition::new(Category::Casino, 0, "casino_poker_played", 3)];
        assert!(QuestCatalog::from_definitions(defs).unwrap_err().is_invalid_input());
    }

    #[test]
    fn non_positive_thresholds_are_rejected() {
        let defs = vec![QuestDefinition::new(Category::Dungeon, 1, "dungeon_floors_cleared", 0)];
        assert!(QuestCatalog::from_definitions(defs).unwrap_err().is_invalid_input());
    }

    #[test]
    fn loads_camel_case_json_seed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"category":"dungeon","level":3,"targetFlag":"dungeon_floors_cleared","targetValue":5,"rewardCurrency":70}}]"#
        )
        .unwrap();
        let catalog = QuestCatalog::load_json(file.path()).unwrap();
        let def = catalog.find_definition(Category::Dungeon, 3).unwrap();
        assert_eq!(def.target_value, 5);
        assert_eq!(def.reward_currency, 70);
        assert_eq!(def.reward_experience, 0);
    }
}
