use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const PARTICIPANT_SCHEMA_VERSION: u8 = 1;
pub const QUEST_DEFINITION_SCHEMA_VERSION: u8 = 1;
pub const UPDATE_LOG_SCHEMA_VERSION: u8 = 1;

/// Cross-cutting counter bumped once per batch that reports gameplay.
pub const GAMES_PLAYED_FLAG: &str = "games_played";
/// Casino coins convert 1:1 into participant currency.
pub const CASINO_COINS_FLAG: &str = "casino_coins_earned";

/// Flags every participant starts with, all at zero.
pub const INITIAL_FLAGS: &[&str] = &[
    GAMES_PLAYED_FLAG,
    "casino_roulette_played",
    "casino_poker_played",
    "casino_blackjack_played",
    CASINO_COINS_FLAG,
    "casino_losses",
    "dungeon_enemies_defeated",
    "dungeon_chests_opened",
    "dungeon_player_deaths",
    "dungeon_floors_cleared",
    "code_problems_solved",
    "code_failures",
    "code_solo_clears",
];

/// Activity categories, each with an independent quest track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Casino,
    Dungeon,
    CodeEditor,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Casino, Category::Dungeon, Category::CodeEditor];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Casino => "casino",
            Category::Dungeon => "dungeon",
            Category::CodeEditor => "code_editor",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "casino" => Ok(Category::Casino),
            "dungeon" => Ok(Category::Dungeon),
            "code_editor" => Ok(Category::CodeEditor),
            other => Err(format!("unknown category: {}", other)),
        }
    }
}

/// Where a category's quest track currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestTrack {
    Locked(u32),
    Cleared,
}

impl QuestTrack {
    pub fn from_level(level: u32, max_level: u32) -> Self {
        if level > max_level {
            QuestTrack::Cleared
        } else {
            QuestTrack::Locked(level.max(1))
        }
    }

    pub fn is_cleared(&self) -> bool {
        matches!(self, QuestTrack::Cleared)
    }
}

/// The goal a participant is currently pursuing in one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveQuest {
    pub quest_id: String,
    pub description: String,
    pub target_flag: String,
    pub target_value: i64,
    pub start_value: i64,
    pub reward_currency: u64,
    pub reward_experience: u64,
    /// Final difficulty after scaling; curated catalog quests carry 0.
    pub difficulty: u32,
}

impl ActiveQuest {
    pub fn is_satisfied_by(&self, flags: &BTreeMap<String, i64>) -> bool {
        flags.get(&self.target_flag).copied().unwrap_or(0) >= self.target_value
    }

    /// Progress made since the quest was assigned, clamped to `[0, target - start]`.
    pub fn progress(&self, flags: &BTreeMap<String, i64>) -> (i64, i64) {
        let required = self.target_value.saturating_sub(self.start_value).max(0);
        let current = flags.get(&self.target_flag).copied().unwrap_or(0);
        let done = current.saturating_sub(self.start_value).clamp(0, required);
        (done, required)
    }
}

/// Curated catalog entry, unique per `(category, level)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestDefinition {
    pub category: Category,
    pub level: u32,
    pub target_flag: String,
    pub target_value: i64,
    #[serde(default)]
    pub reward_currency: u64,
    #[serde(default)]
    pub reward_experience: u64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_definition_schema")]
    pub schema_version: u8,
}

fn default_definition_schema() -> u8 {
    QUEST_DEFINITION_SCHEMA_VERSION
}

impl QuestDefinition {
    pub fn new(category: Category, level: u32, target_flag: &str, target_value: i64) -> Self {
        Self {
            category,
            level,
            target_flag: target_flag.to_string(),
            target_value,
            reward_currency: 0,
            reward_experience: 0,
            description: None,
            schema_version: QUEST_DEFINITION_SCHEMA_VERSION,
        }
    }

    pub fn with_rewards(mut self, currency: u64, experience: u64) -> Self {
        self.reward_currency = currency;
        self.reward_experience = experience;
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Turn the definition into an active quest anchored at the participant's current value.
    /// The catalog threshold is absolute. A participant already at or past it gets a start one
    /// below the threshold, so the quest shows as complete and is granted on the next report.
    pub fn materialize(&self, flags: &BTreeMap<String, i64>) -> ActiveQuest {
        let current = flags.get(&self.target_flag).copied().unwrap_or(0);
        let start_value = current.min(self.target_value.saturating_sub(1));
        let description = self.description.clone().unwrap_or_else(|| {
            format!("Reach {} on {}", self.target_value, self.target_flag)
        });
        ActiveQuest {
            quest_id: format!("{}_lv{}", self.category, self.level),
            description,
            target_flag: self.target_flag.clone(),
            target_value: self.target_value,
            start_value,
            reward_currency: self.reward_currency,
            reward_experience: self.reward_experience,
            difficulty: 0,
        }
    }
}

/// One entry of a reported batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagUpdate {
    pub flag_name: String,
    pub increment: i64,
}

impl FlagUpdate {
    pub fn new(flag_name: &str, increment: i64) -> Self {
        Self {
            flag_name: flag_name.to_string(),
            increment,
        }
    }
}

/// Durable per-participant progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub currency: u64,
    pub experience: u64,
    pub flags: BTreeMap<String, i64>,
    pub quest_levels: BTreeMap<Category, u32>,
    #[serde(default)]
    pub active_quests: BTreeMap<Category, ActiveQuest>,
    pub schema_version: u8,
}

impl ParticipantRecord {
    pub fn new(id: &str, starting_currency: u64) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            created_at: now,
            updated_at: now,
            currency: starting_currency,
            experience: 0,
            flags: INITIAL_FLAGS.iter().map(|f| (f.to_string(), 0)).collect(),
            quest_levels: Category::ALL.iter().map(|c| (*c, 1)).collect(),
            active_quests: BTreeMap::new(),
            schema_version: PARTICIPANT_SCHEMA_VERSION,
        }
    }

    pub fn flag(&self, name: &str) -> i64 {
        self.flags.get(name).copied().unwrap_or(0)
    }

    pub fn level(&self, category: Category) -> u32 {
        self.quest_levels.get(&category).copied().unwrap_or(1)
    }

    pub fn track(&self, category: Category, max_level: u32) -> QuestTrack {
        QuestTrack::from_level(self.level(category), max_level)
    }

    pub fn active_quest(&self, category: Category) -> Option<&ActiveQuest> {
        self.active_quests.get(&category)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Audit entry written alongside every applied batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLogEntry {
    pub batch_id: String,
    pub participant_id: String,
    pub applied_at: DateTime<Utc>,
    pub updates: Vec<FlagUpdate>,
    pub currency_credit: u64,
    pub advanced: Vec<Category>,
    pub schema_version: u8,
}
