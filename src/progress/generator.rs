//! Randomized quest generation.
//!
//! Each category owns a small list of templates. A generated quest always targets
//! "current value + N" for the participant, so two participants at different standings
//! receive quests of the same shape and size.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::progress::types::{ActiveQuest, Category};

/// Templates at this difficulty are never scaled by the random multiplier.
pub const MAX_DIFFICULTY_TIER: u32 = 5;
/// Placeholder substituted with the target delta in template descriptions.
pub const COUNT_PLACEHOLDER: &str = "{n}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestTemplate {
    pub id: &'static str,
    pub text: &'static str,
    pub base_unit: i64,
    pub difficulty: u32,
    pub target_flag: &'static str,
}

const CASINO_TEMPLATES: &[QuestTemplate] = &[
    QuestTemplate { id: "casino_roulette_played", text: "Play roulette {n} times", base_unit: 1, difficulty: 1, target_flag: "casino_roulette_played" },
    QuestTemplate { id: "casino_poker_played", text: "Play poker {n} times", base_unit: 1, difficulty: 1, target_flag: "casino_poker_played" },
    QuestTemplate { id: "casino_blackjack_played", text: "Play blackjack {n} times", base_unit: 1, difficulty: 1, target_flag: "casino_blackjack_played" },
    QuestTemplate { id: "casino_coins_earned", text: "Earn {n} coins", base_unit: 100, difficulty: 4, target_flag: "casino_coins_earned" },
];

const DUNGEON_TEMPLATES: &[QuestTemplate] = &[
    QuestTemplate { id: "dungeon_enemies_defeated", text: "Defeat {n} enemies", base_unit: 1, difficulty: 3, target_flag: "dungeon_enemies_defeated" },
    QuestTemplate { id: "dungeon_floors_cleared", text: "Clear {n} floors", base_unit: 1, difficulty: 3, target_flag: "dungeon_floors_cleared" },
];

// "Clear with at most N failures" needs its own completion check and is not offered.
const CODE_EDITOR_TEMPLATES: &[QuestTemplate] = &[
    QuestTemplate { id: "code_problems_solved", text: "Solve {n} problems", base_unit: 1, difficulty: 2, target_flag: "code_problems_solved" },
    QuestTemplate { id: "code_solo_clears", text: "Clear {n} times solo", base_unit: 1, difficulty: 5, target_flag: "code_solo_clears" },
];

pub fn templates_for(category: Category) -> &'static [QuestTemplate] {
    match category {
        Category::Casino => CASINO_TEMPLATES,
        Category::Dungeon => DUNGEON_TEMPLATES,
        Category::CodeEditor => CODE_EDITOR_TEMPLATES,
    }
}

/// Produces active quests from the category templates. Reward rates are per unit of
/// final difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestGenerator {
    pub currency_per_difficulty: u64,
    pub experience_per_difficulty: u64,
}

impl Default for QuestGenerator {
    fn default() -> Self {
        Self {
            currency_per_difficulty: 10,
            experience_per_difficulty: 20,
        }
    }
}

impl QuestGenerator {
    pub fn new(currency_per_difficulty: u64, experience_per_difficulty: u64) -> Self {
        Self {
            currency_per_difficulty,
            experience_per_difficulty,
        }
    }

    pub fn generate<R: Rng + ?Sized>(
        &self,
        category: Category,
        flags: &BTreeMap<String, i64>,
        rng: &mut R,
    ) -> ActiveQuest {
        let templates = templates_for(category);
        // Every category has at least one template.
        let template = templates.choose(rng).copied().unwrap_or(templates[0]);
        self.instantiate(&template, flags, rng)
    }

    fn instantiate<R: Rng + ?Sized>(
        &self,
        template: &QuestTemplate,
        flags: &BTreeMap<String, i64>,
        rng: &mut R,
    ) -> ActiveQuest {
        let multiplier: u32 = if template.difficulty < MAX_DIFFICULTY_TIER {
            rng.gen_range(1..=3)
        } else {
            1
        };
        let difficulty = template.difficulty * multiplier;
        let delta = template.base_unit * i64::from(multiplier);
        // Flags saturate at i64::MAX; keep the target representable.
        let current = flags.get(template.target_flag).copied().unwrap_or(0);
        let start_value = current.min(i64::MAX - delta);

        ActiveQuest {
            quest_id: template.id.to_string(),
            description: template.text.replacen(COUNT_PLACEHOLDER, &delta.to_string(), 1),
            target_flag: template.target_flag.to_string(),
            target_value: start_value + delta,
            start_value,
            reward_currency: self.currency_per_difficulty.saturating_mul(u64::from(difficulty)),
            reward_experience: self.experience_per_difficulty.saturating_mul(u64::from(difficulty)),
            difficulty,
        }
    }
}

/// Generate a quest for a category given by name. Unknown categories yield `None`.
pub fn generate_quest<R: Rng + ?Sized>(
    generator: &QuestGenerator,
    category: &str,
    flags: &BTreeMap<String, i64>,
    rng: &mut R,
) -> Option<ActiveQuest> {
    let category: Category = category.parse().ok()?;
    Some(generator.generate(category, flags, rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn template(id: &str) -> QuestTemplate {
        Category::ALL
            .iter()
            .flat_map(|c| templates_for(*c).iter())
            .find(|t| t.id == id)
            .copied()
            .unwrap()
    }

    #[test]
    fn targets_are_relative_to_current_value() {
        let generator = QuestGenerator::default();
        let mut rng = StdRng::seed_from_u64(7);
        let mut flags = BTreeMap::new();
        flags.insert("dungeon_enemies_defeated".to_string(), 40);
        flags.insert("dungeon_floors_cleared".to_string(), 9);
        for _ in 0..50 {
            let quest = generator.generate(Category::Dungeon, &flags, &mut rng);
            let current = flags[&quest.target_flag];
            assert_eq!(quest.start_value, current);
            let delta = quest.target_value - quest.start_value;
            assert!((1..=3).contains(&delta), "delta {} out of range", delta);
            assert_eq!(quest.difficulty as i64, 3 * delta);
        }
    }

    #[test]
    fn max_tier_templates_are_never_scaled() {
        let generator = QuestGenerator::default();
        let mut rng = StdRng::seed_from_u64(11);
        let flags = BTreeMap::new();
        for _ in 0..20 {
            let quest = generator.instantiate(&template("code_solo_clears"), &flags, &mut rng);
            assert_eq!(quest.difficulty, 5);
            assert_eq!(quest.target_value, 1);
            assert_eq!(quest.reward_currency, 50);
            assert_eq!(quest.reward_experience, 100);
        }
    }

    #[test]
    fn coin_quests_scale_by_base_unit() {
        let generator = QuestGenerator::default();
        let mut rng = StdRng::seed_from_u64(3);
        let mut flags = BTreeMap::new();
        flags.insert("casino_coins_earned".to_string(), 1234);
        let quest = generator.instantiate(&template("casino_coins_earned"), &flags, &mut rng);
        let delta = quest.target_value - quest.start_value;
        assert!([100, 200, 300].contains(&delta));
        let multiplier = (delta / 100) as u64;
        assert_eq!(quest.difficulty as u64, 4 * multiplier);
        assert_eq!(quest.reward_currency, 40 * multiplier);
        assert_eq!(quest.description, format!("Earn {} coins", delta));
    }

    #[test]
    fn saturated_flags_still_get_a_representable_target() {
        let generator = QuestGenerator::default();
        let mut rng = StdRng::seed_from_u64(5);
        let mut flags = BTreeMap::new();
        flags.insert("dungeon_enemies_defeated".to_string(), i64::MAX);
        flags.insert("dungeon_floors_cleared".to_string(), i64::MAX);
        for _ in 0..50 {
            let quest = generator.generate(Category::Dungeon, &flags, &mut rng);
            assert_eq!(quest.target_value, i64::MAX);
            let delta = quest.target_value - quest.start_value;
            assert!((1..=3).contains(&delta), "delta {} out of range", delta);
            assert!(quest.is_satisfied_by(&flags));
            assert_eq!(quest.progress(&flags), (delta, delta));
        }
    }

    #[test]
    fn seeded_generation_is_reproducible() {
        let generator = QuestGenerator::new(7, 13);
        let flags = BTreeMap::new();
        let a = generator.generate(Category::Casino, &flags, &mut StdRng::seed_from_u64(99));
        let b = generator.generate(Category::Casino, &flags, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
        assert_eq!(a.reward_currency, 7 * u64::from(a.difficulty));
        assert_eq!(a.reward_experience, 13 * u64::from(a.difficulty));
    }

    #[test]
    fn unknown_category_yields_no_quest() {
        let generator = QuestGenerator::default();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(generate_quest(&generator, "arcade", &BTreeMap::new(), &mut rng).is_none());
        let quest = generate_quest(&generator, "code_editor", &BTreeMap::new(), &mut rng).unwrap();
        assert!(quest.target_flag.starts_with("code_"));
    }

    #[test]
    fn every_template_has_a_placeholder() {
        for category in Category::ALL {
            for template in templates_for(category) {
                assert!(template.text.contains(COUNT_PLACEHOLDER), "{}", template.id);
                assert!(template.base_unit > 0);
            }
        }
    }
}
