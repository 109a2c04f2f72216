//! Derived-effect rules.
//!
//! A reported batch is folded into a single [`BatchDelta`]: the submitted increments summed
//! per flag, plus whatever the rule table derives from them. Rules are evaluated exactly once
//! per batch and never touch storage.

use std::collections::BTreeMap;

use crate::progress::types::{FlagUpdate, CASINO_COINS_FLAG, GAMES_PLAYED_FLAG};

/// Flags whose positive increments count as "a game was played".
pub const PLAYED_FLAGS: &[&str] = &[
    "casino_roulette_played",
    "casino_poker_played",
    "casino_blackjack_played",
    "dungeon_enemies_defeated",
    "dungeon_chests_opened",
    "dungeon_player_deaths",
    "dungeon_floors_cleared",
    "code_problems_solved",
    "code_failures",
    "code_solo_clears",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleEffect {
    /// Add 1 to the named flag, once per batch no matter how many triggers matched.
    BumpFlagOnce(&'static str),
    /// Credit the trigger's increment to currency.
    CreditCurrency,
}

#[derive(Debug, Clone, Copy)]
pub struct DerivedRule {
    pub name: &'static str,
    pub triggers: &'static [&'static str],
    pub effect: RuleEffect,
}

impl DerivedRule {
    fn matches(&self, update: &FlagUpdate) -> bool {
        update.increment > 0 && self.triggers.contains(&update.flag_name.as_str())
    }
}

pub const DERIVED_RULES: &[DerivedRule] = &[
    DerivedRule {
        name: "common.games_played",
        triggers: PLAYED_FLAGS,
        effect: RuleEffect::BumpFlagOnce(GAMES_PLAYED_FLAG),
    },
    DerivedRule {
        name: "casino.coins_to_currency",
        triggers: &[CASINO_COINS_FLAG],
        effect: RuleEffect::CreditCurrency,
    },
];

/// Combined effect of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchDelta {
    pub flags: BTreeMap<String, i64>,
    pub currency: u64,
    pub fired: Vec<&'static str>,
}

impl BatchDelta {
    fn add_flag(&mut self, name: &str, increment: i64) {
        let slot = self.flags.entry(name.to_string()).or_insert(0);
        *slot = slot.saturating_add(increment);
    }

    /// Apply the delta to a flag map in place.
    pub fn apply_to(&self, flags: &mut BTreeMap<String, i64>) {
        for (name, delta) in &self.flags {
            let slot = flags.entry(name.clone()).or_insert(0);
            *slot = slot.saturating_add(*delta);
        }
    }
}

/// Fold a validated batch and the derived rules into one delta.
pub fn evaluate_batch(updates: &[FlagUpdate]) -> BatchDelta {
    let mut delta = BatchDelta::default();
    for update in updates {
        delta.add_flag(&update.flag_name, update.increment);
    }

    for rule in DERIVED_RULES {
        let mut matched = updates.iter().filter(|u| rule.matches(u)).peekable();
        if matched.peek().is_none() {
            continue;
        }
        match rule.effect {
            RuleEffect::BumpFlagOnce(flag) => delta.add_flag(flag, 1),
            RuleEffect::CreditCurrency => {
                // `matches` only admits positive increments.
                delta.currency = matched.fold(delta.currency, |total, u| {
                    total.saturating_add(u.increment as u64)
                });
            }
        }
        delta.fired.push(rule.name);
    }

    delta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn several_played_flags_bump_games_played_once() {
        let delta = evaluate_batch(&[
            FlagUpdate::new("casino_roulette_played", 1),
            FlagUpdate::new("casino_poker_played", 1),
        ]);
        assert_eq!(delta.flags["games_played"], 1);
        assert_eq!(delta.flags["casino_roulette_played"], 1);
        assert_eq!(delta.flags["casino_poker_played"], 1);
        assert_eq!(delta.fired, vec!["common.games_played"]);
    }

    #[test]
    fn negative_played_increment_does_not_bump() {
        let delta = evaluate_batch(&[FlagUpdate::new("dungeon_player_deaths", -1)]);
        assert!(!delta.flags.contains_key("games_played"));
        assert_eq!(delta.flags["dungeon_player_deaths"], -1);
        assert!(delta.fired.is_empty());
    }

    #[test]
    fn coins_credit_currency_one_to_one() {
        let delta = evaluate_batch(&[FlagUpdate::new("casino_coins_earned", 250)]);
        assert_eq!(delta.currency, 250);
        assert_eq!(delta.flags["casino_coins_earned"], 250);
        assert!(!delta.flags.contains_key("games_played"));
    }

    #[test]
    fn coin_corrections_never_debit_currency() {
        let delta = evaluate_batch(&[FlagUpdate::new("casino_coins_earned", -40)]);
        assert_eq!(delta.currency, 0);
        assert_eq!(delta.flags["casino_coins_earned"], -40);
    }

    #[test]
    fn repeated_flag_entries_are_summed() {
        let delta = evaluate_batch(&[
            FlagUpdate::new("code_failures", 2),
            FlagUpdate::new("code_failures", 3),
            FlagUpdate::new("brand_new_flag", 7),
        ]);
        assert_eq!(delta.flags["code_failures"], 5);
        assert_eq!(delta.flags["brand_new_flag"], 7);
        assert_eq!(delta.flags["games_played"], 1);
    }

    #[test]
    fn explicit_games_played_report_adds_to_derived_bump() {
        let delta = evaluate_batch(&[
            FlagUpdate::new("games_played", 2),
            FlagUpdate::new("code_solo_clears", 1),
        ]);
        assert_eq!(delta.flags["games_played"], 3);
    }

    #[test]
    fn coin_credit_saturates_at_currency_ceiling() {
        let delta = evaluate_batch(&[
            FlagUpdate::new("casino_coins_earned", i64::MAX),
            FlagUpdate::new("casino_coins_earned", i64::MAX),
            FlagUpdate::new("casino_coins_earned", i64::MAX),
        ]);
        assert_eq!(delta.currency, u64::MAX);
        assert_eq!(delta.flags["casino_coins_earned"], i64::MAX);
    }

    #[test]
    fn flag_sums_saturate_both_ways() {
        let delta = evaluate_batch(&[
            FlagUpdate::new("casino_losses", i64::MAX),
            FlagUpdate::new("casino_losses", 1),
            FlagUpdate::new("code_failures", i64::MIN),
            FlagUpdate::new("code_failures", -1),
        ]);
        assert_eq!(delta.flags["casino_losses"], i64::MAX);
        assert_eq!(delta.flags["code_failures"], i64::MIN);

        let mut flags = BTreeMap::new();
        flags.insert("casino_losses".to_string(), 10);
        flags.insert("code_failures".to_string(), -10);
        delta.apply_to(&mut flags);
        assert_eq!(flags["casino_losses"], i64::MAX);
        assert_eq!(flags["code_failures"], i64::MIN);
    }

    #[test]
    fn apply_to_creates_missing_keys() {
        let delta = evaluate_batch(&[FlagUpdate::new("casino_losses", 4)]);
        let mut flags = BTreeMap::new();
        flags.insert("casino_losses".to_string(), 1);
        delta.apply_to(&mut flags);
        delta.apply_to(&mut flags);
        assert_eq!(flags["casino_losses"], 9);
    }
}
