//! In-process counters for the update engine.
//! Values are process-local and reset on restart; `status` prints them.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};

use crate::progress::types::{Category, QuestTrack};

static BATCHES_APPLIED: AtomicU64 = AtomicU64::new(0);
static BATCHES_REJECTED: AtomicU64 = AtomicU64::new(0);
static FLAG_UPDATES_APPLIED: AtomicU64 = AtomicU64::new(0);
static CAS_RETRIES: AtomicU64 = AtomicU64::new(0);

static QUEST_COUNTERS: OnceLock<Mutex<HashMap<Category, QuestCounter>>> = OnceLock::new();

pub fn inc_batches_applied(entries: usize) {
    BATCHES_APPLIED.fetch_add(1, Ordering::Relaxed);
    FLAG_UPDATES_APPLIED.fetch_add(entries as u64, Ordering::Relaxed);
}

pub fn inc_batches_rejected() {
    BATCHES_REJECTED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_cas_retries() {
    CAS_RETRIES.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QuestCounter {
    pub completed: u64,
    pub cleared: u64,
    pub currency_granted: u64,
    pub experience_granted: u64,
}

fn quest_counter_lock() -> MutexGuard<'static, HashMap<Category, QuestCounter>> {
    QUEST_COUNTERS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn record_quest_completion(
    category: Category,
    to: QuestTrack,
    currency: u64,
    experience: u64,
) -> QuestCounter {
    let mut guard = quest_counter_lock();
    let counter = guard.entry(category).or_default();
    counter.completed = counter.completed.saturating_add(1);
    if to.is_cleared() {
        counter.cleared = counter.cleared.saturating_add(1);
    }
    counter.currency_granted = counter.currency_granted.saturating_add(currency);
    counter.experience_granted = counter.experience_granted.saturating_add(experience);
    *counter
}

pub fn quest_counters_snapshot() -> HashMap<Category, QuestCounter> {
    quest_counter_lock().clone()
}

#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    pub batches_applied: u64,
    pub batches_rejected: u64,
    pub flag_updates_applied: u64,
    pub cas_retries: u64,
    pub quests: HashMap<Category, QuestCounter>,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        batches_applied: BATCHES_APPLIED.load(Ordering::Relaxed),
        batches_rejected: BATCHES_REJECTED.load(Ordering::Relaxed),
        flag_updates_applied: FLAG_UPDATES_APPLIED.load(Ordering::Relaxed),
        cas_retries: CAS_RETRIES.load(Ordering::Relaxed),
        quests: quest_counters_snapshot(),
    }
}
