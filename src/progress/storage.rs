use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, warn};
use sled::IVec;

use crate::metrics;
use crate::progress::catalog::default_catalog_seed;
use crate::progress::errors::ProgressError;
use crate::progress::types::{
    Category, ParticipantRecord, QuestDefinition, UpdateLogEntry, PARTICIPANT_SCHEMA_VERSION,
    QUEST_DEFINITION_SCHEMA_VERSION, UPDATE_LOG_SCHEMA_VERSION,
};

const TREE_PARTICIPANTS: &str = "progress_participants";
const TREE_CATALOG: &str = "progress_catalog";
const TREE_LOG: &str = "progress_log";

/// Upper bound on compare-and-swap attempts for a single participant update.
const MAX_CAS_ATTEMPTS: usize = 64;

fn next_timestamp_nanos() -> i64 {
    let now = Utc::now();
    now.timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros() * 1000)
}

/// Outcome of a read-modify-write closure.
pub enum Mutation<T> {
    /// Persist the modified record.
    Commit(T),
    /// Leave the stored record untouched.
    Discard(T),
}

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct ProgressStoreBuilder {
    path: PathBuf,
    ensure_catalog_seed: bool,
}

impl ProgressStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ensure_catalog_seed: true,
        }
    }

    /// Opt out of seeding the curated quest catalog (useful for targeted tests).
    pub fn without_catalog_seed(mut self) -> Self {
        self.ensure_catalog_seed = false;
        self
    }

    pub fn open(self) -> Result<ProgressStore, ProgressError> {
        ProgressStore::open_with_options(self.path, self.ensure_catalog_seed)
    }
}

/// Sled-backed persistence for participant progress, the curated quest catalog and the
/// applied-batch audit log.
pub struct ProgressStore {
    _db: sled::Db,
    participants: sled::Tree,
    catalog: sled::Tree,
    log: sled::Tree,
}

impl ProgressStore {
    /// Open (or create) the store rooted at `path`, seeding the curated catalog when empty.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ProgressError> {
        Self::open_with_options(path, true)
    }

    fn open_with_options<P: AsRef<Path>>(path: P, seed_catalog: bool) -> Result<Self, ProgressError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let participants = db.open_tree(TREE_PARTICIPANTS)?;
        let catalog = db.open_tree(TREE_CATALOG)?;
        let log = db.open_tree(TREE_LOG)?;
        let store = Self {
            _db: db,
            participants,
            catalog,
            log,
        };

        if seed_catalog {
            store.seed_catalog_if_needed(&default_catalog_seed())?;
        }

        Ok(store)
    }

    fn participant_key(id: &str) -> Vec<u8> {
        format!("participants:{}", id).into_bytes()
    }

    fn definition_key(category: Category, level: u32) -> Vec<u8> {
        format!("quests:{}:{:04}", category, level).into_bytes()
    }

    fn log_prefix(id: &str) -> Vec<u8> {
        format!("log:{}:", id).into_bytes()
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, ProgressError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, ProgressError> {
        Ok(bincode::deserialize::<T>(bytes)?)
    }

    fn decode_participant(bytes: &[u8]) -> Result<ParticipantRecord, ProgressError> {
        let record: ParticipantRecord = Self::deserialize(bytes)?;
        if record.schema_version != PARTICIPANT_SCHEMA_VERSION {
            return Err(ProgressError::SchemaMismatch {
                entity: "participant",
                expected: PARTICIPANT_SCHEMA_VERSION,
                found: record.schema_version,
            });
        }
        Ok(record)
    }

    /// Insert a brand-new participant. Fails with `Conflict` when the id is taken.
    pub fn create_participant(&self, mut record: ParticipantRecord) -> Result<ParticipantRecord, ProgressError> {
        record.schema_version = PARTICIPANT_SCHEMA_VERSION;
        record.touch();
        let key = Self::participant_key(&record.id);
        let bytes = Self::serialize(&record)?;
        match self
            .participants
            .compare_and_swap(key, None as Option<&[u8]>, Some(bytes))?
        {
            Ok(()) => {
                self.participants.flush()?;
                Ok(record)
            }
            Err(_) => Err(ProgressError::Conflict(format!("participant: {}", record.id))),
        }
    }

    /// Fetch a participant record by id.
    pub fn get_participant(&self, id: &str) -> Result<ParticipantRecord, ProgressError> {
        let key = Self::participant_key(id);
        let Some(bytes) = self.participants.get(&key)? else {
            return Err(ProgressError::NotFound(format!("participant: {}", id)));
        };
        Self::decode_participant(&bytes)
    }

    pub fn participant_exists(&self, id: &str) -> Result<bool, ProgressError> {
        Ok(self.participants.contains_key(Self::participant_key(id))?)
    }

    /// List all participant ids currently stored.
    pub fn list_participant_ids(&self) -> Result<Vec<String>, ProgressError> {
        let mut ids = Vec::new();
        for entry in self.participants.scan_prefix(b"participants:") {
            let (key, _) = entry?;
            let text = String::from_utf8_lossy(&key);
            if let Some(id) = text.strip_prefix("participants:") {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }

    /// Atomic conditional read-modify-write on one participant.
    ///
    /// The closure sees the latest stored record and may run more than once when a
    /// concurrent writer wins the compare-and-swap; it must derive everything from the
    /// record it is handed. Returning an error aborts without writing. Missing records
    /// yield `NotFound` and nothing is created.
    pub fn update_participant<T, F>(
        &self,
        id: &str,
        mut apply: F,
    ) -> Result<(ParticipantRecord, T), ProgressError>
    where
        F: FnMut(&mut ParticipantRecord) -> Result<Mutation<T>, ProgressError>,
    {
        let key = Self::participant_key(id);
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let Some(current) = self.participants.get(&key)? else {
                return Err(ProgressError::NotFound(format!("participant: {}", id)));
            };
            let mut record = Self::decode_participant(&current)?;
            let value = match apply(&mut record)? {
                Mutation::Commit(value) => value,
                Mutation::Discard(value) => return Ok((record, value)),
            };
            record.schema_version = PARTICIPANT_SCHEMA_VERSION;
            record.touch();
            let bytes = Self::serialize(&record)?;
            match self
                .participants
                .compare_and_swap(&key, Some(current), Some(bytes))?
            {
                Ok(()) => {
                    self.participants.flush()?;
                    if attempt > 1 {
                        debug!("participant {} committed after {} attempts", id, attempt);
                    }
                    return Ok((record, value));
                }
                Err(_) => {
                    metrics::inc_cas_retries();
                    warn!("participant {} changed concurrently, retrying (attempt {})", id, attempt);
                }
            }
        }
        Err(ProgressError::Internal(format!(
            "participant {} still contended after {} attempts",
            id, MAX_CAS_ATTEMPTS
        )))
    }

    /// Insert or update a curated quest definition.
    pub fn put_quest_definition(&self, mut definition: QuestDefinition) -> Result<(), ProgressError> {
        definition.schema_version = QUEST_DEFINITION_SCHEMA_VERSION;
        let key = Self::definition_key(definition.category, definition.level);
        let bytes = Self::serialize(&definition)?;
        self.catalog.insert(key, bytes)?;
        self.catalog.flush()?;
        Ok(())
    }

    /// All curated definitions, ordered by category then level.
    pub fn list_quest_definitions(&self) -> Result<Vec<QuestDefinition>, ProgressError> {
        self.catalog
            .scan_prefix(b"quests:")
            .map(|result| {
                result
                    .map_err(ProgressError::from)
                    .and_then(|(_key, value)| Self::deserialize(&value))
            })
            .collect()
    }

    pub fn seed_catalog_if_needed(&self, seed: &[QuestDefinition]) -> Result<usize, ProgressError> {
        if self.catalog.scan_prefix(b"quests:").next().is_some() {
            return Ok(0);
        }
        let mut inserted = 0usize;
        for definition in seed {
            self.put_quest_definition(definition.clone())?;
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Append an audit entry for an applied batch.
    pub fn append_update_log(&self, mut entry: UpdateLogEntry) -> Result<(), ProgressError> {
        entry.schema_version = UPDATE_LOG_SCHEMA_VERSION;
        let key = format!(
            "log:{}:{:020}:{}",
            entry.participant_id,
            next_timestamp_nanos(),
            entry.batch_id
        )
        .into_bytes();
        let bytes = Self::serialize(&entry)?;
        self.log.insert(key, bytes)?;
        self.log.flush()?;
        Ok(())
    }

    /// Most recent audit entries for a participant, newest first.
    pub fn recent_updates(&self, id: &str, limit: usize) -> Result<Vec<UpdateLogEntry>, ProgressError> {
        self.log
            .scan_prefix(Self::log_prefix(id))
            .rev()
            .take(limit)
            .map(|result| {
                result
                    .map_err(ProgressError::from)
                    .and_then(|(_key, value): (IVec, IVec)| Self::deserialize(&value))
            })
            .collect()
    }
}
