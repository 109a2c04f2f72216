//! Test utilities & fixtures.
//! Builds throwaway engines on temp-dir sled stores with seeded randomness.

use std::sync::Arc;

use festquest::progress::{
    EngineSettings, FlagUpdateEngine, ProgressStoreBuilder, QuestCatalog, QuestDefinition,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Engine over a fresh store with the given curated definitions and default settings.
#[allow(dead_code)]
pub fn engine_with_catalog(definitions: Vec<QuestDefinition>) -> (tempfile::TempDir, FlagUpdateEngine) {
    engine_with(definitions, EngineSettings::default())
}

#[allow(dead_code)]
pub fn engine_with(
    definitions: Vec<QuestDefinition>,
    settings: EngineSettings,
) -> (tempfile::TempDir, FlagUpdateEngine) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = ProgressStoreBuilder::new(tmp.path())
        .without_catalog_seed()
        .open()
        .expect("store");
    for definition in &definitions {
        store
            .put_quest_definition(definition.clone())
            .expect("put definition");
    }
    let catalog = QuestCatalog::from_store(&store).expect("catalog");
    let engine = FlagUpdateEngine::new(Arc::new(store), catalog, settings)
        .with_rng(StdRng::seed_from_u64(0x5eed));
    (tmp, engine)
}
