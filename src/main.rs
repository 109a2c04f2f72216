//! Binary entrypoint for the Festquest CLI.
//!
//! Commands:
//! - `init` - create a starter `festquest.toml` and open the store (seeding the catalog)
//! - `provision <id>` - create one participant
//! - `apply <id> --flag name=delta ... | --batch file.json` - apply a batch of flag deltas
//! - `show <id>` - print a participant record as JSON
//! - `history <id> [--limit n]` - print the most recent applied batches
//! - `catalog` - list curated quest definitions
//! - `preview <category> [--seed n]` - generate a sample quest from zeroed flags
//! - `status` - print participant count and counters
//!
//! See the library crate docs for module-level details: `festquest::`.
use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use festquest::config::Config;
use festquest::metrics;
use festquest::progress::{generate_quest, Category, FlagUpdate, FlagUpdateEngine, QuestGenerator};
use festquest::validation::{parse_flag_assignment, parse_update_batch};

#[derive(Parser)]
#[command(name = "festquest")]
#[command(about = "Flag-update and quest-progression engine for live-event participants")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "festquest.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file and initialize the store
    Init,
    /// Create a participant with zeroed flags and level-1 quests
    Provision {
        /// Participant id
        id: String,
    },
    /// Apply a batch of flag deltas to a participant
    Apply {
        /// Participant id
        id: String,
        /// Flag delta as name=delta (repeatable)
        #[arg(short, long = "flag")]
        flags: Vec<String>,
        /// JSON file holding the batch
        #[arg(short, long, conflicts_with = "flags")]
        batch: Option<String>,
    },
    /// Show a participant record
    Show {
        /// Participant id
        id: String,
    },
    /// Show the most recent batches applied to a participant
    History {
        /// Participant id
        id: String,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// List curated quest definitions
    Catalog,
    /// Generate a sample quest for a category
    Preview {
        /// casino, dungeon or code_editor
        category: String,
        /// Seed for a reproducible sample
        #[arg(short, long)]
        seed: Option<u64>,
    },
    /// Show store and engine statistics
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        init_logging(&None, cli.verbose);
        info!("Initializing new Festquest configuration");
        Config::create_default(&cli.config).await?;
        info!("Configuration file created at {}", cli.config);
        let config = Config::load(&cli.config).await?;
        let engine = FlagUpdateEngine::from_config(&config)?;
        info!(
            "Initialized store at {}/progress ({} curated quest definitions)",
            config.storage.data_dir,
            engine.catalog().len()
        );
        return Ok(());
    }

    let config = Config::load(&cli.config).await?;
    init_logging(&Some(config.clone()), cli.verbose);

    if let Commands::Preview { category, seed } = &cli.command {
        let generator = QuestGenerator::new(
            config.quests.currency_per_difficulty,
            config.quests.experience_per_difficulty,
        );
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(*seed),
            None => StdRng::from_entropy(),
        };
        match generate_quest(&generator, category, &BTreeMap::new(), &mut rng) {
            Some(quest) => println!("{}", serde_json::to_string_pretty(&quest)?),
            None => println!("No quest available for category '{}'", category),
        }
        return Ok(());
    }

    let engine = FlagUpdateEngine::from_config(&config)?;

    match cli.command {
        Commands::Init | Commands::Preview { .. } => {}
        Commands::Provision { id } => {
            let record = engine.provision_participant(&id)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Apply { id, flags, batch } => {
            let outcome = match batch {
                Some(path) => {
                    let content = tokio::fs::read_to_string(&path)
                        .await
                        .map_err(|e| anyhow!("Failed to read batch file {}: {}", path, e))?;
                    let raw: serde_json::Value = serde_json::from_str(&content)
                        .map_err(|e| anyhow!("Failed to parse batch file {}: {}", path, e))?;
                    let updates = parse_update_batch(&raw)?;
                    engine.apply_updates(&id, &updates)?
                }
                None => {
                    let updates = flags
                        .iter()
                        .map(|f| parse_flag_assignment(f))
                        .collect::<Result<Vec<FlagUpdate>, _>>()?;
                    engine.apply_updates(&id, &updates)?
                }
            };
            for advancement in &outcome.progression.advanced {
                println!(
                    "Quest complete: {} '{}' (+{} currency, +{} exp)",
                    advancement.category,
                    advancement.completed_quest,
                    advancement.reward_currency,
                    advancement.reward_experience
                );
            }
            println!("{}", serde_json::to_string_pretty(&outcome.record)?);
        }
        Commands::Show { id } => {
            let record = engine.get_participant(&id)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            for category in Category::ALL {
                match record.active_quest(category) {
                    Some(quest) => {
                        let (done, required) = quest.progress(&record.flags);
                        println!(
                            "{:<12} lv{:<3} {} [{}/{}]",
                            category.as_str(),
                            record.level(category),
                            quest.description,
                            done,
                            required
                        );
                    }
                    None => println!("{:<12} cleared", category.as_str()),
                }
            }
        }
        Commands::History { id, limit } => {
            let entries = engine.history(&id, limit)?;
            if entries.is_empty() {
                println!("No batches recorded for {}", id);
            }
            for entry in entries {
                let summary: Vec<String> = entry
                    .updates
                    .iter()
                    .map(|u| format!("{}{:+}", u.flag_name, u.increment))
                    .collect();
                println!(
                    "{} {} [{}]{}",
                    entry.applied_at.format("%Y-%m-%dT%H:%M:%SZ"),
                    entry.batch_id,
                    summary.join(", "),
                    if entry.advanced.is_empty() {
                        String::new()
                    } else {
                        format!(" advanced: {:?}", entry.advanced)
                    }
                );
            }
        }
        Commands::Catalog => {
            if engine.catalog().is_empty() {
                println!("No curated quest definitions; all levels are generated.");
            }
            for def in engine.catalog().definitions() {
                println!(
                    "{:<12} lv{:<3} {} >= {} (+{} currency, +{} exp){}",
                    def.category.as_str(),
                    def.level,
                    def.target_flag,
                    def.target_value,
                    def.reward_currency,
                    def.reward_experience,
                    def.description
                        .as_ref()
                        .map(|d| format!(" - {}", d))
                        .unwrap_or_default()
                );
            }
        }
        Commands::Status => {
            let participants = engine.store().list_participant_ids()?;
            println!("Festquest v{}", env!("CARGO_PKG_VERSION"));
            println!("Participants: {}", participants.len());
            println!("Curated quests: {}", engine.catalog().len());
            println!("Max level: {}", engine.settings().max_level);
            let snapshot = metrics::snapshot();
            println!(
                "Batches applied (this process): {} / rejected: {}",
                snapshot.batches_applied, snapshot.batches_rejected
            );
            println!(
                "Flag updates applied: {} / CAS retries: {}",
                snapshot.flag_updates_applied, snapshot.cas_retries
            );
            for category in Category::ALL {
                let counter = snapshot.quests.get(&category).copied().unwrap_or_default();
                println!(
                    "{:<12} completed {} cleared {} (+{} currency, +{} exp)",
                    category.as_str(),
                    counter.completed,
                    counter.cleared,
                    counter.currency_granted,
                    counter.experience_granted
                );
            }
        }
    }

    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // Base level from CLI verbosity overrides config
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });

    match log_file {
        Some(f) => {
            let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
            // Mirror to the console only when attached to a terminal
            let is_tty = atty::is(atty::Stream::Stdout);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            builder.format(|fmt, record| {
                writeln!(
                    fmt,
                    "{} [{}] {}",
                    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                    record.level(),
                    record.args()
                )
            });
        }
    }
    let _ = builder.try_init();
}
