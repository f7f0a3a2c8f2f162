use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tunefeed::config::{FileConfig, StoragePaths};
use tunefeed::events::EventFilter;
use tunefeed::{
    EngineConfig, EventStore, HttpCatalogClient, InteractionAction, ListeningEvent,
    NoOpModelRuntime, RecommendationCategory, SqliteEventStore, SqliteInteractionStore,
    TuneFeedEngine,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding the SQLite databases.
    #[clap(value_parser = parse_path)]
    pub data_dir: PathBuf,

    /// Base URL of the external catalog service.
    #[clap(long)]
    pub catalog_url: Option<String>,

    /// Timeout in seconds for catalog requests.
    #[clap(long, default_value_t = 15)]
    pub catalog_timeout_sec: u64,

    /// Path to an optional TOML configuration file.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Append a listening event to the log.
    Record {
        song_id: String,
        artist: String,
        #[clap(long)]
        genre: Option<String>,
        #[clap(long)]
        play_duration_sec: u32,
        #[clap(long)]
        total_duration_sec: u32,
        #[clap(long, default_value_t = 1)]
        play_count: u32,
        #[clap(long)]
        skipped: bool,
    },
    /// Print the derived user profile.
    Profile,
    /// Run a training cycle over all agents.
    Train,
    /// Generate catalog-backed recommendations.
    Recommend {
        /// Recompute even when a fresh cached result exists.
        #[clap(long)]
        force_refresh: bool,
        /// Only generate one category.
        #[clap(long)]
        category: Option<String>,
    },
    /// Rank the listening history through the local agents.
    LocalPicks {
        #[clap(long, default_value_t = 20)]
        count: usize,
    },
    /// Record what the user did with a recommended song
    /// (played, skipped, liked or disliked).
    Track {
        song_id: String,
        action: String,
        category: String,
    },
    /// Print per-category interaction statistics.
    Stats,
    /// Print recent listening events.
    Events {
        #[clap(long, default_value_t = 50)]
        limit: usize,
    },
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn parse_category(raw: &str) -> Result<RecommendationCategory> {
    RecommendationCategory::from_str_loose(raw)
        .with_context(|| format!("Unknown category: {}", raw))
}

fn parse_action(raw: &str) -> Result<InteractionAction> {
    InteractionAction::from_str_loose(raw).with_context(|| format!("Unknown action: {}", raw))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = cli_args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;
    let config = EngineConfig::resolve(file_config);

    std::fs::create_dir_all(&cli_args.data_dir)
        .with_context(|| format!("Could not create data dir {:?}", cli_args.data_dir))?;
    let paths = StoragePaths::new(cli_args.data_dir.clone());

    let events = Arc::new(SqliteEventStore::new(paths.events_db_path())?);
    let interactions = Arc::new(SqliteInteractionStore::new(paths.interactions_db_path())?);

    let catalog = cli_args
        .catalog_url
        .as_ref()
        .map(|url| {
            info!("Using catalog service at {}", url);
            HttpCatalogClient::new(url.clone(), cli_args.catalog_timeout_sec)
                .map(|client| Arc::new(client) as Arc<dyn tunefeed::CatalogClient>)
        })
        .transpose()?;

    let engine = TuneFeedEngine::new(
        config,
        events.clone(),
        interactions,
        catalog,
        Arc::new(NoOpModelRuntime),
    );

    match cli_args.command {
        Command::Record {
            song_id,
            artist,
            genre,
            play_duration_sec,
            total_duration_sec,
            play_count,
            skipped,
        } => {
            let id = engine.record_event(&ListeningEvent {
                id: None,
                song_id,
                artist,
                genre,
                timestamp_ms: now_ms(),
                play_duration_sec,
                total_duration_sec,
                play_count,
                skipped,
            })?;
            info!("Recorded listening event {}", id);
        }
        Command::Profile => {
            print_json(&engine.profile()?)?;
        }
        Command::Train => {
            let report = engine.train_agents().await?;
            for (agent, outcome) in &report.outcomes {
                match &outcome.error {
                    None => println!("{}: trained (v{})", agent, outcome.state.version),
                    Some(error) => println!("{}: failed ({})", agent, error),
                }
            }
        }
        Command::Recommend {
            force_refresh,
            category,
        } => match category {
            Some(raw) => {
                let category = parse_category(&raw)?;
                print_json(&engine.category(category, force_refresh).await?)?;
            }
            None => {
                print_json(&engine.generate_recommendations(force_refresh).await?)?;
            }
        },
        Command::LocalPicks { count } => {
            print_json(&engine.get_local_picks(count).await?)?;
        }
        Command::Track {
            song_id,
            action,
            category,
        } => {
            engine.track_interaction(
                &song_id,
                parse_action(&action)?,
                parse_category(&category)?,
                now_ms(),
            );
        }
        Command::Stats => {
            let stats = engine.interaction_stats()?;
            let printable: std::collections::BTreeMap<String, _> = stats
                .into_iter()
                .map(|(category, s)| (category.as_str().to_string(), s))
                .collect();
            print_json(&printable)?;
        }
        Command::Events { limit } => {
            let recent = events.query(&EventFilter {
                limit: Some(limit),
                ..Default::default()
            })?;
            print_json(&recent)?;
        }
    }

    Ok(())
}
