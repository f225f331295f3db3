use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use matchwise_common::{EngineConfig, LeadSource, Profile, RelationshipDraft};
use matchwise_engine::memory::{InMemoryStore, MemoryCacheStore};
use matchwise_engine::scoring::{Scorer, SignalCollector};
use matchwise_engine::similarity::{email_similarity, string_similarity, token_overlap};
use matchwise_engine::traits::HistoryStore;
use matchwise_engine::{
    CacheLayer, CreateOutcome, Deduplicator, EntityGateway, LeadService, MatchService,
    NotificationPlanner, RecommendOptions, RecommendationGenerator,
};

#[derive(Parser)]
#[command(name = "matchwise")]
#[command(about = "Score, deduplicate and plan follow-ups for provider/seeker pairings")]
#[command(version)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rank counterparts for one profile
    Recommend {
        /// JSON array of profiles
        #[arg(long)]
        profiles: PathBuf,

        #[arg(long)]
        subject: Uuid,

        #[arg(long)]
        min_score: Option<f64>,

        #[arg(long)]
        max_results: Option<usize>,
    },

    /// Create a relationship for a pair and print its nurturing workflow
    Plan {
        #[arg(long)]
        profiles: PathBuf,

        #[arg(long)]
        provider: Uuid,

        #[arg(long)]
        seeker: Uuid,
    },

    /// Compare two strings the way the deduplicator does
    Similarity { a: String, b: String },
}

struct Engine {
    leads: LeadService,
    matches: MatchService,
}

impl Engine {
    fn in_memory(store: Arc<InMemoryStore>, config: EngineConfig) -> Self {
        let gateway = EntityGateway::new(store.clone());
        let dedup = Deduplicator::new(store.clone(), gateway.clone(), &config);
        let signals = SignalCollector::new(
            Some(store.clone() as Arc<dyn HistoryStore>),
            store.clone(),
            gateway.clone(),
            config.activity_lookback_days,
        );
        let generator = RecommendationGenerator::new(
            dedup.clone(),
            signals.clone(),
            Scorer::new(),
            store.clone(),
            &config,
        );
        let planner = NotificationPlanner::new(store.clone(), gateway.clone());
        let leads = LeadService::new(
            gateway.clone(),
            store.clone(),
            store,
            dedup,
            signals,
            Scorer::new(),
            planner.clone(),
        );
        let cache = CacheLayer::new(Arc::new(MemoryCacheStore::new()));
        let matches = MatchService::new(gateway, generator, planner, cache, config);
        Self { leads, matches }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    match cli.command {
        Command::Recommend {
            profiles,
            subject,
            min_score,
            max_results,
        } => {
            let engine = load_engine(&profiles)?;
            let options = RecommendOptions {
                min_score,
                max_results,
                ..Default::default()
            };
            let set = engine
                .matches
                .recommendations_for(subject, options, &cancel)
                .await?;

            if let Some(report) = &set.report {
                info!(
                    considered = report.pairs_considered,
                    below_threshold = report.pairs_below_threshold,
                    factor_errors = report.factor_errors,
                    "Batch finished"
                );
                if !report.writes.is_clean() {
                    eprint!("{}", report.writes);
                }
            }
            println!("{}", serde_json::to_string_pretty(&set.recommendations)?);
        }
        Command::Plan {
            profiles,
            provider,
            seeker,
        } => {
            let engine = load_engine(&profiles)?;
            let draft = RelationshipDraft::new(provider, seeker, LeadSource::Manual);
            match engine.leads.create_relationship(draft, &cancel).await? {
                CreateOutcome::Created {
                    relationship,
                    workflow,
                    suggestions,
                    notify,
                } => {
                    let output = json!({
                        "relationship": relationship,
                        "workflow": workflow,
                        "suggestions": suggestions.iter().map(ToString::to_string).collect::<Vec<_>>(),
                        "notifications": notify.appended,
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                CreateOutcome::Duplicate(check) => {
                    let output = json!({
                        "duplicate_of": check.matched_id,
                        "confidence": check.confidence,
                        "suggestions": check.suggestion_lines(),
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
            }
        }
        Command::Similarity { a, b } => {
            let mut output = json!({
                "string": string_similarity(&a, &b),
                "tokens": token_overlap(&a, &b),
            });
            if a.contains('@') && b.contains('@') {
                output["email"] = json!(email_similarity(&a, &b));
            }
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

fn init_tracing(json_logs: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("matchwise=info".parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn load_engine(path: &Path) -> Result<Engine> {
    let config = EngineConfig::from_env()?;
    config.log();

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading profiles from {}", path.display()))?;
    let profiles: Vec<Profile> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing profiles in {}", path.display()))?;
    info!(count = profiles.len(), path = %path.display(), "Profiles loaded");

    let store = Arc::new(InMemoryStore::with_profiles(profiles));
    Ok(Engine::in_memory(store, config))
}
