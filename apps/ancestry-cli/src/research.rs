use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use ancestry_core::config::EngineConfig;
use ancestry_core::model::{Gender, JobRequest, SubjectInput};
use ancestry_core::orchestrator::{prepopulate_anchors, CancellationToken, Orchestrator};
use ancestry_core::repository::{InMemoryRepository, ResearchRepository};
use ancestry_core::sources::SourceRegistry;
use ancestry_sources::{CivilIndexAdapter, TreeApiAdapter};

/// Run a research job end-to-end and print the resulting ancestry tree
#[derive(Args)]
pub struct ResearchArgs {
    /// Subject's given name(s)
    #[clap(long)]
    given_name: String,

    /// Subject's surname
    #[clap(long)]
    surname: String,

    /// Subject's gender (male|female)
    #[clap(long, default_value = "female")]
    gender: String,

    #[clap(long)]
    birth_date: Option<String>,
    #[clap(long)]
    birth_place: Option<String>,
    #[clap(long)]
    death_date: Option<String>,
    #[clap(long)]
    death_place: Option<String>,
    #[clap(long)]
    father_name: Option<String>,
    #[clap(long)]
    mother_name: Option<String>,
    /// Free-text notes to anchor A=2..7 when explicit fields are absent
    #[clap(long)]
    notes: Option<String>,

    /// Generations to research, G in [1, 7]
    #[clap(long, default_value_t = 3)]
    generations: u8,

    /// Job identifier, used only to label output
    #[clap(long, default_value = "cli-job")]
    job_id: String,

    /// Path to an EngineConfig JSON file; defaults are used if omitted
    #[clap(long)]
    config: Option<PathBuf>,

    /// Base URL of a civil/parish registration index (omit to run source-less)
    #[clap(long)]
    civil_index_url: Option<String>,
    /// Bearer token for the civil index, if it requires one
    #[clap(long)]
    civil_index_token: Option<String>,

    /// Base URL of a genealogy-tree API
    #[clap(long)]
    tree_api_url: Option<String>,
    /// Bearer token for the tree API (required if `--tree-api-url` is set)
    #[clap(long)]
    tree_api_token: Option<String>,

    /// Print the final ancestor rows as JSON instead of a table
    #[clap(long)]
    json: bool,
}

fn parse_gender(value: &str) -> Result<Gender> {
    match value.to_lowercase().as_str() {
        "male" | "m" => Ok(Gender::Male),
        "female" | "f" => Ok(Gender::Female),
        other => anyhow::bail!("unrecognized gender '{other}', expected male or female"),
    }
}

fn build_registry(args: &ResearchArgs, config: &EngineConfig) -> Result<SourceRegistry> {
    let mut registry = SourceRegistry::new();

    if let Some(base_url) = &args.civil_index_url {
        let settings = config.source("civil-index");
        let adapter = match &args.civil_index_token {
            Some(token) => CivilIndexAdapter::with_bearer_auth(
                "civil-index",
                base_url,
                token,
                settings.rate_limit_per_sec,
                settings.retry_budget,
            )?,
            None => CivilIndexAdapter::new(
                "civil-index",
                base_url,
                settings.rate_limit_per_sec,
                settings.retry_budget,
            )?,
        };
        registry.register(Arc::new(adapter));
    }

    if let Some(base_url) = &args.tree_api_url {
        let token = args
            .tree_api_token
            .as_deref()
            .context("--tree-api-url requires --tree-api-token")?;
        let settings = config.source("familytree");
        let adapter = TreeApiAdapter::new(
            "familytree",
            base_url,
            token,
            settings.rate_limit_per_sec,
            settings.retry_budget,
        )?;
        registry.register(Arc::new(adapter));
    }

    Ok(registry)
}

pub async fn handle_command(args: ResearchArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let subject = SubjectInput {
        given_name: args.given_name.clone(),
        surname: args.surname.clone(),
        gender: parse_gender(&args.gender)?,
        birth_date: args.birth_date.clone(),
        birth_place: args.birth_place.clone(),
        death_date: args.death_date.clone(),
        death_place: args.death_place.clone(),
        father_name: args.father_name.clone(),
        mother_name: args.mother_name.clone(),
        notes: args.notes.clone(),
    };

    let registry = build_registry(&args, &config)?;
    if registry.is_empty() {
        info!("no source adapters configured; running in source-less degraded mode");
    }

    let repo = Arc::new(InMemoryRepository::new());
    repo.create_research_job(JobRequest {
        job_id: args.job_id.clone(),
        generations: args.generations,
        subject: subject.clone(),
    })
    .await
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    // Phase 0 (§4.9) is the job creator's responsibility, not the engine's.
    for anchor in prepopulate_anchors(&args.job_id, &subject) {
        repo.add_ancestor(anchor)
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;
    }

    let orchestrator = Orchestrator::new(repo.clone(), registry, config);
    let cancel = CancellationToken::new();

    info!(
        job_id = %args.job_id,
        generations = args.generations,
        "starting research job"
    );
    orchestrator.run_job(&args.job_id, cancel).await?;

    let job = repo
        .get_job(&args.job_id)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?
        .context("job vanished after completion")?;
    let ancestors = repo
        .get_ancestors(&args.job_id)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&ancestors)?);
    } else {
        println!("job {} finished as {:?}", args.job_id, job.status);
        if let Some(summary) = &job.terminal_summary {
            println!(
                "customer_data={} verified={} probable={} possible={} flagged={} not_found={}",
                summary.customer_data,
                summary.verified,
                summary.probable,
                summary.possible,
                summary.flagged,
                summary.not_found
            );
        }
        for ancestor in &ancestors {
            println!(
                "A={:<4} gen={:<2} {:<28} {:?} (score={})",
                ancestor.asc_number.0,
                ancestor.asc_number.generation(),
                ancestor.display_name,
                ancestor.confidence_level,
                ancestor.confidence_score
            );
        }
    }

    Ok(())
}
