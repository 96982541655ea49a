use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use headroom_algo::{
    load_study_from_path, search, survey_buses, BusHeadroom, HeadroomStudy, Injection,
    LinearizedPowerFlow, SearchResult,
};
use headroom_core::graph_utils::island_count;
use headroom_core::{Case, CaseFileLoader, CaseLoader};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Commands};

#[derive(Debug, Serialize)]
struct SearchReport<'a> {
    case_name: &'a str,
    #[serde(flatten)]
    result: SearchResult,
}

#[derive(Debug, Serialize)]
struct SurveyReport<'a> {
    case_name: &'a str,
    buses: Vec<BusHeadroom>,
}

fn init_tracing(level: Option<tracing::Level>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level.as_str()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Load the study document and the case it names, and build the study.
fn load_inputs(study_path: &Path, case_dir: Option<&Path>) -> Result<(Case, HeadroomStudy)> {
    let document = load_study_from_path(study_path)
        .with_context(|| format!("loading study {}", study_path.display()))?;
    let root: PathBuf = match case_dir {
        Some(dir) => dir.to_path_buf(),
        None => study_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    let case = CaseFileLoader::new(root)
        .load(&document.case_name)
        .with_context(|| format!("loading case '{}'", document.case_name))?;
    info!(
        case = case.name(),
        stats = %case.stats(),
        islands = island_count(&case),
        "case loaded"
    );
    let study = document
        .into_study(&case)
        .with_context(|| format!("building study from {}", study_path.display()))?;
    Ok((case, study))
}

/// Matching load and generation at one bus cancel in the linearized solver
/// when both carry the same power factor.
fn warn_if_self_cancelling(study: &HeadroomStudy) {
    let pf = study.power_factors;
    if study.injection == Injection::LoadAndGeneration && pf.load_pf == pf.gen_pf {
        warn!(
            load_pf = pf.load_pf,
            gen_pf = pf.gen_pf,
            "load and generation increments offset each other at every selected bus; \
             the result will be the search ceiling (use injection: load_only or generation_only)"
        );
    }
}

fn run_search(study_path: &Path, case_dir: Option<&Path>, per_bus: bool) -> Result<()> {
    let (mut case, study) = load_inputs(study_path, case_dir)?;
    let solver = LinearizedPowerFlow::new();
    let name = case.name().to_string();

    let json = if per_bus {
        let buses = survey_buses(&solver, &mut case, &study).context("per-bus survey failed")?;
        serde_json::to_string_pretty(&SurveyReport {
            case_name: &name,
            buses,
        })?
    } else {
        warn_if_self_cancelling(&study);
        let result = search(&solver, &mut case, &study).context("headroom search failed")?;
        if let Some(binding) = &result.binding_constraint {
            info!(%binding, "binding constraint");
        }
        serde_json::to_string_pretty(&SearchReport {
            case_name: &name,
            result,
        })?
    };
    println!("{json}");
    Ok(())
}

fn run_validate(study_path: &Path, case_dir: Option<&Path>) -> Result<()> {
    let (case, study) = load_inputs(study_path, case_dir)?;
    study
        .validate_against(&case)
        .with_context(|| format!("study {} is not valid", study_path.display()))?;
    println!(
        "{}: ok ({} buses selected, {} contingencies on case '{}')",
        study_path.display(),
        study.selection.len(),
        study.scenario.len(),
        case.name()
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    match &cli.command {
        Commands::Search {
            study,
            case_dir,
            per_bus,
        } => run_search(study, case_dir.as_deref(), *per_bus),
        Commands::Validate { study, case_dir } => run_validate(study, case_dir.as_deref()),
    }
}
