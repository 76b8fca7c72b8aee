use crate::demo::{render_connectivity, render_outcome};
use crate::infra::{build_gateway, build_orchestrator, load_form, parse_date, print_json};
use chrono::{Local, NaiveDate};
use clap::Args;
use stage_eval::config::AppConfig;
use stage_eval::error::AppError;
use stage_eval::telemetry;
use stage_eval::workflows::internship::{
    ConnectivityProber, EvaluationCatalog, RubricDimension, RubricTable,
};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct SubmitArgs {
    /// Wizard state as JSON (`-` reads stdin)
    #[arg(long)]
    pub(crate) form: PathBuf,
    /// Evaluation catalog JSON overriding EVALUATION_CATALOG_PATH
    #[arg(long)]
    pub(crate) catalog: Option<PathBuf>,
    /// Date used when the period cannot be parsed (defaults to today)
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Rubric table overriding RUBRIC_TABLE
    #[arg(long)]
    pub(crate) rubric: Option<RubricTable>,
    /// Print the outcome as JSON instead of a step report
    #[arg(long)]
    pub(crate) json: bool,
    /// Run against an empty in-memory backend
    #[arg(long)]
    pub(crate) in_memory: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct CheckArgs {
    /// Print the report as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct RubricArgs {
    /// Lookup table: wizard-reset (1-5) or score-sheet (out of 20)
    #[arg(long, default_value = "wizard-reset")]
    pub(crate) table: RubricTable,
    /// implication, openness or quality
    pub(crate) dimension: RubricDimension,
}

pub(crate) async fn run_submit(args: SubmitArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let form = load_form(&args.form)?;
    let catalog = match &args.catalog {
        Some(path) => EvaluationCatalog::from_path(path)?,
        None => config.workflow.catalog()?,
    };
    let gateway = build_gateway(&config.backend, args.in_memory)?;
    let orchestrator = build_orchestrator(&config, gateway, catalog, args.rubric);

    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let outcome = orchestrator.submit(&form, today).await;

    if args.json {
        print_json(&outcome)
    } else {
        render_outcome(&outcome);
        Ok(())
    }
}

pub(crate) async fn run_check(args: CheckArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let gateway = build_gateway(&config.backend, false)?;
    let report = ConnectivityProber::new(gateway).check_connectivity().await;

    if args.json {
        print_json(&report)
    } else {
        println!("Backend: {}", config.backend.base_url);
        render_connectivity(&report);
        Ok(())
    }
}

pub(crate) fn run_rubric(args: RubricArgs) -> Result<(), AppError> {
    let RubricArgs { table, dimension } = args;
    println!("{} ({table:?})", dimension.label());
    for (label, value) in table.entries(dimension) {
        println!("  {value:>2}  {label}");
    }
    Ok(())
}
