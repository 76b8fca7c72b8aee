use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use stage_eval::config::{AppConfig, BackendConfig};
use stage_eval::error::AppError;
use stage_eval::workflows::internship::{
    BackendGateway, EvaluationCatalog, FormSubmission, HttpBackend, InMemoryBackend,
    RubricTable, SubmissionOrchestrator,
};
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type Orchestrator = SubmissionOrchestrator<dyn BackendGateway>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// Real REST client, or an empty in-memory backend for dry runs.
pub(crate) fn build_gateway(
    config: &BackendConfig,
    in_memory: bool,
) -> Result<Arc<dyn BackendGateway>, AppError> {
    if in_memory {
        return Ok(Arc::new(InMemoryBackend::new()));
    }
    let backend = HttpBackend::new(&config.base_url, config.timeout, config.retry_policy())?;
    Ok(Arc::new(backend))
}

pub(crate) fn build_orchestrator(
    config: &AppConfig,
    gateway: Arc<dyn BackendGateway>,
    catalog: EvaluationCatalog,
    rubric: Option<RubricTable>,
) -> Orchestrator {
    SubmissionOrchestrator::new(gateway, config.workflow.resolver.clone(), catalog)
        .with_rubric(rubric.unwrap_or(config.workflow.rubric))
}

/// Reads a wizard submission from a JSON file, or stdin for `-`.
pub(crate) fn load_form(path: &Path) -> Result<FormSubmission, AppError> {
    let raw = if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(path)?
    };
    serde_json::from_str(&raw)
        .map_err(|err| AppError::Io(io::Error::new(io::ErrorKind::InvalidData, err)))
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::Io(io::Error::new(io::ErrorKind::InvalidData, err)))?;
    println!("{rendered}");
    Ok(())
}
