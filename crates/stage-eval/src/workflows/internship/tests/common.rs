use std::sync::Arc;

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::workflows::internship::backend::{BackendOperation, InMemoryBackend};
use crate::workflows::internship::domain::{FormSubmission, NewTutor, Tutor};
use crate::workflows::internship::resolver::{Clock, EntityResolver, ResolverSettings};
use crate::workflows::internship::{EvaluationCatalog, SubmissionOrchestrator};

pub(super) const FIXED_MILLIS: i64 = 1_700_000_000_000;

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).expect("valid date")
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn form() -> FormSubmission {
    FormSubmission {
        student_name: "Jean Dupont".to_string(),
        company_name: "ABC Corp".to_string(),
        tutor_name: "Marie Curie".to_string(),
        period: "2024-01-01 - 2024-06-30".to_string(),
        project_theme: "Refonte du portail RH".to_string(),
        objectives: "Livrer une API de gestion des congés".to_string(),
        observations: "Stagiaire rigoureux".to_string(),
        implication: "Très forte".to_string(),
        openness: "Très bonne".to_string(),
        quality: "Bonne".to_string(),
    }
}

pub(super) fn fixed_clock() -> Clock {
    Arc::new(|| FIXED_MILLIS)
}

pub(super) fn backend() -> Arc<InMemoryBackend> {
    Arc::new(InMemoryBackend::new())
}

pub(super) fn resolver(backend: &Arc<InMemoryBackend>) -> EntityResolver<InMemoryBackend> {
    EntityResolver::new(backend.clone(), ResolverSettings::default()).with_clock(fixed_clock())
}

pub(super) fn orchestrator(
    backend: &Arc<InMemoryBackend>,
) -> SubmissionOrchestrator<InMemoryBackend> {
    SubmissionOrchestrator::new(
        backend.clone(),
        ResolverSettings::default(),
        EvaluationCatalog::standard(),
    )
    .with_clock(fixed_clock())
}

pub(super) fn seed_default_tutor(backend: &InMemoryBackend) -> Tutor {
    backend.seed_tutor(NewTutor {
        last_name: "Marie".to_string(),
        first_name: "Curie".to_string(),
        email: "marie.curie@entreprise.com".to_string(),
        company: "ABC Corp".to_string(),
    })
}

pub(super) fn operations(backend: &InMemoryBackend) -> Vec<BackendOperation> {
    backend.calls().into_iter().map(|call| call.operation).collect()
}

pub(super) fn position(operations: &[BackendOperation], operation: BackendOperation) -> usize {
    operations
        .iter()
        .position(|candidate| *candidate == operation)
        .unwrap_or_else(|| panic!("{operation} was never called"))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
