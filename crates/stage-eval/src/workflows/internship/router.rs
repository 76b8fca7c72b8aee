use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;

use super::backend::BackendGateway;
use super::domain::FormSubmission;
use super::orchestrator::{SubmissionOrchestrator, SubmissionStatus, SubmissionStep};
use super::probe::ConnectivityProber;
use super::rubric::{RubricDimension, RubricTable};

/// Router exposing submission, connectivity and rubric endpoints.
pub fn submission_router<G>(orchestrator: Arc<SubmissionOrchestrator<G>>) -> Router
where
    G: BackendGateway + ?Sized + 'static,
{
    Router::new()
        .route("/api/v1/submissions", post(submit_handler::<G>))
        .route("/api/v1/connectivity", get(connectivity_handler::<G>))
        .route("/api/v1/rubric/:table/:dimension", get(rubric_handler))
        .with_state(orchestrator)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SubmitParams {
    /// Overrides the fallback date used for unparseable periods.
    today: Option<NaiveDate>,
}

pub(crate) async fn submit_handler<G>(
    State(orchestrator): State<Arc<SubmissionOrchestrator<G>>>,
    Query(params): Query<SubmitParams>,
    Json(form): Json<FormSubmission>,
) -> Response
where
    G: BackendGateway + ?Sized + 'static,
{
    let today = params.today.unwrap_or_else(|| Local::now().date_naive());
    let outcome = orchestrator.submit(&form, today).await;

    let status = match outcome.status {
        SubmissionStatus::Success => StatusCode::CREATED,
        SubmissionStatus::Partial => StatusCode::ACCEPTED,
        SubmissionStatus::Failed => {
            let rejected_by_validation = outcome
                .failed_steps()
                .any(|report| report.step == SubmissionStep::Validate);
            if rejected_by_validation {
                StatusCode::UNPROCESSABLE_ENTITY
            } else {
                StatusCode::BAD_GATEWAY
            }
        }
    };

    (status, Json(outcome)).into_response()
}

pub(crate) async fn connectivity_handler<G>(
    State(orchestrator): State<Arc<SubmissionOrchestrator<G>>>,
) -> Response
where
    G: BackendGateway + ?Sized + 'static,
{
    let report = ConnectivityProber::new(orchestrator.gateway().clone())
        .check_connectivity()
        .await;
    (StatusCode::OK, Json(report)).into_response()
}

pub(crate) async fn rubric_handler(Path((table, dimension)): Path<(String, String)>) -> Response {
    let parsed = table
        .parse::<RubricTable>()
        .and_then(|table| dimension.parse::<RubricDimension>().map(|dim| (table, dim)));

    match parsed {
        Ok((table, dimension)) => {
            let payload = json!({
                "table": table,
                "dimension": dimension,
                "category": dimension.label(),
                "values": table.as_map(dimension),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => {
            let payload = json!({ "error": error });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
    }
}
