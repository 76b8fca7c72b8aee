//! Gateway to the stage management REST backend.
//!
//! `BackendGateway` is the seam between the submission workflow and the
//! network. `HttpBackend` talks to the real service; `InMemoryBackend`
//! mirrors its uniqueness rules for demos and tests.

mod http;
mod memory;

pub use http::{HttpBackend, RetryPolicy};
pub use memory::{InMemoryBackend, RecordedCall, StoredEvaluation};

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use super::domain::{
    Appreciation, Category, Competency, EntityId, Evaluation, Intern, InternshipRecord,
    NewAppreciation, NewCategory, NewCompetency, NewEvaluation, NewIntern, NewInternship,
    NewPeriod, NewTutor, Period, Tutor,
};

/// Collection endpoints checked by the connectivity probe.
pub const KNOWN_ENDPOINTS: [&str; 8] = [
    "/stages",
    "/periodes",
    "/tuteurs",
    "/stagiaires",
    "/appreciations",
    "/competences",
    "/categories",
    "/evaluations",
];

/// Every backend call the workflow can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendOperation {
    FindIntern,
    CreateIntern,
    FindTutor,
    CreateTutor,
    CreateInternship,
    CreatePeriod,
    LinkPeriodTutor,
    ListAppreciations,
    CreateAppreciation,
    FindCategory,
    CreateCategory,
    FindCompetency,
    CreateCompetency,
    UpdateCompetencyScore,
    CreateEvaluation,
    Probe,
}

impl BackendOperation {
    pub fn label(self) -> &'static str {
        match self {
            BackendOperation::FindIntern => "find intern",
            BackendOperation::CreateIntern => "create intern",
            BackendOperation::FindTutor => "find tutor",
            BackendOperation::CreateTutor => "create tutor",
            BackendOperation::CreateInternship => "create internship",
            BackendOperation::CreatePeriod => "create period",
            BackendOperation::LinkPeriodTutor => "link period tutor",
            BackendOperation::ListAppreciations => "list appreciations",
            BackendOperation::CreateAppreciation => "create appreciation",
            BackendOperation::FindCategory => "find category",
            BackendOperation::CreateCategory => "create category",
            BackendOperation::FindCompetency => "find competency",
            BackendOperation::CreateCompetency => "create competency",
            BackendOperation::UpdateCompetencyScore => "update competency score",
            BackendOperation::CreateEvaluation => "create evaluation",
            BackendOperation::Probe => "probe",
        }
    }
}

impl fmt::Display for BackendOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Failure of a single backend call after the client's retry policy ran.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Find-by-key miss (HTTP 404). Callers treat it as the creation signal.
    #[error("resource not found")]
    NotFound,
    /// A unique key (email, title) is already taken.
    #[error("conflict: {0}")]
    Conflict(String),
    /// No response was received.
    #[error("backend unreachable: {0}")]
    Transient(String),
    #[error("backend error {status}: {message}")]
    Server { status: u16, message: String },
    /// Any other rejected request.
    #[error("request rejected with status {status}: {message}")]
    Fatal { status: u16, message: String },
    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// Coarse grouping used for retry and reporting decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Conflict,
    Transient,
    Fatal,
}

impl BackendError {
    pub fn kind(&self) -> FailureKind {
        match self {
            BackendError::Conflict(_) => FailureKind::Conflict,
            BackendError::Transient(_) | BackendError::Server { .. } => FailureKind::Transient,
            BackendError::NotFound | BackendError::Fatal { .. } | BackendError::Decode(_) => {
                FailureKind::Fatal
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound)
    }
}

/// Outcome of a lightweight reachability request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProbeResponse {
    pub status: u16,
}

#[async_trait]
pub trait BackendGateway: Send + Sync {
    async fn find_intern_by_email(&self, email: &str) -> Result<Intern, BackendError>;
    async fn create_intern(&self, intern: &NewIntern) -> Result<Intern, BackendError>;

    async fn find_tutor_by_email(&self, email: &str) -> Result<Tutor, BackendError>;
    async fn create_tutor(&self, tutor: &NewTutor) -> Result<Tutor, BackendError>;

    async fn create_internship(
        &self,
        internship: &NewInternship,
    ) -> Result<InternshipRecord, BackendError>;

    async fn create_period(&self, period: &NewPeriod) -> Result<Period, BackendError>;
    async fn link_period_tutor(
        &self,
        period_id: EntityId,
        tutor_id: EntityId,
    ) -> Result<(), BackendError>;

    async fn appreciations_for_tutor(
        &self,
        tutor_id: EntityId,
    ) -> Result<Vec<Appreciation>, BackendError>;
    async fn create_appreciation(
        &self,
        tutor_id: EntityId,
        appreciation: &NewAppreciation,
    ) -> Result<Appreciation, BackendError>;

    async fn find_category(&self, name: &str) -> Result<Category, BackendError>;
    async fn create_category(&self, category: &NewCategory) -> Result<Category, BackendError>;

    async fn find_competency(&self, name: &str) -> Result<Competency, BackendError>;
    async fn create_competency(
        &self,
        competency: &NewCompetency,
    ) -> Result<Competency, BackendError>;
    async fn update_competency_score(
        &self,
        competency: &Competency,
        score: f64,
    ) -> Result<Competency, BackendError>;

    async fn create_evaluation(
        &self,
        evaluation: &NewEvaluation,
    ) -> Result<Evaluation, BackendError>;

    /// Any HTTP response counts as reachable; only transport failures error.
    async fn probe(&self, path: &str) -> Result<ProbeResponse, BackendError>;
}

/// Recognizes duplicate-key rejections that the backend reports without a 409.
/// Other constraint violations (not-null, foreign key) stay server errors.
pub(crate) fn mentions_duplicate(message: &str) -> bool {
    let lowered = message.to_lowercase();
    message.contains("UK_")
        || ["duplicate", "unique", "already exists", "existe déjà"]
            .iter()
            .any(|needle| lowered.contains(needle))
}
