//! Internship evaluation submission against the stage management backend.
//!
//! A wizard submission is turned into a chain of dependent REST calls:
//! intern and tutor records, the internship ("stage") itself, its period, a
//! tutor appreciation and finally one evaluation per configured category and
//! competency. Only the first four are critical; the rest degrade into a
//! partial outcome.

pub mod backend;
pub mod catalog;
pub mod domain;
pub mod orchestrator;
pub mod period;
pub mod probe;
pub mod resolver;
pub mod router;
pub mod rubric;

#[cfg(test)]
mod tests;

pub use backend::{
    BackendError, BackendGateway, BackendOperation, FailureKind, HttpBackend, InMemoryBackend,
    RetryPolicy, KNOWN_ENDPOINTS,
};
pub use catalog::{CatalogError, CategorySpec, CompetencySpec, EvaluationCatalog};
pub use domain::{EntityId, FormSubmission, ValidationError};
pub use orchestrator::{
    CreatedEntity, EntityKind, StepKind, StepReport, StepStatus, SubmissionOrchestrator,
    SubmissionOutcome, SubmissionStatus, SubmissionStep,
};
pub use period::PeriodRange;
pub use probe::{ConnectivityProber, ConnectivityReport, EndpointStatus};
pub use resolver::{EntityResolver, ResolveError, Resolved, ResolverSettings};
pub use router::submission_router;
pub use rubric::{rating_value, RubricDimension, RubricTable};
