use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info, warn};

use super::backend::BackendGateway;
use super::catalog::EvaluationCatalog;
use super::domain::{
    Appreciation, EntityId, EntityRef, EvaluationTarget, FormSubmission, NewAppreciation,
    NewEvaluation, NewInternship, NewPeriod, Tutor,
};
use super::period::PeriodRange;
use super::resolver::{Clock, EntityResolver, ResolverSettings};
use super::rubric::{rating_value, RubricDimension, RubricTable};

const MAX_TEXT_LEN: usize = 1000;

pub const SUCCESS_MESSAGE: &str = "Données enregistrées avec succès dans la base de données!";
pub const EVALUATIONS_SKIPPED_MESSAGE: &str =
    "Stage créé avec succès, mais les évaluations n'ont pas pu être créées.";
pub const FAILURE_MESSAGE: &str = "Erreur lors de l'enregistrement";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStep {
    Validate,
    ResolveIntern,
    ResolveTutor,
    CreateInternship,
    CreatePeriod,
    LinkPeriodTutor,
    ResolveAppreciation,
    CategoryEvaluation,
    CompetencyEvaluation,
}

impl SubmissionStep {
    pub fn kind(self) -> StepKind {
        match self {
            SubmissionStep::Validate
            | SubmissionStep::ResolveIntern
            | SubmissionStep::ResolveTutor
            | SubmissionStep::CreateInternship => StepKind::Critical,
            SubmissionStep::CreatePeriod
            | SubmissionStep::LinkPeriodTutor
            | SubmissionStep::ResolveAppreciation
            | SubmissionStep::CategoryEvaluation
            | SubmissionStep::CompetencyEvaluation => StepKind::BestEffort,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SubmissionStep::Validate => "validate form",
            SubmissionStep::ResolveIntern => "resolve intern",
            SubmissionStep::ResolveTutor => "resolve tutor",
            SubmissionStep::CreateInternship => "create internship",
            SubmissionStep::CreatePeriod => "create period",
            SubmissionStep::LinkPeriodTutor => "link period to tutor",
            SubmissionStep::ResolveAppreciation => "resolve appreciation",
            SubmissionStep::CategoryEvaluation => "category evaluation",
            SubmissionStep::CompetencyEvaluation => "competency evaluation",
        }
    }
}

/// Critical steps abort the submission; best-effort failures are reported and skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Critical,
    BestEffort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: SubmissionStep,
    pub kind: StepKind,
    pub status: StepStatus,
    /// Category or competency title for per-item steps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Intern,
    Tutor,
    Internship,
    Period,
    Appreciation,
    Category,
    Competency,
    Evaluation,
}

/// A record persisted by this submission (reused records are not listed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedEntity {
    pub kind: EntityKind,
    pub id: EntityId,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Success,
    Partial,
    Failed,
}

/// Aggregate result handed back to the caller of `submit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionOutcome {
    pub status: SubmissionStatus,
    pub internship_id: Option<EntityId>,
    pub appreciation_id: Option<EntityId>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub steps: Vec<StepReport>,
    pub created: Vec<CreatedEntity>,
}

impl SubmissionOutcome {
    /// True when the critical steps went through, even if some best-effort ones did not.
    pub fn internship_saved(&self) -> bool {
        self.status != SubmissionStatus::Failed
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepReport> {
        self.steps
            .iter()
            .filter(|report| report.status != StepStatus::Completed)
    }
}

#[derive(Debug, Default)]
struct Progress {
    steps: Vec<StepReport>,
    created: Vec<CreatedEntity>,
    internship_id: Option<EntityId>,
    appreciation_id: Option<EntityId>,
}

impl Progress {
    fn record(
        &mut self,
        step: SubmissionStep,
        status: StepStatus,
        subject: Option<&str>,
        detail: String,
    ) {
        self.steps.push(StepReport {
            step,
            kind: step.kind(),
            status,
            subject: subject.map(str::to_string),
            detail,
        });
    }

    fn complete(&mut self, step: SubmissionStep, subject: Option<&str>, detail: String) {
        info!(step = step.label(), subject, "{detail}");
        self.record(step, StepStatus::Completed, subject, detail);
    }

    fn skip(&mut self, step: SubmissionStep, subject: Option<&str>, detail: String) {
        warn!(step = step.label(), subject, "skipped: {detail}");
        self.record(step, StepStatus::Skipped, subject, detail);
    }

    fn fail(&mut self, step: SubmissionStep, subject: Option<&str>, detail: String) {
        match step.kind() {
            StepKind::Critical => error!(step = step.label(), subject, "{detail}"),
            StepKind::BestEffort => warn!(step = step.label(), subject, "{detail}; continuing"),
        }
        self.record(step, StepStatus::Failed, subject, detail);
    }

    fn created(&mut self, kind: EntityKind, id: EntityId, label: impl Into<String>) {
        self.created.push(CreatedEntity {
            kind,
            id,
            label: label.into(),
        });
    }

    fn finish(self, status: SubmissionStatus, message: String, error: Option<String>) -> SubmissionOutcome {
        SubmissionOutcome {
            status,
            internship_id: self.internship_id,
            appreciation_id: self.appreciation_id,
            message,
            error,
            steps: self.steps,
            created: self.created,
        }
    }

    fn abort(self, cause: String) -> SubmissionOutcome {
        let message = format!("{FAILURE_MESSAGE}: {cause}");
        self.finish(SubmissionStatus::Failed, message, Some(cause))
    }

    fn best_effort_shortfall(&self) -> Vec<&'static str> {
        let mut steps: Vec<&'static str> = self
            .steps
            .iter()
            .filter(|report| report.status != StepStatus::Completed)
            .map(|report| report.step.label())
            .collect();
        steps.dedup();
        steps
    }
}

fn text_or(raw: &str, fallback: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.chars().take(MAX_TEXT_LEN).collect()
    }
}

fn rating_for(form: &FormSubmission, dimension: RubricDimension) -> &str {
    match dimension {
        RubricDimension::Implication => &form.implication,
        RubricDimension::Openness => &form.openness,
        RubricDimension::Quality => &form.quality,
    }
}

/// Sequences the backend calls of one wizard submission.
pub struct SubmissionOrchestrator<G: ?Sized> {
    gateway: Arc<G>,
    resolver: EntityResolver<G>,
    catalog: EvaluationCatalog,
    rubric: RubricTable,
}

impl<G> SubmissionOrchestrator<G>
where
    G: BackendGateway + ?Sized,
{
    pub fn new(gateway: Arc<G>, settings: ResolverSettings, catalog: EvaluationCatalog) -> Self {
        let resolver = EntityResolver::new(gateway.clone(), settings);
        Self {
            gateway,
            resolver,
            catalog,
            rubric: RubricTable::WizardReset,
        }
    }

    pub fn with_rubric(mut self, rubric: RubricTable) -> Self {
        self.rubric = rubric;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.resolver = self.resolver.with_clock(clock);
        self
    }

    pub fn catalog(&self) -> &EvaluationCatalog {
        &self.catalog
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    /// Runs every step in dependency order. Calls are strictly sequential.
    pub async fn submit(&self, form: &FormSubmission, today: NaiveDate) -> SubmissionOutcome {
        let mut progress = Progress::default();

        if let Err(err) = form.validate() {
            let cause = err.to_string();
            progress.fail(SubmissionStep::Validate, None, cause.clone());
            return progress.abort(cause);
        }
        progress.complete(
            SubmissionStep::Validate,
            None,
            "required fields present".to_string(),
        );

        let intern = match self.resolver.resolve_intern(form).await {
            Ok(resolved) => {
                let intern = resolved.entity;
                if resolved.created {
                    progress.created(EntityKind::Intern, intern.id, intern.email.clone());
                }
                progress.complete(
                    SubmissionStep::ResolveIntern,
                    None,
                    format!(
                        "{} stagiaire {} ({})",
                        if resolved.created { "created" } else { "reused" },
                        intern.id,
                        intern.email
                    ),
                );
                intern
            }
            Err(err) => {
                let cause = format!("Erreur lors de la création du stagiaire: {err}");
                progress.fail(SubmissionStep::ResolveIntern, None, cause.clone());
                return progress.abort(cause);
            }
        };

        let tutor = match self.resolver.resolve_tutor(form).await {
            Ok(resolved) => {
                let tutor = resolved.entity;
                if resolved.created {
                    progress.created(EntityKind::Tutor, tutor.id, tutor.email.clone());
                }
                progress.complete(
                    SubmissionStep::ResolveTutor,
                    None,
                    format!(
                        "{} tuteur {} ({})",
                        if resolved.created { "created" } else { "reused" },
                        tutor.id,
                        tutor.email
                    ),
                );
                tutor
            }
            Err(err) => {
                let cause = format!("Erreur lors de la création du tuteur: {err}");
                progress.fail(SubmissionStep::ResolveTutor, None, cause.clone());
                return progress.abort(cause);
            }
        };

        let internship = NewInternship {
            description: text_or(&form.project_theme, "Description non fournie"),
            objective: text_or(&form.objectives, "Objectif non fourni"),
            company: text_or(&form.company_name, "Entreprise non fournie"),
            intern_id: intern.id,
            tutor_id: tutor.id,
        };
        let internship_id = match self.gateway.create_internship(&internship).await {
            Ok(record) => {
                progress.internship_id = Some(record.id);
                progress.created(EntityKind::Internship, record.id, record.company.clone());
                progress.complete(
                    SubmissionStep::CreateInternship,
                    None,
                    format!("stage {} created", record.id),
                );
                record.id
            }
            Err(err) => {
                let cause = format!("Erreur lors de la création du stage: {err}");
                progress.fail(SubmissionStep::CreateInternship, None, cause.clone());
                return progress.abort(cause);
            }
        };

        self.create_period(form, today, internship_id, &tutor, &mut progress)
            .await;

        let Some(appreciation) = self.resolve_appreciation(form, &tutor, &mut progress).await
        else {
            let reason = "no appreciation available".to_string();
            progress.skip(SubmissionStep::CategoryEvaluation, None, reason.clone());
            progress.skip(SubmissionStep::CompetencyEvaluation, None, reason);
            return progress.finish(
                SubmissionStatus::Partial,
                EVALUATIONS_SKIPPED_MESSAGE.to_string(),
                None,
            );
        };
        progress.appreciation_id = Some(appreciation.id);

        self.evaluate_categories(form, appreciation.id, &mut progress)
            .await;
        self.evaluate_competencies(appreciation.id, &mut progress)
            .await;

        let shortfall = progress.best_effort_shortfall();
        if shortfall.is_empty() {
            info!(stage = %internship_id, "submission completed");
            progress.finish(SubmissionStatus::Success, SUCCESS_MESSAGE.to_string(), None)
        } else {
            let message = format!(
                "Stage enregistré, mais certaines étapes ont échoué: {}.",
                shortfall.join(", ")
            );
            progress.finish(SubmissionStatus::Partial, message, None)
        }
    }

    async fn create_period(
        &self,
        form: &FormSubmission,
        today: NaiveDate,
        internship_id: EntityId,
        tutor: &Tutor,
        progress: &mut Progress,
    ) {
        let range = PeriodRange::parse(&form.period, today);
        let draft = NewPeriod {
            start_date: range.start,
            end_date: range.end,
            internship: EntityRef::from(internship_id),
        };

        let period = match self.gateway.create_period(&draft).await {
            Ok(period) => period,
            Err(err) => {
                progress.fail(
                    SubmissionStep::CreatePeriod,
                    None,
                    format!("période non créée: {err}"),
                );
                progress.skip(
                    SubmissionStep::LinkPeriodTutor,
                    None,
                    "no period to link".to_string(),
                );
                return;
            }
        };

        progress.created(
            EntityKind::Period,
            period.id,
            format!("{} - {}", period.start_date, period.end_date),
        );
        progress.complete(
            SubmissionStep::CreatePeriod,
            None,
            format!(
                "période {} du {} au {}",
                period.id, period.start_date, period.end_date
            ),
        );

        match self.gateway.link_period_tutor(period.id, tutor.id).await {
            Ok(()) => progress.complete(
                SubmissionStep::LinkPeriodTutor,
                None,
                format!("période {} liée au tuteur {}", period.id, tutor.id),
            ),
            Err(err) => progress.fail(
                SubmissionStep::LinkPeriodTutor,
                None,
                format!("liaison période/tuteur impossible: {err}"),
            ),
        }
    }

    /// Reuses the tutor's first appreciation when one exists (best-effort deduplication).
    async fn resolve_appreciation(
        &self,
        form: &FormSubmission,
        tutor: &Tutor,
        progress: &mut Progress,
    ) -> Option<Appreciation> {
        match self.gateway.appreciations_for_tutor(tutor.id).await {
            Ok(existing) => {
                if let Some(found) = existing.into_iter().next() {
                    progress.complete(
                        SubmissionStep::ResolveAppreciation,
                        None,
                        format!("reused appréciation {}", found.id),
                    );
                    return Some(found);
                }
            }
            Err(err) => {
                warn!(tutor = %tutor.id, error = %err, "unable to list appreciations; creating one");
            }
        }

        let draft = NewAppreciation {
            description: text_or(&form.observations, "Aucune observation pour le stage"),
        };
        match self.gateway.create_appreciation(tutor.id, &draft).await {
            Ok(created) => {
                progress.created(
                    EntityKind::Appreciation,
                    created.id,
                    format!("tuteur {}", tutor.id),
                );
                progress.complete(
                    SubmissionStep::ResolveAppreciation,
                    None,
                    format!("created appréciation {}", created.id),
                );
                Some(created)
            }
            Err(err) => {
                progress.fail(
                    SubmissionStep::ResolveAppreciation,
                    None,
                    format!("appréciation non créée: {err}"),
                );
                None
            }
        }
    }

    async fn evaluate_categories(
        &self,
        form: &FormSubmission,
        appreciation_id: EntityId,
        progress: &mut Progress,
    ) {
        for spec in &self.catalog.categories {
            let name = spec.name.as_str();
            let value = f64::from(rating_value(
                self.rubric,
                spec.dimension,
                rating_for(form, spec.dimension),
            ));

            let category = match self.resolver.resolve_category(name, value).await {
                Ok(resolved) => {
                    if resolved.created {
                        progress.created(EntityKind::Category, resolved.entity.id, name);
                    }
                    resolved.entity
                }
                Err(err) => {
                    progress.fail(SubmissionStep::CategoryEvaluation, Some(name), err.to_string());
                    continue;
                }
            };

            let draft = NewEvaluation {
                value,
                comment: EvaluationCatalog::evaluation_comment(name),
                appreciation_id,
                target: EvaluationTarget::Category(category.id),
            };
            match self.gateway.create_evaluation(&draft).await {
                Ok(evaluation) => {
                    progress.created(EntityKind::Evaluation, evaluation.id, name);
                    progress.complete(
                        SubmissionStep::CategoryEvaluation,
                        Some(name),
                        format!("évaluation {} = {value}", evaluation.id),
                    );
                }
                Err(err) => progress.fail(
                    SubmissionStep::CategoryEvaluation,
                    Some(name),
                    format!("évaluation non créée: {err}"),
                ),
            }
        }
    }

    async fn evaluate_competencies(&self, appreciation_id: EntityId, progress: &mut Progress) {
        for spec in &self.catalog.competencies {
            let name = spec.name.as_str();
            let score = spec.default_score;

            let competency = match self.resolver.resolve_competency(name, score).await {
                Ok(resolved) => {
                    if resolved.created {
                        progress.created(EntityKind::Competency, resolved.entity.id, name);
                    }
                    resolved.entity
                }
                Err(err) => {
                    progress.fail(
                        SubmissionStep::CompetencyEvaluation,
                        Some(name),
                        err.to_string(),
                    );
                    continue;
                }
            };

            let draft = NewEvaluation {
                value: score,
                comment: EvaluationCatalog::evaluation_comment(name),
                appreciation_id,
                target: EvaluationTarget::Competency(competency.id),
            };
            match self.gateway.create_evaluation(&draft).await {
                Ok(evaluation) => {
                    progress.created(EntityKind::Evaluation, evaluation.id, name);
                    progress.complete(
                        SubmissionStep::CompetencyEvaluation,
                        Some(name),
                        format!("évaluation {} = {score}", evaluation.id),
                    );
                }
                Err(err) => progress.fail(
                    SubmissionStep::CompetencyEvaluation,
                    Some(name),
                    format!("évaluation non créée: {err}"),
                ),
            }
        }
    }
}
