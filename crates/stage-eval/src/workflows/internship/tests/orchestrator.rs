use super::common::*;
use crate::workflows::internship::backend::{BackendError, BackendOperation};
use crate::workflows::internship::domain::EvaluationTarget;
use crate::workflows::internship::orchestrator::{
    EVALUATIONS_SKIPPED_MESSAGE, FAILURE_MESSAGE, SUCCESS_MESSAGE,
};
use crate::workflows::internship::{
    EntityKind, RubricTable, StepKind, StepStatus, SubmissionStatus, SubmissionStep,
};

#[tokio::test]
async fn full_submission_persists_every_record() {
    let backend = backend();
    let outcome = orchestrator(&backend).submit(&form(), today()).await;

    assert_eq!(outcome.status, SubmissionStatus::Success);
    assert_eq!(outcome.message, SUCCESS_MESSAGE);
    assert!(outcome.error.is_none());
    assert_eq!(outcome.steps.len(), 14);
    assert!(outcome
        .steps
        .iter()
        .all(|report| report.status == StepStatus::Completed));

    let internship = &backend.internships()[0];
    assert_eq!(outcome.internship_id, Some(internship.id));
    assert_eq!(internship.company, "ABC Corp");
    assert_eq!(internship.description, "Refonte du portail RH");

    let period = &backend.periods()[0];
    assert_eq!(period.start_date, date(2024, 1, 1));
    assert_eq!(period.end_date, date(2024, 6, 30));
    assert_eq!(
        backend.period_tutors(),
        vec![(period.id, backend.tutors()[0].id)]
    );

    let appreciation_id = outcome.appreciation_id.expect("appreciation attached");
    let evaluations = backend.evaluations();
    assert_eq!(evaluations.len(), 7);
    assert!(evaluations
        .iter()
        .all(|stored| stored.appreciation_id == appreciation_id));
    assert_eq!(outcome.created.len(), 19);
}

#[tokio::test]
async fn people_are_created_before_the_internship() {
    let backend = backend();
    orchestrator(&backend).submit(&form(), today()).await;

    let calls = operations(&backend);
    let intern = position(&calls, BackendOperation::CreateIntern);
    let tutor = position(&calls, BackendOperation::CreateTutor);
    let internship = position(&calls, BackendOperation::CreateInternship);
    let period = position(&calls, BackendOperation::CreatePeriod);
    let appreciation = position(&calls, BackendOperation::CreateAppreciation);
    let evaluation = position(&calls, BackendOperation::CreateEvaluation);

    assert!(intern < tutor);
    assert!(tutor < internship);
    assert!(internship < period);
    assert!(period < appreciation);
    assert!(appreciation < evaluation);
    assert_eq!(backend.interns()[0].email, "jean.dupont@example.com");
}

#[tokio::test]
async fn category_values_follow_the_rubric_table() {
    let backend = backend();
    orchestrator(&backend).submit(&form(), today()).await;

    let categories = backend.categories();
    let value_of = |name: &str| {
        let id = categories
            .iter()
            .find(|category| category.name == name)
            .map(|category| category.id)
            .expect("category exists");
        backend
            .evaluations()
            .into_iter()
            .find(|stored| stored.target == EvaluationTarget::Category(id))
            .and_then(|stored| stored.evaluation.value)
            .expect("evaluation exists")
    };

    assert_eq!(value_of("Implication"), 4.0);
    assert_eq!(value_of("Ouverture d'esprit"), 4.0);
    assert_eq!(value_of("Qualité du travail"), 3.0);

    let comments: Vec<String> = backend
        .evaluations()
        .into_iter()
        .filter_map(|stored| stored.evaluation.comment)
        .collect();
    assert!(comments.contains(&"Évaluation pour Travail en équipe".to_string()));
}

#[tokio::test]
async fn score_sheet_table_scales_category_values() {
    let backend = backend();
    let mut submission = form();
    submission.quality = String::new();

    orchestrator(&backend)
        .with_rubric(RubricTable::ScoreSheet)
        .submit(&submission, today())
        .await;

    let mut values: Vec<f64> = backend
        .evaluations()
        .into_iter()
        .filter(|stored| matches!(stored.target, EvaluationTarget::Category(_)))
        .filter_map(|stored| stored.evaluation.value)
        .collect();
    values.sort_by(|a, b| a.total_cmp(b));
    assert_eq!(values, vec![12.0, 16.0, 16.0]);
}

#[tokio::test]
async fn second_submission_reuses_people_and_appreciation() {
    let backend = backend();
    let orchestrator = orchestrator(&backend);

    let first = orchestrator.submit(&form(), today()).await;
    let second = orchestrator.submit(&form(), today()).await;

    assert_eq!(second.status, SubmissionStatus::Success);
    assert_eq!(backend.interns().len(), 1);
    assert_eq!(backend.tutors().len(), 1);
    assert_eq!(backend.internships().len(), 2);
    assert_eq!(backend.appreciations().len(), 1);
    assert_eq!(backend.categories().len(), 3);
    assert_eq!(backend.competencies().len(), 4);
    assert_eq!(first.appreciation_id, second.appreciation_id);
    assert!(second
        .created
        .iter()
        .all(|entity| !matches!(entity.kind, EntityKind::Intern | EntityKind::Tutor)));
}

#[tokio::test]
async fn existing_appreciation_for_the_tutor_is_reused() {
    let backend = backend();
    let tutor = seed_default_tutor(&backend);
    let existing = backend.seed_appreciation(tutor.id, "Déjà saisie");

    let outcome = orchestrator(&backend).submit(&form(), today()).await;

    assert_eq!(outcome.status, SubmissionStatus::Success);
    assert_eq!(outcome.appreciation_id, Some(existing.id));
    assert_eq!(backend.call_count(BackendOperation::CreateAppreciation), 0);
    assert!(backend
        .evaluations()
        .iter()
        .all(|stored| stored.appreciation_id == existing.id));
}

#[tokio::test]
async fn appreciation_failure_skips_evaluations() {
    let backend = backend();
    backend.fail_next(
        BackendOperation::CreateAppreciation,
        BackendError::Fatal {
            status: 400,
            message: "tuteur invalide".to_string(),
        },
    );

    let outcome = orchestrator(&backend).submit(&form(), today()).await;

    assert_eq!(outcome.status, SubmissionStatus::Partial);
    assert_eq!(outcome.message, EVALUATIONS_SKIPPED_MESSAGE);
    assert!(outcome.internship_id.is_some());
    assert!(outcome.appreciation_id.is_none());
    assert!(backend.evaluations().is_empty());

    let skipped: Vec<SubmissionStep> = outcome
        .steps
        .iter()
        .filter(|report| report.status == StepStatus::Skipped)
        .map(|report| report.step)
        .collect();
    assert_eq!(
        skipped,
        vec![
            SubmissionStep::CategoryEvaluation,
            SubmissionStep::CompetencyEvaluation
        ]
    );
}

#[tokio::test]
async fn listing_failure_still_creates_an_appreciation() {
    let backend = backend();
    backend.fail_next(
        BackendOperation::ListAppreciations,
        BackendError::Transient("timeout".to_string()),
    );

    let outcome = orchestrator(&backend).submit(&form(), today()).await;

    assert_eq!(outcome.status, SubmissionStatus::Success);
    assert_eq!(backend.appreciations().len(), 1);
}

#[tokio::test]
async fn critical_failure_aborts_before_dependent_steps() {
    let backend = backend();
    backend.fail_next(
        BackendOperation::CreateInternship,
        BackendError::Server {
            status: 500,
            message: "database down".to_string(),
        },
    );

    let outcome = orchestrator(&backend).submit(&form(), today()).await;

    assert_eq!(outcome.status, SubmissionStatus::Failed);
    assert!(outcome.message.starts_with(FAILURE_MESSAGE));
    assert!(outcome
        .error
        .as_deref()
        .is_some_and(|error| error.contains("database down")));
    assert!(outcome.internship_id.is_none());
    assert_eq!(backend.call_count(BackendOperation::CreatePeriod), 0);
    assert_eq!(backend.call_count(BackendOperation::ListAppreciations), 0);

    let last = outcome.steps.last().expect("step recorded");
    assert_eq!(last.step, SubmissionStep::CreateInternship);
    assert_eq!(last.kind, StepKind::Critical);
    assert_eq!(last.status, StepStatus::Failed);
    assert_eq!(outcome.created.len(), 2, "intern and tutor were persisted");
}

#[tokio::test]
async fn invalid_form_makes_no_backend_calls() {
    let backend = backend();
    let mut submission = form();
    submission.tutor_name = " ".to_string();

    let outcome = orchestrator(&backend).submit(&submission, today()).await;

    assert_eq!(outcome.status, SubmissionStatus::Failed);
    assert!(outcome
        .error
        .as_deref()
        .is_some_and(|error| error.contains("tutorName")));
    assert!(backend.calls().is_empty());
    assert_eq!(outcome.steps.len(), 1);
}

#[tokio::test]
async fn malformed_period_falls_back_to_today() {
    let backend = backend();
    let mut submission = form();
    submission.period = "du 1er janvier au 30 juin".to_string();

    let outcome = orchestrator(&backend).submit(&submission, today()).await;

    assert_eq!(outcome.status, SubmissionStatus::Success);
    let period = &backend.periods()[0];
    assert_eq!(period.start_date, today());
    assert_eq!(period.end_date, today());
}

#[tokio::test]
async fn period_failure_is_best_effort() {
    let backend = backend();
    backend.fail_next(
        BackendOperation::CreatePeriod,
        BackendError::Transient("reset by peer".to_string()),
    );

    let outcome = orchestrator(&backend).submit(&form(), today()).await;

    assert_eq!(outcome.status, SubmissionStatus::Partial);
    assert!(outcome.message.contains("create period"));
    assert_eq!(backend.evaluations().len(), 7);
    let link = outcome
        .steps
        .iter()
        .find(|report| report.step == SubmissionStep::LinkPeriodTutor)
        .expect("link step reported");
    assert_eq!(link.status, StepStatus::Skipped);
}

#[tokio::test]
async fn single_evaluation_failure_does_not_stop_the_loop() {
    let backend = backend();
    backend.fail_next(
        BackendOperation::CreateEvaluation,
        BackendError::Fatal {
            status: 400,
            message: "valeur invalide".to_string(),
        },
    );

    let outcome = orchestrator(&backend).submit(&form(), today()).await;

    assert_eq!(outcome.status, SubmissionStatus::Partial);
    assert_eq!(backend.evaluations().len(), 6);
    let failed: Vec<_> = outcome.failed_steps().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].step, SubmissionStep::CategoryEvaluation);
    assert_eq!(failed[0].subject.as_deref(), Some("Implication"));
}
