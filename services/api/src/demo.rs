use crate::infra::parse_date;
use chrono::{Local, NaiveDate};
use clap::Args;
use stage_eval::error::AppError;
use stage_eval::workflows::internship::{
    BackendError, BackendOperation, ConnectivityProber, ConnectivityReport, EndpointStatus,
    EvaluationCatalog, FormSubmission, InMemoryBackend, ResolverSettings, RubricTable,
    StepStatus, SubmissionOrchestrator, SubmissionOutcome,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Reference date for unparseable periods (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Rubric table used to score the categories.
    #[arg(long)]
    pub(crate) table: Option<RubricTable>,
    /// Skip the degraded-backend scenario.
    #[arg(long)]
    pub(crate) skip_failures: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        today,
        table,
        skip_failures,
    } = args;
    let today = today.unwrap_or_else(|| Local::now().date_naive());

    let backend = Arc::new(InMemoryBackend::new());
    let orchestrator = SubmissionOrchestrator::new(
        backend.clone(),
        ResolverSettings::default(),
        EvaluationCatalog::standard(),
    )
    .with_rubric(table.unwrap_or_default());

    println!("Internship evaluation demo (in-memory backend)");

    println!("\n1. First submission for Jean Dupont");
    let outcome = orchestrator.submit(&sample_form(), today).await;
    render_outcome(&outcome);

    println!("\n2. Same intern and tutor again: records are reused");
    let mut follow_up = sample_form();
    follow_up.period = "15/09/2024 - 15/12/2024".to_string();
    follow_up.quality = "Très professionnelle".to_string();
    let outcome = orchestrator.submit(&follow_up, today).await;
    render_outcome(&outcome);

    if !skip_failures {
        println!("\n3. Degraded backend: appreciation rejected, evaluations skipped");
        let mut other = sample_form();
        other.student_name = "Amina Tazi".to_string();
        other.tutor_name = "Omar Alaoui".to_string();
        backend.fail_next(
            BackendOperation::CreateAppreciation,
            BackendError::Server {
                status: 503,
                message: "service indisponible".to_string(),
            },
        );
        let outcome = orchestrator.submit(&other, today).await;
        render_outcome(&outcome);

        println!("\n4. Incomplete form is rejected before any backend call");
        let outcome = orchestrator
            .submit(
                &FormSubmission {
                    student_name: "Amina Tazi".to_string(),
                    ..FormSubmission::default()
                },
                today,
            )
            .await;
        render_outcome(&outcome);

        backend.mark_unreachable("/evaluations");
    }

    println!("\nConnectivity check");
    let report = ConnectivityProber::new(backend.clone())
        .check_connectivity()
        .await;
    render_connectivity(&report);

    println!(
        "\nBackend totals: {} stagiaires | {} tuteurs | {} stages | {} appréciations | {} évaluations",
        backend.interns().len(),
        backend.tutors().len(),
        backend.internships().len(),
        backend.appreciations().len(),
        backend.evaluations().len()
    );

    Ok(())
}

fn sample_form() -> FormSubmission {
    FormSubmission {
        student_name: "Jean Dupont".to_string(),
        company_name: "ABC Corp".to_string(),
        tutor_name: "Marie Curie".to_string(),
        period: "2024-01-01 - 2024-06-30".to_string(),
        project_theme: "Refonte du portail RH".to_string(),
        objectives: "Livrer une API de gestion des congés".to_string(),
        observations: "Stagiaire autonome et rigoureux".to_string(),
        implication: "Très forte".to_string(),
        openness: "Très bonne".to_string(),
        quality: "Bonne".to_string(),
    }
}

pub(crate) fn render_outcome(outcome: &SubmissionOutcome) {
    println!("Status: {:?}", outcome.status);
    println!("Message: {}", outcome.message);
    if let Some(id) = outcome.internship_id {
        println!("Stage id: {id}");
    }
    if let Some(id) = outcome.appreciation_id {
        println!("Appréciation id: {id}");
    }

    println!("Steps");
    for report in &outcome.steps {
        let marker = match report.status {
            StepStatus::Completed => "ok  ",
            StepStatus::Skipped => "skip",
            StepStatus::Failed => "FAIL",
        };
        match &report.subject {
            Some(subject) => println!(
                "  [{marker}] {} ({subject}): {}",
                report.step.label(),
                report.detail
            ),
            None => println!("  [{marker}] {}: {}", report.step.label(), report.detail),
        }
    }

    if outcome.created.is_empty() {
        println!("Created: nothing");
    } else {
        println!("Created");
        for entity in &outcome.created {
            println!("  - {:?} #{} {}", entity.kind, entity.id, entity.label);
        }
    }
}

pub(crate) fn render_connectivity(report: &ConnectivityReport) {
    for (path, status) in &report.endpoints {
        match status {
            EndpointStatus::Reachable { status } => println!("  {path:<16} reachable (HTTP {status})"),
            EndpointStatus::Unreachable { error } => println!("  {path:<16} UNREACHABLE: {error}"),
        }
    }
    if report.all_reachable {
        println!("All endpoints reachable");
    } else {
        let down: Vec<&str> = report.unreachable().collect();
        println!("Unreachable: {}", down.join(", "));
    }
}
