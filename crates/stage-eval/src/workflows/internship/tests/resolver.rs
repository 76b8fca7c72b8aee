use super::common::*;
use crate::workflows::internship::backend::{BackendError, BackendOperation};
use crate::workflows::internship::domain::NewIntern;
use crate::workflows::internship::resolver::{email_local_part, PersonName, ResolveError};

fn conflict() -> BackendError {
    BackendError::Conflict("Duplicate entry for key 'email'".to_string())
}

#[test]
fn person_names_split_on_first_space() {
    let name = PersonName::parse("  Jean   Pierre Dupont ");
    assert_eq!(name.last_name, "Jean");
    assert_eq!(name.first_name, "Pierre Dupont");

    let single = PersonName::parse("Madonna");
    assert_eq!(single.last_name, "Madonna");
    assert_eq!(single.first_name, "DefaultPrenom");

    assert_eq!(PersonName::parse("").last_name, "DefaultNom");
}

#[test]
fn email_local_part_lowercases_and_joins_with_dots() {
    assert_eq!(email_local_part("Jean Dupont"), "jean.dupont");
    assert_eq!(email_local_part("  Anne  Marie\tLe Goff "), "anne.marie.le.goff");
}

#[tokio::test]
async fn derives_intern_email_from_the_student_name() {
    let backend = backend();
    let resolver = resolver(&backend);

    let resolved = resolver.resolve_intern(&form()).await.expect("intern resolves");

    assert!(resolved.created);
    assert_eq!(resolved.entity.email, "jean.dupont@example.com");
    assert_eq!(resolved.entity.last_name, "Jean");
    assert_eq!(resolved.entity.first_name, "Dupont");
    assert_eq!(
        resolved.entity.institution.as_deref(),
        Some("Université Hassan II")
    );
}

#[tokio::test]
async fn tutor_draft_uses_company_and_tutor_domain() {
    let backend = backend();
    let resolver = resolver(&backend);

    let mut submission = form();
    submission.company_name = "   ".to_string();
    let draft = resolver.tutor_draft(&submission);
    assert_eq!(draft.email, "marie.curie@entreprise.com");
    assert_eq!(draft.company, "DefaultEntreprise");

    let resolved = resolver.resolve_tutor(&form()).await.expect("tutor resolves");
    assert_eq!(resolved.entity.company.as_deref(), Some("ABC Corp"));
}

#[tokio::test]
async fn resolving_the_same_person_twice_creates_one_record() {
    let backend = backend();
    let resolver = resolver(&backend);

    let first = resolver.resolve_intern(&form()).await.expect("first resolve");
    let second = resolver.resolve_intern(&form()).await.expect("second resolve");

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.entity.id, second.entity.id);
    assert_eq!(backend.interns().len(), 1);
    assert_eq!(backend.call_count(BackendOperation::CreateIntern), 1);
}

#[tokio::test]
async fn conflict_triggers_exactly_one_retry_with_a_timestamped_email() {
    let backend = backend();
    backend.fail_next(BackendOperation::CreateIntern, conflict());
    let resolver = resolver(&backend);

    let resolved = resolver.resolve_intern(&form()).await.expect("retry succeeds");

    assert!(resolved.created);
    assert_eq!(
        resolved.entity.email,
        format!("jean.dupont.{FIXED_MILLIS}@example.com")
    );
    assert_eq!(backend.call_count(BackendOperation::CreateIntern), 2);
}

#[tokio::test]
async fn taken_timestamped_email_gets_a_random_suffix() {
    let backend = backend();
    let timestamped = format!("jean.dupont.{FIXED_MILLIS}@example.com");
    backend.seed_intern(NewIntern {
        last_name: "Jean".to_string(),
        first_name: "Dupont".to_string(),
        email: timestamped,
        institution: "Université Hassan II".to_string(),
    });
    backend.fail_next(BackendOperation::CreateIntern, conflict());
    let resolver = resolver(&backend);

    let resolved = resolver.resolve_intern(&form()).await.expect("retry succeeds");

    let email = resolved.entity.email;
    let prefix = format!("jean.dupont.{FIXED_MILLIS}.");
    assert!(email.starts_with(&prefix), "unexpected email {email}");
    assert!(email.ends_with("@example.com"));
    let suffix = &email[prefix.len()..email.len() - "@example.com".len()];
    assert_eq!(suffix.len(), 6);
    assert!(suffix
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    assert_eq!(backend.interns().len(), 2);
}

#[tokio::test]
async fn a_second_conflict_is_reported_without_further_retries() {
    let backend = backend();
    backend.fail_next(BackendOperation::CreateTutor, conflict());
    backend.fail_next(BackendOperation::CreateTutor, conflict());
    let resolver = resolver(&backend);

    let err = resolver
        .resolve_tutor(&form())
        .await
        .expect_err("second conflict is fatal");

    match &err {
        ResolveError::Create { key, source } => {
            assert_eq!(key, &format!("marie.curie.{FIXED_MILLIS}@entreprise.com"));
            assert!(matches!(source, BackendError::Conflict(_)));
        }
        other => panic!("expected create error, got {other:?}"),
    }
    assert_eq!(backend.call_count(BackendOperation::CreateTutor), 2);
    assert!(backend.tutors().is_empty());
}

#[tokio::test]
async fn lookup_failures_other_than_not_found_propagate() {
    let backend = backend();
    backend.fail_next(
        BackendOperation::FindTutor,
        BackendError::Transient("connection refused".to_string()),
    );
    let resolver = resolver(&backend);

    let err = resolver
        .resolve_tutor(&form())
        .await
        .expect_err("lookup failure surfaces");

    assert!(matches!(err, ResolveError::Lookup { .. }));
    assert!(matches!(err.backend_error(), BackendError::Transient(_)));
    assert_eq!(backend.call_count(BackendOperation::CreateTutor), 0);
}

#[tokio::test]
async fn existing_categories_are_reused_untouched() {
    let backend = backend();
    let seeded = backend.seed_category("Implication", 1.0);
    let resolver = resolver(&backend);

    let resolved = resolver
        .resolve_category("Implication", 4.0)
        .await
        .expect("category resolves");

    assert!(!resolved.created);
    assert_eq!(resolved.entity, seeded);
    assert_eq!(backend.call_count(BackendOperation::CreateCategory), 0);
}

#[tokio::test]
async fn found_competency_takes_the_submitted_score() {
    let backend = backend();
    backend.seed_competency("Autonomie", 1.0);
    let resolver = resolver(&backend);

    let resolved = resolver
        .resolve_competency("Autonomie", 3.0)
        .await
        .expect("competency resolves");

    assert!(!resolved.created);
    assert_eq!(resolved.entity.score, Some(3.0));
    assert_eq!(backend.competencies()[0].score, Some(3.0));
    assert_eq!(
        backend.call_count(BackendOperation::UpdateCompetencyScore),
        1
    );
}

#[tokio::test]
async fn failed_score_overwrite_keeps_the_found_competency() {
    let backend = backend();
    let seeded = backend.seed_competency("Communication", 2.0);
    backend.fail_next(
        BackendOperation::UpdateCompetencyScore,
        BackendError::Server {
            status: 500,
            message: "boom".to_string(),
        },
    );
    let resolver = resolver(&backend);

    let resolved = resolver
        .resolve_competency("Communication", 3.0)
        .await
        .expect("overwrite is best effort");

    assert_eq!(resolved.entity, seeded);
}

#[tokio::test]
async fn matching_competency_score_is_not_rewritten() {
    let backend = backend();
    backend.seed_competency("Communication", 3.0);
    let resolver = resolver(&backend);

    resolver
        .resolve_competency("Communication", 3.0)
        .await
        .expect("competency resolves");

    assert_eq!(
        backend.call_count(BackendOperation::UpdateCompetencyScore),
        0
    );
}
