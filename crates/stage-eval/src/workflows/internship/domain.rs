use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Numeric identifier assigned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Minimal `{ "id": n }` reference used by the backend for associations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: EntityId,
}

impl From<EntityId> for EntityRef {
    fn from(id: EntityId) -> Self {
        Self { id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intern {
    pub id: EntityId,
    #[serde(rename = "nom", default)]
    pub last_name: String,
    #[serde(rename = "prenom", default)]
    pub first_name: String,
    pub email: String,
    #[serde(default)]
    pub institution: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIntern {
    #[serde(rename = "nom")]
    pub last_name: String,
    #[serde(rename = "prenom")]
    pub first_name: String,
    pub email: String,
    pub institution: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tutor {
    pub id: EntityId,
    #[serde(rename = "nom", default)]
    pub last_name: String,
    #[serde(rename = "prenom", default)]
    pub first_name: String,
    pub email: String,
    #[serde(rename = "entreprise", default)]
    pub company: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTutor {
    #[serde(rename = "nom")]
    pub last_name: String,
    #[serde(rename = "prenom")]
    pub first_name: String,
    pub email: String,
    #[serde(rename = "entreprise")]
    pub company: String,
}

/// The central "stage" record tying an intern, a tutor and a project together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternshipRecord {
    pub id: EntityId,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "objectif", default)]
    pub objective: String,
    #[serde(rename = "entreprise", default)]
    pub company: String,
    #[serde(rename = "stagiaire", default, skip_serializing_if = "Option::is_none")]
    pub intern: Option<EntityRef>,
    #[serde(rename = "tuteur", default, skip_serializing_if = "Option::is_none")]
    pub tutor: Option<EntityRef>,
}

/// Body of `create-with-ids`; the participant ids travel as query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewInternship {
    pub description: String,
    #[serde(rename = "objectif")]
    pub objective: String,
    #[serde(rename = "entreprise")]
    pub company: String,
    #[serde(skip)]
    pub intern_id: EntityId,
    #[serde(skip)]
    pub tutor_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub id: EntityId,
    #[serde(rename = "dateDebut")]
    pub start_date: NaiveDate,
    #[serde(rename = "dateFin")]
    pub end_date: NaiveDate,
    #[serde(rename = "stage", default, skip_serializing_if = "Option::is_none")]
    pub internship: Option<EntityRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPeriod {
    #[serde(rename = "dateDebut")]
    pub start_date: NaiveDate,
    #[serde(rename = "dateFin")]
    pub end_date: NaiveDate,
    #[serde(rename = "stage")]
    pub internship: EntityRef,
}

/// A tutor's qualitative write-up; container for linked evaluations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appreciation {
    pub id: EntityId,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "tuteur", default, skip_serializing_if = "Option::is_none")]
    pub tutor: Option<EntityRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewAppreciation {
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: EntityId,
    #[serde(rename = "intitule")]
    pub name: String,
    #[serde(rename = "valeur", default)]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCategory {
    #[serde(rename = "intitule")]
    pub name: String,
    #[serde(rename = "valeur")]
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competency {
    pub id: EntityId,
    #[serde(rename = "intitule")]
    pub name: String,
    #[serde(rename = "note", default)]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCompetency {
    #[serde(rename = "intitule")]
    pub name: String,
    #[serde(rename = "note")]
    pub score: f64,
}

/// What an evaluation grades. Exactly one target per evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EvaluationTarget {
    Category(EntityId),
    Competency(EntityId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: EntityId,
    #[serde(rename = "valeur", default)]
    pub value: Option<f64>,
    #[serde(rename = "commentaire", default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEvaluation {
    #[serde(rename = "valeur")]
    pub value: f64,
    #[serde(rename = "commentaire")]
    pub comment: String,
    #[serde(skip)]
    pub appreciation_id: EntityId,
    #[serde(skip)]
    pub target: EvaluationTarget,
}

/// Raw wizard state handed over by the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormSubmission {
    pub student_name: String,
    pub company_name: String,
    pub tutor_name: String,
    pub period: String,
    pub project_theme: String,
    pub objectives: String,
    pub observations: String,
    pub implication: String,
    pub openness: String,
    pub quality: String,
}

impl FormSubmission {
    /// Checks required fields before any backend call is made.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("studentName", &self.student_name),
            ("tutorName", &self.tutor_name),
            ("companyName", &self.company_name),
        ];

        let missing: Vec<&'static str> = required
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| field)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { missing })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("champs obligatoires manquants: {}", .missing.join(", "))]
pub struct ValidationError {
    pub missing: Vec<&'static str>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn form_accepts_wizard_field_names() {
        let form: FormSubmission = serde_json::from_value(json!({
            "studentName": "Jean Dupont",
            "companyName": "ABC",
            "tutorName": "Marie Curie",
            "implication": "Bonne"
        }))
        .expect("form parses");

        assert_eq!(form.student_name, "Jean Dupont");
        assert_eq!(form.company_name, "ABC");
        assert!(form.period.is_empty());
        assert!(form.validate().is_ok());
    }

    #[test]
    fn validate_lists_every_missing_field() {
        let form = FormSubmission {
            student_name: "  ".to_string(),
            company_name: "ABC".to_string(),
            ..FormSubmission::default()
        };

        let err = form.validate().expect_err("missing fields rejected");
        assert_eq!(err.missing, vec!["studentName", "tutorName"]);
        assert!(err.to_string().contains("studentName, tutorName"));
    }

    #[test]
    fn backend_payloads_tolerate_nested_associations() {
        let stage: InternshipRecord = serde_json::from_value(json!({
            "id": 7,
            "description": "API",
            "objectif": "Livrer",
            "entreprise": "ABC",
            "stagiaire": { "id": 3, "nom": "Dupont", "email": "jean.dupont@example.com" },
            "tuteur": { "id": 4 },
            "periode": null
        }))
        .expect("stage parses");

        assert_eq!(stage.id, EntityId(7));
        assert_eq!(stage.intern, Some(EntityRef { id: EntityId(3) }));
        assert_eq!(stage.tutor.map(|tutor| tutor.id), Some(EntityId(4)));
    }

    #[test]
    fn new_internship_keeps_ids_out_of_the_body() {
        let body = serde_json::to_value(NewInternship {
            description: "d".to_string(),
            objective: "o".to_string(),
            company: "c".to_string(),
            intern_id: EntityId(1),
            tutor_id: EntityId(2),
        })
        .expect("serializes");

        assert_eq!(
            body,
            json!({ "description": "d", "objectif": "o", "entreprise": "c" })
        );
    }
}
