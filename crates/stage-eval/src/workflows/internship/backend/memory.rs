use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{BackendError, BackendGateway, BackendOperation, ProbeResponse, KNOWN_ENDPOINTS};
use crate::workflows::internship::domain::{
    Appreciation, Category, Competency, EntityId, EntityRef, Evaluation, EvaluationTarget, Intern,
    InternshipRecord, NewAppreciation, NewCategory, NewCompetency, NewEvaluation, NewIntern,
    NewInternship, NewPeriod, NewTutor, Period, Tutor,
};

/// One gateway invocation, kept for ordering assertions and demo output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub operation: BackendOperation,
    pub detail: String,
}

/// Evaluation row together with the links the backend would keep.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvaluation {
    pub evaluation: Evaluation,
    pub appreciation_id: EntityId,
    pub target: EvaluationTarget,
}

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    interns: Vec<Intern>,
    tutors: Vec<Tutor>,
    internships: Vec<InternshipRecord>,
    periods: Vec<Period>,
    period_tutors: Vec<(EntityId, EntityId)>,
    appreciations: Vec<Appreciation>,
    categories: Vec<Category>,
    competencies: Vec<Competency>,
    evaluations: Vec<StoredEvaluation>,
    failures: HashMap<BackendOperation, VecDeque<BackendError>>,
    unreachable: BTreeSet<String>,
    calls: Vec<RecordedCall>,
}

impl State {
    fn allocate(&mut self) -> EntityId {
        self.next_id += 1;
        EntityId(self.next_id)
    }

    fn enter(&mut self, operation: BackendOperation, detail: String) -> Result<(), BackendError> {
        self.calls.push(RecordedCall { operation, detail });
        match self
            .failures
            .get_mut(&operation)
            .and_then(|queue| queue.pop_front())
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn missing(what: &str, id: EntityId) -> BackendError {
    BackendError::Fatal {
        status: 400,
        message: format!("{what} {id} introuvable"),
    }
}

/// Backend double enforcing the same natural keys as the real service.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues `error` as the result of the next `operation` call.
    pub fn fail_next(&self, operation: BackendOperation, error: BackendError) {
        self.state()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Makes probes of `path` behave as if no response arrived.
    pub fn mark_unreachable(&self, path: &str) {
        self.state().unreachable.insert(path.to_string());
    }

    pub fn seed_intern(&self, intern: NewIntern) -> Intern {
        let mut state = self.state();
        let record = Intern {
            id: state.allocate(),
            last_name: intern.last_name,
            first_name: intern.first_name,
            email: intern.email,
            institution: Some(intern.institution),
        };
        state.interns.push(record.clone());
        record
    }

    pub fn seed_tutor(&self, tutor: NewTutor) -> Tutor {
        let mut state = self.state();
        let record = Tutor {
            id: state.allocate(),
            last_name: tutor.last_name,
            first_name: tutor.first_name,
            email: tutor.email,
            company: Some(tutor.company),
        };
        state.tutors.push(record.clone());
        record
    }

    pub fn seed_appreciation(&self, tutor_id: EntityId, description: &str) -> Appreciation {
        let mut state = self.state();
        let record = Appreciation {
            id: state.allocate(),
            description: Some(description.to_string()),
            tutor: Some(EntityRef::from(tutor_id)),
        };
        state.appreciations.push(record.clone());
        record
    }

    pub fn seed_competency(&self, name: &str, score: f64) -> Competency {
        let mut state = self.state();
        let record = Competency {
            id: state.allocate(),
            name: name.to_string(),
            score: Some(score),
        };
        state.competencies.push(record.clone());
        record
    }

    pub fn seed_category(&self, name: &str, value: f64) -> Category {
        let mut state = self.state();
        let record = Category {
            id: state.allocate(),
            name: name.to_string(),
            value: Some(value),
        };
        state.categories.push(record.clone());
        record
    }

    pub fn interns(&self) -> Vec<Intern> {
        self.state().interns.clone()
    }

    pub fn tutors(&self) -> Vec<Tutor> {
        self.state().tutors.clone()
    }

    pub fn internships(&self) -> Vec<InternshipRecord> {
        self.state().internships.clone()
    }

    pub fn periods(&self) -> Vec<Period> {
        self.state().periods.clone()
    }

    pub fn period_tutors(&self) -> Vec<(EntityId, EntityId)> {
        self.state().period_tutors.clone()
    }

    pub fn appreciations(&self) -> Vec<Appreciation> {
        self.state().appreciations.clone()
    }

    pub fn categories(&self) -> Vec<Category> {
        self.state().categories.clone()
    }

    pub fn competencies(&self) -> Vec<Competency> {
        self.state().competencies.clone()
    }

    pub fn evaluations(&self) -> Vec<StoredEvaluation> {
        self.state().evaluations.clone()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, operation: BackendOperation) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }
}

#[async_trait]
impl BackendGateway for InMemoryBackend {
    async fn find_intern_by_email(&self, email: &str) -> Result<Intern, BackendError> {
        let mut state = self.state();
        state.enter(BackendOperation::FindIntern, email.to_string())?;
        state
            .interns
            .iter()
            .find(|intern| intern.email == email)
            .cloned()
            .ok_or(BackendError::NotFound)
    }

    async fn create_intern(&self, intern: &NewIntern) -> Result<Intern, BackendError> {
        let mut state = self.state();
        state.enter(BackendOperation::CreateIntern, intern.email.clone())?;
        if state.interns.iter().any(|known| known.email == intern.email) {
            return Err(BackendError::Conflict(format!(
                "email {} already exists",
                intern.email
            )));
        }
        let record = Intern {
            id: state.allocate(),
            last_name: intern.last_name.clone(),
            first_name: intern.first_name.clone(),
            email: intern.email.clone(),
            institution: Some(intern.institution.clone()),
        };
        state.interns.push(record.clone());
        Ok(record)
    }

    async fn find_tutor_by_email(&self, email: &str) -> Result<Tutor, BackendError> {
        let mut state = self.state();
        state.enter(BackendOperation::FindTutor, email.to_string())?;
        state
            .tutors
            .iter()
            .find(|tutor| tutor.email == email)
            .cloned()
            .ok_or(BackendError::NotFound)
    }

    async fn create_tutor(&self, tutor: &NewTutor) -> Result<Tutor, BackendError> {
        let mut state = self.state();
        state.enter(BackendOperation::CreateTutor, tutor.email.clone())?;
        if state.tutors.iter().any(|known| known.email == tutor.email) {
            return Err(BackendError::Conflict(format!(
                "email {} already exists",
                tutor.email
            )));
        }
        let record = Tutor {
            id: state.allocate(),
            last_name: tutor.last_name.clone(),
            first_name: tutor.first_name.clone(),
            email: tutor.email.clone(),
            company: Some(tutor.company.clone()),
        };
        state.tutors.push(record.clone());
        Ok(record)
    }

    async fn create_internship(
        &self,
        internship: &NewInternship,
    ) -> Result<InternshipRecord, BackendError> {
        let mut state = self.state();
        state.enter(
            BackendOperation::CreateInternship,
            format!(
                "stagiaire={} tuteur={}",
                internship.intern_id, internship.tutor_id
            ),
        )?;
        if !state.interns.iter().any(|intern| intern.id == internship.intern_id) {
            return Err(missing("stagiaire", internship.intern_id));
        }
        if !state.tutors.iter().any(|tutor| tutor.id == internship.tutor_id) {
            return Err(missing("tuteur", internship.tutor_id));
        }
        let record = InternshipRecord {
            id: state.allocate(),
            description: internship.description.clone(),
            objective: internship.objective.clone(),
            company: internship.company.clone(),
            intern: Some(EntityRef::from(internship.intern_id)),
            tutor: Some(EntityRef::from(internship.tutor_id)),
        };
        state.internships.push(record.clone());
        Ok(record)
    }

    async fn create_period(&self, period: &NewPeriod) -> Result<Period, BackendError> {
        let mut state = self.state();
        state.enter(
            BackendOperation::CreatePeriod,
            format!("{} -> {}", period.start_date, period.end_date),
        )?;
        let internship_id = period.internship.id;
        if !state.internships.iter().any(|stage| stage.id == internship_id) {
            return Err(missing("stage", internship_id));
        }
        let record = Period {
            id: state.allocate(),
            start_date: period.start_date,
            end_date: period.end_date,
            internship: Some(period.internship),
        };
        state.periods.push(record.clone());
        Ok(record)
    }

    async fn link_period_tutor(
        &self,
        period_id: EntityId,
        tutor_id: EntityId,
    ) -> Result<(), BackendError> {
        let mut state = self.state();
        state.enter(
            BackendOperation::LinkPeriodTutor,
            format!("periode={period_id} tuteur={tutor_id}"),
        )?;
        if !state.periods.iter().any(|period| period.id == period_id) {
            return Err(BackendError::NotFound);
        }
        if !state.tutors.iter().any(|tutor| tutor.id == tutor_id) {
            return Err(BackendError::NotFound);
        }
        state.period_tutors.push((period_id, tutor_id));
        Ok(())
    }

    async fn appreciations_for_tutor(
        &self,
        tutor_id: EntityId,
    ) -> Result<Vec<Appreciation>, BackendError> {
        let mut state = self.state();
        state.enter(BackendOperation::ListAppreciations, tutor_id.to_string())?;
        Ok(state
            .appreciations
            .iter()
            .filter(|appreciation| appreciation.tutor.map(|tutor| tutor.id) == Some(tutor_id))
            .cloned()
            .collect())
    }

    async fn create_appreciation(
        &self,
        tutor_id: EntityId,
        appreciation: &NewAppreciation,
    ) -> Result<Appreciation, BackendError> {
        let mut state = self.state();
        state.enter(BackendOperation::CreateAppreciation, tutor_id.to_string())?;
        if !state.tutors.iter().any(|tutor| tutor.id == tutor_id) {
            return Err(BackendError::NotFound);
        }
        let record = Appreciation {
            id: state.allocate(),
            description: Some(appreciation.description.clone()),
            tutor: Some(EntityRef::from(tutor_id)),
        };
        state.appreciations.push(record.clone());
        Ok(record)
    }

    async fn find_category(&self, name: &str) -> Result<Category, BackendError> {
        let mut state = self.state();
        state.enter(BackendOperation::FindCategory, name.to_string())?;
        state
            .categories
            .iter()
            .find(|category| category.name == name)
            .cloned()
            .ok_or(BackendError::NotFound)
    }

    async fn create_category(&self, category: &NewCategory) -> Result<Category, BackendError> {
        let mut state = self.state();
        state.enter(BackendOperation::CreateCategory, category.name.clone())?;
        if state.categories.iter().any(|known| known.name == category.name) {
            return Err(BackendError::Conflict(format!(
                "categorie {} already exists",
                category.name
            )));
        }
        let record = Category {
            id: state.allocate(),
            name: category.name.clone(),
            value: Some(category.value),
        };
        state.categories.push(record.clone());
        Ok(record)
    }

    async fn find_competency(&self, name: &str) -> Result<Competency, BackendError> {
        let mut state = self.state();
        state.enter(BackendOperation::FindCompetency, name.to_string())?;
        state
            .competencies
            .iter()
            .find(|competency| competency.name == name)
            .cloned()
            .ok_or(BackendError::NotFound)
    }

    async fn create_competency(
        &self,
        competency: &NewCompetency,
    ) -> Result<Competency, BackendError> {
        let mut state = self.state();
        state.enter(BackendOperation::CreateCompetency, competency.name.clone())?;
        if state
            .competencies
            .iter()
            .any(|known| known.name == competency.name)
        {
            return Err(BackendError::Conflict(format!(
                "competence {} already exists",
                competency.name
            )));
        }
        let record = Competency {
            id: state.allocate(),
            name: competency.name.clone(),
            score: Some(competency.score),
        };
        state.competencies.push(record.clone());
        Ok(record)
    }

    async fn update_competency_score(
        &self,
        competency: &Competency,
        score: f64,
    ) -> Result<Competency, BackendError> {
        let mut state = self.state();
        state.enter(
            BackendOperation::UpdateCompetencyScore,
            format!("{} -> {score}", competency.name),
        )?;
        let stored = state
            .competencies
            .iter_mut()
            .find(|known| known.id == competency.id)
            .ok_or(BackendError::NotFound)?;
        stored.score = Some(score);
        Ok(stored.clone())
    }

    async fn create_evaluation(
        &self,
        evaluation: &NewEvaluation,
    ) -> Result<Evaluation, BackendError> {
        let mut state = self.state();
        state.enter(
            BackendOperation::CreateEvaluation,
            format!("appreciation={} {:?}", evaluation.appreciation_id, evaluation.target),
        )?;
        if !state
            .appreciations
            .iter()
            .any(|appreciation| appreciation.id == evaluation.appreciation_id)
        {
            return Err(BackendError::NotFound);
        }
        let target_known = match evaluation.target {
            EvaluationTarget::Category(id) => state.categories.iter().any(|item| item.id == id),
            EvaluationTarget::Competency(id) => {
                state.competencies.iter().any(|item| item.id == id)
            }
        };
        if !target_known {
            return Err(BackendError::NotFound);
        }
        let record = Evaluation {
            id: state.allocate(),
            value: Some(evaluation.value),
            comment: Some(evaluation.comment.clone()),
        };
        state.evaluations.push(StoredEvaluation {
            evaluation: record.clone(),
            appreciation_id: evaluation.appreciation_id,
            target: evaluation.target,
        });
        Ok(record)
    }

    async fn probe(&self, path: &str) -> Result<ProbeResponse, BackendError> {
        let mut state = self.state();
        state.enter(BackendOperation::Probe, path.to_string())?;
        if state.unreachable.contains(path) {
            return Err(BackendError::Transient(format!("connection refused: {path}")));
        }
        let status = if KNOWN_ENDPOINTS.contains(&path) {
            200
        } else {
            404
        };
        Ok(ProbeResponse { status })
    }
}
