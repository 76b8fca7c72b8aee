use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use super::{mentions_duplicate, BackendError, BackendGateway, BackendOperation, ProbeResponse};
use crate::workflows::internship::domain::{
    Appreciation, Category, Competency, EntityId, Evaluation, EvaluationTarget, Intern,
    InternshipRecord, NewAppreciation, NewCategory, NewCompetency, NewEvaluation, NewIntern,
    NewInternship, NewPeriod, NewTutor, Period, Tutor,
};

/// Bounded retries shared by every call: no backoff, no idempotency key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after a request got no response at all.
    pub transport_retries: u8,
    /// Extra attempts after a 5xx that is not a duplicate-key rejection.
    pub server_retries: u8,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            transport_retries: 1,
            server_retries: 1,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            transport_retries: 0,
            server_retries: 0,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

/// reqwest-backed client for the `/api` resource tree.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: Url,
    client: reqwest::Client,
    retry: RetryPolicy,
}

struct Call {
    operation: BackendOperation,
    method: Method,
    url: Url,
    body: Option<serde_json::Value>,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self, BackendError> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|err| BackendError::Fatal {
                status: 0,
                message: format!("invalid backend base url '{base_url}': {err}"),
            })?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::Fatal {
                status: 0,
                message: format!("backend base url '{base_url}' cannot carry a path"),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| BackendError::Fatal {
                status: 0,
                message: format!("unable to build http client: {err}"),
            })?;

        Ok(Self {
            base_url,
            client,
            retry,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends percent-encoded path segments to the base url.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn call<B: Serialize>(
        &self,
        operation: BackendOperation,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<Call, BackendError> {
        let body = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(|err| BackendError::Decode(err.to_string()))?;
        Ok(Call {
            operation,
            method,
            url,
            body,
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, call: Call) -> Result<T, BackendError> {
        let operation = call.operation;
        let response = self.send(call).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|err| BackendError::Transient(err.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|err| {
            warn!(%operation, error = %err, "backend returned an unexpected body");
            BackendError::Decode(err.to_string())
        })
    }

    async fn send(&self, call: Call) -> Result<reqwest::Response, BackendError> {
        let Call {
            operation,
            method,
            url,
            body,
        } = call;
        let mut transport_attempts = 0;
        let mut server_attempts = 0;

        loop {
            debug!(%operation, %method, %url, "backend request");
            let mut request = self.client.request(method.clone(), url.clone());
            if let Some(body) = &body {
                request = request.json(body);
            }

            match request.send().await {
                Err(err) => {
                    if transport_attempts < self.retry.transport_retries {
                        transport_attempts += 1;
                        warn!(%operation, error = %err, "no response from backend; retrying");
                        tokio::time::sleep(self.retry.delay).await;
                        continue;
                    }
                    return Err(BackendError::Transient(err.to_string()));
                }
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let message = response.text().await.unwrap_or_default();
                    let error = classify(status, message);

                    if matches!(error, BackendError::Server { .. })
                        && server_attempts < self.retry.server_retries
                    {
                        server_attempts += 1;
                        warn!(%operation, %status, "backend server error; retrying");
                        tokio::time::sleep(self.retry.delay).await;
                        continue;
                    }
                    if !error.is_not_found() {
                        debug!(%operation, %status, error = %error, "backend rejected request");
                    }
                    return Err(error);
                }
            }
        }
    }
}

fn classify(status: StatusCode, message: String) -> BackendError {
    let code = status.as_u16();
    match status {
        StatusCode::NOT_FOUND => BackendError::NotFound,
        StatusCode::CONFLICT => BackendError::Conflict(message),
        _ if mentions_duplicate(&message) => BackendError::Conflict(message),
        _ if status.is_server_error() => BackendError::Server {
            status: code,
            message,
        },
        _ => BackendError::Fatal {
            status: code,
            message,
        },
    }
}

#[async_trait]
impl BackendGateway for HttpBackend {
    async fn find_intern_by_email(&self, email: &str) -> Result<Intern, BackendError> {
        let url = self.endpoint(&["stagiaires", "email", email]);
        let call = self.call::<()>(BackendOperation::FindIntern, Method::GET, url, None)?;
        self.fetch(call).await
    }

    async fn create_intern(&self, intern: &NewIntern) -> Result<Intern, BackendError> {
        let url = self.endpoint(&["stagiaires"]);
        let call = self.call(BackendOperation::CreateIntern, Method::POST, url, Some(intern))?;
        self.fetch(call).await
    }

    async fn find_tutor_by_email(&self, email: &str) -> Result<Tutor, BackendError> {
        let url = self.endpoint(&["tuteurs", "email", email]);
        let call = self.call::<()>(BackendOperation::FindTutor, Method::GET, url, None)?;
        self.fetch(call).await
    }

    async fn create_tutor(&self, tutor: &NewTutor) -> Result<Tutor, BackendError> {
        let url = self.endpoint(&["tuteurs"]);
        let call = self.call(BackendOperation::CreateTutor, Method::POST, url, Some(tutor))?;
        self.fetch(call).await
    }

    async fn create_internship(
        &self,
        internship: &NewInternship,
    ) -> Result<InternshipRecord, BackendError> {
        let mut url = self.endpoint(&["stages", "create-with-ids"]);
        url.query_pairs_mut()
            .append_pair("stagiaireId", &internship.intern_id.to_string())
            .append_pair("tuteurId", &internship.tutor_id.to_string());
        let call = self.call(
            BackendOperation::CreateInternship,
            Method::POST,
            url,
            Some(internship),
        )?;
        self.fetch(call).await
    }

    async fn create_period(&self, period: &NewPeriod) -> Result<Period, BackendError> {
        let url = self.endpoint(&["periodes"]);
        let call = self.call(BackendOperation::CreatePeriod, Method::POST, url, Some(period))?;
        self.fetch(call).await
    }

    async fn link_period_tutor(
        &self,
        period_id: EntityId,
        tutor_id: EntityId,
    ) -> Result<(), BackendError> {
        let period = period_id.to_string();
        let tutor = tutor_id.to_string();
        let url = self.endpoint(&["periodes", &period, "tuteur", &tutor]);
        let call = self.call::<()>(BackendOperation::LinkPeriodTutor, Method::POST, url, None)?;
        self.send(call).await.map(|_| ())
    }

    async fn appreciations_for_tutor(
        &self,
        tutor_id: EntityId,
    ) -> Result<Vec<Appreciation>, BackendError> {
        let tutor = tutor_id.to_string();
        let url = self.endpoint(&["appreciations", "tuteur", &tutor]);
        let call = self.call::<()>(BackendOperation::ListAppreciations, Method::GET, url, None)?;
        self.fetch(call).await
    }

    async fn create_appreciation(
        &self,
        tutor_id: EntityId,
        appreciation: &NewAppreciation,
    ) -> Result<Appreciation, BackendError> {
        let tutor = tutor_id.to_string();
        let url = self.endpoint(&["appreciations", "tuteur", &tutor]);
        let call = self.call(
            BackendOperation::CreateAppreciation,
            Method::POST,
            url,
            Some(appreciation),
        )?;
        self.fetch(call).await
    }

    async fn find_category(&self, name: &str) -> Result<Category, BackendError> {
        let url = self.endpoint(&["categories", "intitule", name]);
        let call = self.call::<()>(BackendOperation::FindCategory, Method::GET, url, None)?;
        self.fetch(call).await
    }

    async fn create_category(&self, category: &NewCategory) -> Result<Category, BackendError> {
        let url = self.endpoint(&["categories"]);
        let call = self.call(
            BackendOperation::CreateCategory,
            Method::POST,
            url,
            Some(category),
        )?;
        self.fetch(call).await
    }

    async fn find_competency(&self, name: &str) -> Result<Competency, BackendError> {
        let url = self.endpoint(&["competences", "intitule", name]);
        let call = self.call::<()>(BackendOperation::FindCompetency, Method::GET, url, None)?;
        self.fetch(call).await
    }

    async fn create_competency(
        &self,
        competency: &NewCompetency,
    ) -> Result<Competency, BackendError> {
        let url = self.endpoint(&["competences"]);
        let call = self.call(
            BackendOperation::CreateCompetency,
            Method::POST,
            url,
            Some(competency),
        )?;
        self.fetch(call).await
    }

    async fn update_competency_score(
        &self,
        competency: &Competency,
        score: f64,
    ) -> Result<Competency, BackendError> {
        let id = competency.id.to_string();
        let url = self.endpoint(&["competences", &id]);
        let updated = Competency {
            score: Some(score),
            ..competency.clone()
        };
        let call = self.call(
            BackendOperation::UpdateCompetencyScore,
            Method::PUT,
            url,
            Some(&updated),
        )?;
        self.fetch(call).await
    }

    async fn create_evaluation(
        &self,
        evaluation: &NewEvaluation,
    ) -> Result<Evaluation, BackendError> {
        let appreciation = evaluation.appreciation_id.to_string();
        let url = match evaluation.target {
            EvaluationTarget::Category(id) => {
                let id = id.to_string();
                self.endpoint(&["evaluations", "appreciation", &appreciation, "categorie", &id])
            }
            EvaluationTarget::Competency(id) => {
                let id = id.to_string();
                self.endpoint(&[
                    "evaluations",
                    "appreciation",
                    &appreciation,
                    "competences",
                    &id,
                ])
            }
        };
        let call = self.call(
            BackendOperation::CreateEvaluation,
            Method::POST,
            url,
            Some(evaluation),
        )?;
        self.fetch(call).await
    }

    async fn probe(&self, path: &str) -> Result<ProbeResponse, BackendError> {
        let segments: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
        let url = self.endpoint(&segments);
        debug!(%url, "probing backend endpoint");
        match self.client.get(url).send().await {
            Ok(response) => Ok(ProbeResponse {
                status: response.status().as_u16(),
            }),
            Err(err) => Err(BackendError::Transient(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> HttpBackend {
        HttpBackend::new(
            "http://localhost:8080/api",
            Duration::from_secs(1),
            RetryPolicy::none(),
        )
        .expect("backend builds")
    }

    #[test]
    fn endpoint_percent_encodes_titles() {
        let url = backend().endpoint(&["categories", "intitule", "Ouverture d'esprit"]);
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/categories/intitule/Ouverture%20d'esprit"
        );
    }

    #[test]
    fn endpoint_handles_trailing_slash_in_base() {
        let backend = HttpBackend::new(
            "http://localhost:8080/api/",
            Duration::from_secs(1),
            RetryPolicy::default(),
        )
        .expect("backend builds");
        let url = backend.endpoint(&["stagiaires", "email", "jean.dupont@example.com"]);
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/stagiaires/email/jean.dupont@example.com"
        );
    }

    #[test]
    fn rejects_unusable_base_urls() {
        assert!(HttpBackend::new("not a url", Duration::from_secs(1), RetryPolicy::none()).is_err());
        assert!(
            HttpBackend::new("mailto:api@example.com", Duration::from_secs(1), RetryPolicy::none())
                .is_err()
        );
    }

    #[test]
    fn classify_maps_statuses_to_tagged_failures() {
        assert_eq!(
            classify(StatusCode::NOT_FOUND, String::new()),
            BackendError::NotFound
        );
        assert!(matches!(
            classify(StatusCode::CONFLICT, "email".to_string()),
            BackendError::Conflict(_)
        ));
        assert!(matches!(
            classify(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Duplicate entry for key 'UK_email'".to_string()
            ),
            BackendError::Conflict(_)
        ));
        assert!(matches!(
            classify(
                StatusCode::INTERNAL_SERVER_ERROR,
                "not-null property references a null or transient value; constraint [institution]"
                    .to_string()
            ),
            BackendError::Server { status: 500, .. }
        ));
        assert!(matches!(
            classify(StatusCode::BAD_GATEWAY, "upstream".to_string()),
            BackendError::Server { status: 502, .. }
        ));
        assert!(matches!(
            classify(StatusCode::BAD_REQUEST, "bad id".to_string()),
            BackendError::Fatal { status: 400, .. }
        ));
    }
}
