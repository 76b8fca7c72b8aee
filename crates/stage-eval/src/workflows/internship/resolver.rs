use std::sync::Arc;

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::backend::{BackendError, BackendGateway, FailureKind};
use super::domain::{
    Category, Competency, FormSubmission, Intern, NewCategory, NewCompetency, NewIntern,
    NewTutor, Tutor,
};

const DEFAULT_LAST_NAME: &str = "DefaultNom";
const DEFAULT_FIRST_NAME: &str = "DefaultPrenom";
const DEFAULT_COMPANY: &str = "DefaultEntreprise";
const RANDOM_SUFFIX_LEN: usize = 6;

/// Defaults applied when deriving intern and tutor records from the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverSettings {
    pub intern_email_domain: String,
    pub tutor_email_domain: String,
    pub default_institution: String,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            intern_email_domain: "example.com".to_string(),
            tutor_email_domain: "entreprise.com".to_string(),
            default_institution: "Université Hassan II".to_string(),
        }
    }
}

/// Name typed into the wizard, split the way the backend stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonName {
    pub last_name: String,
    pub first_name: String,
}

impl PersonName {
    /// First token becomes `nom`, the rest `prenom`.
    pub fn parse(raw: &str) -> Self {
        let mut tokens = raw.split_whitespace();
        let last_name = tokens
            .next()
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_LAST_NAME.to_string());
        let rest: Vec<&str> = tokens.collect();
        let first_name = if rest.is_empty() {
            DEFAULT_FIRST_NAME.to_string()
        } else {
            rest.join(" ")
        };

        Self {
            last_name,
            first_name,
        }
    }
}

/// Deterministic local part: lower-cased name with whitespace runs as dots.
pub fn email_local_part(raw_name: &str) -> String {
    raw_name
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(".")
}

/// Millisecond clock used to make retry emails unique.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

fn system_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().timestamp_millis())
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_SUFFIX_LEN)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

/// A record that was either found by its natural key or freshly created.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub entity: T,
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("lookup of {key} failed: {source}")]
    Lookup { key: String, source: BackendError },
    #[error("creation of {key} failed: {source}")]
    Create { key: String, source: BackendError },
}

impl ResolveError {
    pub fn backend_error(&self) -> &BackendError {
        match self {
            ResolveError::Lookup { source, .. } | ResolveError::Create { source, .. } => source,
        }
    }
}

/// People de-duplicated by email (interns and tutors).
#[async_trait]
trait Person: Sized + Send {
    type Draft: Clone + Send + Sync;

    const KIND: &'static str;

    fn email(draft: &Self::Draft) -> &str;
    fn with_email(draft: &Self::Draft, email: String) -> Self::Draft;

    async fn find<G>(gateway: &G, email: &str) -> Result<Self, BackendError>
    where
        G: BackendGateway + ?Sized;

    async fn create<G>(gateway: &G, draft: &Self::Draft) -> Result<Self, BackendError>
    where
        G: BackendGateway + ?Sized;
}

#[async_trait]
impl Person for Intern {
    type Draft = NewIntern;

    const KIND: &'static str = "stagiaire";

    fn email(draft: &NewIntern) -> &str {
        &draft.email
    }

    fn with_email(draft: &NewIntern, email: String) -> NewIntern {
        NewIntern {
            email,
            ..draft.clone()
        }
    }

    async fn find<G>(gateway: &G, email: &str) -> Result<Self, BackendError>
    where
        G: BackendGateway + ?Sized,
    {
        gateway.find_intern_by_email(email).await
    }

    async fn create<G>(gateway: &G, draft: &NewIntern) -> Result<Self, BackendError>
    where
        G: BackendGateway + ?Sized,
    {
        gateway.create_intern(draft).await
    }
}

#[async_trait]
impl Person for Tutor {
    type Draft = NewTutor;

    const KIND: &'static str = "tuteur";

    fn email(draft: &NewTutor) -> &str {
        &draft.email
    }

    fn with_email(draft: &NewTutor, email: String) -> NewTutor {
        NewTutor {
            email,
            ..draft.clone()
        }
    }

    async fn find<G>(gateway: &G, email: &str) -> Result<Self, BackendError>
    where
        G: BackendGateway + ?Sized,
    {
        gateway.find_tutor_by_email(email).await
    }

    async fn create<G>(gateway: &G, draft: &NewTutor) -> Result<Self, BackendError>
    where
        G: BackendGateway + ?Sized,
    {
        gateway.create_tutor(draft).await
    }
}

/// Find-or-create logic for every entity keyed by a natural identifier.
pub struct EntityResolver<G: ?Sized> {
    gateway: Arc<G>,
    settings: ResolverSettings,
    clock: Clock,
}

impl<G> EntityResolver<G>
where
    G: BackendGateway + ?Sized,
{
    pub fn new(gateway: Arc<G>, settings: ResolverSettings) -> Self {
        Self {
            gateway,
            settings,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    pub fn intern_draft(&self, form: &FormSubmission) -> NewIntern {
        let name = PersonName::parse(&form.student_name);
        NewIntern {
            last_name: name.last_name,
            first_name: name.first_name,
            email: format!(
                "{}@{}",
                email_local_part(&form.student_name),
                self.settings.intern_email_domain
            ),
            institution: self.settings.default_institution.clone(),
        }
    }

    pub fn tutor_draft(&self, form: &FormSubmission) -> NewTutor {
        let name = PersonName::parse(&form.tutor_name);
        let company = form.company_name.trim();
        NewTutor {
            last_name: name.last_name,
            first_name: name.first_name,
            email: format!(
                "{}@{}",
                email_local_part(&form.tutor_name),
                self.settings.tutor_email_domain
            ),
            company: if company.is_empty() {
                DEFAULT_COMPANY.to_string()
            } else {
                company.to_string()
            },
        }
    }

    pub async fn resolve_intern(
        &self,
        form: &FormSubmission,
    ) -> Result<Resolved<Intern>, ResolveError> {
        let draft = self.intern_draft(form);
        self.resolve_person::<Intern>(draft).await
    }

    pub async fn resolve_tutor(
        &self,
        form: &FormSubmission,
    ) -> Result<Resolved<Tutor>, ResolveError> {
        let draft = self.tutor_draft(form);
        self.resolve_person::<Tutor>(draft).await
    }

    async fn resolve_person<P: Person>(
        &self,
        draft: P::Draft,
    ) -> Result<Resolved<P>, ResolveError> {
        let email = P::email(&draft).to_string();
        let gateway = self.gateway.as_ref();

        match P::find(gateway, &email).await {
            Ok(found) => {
                info!(kind = P::KIND, %email, "reusing existing record");
                return Ok(Resolved {
                    entity: found,
                    created: false,
                });
            }
            Err(BackendError::NotFound) => {
                debug!(kind = P::KIND, %email, "no record for email; creating");
            }
            Err(source) => return Err(ResolveError::Lookup { key: email, source }),
        }

        match P::create(gateway, &draft).await {
            Ok(created) => {
                info!(kind = P::KIND, %email, "record created");
                return Ok(Resolved {
                    entity: created,
                    created: true,
                });
            }
            Err(source) if source.kind() == FailureKind::Conflict => {
                warn!(kind = P::KIND, %email, error = %source, "email already taken; retrying once");
            }
            Err(source) => return Err(ResolveError::Create { key: email, source }),
        }

        let retry_email = self.unique_email::<P>(&email).await;
        let retry_draft = P::with_email(&draft, retry_email.clone());
        match P::create(gateway, &retry_draft).await {
            Ok(created) => {
                info!(kind = P::KIND, email = %retry_email, "record created with regenerated email");
                Ok(Resolved {
                    entity: created,
                    created: true,
                })
            }
            Err(source) => Err(ResolveError::Create {
                key: retry_email,
                source,
            }),
        }
    }

    /// Appends a timestamp, and a random suffix too when the timestamped address is taken.
    async fn unique_email<P: Person>(&self, email: &str) -> String {
        let (local, domain) = email.rsplit_once('@').unwrap_or((email, ""));
        let stamp = (self.clock)();
        let timestamped = format!("{local}.{stamp}@{domain}");

        match P::find(self.gateway.as_ref(), &timestamped).await {
            Err(BackendError::NotFound) => timestamped,
            Ok(_) => {
                debug!(kind = P::KIND, email = %timestamped, "timestamped email also taken");
                format!("{local}.{stamp}.{}@{domain}", random_suffix())
            }
            Err(err) => {
                debug!(kind = P::KIND, error = %err, "unable to check timestamped email");
                format!("{local}.{stamp}.{}@{domain}", random_suffix())
            }
        }
    }

    /// Categories are shared across submissions; an existing one is reused untouched.
    pub async fn resolve_category(
        &self,
        name: &str,
        value: f64,
    ) -> Result<Resolved<Category>, ResolveError> {
        let key = name.to_string();
        match self.gateway.find_category(name).await {
            Ok(found) => {
                return Ok(Resolved {
                    entity: found,
                    created: false,
                })
            }
            Err(BackendError::NotFound) => {}
            Err(source) => return Err(ResolveError::Lookup { key, source }),
        }

        let draft = NewCategory {
            name: name.to_string(),
            value,
        };
        match self.gateway.create_category(&draft).await {
            Ok(created) => Ok(Resolved {
                entity: created,
                created: true,
            }),
            Err(source) if source.kind() == FailureKind::Conflict => {
                // Created concurrently by another submission.
                self.gateway
                    .find_category(name)
                    .await
                    .map(|found| Resolved {
                        entity: found,
                        created: false,
                    })
                    .map_err(|source| ResolveError::Lookup { key, source })
            }
            Err(source) => Err(ResolveError::Create { key, source }),
        }
    }

    /// Like categories, but a found competency takes the submitted score.
    pub async fn resolve_competency(
        &self,
        name: &str,
        score: f64,
    ) -> Result<Resolved<Competency>, ResolveError> {
        let key = name.to_string();
        let found = match self.gateway.find_competency(name).await {
            Ok(found) => Some(found),
            Err(BackendError::NotFound) => None,
            Err(source) => return Err(ResolveError::Lookup { key, source }),
        };

        let found = match found {
            Some(found) => found,
            None => {
                let draft = NewCompetency {
                    name: name.to_string(),
                    score,
                };
                match self.gateway.create_competency(&draft).await {
                    Ok(created) => {
                        return Ok(Resolved {
                            entity: created,
                            created: true,
                        })
                    }
                    Err(source) if source.kind() == FailureKind::Conflict => self
                        .gateway
                        .find_competency(name)
                        .await
                        .map_err(|source| ResolveError::Lookup {
                            key: key.clone(),
                            source,
                        })?,
                    Err(source) => return Err(ResolveError::Create { key, source }),
                }
            }
        };

        if found.score == Some(score) {
            return Ok(Resolved {
                entity: found,
                created: false,
            });
        }

        let entity = match self.gateway.update_competency_score(&found, score).await {
            Ok(updated) => updated,
            Err(err) => {
                warn!(competency = %found.name, error = %err, "unable to overwrite competency score");
                found
            }
        };
        Ok(Resolved {
            entity,
            created: false,
        })
    }
}
