use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::backend::{BackendGateway, KNOWN_ENDPOINTS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EndpointStatus {
    /// The endpoint answered, whatever the HTTP status.
    Reachable { status: u16 },
    Unreachable { error: String },
}

impl EndpointStatus {
    pub fn is_reachable(&self) -> bool {
        matches!(self, EndpointStatus::Reachable { .. })
    }
}

/// Per-endpoint reachability of the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectivityReport {
    pub endpoints: BTreeMap<String, EndpointStatus>,
    pub all_reachable: bool,
}

impl ConnectivityReport {
    pub fn unreachable(&self) -> impl Iterator<Item = &str> {
        self.endpoints
            .iter()
            .filter(|(_, status)| !status.is_reachable())
            .map(|(path, _)| path.as_str())
    }
}

pub struct ConnectivityProber<G: ?Sized> {
    gateway: Arc<G>,
    endpoints: Vec<String>,
}

impl<G> ConnectivityProber<G>
where
    G: BackendGateway + ?Sized,
{
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            endpoints: KNOWN_ENDPOINTS.iter().map(|path| path.to_string()).collect(),
        }
    }

    pub fn with_endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }

    /// Probes every endpoint once; never fails as a whole.
    pub async fn check_connectivity(&self) -> ConnectivityReport {
        let mut endpoints = BTreeMap::new();

        for path in &self.endpoints {
            let status = match self.gateway.probe(path).await {
                Ok(response) => EndpointStatus::Reachable {
                    status: response.status,
                },
                Err(err) => {
                    warn!(endpoint = %path, error = %err, "endpoint unreachable");
                    EndpointStatus::Unreachable {
                        error: err.to_string(),
                    }
                }
            };
            endpoints.insert(path.clone(), status);
        }

        let all_reachable = endpoints.values().all(EndpointStatus::is_reachable);
        info!(
            checked = endpoints.len(),
            all_reachable, "connectivity check finished"
        );

        ConnectivityReport {
            endpoints,
            all_reachable,
        }
    }
}
