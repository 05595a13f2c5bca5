//! Memoized discovery of upstream Bearer realms.
//!
//! Every registry is probed with an anonymous `GET /v2/` the first time a
//! client needs to know how to authenticate against it. A `401` carrying a
//! Bearer challenge yields the realm URL, any other status means the registry
//! is anonymous and is recorded as an empty realm.
//!
//! Concurrent first lookups for one registry share a single probe. The probe
//! runs on its own task and records its outcome there, so a client hanging up
//! neither cancels it nor leaves a stale result behind. Failures are not
//! remembered; the next lookup probes again.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use patchwork_core::RegistryId;

use crate::challenge::BearerChallenge;
use crate::config::DEFAULT_PROBE_TIMEOUT;
use crate::error::AuthError;
use crate::transport::{ProbeResponse, ProbeTransport};

const UNAUTHORIZED: u16 = 401;

type ProbeFuture = Shared<BoxFuture<'static, Result<String, AuthError>>>;
type Entries = Arc<Mutex<HashMap<RegistryId, Entry>>>;

enum Entry {
    Resolved(String),
    Probing { id: u64, probe: ProbeFuture },
}

/// Process-wide cache of upstream authentication realms.
///
/// An empty string is a valid cached value: the registry was probed and does
/// not require authentication.
pub struct AuthRealmCache {
    entries: Entries,
    next_probe: AtomicU64,
    probe_timeout: Duration,
}

impl fmt::Debug for AuthRealmCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRealmCache")
            .field("resolved", &self.len())
            .field("probe_timeout", &self.probe_timeout)
            .finish_non_exhaustive()
    }
}

impl Default for AuthRealmCache {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

impl AuthRealmCache {
    /// Creates an empty cache whose probes give up after `probe_timeout`.
    #[must_use]
    pub fn new(probe_timeout: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            next_probe: AtomicU64::new(0),
            probe_timeout,
        }
    }

    /// Returns the cached realm of a registry without probing it.
    #[must_use]
    pub fn lookup(&self, registry: &RegistryId) -> Option<String> {
        match self.entries.lock().get(registry) {
            Some(Entry::Resolved(realm)) => Some(realm.clone()),
            _ => None,
        }
    }

    /// Number of registries with a known realm.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|entry| matches!(entry, Entry::Resolved(_)))
            .count()
    }

    /// Returns `true` if no realm is known yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the Bearer realm of `registry`, or `""` if it is anonymous.
    ///
    /// The first call for a registry probes `{registry}/v2/` through
    /// `transport`; later calls are answered from memory.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Discovery`] if the registry answers `401` without a
    /// single usable Bearer challenge, and [`AuthError::Transport`] if it
    /// cannot be reached in time. Neither outcome is cached.
    pub async fn realm_for(
        &self,
        registry: &RegistryId,
        transport: &Arc<dyn ProbeTransport>,
    ) -> Result<String, AuthError> {
        let probe = {
            let mut entries = self.entries.lock();
            match entries.get(registry) {
                Some(Entry::Resolved(realm)) => return Ok(realm.clone()),
                // A failed probe is only left behind if its task panicked.
                Some(Entry::Probing { probe, .. }) if !matches!(probe.peek(), Some(Err(_))) => {
                    probe.clone()
                }
                _ => {
                    let id = self.next_probe.fetch_add(1, Ordering::Relaxed);
                    let probe = self.start_probe(id, registry, Arc::clone(transport));
                    entries.insert(
                        registry.clone(),
                        Entry::Probing {
                            id,
                            probe: probe.clone(),
                        },
                    );
                    probe
                }
            }
        };

        probe.await
    }

    fn start_probe(
        &self,
        id: u64,
        registry: &RegistryId,
        transport: Arc<dyn ProbeTransport>,
    ) -> ProbeFuture {
        let endpoint = registry.endpoint("v2/");
        let timeout = self.probe_timeout;
        tracing::debug!(%registry, endpoint, "Probing registry authentication");

        let entries = Arc::clone(&self.entries);
        let registry = registry.clone();
        let task_endpoint = endpoint.clone();
        let task = tokio::spawn(async move {
            let response = tokio::time::timeout(timeout, transport.probe(&task_endpoint));
            let outcome = match response.await {
                Ok(Ok(response)) => interpret(&task_endpoint, &response),
                Ok(Err(e)) => Err(AuthError::Transport {
                    endpoint: task_endpoint,
                    reason: e.to_string(),
                }),
                Err(_) => Err(AuthError::Transport {
                    endpoint: task_endpoint,
                    reason: format!("no response within {timeout:?}"),
                }),
            };
            settle(&entries, &registry, id, &outcome);
            outcome
        });

        async move {
            task.await.unwrap_or_else(|e| {
                Err(AuthError::Transport {
                    endpoint,
                    reason: format!("probe task failed: {e}"),
                })
            })
        }
        .boxed()
        .shared()
    }
}

/// Records the outcome of probe `id` unless another probe replaced it.
fn settle(
    entries: &Mutex<HashMap<RegistryId, Entry>>,
    registry: &RegistryId,
    id: u64,
    outcome: &Result<String, AuthError>,
) {
    let mut entries = entries.lock();
    let is_current = matches!(
        entries.get(registry),
        Some(Entry::Probing { id: current, .. }) if *current == id
    );
    if !is_current {
        return;
    }

    match outcome {
        Ok(realm) => {
            if realm.is_empty() {
                tracing::debug!(%registry, "Registry does not require authentication");
            } else {
                tracing::debug!(%registry, realm, "Registry uses Bearer authentication");
            }
            entries.insert(registry.clone(), Entry::Resolved(realm.clone()));
        }
        Err(e) => {
            tracing::warn!(%registry, error = %e, "Authentication probe failed");
            entries.remove(registry);
        }
    }
}

fn interpret(endpoint: &str, response: &ProbeResponse) -> Result<String, AuthError> {
    if response.status != UNAUTHORIZED {
        return Ok(String::new());
    }

    match response.www_authenticate.as_slice() {
        [value] => BearerChallenge::parse(value)
            .map(|challenge| challenge.realm)
            .ok_or_else(|| AuthError::Discovery {
                endpoint: endpoint.to_string(),
                challenge: value.clone(),
            }),
        [] => Err(AuthError::Discovery {
            endpoint: endpoint.to_string(),
            challenge: "no WWW-Authenticate header".to_string(),
        }),
        values => Err(AuthError::Discovery {
            endpoint: endpoint.to_string(),
            challenge: values.join(", "),
        }),
    }
}
