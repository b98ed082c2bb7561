//! Client-side correlation of authorization redirects.
//!
//! Each flow gets its own unguessable `state`. The redirect handler routes
//! the received code (or error) to exactly the flow that is waiting on that
//! state, so concurrent flows never observe each other's results. A flow
//! whose receiver was dropped is forgotten the next time the map is touched.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, oneshot};

use crate::oauth::secrets::generate_token;

/// Outcome delivered to a waiting flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackResult {
    /// The authorization server issued a code.
    Authorized { code: String },
    /// The authorization server returned an error.
    Denied { error: String, error_description: Option<String> },
}

impl CallbackResult {
    /// Parse the query string of a redirect into `(state, result)`.
    ///
    /// Returns `None` when `state` is missing or neither `code` nor `error`
    /// is present.
    #[must_use]
    pub fn from_query(query: &str) -> Option<(String, Self)> {
        let mut state = None;
        let mut code = None;
        let mut error = None;
        let mut error_description = None;

        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            match key.as_ref() {
                "state" => state = Some(value.into_owned()),
                "code" => code = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                "error_description" => error_description = Some(value.into_owned()),
                _ => {}
            }
        }

        let state = state.filter(|s| !s.is_empty())?;
        let result = match (error, code) {
            (Some(error), _) => Self::Denied { error, error_description },
            (None, Some(code)) if !code.is_empty() => Self::Authorized { code },
            _ => return None,
        };
        Some((state, result))
    }
}

/// Flows waiting for their authorization redirect, keyed by `state`.
#[derive(Clone, Default)]
pub struct PendingFlows {
    flows: Arc<Mutex<HashMap<String, oneshot::Sender<CallbackResult>>>>,
}

impl PendingFlows {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a flow: returns a fresh `state` and the receiver its result arrives on.
    pub async fn begin(&self) -> (String, oneshot::Receiver<CallbackResult>) {
        let (tx, rx) = oneshot::channel();
        let mut flows = self.flows.lock().await;
        prune_abandoned(&mut flows);
        loop {
            let state = generate_token();
            if let std::collections::hash_map::Entry::Vacant(entry) = flows.entry(state.clone()) {
                entry.insert(tx);
                return (state, rx);
            }
        }
    }

    /// Deliver a result to the flow waiting on `state`.
    ///
    /// Returns `false` for unknown or already completed states, or when the
    /// waiting side has gone away.
    pub async fn complete(&self, state: &str, result: CallbackResult) -> bool {
        let Some(tx) = self.flows.lock().await.remove(state) else {
            tracing::warn!("Authorization callback with unknown state");
            return false;
        };
        tx.send(result).is_ok()
    }

    /// Parse a redirect query and deliver it.
    pub async fn complete_from_query(&self, query: &str) -> bool {
        match CallbackResult::from_query(query) {
            Some((state, result)) => self.complete(&state, result).await,
            None => false,
        }
    }

    /// Abandon a flow.
    pub async fn cancel(&self, state: &str) -> bool {
        self.flows.lock().await.remove(state).is_some()
    }

    /// Number of flows still waiting.
    pub async fn len(&self) -> usize {
        let mut flows = self.flows.lock().await;
        prune_abandoned(&mut flows);
        flows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn prune_abandoned(flows: &mut HashMap<String, oneshot::Sender<CallbackResult>>) {
    let before = flows.len();
    flows.retain(|_, tx| !tx.is_closed());
    let dropped = before - flows.len();
    if dropped > 0 {
        tracing::debug!(dropped, "Forgot abandoned authorization flows");
    }
}

impl std::fmt::Debug for PendingFlows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingFlows").finish()
    }
}
