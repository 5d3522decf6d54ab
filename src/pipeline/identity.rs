use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::types::{Alert, LABEL_ALERTNAME, LABEL_INSTANCE, LABEL_PANEL_ID};

const SEPARATOR: char = '_';
const ESCAPE: char = '\\';

/// Dedup key for one alert event: alertname, instance, panel id and start
/// time joined with `_`. Absent labels contribute an empty segment.
///
/// `_` and `\` inside a field are escaped with `\`, so distinct field
/// tuples never share a key.
pub fn compute_identity(alert: &Alert) -> String {
    let parts = [
        alert.label(LABEL_ALERTNAME).unwrap_or_default(),
        alert.label(LABEL_INSTANCE).unwrap_or_default(),
        alert.label(LABEL_PANEL_ID).unwrap_or_default(),
        alert.starts_at.as_str(),
    ];
    let mut key = String::with_capacity(parts.iter().map(|p| p.len() + 1).sum());
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            key.push(SEPARATOR);
        }
        for ch in part.chars() {
            if ch == SEPARATOR || ch == ESCAPE {
                key.push(ESCAPE);
            }
            key.push(ch);
        }
    }
    key
}

/// Identities currently being processed.
///
/// The lock is only held for the set operation itself.
#[derive(Clone, Debug, Default)]
pub struct InFlight {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `identity`, or `None` when another pass already holds it.
    /// The claim is released when the returned guard drops.
    pub fn try_acquire(&self, identity: impl Into<String>) -> Option<InFlightGuard> {
        let identity = identity.into();
        let inserted = self.lock().insert(identity.clone());
        inserted.then(|| InFlightGuard {
            owner: self.clone(),
            identity,
        })
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.lock().contains(identity)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
pub struct InFlightGuard {
    owner: InFlight,
    identity: String,
}

impl InFlightGuard {
    pub fn identity(&self) -> &str {
        &self.identity
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.owner.lock().remove(&self.identity);
    }
}
