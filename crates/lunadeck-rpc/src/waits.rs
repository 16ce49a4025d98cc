//! Wait registry: named markers for operations still in flight.
//!
//! A wait is a plain string token. It is added when a command that needs one
//! is issued and removed when its response or notification arrives. The
//! registry is a set: adding the same token twice and removing it once
//! leaves it absent.
//!
//! Each entry records when it was added and an optional deadline. Nothing in
//! this crate expires waits on its own; callers that want a timeout policy
//! call [`WaitRegistry::reap_expired`] themselves.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::debug;

pub const ON_SERVICE_RESTART: &str = "onServiceRestart";
pub const ON_FORCE_UPDATE_CHECK: &str = "onForceUpdateCheck";
pub const ON_UPDATE: &str = "onUpdate";
pub const ON_KLIPPER_RESTART: &str = "onKlipperRestart";
pub const ON_KLIPPER_FIRMWARE_RESTART: &str = "onKlipperFirmwareRestart";
pub const ON_PRINT_CANCEL: &str = "onPrintCancel";
pub const ON_PRINT_PAUSE: &str = "onPrintPause";
pub const ON_PRINT_RESUME: &str = "onPrintResume";
/// Prefix; the directory path is appended.
pub const ON_GET_DIRECTORY: &str = "onGetDirectory";

/// Token used while listing `path`.
#[must_use]
pub fn get_directory(path: &str) -> String {
    format!("{ON_GET_DIRECTORY}{path}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWait {
    pub since: Instant,
    pub deadline: Option<Instant>,
}

/// Shared handle to the set of active waits. Clones share the same set.
#[derive(Debug, Clone, Default)]
pub struct WaitRegistry {
    inner: Arc<Mutex<BTreeMap<String, PendingWait>>>,
}

impl WaitRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, PendingWait>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert `token` if absent. An existing entry keeps its original record.
    pub fn add(&self, token: &str) {
        let mut waits = self.lock();
        if !waits.contains_key(token) {
            debug!("Adding wait: {token}");
            waits.insert(
                token.to_string(),
                PendingWait {
                    since: Instant::now(),
                    deadline: None,
                },
            );
        }
    }

    /// Insert `token` with a deadline, or set the deadline of an existing entry.
    pub fn add_with_deadline(&self, token: &str, deadline: Instant) {
        let mut waits = self.lock();
        waits
            .entry(token.to_string())
            .and_modify(|wait| wait.deadline = Some(deadline))
            .or_insert_with(|| PendingWait {
                since: Instant::now(),
                deadline: Some(deadline),
            });
    }

    /// Remove `token`; returns whether it was present.
    pub fn remove(&self, token: &str) -> bool {
        let removed = self.lock().remove(token).is_some();
        if removed {
            debug!("Removed wait: {token}");
        }
        removed
    }

    #[must_use]
    pub fn has(&self, token: &str) -> bool {
        self.lock().contains_key(token)
    }

    /// True if any of `tokens` is present. An empty list is never present.
    #[must_use]
    pub fn has_any_of<S: AsRef<str>>(&self, tokens: &[S]) -> bool {
        let waits = self.lock();
        tokens.iter().any(|token| waits.contains_key(token.as_ref()))
    }

    #[must_use]
    pub fn has_any(&self) -> bool {
        !self.lock().is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Active tokens, sorted.
    #[must_use]
    pub fn tokens(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    #[must_use]
    pub fn get(&self, token: &str) -> Option<PendingWait> {
        self.lock().get(token).cloned()
    }

    /// Tokens whose deadline is at or before `now`.
    #[must_use]
    pub fn expired(&self, now: Instant) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|(_, wait)| wait.deadline.is_some_and(|deadline| deadline <= now))
            .map(|(token, _)| token.clone())
            .collect()
    }

    /// Remove and return every expired token.
    pub fn reap_expired(&self, now: Instant) -> Vec<String> {
        let mut waits = self.lock();
        let expired: Vec<String> = waits
            .iter()
            .filter(|(_, wait)| wait.deadline.is_some_and(|deadline| deadline <= now))
            .map(|(token, _)| token.clone())
            .collect();
        for token in &expired {
            waits.remove(token);
            debug!("Expired wait: {token}");
        }
        expired
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
