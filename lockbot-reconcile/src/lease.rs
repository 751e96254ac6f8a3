//! At-most-one in-flight reconciliation per repository.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use lockbot_core::RepositoryIdentity;

/// Process-wide set of repositories with a run in flight.
#[derive(Debug, Clone, Default)]
pub struct RunLeases {
    held: Arc<Mutex<HashSet<RepositoryIdentity>>>,
}

impl RunLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `repository`, or `None` if a run already holds it.
    pub fn try_acquire(&self, repository: &RepositoryIdentity) -> Option<RunLease> {
        if !self.lock().insert(repository.clone()) {
            return None;
        }
        Some(RunLease {
            leases: self.clone(),
            repository: repository.clone(),
        })
    }

    pub fn is_held(&self, repository: &RepositoryIdentity) -> bool {
        self.lock().contains(repository)
    }

    /// Repositories currently leased, sorted.
    pub fn in_flight(&self) -> Vec<RepositoryIdentity> {
        let mut held: Vec<_> = self.lock().iter().cloned().collect();
        held.sort();
        held
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<RepositoryIdentity>> {
        // The set stays consistent even if a holder panicked mid-run.
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Released when dropped.
#[derive(Debug)]
pub struct RunLease {
    leases: RunLeases,
    repository: RepositoryIdentity,
}

impl Drop for RunLease {
    fn drop(&mut self) {
        self.leases.lock().remove(&self.repository);
    }
}
