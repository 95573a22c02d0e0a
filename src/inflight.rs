use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Names currently being processed. Process-local and advisory only: it
/// deduplicates submissions, it does not make them exclusive.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    names: Arc<Mutex<HashSet<String>>>,
}

/// Removes its name from the set when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    names: Arc<Mutex<HashSet<String>>>,
    name: String,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when `name` is already in flight.
    pub fn try_acquire(&self, name: &str) -> Option<InFlightGuard> {
        if !lock(&self.names).insert(name.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            names: Arc::clone(&self.names),
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        lock(&self.names).contains(name)
    }

    pub fn len(&self) -> usize {
        lock(&self.names).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl InFlightGuard {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.names).remove(&self.name);
    }
}

// A poisoned set is still a valid set.
fn lock(names: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    names.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
