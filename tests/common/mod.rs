//! Shared fixtures for the dispatch integration tests.

use std::sync::{Arc, Mutex};

/// Order-sensitive log of which callbacks fired, cloned into each
/// closure a rule owns.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: &str) {
        self.0.lock().unwrap().push(entry.to_owned());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}
