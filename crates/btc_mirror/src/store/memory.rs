use std::io;
use std::sync::{Mutex, PoisonError};

use super::Store;
use crate::state::StateDelta;

/// In-memory commit log, for tests and throwaway runs.
#[derive(Default)]
pub struct MemoryStore {
    commits: Mutex<Vec<StateDelta>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.commits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemoryStore {
    fn append(&self, delta: &StateDelta) -> io::Result<()> {
        self.commits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(delta.clone());
        Ok(())
    }

    fn load(&self) -> io::Result<Vec<StateDelta>> {
        Ok(self
            .commits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}
