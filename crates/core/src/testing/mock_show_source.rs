//! Mock show source for testing.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::source::{Show, ShowSource, SourceError};

/// Returns a configurable show list.
#[derive(Debug, Default)]
pub struct MockShowSource {
    shows: Mutex<Vec<Show>>,
    next_error: Mutex<Option<SourceError>>,
    calls: AtomicUsize,
}

impl MockShowSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_shows(&self, shows: Vec<Show>) {
        *self.shows.lock() = shows;
    }

    /// Configure the next call to fail with the given error.
    pub fn set_next_error(&self, error: SourceError) {
        *self.next_error.lock() = Some(error);
    }

    /// Number of `list_shows` calls.
    pub fn list_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ShowSource for MockShowSource {
    async fn list_shows(&self) -> Result<Vec<Show>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.next_error.lock().take() {
            return Err(error);
        }
        Ok(self.shows.lock().clone())
    }
}
