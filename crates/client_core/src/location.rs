//! The URL query string as an injected key-value store with navigation history.

use std::sync::{Mutex, MutexGuard, PoisonError};

use url::Url;

/// Externally owned home of the list view's query string.
///
/// `read` returns the current query without the leading `?`; `write`
/// records a new one. Implementations decide whether a write becomes a new
/// history entry.
pub trait QueryStore: Send + Sync {
    fn read(&self) -> String;
    fn write(&self, query: &str);
}

/// In-memory browser-style history of query strings.
#[derive(Debug)]
pub struct MemoryLocation {
    history: Mutex<History>,
}

#[derive(Debug)]
struct History {
    entries: Vec<String>,
    cursor: usize,
}

impl MemoryLocation {
    pub fn new() -> Self {
        Self::with_query("")
    }

    pub fn with_query(query: &str) -> Self {
        Self {
            history: Mutex::new(History {
                entries: vec![normalize(query).to_string()],
                cursor: 0,
            }),
        }
    }

    /// Seeds the history from the query part of a full URL.
    pub fn from_url(url: &str) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(url)?;
        Ok(Self::with_query(parsed.query().unwrap_or_default()))
    }

    /// Moves one entry back. Returns `false` at the start of history.
    pub fn back(&self) -> bool {
        let mut history = self.lock();
        if history.cursor == 0 {
            return false;
        }
        history.cursor -= 1;
        true
    }

    pub fn forward(&self) -> bool {
        let mut history = self.lock();
        if history.cursor + 1 >= history.entries.len() {
            return false;
        }
        history.cursor += 1;
        true
    }

    pub fn history_len(&self) -> usize {
        self.lock().entries.len()
    }

    fn lock(&self) -> MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryLocation {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryStore for MemoryLocation {
    fn read(&self) -> String {
        let history = self.lock();
        history.entries[history.cursor].clone()
    }

    fn write(&self, query: &str) {
        let query = normalize(query);
        let mut history = self.lock();
        if history.entries[history.cursor] == query {
            return;
        }
        let keep = history.cursor + 1;
        history.entries.truncate(keep);
        history.entries.push(query.to_string());
        history.cursor = keep;
    }
}

fn normalize(query: &str) -> &str {
    query.strip_prefix('?').unwrap_or(query)
}
