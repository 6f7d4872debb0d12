use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::resolver::Stage;

/// Maximum number of attempts retained in the ring buffer.
const ATTEMPT_LOG_CAPACITY: usize = 200;

/// One catalog search issued by the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchAttempt {
    pub stage: Stage,
    pub query: String,
    pub year: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

/// Bounded ring buffer of recent search attempts.
#[derive(Debug)]
pub struct AttemptLog {
    entries: VecDeque<SearchAttempt>,
}

impl Default for AttemptLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AttemptLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(ATTEMPT_LOG_CAPACITY),
        }
    }

    /// Record an attempt, evicting the oldest if at capacity.
    pub fn push(&mut self, stage: Stage, query: &str, year: Option<u32>) {
        if self.entries.len() >= ATTEMPT_LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(SearchAttempt {
            stage,
            query: query.to_string(),
            year,
            timestamp: Utc::now(),
        });
    }

    /// Return a snapshot of all entries (newest last).
    pub fn snapshot(&self) -> Vec<SearchAttempt> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Thread-safe handle to the attempt log.
pub type SharedAttemptLog = Arc<Mutex<AttemptLog>>;

/// Create a new shared attempt log.
pub fn shared_attempt_log() -> SharedAttemptLog {
    Arc::new(Mutex::new(AttemptLog::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order() {
        let mut log = AttemptLog::new();
        log.push(Stage::Real, "Anime Title 12", None);
        log.push(Stage::Partial(1), "Anime Title", Some(2021));

        let entries = log.snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].stage, Stage::Real);
        assert_eq!(entries[1].query, "Anime Title");
        assert_eq!(entries[1].year, Some(2021));
        assert!(entries[0].timestamp <= entries[1].timestamp);
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let mut log = AttemptLog::new();
        for i in 0..ATTEMPT_LOG_CAPACITY + 5 {
            log.push(Stage::Real, &format!("q{i}"), None);
        }
        assert_eq!(log.len(), ATTEMPT_LOG_CAPACITY);
        assert_eq!(log.snapshot()[0].query, "q5");

        log.clear();
        assert!(log.is_empty());
    }
}
