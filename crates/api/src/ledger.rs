//! Running-job ledger: which queued jobs have been published and not yet
//! reported back by a worker.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

pub struct Ledger {
    entries: Mutex<HashMap<String, Instant>>,
    lease: Option<Duration>,
}

impl Ledger {
    /// `lease` bounds how long an entry may stay without a callback before it
    /// is considered leaked. `None` keeps entries until their callback.
    pub fn new(lease: Option<Duration>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            lease,
        }
    }

    /// Record `job_id` as running. Returns `false` if it is already running
    /// and its lease has not expired.
    pub fn try_insert(&self, job_id: &str) -> bool {
        let mut entries = self.lock();
        let now = Instant::now();
        if let Some(started) = entries.get(job_id) {
            let age = now.duration_since(*started);
            match self.lease {
                Some(lease) if age >= lease => {
                    tracing::warn!(
                        job_id,
                        age_secs = age.as_secs(),
                        "Ledger entry outlived its lease, assuming the worker died",
                    );
                }
                _ => return false,
            }
        }
        entries.insert(job_id.to_string(), now);
        true
    }

    /// Remove `job_id`, returning how long it was running.
    pub fn complete(&self, job_id: &str) -> Option<Duration> {
        self.lock()
            .remove(job_id)
            .map(|started| started.elapsed())
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.lock().contains_key(job_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Instant>> {
        // Entries stay consistent even if a holder panicked mid-call.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_insert_is_rejected() {
        let ledger = Ledger::new(None);
        assert!(ledger.try_insert("predict:1"));
        assert!(!ledger.try_insert("predict:1"));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn complete_frees_the_slot() {
        let ledger = Ledger::new(None);
        ledger.try_insert("predict:1");

        assert!(ledger.complete("predict:1").is_some());
        assert!(ledger.complete("predict:1").is_none());
        assert!(ledger.try_insert("predict:1"));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_replaced() {
        let ledger = Ledger::new(Some(Duration::from_secs(60)));
        ledger.try_insert("train_model:7");

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(!ledger.try_insert("train_model:7"));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(ledger.try_insert("train_model:7"));
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn without_lease_entries_never_expire() {
        let ledger = Ledger::new(None);
        ledger.try_insert("predict:2");

        tokio::time::advance(Duration::from_secs(7 * 24 * 3600)).await;

        assert!(!ledger.try_insert("predict:2"));
    }
}
