//! Shared in-memory job store.
//!
//! The store is the only state shared between the worker and readers. Every
//! update is applied to a copy of the record which then replaces the stored
//! one under the write lock, so a reader sees either the old or the new
//! record, never a half-applied one.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;

use super::job::Job;
use super::status::JobSnapshot;

/// Cloneable handle to the job records.
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<String, Job>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job. An existing record with the same id is replaced.
    pub fn insert(&self, job: Job) {
        self.jobs.write().insert(job.id.clone(), job);
    }

    /// Copy of a job record.
    pub fn get(&self, id: &str) -> Option<Job> {
        self.jobs.read().get(id).cloned()
    }

    /// Apply `f` to a copy of the record and store the result.
    ///
    /// Returns the updated record, or `None` if the id is unknown.
    pub fn update<F>(&self, id: &str, f: F) -> Option<Job>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.write();
        let mut next = jobs.get(id)?.clone();
        f(&mut next);
        jobs.insert(id.to_string(), next.clone());
        Some(next)
    }

    /// Read-only status projection of one job.
    pub fn snapshot(&self, id: &str) -> Option<JobSnapshot> {
        let now = Utc::now();
        self.jobs
            .read()
            .get(id)
            .map(|job| JobSnapshot::from_job(job, now))
    }

    /// Snapshots of every job, oldest first.
    pub fn list(&self) -> Vec<JobSnapshot> {
        let now = Utc::now();
        let jobs = self.jobs.read();
        let mut all: Vec<&Job> = jobs.values().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        all.into_iter()
            .map(|job| JobSnapshot::from_job(job, now))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::job::{JobPaths, JobState};

    fn job(id: &str) -> Job {
        Job::new_upload(id, JobPaths::new("/tmp/x", ".mp4", "en", "ru"), "a.mp4")
    }

    #[test]
    fn test_insert_and_get() {
        let store = JobStore::new();
        assert!(store.list().is_empty());
        store.insert(job("a"));
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.get("a").unwrap().id, "a");
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_update_replaces_record() {
        let store = JobStore::new();
        store.insert(job("a"));

        let updated = store
            .update("a", |job| {
                job.state = JobState::Processing;
                job.advance_progress(10);
            })
            .unwrap();
        assert_eq!(updated.progress, 10);

        let stored = store.get("a").unwrap();
        assert_eq!(stored.state, JobState::Processing);
        assert_eq!(stored.progress, 10);
    }

    #[test]
    fn test_update_unknown_job() {
        let store = JobStore::new();
        assert!(store.update("nope", |job| job.progress = 50).is_none());
    }

    #[test]
    fn test_handles_share_state() {
        let store = JobStore::new();
        let other = store.clone();
        store.insert(job("a"));
        assert!(other.get("a").is_some());
    }

    #[test]
    fn test_list_is_ordered_by_creation() {
        let store = JobStore::new();
        let mut first = job("b");
        let mut second = job("a");
        second.created_at = first.created_at + chrono::Duration::seconds(1);
        first.created_at -= chrono::Duration::seconds(1);
        store.insert(second);
        store.insert(first);

        let ids: Vec<String> = store.list().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_concurrent_readers_see_whole_updates() {
        let store = JobStore::new();
        store.insert(job("a"));

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..=100u8 {
                    store.update("a", |job| {
                        job.advance_progress(i);
                        job.display_name = format!("name-{i}");
                    });
                }
            })
        };

        for _ in 0..200 {
            let job = store.get("a").unwrap();
            if job.display_name.starts_with("name-") {
                assert_eq!(job.display_name, format!("name-{}", job.progress));
            }
        }
        writer.join().unwrap();
    }
}
