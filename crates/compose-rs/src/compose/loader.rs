//! Concurrent fragment loading with deadline tracking.
//!
//! [`FragmentLoader`] runs one async fetch per fragment on the tokio
//! runtime and collects the results into a [`LoadedData`] bag. Each fetch has
//! a per-fragment timeout and the whole load has a global deadline. Fetches
//! that fail, time out or miss the deadline leave their fragment absent, so
//! sections reading it see missing data and fall back.
//!
//! # Example
//!
//! ```no_run
//! use compose_rs::compose::loader::FragmentLoader;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! # async fn demo() {
//! let loaded = FragmentLoader::new("caller")
//!     .deadline(Duration::from_secs(5))
//!     .value("caller", json!({"id": "c1", "name": "Ada"}))
//!     .fragment("memories", async { Ok(json!([{"key": "pet", "value": "cat"}])) })
//!     .load()
//!     .await;
//! assert_eq!(loaded.record_count("memories"), 1);
//! # }
//! ```

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::context::LoadedData;

type FetchFuture = Pin<Box<dyn Future<Output = Result<Value, String>> + Send>>;

struct FetchTask {
    name: String,
    future: FetchFuture,
}

/// Declarative concurrent loader for named fragments.
pub struct FragmentLoader {
    subject_key: String,
    tasks: Vec<FetchTask>,
    deadline: Duration,
    fragment_timeout: Duration,
}

impl FragmentLoader {
    /// `subject_key` names the fragment that holds the subject record.
    pub fn new(subject_key: impl Into<String>) -> Self {
        Self {
            subject_key: subject_key.into(),
            tasks: Vec::new(),
            deadline: Duration::from_secs(30),
            fragment_timeout: Duration::from_secs(10),
        }
    }

    /// Global deadline for the whole load. Fragments still pending when it
    /// passes are abandoned.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn fragment_timeout(mut self, timeout: Duration) -> Self {
        self.fragment_timeout = timeout;
        self
    }

    /// Register an async fetch. An `Err` is logged and the fragment is left
    /// out.
    pub fn fragment<F>(mut self, name: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = Result<Value, String>> + Send + 'static,
    {
        let name = name.into();
        let timeout = self.fragment_timeout;
        let label = name.clone();
        let wrapped = Box::pin(async move {
            match tokio::time::timeout(timeout, future).await {
                Ok(result) => result,
                Err(_) => Err(format!("{label}: timed out after {}ms", timeout.as_millis())),
            }
        });
        self.tasks.push(FetchTask { name, future: wrapped });
        self
    }

    /// Register a value that is already in memory.
    pub fn value(self, name: impl Into<String>, value: Value) -> Self {
        self.fragment(name, async move { Ok(value) })
    }

    /// Run every fetch concurrently and collect the results.
    pub async fn load(self) -> LoadedData {
        let Self {
            subject_key,
            tasks,
            deadline,
            ..
        } = self;

        let started = Instant::now();
        let total = tasks.len();
        let names: Vec<String> = tasks.iter().map(|t| t.name.clone()).collect();
        let mut pending: HashSet<usize> = (0..total).collect();
        let mut slots: Vec<Option<Value>> = vec![None; total];

        info!("[load] fetching {total} fragment(s)");

        let mut js: JoinSet<(usize, Result<Value, String>)> = JoinSet::new();
        for (idx, task) in tasks.into_iter().enumerate() {
            let future = task.future;
            js.spawn(async move { (idx, future.await) });
        }

        let deadline_at = tokio::time::Instant::now() + deadline;
        loop {
            let remaining = deadline_at.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, js.join_next()).await {
                Ok(Some(Ok((idx, result)))) => {
                    pending.remove(&idx);
                    match result {
                        Ok(value) => {
                            let done = total - pending.len();
                            debug!("[load] {} done ({done}/{total})", names[idx]);
                            slots[idx] = Some(value);
                        }
                        Err(e) => warn!("[load] {} failed: {e}", names[idx]),
                    }
                }
                Ok(Some(Err(e))) => warn!("[load] fetch task panicked: {e}"),
                Ok(None) => break,
                Err(_) => {
                    let mut abandoned: Vec<&str> =
                        pending.iter().map(|&i| names[i].as_str()).collect();
                    abandoned.sort_unstable();
                    warn!("[load] deadline reached; abandoning: {}", abandoned.join(", "));
                    break;
                }
            }
        }
        js.abort_all();

        // Registration order decides which duplicate name wins.
        let mut fragments = Map::new();
        for (name, slot) in names.into_iter().zip(slots) {
            if let Some(value) = slot {
                fragments.insert(name, value);
            }
        }

        let load_time = started.elapsed();
        info!(
            "[load] {} of {total} fragment(s) in {:.1}ms",
            fragments.len(),
            load_time.as_secs_f64() * 1000.0
        );
        LoadedData::from_fragments(fragments, &subject_key).with_load_time(load_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn collects_all_fragments_and_splits_subject() {
        let loaded = FragmentLoader::new("caller")
            .value("caller", json!({"id": "c1"}))
            .fragment("memories", async { Ok(json!([1, 2])) })
            .fragment("goals", async { Ok(json!([])) })
            .load()
            .await;

        assert_eq!(loaded.subject(), &json!({"id": "c1"}));
        assert_eq!(loaded.record_count("memories"), 2);
        assert!(loaded.fragment("goals").is_some());
        assert!(loaded.fragment("caller").is_none());
    }

    #[tokio::test]
    async fn failed_fetch_leaves_fragment_absent() {
        let loaded = FragmentLoader::new("caller")
            .value("caller", json!({"id": "c1"}))
            .fragment("memories", async { Err("connection refused".to_string()) })
            .load()
            .await;
        assert!(loaded.fragment("memories").is_none());
    }

    #[tokio::test]
    async fn slow_fetch_times_out() {
        let loaded = FragmentLoader::new("caller")
            .fragment_timeout(Duration::from_millis(50))
            .value("caller", json!({"id": "c1"}))
            .fragment("slow", async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(json!("late"))
            })
            .load()
            .await;
        assert!(loaded.fragment("slow").is_none());
        assert_eq!(loaded.subject()["id"], "c1");
    }

    #[tokio::test]
    async fn global_deadline_abandons_pending() {
        let loaded = FragmentLoader::new("caller")
            .deadline(Duration::from_millis(100))
            .fragment_timeout(Duration::from_secs(60))
            .value("fast", json!(7))
            .fragment("very-slow", async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(json!("never"))
            })
            .load()
            .await;
        assert_eq!(loaded.fragment("fast"), Some(&json!(7)));
        assert!(loaded.fragment("very-slow").is_none());
        assert!(loaded.load_time() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn empty_loader_yields_empty_bag() {
        let loaded = FragmentLoader::new("caller").load().await;
        assert!(loaded.subject().is_null());
        assert!(loaded.fragments().is_empty());
    }
}
