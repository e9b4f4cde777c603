// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-request job scheduler.
//!
//! Each [`WorkflowJob`] names the [`WorkflowDependency`] tokens it needs and
//! the one token it produces. The scheduler loop repeatedly:
//!
//! 1. submits every pending job whose required tokens are all done (up to the
//!    concurrency limit),
//! 2. waits for the next job to complete,
//! 3. records the completed job's token and queues any follow-up jobs it
//!    returned,
//!
//! until nothing is pending or running.
//!
//! # Failure semantics
//!
//! The first failure discards every pending job, so nothing that required
//! the failed job's token ever runs. Jobs already in flight are not
//! cancelled: they finish and their outcomes are still collected, and every
//! failure seen is reported together in [`WorkflowError::Failed`].
//!
//! ```text
//! cache-load -> url-fetch -> enqueue-features -> prepare(f) -> process(f)
//!                                                            ^
//!                                             process(deps of f)
//! ```

use futures::future::BoxFuture;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::errors::{GadgetError, WorkflowError};
use crate::observability::messages::workflow::{JobFailed, JobSubmitted, WorkflowCompleted, WorkflowStarted};
use crate::observability::messages::StructuredLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowDependencyType {
    Core,
    FeaturePrepare,
    FeatureProcess,
}

/// A completed unit of work that other jobs can wait on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkflowDependency {
    pub kind: WorkflowDependencyType,
    pub id: String,
}

impl WorkflowDependency {
    pub fn core(id: &str) -> Self {
        Self {
            kind: WorkflowDependencyType::Core,
            id: id.to_string(),
        }
    }

    pub fn prepare(feature: &str) -> Self {
        Self {
            kind: WorkflowDependencyType::FeaturePrepare,
            id: feature.to_string(),
        }
    }

    pub fn process(feature: &str) -> Self {
        Self {
            kind: WorkflowDependencyType::FeatureProcess,
            id: feature.to_string(),
        }
    }
}

impl fmt::Display for WorkflowDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            WorkflowDependencyType::Core => "CORE",
            WorkflowDependencyType::FeaturePrepare => "FEATURE_PREPARE",
            WorkflowDependencyType::FeatureProcess => "FEATURE_PROCESS",
        };
        write!(f, "{kind}:{}", self.id)
    }
}

/// What a job yields on success: follow-up jobs to schedule.
pub type JobOutput = Result<Vec<WorkflowJob>, GadgetError>;

pub struct WorkflowJob {
    name: String,
    requires: HashSet<WorkflowDependency>,
    satisfies: WorkflowDependency,
    task: BoxFuture<'static, JobOutput>,
}

impl WorkflowJob {
    pub fn new<F>(name: impl Into<String>, satisfies: WorkflowDependency, task: F) -> Self
    where
        F: Future<Output = JobOutput> + Send + 'static,
    {
        Self {
            name: name.into(),
            requires: HashSet::new(),
            satisfies,
            task: Box::pin(task),
        }
    }

    pub fn requires(mut self, dependency: WorkflowDependency) -> Self {
        self.requires.insert(dependency);
        self
    }

    pub fn requires_all<I: IntoIterator<Item = WorkflowDependency>>(mut self, dependencies: I) -> Self {
        self.requires.extend(dependencies);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn satisfies(&self) -> &WorkflowDependency {
        &self.satisfies
    }

    fn is_ready(&self, done: &HashSet<WorkflowDependency>) -> bool {
        self.requires.is_subset(done)
    }
}

impl fmt::Debug for WorkflowJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowJob")
            .field("name", &self.name)
            .field("requires", &self.requires)
            .field("satisfies", &self.satisfies)
            .finish_non_exhaustive()
    }
}

/// A successful run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowReport {
    /// Job names in completion order.
    pub completed: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct WorkflowScheduler {
    max_concurrency: usize,
}

impl WorkflowScheduler {
    /// `max_concurrency` is clamped to at least 1.
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Runs `jobs` and everything they spawn to completion.
    ///
    /// # Errors
    /// `Failed` with every task error when any job fails; `Unsatisfiable`
    /// when jobs remain whose tokens nothing produced.
    pub async fn run(&self, label: &str, jobs: Vec<WorkflowJob>) -> Result<WorkflowReport, WorkflowError> {
        let start_msg = WorkflowStarted {
            gadget: label,
            initial_jobs: jobs.len(),
            max_concurrency: self.max_concurrency,
        };
        let span = start_msg.span("workflow");
        span.in_scope(|| start_msg.log());
        self.run_jobs(label, jobs).instrument(span).await
    }

    async fn run_jobs(&self, label: &str, jobs: Vec<WorkflowJob>) -> Result<WorkflowReport, WorkflowError> {
        let started = Instant::now();
        let mut pending = jobs;
        let mut done: HashSet<WorkflowDependency> = HashSet::new();
        let mut running: JoinSet<(String, WorkflowDependency, JobOutput)> = JoinSet::new();
        let mut failures: Vec<GadgetError> = Vec::new();
        let mut report = WorkflowReport::default();

        loop {
            if failures.is_empty() {
                let mut i = 0;
                while i < pending.len() && running.len() < self.max_concurrency {
                    if !pending[i].is_ready(&done) {
                        i += 1;
                        continue;
                    }
                    let job = pending.remove(i);
                    JobSubmitted {
                        job: &job.name,
                        running: running.len() + 1,
                    }
                    .log();
                    let WorkflowJob {
                        name, satisfies, task, ..
                    } = job;
                    running.spawn(
                        async move {
                            let output = task.await;
                            (name, satisfies, output)
                        }
                        .in_current_span(),
                    );
                }
            }

            let Some(joined) = running.join_next().await else {
                break;
            };
            match joined {
                Ok((name, satisfies, Ok(follow_ups))) => {
                    done.insert(satisfies);
                    report.completed.push(name);
                    if failures.is_empty() {
                        pending.extend(follow_ups);
                    }
                }
                Ok((name, _, Err(error))) => {
                    JobFailed {
                        job: &name,
                        error: &error,
                        discarded: pending.len(),
                    }
                    .log();
                    failures.push(error);
                    pending.clear();
                }
                Err(join_error) => {
                    let error = GadgetError::internal(format!("workflow job aborted: {join_error}"));
                    JobFailed {
                        job: "<unknown>",
                        error: &error,
                        discarded: pending.len(),
                    }
                    .log();
                    failures.push(error);
                    pending.clear();
                }
            }
        }

        WorkflowCompleted {
            gadget: label,
            completed: report.completed.len(),
            failures: failures.len(),
            duration: started.elapsed(),
        }
        .log();

        if !failures.is_empty() {
            return Err(WorkflowError::Failed { failures });
        }
        if !pending.is_empty() {
            return Err(WorkflowError::Unsatisfiable {
                pending: pending.into_iter().map(|job| job.name).collect(),
            });
        }
        Ok(report)
    }
}

impl Default for WorkflowScheduler {
    fn default() -> Self {
        let concurrency = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::new(concurrency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recording_job(log: &Log, name: &str, delay_ms: u64) -> WorkflowJob {
        let log = Arc::clone(log);
        let owned = name.to_string();
        WorkflowJob::new(name, WorkflowDependency::core(name), async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            log.lock().unwrap().push(owned);
            Ok(Vec::new())
        })
    }

    fn failing_job(name: &str, delay_ms: u64) -> WorkflowJob {
        let message = format!("{name} exploded");
        WorkflowJob::new(name, WorkflowDependency::core(name), async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Err(GadgetError::retrieval(message))
        })
    }

    #[tokio::test]
    async fn linear_chain_runs_in_dependency_order() {
        let log: Log = Arc::default();
        let jobs = vec![
            recording_job(&log, "c", 0).requires(WorkflowDependency::core("b")),
            recording_job(&log, "b", 5).requires(WorkflowDependency::core("a")),
            recording_job(&log, "a", 10),
        ];
        let report = WorkflowScheduler::new(4).run("chain", jobs).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(report.completed, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn failure_prevents_dependents_from_running() {
        let log: Log = Arc::default();
        let jobs = vec![
            failing_job("a", 0),
            recording_job(&log, "b", 0).requires(WorkflowDependency::core("a")),
            recording_job(&log, "c", 0).requires(WorkflowDependency::core("b")),
        ];
        let err = WorkflowScheduler::new(4).run("fail", jobs).await.unwrap_err();
        assert_eq!(err.codes(), vec![ErrorCode::FailedToRetrieveContent]);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn in_flight_jobs_finish_after_a_failure() {
        let log: Log = Arc::default();
        let slow_log = Arc::clone(&log);
        let follow_up_log = Arc::clone(&log);
        let slow = WorkflowJob::new("slow", WorkflowDependency::core("slow"), async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            slow_log.lock().unwrap().push("slow".to_string());
            let follow_up = WorkflowJob::new("after-slow", WorkflowDependency::core("after-slow"), async move {
                follow_up_log.lock().unwrap().push("after-slow".to_string());
                Ok(Vec::new())
            });
            Ok(vec![follow_up])
        });
        let jobs = vec![failing_job("fast", 0), slow];

        let err = WorkflowScheduler::new(4).run("partial", jobs).await.unwrap_err();
        assert_eq!(err.failures().len(), 1);
        assert_eq!(*log.lock().unwrap(), vec!["slow"]);
    }

    #[tokio::test]
    async fn concurrent_failures_are_aggregated() {
        let jobs = vec![failing_job("a", 10), failing_job("b", 10)];
        let err = WorkflowScheduler::new(4).run("multi", jobs).await.unwrap_err();
        assert_eq!(err.failures().len(), 2);
        assert!(err.to_string().contains("a exploded"));
        assert!(err.to_string().contains("b exploded"));
    }

    #[tokio::test]
    async fn follow_up_jobs_are_scheduled() {
        let log: Log = Arc::default();
        let inner_log = Arc::clone(&log);
        let parent = WorkflowJob::new("parent", WorkflowDependency::core("parent"), async move {
            Ok(vec![
                recording_job(&inner_log, "child-2", 0).requires(WorkflowDependency::core("child-1")),
                recording_job(&inner_log, "child-1", 0),
            ])
        });
        let report = WorkflowScheduler::new(2).run("dynamic", vec![parent]).await.unwrap();
        assert_eq!(report.completed, vec!["parent", "child-1", "child-2"]);
    }

    #[tokio::test]
    async fn unsatisfiable_jobs_are_reported() {
        let log: Log = Arc::default();
        let jobs = vec![
            recording_job(&log, "a", 0),
            recording_job(&log, "orphan", 0).requires(WorkflowDependency::prepare("never")),
        ];
        let err = WorkflowScheduler::new(2).run("stall", jobs).await.unwrap_err();
        assert_eq!(
            err,
            WorkflowError::Unsatisfiable {
                pending: vec!["orphan".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn respects_concurrency_limit() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let jobs = (0..6)
            .map(|i| {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                let name = format!("job-{i}");
                WorkflowJob::new(name.clone(), WorkflowDependency::core(&name), async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(Vec::new())
                })
            })
            .collect();
        let report = WorkflowScheduler::new(2).run("limited", jobs).await.unwrap();
        assert_eq!(report.completed.len(), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn dependency_display() {
        assert_eq!(WorkflowDependency::process("rpc").to_string(), "FEATURE_PROCESS:rpc");
        assert_eq!(WorkflowScheduler::new(0).max_concurrency(), 1);
    }

    #[tokio::test]
    async fn jobs_run_inside_the_workflow_span() {
        let _subscriber = tracing::subscriber::set_default(tracing_subscriber::registry());
        let seen: Arc<Mutex<Option<String>>> = Arc::default();
        let recorder = Arc::clone(&seen);
        let job = WorkflowJob::new("a", WorkflowDependency::core("a"), async move {
            let current = tracing::Span::current();
            *recorder.lock().unwrap() = current.metadata().map(|m| m.name().to_string());
            Ok(Vec::new())
        });
        WorkflowScheduler::new(1).run("spanned", vec![job]).await.unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("workflow"));
    }
}
