// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the per-request workflow scheduler.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A workflow run is starting.
///
/// # Log Level
/// `debug!`
pub struct WorkflowStarted<'a> {
    pub gadget: &'a str,
    pub initial_jobs: usize,
    pub max_concurrency: usize,
}

impl Display for WorkflowStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting workflow for {}: {} initial jobs, max_concurrency={}",
            self.gadget, self.initial_jobs, self.max_concurrency
        )
    }
}

impl StructuredLog for WorkflowStarted<'_> {
    fn log(&self) {
        tracing::debug!(
            gadget = self.gadget,
            initial_jobs = self.initial_jobs,
            max_concurrency = self.max_concurrency,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "workflow",
            span_name = name,
            gadget = self.gadget,
            max_concurrency = self.max_concurrency,
        )
    }
}

/// A job's required tokens are all done and it has been submitted.
///
/// # Log Level
/// `trace!`
pub struct JobSubmitted<'a> {
    pub job: &'a str,
    pub running: usize,
}

impl Display for JobSubmitted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Submitted job {} ({} running)", self.job, self.running)
    }
}

impl StructuredLog for JobSubmitted<'_> {
    fn log(&self) {
        tracing::trace!(job = self.job, running = self.running, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!("job", span_name = name, job = self.job)
    }
}

/// A job failed; pending jobs are discarded.
///
/// # Log Level
/// `warn!`
pub struct JobFailed<'a> {
    pub job: &'a str,
    pub error: &'a dyn std::error::Error,
    pub discarded: usize,
}

impl Display for JobFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Job {} failed: {}; discarding {} pending job(s)",
            self.job, self.error, self.discarded
        )
    }
}

impl StructuredLog for JobFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            job = self.job,
            error = %self.error,
            discarded = self.discarded,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("job_failed", span_name = name, job = self.job)
    }
}

/// A workflow run finished.
///
/// # Log Level
/// `debug!`
pub struct WorkflowCompleted<'a> {
    pub gadget: &'a str,
    pub completed: usize,
    pub failures: usize,
    pub duration: std::time::Duration,
}

impl Display for WorkflowCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Workflow for {} finished: {} jobs completed, {} failed in {:?}",
            self.gadget, self.completed, self.failures, self.duration
        )
    }
}

impl StructuredLog for WorkflowCompleted<'_> {
    fn log(&self) {
        tracing::debug!(
            gadget = self.gadget,
            completed = self.completed,
            failures = self.failures,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "workflow_completed",
            span_name = name,
            gadget = self.gadget,
            duration = ?self.duration,
        )
    }
}
