// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use super::{ErrorCode, GadgetError};

/// Outcome of a failed per-request workflow.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkflowError {
    /// Every task failure observed during the request, in completion order.
    #[error("{} workflow task(s) failed: {}", .failures.len(), join_failures(.failures))]
    Failed { failures: Vec<GadgetError> },
    /// Jobs still waiting on tokens no task will ever produce.
    #[error("workflow stalled with unsatisfiable jobs: {}", .pending.join(", "))]
    Unsatisfiable { pending: Vec<String> },
}

impl WorkflowError {
    pub fn single(error: GadgetError) -> Self {
        WorkflowError::Failed {
            failures: vec![error],
        }
    }

    pub fn failures(&self) -> &[GadgetError] {
        match self {
            WorkflowError::Failed { failures } => failures,
            WorkflowError::Unsatisfiable { .. } => &[],
        }
    }

    /// Codes of the component failures; `Unsatisfiable` reports an internal error.
    pub fn codes(&self) -> Vec<ErrorCode> {
        match self {
            WorkflowError::Failed { failures } => failures.iter().map(|f| f.code).collect(),
            WorkflowError::Unsatisfiable { .. } => vec![ErrorCode::InternalServerError],
        }
    }
}

impl From<GadgetError> for WorkflowError {
    fn from(error: GadgetError) -> Self {
        WorkflowError::single(error)
    }
}

fn join_failures(failures: &[GadgetError]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_lists_every_failure() {
        let err = WorkflowError::Failed {
            failures: vec![
                GadgetError::retrieval("bundle a"),
                GadgetError::malformed("bundle b"),
            ],
        };
        let text = err.to_string();
        assert!(text.starts_with("2 workflow task(s) failed"));
        assert!(text.contains("bundle a"));
        assert!(text.contains("bundle b"));
        assert_eq!(
            err.codes(),
            vec![ErrorCode::FailedToRetrieveContent, ErrorCode::MalformedXmlDocument]
        );
    }
}
