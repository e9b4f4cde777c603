// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod renderer;
pub mod server;
pub mod workflow;

pub use renderer::{GadgetRenderer, RenderedGadget};
pub use server::GadgetServer;
pub use workflow::{
    JobOutput, WorkflowDependency, WorkflowDependencyType, WorkflowJob, WorkflowReport, WorkflowScheduler,
};
