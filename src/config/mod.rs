// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod container;
mod loader;

pub mod consts;

pub use container::ContainerConfig;
pub use loader::{
    load_and_validate_config, load_config, CacheConfig, ContainerSourceConfig, FeatureSourceConfig,
    FetchConfig, LockedDomainConfig, RewriteConfig, ServerConfig, WorkflowConfig,
};
