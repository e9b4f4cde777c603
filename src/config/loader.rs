// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::*;
use crate::errors::ConfigError;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level server configuration.
///
/// Every section is optional; omitted values fall back to the constants in
/// [`crate::config::consts`].
///
/// # Example
/// ```yaml
/// features:
///   directories: ["features"]
/// containers:
///   paths: ["config/container.json"]
/// workflow:
///   max_concurrency: 8
/// rewrite:
///   proxy_base: "http://proxy.example.com/gadgets/proxy"
///   include_tags: [img, script]
/// blacklist:
///   - "^https?://evil\\.example\\.com/"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub features: FeatureSourceConfig,
    pub containers: ContainerSourceConfig,
    pub fetch: FetchConfig,
    pub spec_cache: CacheConfig,
    pub workflow: WorkflowConfig,
    pub rewrite: RewriteConfig,
    pub locked_domain: LockedDomainConfig,
    /// Regular expressions matched against gadget spec URLs
    pub blacklist: Vec<String>,
    pub iframe_base: String,
    pub js_base: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            features: FeatureSourceConfig::default(),
            containers: ContainerSourceConfig::default(),
            fetch: FetchConfig::default(),
            spec_cache: CacheConfig::default(),
            workflow: WorkflowConfig::default(),
            rewrite: RewriteConfig::default(),
            locked_domain: LockedDomainConfig::default(),
            blacklist: Vec::new(),
            iframe_base: DEFAULT_IFRAME_BASE.to_string(),
            js_base: DEFAULT_JS_BASE.to_string(),
        }
    }
}

/// Directories scanned recursively for `feature.xml` descriptors.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeatureSourceConfig {
    pub directories: Vec<PathBuf>,
}

/// Container JSON files, or directories holding them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContainerSourceConfig {
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_seconds: u64,
    pub max_object_size: usize,
    pub cache: CacheConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_FETCH_TIMEOUT_SECONDS,
            max_object_size: DEFAULT_MAX_OBJECT_SIZE,
            cache: CacheConfig::default(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: u64,
    pub ttl_seconds: u64,
    pub negative_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            negative_ttl_seconds: DEFAULT_NEGATIVE_TTL_SECONDS,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn negative_ttl(&self) -> Duration {
        Duration::from_secs(self.negative_ttl_seconds)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub max_concurrency: Option<usize>,
}

impl WorkflowConfig {
    /// Configured limit, or the number of available cores (4 if unknown).
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }
}

/// Server-wide defaults for content rewriting. Gadgets may override the
/// patterns, tags and expiry through the `content-rewrite` feature.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    pub proxy_base: String,
    pub concat_base: String,
    pub include_urls: String,
    pub exclude_urls: String,
    pub include_tags: Vec<String>,
    pub expires_seconds: u64,
    pub concat: bool,
    pub css: bool,
    pub image_attributes: bool,
    pub image_resize: bool,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            proxy_base: DEFAULT_PROXY_BASE.to_string(),
            concat_base: DEFAULT_CONCAT_BASE.to_string(),
            include_urls: ".*".to_string(),
            exclude_urls: String::new(),
            include_tags: DEFAULT_REWRITE_TAGS.iter().map(|t| t.to_string()).collect(),
            expires_seconds: DEFAULT_EXPIRES_SECONDS,
            concat: true,
            css: true,
            image_attributes: false,
            image_resize: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LockedDomainConfig {
    pub enabled: bool,
    pub suffix: String,
    /// Containers in which every gadget must render on its locked domain
    pub required_containers: Vec<String>,
}

impl Default for LockedDomainConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            suffix: DEFAULT_LOCKED_DOMAIN_SUFFIX.to_string(),
            required_containers: Vec::new(),
        }
    }
}

/// Load a config from a YAML file, or TOML when the extension is `.toml`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ServerConfig, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg: ServerConfig = if is_toml {
        toml::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };
    Ok(cfg)
}

/// Load a config and check that every pattern in it compiles.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<ServerConfig, ConfigError> {
    let cfg = load_config(path)?;
    cfg.validate()?;
    Ok(cfg)
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let patterns = [&self.rewrite.include_urls, &self.rewrite.exclude_urls]
            .into_iter()
            .chain(self.blacklist.iter());
        for pattern in patterns {
            if let Err(err) = Regex::new(pattern) {
                return Err(ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: err.to_string(),
                });
            }
        }
        if self.rewrite.proxy_base.is_empty() || self.rewrite.concat_base.is_empty() {
            return Err(ConfigError::Invalid(
                "rewrite.proxy_base and rewrite.concat_base must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
