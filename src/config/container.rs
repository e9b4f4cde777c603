// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Container (syndicator) configuration with cascading inheritance.
//!
//! Each JSON document names the containers it configures in
//! `gadgets.container`. A container inherits from `parent` (default
//! `default`): objects are merged key by key, other values replace the
//! inherited ones, and an object marked `"final": true` replaces the
//! inherited object outright.

use crate::config::consts::DEFAULT_CONTAINER;
use crate::errors::ConfigError;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use walkdir::WalkDir;

const CONTAINER_KEY: &str = "gadgets.container";
const PARENT_KEY: &str = "parent";
const FINAL_KEY: &str = "final";

#[derive(Debug, Clone, Default)]
pub struct ContainerConfig {
    resolved: HashMap<String, Map<String, Value>>,
}

impl ContainerConfig {
    /// Build from raw JSON documents.
    pub fn from_documents<'a, I>(documents: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut raw: HashMap<String, Map<String, Value>> = HashMap::new();
        for document in documents {
            let value: Value = serde_json::from_str(document)?;
            let Value::Object(object) = value else {
                return Err(ConfigError::Invalid(
                    "container config must be a JSON object".to_string(),
                ));
            };
            let names: Vec<String> = match object.get(CONTAINER_KEY) {
                Some(Value::Array(names)) => names
                    .iter()
                    .filter_map(|n| n.as_str().map(str::to_string))
                    .collect(),
                Some(Value::String(name)) => vec![name.clone()],
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "container config is missing '{}'",
                        CONTAINER_KEY
                    )))
                }
            };
            for name in names {
                raw.insert(name, object.clone());
            }
        }

        let mut resolved = HashMap::new();
        let names: Vec<String> = raw.keys().cloned().collect();
        for name in names {
            resolve(&name, &raw, &mut resolved, &mut Vec::new())?;
        }
        Ok(Self { resolved })
    }

    /// Load every `.json`/`.js` file under the given files or directories.
    pub fn load(paths: &[PathBuf]) -> Result<Self, ConfigError> {
        let mut documents = Vec::new();
        for path in paths {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry.map_err(|err| ConfigError::Invalid(err.to_string()))?;
                let is_config = entry.file_type().is_file()
                    && entry
                        .path()
                        .extension()
                        .is_some_and(|ext| ext == "json" || ext == "js");
                if !is_config {
                    continue;
                }
                let content = fs::read_to_string(entry.path()).map_err(|source| ConfigError::Io {
                    path: entry.path().to_path_buf(),
                    source,
                })?;
                documents.push(content);
            }
        }
        Self::from_documents(documents.iter().map(String::as_str))
    }

    pub fn containers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.resolved.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn has_container(&self, container: &str) -> bool {
        self.resolved.contains_key(container)
    }

    /// Effective value of `key` for `container`; unknown containers read `default`.
    pub fn get(&self, container: &str, key: &str) -> Option<&Value> {
        self.resolved
            .get(container)
            .or_else(|| self.resolved.get(DEFAULT_CONTAINER))
            .and_then(|config| config.get(key))
    }
}

fn resolve(
    name: &str,
    raw: &HashMap<String, Map<String, Value>>,
    resolved: &mut HashMap<String, Map<String, Value>>,
    chain: &mut Vec<String>,
) -> Result<Map<String, Value>, ConfigError> {
    if let Some(done) = resolved.get(name) {
        return Ok(done.clone());
    }
    if chain.iter().any(|c| c == name) {
        chain.push(name.to_string());
        return Err(ConfigError::ParentCycle {
            chain: chain.clone(),
        });
    }
    let own = raw.get(name).cloned().unwrap_or_default();
    let parent = match own.get(PARENT_KEY).and_then(Value::as_str) {
        Some(parent) => Some(parent.to_string()),
        None if name != DEFAULT_CONTAINER && raw.contains_key(DEFAULT_CONTAINER) => {
            Some(DEFAULT_CONTAINER.to_string())
        }
        None => None,
    };

    let merged = match parent {
        Some(parent) => {
            if !raw.contains_key(&parent) {
                return Err(ConfigError::UnknownParent {
                    container: name.to_string(),
                    parent,
                });
            }
            chain.push(name.to_string());
            let inherited = resolve(&parent, raw, resolved, chain)?;
            chain.pop();
            merge(inherited, own)
        }
        None => merge(Map::new(), own),
    };
    let mut merged = merged;
    merged.remove(PARENT_KEY);
    merged.insert(
        CONTAINER_KEY.to_string(),
        Value::Array(vec![Value::String(name.to_string())]),
    );
    resolved.insert(name.to_string(), merged.clone());
    Ok(merged)
}

fn merge(mut base: Map<String, Value>, overlay: Map<String, Value>) -> Map<String, Value> {
    for (key, value) in overlay {
        let merged = match (base.remove(&key), value) {
            (_, Value::Object(mut object)) if is_final(&object) => {
                object.remove(FINAL_KEY);
                Value::Object(object)
            }
            (Some(Value::Object(inherited)), Value::Object(object)) => {
                Value::Object(merge(inherited, object))
            }
            (_, Value::Object(object)) => Value::Object(merge(Map::new(), object)),
            (_, value) => value,
        };
        base.insert(key, merged);
    }
    base
}

fn is_final(object: &Map<String, Value>) -> bool {
    object.get(FINAL_KEY).and_then(Value::as_bool).unwrap_or(false)
}
