// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Loading of `feature.xml` descriptors into a [`FeatureRegistry`].
//!
//! ```xml
//! <feature>
//!   <name>rpc</name>
//!   <dependency>core</dependency>
//!   <gadget><script src="rpc.js"/></gadget>
//!   <container><script>var rpcContainer = {};</script></container>
//! </feature>
//! ```
//!
//! A `src` with an http(s) scheme stays a URL library; any other `src` names
//! a file next to the descriptor whose contents are inlined.
//!
//! Descriptors are discovered in arbitrary order but the registry only
//! accepts a feature once its dependencies are registered, so they are
//! sorted with Kahn's algorithm first.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use super::feature::JsLibraryFeatureFactory;
use super::library::{JsLibrary, JsLibraryKind};
use super::registry::FeatureRegistry;
use super::validation::detect_cycle;
use crate::errors::RegistryError;
use crate::gadget::RenderingContext;
use crate::markup::{self, Document, NodeId, ParseMode};
use crate::observability::messages::features::DescriptorsUnresolved;
use crate::observability::messages::StructuredLog;

const DESCRIPTOR_FILE_NAME: &str = "feature.xml";

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureDescriptor {
    pub name: String,
    pub dependencies: Vec<String>,
    pub libraries: Vec<JsLibrary>,
}

impl FeatureDescriptor {
    /// Parses a descriptor. Relative script sources are read from
    /// `base_dir`; without one they are rejected.
    pub fn parse(xml: &str, base_dir: Option<&Path>, source_name: &str) -> Result<Self, RegistryError> {
        let invalid = |reason: String| RegistryError::InvalidDescriptor {
            source_name: source_name.to_string(),
            reason,
        };

        let doc = markup::parse(xml, ParseMode::Xml).map_err(|err| invalid(err.to_string()))?;
        let root = doc
            .document_element()
            .filter(|root| doc.name(*root) == Some("feature"))
            .ok_or_else(|| invalid("root element must be <feature>".to_string()))?;

        let name = doc
            .first_child_element(root, "name")
            .map(|n| doc.text_content(n).trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| invalid("missing <name>".to_string()))?;

        let dependencies = doc
            .child_elements(root, "dependency")
            .map(|d| doc.text_content(d).trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();

        let mut libraries = Vec::new();
        for (tag, context) in [
            ("gadget", RenderingContext::Gadget),
            ("container", RenderingContext::Container),
        ] {
            for section in doc.child_elements(root, tag) {
                for script in doc.child_elements(section, "script") {
                    let library = script_library(&doc, script, &name, context, base_dir)
                        .map_err(invalid)?;
                    libraries.push(library);
                }
            }
        }

        Ok(Self {
            name,
            dependencies,
            libraries,
        })
    }
}

fn script_library(
    doc: &Document,
    script: NodeId,
    feature: &str,
    context: RenderingContext,
    base_dir: Option<&Path>,
) -> Result<JsLibrary, String> {
    let Some(src) = doc.attr(script, "src").map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(JsLibrary::inline(feature, context, doc.text_content(script).trim()));
    };

    let lower = src.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Ok(JsLibrary::url(feature, context, src));
    }

    let base_dir = base_dir.ok_or_else(|| format!("relative script '{src}' without a base directory"))?;
    let path = base_dir.join(src);
    let content = fs::read_to_string(&path).map_err(|err| format!("cannot read {}: {err}", path.display()))?;
    Ok(JsLibrary {
        feature: feature.to_string(),
        kind: JsLibraryKind::File,
        context,
        content,
    })
}

/// Finds and parses every `feature.xml` under the given directories.
pub fn load_feature_directories(directories: &[PathBuf]) -> Result<Vec<FeatureDescriptor>, RegistryError> {
    let mut descriptors = Vec::new();
    for directory in directories {
        for entry in WalkDir::new(directory).sort_by_file_name() {
            let entry = entry.map_err(|err| RegistryError::InvalidDescriptor {
                source_name: directory.display().to_string(),
                reason: err.to_string(),
            })?;
            if !entry.file_type().is_file() || entry.file_name() != DESCRIPTOR_FILE_NAME {
                continue;
            }
            let source_name = entry.path().display().to_string();
            let xml = fs::read_to_string(entry.path()).map_err(|err| RegistryError::InvalidDescriptor {
                source_name: source_name.clone(),
                reason: err.to_string(),
            })?;
            descriptors.push(FeatureDescriptor::parse(&xml, entry.path().parent(), &source_name)?);
        }
    }
    Ok(descriptors)
}

/// Orders descriptors so each comes after its dependencies.
///
/// Dependencies already present in `registry` count as satisfied. Returns
/// the ordered descriptors and the names that could not be placed.
fn kahn_order(
    registry: &FeatureRegistry,
    descriptors: Vec<FeatureDescriptor>,
) -> (Vec<FeatureDescriptor>, Vec<FeatureDescriptor>) {
    let index: HashMap<String, usize> = descriptors
        .iter()
        .enumerate()
        .map(|(i, d)| (d.name.clone(), i))
        .collect();

    let mut in_degree = vec![0usize; descriptors.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); descriptors.len()];
    for (i, descriptor) in descriptors.iter().enumerate() {
        for dep in &descriptor.dependencies {
            match index.get(dep) {
                Some(&j) => {
                    in_degree[i] += 1;
                    dependents[j].push(i);
                }
                // never satisfiable
                None if !registry.contains(dep) => in_degree[i] += 1,
                None => {}
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..descriptors.len()).filter(|i| in_degree[*i] == 0).collect();
    let mut order = Vec::with_capacity(descriptors.len());
    while let Some(i) = queue.pop_front() {
        order.push(i);
        for &dependent in &dependents[i] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                queue.push_back(dependent);
            }
        }
    }

    let placed: HashSet<usize> = order.iter().copied().collect();
    let mut slots: Vec<Option<FeatureDescriptor>> = descriptors.into_iter().map(Some).collect();
    let ordered = order.iter().filter_map(|i| slots[*i].take()).collect();
    let leftovers = (0..slots.len())
        .filter(|i| !placed.contains(i))
        .filter_map(|i| slots[i].take())
        .collect();
    (ordered, leftovers)
}

/// Registers descriptors in dependency order and returns the names added.
///
/// # Errors
/// `DuplicateFeature` for a name declared twice, `UnresolvedDependency` when
/// a descriptor depends on a feature nobody provides, and
/// `CyclicDependency` when descriptors depend on each other in a loop.
pub fn register_descriptors(
    registry: &mut FeatureRegistry,
    descriptors: Vec<FeatureDescriptor>,
) -> Result<Vec<String>, RegistryError> {
    let mut seen = HashSet::new();
    for descriptor in &descriptors {
        if !seen.insert(descriptor.name.as_str()) || registry.contains(&descriptor.name) {
            return Err(RegistryError::DuplicateFeature {
                feature: descriptor.name.clone(),
            });
        }
    }

    let (ordered, leftovers) = kahn_order(registry, descriptors);
    if !leftovers.is_empty() {
        let names: Vec<String> = leftovers.iter().map(|d| d.name.clone()).collect();
        DescriptorsUnresolved { features: &names }.log();
        return Err(unresolved_error(registry, &leftovers));
    }

    let mut registered = Vec::with_capacity(ordered.len());
    for descriptor in ordered {
        let factory = Arc::new(JsLibraryFeatureFactory::new(descriptor.libraries));
        registry.register(&descriptor.name, descriptor.dependencies, factory)?;
        registered.push(descriptor.name);
    }
    Ok(registered)
}

fn unresolved_error(registry: &FeatureRegistry, leftovers: &[FeatureDescriptor]) -> RegistryError {
    let pending: HashSet<&str> = leftovers.iter().map(|d| d.name.as_str()).collect();
    for descriptor in leftovers {
        if let Some(missing) = descriptor
            .dependencies
            .iter()
            .find(|dep| !pending.contains(dep.as_str()) && !registry.contains(dep))
        {
            return RegistryError::UnresolvedDependency {
                feature: descriptor.name.clone(),
                missing_dependency: missing.clone(),
            };
        }
    }
    let graph: Vec<(&str, Vec<&str>)> = leftovers
        .iter()
        .map(|d| (d.name.as_str(), d.dependencies.iter().map(String::as_str).collect()))
        .collect();
    RegistryError::CyclicDependency {
        cycle: detect_cycle(&graph).unwrap_or_else(|| pending.iter().map(|n| n.to_string()).collect()),
    }
}

/// Loads every descriptor under `directories` into `registry`.
pub fn load_features(registry: &mut FeatureRegistry, directories: &[PathBuf]) -> Result<Vec<String>, RegistryError> {
    let descriptors = load_feature_directories(directories)?;
    register_descriptors(registry, descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn descriptor(name: &str, deps: &[&str]) -> FeatureDescriptor {
        FeatureDescriptor {
            name: name.to_string(),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            libraries: vec![JsLibrary::inline(name, RenderingContext::Gadget, &format!("{name}();"))],
        }
    }

    #[test]
    fn parses_inline_url_and_container_scripts() {
        let descriptor = FeatureDescriptor::parse(
            r#"<feature>
                 <name> rpc </name>
                 <dependency>core</dependency>
                 <gadget>
                   <script>var a = 1 &lt; 2;</script>
                   <script src="https://cdn.example.org/rpc.js"/>
                 </gadget>
                 <container><script>container();</script></container>
               </feature>"#,
            None,
            "inline",
        )
        .unwrap();
        assert_eq!(descriptor.name, "rpc");
        assert_eq!(descriptor.dependencies, vec!["core"]);
        assert_eq!(descriptor.libraries.len(), 3);
        assert_eq!(descriptor.libraries[0].content, "var a = 1 < 2;");
        assert!(descriptor.libraries[1].is_url());
        assert_eq!(descriptor.libraries[2].context, RenderingContext::Container);
    }

    #[test]
    fn relative_script_without_base_is_invalid() {
        let err = FeatureDescriptor::parse(
            r#"<feature><name>x</name><gadget><script src="x.js"/></gadget></feature>"#,
            None,
            "inline",
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidDescriptor { .. }));
    }

    #[test]
    fn loads_directories_and_inlines_files() {
        let dir = TempDir::new().unwrap();
        let core = dir.path().join("core");
        let tabs = dir.path().join("tabs");
        fs::create_dir_all(&core).unwrap();
        fs::create_dir_all(&tabs).unwrap();
        fs::write(core.join("core.js"), "var gadgets = {};").unwrap();
        fs::write(
            core.join("feature.xml"),
            r#"<feature><name>core</name><gadget><script src="core.js"/></gadget></feature>"#,
        )
        .unwrap();
        fs::write(
            tabs.join("feature.xml"),
            r#"<feature><name>tabs</name><dependency>core</dependency>
               <gadget><script>gadgets.tabs = {};</script></gadget></feature>"#,
        )
        .unwrap();

        let mut registry = FeatureRegistry::new();
        let registered = load_features(&mut registry, &[dir.path().to_path_buf()]).unwrap();
        assert_eq!(registered, vec!["core", "tabs"]);
        assert_eq!(
            registry.assemble_js(&["tabs"], RenderingContext::Gadget),
            "var gadgets = {};\ngadgets.tabs = {};"
        );
        let core_library = &registry.get("core").unwrap().factory().libraries()[0];
        assert_eq!(core_library.kind, JsLibraryKind::File);
    }

    #[test]
    fn registers_out_of_order_descriptors() {
        let mut registry = FeatureRegistry::new();
        let registered = register_descriptors(
            &mut registry,
            vec![
                descriptor("tabs", &["views"]),
                descriptor("views", &["rpc"]),
                descriptor("rpc", &[]),
            ],
        )
        .unwrap();
        assert_eq!(registered, vec!["rpc", "views", "tabs"]);
    }

    #[test]
    fn dependencies_on_registered_features_are_satisfied() {
        let mut registry = FeatureRegistry::new();
        register_descriptors(&mut registry, vec![descriptor("rpc", &[])]).unwrap();
        let registered = register_descriptors(&mut registry, vec![descriptor("views", &["rpc"])]).unwrap();
        assert_eq!(registered, vec!["views"]);
    }

    #[test]
    fn unknown_dependency_is_reported() {
        let mut registry = FeatureRegistry::new();
        let err = register_descriptors(
            &mut registry,
            vec![descriptor("views", &["rpc"]), descriptor("tabs", &["views"])],
        )
        .unwrap_err();
        assert_eq!(
            err,
            RegistryError::UnresolvedDependency {
                feature: "views".to_string(),
                missing_dependency: "rpc".to_string(),
            }
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn descriptor_cycle_is_reported() {
        let mut registry = FeatureRegistry::new();
        let err = register_descriptors(
            &mut registry,
            vec![descriptor("a", &["b"]), descriptor("b", &["a"]), descriptor("c", &[])],
        )
        .unwrap_err();
        assert_eq!(
            err,
            RegistryError::CyclicDependency {
                cycle: vec!["a".to_string(), "b".to_string(), "a".to_string()],
            }
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_descriptor_names_are_rejected() {
        let mut registry = FeatureRegistry::new();
        let err = register_descriptors(&mut registry, vec![descriptor("a", &[]), descriptor("a", &[])]).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateFeature { .. }));
    }
}
