// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Request processing for a single gadget.
//!
//! [`GadgetServer::process_gadget`] turns a [`GadgetContext`] into a
//! populated [`Gadget`] by running a per-request workflow:
//!
//! ```text
//! cache-load -> url-fetch -> enqueue-features -> prepare(f) -> process(f)
//!                         \-> preload
//! ```
//!
//! `enqueue-features` resolves the spec's requested features and spawns one
//! `prepare` job per included feature; each `prepare` job spawns its
//! `process` job, which also waits for the `process` jobs of the feature's
//! dependencies. `preload` fetches the spec's `<Preload>` resources next to
//! feature processing; a failed preload is logged and left out. Every job
//! shares one [`RequestState`].

use futures::future::join_all;
use moka::sync::Cache;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::renderer::{GadgetRenderer, RenderedGadget};
use super::workflow::{JobOutput, WorkflowDependency, WorkflowJob, WorkflowScheduler};
use crate::config::{ContainerConfig, ServerConfig};
use crate::errors::{ErrorCode, GadgetError, WorkflowError};
use crate::features::{
    load_features, register_core_features, FeatureParams, FeatureRegistry, GadgetFeature,
    JsLibraryFeatureFactory,
};
use crate::gadget::{
    Gadget, GadgetBlacklist, GadgetContext, IframeUrlBuilder, LockedDomainService, RenderingContext,
    LOCKED_DOMAIN_FEATURE,
};
use crate::http::{CachingFetcher, HttpFetcher, HttpRequest, RemoteFetcher};
use crate::observability::messages::features::FeaturesMissing;
use crate::observability::messages::fetch::{BackgroundFetchFailed, CacheHit};
use crate::observability::messages::StructuredLog;
use crate::rewrite::{ContentRewriterPipeline, DomRewriter, CONTENT_REWRITE_FEATURE};
use crate::spec::GadgetSpec;

const CACHE_LOAD: &str = "cache-load";
const URL_FETCH: &str = "url-fetch";
const ENQUEUE_FEATURES: &str = "enqueue-features";
const PRELOAD: &str = "preload";

/// Features that only carry params for the server itself.
const MARKER_FEATURES: &[&str] = &[CONTENT_REWRITE_FEATURE, LOCKED_DOMAIN_FEATURE];

/// State shared by the jobs of one request.
struct RequestState {
    context: GadgetContext,
    spec: Mutex<Option<Arc<GadgetSpec>>>,
    gadget: Mutex<Option<Gadget>>,
    preloads: Mutex<Vec<(String, String)>>,
}

/// Everything a job needs besides the request state.
#[derive(Clone)]
struct Services {
    registry: Arc<FeatureRegistry>,
    fetcher: Arc<dyn HttpFetcher>,
    spec_cache: Cache<String, Arc<GadgetSpec>>,
}

pub struct GadgetServer {
    services: Services,
    scheduler: WorkflowScheduler,
    blacklist: GadgetBlacklist,
    renderer: GadgetRenderer,
    iframe_urls: IframeUrlBuilder,
    locked_domains: LockedDomainService,
}

impl GadgetServer {
    /// Builds a server that fetches over the network through a
    /// [`CachingFetcher`], with containers loaded from the configured paths.
    pub fn from_config(config: ServerConfig) -> Result<Self, GadgetError> {
        let remote: Arc<dyn HttpFetcher> = Arc::new(RemoteFetcher::new(&config.fetch)?);
        let fetcher = Arc::new(CachingFetcher::new(remote, &config.fetch.cache));
        let containers = ContainerConfig::load(&config.containers.paths)?;
        Self::with_fetcher(config, fetcher, containers)
    }

    /// Builds a server around a caller-supplied fetcher and container set.
    ///
    /// Registers the core features, loads feature descriptors from the
    /// configured directories and checks the resulting graph for cycles.
    pub fn with_fetcher(
        config: ServerConfig,
        fetcher: Arc<dyn HttpFetcher>,
        containers: ContainerConfig,
    ) -> Result<Self, GadgetError> {
        let mut registry = FeatureRegistry::new();
        register_core_features(&mut registry, fetcher.clone())?;
        load_features(&mut registry, &config.features.directories)?;
        for marker in MARKER_FEATURES {
            if !registry.contains(marker) {
                registry.register(marker, Vec::new(), Arc::new(JsLibraryFeatureFactory::new(Vec::new())))?;
            }
        }
        registry.validate_feature_graph()?;

        let spec_cache = Cache::builder()
            .max_capacity(config.spec_cache.capacity)
            .time_to_live(config.spec_cache.ttl())
            .build();
        let pipeline = ContentRewriterPipeline::new()
            .with_rewriter(Box::new(DomRewriter::new(config.rewrite.clone(), fetcher.clone())));

        Ok(Self {
            services: Services {
                registry: Arc::new(registry),
                fetcher,
                spec_cache,
            },
            scheduler: WorkflowScheduler::new(config.workflow.max_concurrency()),
            blacklist: GadgetBlacklist::new(&config.blacklist)?,
            renderer: GadgetRenderer::new(containers, pipeline).with_js_base(&config.js_base),
            iframe_urls: IframeUrlBuilder::new(&config.iframe_base),
            locked_domains: LockedDomainService::new(&config.locked_domain),
        })
    }

    pub fn registry(&self) -> &FeatureRegistry {
        &self.services.registry
    }

    pub fn containers(&self) -> &ContainerConfig {
        self.renderer.containers()
    }

    pub fn iframe_urls(&self) -> &IframeUrlBuilder {
        &self.iframe_urls
    }

    pub fn locked_domains(&self) -> &LockedDomainService {
        &self.locked_domains
    }

    /// Fetches (or reuses) the spec and runs every included feature over it.
    ///
    /// # Errors
    /// `BlacklistedGadget` for blacklisted URLs; otherwise the error of the
    /// failing job. When several jobs fail the error keeps the first code and
    /// lists every failure in its message.
    pub async fn process_gadget(&self, context: GadgetContext) -> Result<Gadget, GadgetError> {
        if self.blacklist.is_blacklisted(&context.url) {
            return Err(GadgetError::new(
                ErrorCode::BlacklistedGadget,
                format!("{} is blacklisted", context.url),
            ));
        }

        let label = context.url.to_string();
        let state = Arc::new(RequestState {
            context,
            spec: Mutex::new(None),
            gadget: Mutex::new(None),
            preloads: Mutex::new(Vec::new()),
        });

        let jobs = vec![
            cache_load_job(&self.services, &state),
            url_fetch_job(&self.services, &state),
            enqueue_features_job(&self.services, &state),
            preload_job(&self.services, &state),
        ];
        self.scheduler
            .run(&label, jobs)
            .await
            .map_err(into_gadget_error)?;

        let mut gadget = state
            .gadget
            .lock()
            .await
            .take()
            .ok_or_else(|| GadgetError::internal(format!("workflow for {label} produced no gadget")))?;
        for (url, body) in state.preloads.lock().await.drain(..) {
            gadget.add_preload(&url, body);
        }
        Ok(gadget)
    }

    /// [`process_gadget`](Self::process_gadget) followed by rendering.
    pub async fn render(&self, context: GadgetContext) -> Result<RenderedGadget, GadgetError> {
        let gadget = self.process_gadget(context).await?;
        self.renderer.render(&gadget).await
    }

    /// The JS for `features` and everything they depend on.
    ///
    /// # Errors
    /// `UnsupportedFeature` when any requested feature is unknown.
    pub fn js_bundle<S: AsRef<str>>(&self, features: &[S], context: RenderingContext) -> Result<String, GadgetError> {
        let included = self.services.registry.get_included_features(features);
        if !included.missing.is_empty() {
            return Err(unsupported(&included.missing));
        }
        Ok(self.services.registry.assemble_js(features, context))
    }
}

fn unsupported(missing: &[String]) -> GadgetError {
    GadgetError::new(
        ErrorCode::UnsupportedFeature,
        format!("unsupported feature(s): {}", missing.join(", ")),
    )
}

fn into_gadget_error(error: WorkflowError) -> GadgetError {
    match error.failures() {
        [single] => single.clone(),
        [first, ..] => GadgetError::new(first.code, error.to_string()),
        [] => GadgetError::internal(error.to_string()),
    }
}

fn cache_load_job(services: &Services, state: &Arc<RequestState>) -> WorkflowJob {
    WorkflowJob::new(
        CACHE_LOAD,
        WorkflowDependency::core(CACHE_LOAD),
        load_cached_spec(services.clone(), Arc::clone(state)),
    )
}

fn url_fetch_job(services: &Services, state: &Arc<RequestState>) -> WorkflowJob {
    WorkflowJob::new(
        URL_FETCH,
        WorkflowDependency::core(URL_FETCH),
        fetch_spec(services.clone(), Arc::clone(state)),
    )
    .requires(WorkflowDependency::core(CACHE_LOAD))
}

fn enqueue_features_job(services: &Services, state: &Arc<RequestState>) -> WorkflowJob {
    WorkflowJob::new(
        ENQUEUE_FEATURES,
        WorkflowDependency::core(ENQUEUE_FEATURES),
        enqueue_features(Arc::clone(&services.registry), Arc::clone(state)),
    )
    .requires(WorkflowDependency::core(URL_FETCH))
}

fn preload_job(services: &Services, state: &Arc<RequestState>) -> WorkflowJob {
    WorkflowJob::new(
        PRELOAD,
        WorkflowDependency::core(PRELOAD),
        preload(services.clone(), Arc::clone(state)),
    )
    .requires(WorkflowDependency::core(URL_FETCH))
}

async fn load_cached_spec(services: Services, state: Arc<RequestState>) -> JobOutput {
    if state.context.ignore_cache {
        return Ok(Vec::new());
    }
    let key = state.context.url.to_string();
    if let Some(spec) = services.spec_cache.get(&key) {
        CacheHit { url: &key }.log();
        *state.spec.lock().await = Some(spec);
    }
    Ok(Vec::new())
}

async fn fetch_spec(services: Services, state: Arc<RequestState>) -> JobOutput {
    let mut slot = state.spec.lock().await;
    if slot.is_some() {
        return Ok(Vec::new());
    }
    let url = state.context.url.clone();
    let request = HttpRequest::get(url.clone()).with_ignore_cache(state.context.ignore_cache);
    let response = services.fetcher.fetch(&request).await?;
    if !response.is_ok() {
        return Err(GadgetError::retrieval(format!(
            "unable to retrieve spec {url}: status {}",
            response.status
        )));
    }
    let spec = Arc::new(GadgetSpec::parse(url.clone(), &response.text())?);
    services.spec_cache.insert(url.to_string(), Arc::clone(&spec));
    *slot = Some(spec);
    Ok(Vec::new())
}

/// Fetches every `<Preload>` of the spec concurrently. Failures and non-2xx
/// responses are logged and skipped.
async fn preload(services: Services, state: Arc<RequestState>) -> JobOutput {
    let spec = state
        .spec
        .lock()
        .await
        .clone()
        .ok_or_else(|| GadgetError::internal("spec missing after url-fetch"))?;
    let ignore_cache = state.context.ignore_cache;
    let fetches = spec.module_prefs().preloads.iter().map(|url| {
        let fetcher = Arc::clone(&services.fetcher);
        async move {
            let request = HttpRequest::get(url.clone()).with_ignore_cache(ignore_cache);
            let outcome = match fetcher.fetch(&request).await {
                Ok(response) if response.is_ok() => Ok(response.text()),
                Ok(response) => Err(format!("status {}", response.status)),
                Err(err) => Err(err.to_string()),
            };
            (url.to_string(), outcome)
        }
    });

    let mut fetched = Vec::new();
    for (url, outcome) in join_all(fetches).await {
        match outcome {
            Ok(body) => fetched.push((url, body)),
            Err(reason) => BackgroundFetchFailed {
                url: &url,
                reason: &reason,
            }
            .log(),
        }
    }
    state.preloads.lock().await.extend(fetched);
    Ok(Vec::new())
}

/// Resolves the requested features, creates the gadget and returns one
/// prepare job per included feature.
async fn enqueue_features(registry: Arc<FeatureRegistry>, state: Arc<RequestState>) -> JobOutput {
    let spec = state
        .spec
        .lock()
        .await
        .clone()
        .ok_or_else(|| GadgetError::internal("spec missing after url-fetch"))?;
    let gadget_url = spec.url().to_string();

    let requested: Vec<&str> = spec.module_prefs().features.keys().map(String::as_str).collect();
    let included = registry.get_included_features(&requested);
    let (required, optional): (Vec<String>, Vec<String>) = included
        .missing
        .iter()
        .cloned()
        .partition(|name| spec.feature(name).is_some_and(|f| f.required));
    if !optional.is_empty() {
        FeaturesMissing {
            gadget: &gadget_url,
            missing: &optional,
            required: false,
        }
        .log();
    }
    if !required.is_empty() {
        FeaturesMissing {
            gadget: &gadget_url,
            missing: &required,
            required: true,
        }
        .log();
        return Err(unsupported(&required));
    }

    let mut gadget = Gadget::new(Arc::clone(&spec), state.context.clone());
    gadget.set_features(included.features.clone());
    *state.gadget.lock().await = Some(gadget);

    let mut jobs = Vec::with_capacity(included.features.len());
    for name in &included.features {
        let Some(feature) = registry.get(name) else {
            continue;
        };
        let dependencies: Vec<String> = registry
            .effective_dependencies(name)
            .into_iter()
            .filter(|dep| included.features.iter().any(|f| f == dep))
            .map(str::to_string)
            .collect();
        let params = spec.feature(name).map(|f| f.params.clone()).unwrap_or_default();
        jobs.push(prepare_job(
            name,
            feature.factory().create(),
            params,
            dependencies,
            Arc::clone(&spec),
            Arc::clone(&state),
        ));
    }
    Ok(jobs)
}

fn prepare_job(
    name: &str,
    feature: Box<dyn GadgetFeature>,
    params: FeatureParams,
    dependencies: Vec<String>,
    spec: Arc<GadgetSpec>,
    state: Arc<RequestState>,
) -> WorkflowJob {
    WorkflowJob::new(
        format!("prepare:{name}"),
        WorkflowDependency::prepare(name),
        prepare_feature(name.to_string(), feature, params, dependencies, spec, state),
    )
    .requires(WorkflowDependency::core(ENQUEUE_FEATURES))
}

async fn prepare_feature(
    name: String,
    mut feature: Box<dyn GadgetFeature>,
    params: FeatureParams,
    dependencies: Vec<String>,
    spec: Arc<GadgetSpec>,
    state: Arc<RequestState>,
) -> JobOutput {
    feature.prepare(&spec, &state.context, &params).await?;
    let process = WorkflowJob::new(
        format!("process:{name}"),
        WorkflowDependency::process(&name),
        process_feature(feature, params, Arc::clone(&state)),
    )
    .requires(WorkflowDependency::prepare(&name))
    .requires_all(dependencies.iter().map(|dep| WorkflowDependency::process(dep)));
    Ok(vec![process])
}

async fn process_feature(
    mut feature: Box<dyn GadgetFeature>,
    params: FeatureParams,
    state: Arc<RequestState>,
) -> JobOutput {
    let mut slot = state.gadget.lock().await;
    let gadget = slot
        .as_mut()
        .ok_or_else(|| GadgetError::internal("gadget missing after enqueue-features"))?;
    feature.process(gadget, &state.context, &params).await?;
    Ok(Vec::new())
}
