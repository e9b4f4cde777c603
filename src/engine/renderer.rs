// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Turns a processed [`Gadget`] into what the client receives: an HTML
//! document for `type="html"` views or a redirect target for `type="url"`.

use serde_json::{Map, Value};

use crate::config::consts::DEFAULT_JS_BASE;
use crate::config::ContainerConfig;
use crate::errors::{ErrorCode, GadgetError};
use crate::gadget::{append_query, Gadget, RenderingContext, USER_PREF_PREFIX};
use crate::markup::escape_attribute;
use crate::rewrite::ContentRewriterPipeline;
use crate::spec::{ContentType, GadgetSpec, View};

const FEATURES_KEY: &str = "gadgets.features";

const DEFAULT_STYLE: &str = "body,td,div,span,p{font-family:arial,sans-serif;}\
a{color:#0000cc;}a:visited{color:#551a8b;}a:active{color:#ff0000;}\
body{margin:0px;padding:0px;background-color:white;}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedGadget {
    Html(String),
    Redirect(String),
}

pub struct GadgetRenderer {
    containers: ContainerConfig,
    pipeline: ContentRewriterPipeline,
    js_base: String,
}

impl GadgetRenderer {
    pub fn new(containers: ContainerConfig, pipeline: ContentRewriterPipeline) -> Self {
        Self {
            containers,
            pipeline,
            js_base: DEFAULT_JS_BASE.to_string(),
        }
    }

    /// Path the feature JS endpoint is served under.
    pub fn with_js_base(mut self, js_base: &str) -> Self {
        self.js_base = js_base.trim_end_matches('/').to_string();
        self
    }

    pub fn containers(&self) -> &ContainerConfig {
        &self.containers
    }

    /// Renders the requested view, falling back to `default`.
    ///
    /// # Errors
    /// `UnknownView` when neither the requested view nor `default` exists.
    pub async fn render(&self, gadget: &Gadget) -> Result<RenderedGadget, GadgetError> {
        let spec = gadget.substituted_spec();
        let requested = &gadget.context().view;
        let view = spec.view(requested).ok_or_else(|| {
            GadgetError::new(
                ErrorCode::UnknownView,
                format!("{} has no '{}' or default view", spec.url(), requested),
            )
        })?;

        match view.content_type {
            ContentType::Html => Ok(RenderedGadget::Html(self.render_html(gadget, view).await?)),
            ContentType::Url => Ok(RenderedGadget::Redirect(redirect_target(gadget, &spec, view)?)),
        }
    }

    async fn render_html(&self, gadget: &Gadget, view: &View) -> Result<String, GadgetError> {
        let mut out = String::new();
        out.push_str("<html><head><style type=\"text/css\">");
        out.push_str(DEFAULT_STYLE);
        out.push_str("</style></head><body>");

        if gadget.context().debug {
            out.push_str(&format!(
                "<script src=\"{}\"></script>",
                escape_attribute(&self.js_url(gadget))
            ));
        } else {
            for library in gadget.js_libraries() {
                out.push_str(&library.to_script_tag());
            }
        }

        let config = self.feature_config(gadget);
        out.push_str("<script>gadgets.config.init(");
        out.push_str(&script_json(&Value::Object(config))?);
        out.push_str(");</script>");

        let messages = serde_json::to_value(gadget.message_bundle().messages())
            .map_err(|err| GadgetError::internal(err.to_string()))?;
        out.push_str("<script>gadgets.Prefs.setMessages_(");
        out.push_str(&script_json(&messages)?);
        out.push_str(");</script>");

        if !gadget.preloads().is_empty() {
            let preloads = serde_json::to_value(gadget.preloads())
                .map_err(|err| GadgetError::internal(err.to_string()))?;
            out.push_str("<script>gadgets.io.preloaded_ = ");
            out.push_str(&script_json(&preloads)?);
            out.push_str(";</script>");
        }

        out.push_str(&self.pipeline.rewrite(gadget, &view.content).await);

        out.push_str("<script>gadgets.util.runOnLoadHandlers();</script>");
        out.push_str("</body></html>");
        Ok(out)
    }

    /// External bundle for the gadget's features, loaded instead of inline
    /// libraries in debug mode: `{js_base}/a:b.js?v=..&c=0&debug=1`.
    pub fn js_url(&self, gadget: &Gadget) -> String {
        let context = gadget.context();
        let base = format!("{}/{}.js", self.js_base, gadget.features().join(":"));
        let mut pairs = Vec::new();
        if let Some(version) = &context.version {
            pairs.push(("v", version.as_str()));
        }
        let container = match context.rendering_context {
            RenderingContext::Gadget => "0",
            RenderingContext::Container => "1",
        };
        pairs.push(("c", container));
        pairs.push(("debug", if context.debug { "1" } else { "0" }));
        append_query(&base, &pairs)
    }

    /// The container's `gadgets.features` entries for the features the
    /// gadget includes.
    fn feature_config(&self, gadget: &Gadget) -> Map<String, Value> {
        let Some(Value::Object(all)) = self.containers.get(&gadget.context().container, FEATURES_KEY) else {
            return Map::new();
        };
        gadget
            .features()
            .iter()
            .filter_map(|name| all.get(name).map(|value| (name.clone(), value.clone())))
            .collect()
    }
}

/// JSON safe to embed inside a `<script>` element.
fn script_json(value: &Value) -> Result<String, GadgetError> {
    serde_json::to_string(value)
        .map(|json| json.replace("</", "<\\/"))
        .map_err(|err| GadgetError::internal(err.to_string()))
}

/// `href` plus the user prefs, locale and included features as query
/// parameters.
fn redirect_target(gadget: &Gadget, spec: &GadgetSpec, view: &View) -> Result<String, GadgetError> {
    let href = view
        .href
        .as_ref()
        .ok_or_else(|| GadgetError::malformed(format!("view '{}' has no href", view.name)))?;
    let context = gadget.context();

    let mut pairs: Vec<(String, String)> = spec
        .user_prefs()
        .iter()
        .map(|pref| {
            let value = context.user_prefs.get(&pref.name).unwrap_or(&pref.default_value);
            (format!("{USER_PREF_PREFIX}{}", pref.name), value.clone())
        })
        .collect();
    pairs.push(("lang".into(), context.locale.language.clone()));
    pairs.push(("country".into(), context.locale.country.clone()));
    pairs.push(("libs".into(), gadget.features().join(",")));

    let borrowed: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    Ok(append_query(href.as_str(), &borrowed))
}
