// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::{BTreeMap, HashSet};
use url::Url;

use super::message_bundle::MessageBundle;
use crate::config::consts::DEFAULT_VIEW;
use crate::errors::GadgetError;
use crate::gadget::Substitutions;
use crate::markup::{self, Document, NodeId, ParseMode};

/// Attributes of `<ModulePrefs>` with dedicated fields; everything else lands
/// in [`ModulePrefs::attributes`].
const KNOWN_PREF_ATTRIBUTES: &[&str] = &[
    "title",
    "title_url",
    "description",
    "author",
    "author_email",
    "screenshot",
    "thumbnail",
    "height",
    "width",
    "scrolling",
];

/// A parsed gadget definition. Immutable once built; per-request state lives
/// in [`crate::gadget::Gadget`].
#[derive(Debug, Clone, PartialEq)]
pub struct GadgetSpec {
    url: Url,
    module_prefs: ModulePrefs,
    user_prefs: Vec<UserPref>,
    views: BTreeMap<String, View>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModulePrefs {
    pub title: String,
    pub title_url: Option<Url>,
    pub description: String,
    pub author: String,
    pub author_email: String,
    pub screenshot: Option<Url>,
    pub thumbnail: Option<Url>,
    pub height: u32,
    pub width: u32,
    pub scrolling: bool,
    /// Any attribute without a dedicated field, kept verbatim.
    pub attributes: BTreeMap<String, String>,
    pub features: BTreeMap<String, FeatureRequest>,
    pub locales: Vec<LocaleSpec>,
    pub preloads: Vec<Url>,
}

/// A `<Require>` or `<Optional>` element.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRequest {
    pub name: String,
    pub required: bool,
    pub params: BTreeMap<String, String>,
}

impl FeatureRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocaleSpec {
    /// Lowercase language, `all` when unspecified.
    pub language: String,
    /// Uppercase country, `ALL` when unspecified.
    pub country: String,
    pub messages: Option<Url>,
    pub direction: String,
    pub inline_messages: MessageBundle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserPrefDataType {
    String,
    Hidden,
    Bool,
    Enum,
    List,
    Number,
}

impl UserPrefDataType {
    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "hidden" => UserPrefDataType::Hidden,
            "bool" => UserPrefDataType::Bool,
            "enum" => UserPrefDataType::Enum,
            "list" => UserPrefDataType::List,
            "number" => UserPrefDataType::Number,
            _ => UserPrefDataType::String,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub value: String,
    pub display_value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserPref {
    pub name: String,
    pub display_name: String,
    pub default_value: String,
    pub data_type: UserPrefDataType,
    pub required: bool,
    pub enum_values: Vec<EnumValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Html,
    Url,
}

/// The content to show for one view name.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub name: String,
    pub content_type: ContentType,
    pub href: Option<Url>,
    pub content: String,
}

impl GadgetSpec {
    /// Parses gadget XML fetched from `url`. Relative URLs inside the
    /// document resolve against it.
    pub fn parse(url: Url, xml: &str) -> Result<Self, GadgetError> {
        if xml.trim().is_empty() {
            return Err(GadgetError::malformed(format!("empty gadget spec at {url}")));
        }
        let doc = markup::parse(xml, ParseMode::Xml)?;
        let module = doc
            .document_element()
            .filter(|root| doc.name(*root) == Some("Module"))
            .ok_or_else(|| GadgetError::malformed("gadget spec root element must be <Module>"))?;

        let prefs_node = doc
            .first_child_element(module, "ModulePrefs")
            .ok_or_else(|| GadgetError::malformed("<Module> is missing <ModulePrefs>"))?;
        let module_prefs = parse_module_prefs(&doc, prefs_node, &url)?;

        let mut user_prefs = Vec::new();
        let mut seen = HashSet::new();
        for node in doc.child_elements(module, "UserPref") {
            let pref = parse_user_pref(&doc, node)?;
            if !seen.insert(pref.name.clone()) {
                return Err(GadgetError::malformed(format!(
                    "duplicate UserPref '{}'",
                    pref.name
                )));
            }
            user_prefs.push(pref);
        }

        let mut views: BTreeMap<String, View> = BTreeMap::new();
        let mut content_seen = false;
        for node in doc.child_elements(module, "Content") {
            content_seen = true;
            for view in parse_content(&doc, node, &url)? {
                match views.get_mut(&view.name) {
                    None => {
                        views.insert(view.name.clone(), view);
                    }
                    Some(existing) => {
                        if existing.content_type != ContentType::Html
                            || view.content_type != ContentType::Html
                        {
                            return Err(GadgetError::malformed(format!(
                                "view '{}' mixes url and html content",
                                view.name
                            )));
                        }
                        existing.content.push_str(&view.content);
                    }
                }
            }
        }
        if !content_seen {
            return Err(GadgetError::malformed("<Module> has no <Content> section"));
        }

        Ok(Self {
            url,
            module_prefs,
            user_prefs,
            views,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn module_prefs(&self) -> &ModulePrefs {
        &self.module_prefs
    }

    pub fn user_prefs(&self) -> &[UserPref] {
        &self.user_prefs
    }

    pub fn views(&self) -> &BTreeMap<String, View> {
        &self.views
    }

    /// The named view, falling back to the default view.
    pub fn view(&self, name: &str) -> Option<&View> {
        self.views.get(name).or_else(|| self.views.get(DEFAULT_VIEW))
    }

    pub fn feature(&self, name: &str) -> Option<&FeatureRequest> {
        self.module_prefs.features.get(name)
    }

    /// Returns a copy with hangman tokens replaced in titles, descriptions,
    /// user pref labels and defaults, and all view bodies and hrefs.
    pub fn substitute(&self, substitutions: &Substitutions) -> GadgetSpec {
        let mut spec = self.clone();
        let prefs = &mut spec.module_prefs;
        prefs.title = substitutions.substitute_string(&prefs.title);
        prefs.description = substitutions.substitute_string(&prefs.description);
        prefs.title_url = substitute_url(prefs.title_url.take(), substitutions);

        for pref in &mut spec.user_prefs {
            pref.display_name = substitutions.substitute_string(&pref.display_name);
            pref.default_value = substitutions.substitute_string(&pref.default_value);
            for value in &mut pref.enum_values {
                value.display_value = substitutions.substitute_string(&value.display_value);
            }
        }

        for view in spec.views.values_mut() {
            view.content = substitutions.substitute_string(&view.content);
            view.href = substitute_url(view.href.take(), substitutions);
        }
        spec
    }
}

fn substitute_url(url: Option<Url>, substitutions: &Substitutions) -> Option<Url> {
    let url = url?;
    let replaced = substitutions.substitute_string(url.as_str());
    Url::parse(&replaced).ok().or(Some(url))
}

fn resolve(base: &Url, value: &str, what: &str) -> Result<Url, GadgetError> {
    base.join(value)
        .map_err(|err| GadgetError::malformed(format!("invalid {what} '{value}': {err}")))
}

fn optional_url(doc: &Document, node: NodeId, name: &str, base: &Url) -> Result<Option<Url>, GadgetError> {
    match doc.attr(node, name).map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => resolve(base, value, name).map(Some),
        None => Ok(None),
    }
}

fn required_attr<'a>(doc: &'a Document, node: NodeId, name: &str) -> Result<&'a str, GadgetError> {
    doc.attr(node, name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            GadgetError::malformed(format!(
                "<{}> is missing the {name} attribute",
                doc.name(node).unwrap_or_default()
            ))
        })
}

fn parse_dimension(doc: &Document, node: NodeId, name: &str) -> Result<u32, GadgetError> {
    match doc.attr(node, name).map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(0),
        Some(value) => value
            .parse()
            .map_err(|_| GadgetError::malformed(format!("ModulePrefs@{name} is not a number: '{value}'"))),
    }
}

fn parse_module_prefs(doc: &Document, node: NodeId, base: &Url) -> Result<ModulePrefs, GadgetError> {
    let text = |name: &str| doc.attr(node, name).unwrap_or_default().to_string();
    let mut prefs = ModulePrefs {
        title: text("title"),
        title_url: optional_url(doc, node, "title_url", base)?,
        description: text("description"),
        author: text("author"),
        author_email: text("author_email"),
        screenshot: optional_url(doc, node, "screenshot", base)?,
        thumbnail: optional_url(doc, node, "thumbnail", base)?,
        height: parse_dimension(doc, node, "height")?,
        width: parse_dimension(doc, node, "width")?,
        scrolling: doc
            .attr(node, "scrolling")
            .is_some_and(|v| v.eq_ignore_ascii_case("true")),
        ..ModulePrefs::default()
    };

    for attribute in doc.attributes(node) {
        if !KNOWN_PREF_ATTRIBUTES.contains(&attribute.name.as_str()) {
            prefs
                .attributes
                .insert(attribute.name.clone(), attribute.value.clone());
        }
    }

    for child in doc.children(node).iter().copied() {
        match doc.name(child) {
            Some(tag @ ("Require" | "Optional")) => {
                let request = parse_feature_request(doc, child, tag == "Require")?;
                prefs.features.insert(request.name.clone(), request);
            }
            Some("Locale") => prefs.locales.push(parse_locale(doc, child, base)?),
            Some("Preload") => {
                let href = required_attr(doc, child, "href")?;
                prefs.preloads.push(resolve(base, href, "preload href")?);
            }
            _ => {}
        }
    }
    Ok(prefs)
}

fn parse_feature_request(doc: &Document, node: NodeId, required: bool) -> Result<FeatureRequest, GadgetError> {
    let name = required_attr(doc, node, "feature")?.to_string();
    let mut params = BTreeMap::new();
    for param in doc.child_elements(node, "Param") {
        let key = required_attr(doc, param, "name")?;
        params.insert(key.to_string(), doc.text_content(param).trim().to_string());
    }
    Ok(FeatureRequest {
        name,
        required,
        params,
    })
}

fn parse_locale(doc: &Document, node: NodeId, base: &Url) -> Result<LocaleSpec, GadgetError> {
    let language = doc
        .attr(node, "lang")
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("all")
        .to_ascii_lowercase();
    let country = doc
        .attr(node, "country")
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("ALL")
        .to_ascii_uppercase();
    Ok(LocaleSpec {
        language,
        country,
        messages: optional_url(doc, node, "messages", base)?,
        direction: doc
            .attr(node, "language_direction")
            .unwrap_or("ltr")
            .to_ascii_lowercase(),
        inline_messages: MessageBundle::from_msg_elements(doc, node)?,
    })
}

fn parse_user_pref(doc: &Document, node: NodeId) -> Result<UserPref, GadgetError> {
    let name = required_attr(doc, node, "name")?.to_string();
    let mut enum_values = Vec::new();
    for value_node in doc.child_elements(node, "EnumValue") {
        let value = doc
            .attr(value_node, "value")
            .ok_or_else(|| GadgetError::malformed(format!("EnumValue of '{name}' is missing value")))?;
        enum_values.push(EnumValue {
            value: value.to_string(),
            display_value: doc
                .attr(value_node, "display_value")
                .unwrap_or(value)
                .to_string(),
        });
    }
    Ok(UserPref {
        display_name: doc.attr(node, "display_name").unwrap_or(&name).to_string(),
        default_value: doc.attr(node, "default_value").unwrap_or_default().to_string(),
        data_type: UserPrefDataType::parse(doc.attr(node, "datatype").unwrap_or("string")),
        required: doc
            .attr(node, "required")
            .is_some_and(|v| v.eq_ignore_ascii_case("true")),
        enum_values,
        name,
    })
}

fn parse_content(doc: &Document, node: NodeId, base: &Url) -> Result<Vec<View>, GadgetError> {
    let content_type = match doc
        .attr(node, "type")
        .map(|t| t.trim().to_ascii_lowercase())
        .as_deref()
    {
        None | Some("") | Some("html") => ContentType::Html,
        Some("url") => ContentType::Url,
        Some(other) => {
            return Err(GadgetError::malformed(format!("unknown Content type '{other}'")));
        }
    };
    let href = match content_type {
        ContentType::Url => Some(resolve(base, required_attr(doc, node, "href")?, "Content href")?),
        ContentType::Html => None,
    };
    let content = match content_type {
        ContentType::Html => doc.text_content(node),
        ContentType::Url => String::new(),
    };

    let names: Vec<String> = doc
        .attr(node, "view")
        .unwrap_or(DEFAULT_VIEW)
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    let names = if names.is_empty() {
        vec![DEFAULT_VIEW.to_string()]
    } else {
        names
    };

    Ok(names
        .into_iter()
        .map(|name| View {
            name,
            content_type,
            href: href.clone(),
            content: content.clone(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use crate::gadget::SubstitutionType;

    fn spec_url() -> Url {
        Url::parse("http://example.org/gadgets/hello.xml").unwrap()
    }

    const FULL_SPEC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Module>
  <ModulePrefs title="__MSG_title__" description="Says hello" author="Ana" height="200"
               scrolling="true" render_inline="never">
    <Require feature="dynamic-height"/>
    <Optional feature="content-rewrite">
      <Param name="include-tags">img, script</Param>
    </Optional>
    <Locale messages="messages/ALL_ALL.xml"/>
    <Locale lang="de" country="de" language_direction="ltr">
      <msg name="title">Hallo</msg>
    </Locale>
    <Preload href="http://example.org/data.json"/>
  </ModulePrefs>
  <UserPref name="color" display_name="Colour" default_value="blue" datatype="enum">
    <EnumValue value="blue" display_value="Blue"/>
    <EnumValue value="red"/>
  </UserPref>
  <UserPref name="secret" datatype="hidden" required="true"/>
  <Content type="html" view="home, canvas"><![CDATA[<b>Hello __UP_color__</b>]]></Content>
  <Content type="html" view="canvas"><![CDATA[<i>more</i>]]></Content>
  <Content type="url" view="profile" href="/profile.html"/>
</Module>"#;

    #[test]
    fn parses_full_document() {
        let spec = GadgetSpec::parse(spec_url(), FULL_SPEC).unwrap();
        let prefs = spec.module_prefs();
        assert_eq!(prefs.title, "__MSG_title__");
        assert_eq!(prefs.height, 200);
        assert!(prefs.scrolling);
        assert_eq!(prefs.attributes.get("render_inline").map(String::as_str), Some("never"));

        assert!(spec.feature("dynamic-height").unwrap().required);
        let rewrite = spec.feature("content-rewrite").unwrap();
        assert!(!rewrite.required);
        assert_eq!(rewrite.param("include-tags"), Some("img, script"));

        assert_eq!(prefs.locales.len(), 2);
        assert_eq!(prefs.locales[0].language, "all");
        assert_eq!(prefs.locales[0].country, "ALL");
        assert_eq!(
            prefs.locales[0].messages.as_ref().map(Url::as_str),
            Some("http://example.org/gadgets/messages/ALL_ALL.xml")
        );
        assert_eq!(prefs.locales[1].country, "DE");
        assert_eq!(prefs.locales[1].inline_messages.get("title"), Some("Hallo"));
        assert_eq!(prefs.preloads.len(), 1);

        let color = &spec.user_prefs()[0];
        assert_eq!(color.display_name, "Colour");
        assert_eq!(color.data_type, UserPrefDataType::Enum);
        assert_eq!(color.enum_values[1].display_value, "red");
        assert!(spec.user_prefs()[1].required);
    }

    #[test]
    fn views_split_on_commas_and_concatenate() {
        let spec = GadgetSpec::parse(spec_url(), FULL_SPEC).unwrap();
        assert_eq!(spec.views()["home"].content, "<b>Hello __UP_color__</b>");
        assert_eq!(spec.views()["canvas"].content, "<b>Hello __UP_color__</b><i>more</i>");
        let profile = &spec.views()["profile"];
        assert_eq!(profile.content_type, ContentType::Url);
        assert_eq!(
            profile.href.as_ref().map(Url::as_str),
            Some("http://example.org/profile.html")
        );
        // no default view declared, so unknown names find nothing
        assert!(spec.view("missing").is_none());
    }

    #[test]
    fn view_lookup_falls_back_to_default() {
        let spec = GadgetSpec::parse(
            spec_url(),
            r#"<Module><ModulePrefs title="t"/><Content type="html">body</Content></Module>"#,
        )
        .unwrap();
        assert_eq!(spec.view("canvas").unwrap().name, "default");
    }

    #[test]
    fn substitute_replaces_tokens_in_copy() {
        let spec = GadgetSpec::parse(spec_url(), FULL_SPEC).unwrap();
        let mut subst = Substitutions::new();
        subst.add_substitution(SubstitutionType::Message, "title", "Hello Gadget");
        subst.add_substitution(SubstitutionType::UserPref, "color", "red");

        let substituted = spec.substitute(&subst);
        assert_eq!(substituted.module_prefs().title, "Hello Gadget");
        assert_eq!(substituted.views()["home"].content, "<b>Hello red</b>");
        assert_eq!(spec.module_prefs().title, "__MSG_title__");
    }

    fn malformed(xml: &str) {
        let err = GadgetSpec::parse(spec_url(), xml).unwrap_err();
        assert_eq!(err.code, ErrorCode::MalformedXmlDocument, "{xml}: {err}");
    }

    #[test]
    fn rejects_malformed_documents() {
        malformed("");
        malformed("   ");
        malformed("<Module><ModulePrefs title='x'>");
        malformed("<Gadget><ModulePrefs/><Content/></Gadget>");
        malformed("<Module><Content>x</Content></Module>");
        malformed("<Module><ModulePrefs/></Module>");
        malformed(r#"<Module><ModulePrefs/><Content type="flash">x</Content></Module>"#);
        malformed(r#"<Module><ModulePrefs/><Content type="url"/></Module>"#);
        malformed(r#"<Module><ModulePrefs><Require/></ModulePrefs><Content>x</Content></Module>"#);
        malformed(r#"<Module><ModulePrefs/><UserPref/><Content>x</Content></Module>"#);
        malformed(
            r#"<Module><ModulePrefs/><UserPref name="a"/><UserPref name="a"/><Content>x</Content></Module>"#,
        );
        malformed(r#"<Module><ModulePrefs height="tall"/><Content>x</Content></Module>"#);
    }
}
