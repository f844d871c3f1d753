//! Rule construction from option maps.
//!
//! # Responsibilities
//! - Define the recognized option surface ([`RuleOptions`])
//! - Normalize the legacy positional calling convention into options
//! - Build a [`RewriteRule`] with callbacks attached in a fixed order
//!
//! # Design Decisions
//! - `rewrite` overrides `regex`, `permission` overrides `access_rule`,
//!   and `request_method` overrides `request_methods`; the last writer in
//!   the fixed attachment order wins, matching how hosts have always
//!   layered these aliases.
//! - Convenience options (`body_class`, the property maps) compile into
//!   ordinary callbacks attached after the explicit ones, so explicit
//!   callbacks observe the accumulator first.
//! - Data options deserialize from config files; callbacks only attach
//!   through code.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RewriteError;
use crate::host::{HostProps, HostQuery, HostRequest};
use crate::registry::RuleRegistry;
use crate::rule::query_spec;
use crate::rule::{
    AccessPolicy, AdminBarCallback, BodyClassCallback, Flow, QueryCallback, RequestCallback,
    RewriteRule, TitleCallback,
};

/// Property assignments for the query object, as either a query-string
/// (`"is_home=false&section=people"`) or an explicit table.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PropertySpec {
    Text(String),
    Map(BTreeMap<String, Value>),
}

impl PropertySpec {
    /// Flatten into (property, value) pairs. Text form yields string
    /// values; the table form keeps each value's own type.
    pub fn entries(&self) -> Vec<(String, Value)> {
        match self {
            Self::Text(spec) => query_spec::parse_pairs(spec)
                .into_iter()
                .map(|(name, value)| (name, Value::String(value)))
                .collect(),
            Self::Map(map) => map
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }
}

impl From<&str> for PropertySpec {
    fn from(spec: &str) -> Self {
        Self::Text(spec.to_owned())
    }
}

impl From<String> for PropertySpec {
    fn from(spec: String) -> Self {
        Self::Text(spec)
    }
}

impl From<BTreeMap<String, Value>> for PropertySpec {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self::Map(map)
    }
}

/// The full option surface for building one rule.
///
/// Field names double as the config-file vocabulary. Callback slots are
/// code-only and never appear in files.
#[derive(Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RuleOptions {
    pub regex: Option<String>,
    /// Alias for `regex`; overrides it when both are given.
    pub rewrite: Option<String>,
    pub id: Option<String>,
    /// Query spec string. Kept as a JSON value so a wrong type is caught
    /// at build time rather than coerced.
    pub query: Option<Value>,
    pub template: Option<String>,
    /// Convenience: one class appended to the body class list.
    pub body_class: Option<String>,
    pub access_rule: Option<AccessPolicy>,
    /// Alias for `access_rule`; overrides it when both are given.
    pub permission: Option<AccessPolicy>,
    pub disable_canonical: bool,
    /// Properties assigned to the query at the parse stage.
    pub parse_query_properties: Option<PropertySpec>,
    /// Properties assigned to the query at the finalize stage.
    pub post_query_properties: Option<PropertySpec>,
    pub request_methods: Vec<String>,
    /// Convenience single method; overrides `request_methods`.
    pub request_method: Option<String>,

    #[serde(skip)]
    pub(crate) request_callbacks: Vec<RequestCallback>,
    #[serde(skip)]
    pub(crate) parse_query_callbacks: Vec<QueryCallback>,
    #[serde(skip)]
    pub(crate) query_callbacks: Vec<QueryCallback>,
    #[serde(skip)]
    pub(crate) title_callbacks: Vec<TitleCallback>,
    #[serde(skip)]
    pub(crate) body_class_callbacks: Vec<BodyClassCallback>,
    #[serde(skip)]
    pub(crate) admin_bar_callbacks: Vec<AdminBarCallback>,
}

impl RuleOptions {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            regex: Some(pattern.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<Value>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_body_class(mut self, class: impl Into<String>) -> Self {
        self.body_class = Some(class.into());
        self
    }

    pub fn with_access_rule(mut self, policy: AccessPolicy) -> Self {
        self.access_rule = Some(policy);
        self
    }

    pub fn with_permission(mut self, policy: AccessPolicy) -> Self {
        self.permission = Some(policy);
        self
    }

    pub fn with_disabled_canonical(mut self) -> Self {
        self.disable_canonical = true;
        self
    }

    pub fn with_parse_query_properties(mut self, properties: impl Into<PropertySpec>) -> Self {
        self.parse_query_properties = Some(properties.into());
        self
    }

    pub fn with_post_query_properties(mut self, properties: impl Into<PropertySpec>) -> Self {
        self.post_query_properties = Some(properties.into());
        self
    }

    pub fn with_request_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_request_method(mut self, method: impl Into<String>) -> Self {
        self.request_method = Some(method.into());
        self
    }

    pub fn on_request<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut dyn HostRequest, &RewriteRule) -> Flow + Send + Sync + 'static,
    {
        self.request_callbacks.push(Box::new(callback));
        self
    }

    pub fn on_parse_query<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut dyn HostQuery, &RewriteRule) + Send + Sync + 'static,
    {
        self.parse_query_callbacks.push(Box::new(callback));
        self
    }

    pub fn on_query<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut dyn HostQuery, &RewriteRule) + Send + Sync + 'static,
    {
        self.query_callbacks.push(Box::new(callback));
        self
    }

    pub fn on_title<F>(mut self, callback: F) -> Self
    where
        F: Fn(String, &str) -> String + Send + Sync + 'static,
    {
        self.title_callbacks.push(Box::new(callback));
        self
    }

    pub fn on_body_classes<F>(mut self, callback: F) -> Self
    where
        F: Fn(Vec<String>) -> Vec<String> + Send + Sync + 'static,
    {
        self.body_class_callbacks.push(Box::new(callback));
        self
    }

    pub fn on_admin_bar<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut dyn HostProps) + Send + Sync + 'static,
    {
        self.admin_bar_callbacks.push(Box::new(callback));
        self
    }

    fn callback_counts(&self) -> [usize; 6] {
        [
            self.request_callbacks.len(),
            self.parse_query_callbacks.len(),
            self.query_callbacks.len(),
            self.title_callbacks.len(),
            self.body_class_callbacks.len(),
            self.admin_bar_callbacks.len(),
        ]
    }
}

impl fmt::Debug for RuleOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleOptions")
            .field("regex", &self.regex)
            .field("rewrite", &self.rewrite)
            .field("id", &self.id)
            .field("query", &self.query)
            .field("template", &self.template)
            .field("body_class", &self.body_class)
            .field("access_rule", &self.access_rule)
            .field("permission", &self.permission)
            .field("disable_canonical", &self.disable_canonical)
            .field("parse_query_properties", &self.parse_query_properties)
            .field("post_query_properties", &self.post_query_properties)
            .field("request_methods", &self.request_methods)
            .field("request_method", &self.request_method)
            .field("callbacks", &self.callback_counts())
            .finish()
    }
}

/// Normalize the legacy positional call `(pattern, query, template,
/// extra)` into one option map. Fields the extra map already sets win
/// over the positional values.
pub fn positional(
    pattern: impl Into<String>,
    query: impl Into<Value>,
    template: Option<&str>,
    extra: RuleOptions,
) -> RuleOptions {
    let mut options = extra;
    if options.regex.is_none() {
        options.regex = Some(pattern.into());
    }
    if options.query.is_none() {
        options.query = Some(query.into());
    }
    if options.template.is_none() {
        if let Some(template) = template {
            options.template = Some(template.to_owned());
        }
    }
    options
}

/// Build a rule from options.
///
/// Fails with [`RewriteError::MissingPattern`] when neither `rewrite` nor
/// `regex` carries a pattern, and with [`RewriteError::InvalidArgument`]
/// when `query` is present but not a string.
pub fn build_rule(options: RuleOptions) -> Result<RewriteRule, RewriteError> {
    let RuleOptions {
        regex,
        rewrite,
        id,
        query,
        template,
        body_class,
        access_rule,
        permission,
        disable_canonical,
        parse_query_properties,
        post_query_properties,
        request_methods,
        request_method,
        request_callbacks,
        parse_query_callbacks,
        query_callbacks,
        title_callbacks,
        body_class_callbacks,
        admin_bar_callbacks,
    } = options;

    let pattern = rewrite
        .filter(|pattern| !pattern.is_empty())
        .or(regex)
        .filter(|pattern| !pattern.is_empty())
        .ok_or(RewriteError::MissingPattern)?;

    let mut rule = RewriteRule::with_id(pattern, id.unwrap_or_default());

    if let Some(template) = template.filter(|template| !template.is_empty()) {
        rule.set_template(template);
    }
    for callback in body_class_callbacks {
        rule.push_body_class_callback(callback);
    }
    for callback in request_callbacks {
        rule.push_request_callback(callback);
    }
    for callback in parse_query_callbacks {
        rule.push_parse_query_callback(callback);
    }
    for callback in title_callbacks {
        rule.push_title_callback(callback);
    }
    for callback in query_callbacks {
        rule.push_query_callback(callback);
    }
    if let Some(policy) = access_rule {
        rule.set_access_policy(policy);
    }
    match query {
        None | Some(Value::Null) => {}
        Some(Value::String(spec)) if spec.is_empty() => {}
        Some(value) => rule.set_query_spec(value)?,
    }
    if let Some(policy) = permission {
        rule.set_access_policy(policy);
    }
    for callback in admin_bar_callbacks {
        rule.push_admin_bar_callback(callback);
    }
    if disable_canonical {
        rule.set_disable_canonical_redirect(true);
    }

    // Convenience options compile into callbacks behind the explicit ones.
    if let Some(class) = body_class.filter(|class| !class.is_empty()) {
        rule.add_body_class_callback(move |mut classes| {
            classes.push(class.clone());
            classes
        });
    }
    if let Some(properties) = parse_query_properties {
        let entries = properties.entries();
        if !entries.is_empty() {
            rule.add_parse_query_callback(move |query, _| {
                for (name, value) in &entries {
                    query.set_prop(name, value.clone());
                }
            });
        }
    }
    if let Some(properties) = post_query_properties {
        let entries = properties.entries();
        if !entries.is_empty() {
            rule.add_query_callback(move |query, _| {
                for (name, value) in &entries {
                    query.set_prop(name, value.clone());
                }
            });
        }
    }
    if !request_methods.is_empty() {
        rule.set_allowed_methods(request_methods);
    }
    if let Some(method) = request_method.filter(|method| !method.is_empty()) {
        rule.set_allowed_methods([method]);
    }

    Ok(rule)
}

/// Build a rule and register it in one step. Returns the rule's id.
pub fn add_rewrite_rule(
    registry: &mut RuleRegistry,
    options: RuleOptions,
) -> Result<String, RewriteError> {
    let rule = build_rule(options)?;
    let id = rule.id().to_owned();
    registry.add(rule);
    Ok(id)
}
