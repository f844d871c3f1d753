//! Rewrite rule model.
//!
//! # Data Flow
//! ```text
//! RuleOptions (builder / config file)
//!     → RewriteRule (pattern, query spec, callbacks, policy)
//!     → RuleRegistry (ordered set, lookup by id or pattern)
//!     → dispatch (per-request pipeline borrows one matched rule)
//! ```
//!
//! # Design Decisions
//! - A rule's id defaults to its pattern; an explicit empty id falls back
//!   to the pattern as well, so two anonymous rules on the same pattern
//!   share an identity.
//! - Callbacks are boxed closures attached per stage. Rules are immutable
//!   during dispatch; all per-request bookkeeping lives in the pipeline.
//! - The query spec is a string in wire form. Anything else is rejected at
//!   the point of assignment, not silently coerced.

pub mod query_spec;

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RewriteError;
use crate::host::{HostProps, HostQuery, HostRequest};

/// Outcome of a request-stage callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep running callbacks and stages.
    Continue,
    /// Stop the lifecycle for this request.
    Bail,
}

/// Runs during the request stage; may halt the lifecycle.
pub type RequestCallback = Box<dyn Fn(&mut dyn HostRequest, &RewriteRule) -> Flow + Send + Sync>;

/// Runs against the host query (parse stage and finalize stage).
pub type QueryCallback = Box<dyn Fn(&mut dyn HostQuery, &RewriteRule) + Send + Sync>;

/// Folds the page title; receives the current title and the separator.
pub type TitleCallback = Box<dyn Fn(String, &str) -> String + Send + Sync>;

/// Folds the body class list.
pub type BodyClassCallback = Box<dyn Fn(Vec<String>) -> Vec<String> + Send + Sync>;

/// Decorates the admin bar property bag.
pub type AdminBarCallback = Box<dyn Fn(&mut dyn HostProps) + Send + Sync>;

/// Who may view a matched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPolicy {
    /// No restriction.
    #[default]
    None,
    /// Visitors only; logged-in users are redirected away.
    LoggedOutOnly,
    /// Logged-in users only.
    LoggedInOnly,
    /// Only the user the page is about, matched against the query's
    /// `author` variable.
    #[serde(alias = "displayed_user_only")]
    OwnerOnly,
}

/// A single rewrite rule: URL pattern, query mapping, and the callbacks
/// that run at each lifecycle stage when the rule matches.
pub struct RewriteRule {
    id: String,
    pattern: String,
    query_spec: String,
    template: String,
    access_policy: AccessPolicy,
    allowed_methods: BTreeSet<String>,
    disable_canonical_redirect: bool,
    pub(crate) request_callbacks: Vec<RequestCallback>,
    pub(crate) parse_query_callbacks: Vec<QueryCallback>,
    pub(crate) query_callbacks: Vec<QueryCallback>,
    pub(crate) title_callbacks: Vec<TitleCallback>,
    pub(crate) body_class_callbacks: Vec<BodyClassCallback>,
    pub(crate) admin_bar_callbacks: Vec<AdminBarCallback>,
}

impl RewriteRule {
    /// Create a rule identified by its own pattern.
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        Self {
            id: pattern.clone(),
            pattern,
            query_spec: String::new(),
            template: String::new(),
            access_policy: AccessPolicy::None,
            allowed_methods: BTreeSet::new(),
            disable_canonical_redirect: false,
            request_callbacks: Vec::new(),
            parse_query_callbacks: Vec::new(),
            query_callbacks: Vec::new(),
            title_callbacks: Vec::new(),
            body_class_callbacks: Vec::new(),
            admin_bar_callbacks: Vec::new(),
        }
    }

    /// Create a rule with an explicit id. An empty id falls back to the
    /// pattern, same as [`RewriteRule::new`].
    pub fn with_id(pattern: impl Into<String>, id: impl Into<String>) -> Self {
        let mut rule = Self::new(pattern);
        let id = id.into();
        if !id.is_empty() {
            rule.id = id;
        }
        rule
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The query spec, if one is set. Empty means the rule installs no
    /// query variables and the render stage treats the page as always
    /// resolvable.
    pub fn query_spec(&self) -> Option<&str> {
        (!self.query_spec.is_empty()).then_some(self.query_spec.as_str())
    }

    /// Assign the query spec. Only strings are accepted; every other JSON
    /// shape is an error naming the offending type.
    pub fn set_query_spec(&mut self, spec: impl Into<Value>) -> Result<(), RewriteError> {
        match spec.into() {
            Value::String(spec) => {
                self.query_spec = spec;
                Ok(())
            }
            other => Err(RewriteError::InvalidArgument(value_kind(&other))),
        }
    }

    /// The template name or path, if one is configured.
    pub fn template(&self) -> Option<&str> {
        (!self.template.is_empty()).then_some(self.template.as_str())
    }

    pub fn set_template(&mut self, template: impl Into<String>) {
        self.template = template.into();
    }

    pub fn access_policy(&self) -> AccessPolicy {
        self.access_policy
    }

    pub fn set_access_policy(&mut self, policy: AccessPolicy) {
        self.access_policy = policy;
    }

    /// Methods this rule accepts. Empty means any method.
    pub fn allowed_methods(&self) -> &BTreeSet<String> {
        &self.allowed_methods
    }

    /// Replace the allowed-method set. Methods are stored lowercased so
    /// the dispatch-time comparison is case-insensitive.
    pub fn set_allowed_methods<I, S>(&mut self, methods: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_methods = methods
            .into_iter()
            .map(|method| method.into().to_ascii_lowercase())
            .collect();
    }

    pub fn allow_method(&mut self, method: impl Into<String>) {
        self.allowed_methods.insert(method.into().to_ascii_lowercase());
    }

    /// Case-insensitive method check. An empty set admits everything.
    pub fn method_allowed(&self, method: &str) -> bool {
        self.allowed_methods.is_empty()
            || self.allowed_methods.contains(&method.to_ascii_lowercase())
    }

    pub fn canonical_redirect_disabled(&self) -> bool {
        self.disable_canonical_redirect
    }

    pub fn set_disable_canonical_redirect(&mut self, disable: bool) {
        self.disable_canonical_redirect = disable;
    }

    /// Query pairs in declaration order, values still in wire form.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        query_spec::parse_pairs(&self.query_spec)
    }

    /// Distinct query variable names this rule introduces.
    pub fn query_exports(&self) -> Vec<String> {
        query_spec::export_keys(&self.query_spec)
    }

    pub fn add_request_callback<F>(&mut self, callback: F)
    where
        F: Fn(&mut dyn HostRequest, &RewriteRule) -> Flow + Send + Sync + 'static,
    {
        self.request_callbacks.push(Box::new(callback));
    }

    pub fn add_parse_query_callback<F>(&mut self, callback: F)
    where
        F: Fn(&mut dyn HostQuery, &RewriteRule) + Send + Sync + 'static,
    {
        self.parse_query_callbacks.push(Box::new(callback));
    }

    pub fn add_query_callback<F>(&mut self, callback: F)
    where
        F: Fn(&mut dyn HostQuery, &RewriteRule) + Send + Sync + 'static,
    {
        self.query_callbacks.push(Box::new(callback));
    }

    pub fn add_title_callback<F>(&mut self, callback: F)
    where
        F: Fn(String, &str) -> String + Send + Sync + 'static,
    {
        self.title_callbacks.push(Box::new(callback));
    }

    pub fn add_body_class_callback<F>(&mut self, callback: F)
    where
        F: Fn(Vec<String>) -> Vec<String> + Send + Sync + 'static,
    {
        self.body_class_callbacks.push(Box::new(callback));
    }

    pub fn add_admin_bar_callback<F>(&mut self, callback: F)
    where
        F: Fn(&mut dyn HostProps) + Send + Sync + 'static,
    {
        self.admin_bar_callbacks.push(Box::new(callback));
    }

    pub(crate) fn push_request_callback(&mut self, callback: RequestCallback) {
        self.request_callbacks.push(callback);
    }

    pub(crate) fn push_parse_query_callback(&mut self, callback: QueryCallback) {
        self.parse_query_callbacks.push(callback);
    }

    pub(crate) fn push_query_callback(&mut self, callback: QueryCallback) {
        self.query_callbacks.push(callback);
    }

    pub(crate) fn push_title_callback(&mut self, callback: TitleCallback) {
        self.title_callbacks.push(callback);
    }

    pub(crate) fn push_body_class_callback(&mut self, callback: BodyClassCallback) {
        self.body_class_callbacks.push(callback);
    }

    pub(crate) fn push_admin_bar_callback(&mut self, callback: AdminBarCallback) {
        self.admin_bar_callbacks.push(callback);
    }

    /// Callback counts per stage, in lifecycle order: request, parse
    /// query, query finalize, title, body class, admin bar.
    pub fn callback_counts(&self) -> [usize; 6] {
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

impl fmt::Debug for RewriteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [request, parse_query, query, title, body_class, admin_bar] = self.callback_counts();
        f.debug_struct("RewriteRule")
            .field("id", &self.id)
            .field("pattern", &self.pattern)
            .field("query_spec", &self.query_spec)
            .field("template", &self.template)
            .field("access_policy", &self.access_policy)
            .field("allowed_methods", &self.allowed_methods)
            .field("disable_canonical_redirect", &self.disable_canonical_redirect)
            .field("request_callbacks", &request)
            .field("parse_query_callbacks", &parse_query)
            .field("query_callbacks", &query)
            .field("title_callbacks", &title)
            .field("body_class_callbacks", &body_class)
            .field("admin_bar_callbacks", &admin_bar)
            .finish()
    }
}

/// Short name for a JSON value's shape, used in type-mismatch errors.
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn id_defaults_to_pattern() {
        let rule = RewriteRule::new("^people/([^/]+)/?$");
        assert_eq!(rule.id(), "^people/([^/]+)/?$");
    }

    #[test]
    fn empty_explicit_id_falls_back_to_pattern() {
        let rule = RewriteRule::with_id("^people/?$", "");
        assert_eq!(rule.id(), "^people/?$");

        let named = RewriteRule::with_id("^people/?$", "people-index");
        assert_eq!(named.id(), "people-index");
    }

    #[test]
    fn query_spec_rejects_non_strings() {
        let mut rule = RewriteRule::new("^api/ping/?$");

        assert!(rule.set_query_spec("section=api").is_ok());
        assert_eq!(rule.query_spec(), Some("section=api"));

        let err = rule.set_query_spec(json!({"section": "api"})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "query spec must be a string, got object"
        );
        let err = rule.set_query_spec(json!(42)).unwrap_err();
        assert_eq!(err.to_string(), "query spec must be a string, got number");

        // Failed assignments leave the previous spec in place.
        assert_eq!(rule.query_spec(), Some("section=api"));
    }

    #[test]
    fn method_checks_are_case_insensitive() {
        let mut rule = RewriteRule::new("^login/?$");
        assert!(rule.method_allowed("BREW"));

        rule.set_allowed_methods(["GET", "Post"]);
        assert!(rule.method_allowed("GET"));
        assert!(rule.method_allowed("post"));
        assert!(!rule.method_allowed("DELETE"));
        assert!(rule.allowed_methods().contains("get"));
        assert!(rule.allowed_methods().contains("post"));
    }

    #[test]
    fn callback_counts_follow_lifecycle_order() {
        let mut rule = RewriteRule::new("^x/?$");
        rule.add_request_callback(|_, _| Flow::Continue);
        rule.add_query_callback(|_, _| {});
        rule.add_query_callback(|_, _| {});
        rule.add_title_callback(|title, _| title);

        assert_eq!(rule.callback_counts(), [1, 0, 2, 1, 0, 0]);
    }

    #[test]
    fn access_policy_accepts_legacy_name() {
        let policy: AccessPolicy = serde_json::from_str("\"displayed_user_only\"").unwrap();
        assert_eq!(policy, AccessPolicy::OwnerOnly);

        let policy: AccessPolicy = serde_json::from_str("\"logged_in_only\"").unwrap();
        assert_eq!(policy, AccessPolicy::LoggedInOnly);
    }
}
