//! Per-request pipeline.
//!
//! # Responsibilities
//! - Track one request's progress through the lifecycle stages
//! - Run each stage's callbacks in registration order
//! - Enforce the one-shot stages (query parse, query finalize, render)
//!
//! # Design Decisions
//! - The pipeline borrows its matched rule; rules never change during a
//!   request and all per-request bookkeeping lives here, keeping dispatch
//!   reentrant across requests.
//! - Hosts call the stage methods at their own pipeline moments. The
//!   fused [`RequestPipeline::run_render_stage`] covers hosts whose
//!   render hook is a single event, in stage order: query finalize,
//!   access check, template resolution.
//! - Query-finalize callbacks run once per request even when the request
//!   stage bailed. Every other stage stops at a bail.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::redirect;
use super::reply::StatusReply;
use crate::host::{HostEnv, HostProps, HostQuery, HostRequest};
use crate::rule::{AccessPolicy, Flow, RewriteRule};

/// What the request stage decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestStageOutcome {
    /// Method not in the rule's allowed set; send this reply and stop.
    MethodNotAllowed(StatusReply),
    /// A callback bailed; the request is already handled.
    Bailed { callbacks_run: usize },
    /// All callbacks ran without bailing.
    Proceed { callbacks_run: usize },
}

/// Where the template stage landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateResolution {
    /// Render this resolved template file.
    File(PathBuf),
    /// Render the host's standard not-found template.
    NotFound,
    /// No template configured; the host's normal render continues.
    HostDefault,
}

/// Result of the fused render stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderStageOutcome {
    /// An earlier stage already ended the request.
    EarlyExit,
    /// Access denied; send the visitor here and stop.
    Redirect { location: String },
    /// Render this template file and stop.
    Render { template: PathBuf },
    /// Render the host's not-found template and stop.
    RenderNotFound,
    /// Nothing to render here; the host continues as usual.
    HostDefault,
}

/// Lifecycle state for a single matched request.
#[derive(Debug)]
pub struct RequestPipeline<'r> {
    rule: &'r RewriteRule,
    request_id: Uuid,
    blocked: bool,
    bailed: bool,
    redirected: bool,
    parse_query_fired: bool,
    query_callbacks_fired: bool,
    render_consumed: bool,
}

impl<'r> RequestPipeline<'r> {
    pub(crate) fn new(rule: &'r RewriteRule) -> Self {
        Self {
            rule,
            request_id: Uuid::new_v4(),
            blocked: false,
            bailed: false,
            redirected: false,
            parse_query_fired: false,
            query_callbacks_fired: false,
            render_consumed: false,
        }
    }

    pub fn rule(&self) -> &'r RewriteRule {
        self.rule
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// True once the method check has rejected the request.
    pub fn blocked(&self) -> bool {
        self.blocked
    }

    /// True once a request callback has bailed.
    pub fn bailed(&self) -> bool {
        self.bailed
    }

    /// True once the access check has issued a redirect.
    pub fn redirected(&self) -> bool {
        self.redirected
    }

    /// Method check plus request callbacks.
    ///
    /// A disallowed method rejects the request before any callback runs.
    /// The first callback returning [`Flow::Bail`] ends the stage; its
    /// own invocation still counts.
    pub fn run_request_stage(&mut self, request: &mut dyn HostRequest) -> RequestStageOutcome {
        let rule = self.rule;

        if !rule.method_allowed(request.method()) {
            self.blocked = true;
            debug!(
                request_id = %self.request_id,
                rule = %rule.id(),
                method = request.method(),
                "Request method rejected"
            );
            return RequestStageOutcome::MethodNotAllowed(
                StatusReply::error("Invalid request method").with_status(403),
            );
        }

        let mut callbacks_run = 0;
        for callback in &rule.request_callbacks {
            callbacks_run += 1;
            if callback(request, rule) == Flow::Bail {
                self.bailed = true;
                debug!(
                    request_id = %self.request_id,
                    rule = %rule.id(),
                    callbacks_run,
                    "Request stage bailed"
                );
                return RequestStageOutcome::Bailed { callbacks_run };
            }
        }
        RequestStageOutcome::Proceed { callbacks_run }
    }

    /// Query-parse callbacks, run while the host assembles its query,
    /// before the finalize stage. Fires at most once per request;
    /// repeated calls are no-ops. Returns how many callbacks ran.
    pub fn run_parse_query_stage(&mut self, query: &mut dyn HostQuery) -> usize {
        if self.blocked || self.bailed || self.parse_query_fired {
            return 0;
        }
        self.parse_query_fired = true;

        let rule = self.rule;
        for callback in &rule.parse_query_callbacks {
            callback(query, rule);
        }
        rule.parse_query_callbacks.len()
    }

    /// Query-finalize callbacks. Runs once per request, even when the
    /// request stage bailed; only a method rejection suppresses it.
    pub fn run_query_finalize_stage(&mut self, query: &mut dyn HostQuery) -> usize {
        if self.blocked || self.query_callbacks_fired {
            return 0;
        }
        self.query_callbacks_fired = true;

        let rule = self.rule;
        for callback in &rule.query_callbacks {
            callback(query, rule);
        }
        rule.query_callbacks.len()
    }

    /// Evaluate the rule's access policy. Returns the redirect target
    /// when the visitor must leave.
    pub fn run_access_stage(
        &mut self,
        request: &dyn HostRequest,
        query: &dyn HostQuery,
        env: &dyn HostEnv,
    ) -> Option<String> {
        if self.blocked || self.bailed || self.redirected {
            return None;
        }

        let denied = match self.rule.access_policy() {
            AccessPolicy::None => false,
            AccessPolicy::LoggedOutOnly => env.current_user().is_some(),
            AccessPolicy::LoggedInOnly => env.current_user().is_none(),
            AccessPolicy::OwnerOnly => match env.current_user() {
                None => true,
                Some(user) => !author_matches(query, &user),
            },
        };
        if !denied {
            return None;
        }

        self.redirected = true;
        let location = redirect::redirect_target(request, env);
        debug!(
            request_id = %self.request_id,
            rule = %self.rule.id(),
            location = %location,
            "Access denied, redirecting"
        );
        Some(location)
    }

    /// Resolve what to render. Consumed on first call; later calls and
    /// already-ended requests get `None`.
    ///
    /// A query that came up empty on a rule with no query spec overrides
    /// everything else, including a configured template.
    pub fn run_template_stage(
        &mut self,
        query: &dyn HostQuery,
        env: &dyn HostEnv,
    ) -> Option<TemplateResolution> {
        if self.blocked || self.bailed || self.redirected || self.render_consumed {
            return None;
        }
        self.render_consumed = true;

        if self.rule.query_spec().is_none() && query.is_not_found() {
            debug!(
                request_id = %self.request_id,
                rule = %self.rule.id(),
                "Query found nothing, handing off to not-found template"
            );
            return Some(TemplateResolution::NotFound);
        }

        let Some(template) = self.rule.template() else {
            return Some(TemplateResolution::HostDefault);
        };

        let exact = Path::new(template);
        if env.template_file_exists(exact) {
            debug!(request_id = %self.request_id, template = %exact.display(), "Template resolved");
            return Some(TemplateResolution::File(exact.to_path_buf()));
        }
        match env.locate_template(template) {
            Some(path) => {
                debug!(request_id = %self.request_id, template = %path.display(), "Template resolved");
                Some(TemplateResolution::File(path))
            }
            None => {
                debug!(request_id = %self.request_id, template, "Template missing");
                Some(TemplateResolution::NotFound)
            }
        }
    }

    /// The single-event render hook, for hosts whose pipeline fires one
    /// render moment. Stage order inside:
    ///
    /// 1. Query-finalize callbacks (run even after a bail)
    /// 2. Access check
    /// 3. Template resolution
    pub fn run_render_stage(
        &mut self,
        request: &dyn HostRequest,
        query: &mut dyn HostQuery,
        env: &dyn HostEnv,
    ) -> RenderStageOutcome {
        self.run_query_finalize_stage(query);

        if self.blocked || self.bailed {
            return RenderStageOutcome::EarlyExit;
        }
        if let Some(location) = self.run_access_stage(request, query, env) {
            return RenderStageOutcome::Redirect { location };
        }
        match self.run_template_stage(query, env) {
            Some(TemplateResolution::File(template)) => RenderStageOutcome::Render { template },
            Some(TemplateResolution::NotFound) => RenderStageOutcome::RenderNotFound,
            Some(TemplateResolution::HostDefault) => RenderStageOutcome::HostDefault,
            None => RenderStageOutcome::EarlyExit,
        }
    }

    /// Fold the title callbacks over the current title.
    pub fn filter_title(&self, title: String, separator: &str) -> String {
        if self.decorations_suppressed() {
            return title;
        }
        self.rule
            .title_callbacks
            .iter()
            .fold(title, |title, callback| callback(title, separator))
    }

    /// Fold the body-class callbacks over the current class list.
    pub fn filter_body_classes(&self, classes: Vec<String>) -> Vec<String> {
        if self.decorations_suppressed() {
            return classes;
        }
        self.rule
            .body_class_callbacks
            .iter()
            .fold(classes, |classes, callback| callback(classes))
    }

    /// Run the admin-bar callbacks against the host's bar properties.
    /// Returns how many callbacks ran.
    pub fn decorate_admin_bar(&self, bar: &mut dyn HostProps) -> usize {
        if self.decorations_suppressed() {
            return 0;
        }
        for callback in &self.rule.admin_bar_callbacks {
            callback(bar);
        }
        self.rule.admin_bar_callbacks.len()
    }

    /// Suppress the host's canonical redirect when the rule asks for it.
    /// Requests that never reached the render pipeline pass the target
    /// through untouched.
    pub fn filter_canonical_redirect(&self, target: Option<String>) -> Option<String> {
        if self.blocked || self.bailed {
            return target;
        }
        if self.rule.canonical_redirect_disabled() {
            None
        } else {
            target
        }
    }

    fn decorations_suppressed(&self) -> bool {
        self.blocked || self.bailed || self.redirected
    }
}

/// Loose equality between the query's `author` variable and a user
/// identity, tolerating numeric author ids.
fn author_matches(query: &dyn HostQuery, user: &str) -> bool {
    match query.prop("author") {
        Some(Value::String(author)) => author == user,
        Some(Value::Number(author)) => author.to_string() == user,
        _ => false,
    }
}
