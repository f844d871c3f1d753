//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Host reports the matched pattern
//!     → begin_request (registry lookup; silent None when no rule owns it)
//!     → RequestPipeline stage methods
//!         hosts with their own event pipeline call each at the right moment
//!     → dispatch() single-call driver for everyone else
//!     → DispatchReport
//!         stages:  ordered per-stage records
//!         outcome: terminal effect the host applies (403 / redirect / render)
//!         page:    folded title, body classes, admin bar, canonical target
//! ```
//!
//! # Design Decisions
//! - The driver and the stage methods share one state machine; the driver
//!   is just the stages called in lifecycle order with records taken.
//! - Parse-query fires while the query is assembled, before finalize and
//!   the access check, so property writes made there are what the access
//!   check reads.
//! - Stage records make the one quirk visible instead of papering over
//!   it: a bailed request still shows its query-finalize stage completed.
//! - Outcomes carry everything the host needs to act; the engine never
//!   writes to a socket itself.

pub mod pipeline;
pub mod redirect;
pub mod reply;

use std::path::PathBuf;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, trace};

pub use pipeline::{RenderStageOutcome, RequestPipeline, RequestStageOutcome, TemplateResolution};
pub use reply::StatusReply;

use crate::host::{HostEnv, HostQuery, HostRequest};
use crate::observability::metrics;
use crate::registry::RuleRegistry;

/// Lifecycle stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    MethodCheck,
    RequestCallbacks,
    ParseQuery,
    QueryFinalize,
    AccessCheck,
    Render,
    Decorate,
}

/// How a stage ended, with the number of callbacks it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    Completed { callbacks: usize },
    Skipped,
    Halted { callbacks: usize },
}

/// One stage's entry in the dispatch report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageRecord {
    pub stage: Stage,
    #[serde(flatten)]
    pub status: StageStatus,
}

impl StageRecord {
    fn completed(stage: Stage, callbacks: usize) -> Self {
        Self {
            stage,
            status: StageStatus::Completed { callbacks },
        }
    }

    fn skipped(stage: Stage) -> Self {
        Self {
            stage,
            status: StageStatus::Skipped,
        }
    }

    fn halted(stage: Stage, callbacks: usize) -> Self {
        Self {
            stage,
            status: StageStatus::Halted { callbacks },
        }
    }
}

/// The terminal effect of a dispatch, for the host to apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// No rule owns the matched pattern; nothing happened.
    Unmatched,
    /// Send this reply with its HTTP status and stop.
    MethodNotAllowed { reply: StatusReply },
    /// A request callback handled the request itself.
    Bailed,
    /// Send the visitor to this location and stop.
    Redirect { location: String },
    /// Render this template file and stop.
    Render { template: PathBuf },
    /// Render the host's standard not-found template and stop.
    RenderNotFound,
    /// The host's normal render pipeline continues.
    Continue,
}

impl DispatchOutcome {
    /// Fixed label vocabulary for the dispatch counter.
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::Unmatched => "unmatched",
            Self::MethodNotAllowed { .. } => "method_not_allowed",
            Self::Bailed => "bailed",
            Self::Redirect { .. } => "redirect",
            Self::Render { .. } => "render",
            Self::RenderNotFound => "render_not_found",
            Self::Continue => "continue",
        }
    }
}

/// Page assembly state the decoration stage folds over.
///
/// Hosts seed it with their own title, separator, class list, and
/// canonical-redirect target, then apply whatever comes back.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageState {
    pub title: String,
    pub title_separator: String,
    pub body_classes: Vec<String>,
    pub canonical_redirect: Option<String>,
    pub admin_bar: Map<String, Value>,
}

impl PageState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Everything one dispatch produced.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub stages: Vec<StageRecord>,
    pub outcome: DispatchOutcome,
    pub page: PageState,
}

/// Look up the rule owning a matched pattern and open a pipeline for it.
///
/// `None` when no rule owns the pattern; the host carries on as if the
/// engine were not installed.
pub fn begin_request<'r>(
    registry: &'r RuleRegistry,
    matched_pattern: &str,
) -> Option<RequestPipeline<'r>> {
    match registry.get_by_pattern(matched_pattern) {
        Some(rule) => {
            debug!(pattern = matched_pattern, rule = %rule.id(), "Pattern matched");
            Some(RequestPipeline::new(rule))
        }
        None => {
            trace!(pattern = matched_pattern, "No rule owns the matched pattern");
            None
        }
    }
}

/// Run the full lifecycle for one request with default page state.
pub fn dispatch(
    registry: &RuleRegistry,
    matched_pattern: &str,
    request: &mut dyn HostRequest,
    query: &mut dyn HostQuery,
    env: &dyn HostEnv,
) -> DispatchReport {
    dispatch_with_page(
        registry,
        matched_pattern,
        request,
        query,
        env,
        PageState::default(),
    )
}

/// Run the full lifecycle for one request, folding decorations over the
/// host's seeded page state.
pub fn dispatch_with_page(
    registry: &RuleRegistry,
    matched_pattern: &str,
    request: &mut dyn HostRequest,
    query: &mut dyn HostQuery,
    env: &dyn HostEnv,
    mut page: PageState,
) -> DispatchReport {
    let Some(mut pipeline) = begin_request(registry, matched_pattern) else {
        metrics::record_dispatch(DispatchOutcome::Unmatched.metric_label());
        return DispatchReport {
            stages: Vec::new(),
            outcome: DispatchOutcome::Unmatched,
            page,
        };
    };

    let mut stages = Vec::with_capacity(7);
    let mut outcome = None;

    // 1. Method check and request callbacks.
    match pipeline.run_request_stage(request) {
        RequestStageOutcome::MethodNotAllowed(reply) => {
            stages.push(StageRecord::halted(Stage::MethodCheck, 0));
            stages.push(StageRecord::skipped(Stage::RequestCallbacks));
            outcome = Some(DispatchOutcome::MethodNotAllowed { reply });
        }
        RequestStageOutcome::Bailed { callbacks_run } => {
            stages.push(StageRecord::completed(Stage::MethodCheck, 0));
            stages.push(StageRecord::halted(Stage::RequestCallbacks, callbacks_run));
            outcome = Some(DispatchOutcome::Bailed);
        }
        RequestStageOutcome::Proceed { callbacks_run } => {
            stages.push(StageRecord::completed(Stage::MethodCheck, 0));
            stages.push(StageRecord::completed(Stage::RequestCallbacks, callbacks_run));
        }
    }

    // 2. Parse query. Fires while the host assembles its query, ahead
    //    of finalize and the access check; a method rejection or a bail
    //    keeps it off.
    if pipeline.blocked() || pipeline.bailed() {
        stages.push(StageRecord::skipped(Stage::ParseQuery));
    } else {
        let ran = pipeline.run_parse_query_stage(query);
        stages.push(StageRecord::completed(Stage::ParseQuery, ran));
    }

    // 3. Query finalize. Still runs after a bail; only a method
    //    rejection skips it.
    if pipeline.blocked() {
        stages.push(StageRecord::skipped(Stage::QueryFinalize));
    } else {
        let ran = pipeline.run_query_finalize_stage(query);
        stages.push(StageRecord::completed(Stage::QueryFinalize, ran));
    }

    // 4. Access check, render, decorations.
    if pipeline.blocked() || pipeline.bailed() {
        stages.push(StageRecord::skipped(Stage::AccessCheck));
        stages.push(StageRecord::skipped(Stage::Render));
        stages.push(StageRecord::skipped(Stage::Decorate));
    } else if let Some(location) = pipeline.run_access_stage(request, query, env) {
        stages.push(StageRecord::halted(Stage::AccessCheck, 0));
        stages.push(StageRecord::skipped(Stage::Render));
        stages.push(StageRecord::skipped(Stage::Decorate));
        outcome = Some(DispatchOutcome::Redirect { location });
    } else {
        stages.push(StageRecord::completed(Stage::AccessCheck, 0));
        outcome = Some(match pipeline.run_template_stage(query, env) {
            Some(TemplateResolution::File(template)) => DispatchOutcome::Render { template },
            Some(TemplateResolution::NotFound) => DispatchOutcome::RenderNotFound,
            Some(TemplateResolution::HostDefault) | None => DispatchOutcome::Continue,
        });
        stages.push(StageRecord::completed(Stage::Render, 0));

        let title = std::mem::take(&mut page.title);
        page.title = pipeline.filter_title(title, &page.title_separator);
        let classes = std::mem::take(&mut page.body_classes);
        page.body_classes = pipeline.filter_body_classes(classes);
        let mut decoration_callbacks = pipeline.decorate_admin_bar(&mut page.admin_bar);
        page.canonical_redirect =
            pipeline.filter_canonical_redirect(page.canonical_redirect.take());
        let [_, _, _, title_callbacks, body_callbacks, _] = pipeline.rule().callback_counts();
        decoration_callbacks += title_callbacks + body_callbacks;
        stages.push(StageRecord::completed(Stage::Decorate, decoration_callbacks));
    }

    let outcome = outcome.unwrap_or(DispatchOutcome::Continue);
    debug!(
        request_id = %pipeline.request_id(),
        rule = %pipeline.rule().id(),
        outcome = outcome.metric_label(),
        "Dispatch complete"
    );
    metrics::record_dispatch(outcome.metric_label());

    DispatchReport {
        stages,
        outcome,
        page,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::{MemoryEnv, MemoryQuery, MemoryRequest};
    use crate::host::HostProps;
    use crate::rule::RewriteRule;

    #[test]
    fn unowned_patterns_dispatch_to_nothing() {
        let registry = RuleRegistry::new();
        let mut request = MemoryRequest::new("GET");
        let mut query = MemoryQuery::new();

        let report = dispatch(
            &registry,
            "^nobody/?$",
            &mut request,
            &mut query,
            &MemoryEnv::new(),
        );
        assert_eq!(report.outcome, DispatchOutcome::Unmatched);
        assert!(report.stages.is_empty());
    }

    #[test]
    fn a_plain_rule_walks_every_stage() {
        let mut registry = RuleRegistry::new();
        let mut rule = RewriteRule::new("^people/?$");
        rule.set_query_spec("section=people").unwrap();
        registry.add(rule);

        let mut request = MemoryRequest::new("GET");
        let mut query = MemoryQuery::new();
        let report = dispatch(
            &registry,
            "^people/?$",
            &mut request,
            &mut query,
            &MemoryEnv::new(),
        );

        assert_eq!(report.outcome, DispatchOutcome::Continue);
        let statuses: Vec<StageStatus> = report.stages.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![StageStatus::Completed { callbacks: 0 }; 7]
        );
        let order: Vec<Stage> = report.stages.iter().map(|r| r.stage).collect();
        assert_eq!(
            order,
            vec![
                Stage::MethodCheck,
                Stage::RequestCallbacks,
                Stage::ParseQuery,
                Stage::QueryFinalize,
                Stage::AccessCheck,
                Stage::Render,
                Stage::Decorate,
            ]
        );
    }

    #[test]
    fn bail_still_shows_a_completed_query_finalize() {
        let mut registry = RuleRegistry::new();
        let mut rule = RewriteRule::new("^api/ping/?$");
        rule.add_request_callback(|_, _| crate::rule::Flow::Bail);
        rule.add_query_callback(|query, _| query.set_prop("finalized", true.into()));
        registry.add(rule);

        let mut request = MemoryRequest::new("GET");
        let mut query = MemoryQuery::new();
        let report = dispatch(
            &registry,
            "^api/ping/?$",
            &mut request,
            &mut query,
            &MemoryEnv::new(),
        );

        assert_eq!(report.outcome, DispatchOutcome::Bailed);
        assert_eq!(
            report.stages,
            vec![
                StageRecord::completed(Stage::MethodCheck, 0),
                StageRecord::halted(Stage::RequestCallbacks, 1),
                StageRecord::skipped(Stage::ParseQuery),
                StageRecord::completed(Stage::QueryFinalize, 1),
                StageRecord::skipped(Stage::AccessCheck),
                StageRecord::skipped(Stage::Render),
                StageRecord::skipped(Stage::Decorate),
            ]
        );
        assert_eq!(query.prop("finalized"), Some(true.into()));
    }
}
