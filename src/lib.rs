//! URL rewrite rules with a per-request dispatch lifecycle.
//!
//! Rules pair a URL pattern with a query spec, a template, an access
//! policy, and per-stage callbacks. The host's router reports which
//! pattern matched; the engine runs the lifecycle and hands back what to
//! do: reject, redirect, render, or carry on.
//!
//! ```text
//!  rule files ──▶ config ──▶ builder ──▶ registry ──▶ pattern table /
//!  code rules ──────────────▶              │          query-var exports ──▶ host router
//!                                          │
//!  matched pattern ──▶ dispatch ◀──────────┘
//!      │
//!      ▼
//!  method check → request callbacks → parse query → query finalize
//!      → access check → render → decorate
//!      │
//!      ▼
//!  DispatchReport: outcome (403 / redirect / template / continue)
//!                  + folded page state (title, classes, admin bar)
//! ```
//!
//! Hosts plug in through the [`host`] traits; the in-memory adapters in
//! [`host::memory`] back the tests and the demo binary.

pub mod builder;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod observability;
pub mod registry;
pub mod rule;

pub use builder::{add_rewrite_rule, build_rule, positional, PropertySpec, RuleOptions};
pub use config::RewriteConfig;
pub use dispatch::{
    begin_request, dispatch, dispatch_with_page, DispatchOutcome, DispatchReport, PageState,
    RequestPipeline, StatusReply,
};
pub use error::RewriteError;
pub use registry::RuleRegistry;
pub use rule::{AccessPolicy, Flow, RewriteRule};
