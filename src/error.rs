//! Engine error types.
//!
//! Construction-time failures only. Dispatch-time conditions (method
//! mismatch, unmatched pattern, unresolvable template) are outcomes the
//! host acts on, not errors; see [`crate::dispatch::DispatchOutcome`].

use thiserror::Error;

/// Errors surfaced while building or configuring rules.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// A query spec was supplied as something other than a string.
    /// Query specs are string-only to match the host's pattern-table
    /// entries exactly.
    #[error("query spec must be a string, got {0}")]
    InvalidArgument(&'static str),

    /// Rule options carried neither `regex` nor `rewrite`.
    #[error("rule options require a `regex` or `rewrite` pattern")]
    MissingPattern,
}
