//! Host-interop interfaces.
//!
//! # Responsibilities
//! - Define the narrow surface the engine needs from its host runtime
//! - Keep host-owned objects opaque: the engine only reads and writes
//!   named properties on them
//! - Ship map-backed adapters for tests and the demo host
//!
//! # Design Decisions
//! - Property values are `serde_json::Value` so hosts with typed query
//!   variables and hosts with stringly ones both fit
//! - Template existence checks go through `HostEnv` so the dispatch
//!   stages stay testable without touching the filesystem

pub mod memory;

use std::path::{Path, PathBuf};

use serde_json::Value;

/// Named-property surface shared by every host-owned object the engine
/// mutates (request, query, admin bar).
pub trait HostProps {
    /// Assign a property, replacing any previous value.
    fn set_prop(&mut self, name: &str, value: Value);

    /// Read a property back, if assigned.
    fn prop(&self, name: &str) -> Option<Value>;
}

/// The host's per-request object.
pub trait HostRequest: HostProps {
    /// HTTP method as received. Matching against a rule's allowed
    /// methods is case-insensitive.
    fn method(&self) -> &str;

    /// Request parameter, e.g. `redirect_to`, in whatever form the host
    /// runtime exposes it. The engine applies one more percent-decode
    /// when it consumes a value, so implementations must not re-encode.
    fn param(&self, name: &str) -> Option<String>;
}

/// The host's content query object for the current request.
///
/// The access check reads the `author` property from here.
pub trait HostQuery: HostProps {
    /// Whether the host's query resolved to "no content".
    fn is_not_found(&self) -> bool;
}

/// Host runtime capabilities the dispatch stages consult.
pub trait HostEnv {
    /// Identity of the authenticated user, if any.
    fn current_user(&self) -> Option<String>;

    /// Absolute URL (or path) of the site root; the fallback target for
    /// access-denial redirects.
    fn site_root(&self) -> String;

    /// Resolve a relative template name through the host's own lookup
    /// chain. Returns an existing file or `None`.
    fn locate_template(&self, name: &str) -> Option<PathBuf>;

    /// Whether `path` is an existing template file.
    fn template_file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// The admin-bar object is just another property bag to the engine.
impl HostProps for serde_json::Map<String, Value> {
    fn set_prop(&mut self, name: &str, value: Value) {
        self.insert(name.to_owned(), value);
    }

    fn prop(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}
