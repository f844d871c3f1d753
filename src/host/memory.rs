//! Map-backed host adapters.
//!
//! Complete, in-memory implementations of the `host` traits. The test
//! suite and the demo host run on these; real hosts implement the traits
//! over their own runtime objects instead.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::{HostEnv, HostProps, HostQuery, HostRequest};

/// In-memory request: method, raw parameters, and a property bag.
#[derive(Debug, Default)]
pub struct MemoryRequest {
    method: String,
    params: BTreeMap<String, String>,
    props: BTreeMap<String, Value>,
}

impl MemoryRequest {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ..Self::default()
        }
    }

    /// Attach a raw request parameter (e.g. `redirect_to`).
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

impl HostProps for MemoryRequest {
    fn set_prop(&mut self, name: &str, value: Value) {
        self.props.insert(name.to_owned(), value);
    }

    fn prop(&self, name: &str) -> Option<Value> {
        self.props.get(name).cloned()
    }
}

impl HostRequest for MemoryRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn param(&self, name: &str) -> Option<String> {
        self.params.get(name).cloned()
    }
}

/// In-memory query: a property bag plus the not-found flag.
#[derive(Debug, Default)]
pub struct MemoryQuery {
    props: BTreeMap<String, Value>,
    not_found: bool,
}

impl MemoryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the query as having resolved to "no content".
    pub fn not_found(mut self) -> Self {
        self.not_found = true;
        self
    }

    pub fn with_prop(mut self, name: impl Into<String>, value: Value) -> Self {
        self.props.insert(name.into(), value);
        self
    }
}

impl HostProps for MemoryQuery {
    fn set_prop(&mut self, name: &str, value: Value) {
        self.props.insert(name.to_owned(), value);
    }

    fn prop(&self, name: &str) -> Option<Value> {
        self.props.get(name).cloned()
    }
}

impl HostQuery for MemoryQuery {
    fn is_not_found(&self) -> bool {
        self.not_found
    }
}

/// Fixed-capability environment.
///
/// `templates` maps relative template names to resolved paths;
/// `existing_files` is the set of paths treated as present on disk, so
/// tests never hit the real filesystem.
#[derive(Debug, Clone)]
pub struct MemoryEnv {
    pub user: Option<String>,
    pub site_root: String,
    pub templates: BTreeMap<String, PathBuf>,
    pub existing_files: Vec<PathBuf>,
}

impl Default for MemoryEnv {
    fn default() -> Self {
        Self {
            user: None,
            site_root: "/".to_owned(),
            templates: BTreeMap::new(),
            existing_files: Vec::new(),
        }
    }
}

impl MemoryEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logged_in(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Register a relative template name the host lookup can resolve.
    pub fn with_template(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.existing_files.push(path.clone());
        self.templates.insert(name.into(), path);
        self
    }

    /// Register an exact path treated as present on disk.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.existing_files.push(path.into());
        self
    }
}

impl HostEnv for MemoryEnv {
    fn current_user(&self) -> Option<String> {
        self.user.clone()
    }

    fn site_root(&self) -> String {
        self.site_root.clone()
    }

    fn locate_template(&self, name: &str) -> Option<PathBuf> {
        self.templates.get(name).cloned()
    }

    fn template_file_exists(&self, path: &Path) -> bool {
        self.existing_files.iter().any(|known| known == path)
    }
}
