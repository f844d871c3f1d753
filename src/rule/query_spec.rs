//! Query-spec string handling.
//!
//! A query spec is a URL-style pair list (`"section=people&page=$1"`)
//! describing the host query variables a rule installs. Values stay raw
//! here; placeholder substitution is the host's concern.

/// Split a spec into ordered key/value pairs.
///
/// Empty segments (from leading, trailing, or doubled `&`) are dropped.
/// A segment without `=` becomes a key with an empty value.
pub fn parse_pairs(spec: &str) -> Vec<(String, String)> {
    spec.split('&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.split_once('=') {
            Some((key, value)) => (key.to_owned(), value.to_owned()),
            None => (segment.to_owned(), String::new()),
        })
        .collect()
}

/// The distinct keys a spec introduces, in first-seen order.
pub fn export_keys(spec: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for (key, _) in parse_pairs(spec) {
        if !keys.iter().any(|known| *known == key) {
            keys.push(key);
        }
    }
    keys
}
