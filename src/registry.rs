//! Rule registry.
//!
//! # Responsibilities
//! - Hold registered rules in insertion order
//! - Serve id and pattern lookups for dispatch
//! - Contribute pattern-table entries and query-variable exports to the host
//!
//! # Design Decisions
//! - Plain ordered `Vec`, no interior mutability. Rules are registered
//!   during host setup and read during dispatch; a host that mutates the
//!   registry concurrently wraps it in its own lock.
//! - Contributions merge ahead of the host's existing entries and win on
//!   duplicate patterns. A table the host already published is unaffected
//!   until it rebuilds.

use tracing::debug;

use crate::observability::metrics;
use crate::rule::RewriteRule;

/// Ordered collection of rewrite rules.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    rules: Vec<RewriteRule>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule. Registration order is precedence order: for
    /// duplicate patterns, the earlier rule owns the table entry.
    pub fn add(&mut self, rule: RewriteRule) {
        debug!(id = %rule.id(), pattern = %rule.pattern(), "rule registered");
        self.rules.push(rule);
        metrics::record_registry_size(self.rules.len());
    }

    /// Remove every rule with the given id, not just the first. Returns
    /// how many came out.
    pub fn remove(&mut self, id: &str) -> usize {
        let before = self.rules.len();
        self.rules.retain(|rule| rule.id() != id);
        let removed = before - self.rules.len();
        if removed > 0 {
            debug!(id, removed, "rules removed");
            metrics::record_registry_size(self.rules.len());
        }
        removed
    }

    /// Remove every rule whose (pattern, id) identity pair matches.
    pub fn remove_exact(&mut self, pattern: &str, id: &str) -> usize {
        let before = self.rules.len();
        self.rules
            .retain(|rule| !(rule.pattern() == pattern && rule.id() == id));
        let removed = before - self.rules.len();
        if removed > 0 {
            debug!(pattern, id, removed, "rules removed");
            metrics::record_registry_size(self.rules.len());
        }
        removed
    }

    /// First rule with the given id.
    pub fn get_by_id(&self, id: &str) -> Option<&RewriteRule> {
        self.rules.iter().find(|rule| rule.id() == id)
    }

    pub fn get_by_id_mut(&mut self, id: &str) -> Option<&mut RewriteRule> {
        self.rules.iter_mut().find(|rule| rule.id() == id)
    }

    /// First rule whose pattern is exactly the given string.
    pub fn get_by_pattern(&self, pattern: &str) -> Option<&RewriteRule> {
        self.rules.iter().find(|rule| rule.pattern() == pattern)
    }

    /// Live view of all rules in registration order.
    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Merge our (pattern, query spec) entries ahead of the host's
    /// existing table. Our entries win on duplicate patterns; among our
    /// own rules the first registration of a pattern wins.
    pub fn pattern_table(&self, existing: &[(String, String)]) -> Vec<(String, String)> {
        let mut table: Vec<(String, String)> =
            Vec::with_capacity(self.rules.len() + existing.len());
        for rule in &self.rules {
            if !table.iter().any(|(pattern, _)| pattern.as_str() == rule.pattern()) {
                table.push((
                    rule.pattern().to_owned(),
                    rule.query_spec().unwrap_or_default().to_owned(),
                ));
            }
        }
        for (pattern, query) in existing {
            if !table.iter().any(|(known, _)| known == pattern) {
                table.push((pattern.clone(), query.clone()));
            }
        }
        table
    }

    /// Every query-variable name the registered rules export, flattened
    /// and deduplicated, ahead of the host's existing allowlist.
    pub fn query_var_exports(&self, existing: &[String]) -> Vec<String> {
        let mut vars: Vec<String> = Vec::new();
        for rule in &self.rules {
            for key in rule.query_exports() {
                if !vars.contains(&key) {
                    vars.push(key);
                }
            }
        }
        for name in existing {
            if !vars.contains(name) {
                vars.push(name.clone());
            }
        }
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, id: &str) -> RewriteRule {
        RewriteRule::with_id(pattern, id)
    }

    #[test]
    fn lookups_return_first_match() {
        let mut registry = RuleRegistry::new();
        registry.add(rule("^a/?$", "first"));
        registry.add(rule("^b/?$", "dup"));
        registry.add(rule("^c/?$", "dup"));

        assert_eq!(registry.get_by_id("dup").unwrap().pattern(), "^b/?$");
        assert_eq!(registry.get_by_pattern("^c/?$").unwrap().id(), "dup");
        assert!(registry.get_by_id("missing").is_none());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn remove_takes_every_rule_with_the_id() {
        let mut registry = RuleRegistry::new();
        registry.add(rule("^a/?$", "dup"));
        registry.add(rule("^b/?$", "keep"));
        registry.add(rule("^c/?$", "dup"));

        assert_eq!(registry.remove("dup"), 2);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.rules()[0].id(), "keep");
        assert_eq!(registry.remove("dup"), 0);
    }

    #[test]
    fn remove_exact_needs_both_halves_of_the_identity() {
        let mut registry = RuleRegistry::new();
        registry.add(rule("^a/?$", "shared"));
        registry.add(rule("^b/?$", "shared"));

        assert_eq!(registry.remove_exact("^a/?$", "shared"), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.rules()[0].pattern(), "^b/?$");
    }

    #[test]
    fn pattern_table_merges_ahead_of_existing_entries() {
        let mut registry = RuleRegistry::new();
        let mut people = rule("^people/([^/]+)/?$", "person");
        people.set_query_spec("author_name=$1").unwrap();
        registry.add(people);
        registry.add(rule("^ping/?$", "ping"));

        let existing = vec![
            ("^people/([^/]+)/?$".to_owned(), "stale=1".to_owned()),
            ("^feed/?$".to_owned(), "feed=rss2".to_owned()),
        ];
        let table = registry.pattern_table(&existing);

        assert_eq!(
            table,
            vec![
                ("^people/([^/]+)/?$".to_owned(), "author_name=$1".to_owned()),
                ("^ping/?$".to_owned(), String::new()),
                ("^feed/?$".to_owned(), "feed=rss2".to_owned()),
            ]
        );
    }

    #[test]
    fn query_var_exports_flatten_without_duplicates() {
        let mut registry = RuleRegistry::new();
        let mut a = rule("^a/?$", "a");
        a.set_query_spec("section=people&page=$1").unwrap();
        registry.add(a);
        let mut b = rule("^b/?$", "b");
        b.set_query_spec("page=$1&tab=files").unwrap();
        registry.add(b);

        let vars = registry.query_var_exports(&["page".to_owned(), "s".to_owned()]);
        assert_eq!(
            vars,
            vec![
                "section".to_owned(),
                "page".to_owned(),
                "tab".to_owned(),
                "s".to_owned(),
            ]
        );
    }
}
