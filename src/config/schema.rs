//! Configuration schema definitions.
//!
//! This module defines the rule-file structure. Data options deserialize
//! from TOML; callback attachment stays in code, so file-defined rules
//! carry patterns, query specs, templates, policies, and the convenience
//! options only.

use serde::{Deserialize, Serialize};

use crate::builder::{self, RuleOptions};
use crate::error::RewriteError;
use crate::registry::RuleRegistry;

/// Root of a rule file: a list of `[[rules]]` tables.
///
/// ```toml
/// [[rules]]
/// regex = "^people/([^/]+)/?$"
/// id = "person"
/// query = "author_name=$1"
/// template = "person.html"
/// body_class = "person-profile"
///
/// [[rules]]
/// regex = "^account/?$"
/// access_rule = "logged_in_only"
/// disable_canonical = true
/// ```
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Rule definitions, registered in file order.
    pub rules: Vec<RuleOptions>,
}

impl RewriteConfig {
    /// Build and register every rule in file order. Returns the ids in
    /// registration order.
    pub fn register_all(self, registry: &mut RuleRegistry) -> Result<Vec<String>, RewriteError> {
        let mut ids = Vec::with_capacity(self.rules.len());
        for options in self.rules {
            ids.push(builder::add_rewrite_rule(registry, options)?);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::AccessPolicy;

    #[test]
    fn a_realistic_rule_file_deserializes() {
        let config: RewriteConfig = toml::from_str(
            r#"
            [[rules]]
            regex = "^people/([^/]+)/?$"
            id = "person"
            query = "author_name=$1"
            template = "person.html"
            body_class = "person-profile"

            [[rules]]
            regex = "^people/([^/]+)/files/?$"
            permission = "displayed_user_only"
            request_methods = ["GET", "POST"]

            [[rules]]
            rewrite = "^login/?$"
            access_rule = "logged_out_only"
            disable_canonical = true
            parse_query_properties = "is_home=false"

            [[rules]]
            regex = "^dashboard/?$"

            [rules.post_query_properties]
            is_404 = false
            section = "dashboard"
            "#,
        )
        .unwrap();

        assert_eq!(config.rules.len(), 4);
        assert_eq!(config.rules[0].id.as_deref(), Some("person"));
        assert_eq!(config.rules[1].permission, Some(AccessPolicy::OwnerOnly));
        assert_eq!(config.rules[1].request_methods, vec!["GET", "POST"]);
        assert!(config.rules[2].disable_canonical);
        assert!(config.rules[3].post_query_properties.is_some());
    }

    #[test]
    fn register_all_keeps_file_order() {
        let config: RewriteConfig = toml::from_str(
            r#"
            [[rules]]
            regex = "^a/?$"
            id = "first"

            [[rules]]
            regex = "^b/?$"
            "#,
        )
        .unwrap();

        let mut registry = RuleRegistry::new();
        let ids = config.register_all(&mut registry).unwrap();
        assert_eq!(ids, vec!["first".to_owned(), "^b/?$".to_owned()]);
        assert_eq!(registry.rules()[0].id(), "first");
        assert_eq!(registry.rules()[1].pattern(), "^b/?$");
    }
}
