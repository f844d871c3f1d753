//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Catch rules that would fail or misbehave at build time: missing or
//!   empty patterns, non-string query specs, empty method entries
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RewriteConfig → Result<(), Vec<ValidationError>>
//! - Runs before any rule reaches the registry

use std::fmt;

use serde_json::Value;

use crate::config::schema::RewriteConfig;
use crate::rule::value_kind;

/// One problem found in a rule file. `index` is the rule's position in
/// the file, starting at zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingPattern { index: usize },
    EmptyPattern { index: usize },
    QueryNotString { index: usize, found: &'static str },
    EmptyMethod { index: usize, position: usize },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingPattern { index } => {
                write!(f, "rule {}: missing a `regex` or `rewrite` pattern", index)
            }
            ValidationError::EmptyPattern { index } => {
                write!(f, "rule {}: pattern is empty", index)
            }
            ValidationError::QueryNotString { index, found } => {
                write!(f, "rule {}: `query` must be a string, got {}", index, found)
            }
            ValidationError::EmptyMethod { index, position } => {
                write!(f, "rule {}: request method {} is empty", index, position)
            }
        }
    }
}

/// Check every rule, collecting all problems before reporting.
pub fn validate_rules(config: &RewriteConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (index, rule) in config.rules.iter().enumerate() {
        let effective_pattern = rule
            .rewrite
            .as_deref()
            .filter(|pattern| !pattern.is_empty())
            .or(rule.regex.as_deref());
        match effective_pattern {
            None if rule.rewrite.is_none() && rule.regex.is_none() => {
                errors.push(ValidationError::MissingPattern { index });
            }
            None | Some("") => errors.push(ValidationError::EmptyPattern { index }),
            Some(_) => {}
        }

        match &rule.query {
            None | Some(Value::Null) | Some(Value::String(_)) => {}
            Some(other) => errors.push(ValidationError::QueryNotString {
                index,
                found: value_kind(other),
            }),
        }

        for (position, method) in rule.request_methods.iter().enumerate() {
            if method.trim().is_empty() {
                errors.push(ValidationError::EmptyMethod { index, position });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> RewriteConfig {
        toml::from_str(content).unwrap()
    }

    #[test]
    fn a_clean_file_passes() {
        let config = parse(
            r#"
            [[rules]]
            regex = "^people/?$"
            query = "section=people"

            [[rules]]
            rewrite = "^login/?$"
            request_methods = ["GET", "POST"]
            "#,
        );
        assert_eq!(validate_rules(&config), Ok(()));
    }

    #[test]
    fn every_problem_is_reported_at_once() {
        let config = parse(
            r#"
            [[rules]]
            template = "orphan.html"

            [[rules]]
            regex = ""

            [[rules]]
            regex = "^ok/?$"
            query = 42
            request_methods = ["GET", ""]
            "#,
        );

        let errors = validate_rules(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::MissingPattern { index: 0 },
                ValidationError::EmptyPattern { index: 1 },
                ValidationError::QueryNotString {
                    index: 2,
                    found: "number"
                },
                ValidationError::EmptyMethod {
                    index: 2,
                    position: 1
                },
            ]
        );
    }

    #[test]
    fn messages_name_the_offending_rule() {
        let error = ValidationError::QueryNotString {
            index: 3,
            found: "array",
        };
        assert_eq!(error.to_string(), "rule 3: `query` must be a string, got array");
    }
}
