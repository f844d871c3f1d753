//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! rule file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, all errors collected)
//!     → RewriteConfig (validated)
//!     → register_all → RuleRegistry (build + add in file order)
//! ```
//!
//! # Design Decisions
//! - A rule file only carries data options; callbacks attach in code
//!   after registration, looked up by rule id
//! - Validation separates syntactic (serde) from semantic checks
//! - File order is registration order, so file order is precedence order

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_rules, parse_rules, ConfigError};
pub use schema::RewriteConfig;
pub use validation::{validate_rules, ValidationError};
