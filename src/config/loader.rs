//! Rule-file loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::RewriteConfig;
use crate::config::validation::{validate_rules, ValidationError};

/// Error type for rule-file loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate a rule file from disk.
pub fn load_rules(path: &Path) -> Result<RewriteConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_rules(&content)
}

/// Parse and validate rule-file content.
pub fn parse_rules(content: &str) -> Result<RewriteConfig, ConfigError> {
    let config: RewriteConfig = toml::from_str(content).map_err(ConfigError::Parse)?;

    validate_rules(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
