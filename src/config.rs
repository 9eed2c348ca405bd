//! Run configuration.
//!
//! Values the mapping depends on (boolean literals, date pattern) and the
//! defaults offered when prompting for connection details. Loaded from an
//! optional YAML file; every field has a default so a partial file is fine.

use std::{fmt::Write as _, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";
pub const DEFAULT_APPLICATION: &str = "bonita";
pub const DEFAULT_USERNAME: &str = "walter.bates";
pub const DEFAULT_DATE_PATTERN: &str = "%Y/%m/%d";
pub const DEFAULT_PROCESS_LIST_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub boolean: BooleanLiterals,
    /// A chrono format string such as `%Y/%m/%d`.
    pub date_pattern: String,
    pub defaults: ConnectionDefaults,
    pub process_list_limit: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            boolean: BooleanLiterals::default(),
            date_pattern: DEFAULT_DATE_PATTERN.to_string(),
            defaults: ConnectionDefaults::default(),
            process_list_limit: DEFAULT_PROCESS_LIST_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BooleanLiterals {
    pub true_literal: String,
    pub false_literal: String,
}

impl Default for BooleanLiterals {
    fn default() -> Self {
        Self {
            true_literal: "TRUE".to_string(),
            false_literal: "FALSE".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionDefaults {
    pub server_url: String,
    pub application: String,
    pub username: String,
}

impl Default for ConnectionDefaults {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            application: DEFAULT_APPLICATION.to_string(),
            username: DEFAULT_USERNAME.to_string(),
        }
    }
}

/// The slice of configuration scalar coercion needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionConfig {
    pub true_literal: String,
    pub false_literal: String,
    pub date_pattern: String,
}

impl Default for CoercionConfig {
    fn default() -> Self {
        ImportConfig::default().coercion()
    }
}

impl ImportConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let reader = BufReader::new(file);
        let config: ImportConfig =
            serde_yaml::from_reader(reader).context("Parsing config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.boolean.true_literal == self.boolean.false_literal {
            return Err(anyhow!(
                "Boolean literals must differ (both are '{}')",
                self.boolean.true_literal
            ));
        }
        // chrono reports bad specifiers only when formatting
        let probe = NaiveDate::from_ymd_opt(2000, 1, 31).unwrap_or_default();
        let mut rendered = String::new();
        write!(rendered, "{}", probe.format(&self.date_pattern))
            .map_err(|_| anyhow!("Invalid date pattern '{}'", self.date_pattern))?;
        Ok(())
    }

    pub fn coercion(&self) -> CoercionConfig {
        CoercionConfig {
            true_literal: self.boolean.true_literal.clone(),
            false_literal: self.boolean.false_literal.clone(),
            date_pattern: self.date_pattern.clone(),
        }
    }
}
