//! YAML run configuration and secrets.
//!
//! Secrets come from the process environment, or in local mode from a YAML
//! vars file. A refresh token rotated by the OAuth server is written back to
//! that vars file; this is the only thing the program persists.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::asset_kpis::DEFAULT_TAX_RATE;
use crate::indirect::DEFAULT_FUND_ASSET_TYPES;
use crate::mail::SmtpSettings;
use crate::schema::Schema;

/// Default location of the local-mode vars file.
pub const DEFAULT_VARS_FILE: &str = "configs/vars.yaml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yml::Error),
    #[error("Required variable {0} is not set")]
    MissingVar(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level run configuration.
#[derive(Deserialize, Debug, Clone)]
pub struct DashboardConfig {
    pub portfolio_file: PortfolioFileConfig,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub tickers_to_replace: BTreeMap<String, String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub email: EmailConfig,
}

/// Where the portfolio table is read from and how it is shaped.
#[derive(Deserialize, Debug, Clone)]
pub struct PortfolioFileConfig {
    /// CSV file. When unset the table is read from Google Sheets.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
    #[serde(default = "default_range")]
    pub range: String,
    pub schema_fields: Schema,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Parameters {
    #[serde(default = "default_tax_rate")]
    pub tax_rate: f64,
    #[serde(default = "default_fund_asset_types")]
    pub fund_asset_types: Vec<String>,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            tax_rate: default_tax_rate(),
            fund_asset_types: default_fund_asset_types(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EmailConfig {
    #[serde(default = "default_smtp_server")]
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_server: default_smtp_server(),
            smtp_port: default_smtp_port(),
        }
    }
}

impl EmailConfig {
    pub fn smtp(&self) -> SmtpSettings {
        SmtpSettings {
            server: self.smtp_server.clone(),
            port: self.smtp_port,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("html_outputs")
}

fn default_sheet_name() -> String {
    "portfolio".to_string()
}

fn default_range() -> String {
    "A:Z".to_string()
}

fn default_tax_rate() -> f64 {
    DEFAULT_TAX_RATE
}

fn default_fund_asset_types() -> Vec<String> {
    DEFAULT_FUND_ASSET_TYPES.iter().map(|s| s.to_string()).collect()
}

fn default_smtp_server() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

impl DashboardConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        config.parameters.fund_asset_types = config
            .parameters
            .fund_asset_types
            .iter()
            .map(|t| t.trim().to_lowercase())
            .collect();
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.portfolio_file.schema_fields.is_empty() {
            return Err(ConfigError::Invalid(
                "portfolio_file.schema_fields is empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.parameters.tax_rate) {
            return Err(ConfigError::Invalid(format!(
                "parameters.tax_rate must be between 0 and 1, got {}",
                self.parameters.tax_rate
            )));
        }
        Ok(())
    }
}

/// Credentials and identities needed to read the sheet and send the email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secrets {
    pub sender_email: String,
    pub receiver_email: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_refresh_token: String,
    /// Spreadsheet to read; the dummy sheet when running against test data.
    pub google_sheet_id: Option<String>,
}

impl Secrets {
    /// Reads secrets through `lookup`, which returns `None` for unset names.
    pub fn from_lookup<F>(lookup: F, dummy: bool) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingVar(name.to_string()))
        };
        let sheet_var = if dummy {
            "GOOGLE_SHEET_DUMMY_ID"
        } else {
            "GOOGLE_SHEET_ID"
        };
        Ok(Self {
            sender_email: require("SENDER_EMAIL")?,
            receiver_email: require("RECEIVER_EMAIL")?,
            google_client_id: require("GOOGLE_CLIENT_ID")?,
            google_client_secret: require("GOOGLE_CLIENT_SECRET")?,
            google_refresh_token: require("GOOGLE_REFRESH_TOKEN")?,
            google_sheet_id: lookup(sheet_var).filter(|v| !v.trim().is_empty()),
        })
    }

    pub fn from_env(dummy: bool) -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok(), dummy)
    }

    pub fn from_vars_file(vars: &VarsFile, dummy: bool) -> Result<Self, ConfigError> {
        Self::from_lookup(|name| vars.get(name), dummy)
    }

    pub fn sheet_id(&self) -> Result<&str, ConfigError> {
        self.google_sheet_id
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVar("GOOGLE_SHEET_ID".to_string()))
    }
}

/// The local-mode vars file, kept as a YAML mapping so keys this program
/// does not know survive a rewrite.
#[derive(Debug, Clone)]
pub struct VarsFile {
    path: PathBuf,
    values: serde_yml::Mapping,
}

impl VarsFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let values: serde_yml::Mapping = serde_yml::from_str(&yaml)?;
        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }

    pub fn get(&self, name: &str) -> Option<String> {
        match self.values.get(name)? {
            serde_yml::Value::String(s) => Some(s.clone()),
            serde_yml::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Stores a rotated refresh token and rewrites the file.
    pub fn persist_refresh_token(&mut self, token: &str) -> Result<(), ConfigError> {
        self.values.insert(
            serde_yml::Value::String("GOOGLE_REFRESH_TOKEN".to_string()),
            serde_yml::Value::String(token.to_string()),
        );
        let yaml = serde_yml::to_string(&self.values)?;
        std::fs::write(&self.path, yaml).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })?;
        tracing::info!("Updated refresh token in {}", self.path.display());
        Ok(())
    }
}
