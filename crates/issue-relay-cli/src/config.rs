use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const TEP_KEY: &str = "tep";
pub const SUBJECT_KEY: &str = "subject";
pub const CRITERIA_TYPE_KEY: &str = "criteria_type";
pub const CRITERIA_LIMIT_KEY: &str = "criteria_limit";
pub const PROJECT_KEY: &str = "project";
pub const FROM_KEY: &str = "from";
pub const TO_KEY: &str = "to";
pub const ISSUE_TAG_KEY: &str = "issue_tag";

const REQUIRED_KEYS: [&str; 7] = [
    TEP_KEY,
    SUBJECT_KEY,
    CRITERIA_TYPE_KEY,
    CRITERIA_LIMIT_KEY,
    PROJECT_KEY,
    FROM_KEY,
    TO_KEY,
];

pub const MAILGUN_PROVIDER: &str = "mailgun";
pub const DEFAULT_PROVIDER: &str = MAILGUN_PROVIDER;
pub const DEFAULT_SUBJECT: &str =
    "Drupal Issue - Project: {{ project }} - Title: {{ title }} - Issue Tags: {{ issue_tags }}";
pub const DEFAULT_CRITERIA_TYPE: &str = "created";
pub const DEFAULT_CRITERIA_LIMIT_MINUTES: i64 = 10;
pub const DEFAULT_PROJECT: i64 = 3060;

pub const DEFAULT_OPTIONS_FILE: &str = "config.toml";
pub const DEFAULT_SECRETS_FILE: &str = ".secrets.toml";

const MAILGUN_API_KEY_ENV: &str = "MAILGUN_API_KEY";
const MAILGUN_DOMAIN_ENV: &str = "MAILGUN_DOMAIN";
const MAILGUN_API_BASE_ENV: &str = "MAILGUN_API_BASE";

/// A single scalar option value as written in the options file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl OptionValue {
    /// Mirrors loose truthiness: empty text, zero, NaN and `false` count as unset.
    pub fn is_truthy(&self) -> bool {
        match self {
            OptionValue::Bool(value) => *value,
            OptionValue::Integer(value) => *value != 0,
            OptionValue::Float(value) => *value != 0.0 && !value.is_nan(),
            OptionValue::Text(value) => !value.is_empty(),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            OptionValue::Bool(value) => value.to_string(),
            OptionValue::Integer(value) => value.to_string(),
            OptionValue::Float(value) => format_number(*value),
            OptionValue::Text(value) => value.clone(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        let number = match self {
            OptionValue::Bool(_) => return None,
            OptionValue::Integer(value) => *value as f64,
            OptionValue::Float(value) => *value,
            OptionValue::Text(value) => value.trim().parse::<f64>().ok()?,
        };

        number.is_finite().then_some(number)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Text(value.to_string())
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Integer(value)
    }
}

fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Flat option mapping; later entries override earlier ones key by key.
pub type Options = BTreeMap<String, OptionValue>;

pub fn default_options() -> Options {
    Options::from([
        (TEP_KEY.to_string(), OptionValue::from(DEFAULT_PROVIDER)),
        (SUBJECT_KEY.to_string(), OptionValue::from(DEFAULT_SUBJECT)),
        (
            CRITERIA_TYPE_KEY.to_string(),
            OptionValue::from(DEFAULT_CRITERIA_TYPE),
        ),
        (
            CRITERIA_LIMIT_KEY.to_string(),
            OptionValue::from(DEFAULT_CRITERIA_LIMIT_MINUTES),
        ),
        (PROJECT_KEY.to_string(), OptionValue::from(DEFAULT_PROJECT)),
    ])
}

#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub mailgun_api_key: Option<String>,
    #[serde(default)]
    pub mailgun_domain: Option<String>,
    #[serde(default)]
    pub mailgun_api_base: Option<String>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("mailgun_api_key", &self.mailgun_api_key.as_ref().map(|_| "<redacted>"))
            .field("mailgun_domain", &self.mailgun_domain)
            .field("mailgun_api_base", &self.mailgun_api_base)
            .finish()
    }
}

impl Secrets {
    pub fn with_overrides_from_pairs<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let env_map: HashMap<String, String> = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();

        if let Some(value) = non_empty(&env_map, MAILGUN_API_KEY_ENV) {
            self.mailgun_api_key = Some(value);
        }
        if let Some(value) = non_empty(&env_map, MAILGUN_DOMAIN_ENV) {
            self.mailgun_domain = Some(value);
        }
        if let Some(value) = non_empty(&env_map, MAILGUN_API_BASE_ENV) {
            self.mailgun_api_base = Some(value);
        }

        self
    }

    pub fn mailgun_api_key(&self) -> Option<&str> {
        present(self.mailgun_api_key.as_deref())
    }

    pub fn mailgun_domain(&self) -> Option<&str> {
        present(self.mailgun_domain.as_deref())
    }

    pub fn mailgun_api_base(&self) -> Option<&str> {
        present(self.mailgun_api_base.as_deref())
    }
}

fn non_empty(env_map: &HashMap<String, String>, key: &str) -> Option<String> {
    env_map
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

/// Which node timestamp drives the recency window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CriteriaField {
    Created,
    Changed,
    /// Unrecognized values are kept verbatim; they are still forwarded as the
    /// sort parameter but never match in the filter.
    Other(String),
}

impl CriteriaField {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "created" => CriteriaField::Created,
            "changed" => CriteriaField::Changed,
            other => CriteriaField::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CriteriaField::Created => "created",
            CriteriaField::Changed => "changed",
            CriteriaField::Other(value) => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub provider: String,
    pub subject: String,
    pub criteria: CriteriaField,
    pub window_minutes: f64,
    pub project: String,
    pub from: String,
    pub to: String,
    pub issue_tag: Option<String>,
}

/// Merges `options` over the built-in defaults and validates the result.
///
/// Every falsy required key is reported in one error. Provider secrets are
/// only checked when the selected provider needs them.
pub fn resolve(options: &Options, secrets: &Secrets) -> Result<Config, ConfigError> {
    let mut merged = default_options();
    merged.extend(
        options
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );

    let missing: Vec<&str> = REQUIRED_KEYS
        .iter()
        .copied()
        .filter(|key| !merged.get(*key).is_some_and(OptionValue::is_truthy))
        .collect();
    if !missing.is_empty() {
        return Err(ConfigError::MissingRequired(missing.join(",")));
    }

    let text = |key: &str| merged.get(key).map(OptionValue::as_text).unwrap_or_default();

    let limit = merged
        .get(CRITERIA_LIMIT_KEY)
        .ok_or_else(|| ConfigError::MissingRequired(CRITERIA_LIMIT_KEY.to_string()))?;
    let window_minutes = limit
        .as_number()
        .ok_or_else(|| ConfigError::InvalidCriteriaLimit(limit.as_text()))?;

    let provider = text(TEP_KEY);
    if provider == MAILGUN_PROVIDER {
        if secrets.mailgun_api_key().is_none() {
            return Err(ConfigError::MissingSecret("Mailgun API key"));
        }
        if secrets.mailgun_domain().is_none() {
            return Err(ConfigError::MissingSecret("Mailgun domain"));
        }
    }

    let criteria = CriteriaField::parse(&text(CRITERIA_TYPE_KEY));
    if let CriteriaField::Other(value) = &criteria {
        warn!(criteria_type = %value, "unrecognized criteria_type; no issue will match");
    }

    let issue_tag = merged
        .get(ISSUE_TAG_KEY)
        .filter(|value| value.is_truthy())
        .map(OptionValue::as_text);

    Ok(Config {
        provider,
        subject: text(SUBJECT_KEY),
        criteria,
        window_minutes,
        project: text(PROJECT_KEY),
        from: text(FROM_KEY),
        to: text(TO_KEY),
        issue_tag,
    })
}

pub fn load_options(path: &Path) -> Result<Options, ConfigError> {
    let raw = read_file(path)?;
    parse_options(&raw).map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

pub fn parse_options(raw: &str) -> Result<Options, String> {
    toml::from_str::<Options>(raw).map_err(|error| error.message().to_string())
}

pub fn load_secrets(path: &Path) -> Result<Secrets, ConfigError> {
    let raw = read_file(path)?;
    toml::from_str::<Secrets>(&raw).map_err(|error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: error.message().to_string(),
    })
}

/// Loads `path` when given, else the default secrets file if it exists.
pub fn load_secrets_or_default(path: Option<&Path>) -> Result<Secrets, ConfigError> {
    match path {
        Some(path) => load_secrets(path),
        None => {
            let default_path = Path::new(DEFAULT_SECRETS_FILE);
            if default_path.is_file() {
                load_secrets(default_path)
            } else {
                Ok(Secrets::default())
            }
        }
    }
}

pub(crate) fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|error| ConfigError::Read {
        path: path.to_path_buf(),
        message: error.to_string(),
    })
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration: \"{0}\"")]
    MissingRequired(String),
    #[error("{0} is required")]
    MissingSecret(&'static str),
    #[error("invalid criteria_limit: {0} (expected a number of minutes)")]
    InvalidCriteriaLimit(String),
    #[error("failed to read {}: {message}", path.display())]
    Read { path: PathBuf, message: String },
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}
