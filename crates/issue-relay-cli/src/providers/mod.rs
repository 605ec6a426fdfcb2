use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::{MAILGUN_PROVIDER, Secrets};

pub mod dry_run;
pub mod mailgun;

pub use dry_run::DryRunProvider;
pub use mailgun::MailgunProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboundMessage<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub subject: &'a str,
    pub html: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SendReceipt {
    pub id: Option<String>,
    pub message: Option<String>,
}

/// One delivery capability; implementations are looked up by selector.
pub trait NotificationProvider {
    fn name(&self) -> &'static str;
    fn send(&self, message: &OutboundMessage<'_>) -> Result<SendReceipt, ProviderError>;
}

/// Builds the provider registered for `selector`, or `None` when nothing is.
pub fn build_provider(
    selector: &str,
    secrets: &Secrets,
) -> Result<Option<Box<dyn NotificationProvider>>, ProviderError> {
    match selector {
        MAILGUN_PROVIDER => {
            let api_key = secrets
                .mailgun_api_key()
                .ok_or(ProviderError::MissingCredential("mailgun_api_key"))?;
            let domain = secrets
                .mailgun_domain()
                .ok_or(ProviderError::MissingCredential("mailgun_domain"))?;
            let provider = MailgunProvider::new(api_key, domain, secrets.mailgun_api_base())?;
            Ok(Some(Box::new(provider)))
        }
        _ => Ok(None),
    }
}

/// Pulls a human-readable message out of an error response body: the first
/// non-empty `message`, `error`, `detail` or `title` JSON field, or the body
/// itself when it is plain text.
pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let from_json = serde_json::from_str::<Value>(trimmed).ok().and_then(|json| {
        ["message", "error", "detail", "title"]
            .iter()
            .filter_map(|key| json.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .find(|message| !message.is_empty())
            .map(ToOwned::to_owned)
    });

    from_json.or_else(|| {
        (!trimmed.starts_with('{') && !trimmed.starts_with('<')).then(|| trimmed.to_string())
    })
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("http error ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
    #[error("missing provider credential: {0}")]
    MissingCredential(&'static str),
}

impl ProviderError {
    pub fn with_provider(self, provider: &'static str) -> Self {
        match self {
            ProviderError::Transport(message) => {
                ProviderError::Transport(format!("{provider}: {message}"))
            }
            ProviderError::Http { status, message } => ProviderError::Http {
                status,
                message: format!("{provider}: {message}"),
            },
            ProviderError::InvalidResponse(message) => {
                ProviderError::InvalidResponse(format!("{provider}: {message}"))
            }
            ProviderError::MissingCredential(name) => ProviderError::MissingCredential(name),
        }
    }
}
