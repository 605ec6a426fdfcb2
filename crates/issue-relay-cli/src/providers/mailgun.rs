use std::fmt;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;

use super::{
    NotificationProvider, OutboundMessage, ProviderError, SendReceipt, extract_error_message,
};

const PROVIDER_NAME: &str = "mailgun";
pub const DEFAULT_API_BASE: &str = "https://api.mailgun.net/v3";
pub const SEND_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Clone)]
pub struct MailgunProvider {
    client: Client,
    api_base: String,
    api_key: String,
    domain: String,
}

impl fmt::Debug for MailgunProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailgunProvider")
            .field("api_base", &self.api_base)
            .field("api_key", &"<redacted>")
            .field("domain", &self.domain)
            .finish()
    }
}

impl MailgunProvider {
    pub fn new(api_key: &str, domain: &str, api_base: Option<&str>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
            .build()
            .map_err(|error| ProviderError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            api_base: api_base
                .unwrap_or(DEFAULT_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.to_string(),
            domain: domain.to_string(),
        })
    }

    pub fn messages_endpoint(&self) -> String {
        format!("{}/{}/messages", self.api_base, self.domain)
    }

    fn send_once(&self, message: &OutboundMessage<'_>) -> Result<SendReceipt, ProviderError> {
        let form = [
            ("from", message.from),
            ("to", message.to),
            ("subject", message.subject),
            ("html", message.html),
        ];

        let response = self
            .client
            .post(self.messages_endpoint())
            .basic_auth("api", Some(&self.api_key))
            .form(&form)
            .send()
            .map_err(|error| ProviderError::Transport(error.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|error| ProviderError::Transport(error.to_string()))?;

        if !status.is_success() {
            let message = extract_error_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message,
            });
        }

        parse_messages_response(&body)
    }
}

impl NotificationProvider for MailgunProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn send(&self, message: &OutboundMessage<'_>) -> Result<SendReceipt, ProviderError> {
        self.send_once(message)
            .map_err(|error| error.with_provider(PROVIDER_NAME))
    }
}

fn parse_messages_response(body: &str) -> Result<SendReceipt, ProviderError> {
    let payload: MessagesResponse = serde_json::from_str(body)
        .map_err(|error| ProviderError::InvalidResponse(format!("messages payload: {error}")))?;

    Ok(SendReceipt {
        id: payload.id,
        message: payload.message,
    })
}
