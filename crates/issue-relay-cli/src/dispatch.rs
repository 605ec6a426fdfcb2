use serde::Serialize;
use tracing::{error, info};

use crate::config::Config;
use crate::model::Item;
use crate::providers::{NotificationProvider, OutboundMessage, ProviderError, SendReceipt};
use crate::render::render_message;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub nid: String,
    pub title: String,
    pub result: Result<SendReceipt, ProviderError>,
}

impl DispatchOutcome {
    pub fn is_sent(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Serialize)]
struct OutcomeView<'a> {
    nid: &'a str,
    title: &'a str,
    sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    receipt: Option<&'a SendReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Serialize for DispatchOutcome {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        OutcomeView {
            nid: &self.nid,
            title: &self.title,
            sent: self.is_sent(),
            receipt: self.result.as_ref().ok(),
            error: self.result.as_ref().err().map(ToString::to_string),
        }
        .serialize(serializer)
    }
}

/// Renders and sends one message per item, in order.
///
/// A failed send is recorded in its outcome and never stops the remaining
/// items; nothing is retried.
pub fn dispatch(
    items: &[Item],
    config: &Config,
    body_template: &str,
    provider: &dyn NotificationProvider,
) -> Vec<DispatchOutcome> {
    items
        .iter()
        .map(|item| {
            let rendered = render_message(item, config, body_template);
            let result = provider.send(&OutboundMessage {
                from: &config.from,
                to: &config.to,
                subject: &rendered.subject,
                html: &rendered.body,
            });

            DispatchOutcome {
                nid: item.nid.clone(),
                title: item.title.clone(),
                result,
            }
        })
        .collect()
}

pub fn log_outcomes(provider: &str, outcomes: &[DispatchOutcome]) {
    for outcome in outcomes {
        match &outcome.result {
            Ok(receipt) => info!(
                provider,
                nid = %outcome.nid,
                title = %outcome.title,
                id = receipt.id.as_deref().unwrap_or_default(),
                "{}",
                receipt.message.as_deref().unwrap_or("sent")
            ),
            Err(send_error) => error!(
                provider,
                nid = %outcome.nid,
                title = %outcome.title,
                "send failed: {send_error}"
            ),
        }
    }
}
