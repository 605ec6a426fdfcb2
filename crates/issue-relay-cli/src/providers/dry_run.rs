use tracing::info;

use super::{NotificationProvider, OutboundMessage, ProviderError, SendReceipt};

/// Logs each message instead of delivering it.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunProvider;

impl NotificationProvider for DryRunProvider {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    fn send(&self, message: &OutboundMessage<'_>) -> Result<SendReceipt, ProviderError> {
        info!(
            from = message.from,
            to = message.to,
            subject = message.subject,
            html_bytes = message.html.len(),
            "dry run: message not sent"
        );

        Ok(SendReceipt {
            id: None,
            message: Some("dry run".to_string()),
        })
    }
}
