use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::dispatch::{DispatchOutcome, dispatch, log_outcomes};
use crate::drupal_api::IssueApi;
use crate::filter::filter_recent;
use crate::providers::NotificationProvider;
use crate::query::build_params;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelayReport {
    pub fetched: usize,
    pub matched: usize,
    pub sent: usize,
    pub failed: usize,
    pub fetch_error: Option<String>,
    pub outcomes: Vec<DispatchOutcome>,
}

/// Runs one fetch -> filter -> dispatch pass.
///
/// Fetch failures are logged and reported, never raised. Send failures stay
/// inside their outcome. `provider` is `None` when the configured selector
/// has no registered implementation.
pub fn run_relay<A>(
    config: &Config,
    body_template: &str,
    api: &A,
    provider: Option<&dyn NotificationProvider>,
    now: DateTime<Utc>,
) -> RelayReport
where
    A: IssueApi + ?Sized,
{
    let params = build_params(config);

    let list = match api.fetch_items(&params) {
        Ok(list) => list,
        Err(fetch_error) => {
            error!("failed to fetch issues: {fetch_error}");
            return RelayReport {
                fetch_error: Some(fetch_error.to_string()),
                ..RelayReport::default()
            };
        }
    };

    let fetched = list.len();
    let items = filter_recent(list, config, now);
    info!(
        fetched,
        matched = items.len(),
        criteria = config.criteria.as_str(),
        window_minutes = config.window_minutes,
        "filtered issues"
    );

    let Some(provider) = provider else {
        warn!(
            provider = %config.provider,
            "no notification provider registered for selector; nothing sent"
        );
        return RelayReport {
            fetched,
            matched: items.len(),
            ..RelayReport::default()
        };
    };

    let outcomes = dispatch(&items, config, body_template, provider);
    log_outcomes(provider.name(), &outcomes);

    let sent = outcomes.iter().filter(|outcome| outcome.is_sent()).count();
    RelayReport {
        fetched,
        matched: items.len(),
        sent,
        failed: outcomes.len() - sent,
        fetch_error: None,
        outcomes,
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use chrono::TimeZone;

    use crate::config::CriteriaField;
    use crate::drupal_api::ApiError;
    use crate::model::{Item, ItemList};
    use crate::providers::{OutboundMessage, ProviderError, SendReceipt};
    use crate::query::QueryParams;

    use super::*;

    const NOW_SECS: i64 = 1_760_000_000;

    struct StubApi {
        response: Result<ItemList, ApiError>,
        seen: RefCell<Vec<QueryParams>>,
    }

    impl StubApi {
        fn new(response: Result<ItemList, ApiError>) -> Self {
            Self {
                response,
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl IssueApi for StubApi {
        fn fetch_items(&self, params: &QueryParams) -> Result<ItemList, ApiError> {
            self.seen.borrow_mut().push(params.clone());
            self.response.clone()
        }
    }

    #[derive(Default)]
    struct StubProvider {
        fail_first: bool,
        subjects: RefCell<Vec<String>>,
    }

    impl NotificationProvider for StubProvider {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn send(&self, message: &OutboundMessage<'_>) -> Result<SendReceipt, ProviderError> {
            let mut subjects = self.subjects.borrow_mut();
            subjects.push(message.subject.to_string());
            if self.fail_first && subjects.len() == 1 {
                return Err(ProviderError::Transport("timeout".to_string()));
            }
            Ok(SendReceipt::default())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(NOW_SECS, 0).single().expect("valid timestamp")
    }

    fn fixture_config() -> Config {
        Config {
            provider: "stub".to_string(),
            subject: "{{ title }}".to_string(),
            criteria: CriteriaField::Created,
            window_minutes: 10.0,
            project: "3060".to_string(),
            from: "relay@example.com".to_string(),
            to: "team@example.com".to_string(),
            issue_tag: None,
        }
    }

    fn item(title: &str, created_ago_secs: i64) -> Item {
        Item {
            nid: title.to_lowercase(),
            title: title.to_string(),
            created: (NOW_SECS - created_ago_secs).to_string(),
            ..Item::default()
        }
    }

    #[test]
    fn relay_sends_only_items_inside_the_window() {
        let api = StubApi::new(Ok(ItemList {
            list: Some(vec![item("Recent", 5 * 60), item("Old", 20 * 60)]),
        }));
        let provider = StubProvider::default();

        let report = run_relay(&fixture_config(), "{{ title }}", &api, Some(&provider), now());

        assert_eq!(*provider.subjects.borrow(), vec!["Recent".to_string()]);
        assert_eq!(report.fetched, 2);
        assert_eq!(report.matched, 1);
        assert_eq!(report.sent, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(api.seen.borrow()[0].sort.as_deref(), Some("created"));
    }

    #[test]
    fn relay_attempts_every_send_when_one_fails() {
        let api = StubApi::new(Ok(ItemList {
            list: Some(vec![item("First", 60), item("Second", 120)]),
        }));
        let provider = StubProvider {
            fail_first: true,
            ..StubProvider::default()
        };

        let report = run_relay(&fixture_config(), "x", &api, Some(&provider), now());

        assert_eq!(provider.subjects.borrow().len(), 2);
        assert_eq!(report.sent, 1);
        assert_eq!(report.failed, 1);
        assert!(!report.outcomes[0].is_sent());
        assert!(report.outcomes[1].is_sent());
    }

    #[test]
    fn relay_reports_fetch_failure_without_sending() {
        let api = StubApi::new(Err(ApiError::Http {
            status: 502,
            message: "Bad Gateway".to_string(),
        }));
        let provider = StubProvider::default();

        let report = run_relay(&fixture_config(), "x", &api, Some(&provider), now());

        assert!(provider.subjects.borrow().is_empty());
        assert_eq!(
            report.fetch_error.as_deref(),
            Some("drupal.org api error (502): Bad Gateway")
        );
        assert_eq!(report.matched, 0);
    }

    #[test]
    fn relay_without_registered_provider_sends_nothing() {
        let api = StubApi::new(Ok(ItemList {
            list: Some(vec![item("Recent", 60)]),
        }));

        let report = run_relay(&fixture_config(), "x", &api, None, now());

        assert_eq!(report.matched, 1);
        assert_eq!(report.sent, 0);
        assert!(report.outcomes.is_empty());
    }

    #[test]
    fn relay_treats_missing_list_as_no_matches() {
        let api = StubApi::new(Ok(ItemList { list: None }));
        let provider = StubProvider::default();

        let report = run_relay(&fixture_config(), "x", &api, Some(&provider), now());

        assert_eq!(report, RelayReport::default());
    }
}
