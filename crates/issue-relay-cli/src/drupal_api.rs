use std::time::Duration;

use reqwest::blocking::Client;
use thiserror::Error;
use tracing::debug;

use crate::model::ItemList;
use crate::providers::extract_error_message;
use crate::query::QueryParams;

pub const DEFAULT_ENDPOINT: &str = "https://www.drupal.org/api-d7/node.json";
pub const FETCH_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = concat!("issue-relay/", env!("CARGO_PKG_VERSION"));

pub trait IssueApi {
    fn fetch_items(&self, params: &QueryParams) -> Result<ItemList, ApiError>;
}

#[derive(Debug, Clone)]
pub struct HttpIssueApi {
    client: Client,
    endpoint: String,
}

impl HttpIssueApi {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|error| ApiError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl IssueApi for HttpIssueApi {
    fn fetch_items(&self, params: &QueryParams) -> Result<ItemList, ApiError> {
        fetch_items(&self.client, &self.endpoint, params)
    }
}

pub fn fetch_items(
    client: &Client,
    endpoint: &str,
    params: &QueryParams,
) -> Result<ItemList, ApiError> {
    let pairs = params.to_pairs();
    debug!(endpoint, ?pairs, "fetching issue nodes");

    let response = client
        .get(endpoint)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .query(&pairs)
        .send()
        .map_err(|error| ApiError::Transport(error.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .map_err(|error| ApiError::Transport(error.to_string()))?;

    if !status.is_success() {
        let message = extract_error_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
        return Err(ApiError::Http {
            status: status.as_u16(),
            message,
        });
    }

    parse_item_list(&body)
}

pub fn parse_item_list(body: &str) -> Result<ItemList, ApiError> {
    serde_json::from_str(body).map_err(|error| ApiError::InvalidResponse(error.to_string()))
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("drupal.org api request failed: {0}")]
    Transport(String),
    #[error("drupal.org api error ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("invalid drupal.org api response: {0}")]
    InvalidResponse(String),
}
