//! REST gateway client for ledger query tools.
//!
//! Queries are read-only lookups against a mirror-style gateway. The trait
//! seam exists so agent turns and the `Ledger` script binding can run
//! against a mock in tests without a gateway on the network.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::{AgentpadError, Result};

#[async_trait]
pub trait LedgerApi: Send + Sync {
    async fn account_balance(&self, input: &serde_json::Value) -> Result<serde_json::Value>;
    async fn account_info(&self, input: &serde_json::Value) -> Result<serde_json::Value>;
    async fn token_info(&self, input: &serde_json::Value) -> Result<serde_json::Value>;
    async fn topic_messages(&self, input: &serde_json::Value) -> Result<serde_json::Value>;
}

pub struct RestGateway {
    client: Client,
    base_url: String,
}

impl RestGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(%url, "gateway query");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentpadError::Gateway {
                message: if body.is_empty() {
                    format!("request to {path} failed")
                } else {
                    body
                },
                status: Some(status.as_u16()),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl LedgerApi for RestGateway {
    async fn account_balance(&self, input: &serde_json::Value) -> Result<serde_json::Value> {
        let account = required_str(input, "accountId", "get_account_balance")?;
        self.get_json(&format!("balances?account.id={account}")).await
    }

    async fn account_info(&self, input: &serde_json::Value) -> Result<serde_json::Value> {
        let account = required_str(input, "accountId", "get_account_info")?;
        self.get_json(&format!("accounts/{account}")).await
    }

    async fn token_info(&self, input: &serde_json::Value) -> Result<serde_json::Value> {
        let token = required_str(input, "tokenId", "get_token_info")?;
        self.get_json(&format!("tokens/{token}")).await
    }

    async fn topic_messages(&self, input: &serde_json::Value) -> Result<serde_json::Value> {
        let topic = required_str(input, "topicId", "get_topic_messages")?;
        let path = match input.get("limit").and_then(|l| l.as_u64()) {
            Some(limit) => format!("topics/{topic}/messages?limit={limit}"),
            None => format!("topics/{topic}/messages"),
        };
        self.get_json(&path).await
    }
}

/// Dispatch a query by tool name. Shared by agent tool execution and the
/// sandbox's `Ledger` binding so both resolve through the same gateway.
pub async fn query_by_name(
    api: &dyn LedgerApi,
    tool: &str,
    input: &serde_json::Value,
) -> Result<serde_json::Value> {
    use crate::agent::tools::{
        ACCOUNT_BALANCE_TOOL, ACCOUNT_INFO_TOOL, TOKEN_INFO_TOOL, TOPIC_MESSAGES_TOOL,
    };

    match tool {
        t if t == ACCOUNT_BALANCE_TOOL => api.account_balance(input).await,
        t if t == ACCOUNT_INFO_TOOL => api.account_info(input).await,
        t if t == TOKEN_INFO_TOOL => api.token_info(input).await,
        t if t == TOPIC_MESSAGES_TOOL => api.topic_messages(input).await,
        other => Err(AgentpadError::ToolNotFound {
            tool: other.to_string(),
        }),
    }
}

fn required_str(input: &serde_json::Value, key: &str, tool: &str) -> Result<String> {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| AgentpadError::InvalidToolInput {
            tool: tool.to_string(),
            reason: format!("missing required field '{key}'"),
        })
}
