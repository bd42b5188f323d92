//! Ledger query tools exposed to agents.
//!
//! The same four tools back both sides of the playground: scripts call them
//! through the `Ledger` binding, agents call them by name during a chat
//! turn. Tool names are stable identifiers; scripts see them through the
//! `toolNames` binding.

use serde_json::json;

use crate::ledger::LedgerApi;
use crate::providers::Tool;

pub const ACCOUNT_BALANCE_TOOL: &str = "get_account_balance";
pub const ACCOUNT_INFO_TOOL: &str = "get_account_info";
pub const TOKEN_INFO_TOOL: &str = "get_token_info";
pub const TOPIC_MESSAGES_TOOL: &str = "get_topic_messages";

pub struct ToolExecutionResult {
    pub output: String,
    pub is_error: bool,
}

/// Symbolic-name catalog handed to the sandbox as `toolNames`.
pub fn catalog() -> serde_json::Value {
    json!({
        "ACCOUNT_BALANCE_QUERY_TOOL": ACCOUNT_BALANCE_TOOL,
        "ACCOUNT_INFO_QUERY_TOOL": ACCOUNT_INFO_TOOL,
        "TOKEN_INFO_QUERY_TOOL": TOKEN_INFO_TOOL,
        "TOPIC_MESSAGES_QUERY_TOOL": TOPIC_MESSAGES_TOOL,
    })
}

pub fn get_tool_definitions() -> Vec<Tool> {
    vec![
        Tool {
            name: ACCOUNT_BALANCE_TOOL.to_string(),
            description: "Query the current balance of a ledger account. \
                Returns the balance in the ledger's base denomination."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "accountId": {
                        "type": "string",
                        "description": "The account to query, e.g. 0.0.1001"
                    }
                },
                "required": ["accountId"]
            }),
        },
        Tool {
            name: ACCOUNT_INFO_TOOL.to_string(),
            description: "Fetch the full public record of a ledger account: \
                key, balance, memo, and creation metadata."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "accountId": {
                        "type": "string",
                        "description": "The account to query, e.g. 0.0.1001"
                    }
                },
                "required": ["accountId"]
            }),
        },
        Tool {
            name: TOKEN_INFO_TOOL.to_string(),
            description: "Fetch the public record of a token: name, symbol, \
                supply, and treasury account."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "tokenId": {
                        "type": "string",
                        "description": "The token to query, e.g. 0.0.5005"
                    }
                },
                "required": ["tokenId"]
            }),
        },
        Tool {
            name: TOPIC_MESSAGES_TOOL.to_string(),
            description: "Read recent messages from a consensus topic, newest \
                last. Supports an optional result limit."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "topicId": {
                        "type": "string",
                        "description": "The topic to read, e.g. 0.0.7007"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of messages to return"
                    }
                },
                "required": ["topicId"]
            }),
        },
    ]
}

/// Definitions restricted to the names an agent asked for. Unknown names
/// are dropped rather than failing agent construction; `None` means the
/// full set.
pub fn definitions_for(names: Option<&[String]>) -> Vec<Tool> {
    match names {
        None => get_tool_definitions(),
        Some(names) => get_tool_definitions()
            .into_iter()
            .filter(|tool| names.iter().any(|n| n == &tool.name))
            .collect(),
    }
}

/// Run one tool call against the gateway. Gateway failures become error
/// results rather than aborting the turn, so the model can react.
pub async fn execute_tool(
    ledger: &dyn LedgerApi,
    name: &str,
    input: &serde_json::Value,
) -> ToolExecutionResult {
    match crate::ledger::query_by_name(ledger, name, input).await {
        Ok(value) => ToolExecutionResult {
            output: value.to_string(),
            is_error: false,
        },
        Err(e) => ToolExecutionResult {
            output: e.to_string(),
            is_error: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_names_match_definitions() {
        let catalog = catalog();
        let defined: Vec<String> = get_tool_definitions()
            .into_iter()
            .map(|t| t.name)
            .collect();
        for (_, name) in catalog.as_object().unwrap() {
            assert!(defined.contains(&name.as_str().unwrap().to_string()));
        }
        assert_eq!(defined.len(), 4);
    }

    #[test]
    fn definitions_filter_keeps_requested_names_only() {
        let names = vec![ACCOUNT_BALANCE_TOOL.to_string(), "bogus".to_string()];
        let subset = definitions_for(Some(&names));
        assert_eq!(subset.len(), 1);
        assert_eq!(subset[0].name, ACCOUNT_BALANCE_TOOL);

        assert_eq!(definitions_for(None).len(), 4);
    }
}
