//! Host-side agent turns behind the sandbox's `invoke` hostcall.
//!
//! The sandbox only holds an agent id and a thin `invoke` wrapper; the
//! provider client, conversation memory, and tool loop all live here.
//! Providers are built lazily on the first turn and cached per agent;
//! conversation memory is keyed by (agent, thread), so distinct
//! `thread_id`s give an agent independent conversations.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::agent::prompt::build_system_prompt;
use crate::agent::tools::{self, definitions_for};
use crate::config::types::ModelConfig;
use crate::error::{AgentpadError, Result};
use crate::ledger::LedgerApi;
use crate::providers::registry::create_provider;
use crate::providers::traits::{
    AIProvider, ChatRequest, ContentBlock, Message, MessageContent, Role, StopReason,
};

const DEFAULT_THREAD: &str = "default";
const MAX_TOKENS: u32 = 4096;

/// One tool call made during a turn, echoed back to the script.
#[derive(Debug, Clone)]
struct TurnToolCall {
    name: String,
    input: serde_json::Value,
    output: String,
}

pub struct AgentHost {
    model: ModelConfig,
    /// Resolved provider key; per-agent `apiKey` overrides shadow it.
    api_key: String,
    network: String,
    ledger: Arc<dyn LedgerApi>,
    providers: HashMap<u64, Arc<dyn AIProvider>>,
    threads: HashMap<(u64, String), Vec<Message>>,
}

impl AgentHost {
    pub fn new(
        model: ModelConfig,
        api_key: impl Into<String>,
        network: impl Into<String>,
        ledger: Arc<dyn LedgerApi>,
    ) -> Self {
        Self {
            model,
            api_key: api_key.into(),
            network: network.into(),
            ledger,
            providers: HashMap::new(),
            threads: HashMap::new(),
        }
    }

    /// Drop all cached providers and conversation memory. Called when a new
    /// script run replaces whatever agents the previous run created.
    pub fn reset(&mut self) {
        self.providers.clear();
        self.threads.clear();
    }

    /// Run one turn for `agent_id` using its `createAgent` options.
    ///
    /// `request` is the raw invoke payload from the sandbox:
    /// `{ payload: { messages: [...] }, config: { configurable: { thread_id } } }`.
    /// The response mirrors the invoke contract: the full message history
    /// for the thread plus this turn's tool calls.
    pub async fn invoke(
        &mut self,
        agent_id: u64,
        spec: &serde_json::Value,
        request: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let thread_id = request
            .pointer("/config/configurable/thread_id")
            .and_then(|t| t.as_str())
            .unwrap_or(DEFAULT_THREAD)
            .to_string();
        let user_text = request
            .pointer("/payload/messages")
            .and_then(|m| m.as_array())
            .and_then(|m| m.last())
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string();

        let provider = self.provider_for(agent_id, spec)?.clone();
        let tool_names = spec_tool_names(spec);
        let tool_defs = definitions_for(tool_names.as_deref());
        let system_prompt = spec
            .get("systemPrompt")
            .and_then(|p| p.as_str())
            .map(String::from)
            .unwrap_or_else(|| build_system_prompt(&self.network));

        let history = self
            .threads
            .entry((agent_id, thread_id.clone()))
            .or_default();
        history.push(Message {
            role: Role::User,
            content: MessageContent::text(&user_text),
        });

        info!(agent_id, thread = %thread_id, "agent turn");

        let mut turn_calls: Vec<TurnToolCall> = Vec::new();
        let mut final_text = String::new();
        let mut iteration = 0;

        loop {
            iteration += 1;
            if iteration > self.model.max_iterations {
                return Err(AgentpadError::MaxIterationsExceeded {
                    max: self.model.max_iterations,
                });
            }

            let response = provider
                .chat(ChatRequest {
                    messages: history.clone(),
                    tools: tool_defs.clone(),
                    system_prompt: Some(system_prompt.clone()),
                    max_tokens: MAX_TOKENS,
                    temperature: 0.0,
                })
                .await?;

            debug!(
                iteration,
                stop_reason = ?response.stop_reason,
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                "provider response"
            );

            let mut tool_uses = Vec::new();
            let mut text = String::new();
            for block in &response.content {
                match block {
                    ContentBlock::Text { text: t } => text.push_str(t),
                    ContentBlock::ToolUse { id, name, input } => {
                        tool_uses.push((id.clone(), name.clone(), input.clone()));
                    }
                    ContentBlock::ToolResult { .. } => {}
                }
            }

            history.push(Message {
                role: Role::Assistant,
                content: MessageContent::Blocks(response.content.clone()),
            });

            if response.stop_reason != StopReason::ToolUse && tool_uses.is_empty() {
                final_text = text;
                break;
            }

            let mut results = Vec::new();
            for (id, name, input) in tool_uses {
                debug!(tool = %name, "executing tool");
                let result = tools::execute_tool(self.ledger.as_ref(), &name, &input).await;
                turn_calls.push(TurnToolCall {
                    name,
                    input,
                    output: result.output.clone(),
                });
                results.push(ContentBlock::ToolResult {
                    tool_use_id: id,
                    content: result.output,
                    is_error: result.is_error,
                });
            }
            history.push(Message {
                role: Role::User,
                content: MessageContent::Blocks(results),
            });
        }

        Ok(render_response(history, &final_text, &turn_calls))
    }

    fn provider_for(
        &mut self,
        agent_id: u64,
        spec: &serde_json::Value,
    ) -> Result<&Arc<dyn AIProvider>> {
        if !self.providers.contains_key(&agent_id) {
            let provider = create_provider(
                &self.model,
                &self.api_key,
                spec.get("model").and_then(|m| m.as_str()),
                spec.get("apiKey").and_then(|k| k.as_str()),
            )?;
            self.providers.insert(agent_id, provider);
        }
        // Entry is guaranteed present; avoid unwrap anyway.
        self.providers
            .get(&agent_id)
            .ok_or_else(|| AgentpadError::Engine("provider cache miss".to_string()))
    }
}

fn spec_tool_names(spec: &serde_json::Value) -> Option<Vec<String>> {
    spec.get("tools").and_then(|t| t.as_array()).map(|names| {
        names
            .iter()
            .filter_map(|n| n.as_str())
            .map(String::from)
            .collect()
    })
}

/// Flatten the thread history into the invoke response shape. Block
/// content is reduced to its text; tool plumbing is reported separately
/// through `toolCalls`.
fn render_response(
    history: &[Message],
    final_text: &str,
    calls: &[TurnToolCall],
) -> serde_json::Value {
    let mut messages: Vec<serde_json::Value> = history
        .iter()
        .filter_map(|msg| {
            let role = match msg.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System => "system",
            };
            let text = match &msg.content {
                MessageContent::Text(t) => t.clone(),
                MessageContent::Blocks(blocks) => {
                    let joined: Vec<&str> = blocks
                        .iter()
                        .filter_map(|b| match b {
                            ContentBlock::Text { text } => Some(text.as_str()),
                            _ => None,
                        })
                        .collect();
                    joined.join("")
                }
            };
            if text.is_empty() {
                None
            } else {
                Some(serde_json::json!({ "role": role, "content": text }))
            }
        })
        .collect();

    // The loop's final text may repeat the last assistant entry; keep the
    // shape stable by ensuring the reply is the last message either way.
    let reply_is_last = messages
        .last()
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|c| c == final_text)
        .unwrap_or(false);
    if !reply_is_last && !final_text.is_empty() {
        messages.push(serde_json::json!({ "role": "assistant", "content": final_text }));
    }

    serde_json::json!({
        "messages": messages,
        "toolCalls": calls
            .iter()
            .map(|c| serde_json::json!({
                "name": c.name,
                "input": c.input,
                "output": c.output,
            }))
            .collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::traits::{ChatResponse, Usage};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedProvider {
        responses: Mutex<Vec<ChatResponse>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<ChatResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
            })
        }
    }

    #[async_trait]
    impl AIProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(AgentpadError::ProviderApi {
                    message: "no scripted responses left".to_string(),
                    status: None,
                });
            }
            Ok(responses.remove(0))
        }
    }

    struct StaticLedger;

    #[async_trait]
    impl LedgerApi for StaticLedger {
        async fn account_balance(&self, _: &serde_json::Value) -> Result<serde_json::Value> {
            Ok(serde_json::json!({"balance": 250}))
        }
        async fn account_info(&self, _: &serde_json::Value) -> Result<serde_json::Value> {
            Ok(serde_json::json!({}))
        }
        async fn token_info(&self, _: &serde_json::Value) -> Result<serde_json::Value> {
            Ok(serde_json::json!({}))
        }
        async fn topic_messages(&self, _: &serde_json::Value) -> Result<serde_json::Value> {
            Ok(serde_json::json!({"messages": []}))
        }
    }

    fn text_response(text: &str, stop: StopReason) -> ChatResponse {
        ChatResponse {
            content: vec![ContentBlock::Text {
                text: text.to_string(),
            }],
            stop_reason: stop,
            usage: Usage::default(),
        }
    }

    fn tool_response(name: &str, input: serde_json::Value) -> ChatResponse {
        ChatResponse {
            content: vec![ContentBlock::ToolUse {
                id: "call_1".to_string(),
                name: name.to_string(),
                input,
            }],
            stop_reason: StopReason::ToolUse,
            usage: Usage::default(),
        }
    }

    fn host_with(provider: Arc<dyn AIProvider>) -> AgentHost {
        let mut host = AgentHost::new(
            ModelConfig::default(),
            "sk-test",
            "testnet",
            Arc::new(StaticLedger),
        );
        host.providers.insert(1, provider);
        host
    }

    fn turn_request(text: &str, thread: &str) -> serde_json::Value {
        serde_json::json!({
            "payload": { "messages": [{ "role": "user", "content": text }] },
            "config": { "configurable": { "thread_id": thread } },
        })
    }

    #[tokio::test]
    async fn plain_turn_returns_the_reply_as_last_message() {
        let provider = ScriptedProvider::new(vec![text_response("hello!", StopReason::EndTurn)]);
        let mut host = host_with(provider);

        let response = host
            .invoke(1, &serde_json::json!({}), &turn_request("hi", "t-1"))
            .await
            .unwrap();

        let messages = response["messages"].as_array().unwrap();
        assert_eq!(messages.last().unwrap()["content"], "hello!");
        assert!(response["toolCalls"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn tool_use_round_trips_through_the_ledger() {
        let provider = ScriptedProvider::new(vec![
            tool_response(
                tools::ACCOUNT_BALANCE_TOOL,
                serde_json::json!({"accountId": "0.0.1001"}),
            ),
            text_response("Balance is 250.", StopReason::EndTurn),
        ]);
        let mut host = host_with(provider);

        let response = host
            .invoke(1, &serde_json::json!({}), &turn_request("balance?", "t-1"))
            .await
            .unwrap();

        let calls = response["toolCalls"].as_array().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0]["name"], tools::ACCOUNT_BALANCE_TOOL);
        assert!(calls[0]["output"].as_str().unwrap().contains("250"));
        assert_eq!(
            response["messages"].as_array().unwrap().last().unwrap()["content"],
            "Balance is 250."
        );
    }

    #[tokio::test]
    async fn runaway_tool_loop_hits_the_iteration_cap() {
        // Provider that asks for a tool on every round.
        let responses: Vec<ChatResponse> = (0..20)
            .map(|_| {
                tool_response(
                    tools::ACCOUNT_BALANCE_TOOL,
                    serde_json::json!({"accountId": "0.0.1001"}),
                )
            })
            .collect();
        let mut host = host_with(ScriptedProvider::new(responses));

        let err = host
            .invoke(1, &serde_json::json!({}), &turn_request("loop", "t-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentpadError::MaxIterationsExceeded { max: 10 }));
    }

    #[tokio::test]
    async fn threads_keep_independent_histories() {
        let provider = ScriptedProvider::new(vec![
            text_response("first", StopReason::EndTurn),
            text_response("second", StopReason::EndTurn),
        ]);
        let mut host = host_with(provider);

        host.invoke(1, &serde_json::json!({}), &turn_request("a", "t-1"))
            .await
            .unwrap();
        host.invoke(1, &serde_json::json!({}), &turn_request("b", "t-2"))
            .await
            .unwrap();

        assert_eq!(host.threads.len(), 2);
        // each thread saw exactly one user message and one reply
        let t1 = &host.threads[&(1, "t-1".to_string())];
        assert_eq!(t1.len(), 2);
    }

    #[tokio::test]
    async fn reset_clears_memory_and_providers() {
        let provider = ScriptedProvider::new(vec![text_response("hi", StopReason::EndTurn)]);
        let mut host = host_with(provider);
        host.invoke(1, &serde_json::json!({}), &turn_request("a", "t-1"))
            .await
            .unwrap();

        host.reset();
        assert!(host.threads.is_empty());
        assert!(host.providers.is_empty());
    }
}
