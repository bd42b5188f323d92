//! One playground session: a script runtime, its input bridge, the output
//! sink, and the host-side agents, driven together on a single task.
//!
//! The session is the only component that touches all of them. Script
//! faults (syntax errors, thrown errors, timeouts, stalls) are reported to
//! the sink as exactly one error line and the session keeps going; only
//! host faults propagate out as errors.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

use crate::agent::AgentHost;
use crate::config::loader::ResolvedCredentials;
use crate::config::types::AgentpadConfig;
use crate::error::{AgentpadError, Result};
use crate::ledger::{LedgerApi, RestGateway};
use crate::output::{format_base36, OutputKind, OutputSink, SessionEvent, SessionStatus};
use crate::sandbox::{
    self, AgentSpecs, BindingSet, Classification, ExecutionRequest, HostcallHandler, HostcallKind,
    HostcallOutcome, InputBridge, ScriptRuntime,
};

/// How a run ended, from the CLI's point of view. Failures are already in
/// the sink by the time this is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed,
    /// The run produced an agent; chat turns are now accepted.
    AgentReady { tools: Vec<String> },
    Failed,
}

pub struct PlaygroundSession {
    config: AgentpadConfig,
    runtime: ScriptRuntime,
    bindings: BindingSet,
    sink: Rc<RefCell<OutputSink>>,
    bridge: Rc<RefCell<InputBridge>>,
    agents: AgentHost,
    ledger: Arc<dyn LedgerApi>,
    events: Option<UnboundedSender<SessionEvent>>,
    /// Lines typed before the script asked for them; consumed by the next
    /// `input()` instead of being dropped.
    pending_lines: Rc<RefCell<VecDeque<String>>>,
    thread_id: String,
}

impl PlaygroundSession {
    pub async fn new(
        config: AgentpadConfig,
        events: Option<UnboundedSender<SessionEvent>>,
    ) -> Result<Self> {
        let credentials = ResolvedCredentials::resolve(&config);
        Self::with_parts(
            config,
            credentials,
            None,
            events,
        )
        .await
    }

    /// Constructor seam for tests: inject credentials and a ledger mock.
    pub async fn with_parts(
        config: AgentpadConfig,
        credentials: ResolvedCredentials,
        ledger: Option<Arc<dyn LedgerApi>>,
        events: Option<UnboundedSender<SessionEvent>>,
    ) -> Result<Self> {
        let runtime = ScriptRuntime::new(config.sandbox.timeout_seconds).await?;
        let ledger = ledger
            .unwrap_or_else(|| Arc::new(RestGateway::new(config.ledger.gateway_url.clone())));
        let bindings = BindingSet::new(credentials.clone(), config.ledger.network.clone());
        let agents = AgentHost::new(
            config.model.clone(),
            credentials.api_key.clone(),
            config.ledger.network.clone(),
            ledger.clone(),
        );
        let thread_id = generate_thread_id();

        Ok(Self {
            config,
            runtime,
            bindings,
            sink: Rc::new(RefCell::new(OutputSink::new(events.clone()))),
            bridge: Rc::new(RefCell::new(InputBridge::new())),
            agents,
            ledger,
            events,
            pending_lines: Rc::new(RefCell::new(VecDeque::new())),
            thread_id,
        })
    }

    pub fn config(&self) -> &AgentpadConfig {
        &self.config
    }

    pub fn sink(&self) -> Rc<RefCell<OutputSink>> {
        self.sink.clone()
    }

    /// Deliver one operator line to a script parked on `input()`.
    pub fn submit_input(&self, line: &str) -> bool {
        self.bridge.borrow_mut().submit(line)
    }

    /// Cooperatively stop the current run.
    pub fn stop(&self) -> bool {
        self.bridge.borrow_mut().stop()
    }

    pub fn is_awaiting_input(&self) -> bool {
        self.bridge.borrow().is_awaiting_input()
    }

    pub async fn has_chat(&self) -> Result<bool> {
        self.runtime.has_active_agent().await
    }

    /// Run one script to completion, feeding it operator lines from
    /// `lines` whenever it suspends on `input()`. A closed channel counts
    /// as a stop: any further input resolves with the empty sentinel.
    pub async fn execute(
        &mut self,
        request: &ExecutionRequest,
        lines: &mut UnboundedReceiver<String>,
    ) -> Result<RunOutcome> {
        let source = match sandbox::prepare(request) {
            Ok(source) => source.to_string(),
            Err(e) if e.is_script_fault() => {
                self.report_fault(&e);
                return Ok(RunOutcome::Failed);
            }
            Err(e) => return Err(e),
        };

        // A new run replaces whatever the previous run left behind,
        // including lines typed ahead of it.
        self.agents.reset();
        self.pending_lines.borrow_mut().clear();
        self.bridge.borrow_mut().begin_run();
        self.emit_status(SessionStatus::Running);
        info!(bytes = source.len(), "executing script");

        let bridge = self.bridge.clone();
        let pending = self.pending_lines.clone();
        let sink = self.sink.clone();
        let result = {
            let mut handler = SessionHostcalls {
                bridge: bridge.clone(),
                events: self.events.clone(),
                agents: &mut self.agents,
                specs: self.runtime.specs(),
                ledger: self.ledger.clone(),
                pending: pending.clone(),
            };
            let run = self
                .runtime
                .execute(&source, &self.bindings, &sink, &mut handler);
            tokio::pin!(run);

            let mut lines_open = true;
            loop {
                tokio::select! {
                    outcome = &mut run => break outcome,
                    line = lines.recv(), if lines_open => match line {
                        Some(line) => {
                            // Absorbed submissions wait for the next input().
                            if !bridge.borrow_mut().submit(&line) {
                                pending.borrow_mut().push_back(line);
                            }
                        }
                        None => {
                            lines_open = false;
                            bridge.borrow_mut().stop();
                        }
                    },
                }
            }
        };
        self.bridge.borrow_mut().finish_run();

        match result {
            Ok(Classification::Script) => {
                self.emit_status(SessionStatus::Idle);
                Ok(RunOutcome::Completed)
            }
            Ok(Classification::Agent { tools }) => {
                // A replacement agent starts with fresh conversation memory.
                self.thread_id = generate_thread_id();
                let tools = tool_names(&tools);
                let note = if tools.is_empty() {
                    "agent detected; chat is open".to_string()
                } else {
                    format!("agent detected (tools: {}); chat is open", tools.join(", "))
                };
                self.sink.borrow_mut().append(OutputKind::Info, note);
                self.emit_status(SessionStatus::ChatReady);
                Ok(RunOutcome::AgentReady { tools })
            }
            Err(e) if e.is_script_fault() => {
                self.report_fault(&e);
                self.emit_status(SessionStatus::Idle);
                Ok(RunOutcome::Failed)
            }
            Err(e) => {
                self.emit_status(SessionStatus::Idle);
                Err(e)
            }
        }
    }

    /// One chat turn against the active agent. The user line and the
    /// agent's reply both land in the sink; a failed turn reports an error
    /// line and leaves the agent in place for the next message.
    pub async fn chat(
        &mut self,
        message: &str,
        lines: &mut UnboundedReceiver<String>,
    ) -> Result<()> {
        self.sink.borrow_mut().append(OutputKind::User, message);
        self.emit_status(SessionStatus::Running);
        self.bridge.borrow_mut().begin_run();

        let bridge = self.bridge.clone();
        let pending = self.pending_lines.clone();
        let result = {
            let mut handler = SessionHostcalls {
                bridge: bridge.clone(),
                events: self.events.clone(),
                agents: &mut self.agents,
                specs: self.runtime.specs(),
                ledger: self.ledger.clone(),
                pending: pending.clone(),
            };
            let turn = self.runtime.chat_turn(message, &self.thread_id, &mut handler);
            tokio::pin!(turn);

            let mut lines_open = true;
            loop {
                tokio::select! {
                    outcome = &mut turn => break outcome,
                    line = lines.recv(), if lines_open => match line {
                        Some(line) => {
                            if !bridge.borrow_mut().submit(&line) {
                                pending.borrow_mut().push_back(line);
                            }
                        }
                        None => {
                            lines_open = false;
                            bridge.borrow_mut().stop();
                        }
                    },
                }
            }
        };
        self.bridge.borrow_mut().finish_run();

        match result {
            Ok(reply) => {
                let mut sink = self.sink.borrow_mut();
                let seq = sink.append(OutputKind::Agent, reply.reply);
                if let Some(summary) = reply.tool_summary {
                    sink.append_linked(OutputKind::Info, summary, Some(seq));
                }
                drop(sink);
                self.emit_status(SessionStatus::ChatReady);
                Ok(())
            }
            Err(e) if e.is_script_fault() => {
                self.report_fault(&e);
                self.emit_status(SessionStatus::ChatReady);
                Ok(())
            }
            Err(e) => {
                self.emit_status(SessionStatus::Idle);
                Err(e)
            }
        }
    }

    /// Exactly one error line per failed run or turn.
    fn report_fault(&self, error: &AgentpadError) {
        self.sink
            .borrow_mut()
            .append(OutputKind::Error, render_fault(error));
    }

    fn emit_status(&self, status: SessionStatus) {
        if let Some(events) = &self.events {
            let _ = events.send(SessionEvent::Status(status));
        }
    }
}

/// The session's side of the hostcall contract: operator input through the
/// bridge, agent turns through the host, ledger queries through the
/// gateway.
struct SessionHostcalls<'a> {
    bridge: Rc<RefCell<InputBridge>>,
    events: Option<UnboundedSender<SessionEvent>>,
    agents: &'a mut AgentHost,
    specs: AgentSpecs,
    ledger: Arc<dyn LedgerApi>,
    pending: Rc<RefCell<VecDeque<String>>>,
}

#[async_trait(?Send)]
impl HostcallHandler for SessionHostcalls<'_> {
    async fn handle(&mut self, kind: HostcallKind) -> HostcallOutcome {
        match kind {
            HostcallKind::ReadLine { prompt } => {
                if let Some(line) = self.pending.borrow_mut().pop_front() {
                    return HostcallOutcome::Success(serde_json::Value::String(line));
                }
                let receiver = match self.bridge.borrow_mut().request(prompt.clone()) {
                    Ok(receiver) => receiver,
                    Err(e) => {
                        return HostcallOutcome::Error {
                            message: e.to_string(),
                        }
                    }
                };
                if let Some(events) = &self.events {
                    let _ = events.send(SessionEvent::InputRequested { prompt });
                    let _ = events.send(SessionEvent::Status(SessionStatus::AwaitingInput));
                }

                // A dropped sender means the run was replaced; unwind the
                // script the same way a stop would.
                let line = receiver.await.unwrap_or_default();
                if let Some(events) = &self.events {
                    let _ = events.send(SessionEvent::Status(SessionStatus::Running));
                }
                HostcallOutcome::Success(serde_json::Value::String(line))
            }
            HostcallKind::AgentInvoke { agent_id, payload } => {
                let spec = self
                    .specs
                    .borrow()
                    .get(&agent_id)
                    .cloned()
                    .unwrap_or_else(|| serde_json::json!({}));
                match self.agents.invoke(agent_id, &spec, &payload).await {
                    Ok(response) => HostcallOutcome::Success(response),
                    Err(e) => {
                        debug!(agent_id, error = %e, "agent invoke failed");
                        HostcallOutcome::Error {
                            message: e.to_string(),
                        }
                    }
                }
            }
            HostcallKind::LedgerQuery { tool, input } => {
                match crate::ledger::query_by_name(self.ledger.as_ref(), &tool, &input).await {
                    Ok(value) => HostcallOutcome::Success(value),
                    Err(e) => HostcallOutcome::Error {
                        message: e.to_string(),
                    },
                }
            }
        }
    }
}

fn tool_names(tools: &serde_json::Value) -> Vec<String> {
    tools
        .as_array()
        .map(|names| {
            names
                .iter()
                .filter_map(|n| n.as_str())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn render_fault(error: &AgentpadError) -> String {
    match error {
        AgentpadError::ScriptConstruction { message, stack }
        | AgentpadError::ScriptRuntime { message, stack } => {
            if stack.is_empty() {
                message.clone()
            } else {
                format!("{message}\n{stack}")
            }
        }
        other => other.to_string(),
    }
}

/// Short, unique chat thread id (base36 timestamp + counter).
fn generate_thread_id() -> String {
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    let counter = COUNTER.fetch_add(1, Ordering::SeqCst);
    format_base36((timestamp & 0xFFFFFF) << 8 | (counter as u64 & 0xFF))
}
