//! Script execution against the embedded QuickJS engine.
//!
//! A run builds an async function from the user's source with the binding
//! registry's names as its parameters, invokes it with the registry's
//! values, then drives the engine: drain microtask jobs, poll the outcome
//! slot, hand drained hostcalls to the [`HostcallHandler`], deliver their
//! completions, repeat. Construction failures (syntax errors) surface
//! before any binding is invoked; runtime failures are caught at the
//! outcome boundary with message and stack intact.
//!
//! A wall-clock interrupt guards CPU-bound scripts. The deadline is
//! re-armed at every suspension point, so a script parked on `input()` for
//! an hour never trips it.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rquickjs::{AsyncContext, AsyncRuntime, Function, Object, Value};
use tracing::{debug, trace};

use crate::error::{AgentpadError, Result};
use crate::output::OutputSink;
use crate::sandbox::bindings::{AgentSpecs, BindingSet, BOOTSTRAP_JS};
use crate::sandbox::convert::{engine_error_text, js_to_json, json_to_js};
use crate::sandbox::hostcall::{HostcallKind, HostcallOutcome, HostcallQueue};

/// Host work requested by a suspended script. The session implements this;
/// tests substitute a mock.
#[async_trait(?Send)]
pub trait HostcallHandler {
    async fn handle(&mut self, kind: HostcallKind) -> HostcallOutcome;
}

/// What a completed run produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// One-shot script; the run is over.
    Script,
    /// The script produced (or registered) an object with a callable
    /// `invoke`. It now sits in the engine's active-agent slot and the
    /// session may run chat turns against it.
    Agent { tools: serde_json::Value },
}

/// One chat exchange with the active agent.
#[derive(Debug, Clone)]
pub struct TurnReply {
    pub reply: String,
    /// Human-readable record of the tool calls the turn made, if any.
    pub tool_summary: Option<String>,
}

pub struct ScriptRuntime {
    runtime: AsyncRuntime,
    context: AsyncContext,
    hostcalls: HostcallQueue,
    specs: AgentSpecs,
    /// Epoch millis after which the interrupt handler cuts the engine.
    deadline_ms: Arc<AtomicU64>,
    timed_out: Arc<AtomicBool>,
    timeout_ms: u64,
}

impl ScriptRuntime {
    pub async fn new(timeout_seconds: u64) -> Result<Self> {
        let runtime = AsyncRuntime::new().map_err(|e| map_engine(&e))?;
        let context = AsyncContext::full(&runtime)
            .await
            .map_err(|e| map_engine(&e))?;

        let deadline_ms = Arc::new(AtomicU64::new(u64::MAX));
        let timed_out = Arc::new(AtomicBool::new(false));
        {
            let deadline = deadline_ms.clone();
            let flag = timed_out.clone();
            runtime
                .set_interrupt_handler(Some(Box::new(move || {
                    if now_ms() > deadline.load(Ordering::Relaxed) {
                        flag.store(true, Ordering::Relaxed);
                        true
                    } else {
                        false
                    }
                })))
                .await;
        }

        context
            .with(|ctx| ctx.eval::<(), _>(BOOTSTRAP_JS))
            .await
            .map_err(|e| map_engine(&e))?;

        Ok(Self {
            runtime,
            context,
            hostcalls: HostcallQueue::new(),
            specs: AgentSpecs::default(),
            deadline_ms,
            timed_out,
            timeout_ms: timeout_seconds.saturating_mul(1000),
        })
    }

    /// Options a script passed to `createAgent`, by agent id.
    pub fn agent_spec(&self, agent_id: u64) -> Option<serde_json::Value> {
        self.specs.borrow().get(&agent_id).cloned()
    }

    /// Shared handle to the `createAgent` options map, for the hostcall
    /// handler running alongside the drive loop.
    pub fn specs(&self) -> AgentSpecs {
        self.specs.clone()
    }

    /// Run one script to completion and classify its result.
    ///
    /// Starting a run resets the engine-side state, which drops any agent
    /// a previous run left active. Console output lands in `sink` as the
    /// script produces it.
    pub async fn execute(
        &self,
        source: &str,
        bindings: &BindingSet,
        sink: &Rc<RefCell<OutputSink>>,
        handler: &mut dyn HostcallHandler,
    ) -> Result<Classification> {
        self.timed_out.store(false, Ordering::Relaxed);
        self.specs.borrow_mut().clear();
        // Stale requests from a replaced run must not leak into this one.
        let _ = self.hostcalls.drain();
        self.arm_deadline();

        let hostcalls = self.hostcalls.clone();
        let specs = self.specs.clone();
        let sink = sink.clone();
        let bindings = bindings.clone();
        let source = source.to_string();

        let constructed = self
            .context
            .with(move |ctx| -> rquickjs::Result<serde_json::Value> {
                let values: Object = bindings.install(&ctx, &hostcalls, &sink, &specs)?;
                let run: Function = ctx.globals().get("__pad_run")?;
                let result: Value = run.call((source.as_str(), values))?;
                js_to_json(result)
            })
            .await
            .map_err(|e| map_engine(&e))?;

        if constructed.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            return Err(AgentpadError::ScriptConstruction {
                message: field(&constructed, "message"),
                stack: field(&constructed, "stack"),
            });
        }

        let outcome = self.drive("__pad_poll()", handler).await?;
        if outcome.get("ok").and_then(|v| v.as_bool()) == Some(true) {
            self.classify().await
        } else {
            Err(AgentpadError::ScriptRuntime {
                message: field(&outcome, "message"),
                stack: field(&outcome, "stack"),
            })
        }
    }

    /// One chat exchange against the active agent, with a thread id for
    /// the agent's own conversation memory.
    pub async fn chat_turn(
        &self,
        message: &str,
        thread_id: &str,
        handler: &mut dyn HostcallHandler,
    ) -> Result<TurnReply> {
        self.timed_out.store(false, Ordering::Relaxed);
        self.arm_deadline();

        let request = serde_json::json!({
            "payload": { "messages": [{ "role": "user", "content": message }] },
            "config": { "configurable": { "thread_id": thread_id } },
        })
        .to_string();

        let started = self
            .context
            .with(move |ctx| -> rquickjs::Result<bool> {
                let turn: Function = ctx.globals().get("__pad_turn")?;
                turn.call((request.as_str(),))
            })
            .await
            .map_err(|e| map_engine(&e))?;
        if !started {
            return Err(AgentpadError::NoActiveAgent);
        }

        let outcome = self.drive("__pad_turn_poll()", handler).await?;
        if outcome.get("ok").and_then(|v| v.as_bool()) == Some(true) {
            let value = outcome
                .get("value")
                .cloned()
                .unwrap_or(serde_json::Value::Null);
            Ok(extract_reply(&value))
        } else {
            Err(AgentpadError::ScriptRuntime {
                message: field(&outcome, "message"),
                stack: field(&outcome, "stack"),
            })
        }
    }

    pub async fn has_active_agent(&self) -> Result<bool> {
        self.eval_json("__pad_has_active()")
            .await
            .map(|v| v.as_bool().unwrap_or(false))
    }

    /// Drop the active agent without starting a new run.
    pub async fn drop_active_agent(&self) -> Result<()> {
        self.eval_json("__pad_drop_active()").await.map(|_| ())
    }

    /// Drain jobs, deliver hostcall completions, and poll `poll_expr`
    /// until the watched slot settles.
    async fn drive(
        &self,
        poll_expr: &str,
        handler: &mut dyn HostcallHandler,
    ) -> Result<serde_json::Value> {
        loop {
            self.arm_deadline();
            self.drain_jobs().await?;

            let status = self.eval_json(poll_expr).await?;
            if status.get("phase").and_then(|p| p.as_str()) == Some("done") {
                return Ok(status);
            }

            let requests = self.hostcalls.drain();
            if requests.is_empty() {
                // Not settled, no runnable job, nothing asked of the host:
                // the script is parked on a promise nobody will resolve.
                debug!("script suspended with no pending hostcalls");
                return Err(AgentpadError::ScriptStalled);
            }

            for request in requests {
                trace!(call_id = request.call_id, "dispatching hostcall");
                let outcome = handler.handle(request.kind).await;
                self.arm_deadline();
                self.deliver(request.call_id, outcome).await?;
            }
        }
    }

    /// Settle one suspended call back into the engine.
    async fn deliver(&self, call_id: u64, outcome: HostcallOutcome) -> Result<()> {
        self.context
            .with(move |ctx| -> rquickjs::Result<()> {
                let complete: Function = ctx.globals().get("__pad_complete")?;
                let settled = Object::new(ctx.clone())?;
                match outcome {
                    HostcallOutcome::Success(value) => {
                        settled.set("ok", true)?;
                        settled.set("value", json_to_js(&ctx, &value)?)?;
                    }
                    HostcallOutcome::Error { message } => {
                        settled.set("ok", false)?;
                        settled.set("message", message)?;
                    }
                }
                complete.call((call_id as f64, settled))
            })
            .await
            .map_err(|e| map_engine(&e))
    }

    async fn classify(&self) -> Result<Classification> {
        let verdict = self.eval_json("__pad_classify()").await?;
        if verdict.get("agent").and_then(|v| v.as_bool()) == Some(true) {
            let tools = verdict
                .get("tools")
                .cloned()
                .unwrap_or(serde_json::Value::Null);
            debug!("run produced an agent");
            Ok(Classification::Agent { tools })
        } else {
            Ok(Classification::Script)
        }
    }

    async fn drain_jobs(&self) -> Result<()> {
        loop {
            match self.runtime.execute_pending_job().await {
                Ok(true) => continue,
                Ok(false) => return Ok(()),
                Err(e) => {
                    if self.timed_out.load(Ordering::Relaxed) {
                        return Err(AgentpadError::ScriptTimeout {
                            seconds: self.timeout_ms / 1000,
                        });
                    }
                    return Err(AgentpadError::Engine(format!("pending job: {e}")));
                }
            }
        }
    }

    async fn eval_json(&self, expr: &str) -> Result<serde_json::Value> {
        if self.timed_out.load(Ordering::Relaxed) {
            return Err(AgentpadError::ScriptTimeout {
                seconds: self.timeout_ms / 1000,
            });
        }
        let expr = expr.to_string();
        self.context
            .with(move |ctx| -> rquickjs::Result<serde_json::Value> {
                let value: Value = ctx.eval(expr.as_bytes())?;
                js_to_json(value)
            })
            .await
            .map_err(|e| map_engine(&e))
    }

    fn arm_deadline(&self) {
        self.deadline_ms
            .store(now_ms().saturating_add(self.timeout_ms), Ordering::Relaxed);
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn map_engine(err: &rquickjs::Error) -> AgentpadError {
    AgentpadError::Engine(engine_error_text(err))
}

fn field(value: &serde_json::Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Pull the reply text and a tool summary out of a turn's response value.
///
/// The reply is the last message's content; a response that isn't shaped
/// that way is rendered wholesale rather than dropped.
fn extract_reply(response: &serde_json::Value) -> TurnReply {
    let reply = response
        .get("messages")
        .and_then(|m| m.as_array())
        .and_then(|m| m.last())
        .and_then(|last| last.get("content"))
        .map(|content| match content {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| match response {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        });

    let tool_summary = response
        .get("toolCalls")
        .and_then(|t| t.as_array())
        .filter(|calls| !calls.is_empty())
        .map(|calls| {
            let rendered: Vec<String> = calls
                .iter()
                .map(|call| {
                    let name = call.get("name").and_then(|n| n.as_str()).unwrap_or("?");
                    match call.get("input") {
                        Some(input) if !input.is_null() => format!("{name} {input}"),
                        _ => name.to_string(),
                    }
                })
                .collect();
            format!("tools used: {}", rendered.join("; "))
        });

    TurnReply {
        reply,
        tool_summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::ResolvedCredentials;
    use crate::output::OutputKind;
    use std::collections::VecDeque;

    /// Scripted stand-in for the session: canned input lines, echo agent
    /// turns, canned ledger payloads.
    struct MockHost {
        inputs: VecDeque<String>,
        ledger: serde_json::Value,
        handled: Vec<&'static str>,
    }

    impl MockHost {
        fn new() -> Self {
            Self {
                inputs: VecDeque::new(),
                ledger: serde_json::json!({"balance": 100}),
                handled: Vec::new(),
            }
        }

        fn with_inputs(lines: &[&str]) -> Self {
            let mut host = Self::new();
            host.inputs = lines.iter().map(|s| s.to_string()).collect();
            host
        }
    }

    #[async_trait(?Send)]
    impl HostcallHandler for MockHost {
        async fn handle(&mut self, kind: HostcallKind) -> HostcallOutcome {
            match kind {
                HostcallKind::ReadLine { .. } => {
                    self.handled.push("input");
                    // Exhausted inputs behave like a stopped session.
                    let line = self.inputs.pop_front().unwrap_or_default();
                    HostcallOutcome::Success(serde_json::Value::String(line))
                }
                HostcallKind::AgentInvoke { payload, .. } => {
                    self.handled.push("agent");
                    let user = payload["payload"]["messages"]
                        .as_array()
                        .and_then(|m| m.last())
                        .and_then(|m| m["content"].as_str())
                        .unwrap_or_default();
                    let reply = if user == "ping" { "pong" } else { "ok" };
                    HostcallOutcome::Success(serde_json::json!({
                        "messages": [{ "role": "assistant", "content": reply }],
                        "toolCalls": [],
                    }))
                }
                HostcallKind::LedgerQuery { .. } => {
                    self.handled.push("ledger");
                    HostcallOutcome::Success(self.ledger.clone())
                }
            }
        }
    }

    fn bindings() -> BindingSet {
        BindingSet::new(
            ResolvedCredentials {
                account_id: "0.0.1001".into(),
                private_key: "302e0201".into(),
                api_key: "sk-test".into(),
            },
            "testnet",
        )
    }

    fn sink() -> Rc<RefCell<OutputSink>> {
        Rc::new(RefCell::new(OutputSink::new(None)))
    }

    async fn run(
        source: &str,
        host: &mut MockHost,
    ) -> (Result<Classification>, Rc<RefCell<OutputSink>>) {
        let runtime = ScriptRuntime::new(30).await.unwrap();
        let sink = sink();
        let outcome = runtime.execute(source, &bindings(), &sink, host).await;
        (outcome, sink)
    }

    #[tokio::test]
    async fn plain_log_script_completes_as_script() {
        let mut host = MockHost::new();
        let (outcome, sink) = run("console.log('hi');", &mut host).await;

        assert_eq!(outcome.unwrap(), Classification::Script);
        let sink = sink.borrow();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.lines()[0].kind, OutputKind::Log);
        assert_eq!(sink.lines()[0].text, "hi");
        // never suspended
        assert!(host.handled.is_empty());
    }

    #[tokio::test]
    async fn syntax_error_fails_at_construction() {
        let mut host = MockHost::new();
        let (outcome, sink) = run("const = broken %%", &mut host).await;

        assert!(matches!(
            outcome.unwrap_err(),
            AgentpadError::ScriptConstruction { .. }
        ));
        // aborted before any binding ran
        assert!(sink.borrow().is_empty());
        assert!(host.handled.is_empty());
    }

    #[tokio::test]
    async fn thrown_error_carries_message_and_stack() {
        let mut host = MockHost::new();
        let (outcome, _) = run("throw new Error('boom');", &mut host).await;

        match outcome.unwrap_err() {
            AgentpadError::ScriptRuntime { message, .. } => {
                assert!(message.contains("boom"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn input_suspends_and_resumes_with_the_submitted_line() {
        let mut host = MockHost::with_inputs(&["Ann"]);
        let source = r#"
            const name = await input('name?');
            console.log('hello ' + name);
        "#;
        let (outcome, sink) = run(source, &mut host).await;

        assert_eq!(outcome.unwrap(), Classification::Script);
        assert_eq!(sink.borrow().lines()[0].text, "hello Ann");
        assert_eq!(host.handled, vec!["input"]);
    }

    #[tokio::test]
    async fn input_loop_exits_on_the_empty_sentinel() {
        let mut host = MockHost::with_inputs(&["first", "second"]);
        let source = r#"
            while (true) {
                const line = await input();
                if (!line) break;
                console.log('got ' + line);
            }
        "#;
        let (outcome, sink) = run(source, &mut host).await;

        assert_eq!(outcome.unwrap(), Classification::Script);
        let sink = sink.borrow();
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.lines()[0].text, "got first");
        assert_eq!(sink.lines()[1].text, "got second");
        // two real lines plus the sentinel read
        assert_eq!(host.handled.len(), 3);
    }

    #[tokio::test]
    async fn returned_invoke_object_classifies_as_agent() {
        let mut host = MockHost::new();
        let source = r#"
            return {
                tools: ['echo'],
                invoke: async (payload) => ({
                    messages: [
                        ...payload.messages,
                        { role: 'assistant', content: 'pong' },
                    ],
                }),
            };
        "#;
        let runtime = ScriptRuntime::new(30).await.unwrap();
        let sink = sink();
        let outcome = runtime
            .execute(source, &bindings(), &sink, &mut host)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            Classification::Agent {
                tools: serde_json::json!(["echo"])
            }
        );
        assert!(runtime.has_active_agent().await.unwrap());

        let turn = runtime.chat_turn("ping", "t-1", &mut host).await.unwrap();
        assert_eq!(turn.reply, "pong");
        assert!(turn.tool_summary.is_none());
    }

    #[tokio::test]
    async fn self_referential_tools_value_still_classifies() {
        let mut host = MockHost::new();
        let source = r#"
            const t = [];
            t.push(t);
            return { invoke: async () => ({ messages: [] }), tools: t };
        "#;
        let (outcome, _) = run(source, &mut host).await;
        assert!(matches!(outcome.unwrap(), Classification::Agent { .. }));
    }

    #[tokio::test]
    async fn explicit_registration_wins_over_the_return_value() {
        let mut host = MockHost::new();
        let source = r#"
            registerAgent({ invoke: async () => ({ messages: [{ role: 'assistant', content: 'registered' }] }) }, ['a']);
            return { invoke: async () => ({ messages: [{ role: 'assistant', content: 'returned' }] }) };
        "#;
        let runtime = ScriptRuntime::new(30).await.unwrap();
        let outcome = runtime
            .execute(source, &bindings(), &sink(), &mut host)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            Classification::Agent {
                tools: serde_json::json!(["a"])
            }
        );
        let turn = runtime.chat_turn("hi", "t-1", &mut host).await.unwrap();
        assert_eq!(turn.reply, "registered");
    }

    #[tokio::test]
    async fn new_execution_drops_the_previous_agent() {
        let mut host = MockHost::new();
        let runtime = ScriptRuntime::new(30).await.unwrap();
        let agent_source = "return { invoke: async () => ({ messages: [] }) };";
        runtime
            .execute(agent_source, &bindings(), &sink(), &mut host)
            .await
            .unwrap();
        assert!(runtime.has_active_agent().await.unwrap());

        runtime
            .execute("console.log('next');", &bindings(), &sink(), &mut host)
            .await
            .unwrap();
        assert!(!runtime.has_active_agent().await.unwrap());

        let err = runtime.chat_turn("hi", "t-1", &mut host).await.unwrap_err();
        assert!(matches!(err, AgentpadError::NoActiveAgent));
    }

    #[tokio::test]
    async fn turn_failure_keeps_the_agent_alive() {
        let mut host = MockHost::new();
        let runtime = ScriptRuntime::new(30).await.unwrap();
        let source = r#"
            let first = true;
            return {
                invoke: async () => {
                    if (first) { first = false; throw new Error('flaky'); }
                    return { messages: [{ role: 'assistant', content: 'recovered' }] };
                },
            };
        "#;
        runtime
            .execute(source, &bindings(), &sink(), &mut host)
            .await
            .unwrap();

        let err = runtime.chat_turn("hi", "t-1", &mut host).await.unwrap_err();
        match err {
            AgentpadError::ScriptRuntime { message, .. } => assert!(message.contains("flaky")),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(runtime.has_active_agent().await.unwrap());
        let turn = runtime.chat_turn("hi", "t-1", &mut host).await.unwrap();
        assert_eq!(turn.reply, "recovered");
    }

    #[tokio::test]
    async fn unresolvable_promise_reports_a_stalled_script() {
        let mut host = MockHost::new();
        let (outcome, _) = run("await new Promise(() => {});", &mut host).await;
        assert!(matches!(outcome.unwrap_err(), AgentpadError::ScriptStalled));
    }

    #[tokio::test]
    async fn unknown_require_returns_empty_record_with_diagnostic() {
        let mut host = MockHost::new();
        let source = r#"
            const m = require('left-pad');
            console.log('keys: ' + Object.keys(m).length);
        "#;
        let (outcome, sink) = run(source, &mut host).await;

        assert_eq!(outcome.unwrap(), Classification::Script);
        let sink = sink.borrow();
        assert_eq!(sink.len(), 2);
        assert!(sink.lines()[0].text.contains("left-pad"));
        assert_eq!(sink.lines()[1].text, "keys: 0");
    }

    #[tokio::test]
    async fn approved_require_names_resolve() {
        let mut host = MockHost::new();
        let source = r#"
            const kit = require('agent-kit');
            const sdk = require('ledger-sdk');
            console.log(typeof kit.createAgent, typeof sdk.Ledger.accountBalance);
        "#;
        let (outcome, sink) = run(source, &mut host).await;

        assert_eq!(outcome.unwrap(), Classification::Script);
        assert_eq!(sink.borrow().lines()[0].text, "function function");
    }

    #[tokio::test]
    async fn get_config_exposes_resolved_credentials() {
        let mut host = MockHost::new();
        let source = r#"
            const cfg = getConfig();
            console.log(cfg.accountId + '/' + cfg.apiKey);
        "#;
        let (_, sink) = run(source, &mut host).await;
        assert_eq!(sink.borrow().lines()[0].text, "0.0.1001/sk-test");
    }

    #[tokio::test]
    async fn ledger_binding_round_trips_through_the_host() {
        let mut host = MockHost::new();
        let source = r#"
            const res = await Ledger.accountBalance({ accountId: '0.0.1001' });
            console.log('balance ' + res.balance);
        "#;
        let (outcome, sink) = run(source, &mut host).await;

        assert_eq!(outcome.unwrap(), Classification::Script);
        assert_eq!(sink.borrow().lines()[0].text, "balance 100");
        assert_eq!(host.handled, vec!["ledger"]);
    }

    #[tokio::test]
    async fn console_warn_maps_to_a_prefixed_log_line() {
        let mut host = MockHost::new();
        let (_, sink) = run("console.warn('careful');", &mut host).await;
        let sink = sink.borrow();
        assert_eq!(sink.lines()[0].kind, OutputKind::Log);
        assert_eq!(sink.lines()[0].text, "warning: careful");
    }

    #[tokio::test]
    async fn busy_loop_is_cut_by_the_wall_clock_interrupt() {
        let mut host = MockHost::new();
        let runtime = ScriptRuntime::new(1).await.unwrap();
        let outcome = runtime
            .execute("while (true) {}", &bindings(), &sink(), &mut host)
            .await;
        assert!(matches!(
            outcome.unwrap_err(),
            AgentpadError::ScriptTimeout { seconds: 1 }
        ));
    }

    #[test]
    fn reply_extraction_handles_tool_calls_and_odd_shapes() {
        let response = serde_json::json!({
            "messages": [
                { "role": "user", "content": "balance?" },
                { "role": "assistant", "content": "You hold 100." },
            ],
            "toolCalls": [{ "name": "get_account_balance", "input": { "accountId": "0.0.1001" } }],
        });
        let turn = extract_reply(&response);
        assert_eq!(turn.reply, "You hold 100.");
        let summary = turn.tool_summary.unwrap();
        assert!(summary.contains("get_account_balance"));
        assert!(summary.contains("0.0.1001"));

        // a bare string response is used as-is
        let turn = extract_reply(&serde_json::json!("plain"));
        assert_eq!(turn.reply, "plain");
        assert!(turn.tool_summary.is_none());
    }
}
