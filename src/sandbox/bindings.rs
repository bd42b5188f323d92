//! The binding registry: every name a sandboxed script can see.
//!
//! One registry serves both direct execution and chat sessions, so the same
//! script text behaves identically on either surface. The surface is
//! `console`, `getConfig`, `require`, `input`, `registerAgent`,
//! `createAgent`, `toolNames` and `Ledger`; anything else resolves to engine
//! built-ins or fails with a reference error at invocation time.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use rquickjs::function::Func;
use rquickjs::{Ctx, Function, Object};
use tracing::trace;

use crate::agent::tools;
use crate::config::loader::ResolvedCredentials;
use crate::output::{OutputKind, OutputSink};
use crate::sandbox::hostcall::{HostcallKind, HostcallQueue, HostcallRequest};

/// Ordered parameter names of the constructed script function. The order
/// must match the value order produced by `__pad_make_bindings`.
pub const BINDING_NAMES: [&str; 8] = [
    "console",
    "getConfig",
    "require",
    "input",
    "registerAgent",
    "createAgent",
    "toolNames",
    "Ledger",
];

/// Options a script passed to `createAgent`, held host-side until the first
/// `invoke` hostcall needs them.
pub type AgentSpecs = Rc<RefCell<HashMap<u64, serde_json::Value>>>;

/// Everything the registry needs to materialize a fresh binding surface.
///
/// Built once per execution; the credentials inside are already resolved,
/// nothing here reads the process environment.
#[derive(Debug, Clone)]
pub struct BindingSet {
    pub credentials: ResolvedCredentials,
    pub network: String,
}

impl BindingSet {
    pub fn new(credentials: ResolvedCredentials, network: impl Into<String>) -> Self {
        Self {
            credentials,
            network: network.into(),
        }
    }

    fn config_json(&self) -> String {
        serde_json::json!({
            "accountId": self.credentials.account_id,
            "privateKey": self.credentials.private_key,
            "apiKey": self.credentials.api_key,
            "network": self.network,
        })
        .to_string()
    }

    /// Install the host-side primitives and build the bindings object for
    /// one execution. Console lines land in `sink`, suspended calls in
    /// `queue`, `createAgent` options in `specs`.
    pub fn install<'js>(
        &self,
        ctx: &Ctx<'js>,
        queue: &HostcallQueue,
        sink: &Rc<RefCell<OutputSink>>,
        specs: &AgentSpecs,
    ) -> rquickjs::Result<Object<'js>> {
        let global = ctx.globals();

        let console_sink = sink.clone();
        global.set(
            "__pad_console",
            Func::from(move |kind: String, text: String| {
                console_sink
                    .borrow_mut()
                    .append(OutputKind::from_tag(&kind), text);
            }),
        )?;

        // Promise creation happens in the bootstrap; this side only records
        // the call against the id JS registered for it.
        let enqueue_queue = queue.clone();
        global.set(
            "__pad_enqueue_native",
            Func::from(
                move |ctx: Ctx<'_>,
                      call_id: f64,
                      kind: String,
                      payload: String|
                      -> rquickjs::Result<()> {
                    let parsed: serde_json::Value =
                        serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null);
                    let kind = match parse_hostcall(&kind, &parsed) {
                        Some(kind) => kind,
                        None => return Err(throw_message(&ctx, "malformed hostcall request")),
                    };

                    trace!(call_id, "hostcall enqueued");
                    enqueue_queue.push(HostcallRequest {
                        call_id: call_id as u64,
                        kind,
                    });
                    Ok(())
                },
            ),
        )?;

        let create_specs = specs.clone();
        global.set(
            "__pad_create_agent",
            Func::from(move |options: String| -> u32 {
                let parsed: serde_json::Value =
                    serde_json::from_str(&options).unwrap_or(serde_json::Value::Null);
                let mut specs = create_specs.borrow_mut();
                let id = specs.len() as u64 + 1;
                specs.insert(id, parsed);
                id as u32
            }),
        )?;

        let make: Function = global.get("__pad_make_bindings")?;
        let bindings: Object = make.call((self.config_json(), tools::catalog().to_string()))?;
        Ok(bindings)
    }
}

fn parse_hostcall(kind: &str, payload: &serde_json::Value) -> Option<HostcallKind> {
    match kind {
        "input" => Some(HostcallKind::ReadLine {
            prompt: payload
                .get("prompt")
                .and_then(|p| p.as_str())
                .map(String::from),
        }),
        "agent" => Some(HostcallKind::AgentInvoke {
            agent_id: payload.get("agent_id").and_then(|v| v.as_u64())?,
            payload: payload.clone(),
        }),
        "ledger" => Some(HostcallKind::LedgerQuery {
            tool: payload.get("tool")?.as_str()?.to_string(),
            input: payload
                .get("input")
                .cloned()
                .unwrap_or(serde_json::Value::Null),
        }),
        _ => None,
    }
}

fn throw_message(ctx: &Ctx<'_>, message: &str) -> rquickjs::Error {
    use rquickjs::IntoJs;
    match message.into_js(ctx) {
        Ok(value) => ctx.throw(value),
        Err(err) => err,
    }
}

/// Engine-side plumbing installed once per context: hostcall resolver map,
/// run/outcome slots, and the factory for the user-facing binding surface.
pub const BOOTSTRAP_JS: &str = r#"
globalThis.__pad = {
    calls: new Map(),
    nextCall: 1,
    state: { outcome: { phase: 'idle' }, result: undefined, registered: null, active: null, turn: null },
};

function __pad_register(resolve, reject) {
    const id = __pad.nextCall++;
    __pad.calls.set(id, { resolve, reject });
    return id;
}

// A throw from the native half rejects the new promise via the executor.
function __pad_enqueue(kind, payloadJson) {
    return new Promise((resolve, reject) => {
        const id = __pad_register(resolve, reject);
        __pad_enqueue_native(id, kind, payloadJson);
    });
}

function __pad_complete(id, outcome) {
    const pending = __pad.calls.get(id);
    if (!pending) return;
    __pad.calls.delete(id);
    if (outcome.ok) {
        pending.resolve(outcome.value);
    } else {
        pending.reject(new Error(outcome.message));
    }
}

function __pad_reset() {
    __pad.calls.clear();
    __pad.state = {
        outcome: { phase: 'pending' },
        result: undefined,
        registered: null,
        active: null,
        turn: null,
    };
}

function __pad_err(e) {
    return {
        message: String(e && e.message !== undefined ? e.message : e),
        stack: String(e && e.stack ? e.stack : ''),
    };
}

function __pad_run(source, bindings) {
    __pad_reset();
    const names = ['console', 'getConfig', 'require', 'input', 'registerAgent', 'createAgent', 'toolNames', 'Ledger'];
    const AsyncFunction = Object.getPrototypeOf(async function () {}).constructor;
    let fn;
    try {
        fn = new AsyncFunction(...names, source);
    } catch (e) {
        __pad.state.outcome = { phase: 'idle' };
        const err = __pad_err(e);
        return { ok: false, message: err.message, stack: err.stack };
    }
    const values = names.map(n => bindings[n]);
    Promise.resolve()
        .then(() => fn(...values))
        .then(
            value => {
                __pad.state.result = value;
                __pad.state.outcome = { phase: 'done', ok: true };
            },
            e => {
                const err = __pad_err(e);
                __pad.state.outcome = { phase: 'done', ok: false, message: err.message, stack: err.stack };
            },
        );
    return { ok: true };
}

function __pad_poll() {
    return __pad.state.outcome;
}

function __pad_classify() {
    const reg = __pad.state.registered;
    const candidate = reg ? reg.agent : __pad.state.result;
    if (candidate && typeof candidate.invoke === 'function') {
        __pad.state.active = candidate;
        const tools = reg && reg.tools !== null ? reg.tools : (candidate.tools !== undefined ? candidate.tools : null);
        return { agent: true, tools: tools === undefined ? null : tools };
    }
    return { agent: false, tools: null };
}

function __pad_has_active() {
    return __pad.state.active !== null;
}

function __pad_drop_active() {
    __pad.state.active = null;
}

function __pad_turn(requestJson) {
    if (!__pad.state.active) return false;
    const req = JSON.parse(requestJson);
    __pad.state.turn = { phase: 'pending' };
    Promise.resolve()
        .then(() => __pad.state.active.invoke(req.payload, req.config))
        .then(
            value => { __pad.state.turn = { phase: 'done', ok: true, value: value }; },
            e => {
                const err = __pad_err(e);
                __pad.state.turn = { phase: 'done', ok: false, message: err.message, stack: err.stack };
            },
        );
    return true;
}

function __pad_turn_poll() {
    const turn = __pad.state.turn;
    if (turn && turn.phase === 'done') {
        __pad.state.turn = null;
        return turn;
    }
    return { phase: 'pending' };
}

function __pad_fmt(args) {
    return args.map(a => {
        if (a === null) return 'null';
        if (a === undefined) return 'undefined';
        if (typeof a === 'object') {
            try { return JSON.stringify(a, null, 2); } catch (_) { return String(a); }
        }
        return String(a);
    }).join(' ');
}

function __pad_make_bindings(configJson, toolNamesJson) {
    const cfg = JSON.parse(configJson);
    const toolNames = JSON.parse(toolNamesJson);

    const console = {
        log: (...a) => __pad_console('log', __pad_fmt(a)),
        info: (...a) => __pad_console('info', __pad_fmt(a)),
        error: (...a) => __pad_console('error', __pad_fmt(a)),
        success: (...a) => __pad_console('success', __pad_fmt(a)),
        warn: (...a) => __pad_console('log', 'warning: ' + __pad_fmt(a)),
    };

    const getConfig = () => ({
        accountId: cfg.accountId,
        privateKey: cfg.privateKey,
        apiKey: cfg.apiKey,
    });

    const input = (prompt) =>
        __pad_enqueue('input', JSON.stringify({ prompt: prompt === undefined ? null : String(prompt) }));

    const registerAgent = (agent, tools) => {
        __pad.state.registered = { agent: agent, tools: tools === undefined ? null : tools };
    };

    const Ledger = {
        accountBalance: (q) => __pad_ledger(toolNames.ACCOUNT_BALANCE_QUERY_TOOL, q),
        accountInfo: (q) => __pad_ledger(toolNames.ACCOUNT_INFO_QUERY_TOOL, q),
        tokenInfo: (q) => __pad_ledger(toolNames.TOKEN_INFO_QUERY_TOOL, q),
        topicMessages: (q) => __pad_ledger(toolNames.TOPIC_MESSAGES_QUERY_TOOL, q),
    };

    const createAgent = (options) => {
        const opts = options || {};
        const id = __pad_create_agent(JSON.stringify({
            model: opts.model === undefined ? null : opts.model,
            apiKey: opts.apiKey === undefined ? null : opts.apiKey,
            tools: opts.tools === undefined ? null : opts.tools,
            systemPrompt: opts.systemPrompt === undefined ? null : opts.systemPrompt,
        }));
        return {
            tools: opts.tools === undefined ? [] : opts.tools,
            invoke: (payload, config) => __pad_enqueue('agent', JSON.stringify({
                agent_id: id,
                payload: payload === undefined ? {} : payload,
                config: config === undefined ? {} : config,
            })),
        };
    };

    const require = (name) => {
        if (name === 'agent-kit') return { createAgent: createAgent, toolNames: toolNames };
        if (name === 'ledger-sdk') return { Ledger: Ledger };
        __pad_console('log', "warning: module '" + name + "' is not available in the playground, returning an empty record");
        return {};
    };

    return { console, getConfig, require, input, registerAgent, createAgent, toolNames, Ledger };
}

function __pad_ledger(tool, q) {
    return __pad_enqueue('ledger', JSON.stringify({ tool: tool, input: q === undefined ? {} : q }));
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_covers_every_registry_name() {
        for name in BINDING_NAMES {
            assert!(
                BOOTSTRAP_JS.contains(name),
                "bootstrap does not bind '{name}'"
            );
        }
    }

    #[test]
    fn unknown_hostcall_kinds_are_rejected() {
        assert!(parse_hostcall("input", &serde_json::json!({})).is_some());
        assert!(parse_hostcall("fs", &serde_json::json!({})).is_none());
        // agent calls without an id are malformed
        assert!(parse_hostcall("agent", &serde_json::json!({})).is_none());
    }
}
