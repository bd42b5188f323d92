//! The embedded QuickJS sandbox: bindings, hostcall plumbing, and the
//! drive loop that runs scripts to completion.

pub mod bindings;
pub mod bridge;
pub mod convert;
pub mod hostcall;
pub mod runtime;

pub use bindings::{AgentSpecs, BindingSet, BINDING_NAMES};
pub use bridge::{BridgeState, InputBridge, STOP_SENTINEL};
pub use hostcall::{HostcallKind, HostcallOutcome, HostcallQueue, HostcallRequest};
pub use runtime::{Classification, HostcallHandler, ScriptRuntime, TurnReply};

use crate::error::{AgentpadError, Result};

/// Source language tag on an execution request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceLanguage {
    #[default]
    JavaScript,
    TypeScript,
}

impl SourceLanguage {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "js" | "javascript" => Some(Self::JavaScript),
            "ts" | "typescript" => Some(Self::TypeScript),
            _ => None,
        }
    }
}

/// One script submitted for execution.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub source: String,
    pub language: SourceLanguage,
}

impl ExecutionRequest {
    pub fn js(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            language: SourceLanguage::JavaScript,
        }
    }
}

/// Validate a request and hand back the source to execute.
///
/// TypeScript is declared but not transpiled here; rejecting it up front
/// reads the same as a construction failure, so the operator sees one
/// error line instead of a cascade of engine syntax errors.
pub fn prepare(request: &ExecutionRequest) -> Result<&str> {
    match request.language {
        SourceLanguage::JavaScript => Ok(&request.source),
        SourceLanguage::TypeScript => Err(AgentpadError::ScriptConstruction {
            message: "TypeScript sources are not supported; transpile to JavaScript first"
                .to_string(),
            stack: String::new(),
        }),
    }
}
