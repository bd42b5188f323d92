//! Append-only output log shared by script execution and chat turns.
//!
//! Every user-visible result of a run is an [`OutputLine`] appended here;
//! the presentation layer subscribes to [`SessionEvent`]s and renders them
//! without any business logic of its own.

mod tabs;

pub use tabs::{OutputTab, TabStore};
pub(crate) use tabs::format_base36;

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

/// Tag carried by every output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Log,
    Info,
    Success,
    Error,
    /// Human side of a chat turn
    User,
    /// Agent side of a chat turn
    Agent,
}

impl OutputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
            Self::User => "user",
            Self::Agent => "agent",
        }
    }

    /// Parse a tag coming over the sandbox boundary. Unknown tags fall back
    /// to `Log` rather than failing a script over a bad string.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "info" => Self::Info,
            "success" => Self::Success,
            "error" => Self::Error,
            "user" => Self::User,
            "agent" => Self::Agent,
            _ => Self::Log,
        }
    }
}

/// One appended record. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputLine {
    /// Position in the sink, starting at 0
    pub seq: u64,
    pub kind: OutputKind,
    pub text: String,
    /// Links a tool summary to the agent reply it belongs to
    pub parent: Option<u64>,
    /// Unix epoch seconds at append time
    pub at: u64,
}

/// Session status surfaced to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Running,
    AwaitingInput,
    /// An agent was classified and chat turns are accepted
    ChatReady,
}

/// Events emitted by the session for the renderer. The render path only
/// formats these; all state transitions happen before emission.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Line(OutputLine),
    Status(SessionStatus),
    InputRequested { prompt: Option<String> },
}

/// Append-only line log with event fan-out.
pub struct OutputSink {
    lines: Vec<OutputLine>,
    events: Option<UnboundedSender<SessionEvent>>,
}

impl OutputSink {
    pub fn new(events: Option<UnboundedSender<SessionEvent>>) -> Self {
        Self {
            lines: Vec::new(),
            events,
        }
    }

    /// Append one line and notify the renderer. Returns the line's seq.
    pub fn append(&mut self, kind: OutputKind, text: impl Into<String>) -> u64 {
        self.append_linked(kind, text, None)
    }

    /// Append a line linked to an earlier one (tool summaries).
    pub fn append_linked(
        &mut self,
        kind: OutputKind,
        text: impl Into<String>,
        parent: Option<u64>,
    ) -> u64 {
        let seq = self.lines.len() as u64;
        let line = OutputLine {
            seq,
            kind,
            text: text.into(),
            parent,
            at: epoch_seconds(),
        };
        trace!(seq, kind = kind.as_str(), "sink append");
        if let Some(events) = &self.events {
            // A closed renderer is not an error; the log still accumulates.
            let _ = events.send(SessionEvent::Line(line.clone()));
        }
        self.lines.push(line);
        seq
    }

    pub fn lines(&self) -> &[OutputLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines appended since `seq`, for snapshotting a single run.
    pub fn lines_since(&self, seq: u64) -> &[OutputLine] {
        &self.lines[seq as usize..]
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Count of lines with the given kind, used by tests and summaries.
    pub fn count_kind(&self, kind: OutputKind) -> usize {
        self.lines.iter().filter(|l| l.kind == kind).count()
    }
}

fn epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_assigns_sequential_seqs() {
        let mut sink = OutputSink::new(None);
        assert_eq!(sink.append(OutputKind::Log, "one"), 0);
        assert_eq!(sink.append(OutputKind::Error, "two"), 1);
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.lines()[1].kind, OutputKind::Error);
    }

    #[test]
    fn linked_lines_keep_parent_seq() {
        let mut sink = OutputSink::new(None);
        let reply = sink.append(OutputKind::Agent, "pong");
        let tools = sink.append_linked(OutputKind::Info, "tools used: none", Some(reply));
        assert_eq!(sink.lines()[tools as usize].parent, Some(reply));
    }

    #[test]
    fn events_mirror_appends() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut sink = OutputSink::new(Some(tx));
        sink.append(OutputKind::Info, "hello");

        match rx.try_recv().unwrap() {
            SessionEvent::Line(line) => {
                assert_eq!(line.text, "hello");
                assert_eq!(line.kind, OutputKind::Info);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn lines_since_slices_one_run() {
        let mut sink = OutputSink::new(None);
        sink.append(OutputKind::Log, "old");
        let mark = sink.len() as u64;
        sink.append(OutputKind::Log, "new");
        let run = sink.lines_since(mark);
        assert_eq!(run.len(), 1);
        assert_eq!(run[0].text, "new");
    }
}
