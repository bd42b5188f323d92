//! Suspended host calls made from inside the script.
//!
//! Script-facing bindings cannot block: each one enqueues a request,
//! hands the engine a pending promise, and returns. The drive loop drains
//! the queue between job batches, performs the host work, and settles the
//! promise by call id.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// A host operation requested by the running script.
#[derive(Debug, Clone)]
pub struct HostcallRequest {
    /// Matches the pending promise registered on the script side.
    pub call_id: u64,
    pub kind: HostcallKind,
}

#[derive(Debug, Clone)]
pub enum HostcallKind {
    /// `input(prompt?)`: park until the operator submits a line.
    ReadLine { prompt: Option<String> },
    /// `agent.invoke(...)`: run one turn of a host-side agent.
    AgentInvoke {
        agent_id: u64,
        payload: serde_json::Value,
    },
    /// `Ledger.*(...)`: one REST query against the gateway.
    LedgerQuery {
        tool: String,
        input: serde_json::Value,
    },
}

/// How a drained request settles back into the script.
#[derive(Debug, Clone)]
pub enum HostcallOutcome {
    Success(serde_json::Value),
    Error { message: String },
}

/// FIFO of requests raised by bindings, drained by the drive loop.
///
/// Single-threaded by construction: bindings and the loop run on the same
/// task, so `Rc<RefCell>` is enough.
#[derive(Clone, Default)]
pub struct HostcallQueue {
    inner: Rc<RefCell<VecDeque<HostcallRequest>>>,
}

impl HostcallQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, request: HostcallRequest) {
        self.inner.borrow_mut().push_back(request);
    }

    /// Take every queued request, preserving arrival order.
    pub fn drain(&self) -> Vec<HostcallRequest> {
        self.inner.borrow_mut().drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_preserves_arrival_order() {
        let queue = HostcallQueue::new();
        queue.push(HostcallRequest {
            call_id: 1,
            kind: HostcallKind::ReadLine { prompt: None },
        });
        queue.push(HostcallRequest {
            call_id: 2,
            kind: HostcallKind::AgentInvoke {
                agent_id: 0,
                payload: serde_json::json!({"messages": []}),
            },
        });

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].call_id, 1);
        assert_eq!(drained[1].call_id, 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn clones_share_the_same_queue() {
        let queue = HostcallQueue::new();
        let handle = queue.clone();
        handle.push(HostcallRequest {
            call_id: 7,
            kind: HostcallKind::ReadLine {
                prompt: Some("name?".into()),
            },
        });
        assert!(!queue.is_empty());
        assert_eq!(queue.drain()[0].call_id, 7);
    }
}
