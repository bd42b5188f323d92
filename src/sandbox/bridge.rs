//! Interactive input bridge between a running script and the operator.
//!
//! `input(prompt?)` inside the sandbox parks the script on a promise; the
//! bridge holds the single resolver for that promise until the operator
//! submits a line or stops the run. State is a three-way machine:
//!
//! ```text
//! Idle --begin_run--> Running --request--> AwaitingInput
//!                     Running <--submit--- AwaitingInput
//!                     Running --finish_run--> Idle
//!                     AwaitingInput --stop--> Idle   (resolved with sentinel)
//! ```
//!
//! At most one request is outstanding at any time. A submission with no
//! pending request is absorbed without effect.

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{AgentpadError, Result};

/// Resolution value delivered when a run is stopped instead of answered.
/// Scripts observe the empty line as "no further input" and unwind.
pub const STOP_SENTINEL: &str = "";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// No script running.
    Idle,
    /// Script executing, nothing pending.
    Running,
    /// Script suspended on `input()`, waiting for the operator.
    AwaitingInput,
}

pub struct InputBridge {
    state: BridgeState,
    /// The single pending resolver. Cleared the moment it is resolved.
    pending: Option<oneshot::Sender<String>>,
    /// Prompt attached to the pending request, if any.
    prompt: Option<String>,
    /// Set by `stop()`; makes any later `request` resolve immediately with
    /// the sentinel so a stopped script cannot re-park itself.
    stopping: bool,
}

impl InputBridge {
    pub fn new() -> Self {
        Self {
            state: BridgeState::Idle,
            pending: None,
            prompt: None,
            stopping: false,
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn is_awaiting_input(&self) -> bool {
        self.state == BridgeState::AwaitingInput
    }

    /// Enter Running for a fresh execution. Any stale resolver from a
    /// replaced run is dropped here, which cancels its receiver.
    pub fn begin_run(&mut self) {
        self.pending = None;
        self.prompt = None;
        self.stopping = false;
        self.state = BridgeState::Running;
    }

    /// The run's outcome resolved or failed; back to Idle.
    pub fn finish_run(&mut self) {
        self.pending = None;
        self.prompt = None;
        self.stopping = false;
        self.state = BridgeState::Idle;
    }

    /// Park the script on a new input request.
    ///
    /// Returns the receiver the caller awaits. If the run is already
    /// stopping the receiver arrives pre-resolved with [`STOP_SENTINEL`].
    /// A second request while one is outstanding is a script contract
    /// violation and fails instead of clobbering the live resolver.
    pub fn request(&mut self, prompt: Option<String>) -> Result<oneshot::Receiver<String>> {
        if self.stopping {
            let (tx, rx) = oneshot::channel();
            let _ = tx.send(STOP_SENTINEL.to_string());
            return Ok(rx);
        }
        if self.pending.is_some() {
            return Err(AgentpadError::Engine(
                "input() called while a previous input() is still waiting".to_string(),
            ));
        }

        let (tx, rx) = oneshot::channel();
        self.pending = Some(tx);
        self.prompt = prompt;
        self.state = BridgeState::AwaitingInput;
        Ok(rx)
    }

    /// Deliver one operator line to the pending request.
    ///
    /// Returns true if a request was resolved. With nothing pending this is
    /// a no-op; the bridge never treats a stray submission as an error.
    pub fn submit(&mut self, text: &str) -> bool {
        match self.pending.take() {
            Some(tx) => {
                self.prompt = None;
                self.state = BridgeState::Running;
                if tx.send(text.to_string()).is_err() {
                    debug!("input receiver dropped before submission arrived");
                }
                true
            }
            None => {
                debug!("input submitted with no pending request; ignored");
                false
            }
        }
    }

    /// Stop the current run cooperatively.
    ///
    /// A pending request resolves with the sentinel and the bridge returns
    /// to Idle at once. Without a pending request the script keeps running
    /// until its next `input()` call, which then resolves instantly.
    /// Returns true if a pending request was resolved.
    pub fn stop(&mut self) -> bool {
        self.stopping = true;
        match self.pending.take() {
            Some(tx) => {
                self.prompt = None;
                self.state = BridgeState::Idle;
                let _ = tx.send(STOP_SENTINEL.to_string());
                true
            }
            None => false,
        }
    }
}

impl Default for InputBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_resolves_the_pending_request() {
        let mut bridge = InputBridge::new();
        bridge.begin_run();

        let mut rx = bridge.request(Some("name?".to_string())).unwrap();
        assert_eq!(bridge.state(), BridgeState::AwaitingInput);
        assert_eq!(bridge.prompt(), Some("name?"));

        assert!(bridge.submit("Ann"));
        assert_eq!(rx.try_recv().unwrap(), "Ann");
        assert_eq!(bridge.state(), BridgeState::Running);
        assert_eq!(bridge.prompt(), None);
    }

    #[test]
    fn at_most_one_request_is_outstanding() {
        let mut bridge = InputBridge::new();
        bridge.begin_run();

        let _first = bridge.request(None).unwrap();
        let second = bridge.request(None);
        assert!(second.is_err());
        // the live request is untouched
        assert_eq!(bridge.state(), BridgeState::AwaitingInput);
        assert!(bridge.submit("still works"));
    }

    #[test]
    fn stray_submission_is_absorbed() {
        let mut bridge = InputBridge::new();
        bridge.begin_run();

        assert!(!bridge.submit("nobody asked"));
        assert_eq!(bridge.state(), BridgeState::Running);
    }

    #[test]
    fn stop_resolves_with_sentinel_and_goes_idle() {
        let mut bridge = InputBridge::new();
        bridge.begin_run();

        let mut rx = bridge.request(Some("more?".to_string())).unwrap();
        assert!(bridge.stop());
        assert_eq!(rx.try_recv().unwrap(), STOP_SENTINEL);
        assert_eq!(bridge.state(), BridgeState::Idle);
        assert_eq!(bridge.prompt(), None);
    }

    #[test]
    fn request_after_stop_resolves_immediately() {
        let mut bridge = InputBridge::new();
        bridge.begin_run();
        assert!(!bridge.stop());

        let mut rx = bridge.request(None).unwrap();
        assert_eq!(rx.try_recv().unwrap(), STOP_SENTINEL);
    }

    #[test]
    fn begin_run_drops_a_stale_resolver() {
        let mut bridge = InputBridge::new();
        bridge.begin_run();
        let mut rx = bridge.request(None).unwrap();

        bridge.begin_run();
        // old receiver observes cancellation, not a hang
        assert!(rx.try_recv().is_err());
        assert_eq!(bridge.state(), BridgeState::Running);
        // and the stopping flag from any prior stop is gone
        let _fresh = bridge.request(None).unwrap();
        assert_eq!(bridge.state(), BridgeState::AwaitingInput);
    }

    #[test]
    fn finish_run_returns_to_idle() {
        let mut bridge = InputBridge::new();
        bridge.begin_run();
        bridge.finish_run();
        assert_eq!(bridge.state(), BridgeState::Idle);
    }
}
