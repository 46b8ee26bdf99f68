//! Adapter-originated events.
//!
//! Events arrive on a channel distinct from request/response pairs and are
//! consumed in order by a single dispatcher (see
//! [`DebugService::dispatch_event`](crate::service::DebugService::dispatch_event)),
//! which updates thread/session state before any dependent fetch starts.

use crate::protocol::{Breakpoint, Capabilities, StoppedDetails};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadEventReason {
    Started,
    Exited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointEventReason {
    Changed,
    New,
    Removed,
}

#[derive(Debug, Clone)]
pub enum AdapterEvent {
    /// The adapter is ready to accept configuration requests.
    Initialized,
    /// Execution stopped. `details.thread_id` names the stopping thread,
    /// `details.all_threads_stopped` widens the stop to every thread.
    Stopped(StoppedDetails),
    Continued {
        thread_id: i64,
        all_threads_continued: bool,
    },
    Thread {
        reason: ThreadEventReason,
        thread_id: i64,
    },
    /// The adapter re-validated or moved a breakpoint after the initial push.
    Breakpoint {
        reason: BreakpointEventReason,
        breakpoint: Breakpoint,
    },
    /// The debuggee produced output on stdout/stderr/console.
    Output {
        category: Option<String>,
        output: String,
    },
    /// Late capability update, replaces the negotiated set.
    Capabilities(Capabilities),
    Exited {
        exit_code: i64,
    },
    Terminated {
        restart: Option<Value>,
    },
}
