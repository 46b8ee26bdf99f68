//! One execution thread of one session, with its call-stack cache.

use crate::model::stack::StackFrame;
use crate::protocol::{ExceptionInfoResponse, SteppingGranularity, StoppedDetails};
use std::mem;

/// How many frames a call-stack fetch requests when the caller has no own
/// preference.
pub const DEFAULT_FETCH_LEVELS: i64 = 20;

#[derive(Debug)]
pub struct Thread {
    /// Adapter-assigned thread id.
    id: i64,
    name: String,
    stopped: bool,
    stopped_details: Option<StoppedDetails>,
    /// Present while stopped on an exception and the adapter answered an
    /// exception-info query.
    exception_info: Option<ExceptionInfoResponse>,
    last_stepping_granularity: Option<SteppingGranularity>,
    call_stack: Vec<StackFrame>,
    /// Snapshot of the call stack before the last resume. Used for UI
    /// continuity and diffing, never for execution decisions.
    stale_call_stack: Vec<StackFrame>,
    reached_end_of_call_stack: bool,
    /// Bumped on every stop/resume transition; replies issued against an
    /// older generation are stale and must be dropped.
    stop_generation: u64,
}

impl Thread {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            stopped: false,
            stopped_details: None,
            exception_info: None,
            last_stepping_granularity: None,
            call_stack: vec![],
            stale_call_stack: vec![],
            reached_end_of_call_stack: false,
            stop_generation: 0,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn stopped(&self) -> bool {
        self.stopped
    }

    pub fn stopped_details(&self) -> Option<&StoppedDetails> {
        self.stopped_details.as_ref()
    }

    /// Short human-readable stop label.
    pub fn state_label(&self) -> Option<&str> {
        let details = self.stopped_details.as_ref()?;
        details
            .description
            .as_deref()
            .or(Some(details.reason.as_str()))
    }

    pub fn exception_info(&self) -> Option<&ExceptionInfoResponse> {
        self.exception_info.as_ref()
    }

    pub(crate) fn set_exception_info(&mut self, info: Option<ExceptionInfoResponse>) {
        self.exception_info = info;
    }

    pub fn last_stepping_granularity(&self) -> Option<SteppingGranularity> {
        self.last_stepping_granularity
    }

    pub(crate) fn set_last_stepping_granularity(
        &mut self,
        granularity: Option<SteppingGranularity>,
    ) {
        self.last_stepping_granularity = granularity;
    }

    pub fn call_stack(&self) -> &[StackFrame] {
        &self.call_stack
    }

    pub fn stale_call_stack(&self) -> &[StackFrame] {
        &self.stale_call_stack
    }

    pub fn reached_end_of_call_stack(&self) -> bool {
        self.reached_end_of_call_stack
    }

    pub fn stop_generation(&self) -> u64 {
        self.stop_generation
    }

    /// First non-hidden frame of the cached call stack.
    pub fn top_stack_frame(&self) -> Option<&StackFrame> {
        self.call_stack.iter().find(|frame| !frame.hidden())
    }

    pub fn frame(&self, frame_id: i64) -> Option<&StackFrame> {
        self.call_stack.iter().find(|frame| frame.id() == frame_id)
    }

    pub(crate) fn frame_mut(&mut self, frame_id: i64) -> Option<&mut StackFrame> {
        self.call_stack
            .iter_mut()
            .find(|frame| frame.id() == frame_id)
    }

    /// Move the live call stack into the stale snapshot. Idempotent on an
    /// already-empty stack: the previous snapshot stays untouched.
    pub fn clear_call_stack(&mut self) {
        if !self.call_stack.is_empty() {
            self.stale_call_stack = mem::take(&mut self.call_stack);
        }
    }

    pub(crate) fn mark_stopped(&mut self, details: StoppedDetails) {
        self.clear_call_stack();
        self.stopped = true;
        self.stopped_details = Some(details);
        self.reached_end_of_call_stack = false;
        self.stop_generation += 1;
    }

    pub(crate) fn mark_running(&mut self) {
        self.clear_call_stack();
        self.stopped = false;
        self.stopped_details = None;
        self.exception_info = None;
        self.reached_end_of_call_stack = false;
        self.stop_generation += 1;
    }

    pub(crate) fn set_total_frames(&mut self, total: i64) {
        if let Some(details) = self.stopped_details.as_mut() {
            details.total_frames = Some(total);
        }
    }

    /// Splice one stack-trace reply into the cache.
    ///
    /// `start` is the cache size the request was issued against; anything
    /// cached at or beyond it is replaced, which guards against a stale
    /// in-flight fetch racing a second fetch over the same region.
    pub(crate) fn splice_frames(
        &mut self,
        start: usize,
        requested: usize,
        frames: Vec<StackFrame>,
    ) {
        self.reached_end_of_call_stack = frames.len() < requested;
        self.call_stack.truncate(start);
        self.call_stack.extend(frames);
        let total = self
            .stopped_details
            .as_ref()
            .and_then(|details| details.total_frames);
        if total == Some(self.call_stack.len() as i64) {
            self.reached_end_of_call_stack = true;
        }
    }
}
