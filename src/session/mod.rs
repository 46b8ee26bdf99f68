//! One connected adapter instance and everything it owns.
//!
//! A [`Session`] drives the request surface of a single adapter connection
//! behind a small state machine: queries are only legal while the session is
//! active, and a transport failure terminates this session without touching
//! its siblings. Thread and call-stack state is updated exclusively by the
//! event dispatcher, never by stepping requests themselves.

pub mod config;

pub use config::{RequestKind, SessionConfiguration};

use crate::client::AdapterClient;
use crate::error::Error;
use crate::model::source::{Source, SourceUri};
use crate::model::stack::{scopes_from_response, Scope, StackFrame};
use crate::model::thread::Thread;
use crate::protocol::events::{AdapterEvent, ThreadEventReason};
use crate::protocol::{
    self, Capabilities, DataBreakpointInfoResponse, EvaluateResponse, ExceptionInfoResponse,
    GotoTargetsResponse, InitializeArguments, SetExpressionResponse, SetVariableResponse,
    SourceBreakpoint, StepInTargetsResponse, SteppingGranularity, StoppedDetails, VariablesFilter,
    VariablesResponse,
};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use std::str::FromStr;
use uuid::Uuid;

/// Globally unique session identity, also used to scope virtual source
/// addresses and breakpoint overlays.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Session lifecycle. `Stopped` means at least one thread is stopped, not
/// that the session ended - a finished session is `Inactive`, terminally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum State {
    Inactive,
    Initializing,
    Stopped,
    Running,
}

/// Raw thread/stop data pushed by the adapter, applied in one step.
#[derive(Debug, Clone, Default)]
pub struct RawModelUpdate {
    pub threads: Vec<protocol::Thread>,
    pub stopped_details: Option<StoppedDetails>,
}

/// Issue one adapter query behind the state-machine guard. A transport error
/// terminates this session and yields an absent result - the request is
/// treated as cancelled, never left hanging.
macro_rules! query {
    ($self:expr, $request:literal, $call:expr) => {{
        $self.ensure_active()?;
        match $call {
            Ok(value) => Ok(value),
            Err(err) => {
                $self.fail($request, err);
                Ok(None)
            }
        }
    }};
}

/// Same as [`query!`] for requests without a result body.
macro_rules! command {
    ($self:expr, $request:literal, $call:expr) => {{
        $self.ensure_active()?;
        match $call {
            Ok(()) => Ok(()),
            Err(err) => {
                $self.fail($request, err);
                Ok(())
            }
        }
    }};
}

pub struct Session {
    id: SessionId,
    configuration: SessionConfiguration,
    state: State,
    /// Latched once the state machine reaches its terminal Inactive.
    terminated: bool,
    capabilities: Capabilities,
    adapter: Box<dyn AdapterClient>,
    threads: IndexMap<i64, Thread>,
    /// Resolved sources keyed by address, one entry per distinct location.
    sources: HashMap<String, Rc<Source>>,
    /// Details of the most recent stop, session wide.
    stopped_details: Option<StoppedDetails>,
    exit_code: Option<i64>,
}

impl Session {
    pub fn new(configuration: SessionConfiguration, adapter: Box<dyn AdapterClient>) -> Self {
        Self {
            id: SessionId::new(),
            configuration,
            state: State::Inactive,
            terminated: false,
            capabilities: Capabilities::default(),
            adapter,
            threads: IndexMap::new(),
            sources: HashMap::new(),
            stopped_details: None,
            exit_code: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.configuration.name
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn configuration(&self) -> &SessionConfiguration {
        &self.configuration
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn exit_code(&self) -> Option<i64> {
        self.exit_code
    }

    fn ensure_active(&self) -> Result<(), Error> {
        match self.state {
            State::Inactive => Err(Error::SessionInactive),
            _ => Ok(()),
        }
    }

    /// Tier-3 failure: the transport died underneath a request. Kills this
    /// session only; the caller reports "no data".
    fn fail(&mut self, request: &'static str, err: anyhow::Error) {
        log::warn!(target: "session", "{request} failed, terminating session `{}`: {err:#}", self.label());
        self.close();
    }

    /// Terminal transition: release threads and caches, refuse new requests.
    fn close(&mut self) {
        if !self.terminated {
            log::info!(target: "session", "session `{}` is now inactive", self.label());
        }
        self.state = State::Inactive;
        self.terminated = true;
        self.threads.clear();
        self.stopped_details = None;
    }

    // --------------------------------- lifecycle -------------------------------------------------

    /// Negotiate capabilities. An initialize failure aborts the session for
    /// good - there is no retry on a half-opened adapter.
    pub fn initialize(&mut self) -> Result<&Capabilities, Error> {
        if self.terminated || self.state != State::Inactive {
            return Err(Error::IllegalTransition {
                from: self.state,
                request: "initialize",
            });
        }
        self.state = State::Initializing;
        let arguments = InitializeArguments::new(self.configuration.adapter_type.clone());
        match self.adapter.initialize(&arguments) {
            Ok(capabilities) => {
                self.capabilities = capabilities;
                Ok(&self.capabilities)
            }
            Err(err) => {
                self.close();
                Err(Error::Initialize(err))
            }
        }
    }

    pub fn launch(&mut self) -> Result<(), Error> {
        self.start("launch", |adapter, configuration| {
            adapter.launch(configuration)
        })
    }

    pub fn attach(&mut self) -> Result<(), Error> {
        self.start("attach", |adapter, configuration| {
            adapter.attach(configuration)
        })
    }

    fn start(
        &mut self,
        request: &'static str,
        run: impl FnOnce(&mut dyn AdapterClient, &SessionConfiguration) -> anyhow::Result<()>,
    ) -> Result<(), Error> {
        if self.state != State::Initializing {
            return Err(Error::IllegalTransition {
                from: self.state,
                request,
            });
        }
        match run(self.adapter.as_mut(), &self.configuration) {
            Ok(()) => {
                self.state = State::Running;
                Ok(())
            }
            Err(err) => {
                self.close();
                Err(Error::Run {
                    request,
                    error: err,
                })
            }
        }
    }

    pub fn restart(&mut self) -> Result<(), Error> {
        let restart_data = self.configuration.restart_data.clone();
        command!(self, "restart", self.adapter.restart(restart_data.as_ref()))
    }

    /// Ask the adapter to end the debuggee gracefully; terminal regardless
    /// of the outcome.
    pub fn terminate(&mut self, restart: bool) -> Result<(), Error> {
        if self.state != State::Inactive {
            if let Err(err) = self.adapter.terminate(restart) {
                log::warn!(target: "session", "terminate failed: {err:#}");
            }
        }
        self.close();
        Ok(())
    }

    pub fn disconnect(&mut self, terminate_debuggee: bool, restart: bool) -> Result<(), Error> {
        if self.state != State::Inactive {
            if let Err(err) = self.adapter.disconnect(terminate_debuggee, restart) {
                log::warn!(target: "session", "disconnect failed: {err:#}");
            }
        }
        self.close();
        Ok(())
    }

    // --------------------------------- breakpoint pushes -----------------------------------------

    pub fn send_source_breakpoints(
        &mut self,
        source: &protocol::Source,
        breakpoints: &[SourceBreakpoint],
    ) -> Result<Option<Vec<protocol::Breakpoint>>, Error> {
        query!(
            self,
            "setBreakpoints",
            self.adapter.set_breakpoints(source, breakpoints)
        )
    }

    pub fn send_function_breakpoints(
        &mut self,
        breakpoints: &[protocol::FunctionBreakpointSpec],
    ) -> Result<Option<Vec<protocol::Breakpoint>>, Error> {
        query!(
            self,
            "setFunctionBreakpoints",
            self.adapter.set_function_breakpoints(breakpoints)
        )
    }

    pub fn send_exception_breakpoints(
        &mut self,
        filters: &[String],
        filter_options: &[protocol::ExceptionFilterOptions],
    ) -> Result<Option<Vec<protocol::Breakpoint>>, Error> {
        query!(
            self,
            "setExceptionBreakpoints",
            self.adapter
                .set_exception_breakpoints(filters, filter_options)
        )
    }

    pub fn send_data_breakpoints(
        &mut self,
        breakpoints: &[protocol::DataBreakpointSpec],
    ) -> Result<Option<Vec<protocol::Breakpoint>>, Error> {
        query!(
            self,
            "setDataBreakpoints",
            self.adapter.set_data_breakpoints(breakpoints)
        )
    }

    pub fn send_instruction_breakpoints(
        &mut self,
        breakpoints: &[protocol::InstructionBreakpointSpec],
    ) -> Result<Option<Vec<protocol::Breakpoint>>, Error> {
        query!(
            self,
            "setInstructionBreakpoints",
            self.adapter.set_instruction_breakpoints(breakpoints)
        )
    }

    pub fn data_breakpoint_info(
        &mut self,
        name: &str,
        variables_reference: Option<i64>,
    ) -> Result<Option<DataBreakpointInfoResponse>, Error> {
        query!(
            self,
            "dataBreakpointInfo",
            self.adapter.data_breakpoint_info(name, variables_reference)
        )
    }

    // --------------------------------- threads ---------------------------------------------------

    pub fn threads(&self) -> impl Iterator<Item = &Thread> {
        self.threads.values()
    }

    pub fn thread(&self, thread_id: i64) -> Option<&Thread> {
        self.threads.get(&thread_id)
    }

    pub fn stopped_details(&self) -> Option<&StoppedDetails> {
        self.stopped_details.as_ref()
    }

    /// Re-enumerate threads on the adapter and merge the reply, optionally
    /// applying fresh stop details in the same step.
    pub fn fetch_threads(
        &mut self,
        stopped_details: Option<StoppedDetails>,
    ) -> Result<(), Error> {
        self.ensure_active()?;
        match self.adapter.threads() {
            Ok(threads) => {
                self.raw_update(RawModelUpdate {
                    threads,
                    stopped_details,
                });
                Ok(())
            }
            Err(err) => {
                self.fail("threads", err);
                Ok(())
            }
        }
    }

    /// Merge an adapter thread/stop push. Threads keep their call-stack
    /// caches across updates; threads absent from the list are left alone
    /// (removal is driven by thread-exited events).
    pub fn raw_update(&mut self, update: RawModelUpdate) {
        for raw in update.threads {
            match self.threads.get_mut(&raw.id) {
                Some(thread) => thread.set_name(raw.name),
                None => {
                    self.threads.insert(raw.id, Thread::new(raw.id, raw.name));
                }
            }
        }

        if let Some(details) = update.stopped_details {
            self.stopped_details = Some(details.clone());
            for thread in self.threads.values_mut() {
                if Some(thread.id()) == details.thread_id {
                    thread.mark_stopped(details.clone());
                } else if details.all_threads_stopped && !thread.stopped() {
                    thread.mark_stopped(details.clone());
                }
            }
            self.state = State::Stopped;
        }
    }

    /// Clear thread state after a resume or a debuggee shutdown.
    /// `reference` limits the operation to one thread.
    pub fn clear_threads(&mut self, remove: bool, reference: Option<i64>) {
        match reference {
            Some(thread_id) => {
                if remove {
                    self.threads.shift_remove(&thread_id);
                } else if let Some(thread) = self.threads.get_mut(&thread_id) {
                    thread.mark_running();
                }
            }
            None => {
                if remove {
                    self.threads.clear();
                } else {
                    for thread in self.threads.values_mut() {
                        thread.mark_running();
                    }
                }
            }
        }
        if !self.threads.values().any(|thread| thread.stopped()) && self.state == State::Stopped
        {
            self.state = State::Running;
            self.stopped_details = None;
        }
    }

    // --------------------------------- call stack & scopes ---------------------------------------

    /// Fetch the next `levels` frames of a stopped thread's call stack.
    ///
    /// No-op on a running thread. The reply is spliced in at the cache size
    /// the request was issued against and discarded wholesale if the thread
    /// resumed (or the cache moved) while the request was in flight.
    pub fn fetch_call_stack(&mut self, thread_id: i64, levels: i64) -> Result<(), Error> {
        self.ensure_active()?;
        let thread = self
            .threads
            .get(&thread_id)
            .ok_or(Error::ThreadNotFound(thread_id))?;
        if !thread.stopped() {
            return Ok(());
        }
        let start = thread.call_stack().len();
        let generation = thread.stop_generation();

        let response = match self.adapter.stack_trace(thread_id, start as i64, levels) {
            Ok(response) => response,
            Err(err) => {
                self.fail("stackTrace", err);
                return Ok(());
            }
        };
        let Some(response) = response else {
            return Ok(());
        };

        let total_frames = response.total_frames;
        let frames: Vec<StackFrame> = response
            .stack_frames
            .into_iter()
            .enumerate()
            .map(|(offset, raw)| {
                let source = self.source(raw.source.clone());
                StackFrame::new(raw, source, thread_id, start + offset)
            })
            .collect();

        let Some(thread) = self.threads.get_mut(&thread_id) else {
            return Ok(());
        };
        if thread.stop_generation() != generation || thread.call_stack().len() != start {
            log::debug!(target: "session", "discarding stale stack-trace reply for thread {thread_id}");
            return Ok(());
        }
        if let Some(total) = total_frames {
            thread.set_total_frames(total);
        }
        thread.splice_frames(start, levels as usize, frames);
        Ok(())
    }

    /// Scopes of one cached frame, fetched at most once per frame.
    pub fn scopes(&mut self, thread_id: i64, frame_id: i64) -> Result<Option<&[Scope]>, Error> {
        self.ensure_active()?;
        let thread = self
            .threads
            .get(&thread_id)
            .ok_or(Error::ThreadNotFound(thread_id))?;
        let frame = thread
            .frame(frame_id)
            .ok_or(Error::FrameNotFound(frame_id, thread_id))?;
        let generation = thread.stop_generation();

        if frame.scopes().is_none() {
            let response = match self.adapter.scopes(frame_id) {
                Ok(response) => response,
                Err(err) => {
                    self.fail("scopes", err);
                    return Ok(None);
                }
            };
            let Some(response) = response else {
                return Ok(None);
            };
            let scopes = scopes_from_response(response.scopes);

            let Some(thread) = self.threads.get_mut(&thread_id) else {
                return Ok(None);
            };
            if thread.stop_generation() != generation {
                log::debug!(target: "session", "discarding stale scopes reply for frame {frame_id}");
                return Ok(None);
            }
            let Some(frame) = thread.frame_mut(frame_id) else {
                return Ok(None);
            };
            frame.set_scopes(scopes);
        }

        Ok(self
            .threads
            .get(&thread_id)
            .and_then(|thread| thread.frame(frame_id))
            .and_then(|frame| frame.scopes()))
    }

    /// Drop one frame's scope cache so the next query hits the adapter
    /// again.
    pub fn forget_scopes(&mut self, thread_id: i64, frame_id: i64) {
        if let Some(frame) = self
            .threads
            .get_mut(&thread_id)
            .and_then(|thread| thread.frame_mut(frame_id))
        {
            frame.forget_scopes();
        }
    }

    // --------------------------------- data queries ----------------------------------------------

    pub fn variables(
        &mut self,
        variables_reference: i64,
        filter: Option<VariablesFilter>,
        start: Option<i64>,
        count: Option<i64>,
    ) -> Result<Option<VariablesResponse>, Error> {
        query!(
            self,
            "variables",
            self.adapter
                .variables(variables_reference, filter, start, count)
        )
    }

    pub fn evaluate(
        &mut self,
        expression: &str,
        frame_id: Option<i64>,
        context: Option<&str>,
    ) -> Result<Option<EvaluateResponse>, Error> {
        query!(
            self,
            "evaluate",
            self.adapter.evaluate(expression, frame_id, context)
        )
    }

    pub fn set_variable(
        &mut self,
        variables_reference: i64,
        name: &str,
        value: &str,
    ) -> Result<Option<SetVariableResponse>, Error> {
        query!(
            self,
            "setVariable",
            self.adapter.set_variable(variables_reference, name, value)
        )
    }

    pub fn set_expression(
        &mut self,
        frame_id: i64,
        expression: &str,
        value: &str,
    ) -> Result<Option<SetExpressionResponse>, Error> {
        query!(
            self,
            "setExpression",
            self.adapter.set_expression(frame_id, expression, value)
        )
    }

    /// Query and retain exception details for a stopped thread.
    pub fn fetch_exception_info(
        &mut self,
        thread_id: i64,
    ) -> Result<Option<&ExceptionInfoResponse>, Error> {
        let info: Option<ExceptionInfoResponse> = query!(
            self,
            "exceptionInfo",
            self.adapter.exception_info(thread_id)
        )?;
        if let Some(thread) = self.threads.get_mut(&thread_id) {
            thread.set_exception_info(info);
            return Ok(thread.exception_info());
        }
        Ok(None)
    }

    pub fn goto_targets(
        &mut self,
        source: &protocol::Source,
        line: i64,
        column: Option<i64>,
    ) -> Result<Option<GotoTargetsResponse>, Error> {
        query!(
            self,
            "gotoTargets",
            self.adapter.goto_targets(source, line, column)
        )
    }

    pub fn goto(&mut self, thread_id: i64, target_id: i64) -> Result<(), Error> {
        command!(self, "goto", self.adapter.goto(thread_id, target_id))
    }

    pub fn step_in_targets(
        &mut self,
        frame_id: i64,
    ) -> Result<Option<StepInTargetsResponse>, Error> {
        query!(self, "stepInTargets", self.adapter.step_in_targets(frame_id))
    }

    pub fn cancel(&mut self, progress_id: &str) -> Result<(), Error> {
        command!(self, "cancel", self.adapter.cancel(progress_id))
    }

    pub fn restart_frame(&mut self, frame_id: i64) -> Result<(), Error> {
        command!(self, "restartFrame", self.adapter.restart_frame(frame_id))
    }

    // --------------------------------- execution control -----------------------------------------
    // Stepping never mutates thread state directly; the resulting stop or
    // continue arrives as an event.

    pub fn next(
        &mut self,
        thread_id: i64,
        granularity: Option<SteppingGranularity>,
    ) -> Result<(), Error> {
        self.record_granularity(thread_id, granularity);
        command!(self, "next", self.adapter.next(thread_id, granularity))
    }

    pub fn step_in(
        &mut self,
        thread_id: i64,
        target_id: Option<i64>,
        granularity: Option<SteppingGranularity>,
    ) -> Result<(), Error> {
        self.record_granularity(thread_id, granularity);
        command!(
            self,
            "stepIn",
            self.adapter.step_in(thread_id, target_id, granularity)
        )
    }

    pub fn step_out(
        &mut self,
        thread_id: i64,
        granularity: Option<SteppingGranularity>,
    ) -> Result<(), Error> {
        self.record_granularity(thread_id, granularity);
        command!(
            self,
            "stepOut",
            self.adapter.step_out(thread_id, granularity)
        )
    }

    pub fn step_back(
        &mut self,
        thread_id: i64,
        granularity: Option<SteppingGranularity>,
    ) -> Result<(), Error> {
        self.record_granularity(thread_id, granularity);
        command!(
            self,
            "stepBack",
            self.adapter.step_back(thread_id, granularity)
        )
    }

    pub fn resume(&mut self, thread_id: i64) -> Result<(), Error> {
        command!(self, "continue", self.adapter.resume(thread_id))
    }

    pub fn reverse_continue(&mut self, thread_id: i64) -> Result<(), Error> {
        command!(
            self,
            "reverseContinue",
            self.adapter.reverse_continue(thread_id)
        )
    }

    pub fn pause(&mut self, thread_id: i64) -> Result<(), Error> {
        command!(self, "pause", self.adapter.pause(thread_id))
    }

    pub fn terminate_threads(&mut self, thread_ids: &[i64]) -> Result<(), Error> {
        command!(
            self,
            "terminateThreads",
            self.adapter.terminate_threads(thread_ids)
        )
    }

    fn record_granularity(&mut self, thread_id: i64, granularity: Option<SteppingGranularity>) {
        if let Some(thread) = self.threads.get_mut(&thread_id) {
            thread.set_last_stepping_granularity(granularity);
        }
    }

    // --------------------------------- sources ---------------------------------------------------

    /// Resolve a raw source descriptor, reusing the cached resolution for
    /// locations seen before.
    pub fn source(&mut self, raw: Option<protocol::Source>) -> Rc<Source> {
        let source = Source::new(raw, self.id);
        let key = source.uri().to_string();
        if let Some(existing) = self.sources.get(&key) {
            return existing.clone();
        }
        let source = Rc::new(source);
        self.sources.insert(key, source.clone());
        source
    }

    pub fn source_for_uri(&self, uri: &SourceUri) -> Option<Rc<Source>> {
        self.sources.get(&uri.to_string()).cloned()
    }

    // --------------------------------- events ----------------------------------------------------

    /// Apply one adapter event. Must be called by a single dispatcher, in
    /// arrival order, before any fetch that depends on the new state.
    pub fn handle_event(&mut self, event: AdapterEvent) -> Result<(), Error> {
        if self.state == State::Inactive {
            // late events of an already-closed transport
            return Ok(());
        }
        match event {
            AdapterEvent::Initialized => Ok(()),
            AdapterEvent::Stopped(details) => {
                let exception_thread = (details.reason == "exception")
                    .then_some(details.thread_id)
                    .flatten();
                self.fetch_threads(Some(details))?;
                if let Some(thread_id) = exception_thread {
                    if self.capabilities.supports_exception_info_request {
                        self.fetch_exception_info(thread_id)?;
                    }
                }
                Ok(())
            }
            AdapterEvent::Continued {
                thread_id,
                all_threads_continued,
            } => {
                let reference = if all_threads_continued {
                    None
                } else {
                    Some(thread_id)
                };
                self.clear_threads(false, reference);
                Ok(())
            }
            AdapterEvent::Thread { reason, thread_id } => match reason {
                ThreadEventReason::Started => self.fetch_threads(None),
                ThreadEventReason::Exited => {
                    self.clear_threads(true, Some(thread_id));
                    Ok(())
                }
            },
            AdapterEvent::Breakpoint { .. } => {
                // breakpoint overlays live in the model, the service routes
                // these before they reach a session
                log::debug!(target: "session", "ignoring unrouted breakpoint event");
                Ok(())
            }
            AdapterEvent::Output { category, output } => {
                log::debug!(
                    target: "session",
                    "debuggee output [{}]: {}",
                    category.as_deref().unwrap_or("console"),
                    output.trim_end()
                );
                Ok(())
            }
            AdapterEvent::Capabilities(capabilities) => {
                self.capabilities = capabilities;
                Ok(())
            }
            AdapterEvent::Exited { exit_code } => {
                self.exit_code = Some(exit_code);
                Ok(())
            }
            AdapterEvent::Terminated { restart } => {
                if restart.is_some() {
                    self.configuration.restart_data = restart;
                }
                self.close();
                Ok(())
            }
        }
    }
}
