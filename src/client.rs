//! Abstract adapter connection.
//!
//! One implementation of [`AdapterClient`] wraps one live adapter instance.
//! Requests block the caller until the correlated response arrives; events
//! travel separately (see [`crate::protocol::events`]).
//!
//! Result conventions, matching the three error tiers of the model:
//! `Ok(Some(_))` - the adapter answered; `Ok(None)` - the adapter has no
//! data for this request (unsupported request, stale frame, unmet context) -
//! a normal outcome; `Err(_)` - the transport failed, which is fatal to the
//! owning session and only to it.

use crate::protocol::{
    Breakpoint, Capabilities, DataBreakpointInfoResponse, DataBreakpointSpec, EvaluateResponse,
    ExceptionFilterOptions, ExceptionInfoResponse, FunctionBreakpointSpec, GotoTargetsResponse,
    InitializeArguments, InstructionBreakpointSpec, ScopesResponse, SetExpressionResponse,
    SetVariableResponse, Source, SourceBreakpoint, StackTraceResponse, StepInTargetsResponse,
    SteppingGranularity, Thread, VariablesFilter, VariablesResponse,
};
use crate::session::SessionConfiguration;
use serde_json::Value;

pub trait AdapterClient: Send {
    // --------------------------------- lifecycle -------------------------------------------------

    fn initialize(&mut self, arguments: &InitializeArguments) -> anyhow::Result<Capabilities>;
    fn launch(&mut self, configuration: &SessionConfiguration) -> anyhow::Result<()>;
    fn attach(&mut self, configuration: &SessionConfiguration) -> anyhow::Result<()>;
    fn restart(&mut self, arguments: Option<&Value>) -> anyhow::Result<()>;
    fn terminate(&mut self, restart: bool) -> anyhow::Result<()>;
    fn disconnect(&mut self, terminate_debuggee: bool, restart: bool) -> anyhow::Result<()>;

    // --------------------------------- breakpoints -----------------------------------------------
    // Each push carries the full current set for its kind (and source, for
    // line breakpoints); adapters replace their table on every call.

    fn set_breakpoints(
        &mut self,
        source: &Source,
        breakpoints: &[SourceBreakpoint],
    ) -> anyhow::Result<Option<Vec<Breakpoint>>>;
    fn set_function_breakpoints(
        &mut self,
        breakpoints: &[FunctionBreakpointSpec],
    ) -> anyhow::Result<Option<Vec<Breakpoint>>>;
    fn set_exception_breakpoints(
        &mut self,
        filters: &[String],
        filter_options: &[ExceptionFilterOptions],
    ) -> anyhow::Result<Option<Vec<Breakpoint>>>;
    fn set_data_breakpoints(
        &mut self,
        breakpoints: &[DataBreakpointSpec],
    ) -> anyhow::Result<Option<Vec<Breakpoint>>>;
    fn set_instruction_breakpoints(
        &mut self,
        breakpoints: &[InstructionBreakpointSpec],
    ) -> anyhow::Result<Option<Vec<Breakpoint>>>;
    fn data_breakpoint_info(
        &mut self,
        name: &str,
        variables_reference: Option<i64>,
    ) -> anyhow::Result<Option<DataBreakpointInfoResponse>>;

    // --------------------------------- inspection ------------------------------------------------

    fn threads(&mut self) -> anyhow::Result<Vec<Thread>>;
    fn stack_trace(
        &mut self,
        thread_id: i64,
        start_frame: i64,
        levels: i64,
    ) -> anyhow::Result<Option<StackTraceResponse>>;
    fn scopes(&mut self, frame_id: i64) -> anyhow::Result<Option<ScopesResponse>>;
    fn variables(
        &mut self,
        variables_reference: i64,
        filter: Option<VariablesFilter>,
        start: Option<i64>,
        count: Option<i64>,
    ) -> anyhow::Result<Option<VariablesResponse>>;
    fn evaluate(
        &mut self,
        expression: &str,
        frame_id: Option<i64>,
        context: Option<&str>,
    ) -> anyhow::Result<Option<EvaluateResponse>>;
    fn set_variable(
        &mut self,
        variables_reference: i64,
        name: &str,
        value: &str,
    ) -> anyhow::Result<Option<SetVariableResponse>>;
    fn set_expression(
        &mut self,
        frame_id: i64,
        expression: &str,
        value: &str,
    ) -> anyhow::Result<Option<SetExpressionResponse>>;
    fn exception_info(&mut self, thread_id: i64) -> anyhow::Result<Option<ExceptionInfoResponse>>;

    // --------------------------------- execution control -----------------------------------------

    fn next(
        &mut self,
        thread_id: i64,
        granularity: Option<SteppingGranularity>,
    ) -> anyhow::Result<()>;
    fn step_in(
        &mut self,
        thread_id: i64,
        target_id: Option<i64>,
        granularity: Option<SteppingGranularity>,
    ) -> anyhow::Result<()>;
    fn step_out(
        &mut self,
        thread_id: i64,
        granularity: Option<SteppingGranularity>,
    ) -> anyhow::Result<()>;
    fn step_back(
        &mut self,
        thread_id: i64,
        granularity: Option<SteppingGranularity>,
    ) -> anyhow::Result<()>;
    fn resume(&mut self, thread_id: i64) -> anyhow::Result<()>;
    fn reverse_continue(&mut self, thread_id: i64) -> anyhow::Result<()>;
    fn pause(&mut self, thread_id: i64) -> anyhow::Result<()>;
    fn terminate_threads(&mut self, thread_ids: &[i64]) -> anyhow::Result<()>;
    fn restart_frame(&mut self, frame_id: i64) -> anyhow::Result<()>;

    // --------------------------------- targets & misc --------------------------------------------

    fn goto_targets(
        &mut self,
        source: &Source,
        line: i64,
        column: Option<i64>,
    ) -> anyhow::Result<Option<GotoTargetsResponse>>;
    fn goto(&mut self, thread_id: i64, target_id: i64) -> anyhow::Result<()>;
    fn step_in_targets(&mut self, frame_id: i64)
        -> anyhow::Result<Option<StepInTargetsResponse>>;
    fn cancel(&mut self, progress_id: &str) -> anyhow::Result<()>;
}
