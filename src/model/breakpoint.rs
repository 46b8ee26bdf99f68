//! User-authored breakpoints and their per-session verification overlays.
//!
//! A breakpoint is authored once and lives in the [`DebugModel`] independent
//! of any session. Every attached session reports its own view (verified or
//! not, possibly relocated) as an overlay keyed by session id; authored
//! values answer queries only while no overlay claims otherwise.
//!
//! [`DebugModel`]: crate::model::DebugModel

use crate::protocol::{self, Capabilities, DataBreakpointAccessType};
use crate::session::SessionId;
use indexmap::IndexMap;
use serde_json::Value;
use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const SOURCE_MODIFIED_MESSAGE: &str =
    "Unverified breakpoint. File is modified, please restart debug session.";

/// Stable identity of an authored breakpoint, independent of any session.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct BreakpointId(Uuid);

impl BreakpointId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BreakpointId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for BreakpointId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One session's view of one breakpoint: the adapter verification result
/// combined with the capability flags of the session that produced it.
#[derive(Debug, Clone)]
pub struct BreakpointSessionData {
    pub session: SessionId,
    pub verified: bool,
    /// Adapter-assigned breakpoint id, used to correlate later breakpoint
    /// events with authored breakpoints.
    pub id: Option<i64>,
    pub message: Option<String>,
    pub source: Option<protocol::Source>,
    pub line: Option<i64>,
    pub column: Option<i64>,
    pub end_line: Option<i64>,
    pub end_column: Option<i64>,
    pub instruction_reference: Option<String>,
    pub offset: Option<i64>,
    pub supports_conditional_breakpoints: bool,
    pub supports_hit_conditional_breakpoints: bool,
    pub supports_log_points: bool,
    pub supports_function_breakpoints: bool,
    pub supports_data_breakpoints: bool,
    pub supports_instruction_breakpoints: bool,
}

impl BreakpointSessionData {
    pub fn new(session: SessionId, raw: protocol::Breakpoint, capabilities: &Capabilities) -> Self {
        Self {
            session,
            verified: raw.verified,
            id: raw.id,
            message: raw.message,
            source: raw.source,
            line: raw.line,
            column: raw.column,
            end_line: raw.end_line,
            end_column: raw.end_column,
            instruction_reference: raw.instruction_reference,
            offset: raw.offset,
            supports_conditional_breakpoints: capabilities.supports_conditional_breakpoints,
            supports_hit_conditional_breakpoints: capabilities
                .supports_hit_conditional_breakpoints,
            supports_log_points: capabilities.supports_log_points,
            supports_function_breakpoints: capabilities.supports_function_breakpoints,
            supports_data_breakpoints: capabilities.supports_data_breakpoints,
            supports_instruction_breakpoints: capabilities.supports_instruction_breakpoints,
        }
    }
}

/// Enablement and condition data shared by every breakpoint kind, plus the
/// per-session overlay map.
#[derive(Debug, Clone)]
pub struct BreakpointBase {
    id: BreakpointId,
    enabled: bool,
    condition: Option<String>,
    hit_condition: Option<String>,
    log_message: Option<String>,
    /// Overlays in insertion order, session id unique per entry.
    session_data: IndexMap<SessionId, BreakpointSessionData>,
    /// Session ids ordered by overlay-set time, most recent last. Falls back
    /// to the next most recent entry when the active overlay is removed.
    recency: Vec<SessionId>,
}

impl BreakpointBase {
    fn new(
        enabled: bool,
        condition: Option<String>,
        hit_condition: Option<String>,
        log_message: Option<String>,
    ) -> Self {
        Self {
            id: BreakpointId::new(),
            enabled,
            condition,
            hit_condition,
            log_message,
            session_data: IndexMap::new(),
            recency: vec![],
        }
    }

    pub fn id(&self) -> BreakpointId {
        self.id
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    pub fn set_condition(&mut self, condition: Option<String>) {
        self.condition = condition;
    }

    pub fn hit_condition(&self) -> Option<&str> {
        self.hit_condition.as_deref()
    }

    pub fn set_hit_condition(&mut self, hit_condition: Option<String>) {
        self.hit_condition = hit_condition;
    }

    pub fn log_message(&self) -> Option<&str> {
        self.log_message.as_deref()
    }

    pub fn set_log_message(&mut self, log_message: Option<String>) {
        self.log_message = log_message;
    }

    /// Insert or replace the overlay of `session`; `None` removes exactly
    /// that session's entry, leaving every other overlay untouched.
    pub fn set_session_data(&mut self, session: SessionId, data: Option<BreakpointSessionData>) {
        match data {
            None => {
                self.session_data.shift_remove(&session);
                self.recency.retain(|s| *s != session);
            }
            Some(mut data) => {
                data.session = session;
                self.session_data.insert(session, data);
                self.recency.retain(|s| *s != session);
                self.recency.push(session);
            }
        }
    }

    /// The most recently set overlay, if any.
    pub fn data(&self) -> Option<&BreakpointSessionData> {
        self.recency.last().and_then(|s| self.session_data.get(s))
    }

    pub fn session_data(&self, session: SessionId) -> Option<&BreakpointSessionData> {
        self.session_data.get(&session)
    }

    /// A breakpoint nobody has confirmed yet is optimistically verified.
    pub fn verified(&self) -> bool {
        self.data().map(|data| data.verified).unwrap_or(true)
    }

    pub fn message(&self) -> Option<&str> {
        self.data().and_then(|data| data.message.as_deref())
    }

    /// Session ids whose overlay reports verified, in overlay insertion
    /// order.
    pub fn sessions_that_verified(&self) -> Vec<SessionId> {
        self.session_data
            .iter()
            .filter(|(_, data)| data.verified)
            .map(|(session, _)| *session)
            .collect()
    }

    pub fn id_from_adapter(&self, session: SessionId) -> Option<i64> {
        self.session_data(session).and_then(|data| data.id)
    }

    /// Project one session's overlay back into the wire shape.
    pub fn debug_protocol_breakpoint(&self, session: SessionId) -> Option<protocol::Breakpoint> {
        self.session_data(session).map(|data| protocol::Breakpoint {
            id: data.id,
            verified: data.verified,
            message: data.message.clone(),
            source: data.source.clone(),
            line: data.line,
            column: data.column,
            end_line: data.end_line,
            end_column: data.end_column,
            instruction_reference: data.instruction_reference.clone(),
            offset: data.offset,
        })
    }

    /// Whether the condition-like features this breakpoint uses are all
    /// advertised by the session the overlay came from.
    fn condition_features_supported(&self, data: &BreakpointSessionData) -> bool {
        if self.log_message.is_some() && !data.supports_log_points {
            return false;
        }
        if self.condition.is_some() && !data.supports_conditional_breakpoints {
            return false;
        }
        if self.hit_condition.is_some() && !data.supports_hit_conditional_breakpoints {
            return false;
        }
        true
    }
}

/// Generates the accessors every breakpoint kind forwards to its base.
macro_rules! breakpoint_base_api {
    () => {
        pub fn id(&self) -> BreakpointId {
            self.base.id()
        }

        pub fn enabled(&self) -> bool {
            self.base.enabled()
        }

        pub fn set_enabled(&mut self, enabled: bool) {
            self.base.set_enabled(enabled)
        }

        pub fn condition(&self) -> Option<&str> {
            self.base.condition()
        }

        pub fn hit_condition(&self) -> Option<&str> {
            self.base.hit_condition()
        }

        pub fn log_message(&self) -> Option<&str> {
            self.base.log_message()
        }

        pub fn session_data(&self, session: SessionId) -> Option<&BreakpointSessionData> {
            self.base.session_data(session)
        }

        pub fn sessions_that_verified(&self) -> Vec<SessionId> {
            self.base.sessions_that_verified()
        }

        pub fn id_from_adapter(&self, session: SessionId) -> Option<i64> {
            self.base.id_from_adapter(session)
        }

        pub fn debug_protocol_breakpoint(&self, session: SessionId) -> Option<protocol::Breakpoint> {
            self.base.debug_protocol_breakpoint(session)
        }
    };
}

/// Authoring input for a new line breakpoint.
#[derive(Debug, Clone)]
pub struct BreakpointSpec {
    pub line: i64,
    pub column: Option<i64>,
    pub enabled: bool,
    pub condition: Option<String>,
    pub hit_condition: Option<String>,
    pub log_message: Option<String>,
}

impl BreakpointSpec {
    pub fn at_line(line: i64) -> Self {
        Self {
            line,
            column: None,
            enabled: true,
            condition: None,
            hit_condition: None,
            log_message: None,
        }
    }
}

/// In-place update of authored breakpoint fields. An outer `None` leaves a
/// field untouched; for the clearable fields `Some(None)` clears and
/// `Some(Some(v))` replaces - a supplied empty value therefore always means
/// "clear", never "not supplied".
#[derive(Debug, Clone, Default)]
pub struct BreakpointUpdate {
    pub line: Option<i64>,
    pub column: Option<Option<i64>>,
    pub condition: Option<Option<String>>,
    pub hit_condition: Option<Option<String>>,
    pub log_message: Option<Option<String>>,
}

/// A line breakpoint: authored location plus whatever the adapters made of
/// it.
#[derive(Debug, Clone)]
pub struct Breakpoint {
    base: BreakpointBase,
    path: PathBuf,
    line: i64,
    column: Option<i64>,
    /// Opaque payload round-tripped to the adapter, never interpreted.
    adapter_data: Option<Value>,
}

impl Breakpoint {
    pub fn new(path: impl Into<PathBuf>, spec: BreakpointSpec) -> Self {
        Self {
            base: BreakpointBase::new(
                spec.enabled,
                spec.condition,
                spec.hit_condition,
                spec.log_message,
            ),
            path: path.into(),
            line: spec.line,
            column: spec.column,
            adapter_data: None,
        }
    }

    breakpoint_base_api!();

    pub fn authored_path(&self) -> &Path {
        &self.path
    }

    pub fn authored_line(&self) -> i64 {
        self.line
    }

    pub fn authored_column(&self) -> Option<i64> {
        self.column
    }

    // Editor dirty tracking is a host hook, not wired up yet; a modified
    // source demotes every breakpoint in it to unverified.
    fn source_modified(&self) -> bool {
        false
    }

    pub fn verified(&self) -> bool {
        match self.base.data() {
            Some(data) => data.verified && !self.source_modified(),
            None => true,
        }
    }

    pub fn message(&self) -> Option<Cow<'_, str>> {
        if self.source_modified() {
            return Some(Cow::Borrowed(SOURCE_MODIFIED_MESSAGE));
        }
        self.base
            .data()
            .and_then(|data| data.message.as_deref())
            .map(Cow::Borrowed)
    }

    /// Line the breakpoint effectively sits on: the adapter-resolved line
    /// while a verified overlay reports one, the authored line otherwise.
    pub fn line(&self) -> i64 {
        match self.base.data() {
            Some(data) if self.verified() => data.line.unwrap_or(self.line),
            _ => self.line,
        }
    }

    pub fn column(&self) -> Option<i64> {
        match self.base.data() {
            Some(data) if self.verified() && data.column.is_some() => data.column,
            _ => self.column,
        }
    }

    /// End line is adapter knowledge only - absent unless a verified overlay
    /// reports one.
    pub fn end_line(&self) -> Option<i64> {
        match self.base.data() {
            Some(data) if self.verified() => data.end_line,
            _ => None,
        }
    }

    pub fn end_column(&self) -> Option<i64> {
        match self.base.data() {
            Some(data) if self.verified() => data.end_column,
            _ => None,
        }
    }

    /// Path the breakpoint effectively binds to.
    pub fn path(&self) -> &Path {
        if self.verified() {
            if let Some(path) = self
                .base
                .data()
                .and_then(|data| data.source.as_ref())
                .and_then(|source| source.path.as_deref())
            {
                return Path::new(path);
            }
        }
        &self.path
    }

    pub fn adapter_data(&self) -> Option<&Value> {
        self.base
            .data()
            .and_then(|data| data.source.as_ref())
            .and_then(|source| source.adapter_data.as_ref())
            .or(self.adapter_data.as_ref())
    }

    /// Whether `session` can host this breakpoint, judged by the capability
    /// flags recorded in its overlay. No overlay means nothing speaks
    /// against trying.
    pub fn supported_by(&self, session: SessionId) -> bool {
        match self.base.session_data(session) {
            Some(data) => self.base.condition_features_supported(data),
            None => true,
        }
    }

    pub fn set_session_data(&mut self, session: SessionId, data: Option<BreakpointSessionData>) {
        self.base.set_session_data(session, data);
        if self.adapter_data.is_none() {
            self.adapter_data = self
                .base
                .data()
                .and_then(|data| data.source.as_ref())
                .and_then(|source| source.adapter_data.clone());
        }
    }

    /// Apply a partial update of the authored fields.
    pub fn update(&mut self, update: &BreakpointUpdate) {
        if let Some(line) = update.line {
            self.line = line;
        }
        if let Some(column) = update.column {
            self.column = column;
        }
        if let Some(condition) = &update.condition {
            self.base.set_condition(condition.clone());
        }
        if let Some(hit_condition) = &update.hit_condition {
            self.base.set_hit_condition(hit_condition.clone());
        }
        if let Some(log_message) = &update.log_message {
            self.base.set_log_message(log_message.clone());
        }
    }

    pub fn to_wire(&self) -> protocol::SourceBreakpoint {
        protocol::SourceBreakpoint {
            line: self.line,
            column: self.column,
            condition: self.base.condition.clone(),
            hit_condition: self.base.hit_condition.clone(),
            log_message: self.base.log_message.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionBreakpoint {
    base: BreakpointBase,
    name: String,
}

impl FunctionBreakpoint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: BreakpointBase::new(true, None, None, None),
            name: name.into(),
        }
    }

    breakpoint_base_api!();

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn set_condition(&mut self, condition: Option<String>) {
        self.base.set_condition(condition);
    }

    pub fn set_hit_condition(&mut self, hit_condition: Option<String>) {
        self.base.set_hit_condition(hit_condition);
    }

    pub fn verified(&self) -> bool {
        self.base.verified()
    }

    pub fn message(&self) -> Option<&str> {
        self.base.message()
    }

    pub fn supported_by(&self, session: SessionId) -> bool {
        match self.base.session_data(session) {
            Some(data) => {
                data.supports_function_breakpoints
                    && self.base.condition_features_supported(data)
            }
            None => true,
        }
    }

    pub fn set_session_data(&mut self, session: SessionId, data: Option<BreakpointSessionData>) {
        self.base.set_session_data(session, data);
    }

    pub fn to_wire(&self) -> protocol::FunctionBreakpointSpec {
        protocol::FunctionBreakpointSpec {
            name: self.name.clone(),
            condition: self.base.condition.clone(),
            hit_condition: self.base.hit_condition.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExceptionBreakpoint {
    base: BreakpointBase,
    filter: String,
    label: String,
    description: Option<String>,
    supports_condition: bool,
}

impl ExceptionBreakpoint {
    /// Exception breakpoints mirror the filters a session advertises; they
    /// start disabled until the user opts in.
    pub fn new(filter: &protocol::ExceptionBreakpointsFilter) -> Self {
        Self {
            base: BreakpointBase::new(false, None, None, None),
            filter: filter.filter.clone(),
            label: filter.label.clone(),
            description: filter.description.clone(),
            supports_condition: filter.supports_condition,
        }
    }

    breakpoint_base_api!();

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_condition(&mut self, condition: Option<String>) {
        self.base.set_condition(condition);
    }

    pub fn verified(&self) -> bool {
        self.base.verified()
    }

    pub fn message(&self) -> Option<&str> {
        self.base.message()
    }

    /// A conditional filter is only usable when the adapter declared the
    /// filter condition-capable.
    pub fn supported_by(&self, _session: SessionId) -> bool {
        self.base.condition.is_none() || self.supports_condition
    }

    pub fn set_session_data(&mut self, session: SessionId, data: Option<BreakpointSessionData>) {
        self.base.set_session_data(session, data);
    }

    pub fn to_wire(&self) -> protocol::ExceptionFilterOptions {
        protocol::ExceptionFilterOptions {
            filter_id: self.filter.clone(),
            condition: self.base.condition.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataBreakpoint {
    base: BreakpointBase,
    description: String,
    data_id: String,
    can_persist: bool,
    access_type: Option<DataBreakpointAccessType>,
}

impl DataBreakpoint {
    pub fn new(
        description: impl Into<String>,
        data_id: impl Into<String>,
        can_persist: bool,
        access_type: Option<DataBreakpointAccessType>,
    ) -> Self {
        Self {
            base: BreakpointBase::new(true, None, None, None),
            description: description.into(),
            data_id: data_id.into(),
            can_persist,
            access_type,
        }
    }

    breakpoint_base_api!();

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn data_id(&self) -> &str {
        &self.data_id
    }

    pub fn can_persist(&self) -> bool {
        self.can_persist
    }

    pub fn access_type(&self) -> Option<DataBreakpointAccessType> {
        self.access_type
    }

    pub fn verified(&self) -> bool {
        self.base.verified()
    }

    pub fn message(&self) -> Option<&str> {
        self.base.message()
    }

    pub fn supported_by(&self, session: SessionId) -> bool {
        match self.base.session_data(session) {
            Some(data) => {
                data.supports_data_breakpoints && self.base.condition_features_supported(data)
            }
            None => true,
        }
    }

    pub fn set_session_data(&mut self, session: SessionId, data: Option<BreakpointSessionData>) {
        self.base.set_session_data(session, data);
    }

    pub fn to_wire(&self) -> protocol::DataBreakpointSpec {
        protocol::DataBreakpointSpec {
            data_id: self.data_id.clone(),
            access_type: self.access_type,
            condition: self.base.condition.clone(),
            hit_condition: self.base.hit_condition.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InstructionBreakpoint {
    base: BreakpointBase,
    instruction_reference: String,
    offset: Option<i64>,
}

impl InstructionBreakpoint {
    pub fn new(
        instruction_reference: impl Into<String>,
        offset: Option<i64>,
        condition: Option<String>,
        hit_condition: Option<String>,
    ) -> Self {
        Self {
            base: BreakpointBase::new(true, condition, hit_condition, None),
            instruction_reference: instruction_reference.into(),
            offset,
        }
    }

    breakpoint_base_api!();

    pub fn instruction_reference(&self) -> &str {
        &self.instruction_reference
    }

    pub fn offset(&self) -> Option<i64> {
        self.offset
    }

    pub fn verified(&self) -> bool {
        self.base.verified()
    }

    pub fn message(&self) -> Option<&str> {
        self.base.message()
    }

    pub fn supported_by(&self, session: SessionId) -> bool {
        match self.base.session_data(session) {
            Some(data) => {
                data.supports_instruction_breakpoints
                    && self.base.condition_features_supported(data)
            }
            None => true,
        }
    }

    pub fn set_session_data(&mut self, session: SessionId, data: Option<BreakpointSessionData>) {
        self.base.set_session_data(session, data);
    }

    pub fn to_wire(&self) -> protocol::InstructionBreakpointSpec {
        protocol::InstructionBreakpointSpec {
            instruction_reference: self.instruction_reference.clone(),
            offset: self.offset,
            condition: self.base.condition.clone(),
            hit_condition: self.base.hit_condition.clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn overlay(
        session: SessionId,
        verified: bool,
        line: Option<i64>,
        capabilities: &Capabilities,
    ) -> BreakpointSessionData {
        BreakpointSessionData::new(
            session,
            protocol::Breakpoint {
                verified,
                line,
                ..Default::default()
            },
            capabilities,
        )
    }

    fn permissive() -> Capabilities {
        Capabilities {
            supports_conditional_breakpoints: true,
            supports_hit_conditional_breakpoints: true,
            supports_log_points: true,
            supports_function_breakpoints: true,
            supports_data_breakpoints: true,
            supports_instruction_breakpoints: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_overlay_set_then_clear_restores_authored_view() {
        let s1 = SessionId::new();
        let s2 = SessionId::new();
        let mut bp = Breakpoint::new("main.x", BreakpointSpec::at_line(10));
        assert!(bp.verified());
        assert_eq!(bp.line(), 10);

        let caps = permissive();
        bp.set_session_data(s1, Some(overlay(s1, false, None, &caps)));
        bp.set_session_data(s2, Some(overlay(s2, true, Some(20), &caps)));
        assert!(bp.verified());
        assert_eq!(bp.line(), 20);

        bp.set_session_data(s2, None);
        assert_eq!(bp.session_data(s2).map(|d| d.verified), None);
        // s1 overlay untouched and active again
        assert!(!bp.verified());
        assert!(bp.session_data(s1).is_some());

        bp.set_session_data(s1, None);
        assert!(bp.verified());
        assert!(bp.message().is_none());
        assert_eq!(bp.line(), 10);
    }

    #[test]
    fn test_effective_line_matrix() {
        let session = SessionId::new();
        let caps = permissive();

        // no overlay -> authored
        let mut bp = Breakpoint::new("main.x", BreakpointSpec::at_line(10));
        assert_eq!(bp.line(), 10);

        // unverified overlay -> authored, even when it carries a line
        bp.set_session_data(session, Some(overlay(session, false, Some(12), &caps)));
        assert!(!bp.verified());
        assert_eq!(bp.line(), 10);

        // verified overlay without line -> authored
        bp.set_session_data(session, Some(overlay(session, true, None, &caps)));
        assert!(bp.verified());
        assert_eq!(bp.line(), 10);

        // verified overlay with line -> overlay wins
        bp.set_session_data(session, Some(overlay(session, true, Some(12), &caps)));
        assert_eq!(bp.line(), 12);
    }

    #[test]
    fn test_attach_verify_detach_scenario() {
        let s1 = SessionId::new();
        let caps = permissive();
        let mut bp = Breakpoint::new("main.x", BreakpointSpec::at_line(10));
        assert!(bp.verified());
        assert_eq!(bp.line(), 10);

        bp.set_session_data(s1, Some(overlay(s1, false, None, &caps)));
        assert!(!bp.verified());

        bp.set_session_data(s1, Some(overlay(s1, true, Some(12), &caps)));
        assert!(bp.verified());
        assert_eq!(bp.line(), 12);

        bp.set_session_data(s1, None);
        assert!(bp.verified());
        assert_eq!(bp.line(), 10);
    }

    #[test]
    fn test_most_recently_set_overlay_wins() {
        let s1 = SessionId::new();
        let s2 = SessionId::new();
        let caps = permissive();
        let mut bp = Breakpoint::new("main.x", BreakpointSpec::at_line(10));

        bp.set_session_data(s1, Some(overlay(s1, true, Some(11), &caps)));
        bp.set_session_data(s2, Some(overlay(s2, false, None, &caps)));
        assert!(!bp.verified());

        // re-setting s1 makes it the most recent again
        bp.set_session_data(s1, Some(overlay(s1, true, Some(13), &caps)));
        assert!(bp.verified());
        assert_eq!(bp.line(), 13);
    }

    #[test]
    fn test_sessions_that_verified_keeps_insertion_order() {
        let s1 = SessionId::new();
        let s2 = SessionId::new();
        let s3 = SessionId::new();
        let caps = permissive();
        let mut bp = Breakpoint::new("main.x", BreakpointSpec::at_line(1));

        bp.set_session_data(s1, Some(overlay(s1, true, None, &caps)));
        bp.set_session_data(s2, Some(overlay(s2, false, None, &caps)));
        bp.set_session_data(s3, Some(overlay(s3, true, None, &caps)));
        assert_eq!(bp.sessions_that_verified(), vec![s1, s3]);

        // replacing s1 keeps its original slot
        bp.set_session_data(s1, Some(overlay(s1, true, Some(2), &caps)));
        assert_eq!(bp.sessions_that_verified(), vec![s1, s3]);
    }

    #[test]
    fn test_update_applies_present_fields_only() {
        let mut bp = Breakpoint::new(
            "main.x",
            BreakpointSpec {
                condition: Some("x > 0".to_string()),
                ..BreakpointSpec::at_line(10)
            },
        );

        bp.update(&BreakpointUpdate {
            line: Some(11),
            ..Default::default()
        });
        assert_eq!(bp.line(), 11);
        assert_eq!(bp.condition(), Some("x > 0"));

        // Some(None) clears, None preserves
        bp.update(&BreakpointUpdate {
            condition: Some(None),
            hit_condition: Some(Some("3".to_string())),
            ..Default::default()
        });
        assert_eq!(bp.condition(), None);
        assert_eq!(bp.hit_condition(), Some("3"));
        assert_eq!(bp.line(), 11);
    }

    #[test]
    fn test_supported_by_checks_overlay_capabilities() {
        let session = SessionId::new();
        let mut bp = Breakpoint::new(
            "main.x",
            BreakpointSpec {
                condition: Some("x > 0".to_string()),
                ..BreakpointSpec::at_line(10)
            },
        );
        // nothing known about the session yet
        assert!(bp.supported_by(session));

        let no_conditions = Capabilities::default();
        bp.set_session_data(
            session,
            Some(overlay(session, true, None, &no_conditions)),
        );
        assert!(!bp.supported_by(session));

        bp.set_session_data(session, Some(overlay(session, true, None, &permissive())));
        assert!(bp.supported_by(session));
    }

    #[test]
    fn test_function_breakpoint_requires_capability() {
        let session = SessionId::new();
        let mut bp = FunctionBreakpoint::new("main");
        assert!(bp.supported_by(session));

        bp.set_session_data(
            session,
            Some(overlay(session, false, None, &Capabilities::default())),
        );
        assert!(!bp.supported_by(session));
    }

    #[test]
    fn test_end_location_absent_unless_verified() {
        let session = SessionId::new();
        let caps = permissive();
        let mut bp = Breakpoint::new("main.x", BreakpointSpec::at_line(10));
        assert_eq!(bp.end_line(), None);

        let mut data = overlay(session, false, Some(12), &caps);
        data.end_line = Some(14);
        bp.set_session_data(session, Some(data));
        assert_eq!(bp.end_line(), None);

        let mut data = overlay(session, true, Some(12), &caps);
        data.end_line = Some(14);
        bp.set_session_data(session, Some(data));
        assert_eq!(bp.end_line(), Some(14));
    }
}
