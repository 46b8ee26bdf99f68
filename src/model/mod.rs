//! Aggregation root: every session and the session-independent breakpoint
//! collections. Pure data plus accessor queries - no protocol I/O happens
//! here.

pub mod breakpoint;
pub mod source;
pub mod stack;
pub mod thread;

use crate::model::breakpoint::{
    Breakpoint, BreakpointId, BreakpointSessionData, BreakpointSpec, BreakpointUpdate,
    DataBreakpoint, ExceptionBreakpoint, FunctionBreakpoint, InstructionBreakpoint,
};
use crate::protocol::{self, Capabilities, DataBreakpointAccessType};
use crate::session::{Session, SessionId, State};
use std::collections::HashMap;
use std::path::Path;

/// Registry of all sessions and the global breakpoint collections.
/// Breakpoints outlive any individual session.
pub struct DebugModel {
    sessions: Vec<Session>,
    breakpoints: Vec<Breakpoint>,
    function_breakpoints: Vec<FunctionBreakpoint>,
    exception_breakpoints: Vec<ExceptionBreakpoint>,
    data_breakpoints: Vec<DataBreakpoint>,
    instruction_breakpoints: Vec<InstructionBreakpoint>,
    /// Master switch: while false, the service sends empty breakpoint sets.
    breakpoints_activated: bool,
}

impl Default for DebugModel {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugModel {
    pub fn new() -> Self {
        Self {
            sessions: vec![],
            breakpoints: vec![],
            function_breakpoints: vec![],
            exception_breakpoints: vec![],
            data_breakpoints: vec![],
            instruction_breakpoints: vec![],
            breakpoints_activated: true,
        }
    }

    // --------------------------------- sessions --------------------------------------------------

    pub fn add_session(&mut self, session: Session) -> SessionId {
        let id = session.id();
        self.sessions.push(session);
        id
    }

    pub fn sessions(&self, include_inactive: bool) -> impl Iterator<Item = &Session> {
        self.sessions
            .iter()
            .filter(move |session| include_inactive || session.state() != State::Inactive)
    }

    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.iter().find(|session| session.id() == id)
    }

    pub fn session_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|session| session.id() == id)
    }

    /// Drop a session and every overlay that referenced it.
    pub fn remove_session(&mut self, id: SessionId) -> Option<Session> {
        self.clear_breakpoint_session_data(id);
        let position = self
            .sessions
            .iter()
            .position(|session| session.id() == id)?;
        Some(self.sessions.remove(position))
    }

    // --------------------------------- breakpoint queries ----------------------------------------

    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    /// Line breakpoints filtered by effective location.
    pub fn breakpoints_matching(
        &self,
        path: Option<&Path>,
        line: Option<i64>,
        column: Option<i64>,
        enabled_only: bool,
    ) -> Vec<&Breakpoint> {
        self.breakpoints
            .iter()
            .filter(|bp| {
                if let Some(path) = path {
                    if bp.path() != path {
                        return false;
                    }
                }
                if let Some(line) = line {
                    if bp.line() != line {
                        return false;
                    }
                }
                if let Some(column) = column {
                    if bp.column() != Some(column) {
                        return false;
                    }
                }
                !enabled_only || bp.enabled()
            })
            .collect()
    }

    pub fn function_breakpoints(&self) -> &[FunctionBreakpoint] {
        &self.function_breakpoints
    }

    pub fn exception_breakpoints(&self) -> &[ExceptionBreakpoint] {
        &self.exception_breakpoints
    }

    pub fn data_breakpoints(&self) -> &[DataBreakpoint] {
        &self.data_breakpoints
    }

    pub fn instruction_breakpoints(&self) -> &[InstructionBreakpoint] {
        &self.instruction_breakpoints
    }

    pub fn breakpoints_activated(&self) -> bool {
        self.breakpoints_activated
    }

    pub fn set_breakpoints_activated(&mut self, activated: bool) {
        self.breakpoints_activated = activated;
    }

    // --------------------------------- breakpoint authoring --------------------------------------

    /// Author new line breakpoints; returns the created entries.
    pub fn add_breakpoints(&mut self, path: &Path, specs: Vec<BreakpointSpec>) -> &[Breakpoint] {
        let first_new = self.breakpoints.len();
        self.breakpoints
            .extend(specs.into_iter().map(|spec| Breakpoint::new(path, spec)));
        &self.breakpoints[first_new..]
    }

    pub fn remove_breakpoints(&mut self, ids: &[BreakpointId]) {
        self.breakpoints.retain(|bp| !ids.contains(&bp.id()));
    }

    pub fn update_breakpoints(&mut self, updates: &HashMap<BreakpointId, BreakpointUpdate>) {
        for bp in self.breakpoints.iter_mut() {
            if let Some(update) = updates.get(&bp.id()) {
                bp.update(update);
            }
        }
    }

    pub fn enable_or_disable_all_breakpoints(&mut self, enable: bool) {
        for bp in self.breakpoints.iter_mut() {
            bp.set_enabled(enable);
        }
        for bp in self.function_breakpoints.iter_mut() {
            bp.set_enabled(enable);
        }
        for bp in self.exception_breakpoints.iter_mut() {
            bp.set_enabled(enable);
        }
        for bp in self.data_breakpoints.iter_mut() {
            bp.set_enabled(enable);
        }
        for bp in self.instruction_breakpoints.iter_mut() {
            bp.set_enabled(enable);
        }
    }

    pub fn add_function_breakpoint(&mut self, name: impl Into<String>) -> &FunctionBreakpoint {
        self.function_breakpoints.push(FunctionBreakpoint::new(name));
        self.function_breakpoints
            .last()
            .expect("pushed just above")
    }

    pub fn update_function_breakpoint(
        &mut self,
        id: BreakpointId,
        name: Option<String>,
        condition: Option<Option<String>>,
        hit_condition: Option<Option<String>>,
    ) {
        if let Some(bp) = self
            .function_breakpoints
            .iter_mut()
            .find(|bp| bp.id() == id)
        {
            if let Some(name) = name {
                bp.set_name(name);
            }
            if let Some(condition) = condition {
                bp.set_condition(condition);
            }
            if let Some(hit_condition) = hit_condition {
                bp.set_hit_condition(hit_condition);
            }
        }
    }

    pub fn remove_function_breakpoints(&mut self, id: BreakpointId) {
        self.function_breakpoints.retain(|bp| bp.id() != id);
    }

    /// Mirror the exception filters a session advertises, carrying over the
    /// enablement and conditions of filters the user already touched.
    pub fn set_exception_breakpoint_filters(
        &mut self,
        filters: &[protocol::ExceptionBreakpointsFilter],
    ) {
        let previous = std::mem::take(&mut self.exception_breakpoints);
        self.exception_breakpoints = filters
            .iter()
            .map(|filter| {
                let mut bp = ExceptionBreakpoint::new(filter);
                if let Some(old) = previous.iter().find(|old| old.filter() == filter.filter) {
                    bp.set_enabled(old.enabled());
                    bp.set_condition(old.condition().map(str::to_string));
                }
                bp
            })
            .collect();
    }

    pub fn add_data_breakpoint(
        &mut self,
        description: impl Into<String>,
        data_id: impl Into<String>,
        can_persist: bool,
        access_type: Option<DataBreakpointAccessType>,
    ) -> &DataBreakpoint {
        self.data_breakpoints.push(DataBreakpoint::new(
            description,
            data_id,
            can_persist,
            access_type,
        ));
        self.data_breakpoints.last().expect("pushed just above")
    }

    pub fn remove_data_breakpoints(&mut self, id: BreakpointId) {
        self.data_breakpoints.retain(|bp| bp.id() != id);
    }

    pub fn add_instruction_breakpoint(
        &mut self,
        instruction_reference: impl Into<String>,
        offset: Option<i64>,
        condition: Option<String>,
        hit_condition: Option<String>,
    ) -> &InstructionBreakpoint {
        self.instruction_breakpoints.push(InstructionBreakpoint::new(
            instruction_reference,
            offset,
            condition,
            hit_condition,
        ));
        self.instruction_breakpoints
            .last()
            .expect("pushed just above")
    }

    pub fn remove_instruction_breakpoints(&mut self, instruction_reference: &str) {
        self.instruction_breakpoints
            .retain(|bp| bp.instruction_reference() != instruction_reference);
    }

    // --------------------------------- session overlays ------------------------------------------

    /// Apply adapter verification results for one session. `None` removes
    /// that session's overlay from every breakpoint (detach); with a map,
    /// only breakpoints present in it are touched.
    pub fn set_breakpoint_session_data(
        &mut self,
        session: SessionId,
        capabilities: &Capabilities,
        data: Option<HashMap<BreakpointId, protocol::Breakpoint>>,
    ) {
        let Some(data) = data else {
            self.clear_breakpoint_session_data(session);
            return;
        };

        macro_rules! apply {
            ($collection:expr) => {
                for bp in $collection.iter_mut() {
                    if let Some(raw) = data.get(&bp.id()) {
                        bp.set_session_data(
                            session,
                            Some(BreakpointSessionData::new(
                                session,
                                raw.clone(),
                                capabilities,
                            )),
                        );
                    }
                }
            };
        }
        apply!(self.breakpoints);
        apply!(self.function_breakpoints);
        apply!(self.exception_breakpoints);
        apply!(self.data_breakpoints);
        apply!(self.instruction_breakpoints);
    }

    /// Remove one session's overlay everywhere, leaving other sessions'
    /// overlays untouched.
    pub fn clear_breakpoint_session_data(&mut self, session: SessionId) {
        macro_rules! clear {
            ($collection:expr) => {
                for bp in $collection.iter_mut() {
                    bp.set_session_data(session, None);
                }
            };
        }
        clear!(self.breakpoints);
        clear!(self.function_breakpoints);
        clear!(self.exception_breakpoints);
        clear!(self.data_breakpoints);
        clear!(self.instruction_breakpoints);
    }

    /// One session's wire-shaped view of one breakpoint, any kind.
    pub fn debug_protocol_breakpoint(
        &self,
        id: BreakpointId,
        session: SessionId,
    ) -> Option<protocol::Breakpoint> {
        if let Some(bp) = self.breakpoints.iter().find(|bp| bp.id() == id) {
            return bp.debug_protocol_breakpoint(session);
        }
        if let Some(bp) = self.function_breakpoints.iter().find(|bp| bp.id() == id) {
            return bp.debug_protocol_breakpoint(session);
        }
        if let Some(bp) = self.exception_breakpoints.iter().find(|bp| bp.id() == id) {
            return bp.debug_protocol_breakpoint(session);
        }
        if let Some(bp) = self.data_breakpoints.iter().find(|bp| bp.id() == id) {
            return bp.debug_protocol_breakpoint(session);
        }
        if let Some(bp) = self.instruction_breakpoints.iter().find(|bp| bp.id() == id) {
            return bp.debug_protocol_breakpoint(session);
        }
        None
    }

    /// Apply a breakpoint event pushed by the adapter after the initial
    /// verification, located via the adapter-assigned id. Capability flags
    /// of the existing overlay are preserved. Returns false when nothing
    /// matched.
    pub fn update_breakpoint_from_event(
        &mut self,
        session: SessionId,
        raw: &protocol::Breakpoint,
    ) -> bool {
        let Some(adapter_id) = raw.id else {
            return false;
        };

        macro_rules! apply_event {
            ($collection:expr) => {
                for bp in $collection.iter_mut() {
                    if bp.id_from_adapter(session) != Some(adapter_id) {
                        continue;
                    }
                    let mut data = bp
                        .session_data(session)
                        .cloned()
                        .expect("id_from_adapter implies an overlay");
                    data.verified = raw.verified;
                    data.message = raw.message.clone();
                    data.source = raw.source.clone();
                    data.line = raw.line;
                    data.column = raw.column;
                    data.end_line = raw.end_line;
                    data.end_column = raw.end_column;
                    data.instruction_reference = raw.instruction_reference.clone();
                    data.offset = raw.offset;
                    bp.set_session_data(session, Some(data));
                    return true;
                }
            };
        }
        apply_event!(self.breakpoints);
        apply_event!(self.function_breakpoints);
        apply_event!(self.exception_breakpoints);
        apply_event!(self.data_breakpoints);
        apply_event!(self.instruction_breakpoints);
        false
    }

    /// Drop the overlay a breakpoint `removed` event refers to. Returns
    /// false when no breakpoint carries that adapter id for the session.
    pub fn remove_breakpoint_overlay(&mut self, session: SessionId, adapter_id: i64) -> bool {
        macro_rules! remove_overlay {
            ($collection:expr) => {
                for bp in $collection.iter_mut() {
                    if bp.id_from_adapter(session) == Some(adapter_id) {
                        bp.set_session_data(session, None);
                        return true;
                    }
                }
            };
        }
        remove_overlay!(self.breakpoints);
        remove_overlay!(self.function_breakpoints);
        remove_overlay!(self.exception_breakpoints);
        remove_overlay!(self.data_breakpoints);
        remove_overlay!(self.instruction_breakpoints);
        false
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_breakpoints_matching_filters() {
        let mut model = DebugModel::new();
        model.add_breakpoints(
            Path::new("src/main.rs"),
            vec![BreakpointSpec::at_line(10), BreakpointSpec::at_line(20)],
        );
        model.add_breakpoints(Path::new("src/lib.rs"), vec![BreakpointSpec::at_line(10)]);

        let ids: Vec<_> = model
            .breakpoints_matching(Some(Path::new("src/main.rs")), None, None, false)
            .iter()
            .map(|bp| bp.line())
            .collect();
        assert_eq!(ids, vec![10, 20]);

        let at_line = model.breakpoints_matching(None, Some(10), None, false);
        assert_eq!(at_line.len(), 2);

        let first = model.breakpoints()[0].id();
        model.update_breakpoints(&HashMap::from([(
            first,
            BreakpointUpdate {
                line: Some(11),
                ..Default::default()
            },
        )]));
        let at_line = model.breakpoints_matching(None, Some(10), None, false);
        assert_eq!(at_line.len(), 1);
    }

    #[test]
    fn test_enabled_only_filter() {
        let mut model = DebugModel::new();
        model.add_breakpoints(
            Path::new("src/main.rs"),
            vec![
                BreakpointSpec::at_line(1),
                BreakpointSpec {
                    enabled: false,
                    ..BreakpointSpec::at_line(2)
                },
            ],
        );
        assert_eq!(model.breakpoints_matching(None, None, None, true).len(), 1);
        model.enable_or_disable_all_breakpoints(true);
        assert_eq!(model.breakpoints_matching(None, None, None, true).len(), 2);
    }

    #[test]
    fn test_exception_filters_keep_user_state() {
        let mut model = DebugModel::new();
        let raised = protocol::ExceptionBreakpointsFilter {
            filter: "raised".to_string(),
            label: "Raised Exceptions".to_string(),
            ..Default::default()
        };
        let uncaught = protocol::ExceptionBreakpointsFilter {
            filter: "uncaught".to_string(),
            label: "Uncaught Exceptions".to_string(),
            ..Default::default()
        };
        model.set_exception_breakpoint_filters(&[raised.clone(), uncaught.clone()]);
        assert_eq!(model.exception_breakpoints().len(), 2);
        assert!(!model.exception_breakpoints()[0].enabled());

        let id = model.exception_breakpoints()[0].id();
        model
            .exception_breakpoints
            .iter_mut()
            .find(|bp| bp.id() == id)
            .unwrap()
            .set_enabled(true);

        // a second session advertising the same filters keeps the selection
        model.set_exception_breakpoint_filters(&[raised, uncaught]);
        assert!(model.exception_breakpoints()[0].enabled());
        assert!(!model.exception_breakpoints()[1].enabled());
    }

    #[test]
    fn test_breakpoint_event_updates_matching_overlay() {
        let mut model = DebugModel::new();
        let session = SessionId::new();
        model.add_breakpoints(Path::new("src/main.rs"), vec![BreakpointSpec::at_line(5)]);
        let id = model.breakpoints()[0].id();

        model.set_breakpoint_session_data(
            session,
            &Capabilities::default(),
            Some(HashMap::from([(
                id,
                protocol::Breakpoint {
                    id: Some(77),
                    verified: false,
                    ..Default::default()
                },
            )])),
        );
        assert!(!model.breakpoints()[0].verified());

        let updated = model.update_breakpoint_from_event(
            session,
            &protocol::Breakpoint {
                id: Some(77),
                verified: true,
                line: Some(6),
                ..Default::default()
            },
        );
        assert!(updated);
        assert!(model.breakpoints()[0].verified());
        assert_eq!(model.breakpoints()[0].line(), 6);

        let missed = model.update_breakpoint_from_event(
            session,
            &protocol::Breakpoint {
                id: Some(99),
                verified: true,
                ..Default::default()
            },
        );
        assert!(!missed);
    }
}
