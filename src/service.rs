//! Breakpoint dispatch and event routing across sessions.
//!
//! The service owns the [`DebugModel`] and reacts to the two things that can
//! invalidate an adapter's breakpoint table: the breakpoint set changed, or
//! a session attached. Adapters replace their whole table per kind (and per
//! source, for line breakpoints) on every push, so each sender recomputes
//! the complete currently-supported subset instead of diffing.

use crate::client::AdapterClient;
use crate::error::Error;
use crate::model::breakpoint::{Breakpoint, BreakpointId, BreakpointSpec, BreakpointUpdate};
use crate::model::source::Source;
use crate::model::DebugModel;
use crate::protocol::events::{AdapterEvent, BreakpointEventReason};
use crate::protocol::{self, SourceBreakpoint};
use crate::session::{RequestKind, Session, SessionConfiguration, SessionId};
use itertools::Itertools;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

pub struct DebugService {
    model: DebugModel,
}

impl Default for DebugService {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugService {
    pub fn new() -> Self {
        Self {
            model: DebugModel::new(),
        }
    }

    pub fn model(&self) -> &DebugModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut DebugModel {
        &mut self.model
    }

    // --------------------------------- session lifecycle -----------------------------------------

    /// Create a session around a fresh adapter connection, drive it through
    /// initialize and launch/attach, and push the authored breakpoints.
    pub fn start_session(
        &mut self,
        configuration: SessionConfiguration,
        adapter: Box<dyn AdapterClient>,
    ) -> Result<SessionId, Error> {
        let mut session = Session::new(configuration, adapter);
        session.initialize()?;

        let filters = session.capabilities().exception_breakpoint_filters.clone();
        self.model.set_exception_breakpoint_filters(&filters);

        let request = session.configuration().request;
        match request {
            RequestKind::Launch => session.launch()?,
            RequestKind::Attach => session.attach()?,
        }
        log::info!(target: "service", "session `{}` started", session.label());

        let id = self.model.add_session(session);
        self.send_all_breakpoints(id)?;
        Ok(id)
    }

    /// Disconnect one session and drop its breakpoint overlays. The session
    /// object stays in the model (inactive) until removed.
    pub fn stop_session(
        &mut self,
        session: SessionId,
        terminate_debuggee: bool,
    ) -> Result<(), Error> {
        if let Some(session) = self.model.session_mut(session) {
            session.disconnect(terminate_debuggee, false)?;
        }
        self.model.clear_breakpoint_session_data(session);
        Ok(())
    }

    // --------------------------------- breakpoint authoring --------------------------------------

    /// Author line breakpoints from raw specs and push them - to one session
    /// when given, to every attached session otherwise. Returns the created
    /// breakpoints.
    pub fn add_breakpoints(
        &mut self,
        path: &Path,
        specs: Vec<BreakpointSpec>,
        session: Option<SessionId>,
    ) -> Result<Vec<&Breakpoint>, Error> {
        let created: Vec<BreakpointId> = self
            .model
            .add_breakpoints(path, specs)
            .iter()
            .map(|bp| bp.id())
            .collect();

        match session {
            Some(session) => self.send_source_breakpoints(Some(path), session)?,
            None => self.broadcast_source_breakpoints(Some(path))?,
        }

        Ok(self
            .model
            .breakpoints()
            .iter()
            .filter(|bp| created.contains(&bp.id()))
            .collect())
    }

    pub fn remove_breakpoints(&mut self, ids: &[BreakpointId]) -> Result<(), Error> {
        let paths = self.paths_of(ids);
        self.model.remove_breakpoints(ids);
        for path in paths {
            self.broadcast_source_breakpoints(Some(&path))?;
        }
        Ok(())
    }

    pub fn update_breakpoints(
        &mut self,
        updates: HashMap<BreakpointId, BreakpointUpdate>,
    ) -> Result<(), Error> {
        let ids: Vec<BreakpointId> = updates.keys().copied().collect();
        self.model.update_breakpoints(&updates);
        for path in self.paths_of(&ids) {
            self.broadcast_source_breakpoints(Some(&path))?;
        }
        Ok(())
    }

    /// Flip the global activation switch and resync every session.
    pub fn set_breakpoints_activated(&mut self, activated: bool) -> Result<(), Error> {
        self.model.set_breakpoints_activated(activated);
        for session in self.attached_sessions() {
            self.send_all_breakpoints(session)?;
        }
        Ok(())
    }

    fn paths_of(&self, ids: &[BreakpointId]) -> Vec<PathBuf> {
        self.model
            .breakpoints()
            .iter()
            .filter(|bp| ids.contains(&bp.id()))
            .map(|bp| bp.authored_path().to_path_buf())
            .unique()
            .collect()
    }

    fn attached_sessions(&self) -> Vec<SessionId> {
        self.model
            .sessions(false)
            .map(|session| session.id())
            .collect()
    }

    // --------------------------------- breakpoint dispatch ---------------------------------------

    /// Push every breakpoint kind to one session. The order is fixed - some
    /// adapters reject data/instruction breakpoints until exception filters
    /// are established.
    pub fn send_all_breakpoints(&mut self, session: SessionId) -> Result<(), Error> {
        self.send_source_breakpoints(None, session)?;
        self.send_function_breakpoints(session)?;
        self.send_exception_breakpoints(session)?;
        self.send_data_breakpoints(session)?;
        self.send_instruction_breakpoints(session)?;
        Ok(())
    }

    /// Push line breakpoints of one source (or of every source that has any)
    /// to one session. An emptied source still gets an empty push so the
    /// adapter clears its table.
    fn send_source_breakpoints(
        &mut self,
        path: Option<&Path>,
        session: SessionId,
    ) -> Result<(), Error> {
        let activated = self.model.breakpoints_activated();
        let paths: Vec<PathBuf> = match path {
            Some(path) => vec![path.to_path_buf()],
            None => self
                .model
                .breakpoints()
                .iter()
                .map(|bp| bp.authored_path().to_path_buf())
                .unique()
                .collect(),
        };

        for path in paths {
            let payload: Vec<(BreakpointId, SourceBreakpoint)> = self
                .model
                .breakpoints()
                .iter()
                .filter(|bp| bp.authored_path() == path)
                .filter(|bp| activated && bp.enabled() && bp.supported_by(session))
                .map(|bp| (bp.id(), bp.to_wire()))
                .collect();

            let source = Source::raw_for_path(&path);
            let wire: Vec<SourceBreakpoint> =
                payload.iter().map(|(_, wire)| wire.clone()).collect();

            let Some(target) = self.model.session_mut(session) else {
                return Err(Error::SessionNotFound(session));
            };
            let response = target.send_source_breakpoints(&source, &wire)?;
            let capabilities = target.capabilities().clone();

            if let Some(results) = response {
                let data: HashMap<BreakpointId, protocol::Breakpoint> = payload
                    .iter()
                    .map(|(id, _)| *id)
                    .zip(results)
                    .collect();
                self.model
                    .set_breakpoint_session_data(session, &capabilities, Some(data));
            }
        }
        Ok(())
    }

    fn send_function_breakpoints(&mut self, session: SessionId) -> Result<(), Error> {
        let activated = self.model.breakpoints_activated();
        let payload: Vec<(BreakpointId, protocol::FunctionBreakpointSpec)> = self
            .model
            .function_breakpoints()
            .iter()
            .filter(|bp| activated && bp.enabled() && bp.supported_by(session))
            .map(|bp| (bp.id(), bp.to_wire()))
            .collect();
        let wire: Vec<protocol::FunctionBreakpointSpec> =
            payload.iter().map(|(_, wire)| wire.clone()).collect();

        let Some(target) = self.model.session_mut(session) else {
            return Err(Error::SessionNotFound(session));
        };
        let response = target.send_function_breakpoints(&wire)?;
        let capabilities = target.capabilities().clone();

        if let Some(results) = response {
            let data: HashMap<BreakpointId, protocol::Breakpoint> =
                payload.iter().map(|(id, _)| *id).zip(results).collect();
            self.model
                .set_breakpoint_session_data(session, &capabilities, Some(data));
        }
        Ok(())
    }

    fn send_exception_breakpoints(&mut self, session: SessionId) -> Result<(), Error> {
        let activated = self.model.breakpoints_activated();
        let payload: Vec<(BreakpointId, protocol::ExceptionFilterOptions)> = self
            .model
            .exception_breakpoints()
            .iter()
            .filter(|bp| activated && bp.enabled() && bp.supported_by(session))
            .map(|bp| (bp.id(), bp.to_wire()))
            .collect();

        let Some(target) = self.model.session_mut(session) else {
            return Err(Error::SessionNotFound(session));
        };
        let response = if target.capabilities().supports_exception_filter_options {
            let options: Vec<protocol::ExceptionFilterOptions> =
                payload.iter().map(|(_, wire)| wire.clone()).collect();
            target.send_exception_breakpoints(&[], &options)?
        } else {
            let filters: Vec<String> = payload
                .iter()
                .map(|(_, wire)| wire.filter_id.clone())
                .collect();
            target.send_exception_breakpoints(&filters, &[])?
        };
        let capabilities = target.capabilities().clone();

        if let Some(results) = response {
            let data: HashMap<BreakpointId, protocol::Breakpoint> =
                payload.iter().map(|(id, _)| *id).zip(results).collect();
            self.model
                .set_breakpoint_session_data(session, &capabilities, Some(data));
        }
        Ok(())
    }

    fn send_data_breakpoints(&mut self, session: SessionId) -> Result<(), Error> {
        let activated = self.model.breakpoints_activated();
        let payload: Vec<(BreakpointId, protocol::DataBreakpointSpec)> = self
            .model
            .data_breakpoints()
            .iter()
            .filter(|bp| activated && bp.enabled() && bp.supported_by(session))
            .map(|bp| (bp.id(), bp.to_wire()))
            .collect();
        let wire: Vec<protocol::DataBreakpointSpec> =
            payload.iter().map(|(_, wire)| wire.clone()).collect();

        let Some(target) = self.model.session_mut(session) else {
            return Err(Error::SessionNotFound(session));
        };
        let response = target.send_data_breakpoints(&wire)?;
        let capabilities = target.capabilities().clone();

        if let Some(results) = response {
            let data: HashMap<BreakpointId, protocol::Breakpoint> =
                payload.iter().map(|(id, _)| *id).zip(results).collect();
            self.model
                .set_breakpoint_session_data(session, &capabilities, Some(data));
        }
        Ok(())
    }

    fn send_instruction_breakpoints(&mut self, session: SessionId) -> Result<(), Error> {
        let activated = self.model.breakpoints_activated();
        let payload: Vec<(BreakpointId, protocol::InstructionBreakpointSpec)> = self
            .model
            .instruction_breakpoints()
            .iter()
            .filter(|bp| activated && bp.enabled() && bp.supported_by(session))
            .map(|bp| (bp.id(), bp.to_wire()))
            .collect();
        let wire: Vec<protocol::InstructionBreakpointSpec> =
            payload.iter().map(|(_, wire)| wire.clone()).collect();

        let Some(target) = self.model.session_mut(session) else {
            return Err(Error::SessionNotFound(session));
        };
        let response = target.send_instruction_breakpoints(&wire)?;
        let capabilities = target.capabilities().clone();

        if let Some(results) = response {
            let data: HashMap<BreakpointId, protocol::Breakpoint> =
                payload.iter().map(|(id, _)| *id).zip(results).collect();
            self.model
                .set_breakpoint_session_data(session, &capabilities, Some(data));
        }
        Ok(())
    }

    fn broadcast_source_breakpoints(&mut self, path: Option<&Path>) -> Result<(), Error> {
        for session in self.attached_sessions() {
            self.send_source_breakpoints(path, session)?;
        }
        Ok(())
    }

    // --------------------------------- event routing ---------------------------------------------

    /// Route one adapter event: breakpoint validation lands in the model,
    /// everything else updates the owning session. Overlays of a session
    /// that terminates are dropped here, which is what restores the authored
    /// breakpoint view on detach.
    pub fn dispatch_event(
        &mut self,
        session: SessionId,
        event: AdapterEvent,
    ) -> Result<(), Error> {
        match event {
            AdapterEvent::Breakpoint { reason, breakpoint } => {
                let matched = match reason {
                    BreakpointEventReason::Removed => breakpoint
                        .id
                        .map(|id| self.model.remove_breakpoint_overlay(session, id))
                        .unwrap_or(false),
                    BreakpointEventReason::Changed | BreakpointEventReason::New => {
                        self.model.update_breakpoint_from_event(session, &breakpoint)
                    }
                };
                if !matched {
                    log::debug!(target: "service", "breakpoint event matched no authored breakpoint");
                }
                Ok(())
            }
            event => {
                let Some(target) = self.model.session_mut(session) else {
                    return Err(Error::SessionNotFound(session));
                };
                target.handle_event(event)?;
                if target.is_terminated() {
                    self.model.clear_breakpoint_session_data(session);
                }
                Ok(())
            }
        }
    }

    /// Drain everything currently queued on one session's event channel.
    pub fn drain_events(
        &mut self,
        session: SessionId,
        events: &Receiver<AdapterEvent>,
    ) -> Result<(), Error> {
        while let Ok(event) = events.try_recv() {
            self.dispatch_event(session, event)?;
        }
        Ok(())
    }
}
