//! Stack frames and their lazily fetched variable scopes.

use crate::model::source::Source;
use crate::protocol::{self, FramePresentationHint};
use std::collections::HashMap;
use std::rc::Rc;

/// Source range of a frame or scope, lines and columns starting at 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceRange {
    pub line: i64,
    pub column: i64,
    pub end_line: Option<i64>,
    pub end_column: Option<i64>,
}

/// One variable scope of one frame.
///
/// Adapters do not guarantee unique scope names within a frame, so each
/// scope carries a de-duplication index: the n-th occurrence of a name gets
/// index n-1, which keeps scope identity stable for UI diffing.
#[derive(Debug, Clone)]
pub struct Scope {
    pub name: String,
    pub index: u32,
    /// Reference used to fetch child variables.
    pub variables_reference: i64,
    /// Expensive scopes should not be auto-expanded by a UI.
    pub expensive: bool,
    pub range: Option<SourceRange>,
    pub named_variables: Option<i64>,
    pub indexed_variables: Option<i64>,
}

impl Scope {
    fn new(raw: protocol::Scope, index: u32) -> Self {
        let range = match (raw.line, raw.column) {
            (Some(line), Some(column)) => Some(SourceRange {
                line,
                column,
                end_line: raw.end_line,
                end_column: raw.end_column,
            }),
            _ => None,
        };
        Self {
            name: raw.name,
            index,
            variables_reference: raw.variables_reference,
            expensive: raw.expensive,
            range,
            named_variables: raw.named_variables,
            indexed_variables: raw.indexed_variables,
        }
    }
}

/// Assign de-duplication indexes in reply order.
pub(crate) fn scopes_from_response(raw: Vec<protocol::Scope>) -> Vec<Scope> {
    let mut seen: HashMap<String, u32> = HashMap::new();
    raw.into_iter()
        .map(|scope| {
            let index = seen
                .entry(scope.name.clone())
                .and_modify(|n| *n += 1)
                .or_insert(0);
            Scope::new(scope, *index)
        })
        .collect()
}

/// One call-stack entry, owned by the thread that produced it.
#[derive(Debug, Clone)]
pub struct StackFrame {
    /// Adapter-assigned frame id, valid only while the thread stays stopped.
    id: i64,
    thread_id: i64,
    name: String,
    source: Rc<Source>,
    range: SourceRange,
    /// Position within the call stack, 0 = innermost.
    index: usize,
    can_restart: bool,
    instruction_pointer_reference: Option<String>,
    presentation_hint: Option<FramePresentationHint>,
    /// Fetched at most once per frame unless explicitly forgotten.
    scopes: Option<Vec<Scope>>,
}

impl StackFrame {
    pub(crate) fn new(
        raw: protocol::StackFrame,
        source: Rc<Source>,
        thread_id: i64,
        index: usize,
    ) -> Self {
        Self {
            id: raw.id,
            thread_id,
            name: raw.name,
            source,
            range: SourceRange {
                line: raw.line,
                column: raw.column,
                end_line: raw.end_line,
                end_column: raw.end_column,
            },
            index,
            can_restart: raw.can_restart.unwrap_or(false),
            instruction_pointer_reference: raw.instruction_pointer_reference,
            presentation_hint: raw.presentation_hint,
            scopes: None,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn thread_id(&self) -> i64 {
        self.thread_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Rc<Source> {
        &self.source
    }

    pub fn range(&self) -> SourceRange {
        self.range
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn can_restart(&self) -> bool {
        self.can_restart
    }

    pub fn instruction_pointer_reference(&self) -> Option<&str> {
        self.instruction_pointer_reference.as_deref()
    }

    pub fn presentation_hint(&self) -> Option<FramePresentationHint> {
        self.presentation_hint
    }

    /// Label and subtle frames are adapter annotations, not real locations.
    pub fn hidden(&self) -> bool {
        matches!(
            self.presentation_hint,
            Some(FramePresentationHint::Label) | Some(FramePresentationHint::Subtle)
        )
    }

    /// Already fetched scopes, if any.
    pub fn scopes(&self) -> Option<&[Scope]> {
        self.scopes.as_deref()
    }

    pub(crate) fn set_scopes(&mut self, scopes: Vec<Scope>) {
        self.scopes = Some(scopes);
    }

    /// Drop the scope cache so the next query hits the adapter again.
    pub fn forget_scopes(&mut self) {
        self.scopes = None;
    }
}
