//! Client-side domain model for debug-adapter style protocols.
//!
//! The crate tracks live debugging sessions, the breakpoints a user has
//! authored (with a per-session verification overlay), the execution threads
//! reported by each session, and the lazily fetched call-stack/scope tree
//! used to inspect a stopped thread.
//!
//! Transport, process management and rendering are external collaborators:
//! the only thing an embedder must provide is an [`client::AdapterClient`]
//! implementation plus an event channel feeding [`service::DebugService`].

pub mod client;
pub mod error;
pub mod model;
pub mod protocol;
pub mod service;
pub mod session;

pub use error::Error;
