//! Core orchestration logic.
//!
//! `LibraryOrchestrator` is the only sanctioned way to change the library:
//! it owns the catalog, import coordinator and thumbnail queue, and fans out
//! change events and user notifications.

pub mod orchestrator;

pub use orchestrator::LibraryOrchestrator;
