//! Application services for the circuit engine.
//!
//! Services are generic over the repository ports so tests and the CLI can
//! plug in the SQLite adapters or any other implementation.

pub mod circuit_catalog;
pub mod document_locks;
pub mod step_linker;
pub mod transition_engine;

pub use circuit_catalog::CircuitCatalog;
pub use document_locks::{DocumentGuard, DocumentLocks};
pub use step_linker::StepLinker;
pub use transition_engine::{ActionOutcome, TransitionEngine};
