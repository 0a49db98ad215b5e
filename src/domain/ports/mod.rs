//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - CircuitRepository: circuit catalog persistence (circuits, statuses, steps, actions)
//! - DocumentRepository: document workflow state, completion records and history
//!
//! These traits define the contracts that allow the domain to be independent
//! of specific infrastructure implementations.

pub mod circuit_repository;
pub mod document_repository;

pub use circuit_repository::CircuitRepository;
pub use document_repository::DocumentRepository;
