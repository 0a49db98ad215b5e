//! Domain models for the circuit engine.

pub mod action;
pub mod actor;
pub mod circuit;
pub mod config;
pub mod document;
pub mod status_graph;
pub mod step_chain;

pub use action::{Action, ActionStatusEffect, NewAction, StepAction};
pub use actor::{Actor, Capability, Role};
pub use circuit::{
    Circuit, CircuitStructureReport, CircuitUpdate, NewCircuit, NewStatus, NewStep, Status,
    StatusUpdate, Step, StepOrder, StepStructure, StepUpdate,
};
pub use config::{Config, DatabaseConfig, WorkflowConfig};
pub use document::{
    AvailableTransition, CompletionWrite, Document, DocumentCircuitHistory, DocumentLifecycle,
    DocumentStatus, DocumentWorkflowStatus, NewHistoryEntry, WorkflowChange,
};
pub use status_graph::StatusGraph;
pub use step_chain::{link_chain, StepChain, StepLink};
