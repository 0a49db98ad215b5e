//! Status graph of a circuit.
//!
//! Statuses are the nodes. Each step declaring `current_status_id ->
//! next_status_id` is an explicit edge. Flexible statuses are reachable from
//! anywhere in the circuit without an edge.

use std::collections::HashMap;

use super::circuit::{Status, Step};
use super::document::AvailableTransition;

/// Read-only transition rules for one circuit.
#[derive(Debug, Clone)]
pub struct StatusGraph {
    statuses: Vec<Status>,
    by_id: HashMap<i64, usize>,
    /// Edge-declaring steps sorted by `(order_index, id)`.
    edges: Vec<Step>,
}

impl StatusGraph {
    pub fn new(mut statuses: Vec<Status>, steps: Vec<Step>) -> Self {
        statuses.sort_by_key(|s| s.id);
        let by_id = statuses.iter().enumerate().map(|(i, s)| (s.id, i)).collect();
        let mut edges: Vec<Step> = steps.into_iter().filter(|s| s.edge().is_some()).collect();
        edges.sort_by_key(|s| (s.order_index, s.id));
        Self { statuses, by_id, edges }
    }

    pub fn status(&self, id: i64) -> Option<&Status> {
        self.by_id.get(&id).map(|&i| &self.statuses[i])
    }

    /// Entry point of the circuit: the lowest-id status flagged initial.
    pub fn initial_status(&self) -> Option<&Status> {
        self.statuses.iter().find(|s| s.is_initial)
    }

    /// First step declaring `from -> to`.
    pub fn forward_edge(&self, from: i64, to: i64) -> Option<&Step> {
        self.edges.iter().find(|s| s.edge() == Some((from, to)))
    }

    /// Steps whose edge leaves `from`.
    pub fn outgoing(&self, from: i64) -> impl Iterator<Item = &Step> {
        self.edges
            .iter()
            .filter(move |s| s.current_status_id == Some(from))
    }

    /// Any move: flexible targets pass, otherwise a forward edge is needed.
    pub fn can_move(&self, current: i64, target: i64) -> bool {
        match self.status(target) {
            None => false,
            Some(status) if status.is_flexible => true,
            Some(_) => self.forward_edge(current, target).is_some(),
        }
    }

    /// Backward move: the reverse of a declared edge, or a flexible target.
    pub fn can_return(&self, current: i64, target: i64) -> bool {
        match self.status(target) {
            None => false,
            Some(status) if status.is_flexible => true,
            Some(_) => self.forward_edge(target, current).is_some(),
        }
    }

    /// Edge targets from `current` plus every flexible status, excluding
    /// `current`, without duplicates. Edge targets come first.
    pub fn available_from(&self, current: i64) -> Vec<AvailableTransition> {
        let mut out: Vec<AvailableTransition> = Vec::new();

        for step in self.outgoing(current) {
            let Some(target) = step.next_status_id.and_then(|id| self.status(id)) else {
                continue;
            };
            if target.id == current || out.iter().any(|t| t.status_id == target.id) {
                continue;
            }
            out.push(transition(target, Some(step.id)));
        }

        for status in self.statuses.iter().filter(|s| s.is_flexible) {
            if status.id == current || out.iter().any(|t| t.status_id == status.id) {
                continue;
            }
            out.push(transition(status, None));
        }

        out
    }
}

fn transition(status: &Status, via_step_id: Option<i64>) -> AvailableTransition {
    AvailableTransition {
        status_id: status.id,
        status_key: status.key.clone(),
        title: status.title.clone(),
        via_step_id,
        is_flexible: status.is_flexible,
        is_final: status.is_final,
    }
}
