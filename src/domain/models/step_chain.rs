//! Step ordering view.
//!
//! The `prev`/`next`/`is_final_step` columns of a circuit's steps are a pure
//! function of the steps' `order_index`. [`link_chain`] computes that function;
//! the step linker service persists its output.

use serde::Serialize;

use super::circuit::Step;

/// Computed linkage for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepLink {
    pub step_id: i64,
    pub order_index: i64,
    pub prev_step_id: Option<i64>,
    pub next_step_id: Option<i64>,
    pub is_final_step: bool,
}

/// Compute the chain for a circuit's steps.
///
/// Steps are ordered by `order_index`, ties broken by id. Every step gets
/// `is_final_step = false` except the last one.
pub fn link_chain(steps: &[Step]) -> Vec<StepLink> {
    let mut ordered: Vec<(i64, i64)> = steps.iter().map(|s| (s.order_index, s.id)).collect();
    ordered.sort_unstable();

    let last = ordered.len().saturating_sub(1);
    ordered
        .iter()
        .enumerate()
        .map(|(i, &(order_index, step_id))| StepLink {
            step_id,
            order_index,
            prev_step_id: i.checked_sub(1).map(|p| ordered[p].1),
            next_step_id: ordered.get(i + 1).map(|n| n.1),
            is_final_step: i == last,
        })
        .collect()
}

/// Whether a step's stored links already match the computed ones.
pub fn is_linked(step: &Step, link: &StepLink) -> bool {
    step.id == link.step_id
        && step.prev_step_id == link.prev_step_id
        && step.next_step_id == link.next_step_id
        && step.is_final_step == link.is_final_step
}

/// Ordered presentation of a circuit's steps.
#[derive(Debug, Clone, Serialize)]
pub struct StepChain {
    pub circuit_id: i64,
    pub links: Vec<StepLink>,
}

impl StepChain {
    pub fn from_steps(circuit_id: i64, steps: &[Step]) -> Self {
        Self { circuit_id, links: link_chain(steps) }
    }

    pub fn final_step(&self) -> Option<&StepLink> {
        self.links.iter().find(|l| l.is_final_step)
    }
}
