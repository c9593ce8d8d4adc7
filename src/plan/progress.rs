//! Execution record for a plan.
//!
//! An executor runs steps strictly in order and persists the record between
//! steps. Because a `navigate` step reloads the page, the executor regains
//! control only on the next page load; [`PlanRun::resume_after_navigation`]
//! then marks that step done and moves on.

use serde::{Deserialize, Serialize};

use super::PlanStep;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedStep {
    #[serde(flatten)]
    pub step: PlanStep,
    pub description: String,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRun {
    pub id: String,
    pub steps: Vec<TrackedStep>,
    pub status: Status,
    pub current_step_index: usize,
}

impl PlanRun {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        let steps = steps
            .into_iter()
            .map(|step| TrackedStep {
                description: step.describe(),
                step,
                status: Status::Pending,
            })
            .collect();
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            steps,
            status: Status::Pending,
            current_step_index: 0,
        }
    }

    pub fn current(&self) -> Option<&TrackedStep> {
        self.steps.get(self.current_step_index)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, Status::Completed | Status::Failed)
    }

    /// Mark the step under the cursor running and return it, or finish the
    /// run when no steps remain.
    pub fn start_next(&mut self) -> Option<&PlanStep> {
        if self.is_finished() {
            return None;
        }
        if self.current_step_index >= self.steps.len() {
            self.status = Status::Completed;
            return None;
        }
        self.status = Status::Running;
        let tracked = &mut self.steps[self.current_step_index];
        tracked.status = Status::Running;
        Some(&tracked.step)
    }

    pub fn complete_current(&mut self) {
        if let Some(tracked) = self.steps.get_mut(self.current_step_index) {
            tracked.status = Status::Completed;
            self.current_step_index += 1;
        }
        if self.current_step_index >= self.steps.len() {
            self.status = Status::Completed;
        }
    }

    /// Stop the run at the current step.
    pub fn fail_current(&mut self) {
        if let Some(tracked) = self.steps.get_mut(self.current_step_index) {
            tracked.status = Status::Failed;
        }
        self.status = Status::Failed;
    }

    /// Called on page load with a restored record. If the run was stopped on
    /// a navigation step, that step is taken as done. Returns whether the
    /// cursor advanced.
    pub fn resume_after_navigation(&mut self) -> bool {
        if self.status != Status::Running {
            return false;
        }
        let navigated = self
            .current()
            .is_some_and(|t| t.step.interrupts_execution());
        if navigated {
            self.complete_current();
        }
        navigated
    }
}
