mod execution;
mod repository;
mod side_effects;

pub use execution::{
    ActionResult, ClaimRunOutcome, CreateRunOutcome, CreateWorkflowRunInput, DueWorkflowRun,
    EventDispatchSummary, FinishWorkflowRunInput, WorkflowExecutionMode, WorkflowRun,
    WorkflowRunListQuery,
};
pub use repository::WorkflowRepository;
pub use side_effects::{ActionSideEffects, EntityReference};
