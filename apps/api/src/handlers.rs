pub mod events;
pub mod health;
pub mod inbound;
pub mod webhooks;
pub mod workflow_runs;
pub mod workflows;
