//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod console_action_side_effects;
mod in_memory_webhook_repository;
mod in_memory_workflow_repository;
mod postgres_webhook_repository;
mod postgres_workflow_repository;
mod reqwest_webhook_http_client;

pub use console_action_side_effects::ConsoleActionSideEffects;
pub use in_memory_webhook_repository::InMemoryWebhookRepository;
pub use in_memory_workflow_repository::InMemoryWorkflowRepository;
pub use postgres_webhook_repository::PostgresWebhookRepository;
pub use postgres_workflow_repository::PostgresWorkflowRepository;
pub use reqwest_webhook_http_client::ReqwestWebhookHttpClient;
