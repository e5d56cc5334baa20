mod delivery;
mod http_client;
mod repository;

pub use delivery::{
    CreateWebhookInput, DeliveryOutcome, DeliveryPolicy, DeliverySkipReason, RotatedWebhookSecret,
    WebhookDeliveryAttempt, WebhookDeliveryListQuery,
};
pub use http_client::{WebhookHttpClient, WebhookHttpRequest, WebhookHttpResponse};
pub use repository::WebhookRepository;
