use axum::Router;
use axum::middleware::from_fn;
use axum::routing::{get, post, put};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};


pub fn build_router(app_state: AppState) -> Router {
    let protected_routes = Router::new()
        .route(
            "/api/events",
            post(handlers::events::ingest_entity_event_handler),
        )
        .route(
            "/api/workflows",
            get(handlers::workflows::list_workflows_handler)
                .post(handlers::workflows::create_workflow_handler),
        )
        .route(
            "/api/workflows/{workflow_id}",
            get(handlers::workflows::get_workflow_handler)
                .put(handlers::workflows::update_workflow_handler)
                .delete(handlers::workflows::delete_workflow_handler),
        )
        .route(
            "/api/workflows/{workflow_id}/active",
            put(handlers::workflows::set_workflow_active_handler),
        )
        .route(
            "/api/workflows/{workflow_id}/run",
            post(handlers::workflows::run_workflow_handler),
        )
        .route(
            "/api/workflow-runs",
            get(handlers::workflow_runs::list_workflow_runs_handler),
        )
        .route(
            "/api/workflow-runs/{run_id}",
            get(handlers::workflow_runs::get_workflow_run_handler),
        )
        .route(
            "/api/webhooks",
            get(handlers::webhooks::list_webhooks_handler)
                .post(handlers::webhooks::create_webhook_handler),
        )
        .route(
            "/api/webhooks/{webhook_id}",
            get(handlers::webhooks::get_webhook_handler)
                .delete(handlers::webhooks::delete_webhook_handler),
        )
        .route(
            "/api/webhooks/{webhook_id}/test",
            post(handlers::webhooks::test_webhook_handler),
        )
        .route(
            "/api/webhooks/{webhook_id}/pause",
            post(handlers::webhooks::pause_webhook_handler),
        )
        .route(
            "/api/webhooks/{webhook_id}/reactivate",
            post(handlers::webhooks::reactivate_webhook_handler),
        )
        .route(
            "/api/webhooks/{webhook_id}/rotate-secret",
            post(handlers::webhooks::rotate_webhook_secret_handler),
        )
        .route(
            "/api/webhooks/{webhook_id}/deliveries",
            get(handlers::webhooks::list_webhook_deliveries_handler),
        )
        .route_layer(from_fn(middleware::require_identity));

    Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route(
            "/api/inbound/payments",
            post(handlers::inbound::payment_callback_handler),
        )
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
