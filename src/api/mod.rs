//! HTTP surface: REST handlers, DTOs, the WebSocket route, and router
//! composition.

pub mod dto;
pub mod handlers;

use axum::Router;
use axum::routing::get;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// OpenAPI document for the REST endpoints.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "topic-relay",
        description = "WebSocket fan-out relay. Clients subscribe to topics on `/ws`; the REST endpoints expose health and hub statistics."
    ),
    paths(handlers::system::health_handler, handlers::topics::topics_handler),
    components(schemas(
        handlers::system::HealthResponse,
        handlers::system::HubStatus,
        dto::TopicsResponse,
        dto::TopicStatsDto,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    )),
    tags(
        (name = "System", description = "Service health"),
        (name = "Hub", description = "Subscription hub statistics"),
    )
)]
pub struct ApiDoc;

/// Builds the complete router: REST endpoints, `/ws`, and (with the
/// `swagger-ui` feature) the interactive API docs.
pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .merge(handlers::routes())
        .route("/ws", get(ws_handler));

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router.with_state(state)
}
