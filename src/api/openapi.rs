//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{bestsellers, health};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Book Journey API",
        version = "1.0.0",
        description = "Reading club backend: bestseller maintenance endpoints"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Bestsellers
        bestsellers::list_bestsellers,
        bestsellers::refresh_bestsellers,
    ),
    components(
        schemas(
            health::HealthResponse,
            bestsellers::RefreshResponse,
            crate::error::ErrorResponse,
            crate::models::Book,
            crate::models::Genre,
            crate::models::GenreBestseller,
            crate::models::FavoriteGenre,
        )
    ),
    tags(
        (name = "health", description = "Service health"),
        (name = "bestsellers", description = "Bestseller reconciliation")
    )
)]
pub struct ApiDoc;

/// Router serving the Swagger UI and the OpenAPI document
pub fn create_openapi_router() -> Router {
    Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
