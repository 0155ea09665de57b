mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

pub use self::state::*;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::upload_handler,
        api::category_handler,
        api::categories_handler,
        api::descriptors_handler,
        api::delete_handler,
        api::rank_handler,
        api::similar_handler,
        api::query_handler,
        api::feedback_handler,
    ),
    components(schemas(types::UploadForm,)),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

/// 构建API服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/upload", post(api::upload_handler))
        .route("/images/category/{category}", get(api::category_handler))
        .route("/categories", get(api::categories_handler))
        .route("/images/{id}/descriptors", get(api::descriptors_handler))
        .route("/images/{id}", delete(api::delete_handler))
        .route("/images/{id}/rank", post(api::rank_handler))
        .route("/images/{id}/similar", get(api::similar_handler))
        .route("/similar", post(api::query_handler))
        .route("/feedback", post(api::feedback_handler))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::disable())
        // 上传限制：50M
        .layer(RequestBodyLimitLayer::new(1024 * 1024 * 50))
        .with_state(state)
}
