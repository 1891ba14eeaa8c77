use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::infra::{app_state::AppState, swagger};

pub mod domain;
pub mod infra;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;

/// Assembles the full HTTP application: resource routes, Swagger UI and the
/// tracing and CORS layers.
pub fn app(state: AppState) -> Router {
    let routes = routes::routes_with_openapi(state.clone());

    let mut openapi = routes.get_openapi().clone();
    openapi.info = utoipa::openapi::InfoBuilder::new()
        .title("PawCare API")
        .version(env!("CARGO_PKG_VERSION"))
        .build();
    let swagger_ui = swagger::create_swagger_ui(openapi);

    Router::new()
        .merge(routes)
        .merge(swagger_ui)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
