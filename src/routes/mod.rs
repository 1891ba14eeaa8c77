use utoipa_axum::router::OpenApiRouter;

use crate::infra::{app_state::AppState, middleware};

pub mod appointments;
pub mod carts;
pub mod categories;
pub mod emergency_shelters;
pub mod health;
pub mod lost_pet_reports;
pub mod medical_logs;
pub mod notifications;
pub mod order_items;
pub mod orders;
pub mod pet_markets;
pub mod pet_products;
pub mod pets;
pub mod reviews;
pub mod service_providers;
pub mod vets;

/// Every resource router behind the bearer token check, plus the public health probe.
pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    let protected = pets::routes_with_openapi()
        .merge(vets::routes_with_openapi())
        .merge(service_providers::routes_with_openapi())
        .merge(appointments::routes_with_openapi())
        .merge(medical_logs::routes_with_openapi())
        .merge(pet_markets::routes_with_openapi())
        .merge(categories::routes_with_openapi())
        .merge(pet_products::routes_with_openapi())
        .merge(carts::routes_with_openapi())
        .merge(orders::routes_with_openapi())
        .merge(order_items::routes_with_openapi())
        .merge(reviews::routes_with_openapi())
        .merge(lost_pet_reports::routes_with_openapi())
        .merge(emergency_shelters::routes_with_openapi())
        .merge(notifications::routes_with_openapi())
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::authorization,
        ));

    protected.merge(health::routes_with_openapi())
}
