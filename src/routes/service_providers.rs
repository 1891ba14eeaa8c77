use anyhow::Context;
use axum::{
    Extension,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use diesel::{AsChangeset, ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use validator::Validate;

use crate::{
    domain::roles::Role,
    infra::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        auth::AuthUser,
        validation::ValidatedJson,
    },
    models::{NewServiceProviderEntity, ServiceProviderEntity},
    schema::{service_providers, users},
    services::lookups,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/service-providers",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_service_providers, create_service_provider))
            .routes(utoipa_axum::routes!(get_service_provider, update_service_provider, delete_service_provider)),
    )
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct ServiceProviderFilter {
    /// Only providers currently accepting appointments.
    available: Option<bool>,
    /// Exact service type, e.g. `grooming`.
    service_type: Option<String>,
}

/// List service provider profiles.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Service Providers"],
    security(("bearerAuth" = [])),
    params(ServiceProviderFilter),
    responses(
        (status = 200, description = "List service providers", body = StdResponse<Vec<ServiceProviderEntity>, String>)
    )
)]
async fn get_service_providers(
    State(state): State<AppState>,
    Query(filter): Query<ServiceProviderFilter>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut query = service_providers::table
        .select(ServiceProviderEntity::as_select())
        .order_by(service_providers::id.asc())
        .into_boxed();
    if let Some(available) = filter.available {
        query = query.filter(service_providers::is_available.eq(available));
    }
    if let Some(service_type) = filter.service_type {
        query = query.filter(service_providers::service_type.eq(service_type));
    }

    let service_providers: Vec<ServiceProviderEntity> = query
        .load(conn)
        .await
        .context("Failed to get service providers")?;

    Ok(StdResponse {
        data: Some(service_providers),
        message: Some("Get service providers successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema)]
struct CreateServiceProviderReq {
    /// Admins may create the profile on behalf of another service provider user.
    user_id: Option<i32>,
    #[validate(length(min = 1, max = 255, message = "The business name field is required."))]
    business_name: String,
    #[validate(length(min = 1, max = 100, message = "The service type field is required."))]
    service_type: String,
    description: Option<String>,
    #[validate(length(max = 30))]
    phone: Option<String>,
    address: Option<String>,
    is_available: Option<bool>,
}

/// Create the profile of a service provider user.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Service Providers"],
    security(("bearerAuth" = [])),
    request_body = CreateServiceProviderReq,
    responses(
        (status = 201, description = "Created service provider successfully", body = StdResponse<ServiceProviderEntity, String>),
        (status = 409, description = "Profile already exists", body = crate::infra::app_error::ErrorBody)
    )
)]
async fn create_service_provider(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<CreateServiceProviderReq>,
) -> Result<impl IntoResponse, AppError> {
    let on_behalf = match body.user_id {
        Some(target) if target != user.user_id => {
            user.ensure_admin()?;
            Some(target)
        }
        _ => {
            user.ensure_role(&[Role::ServiceProvider])?;
            None
        }
    };

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let owner_id = match on_behalf {
        Some(target) => {
            let role: String = users::table
                .find(target)
                .select(users::role)
                .get_result(conn)
                .await
                .optional()?
                .ok_or_else(|| AppError::field("user_id", "The selected user does not exist."))?;
            if role != Role::ServiceProvider.as_str() {
                return Err(AppError::field(
                    "user_id",
                    "The selected user is not a service provider.",
                ));
            }
            target
        }
        None => user.user_id,
    };

    if lookups::service_provider_by_user(conn, owner_id).await?.is_some() {
        return Err(AppError::Conflict(
            "A service provider profile already exists for this user".into(),
        ));
    }

    let service_provider: ServiceProviderEntity = diesel::insert_into(service_providers::table)
        .values(NewServiceProviderEntity {
            user_id: owner_id,
            business_name: body.business_name,
            service_type: body.service_type,
            description: body.description,
            phone: body.phone,
            address: body.address,
            is_available: body.is_available.unwrap_or(true),
        })
        .returning(ServiceProviderEntity::as_returning())
        .get_result(conn)
        .await?;

    info!(service_provider_id = service_provider.id, user_id = owner_id, "Service provider profile created");

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(service_provider),
            message: Some("Created service provider successfully"),
        },
    ))
}

/// Fetch a service provider profile.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Service Providers"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Service provider ID to fetch")
    ),
    responses(
        (status = 200, description = "Get service provider successfully", body = StdResponse<ServiceProviderEntity, String>)
    )
)]
async fn get_service_provider(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let service_provider: ServiceProviderEntity = service_providers::table
        .find(id)
        .select(ServiceProviderEntity::as_select())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(service_provider),
        message: Some("Get service provider successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema, AsChangeset)]
#[diesel(table_name = crate::schema::service_providers)]
struct UpdateServiceProviderReq {
    #[validate(length(min = 1, max = 255))]
    business_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    service_type: Option<String>,
    description: Option<String>,
    #[validate(length(max = 30))]
    phone: Option<String>,
    address: Option<String>,
    is_available: Option<bool>,
}

/// Update a service provider profile.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Service Providers"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Service provider ID to update")
    ),
    request_body = UpdateServiceProviderReq,
    responses(
        (status = 200, description = "Updated service provider successfully", body = StdResponse<ServiceProviderEntity, String>)
    )
)]
async fn update_service_provider(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<UpdateServiceProviderReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let service_provider: ServiceProviderEntity = service_providers::table
        .find(id)
        .select(ServiceProviderEntity::as_select())
        .get_result(conn)
        .await?;
    user.ensure_owner(service_provider.user_id, "service provider profile")?;

    let updated: ServiceProviderEntity = diesel::update(service_providers::table.find(id))
        .set((&body, service_providers::updated_at.eq(diesel::dsl::now)))
        .returning(ServiceProviderEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Updated service provider successfully"),
    })
}

/// Delete a service provider profile. Its appointments are removed as well.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Service Providers"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Service provider ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted service provider successfully", body = StdResponse<ServiceProviderEntity, String>)
    )
)]
async fn delete_service_provider(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let service_provider: ServiceProviderEntity = service_providers::table
        .find(id)
        .select(ServiceProviderEntity::as_select())
        .get_result(conn)
        .await?;
    user.ensure_owner(service_provider.user_id, "service provider profile")?;

    let deleted: ServiceProviderEntity = diesel::delete(service_providers::table.find(id))
        .returning(ServiceProviderEntity::as_returning())
        .get_result(conn)
        .await?;

    info!(service_provider_id = id, "Service provider profile deleted");

    Ok(StdResponse {
        data: Some(deleted),
        message: Some("Deleted service provider successfully"),
    })
}
