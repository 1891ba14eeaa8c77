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
    models::{NewVetEntity, VetEntity},
    schema::{users, vets},
    services::lookups,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/vets",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_vets, create_vet))
            .routes(utoipa_axum::routes!(get_vet, update_vet, delete_vet)),
    )
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct VetFilter {
    /// Only vets currently accepting appointments.
    available: Option<bool>,
}

/// List vet profiles.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Vets"],
    security(("bearerAuth" = [])),
    params(VetFilter),
    responses(
        (status = 200, description = "List vets", body = StdResponse<Vec<VetEntity>, String>)
    )
)]
async fn get_vets(
    State(state): State<AppState>,
    Query(filter): Query<VetFilter>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut query = vets::table
        .select(VetEntity::as_select())
        .order_by(vets::id.asc())
        .into_boxed();
    if let Some(available) = filter.available {
        query = query.filter(vets::is_available.eq(available));
    }

    let vets: Vec<VetEntity> = query.load(conn).await.context("Failed to get vets")?;

    Ok(StdResponse {
        data: Some(vets),
        message: Some("Get vets successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema)]
struct CreateVetReq {
    /// Admins may create the profile on behalf of another vet user.
    user_id: Option<i32>,
    #[validate(length(min = 1, max = 255, message = "The clinic name field is required."))]
    clinic_name: String,
    #[validate(length(min = 1, max = 255, message = "The specialization field is required."))]
    specialization: String,
    #[validate(length(min = 1, max = 100, message = "The license number field is required."))]
    license_number: String,
    #[validate(length(max = 30))]
    phone: Option<String>,
    address: Option<String>,
    is_available: Option<bool>,
}

/// Create the vet profile of a vet user.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Vets"],
    security(("bearerAuth" = [])),
    request_body = CreateVetReq,
    responses(
        (status = 201, description = "Created vet successfully", body = StdResponse<VetEntity, String>),
        (status = 409, description = "Profile already exists", body = crate::infra::app_error::ErrorBody)
    )
)]
async fn create_vet(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<CreateVetReq>,
) -> Result<impl IntoResponse, AppError> {
    let on_behalf = match body.user_id {
        Some(target) if target != user.user_id => {
            user.ensure_admin()?;
            Some(target)
        }
        _ => {
            user.ensure_role(&[Role::Vet])?;
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
            if role != Role::Vet.as_str() {
                return Err(AppError::field("user_id", "The selected user is not a vet."));
            }
            target
        }
        None => user.user_id,
    };

    if lookups::vet_by_user(conn, owner_id).await?.is_some() {
        return Err(AppError::Conflict(
            "A vet profile already exists for this user".into(),
        ));
    }

    let vet: VetEntity = diesel::insert_into(vets::table)
        .values(NewVetEntity {
            user_id: owner_id,
            clinic_name: body.clinic_name,
            specialization: body.specialization,
            license_number: body.license_number,
            phone: body.phone,
            address: body.address,
            is_available: body.is_available.unwrap_or(true),
        })
        .returning(VetEntity::as_returning())
        .get_result(conn)
        .await?;

    info!(vet_id = vet.id, user_id = owner_id, "Vet profile created");

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(vet),
            message: Some("Created vet successfully"),
        },
    ))
}

/// Fetch a vet profile.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Vets"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Vet ID to fetch")
    ),
    responses(
        (status = 200, description = "Get vet successfully", body = StdResponse<VetEntity, String>)
    )
)]
async fn get_vet(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let vet: VetEntity = vets::table
        .find(id)
        .select(VetEntity::as_select())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(vet),
        message: Some("Get vet successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema, AsChangeset)]
#[diesel(table_name = crate::schema::vets)]
struct UpdateVetReq {
    #[validate(length(min = 1, max = 255))]
    clinic_name: Option<String>,
    #[validate(length(min = 1, max = 255))]
    specialization: Option<String>,
    #[validate(length(min = 1, max = 100))]
    license_number: Option<String>,
    #[validate(length(max = 30))]
    phone: Option<String>,
    address: Option<String>,
    is_available: Option<bool>,
}

/// Update a vet profile.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Vets"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Vet ID to update")
    ),
    request_body = UpdateVetReq,
    responses(
        (status = 200, description = "Updated vet successfully", body = StdResponse<VetEntity, String>)
    )
)]
async fn update_vet(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<UpdateVetReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let vet: VetEntity = vets::table
        .find(id)
        .select(VetEntity::as_select())
        .get_result(conn)
        .await?;
    user.ensure_owner(vet.user_id, "vet profile")?;

    let updated: VetEntity = diesel::update(vets::table.find(id))
        .set((&body, vets::updated_at.eq(diesel::dsl::now)))
        .returning(VetEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Updated vet successfully"),
    })
}

/// Delete a vet profile. Appointments booked with it are removed as well.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Vets"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Vet ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted vet successfully", body = StdResponse<VetEntity, String>)
    )
)]
async fn delete_vet(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let vet: VetEntity = vets::table
        .find(id)
        .select(VetEntity::as_select())
        .get_result(conn)
        .await?;
    user.ensure_owner(vet.user_id, "vet profile")?;

    let deleted: VetEntity = diesel::delete(vets::table.find(id))
        .returning(VetEntity::as_returning())
        .get_result(conn)
        .await?;

    info!(vet_id = id, "Vet profile deleted");

    Ok(StdResponse {
        data: Some(deleted),
        message: Some("Deleted vet successfully"),
    })
}
