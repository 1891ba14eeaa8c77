use anyhow::Context;
use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::NaiveDate;
use diesel::{AsChangeset, ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use validator::Validate;

use crate::{
    infra::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        auth::AuthUser,
        validation::ValidatedJson,
    },
    models::{NewPetEntity, PetEntity},
    schema::pets,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/pets",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_pets, create_pet))
            .routes(utoipa_axum::routes!(get_pet, update_pet, delete_pet)),
    )
}

/// List the caller's pets (admins see every pet).
#[utoipa::path(
    get,
    path = "/",
    tags = ["Pets"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "List pets", body = StdResponse<Vec<PetEntity>, String>)
    )
)]
async fn get_pets(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut query = pets::table
        .select(PetEntity::as_select())
        .order_by(pets::id.asc())
        .into_boxed();
    if !user.is_admin() {
        query = query.filter(pets::user_id.eq(user.user_id));
    }

    let pets: Vec<PetEntity> = query.load(conn).await.context("Failed to get pets")?;

    Ok(StdResponse {
        data: Some(pets),
        message: Some("Get pets successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema)]
struct CreatePetReq {
    #[validate(length(min = 1, max = 255, message = "The name field is required."))]
    name: String,
    #[validate(length(min = 1, max = 100, message = "The species field is required."))]
    species: String,
    #[validate(length(max = 100))]
    breed: Option<String>,
    #[validate(length(max = 20))]
    gender: Option<String>,
    birth_date: Option<NaiveDate>,
    #[validate(range(exclusive_min = 0.0, message = "The weight must be greater than 0."))]
    weight: Option<f64>,
    notes: Option<String>,
}

/// Register a pet for the caller.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Pets"],
    security(("bearerAuth" = [])),
    request_body = CreatePetReq,
    responses(
        (status = 201, description = "Created pet successfully", body = StdResponse<PetEntity, String>),
        (status = 422, description = "Validation failed", body = crate::infra::app_error::ErrorBody)
    )
)]
async fn create_pet(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<CreatePetReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let pet: PetEntity = diesel::insert_into(pets::table)
        .values(NewPetEntity {
            user_id: user.user_id,
            name: body.name,
            species: body.species,
            breed: body.breed,
            gender: body.gender,
            birth_date: body.birth_date,
            weight: body.weight,
            notes: body.notes,
        })
        .returning(PetEntity::as_returning())
        .get_result(conn)
        .await?;

    info!(pet_id = pet.id, user_id = user.user_id, "Pet registered");

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(pet),
            message: Some("Created pet successfully"),
        },
    ))
}

/// Fetch one pet owned by the caller.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Pets"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Pet ID to fetch")
    ),
    responses(
        (status = 200, description = "Get pet successfully", body = StdResponse<PetEntity, String>),
        (status = 403, description = "Not the owner", body = crate::infra::app_error::ErrorBody),
        (status = 404, description = "Pet not found", body = crate::infra::app_error::ErrorBody)
    )
)]
async fn get_pet(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let pet: PetEntity = pets::table
        .find(id)
        .select(PetEntity::as_select())
        .get_result(conn)
        .await?;
    user.ensure_owner(pet.user_id, "pet")?;

    Ok(StdResponse {
        data: Some(pet),
        message: Some("Get pet successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema, AsChangeset)]
#[diesel(table_name = crate::schema::pets)]
struct UpdatePetReq {
    #[validate(length(min = 1, max = 255))]
    name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    species: Option<String>,
    #[validate(length(max = 100))]
    breed: Option<String>,
    #[validate(length(max = 20))]
    gender: Option<String>,
    birth_date: Option<NaiveDate>,
    #[validate(range(exclusive_min = 0.0, message = "The weight must be greater than 0."))]
    weight: Option<f64>,
    notes: Option<String>,
}

/// Update a pet. Omitted fields keep their current value.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Pets"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Pet ID to update")
    ),
    request_body = UpdatePetReq,
    responses(
        (status = 200, description = "Updated pet successfully", body = StdResponse<PetEntity, String>)
    )
)]
async fn update_pet(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<UpdatePetReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let pet: PetEntity = pets::table
        .find(id)
        .select(PetEntity::as_select())
        .get_result(conn)
        .await?;
    user.ensure_owner(pet.user_id, "pet")?;

    let updated: PetEntity = diesel::update(pets::table.find(id))
        .set((&body, pets::updated_at.eq(diesel::dsl::now)))
        .returning(PetEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Updated pet successfully"),
    })
}

/// Delete a pet together with its appointments, listings and log links.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Pets"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Pet ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted pet successfully", body = StdResponse<PetEntity, String>)
    )
)]
async fn delete_pet(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let pet: PetEntity = pets::table
        .find(id)
        .select(PetEntity::as_select())
        .get_result(conn)
        .await?;
    user.ensure_owner(pet.user_id, "pet")?;

    let deleted: PetEntity = diesel::delete(pets::table.find(id))
        .returning(PetEntity::as_returning())
        .get_result(conn)
        .await?;

    info!(pet_id = id, user_id = user.user_id, "Pet deleted");

    Ok(StdResponse {
        data: Some(deleted),
        message: Some("Deleted pet successfully"),
    })
}
