use anyhow::Context;
use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use diesel::{AsChangeset, ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use validator::Validate;

use crate::{
    domain::reports::{ShelterStatus, validate_shelter_status},
    infra::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        auth::AuthUser,
        validation::ValidatedJson,
    },
    models::{EmergencyShelterEntity, NewEmergencyShelterEntity},
    schema::emergency_shelters,
    services::{lookups, notifications},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/emergency-shelters",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(
                get_emergency_shelters,
                create_emergency_shelter
            ))
            .routes(utoipa_axum::routes!(
                get_emergency_shelter,
                update_emergency_shelter,
                delete_emergency_shelter
            )),
    )
}

/// List the caller's shelter requests (admins see every request).
#[utoipa::path(
    get,
    path = "/",
    tags = ["Emergency Shelters"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "List shelter requests", body = StdResponse<Vec<EmergencyShelterEntity>, String>)
    )
)]
async fn get_emergency_shelters(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut query = emergency_shelters::table
        .select(EmergencyShelterEntity::as_select())
        .order_by(emergency_shelters::created_at.desc())
        .into_boxed();
    if !user.is_admin() {
        query = query.filter(emergency_shelters::user_id.eq(user.user_id));
    }

    let requests: Vec<EmergencyShelterEntity> = query
        .load(conn)
        .await
        .context("Failed to get shelter requests")?;

    Ok(StdResponse {
        data: Some(requests),
        message: Some("Get shelter requests successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema)]
struct CreateEmergencyShelterReq {
    pet_id: Option<i32>,
    #[validate(length(min = 1, message = "The reason field is required."))]
    reason: String,
    #[validate(length(min = 1, max = 255, message = "The location field is required."))]
    location: String,
    #[validate(length(min = 1, max = 30, message = "The contact phone field is required."))]
    contact_phone: String,
}

/// Ask for emergency shelter for a pet.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Emergency Shelters"],
    security(("bearerAuth" = [])),
    request_body = CreateEmergencyShelterReq,
    responses(
        (status = 201, description = "Created shelter request successfully", body = StdResponse<EmergencyShelterEntity, String>),
        (status = 422, description = "Validation failed", body = crate::infra::app_error::ErrorBody)
    )
)]
async fn create_emergency_shelter(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<CreateEmergencyShelterReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    if let Some(pet_id) = body.pet_id {
        lookups::owned_pet(conn, &user, pet_id, "pet_id").await?;
    }

    let request: EmergencyShelterEntity = diesel::insert_into(emergency_shelters::table)
        .values(NewEmergencyShelterEntity {
            user_id: user.user_id,
            pet_id: body.pet_id,
            reason: body.reason,
            location: body.location,
            contact_phone: body.contact_phone,
            status: ShelterStatus::Pending.as_str().into(),
        })
        .returning(EmergencyShelterEntity::as_returning())
        .get_result(conn)
        .await?;

    info!(
        request_id = request.id,
        user_id = user.user_id,
        "Shelter requested"
    );

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(request),
            message: Some("Created shelter request successfully"),
        },
    ))
}

/// Fetch a shelter request.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Emergency Shelters"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Shelter request ID to fetch")
    ),
    responses(
        (status = 200, description = "Get shelter request successfully", body = StdResponse<EmergencyShelterEntity, String>)
    )
)]
async fn get_emergency_shelter(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let request: EmergencyShelterEntity = emergency_shelters::table
        .find(id)
        .select(EmergencyShelterEntity::as_select())
        .get_result(conn)
        .await?;
    user.ensure_owner(request.user_id, "shelter request")?;

    Ok(StdResponse {
        data: Some(request),
        message: Some("Get shelter request successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema)]
struct UpdateEmergencyShelterReq {
    #[validate(length(min = 1))]
    reason: Option<String>,
    #[validate(length(min = 1, max = 255))]
    location: Option<String>,
    #[validate(length(min = 1, max = 30))]
    contact_phone: Option<String>,
    /// Admin decision: `approved` or `rejected`.
    #[validate(custom(function = "validate_shelter_status"))]
    status: Option<String>,
}

#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::emergency_shelters)]
struct ShelterChanges {
    reason: Option<String>,
    location: Option<String>,
    contact_phone: Option<String>,
    status: Option<String>,
}

/// Edit a pending request, or decide it as an admin.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Emergency Shelters"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Shelter request ID to update")
    ),
    request_body = UpdateEmergencyShelterReq,
    responses(
        (status = 200, description = "Updated shelter request successfully", body = StdResponse<EmergencyShelterEntity, String>),
        (status = 400, description = "Request already decided", body = crate::infra::app_error::ErrorBody),
        (status = 403, description = "Only admins decide requests", body = crate::infra::app_error::ErrorBody)
    )
)]
async fn update_emergency_shelter(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<UpdateEmergencyShelterReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.status.is_some() {
        user.ensure_admin()?;
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let request: EmergencyShelterEntity = emergency_shelters::table
        .find(id)
        .select(EmergencyShelterEntity::as_select())
        .get_result(conn)
        .await?;
    user.ensure_owner(request.user_id, "shelter request")?;

    let current: ShelterStatus = request
        .status
        .parse()
        .context("Stored shelter status is invalid")?;
    let edits_details =
        body.reason.is_some() || body.location.is_some() || body.contact_phone.is_some();
    if edits_details && current != ShelterStatus::Pending {
        return Err(AppError::BadRequest(format!(
            "Shelter request is {current} and can no longer be edited"
        )));
    }

    let decision = match body.status.as_deref() {
        Some(raw) => {
            let requested: ShelterStatus =
                raw.parse().context("Validated status failed to parse")?;
            Some(current.decide(requested)?)
        }
        None => None,
    };

    let changes = ShelterChanges {
        reason: body.reason,
        location: body.location,
        contact_phone: body.contact_phone,
        status: decision.map(|status| status.as_str().to_string()),
    };
    let requester_id = request.user_id;

    let updated = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let updated: EmergencyShelterEntity = diesel::update(
                    emergency_shelters::table
                        .find(id)
                        .filter(emergency_shelters::status.eq(current.as_str())),
                )
                .set((&changes, emergency_shelters::updated_at.eq(diesel::dsl::now)))
                .returning(EmergencyShelterEntity::as_returning())
                .get_result(conn)
                .await
                .optional()?
                .ok_or_else(|| {
                    AppError::Conflict("Shelter request was changed by another request".into())
                })?;

                if let Some(status) = decision {
                    notifications::notify(
                        conn,
                        requester_id,
                        format!("Shelter request {status}"),
                        format!("Your emergency shelter request #{id} was {status}."),
                    )
                    .await?;
                }

                Ok::<EmergencyShelterEntity, AppError>(updated)
            })
        })
        .await?;

    if let Some(status) = decision {
        info!(request_id = id, %status, admin_id = user.user_id, "Shelter request decided");
    }

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Updated shelter request successfully"),
    })
}

/// Withdraw or remove a shelter request.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Emergency Shelters"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Shelter request ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted shelter request successfully", body = StdResponse<EmergencyShelterEntity, String>)
    )
)]
async fn delete_emergency_shelter(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let request: EmergencyShelterEntity = emergency_shelters::table
        .find(id)
        .select(EmergencyShelterEntity::as_select())
        .get_result(conn)
        .await?;
    user.ensure_owner(request.user_id, "shelter request")?;

    let deleted: EmergencyShelterEntity = diesel::delete(emergency_shelters::table.find(id))
        .returning(EmergencyShelterEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(deleted),
        message: Some("Deleted shelter request successfully"),
    })
}
