use anyhow::Context;
use axum::{
    Extension,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use diesel::{AsChangeset, ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use validator::Validate;

use crate::{
    domain::reports::{LostPetStatus, validate_lost_pet_status},
    infra::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        auth::AuthUser,
        validation::ValidatedJson,
    },
    models::{LostPetReportEntity, NewLostPetReportEntity},
    schema::lost_pet_reports,
    services::lookups,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/lost-pet-reports",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_lost_pet_reports, create_lost_pet_report))
            .routes(utoipa_axum::routes!(
                get_lost_pet_report,
                update_lost_pet_report,
                delete_lost_pet_report
            )),
    )
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct LostPetFilter {
    /// `lost` or `found`.
    status: Option<String>,
}

/// The lost-pet notice board.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Lost Pets"],
    security(("bearerAuth" = [])),
    params(LostPetFilter),
    responses(
        (status = 200, description = "List lost pet reports", body = StdResponse<Vec<LostPetReportEntity>, String>)
    )
)]
async fn get_lost_pet_reports(
    State(state): State<AppState>,
    Query(filter): Query<LostPetFilter>,
) -> Result<impl IntoResponse, AppError> {
    let status = filter
        .status
        .as_deref()
        .map(str::parse::<LostPetStatus>)
        .transpose()
        .map_err(|err| AppError::field("status", err.to_string()))?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut query = lost_pet_reports::table
        .select(LostPetReportEntity::as_select())
        .order_by(lost_pet_reports::last_seen_at.desc())
        .into_boxed();
    if let Some(status) = status {
        query = query.filter(lost_pet_reports::status.eq(status.as_str()));
    }

    let reports: Vec<LostPetReportEntity> = query
        .load(conn)
        .await
        .context("Failed to get lost pet reports")?;

    Ok(StdResponse {
        data: Some(reports),
        message: Some("Get lost pet reports successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema)]
struct CreateLostPetReportReq {
    /// Optional link to one of the caller's registered pets.
    pet_id: Option<i32>,
    #[validate(length(min = 1, max = 255, message = "The pet name field is required."))]
    pet_name: String,
    description: Option<String>,
    #[validate(length(min = 1, max = 255, message = "The last seen location field is required."))]
    last_seen_location: String,
    last_seen_at: DateTime<Utc>,
    #[validate(length(min = 1, max = 30, message = "The contact phone field is required."))]
    contact_phone: String,
}

/// Report a lost pet.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Lost Pets"],
    security(("bearerAuth" = [])),
    request_body = CreateLostPetReportReq,
    responses(
        (status = 201, description = "Created lost pet report successfully", body = StdResponse<LostPetReportEntity, String>),
        (status = 422, description = "Validation failed", body = crate::infra::app_error::ErrorBody)
    )
)]
async fn create_lost_pet_report(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<CreateLostPetReportReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    if let Some(pet_id) = body.pet_id {
        lookups::owned_pet(conn, &user, pet_id, "pet_id").await?;
    }

    let report: LostPetReportEntity = diesel::insert_into(lost_pet_reports::table)
        .values(NewLostPetReportEntity {
            user_id: user.user_id,
            pet_id: body.pet_id,
            pet_name: body.pet_name,
            description: body.description,
            last_seen_location: body.last_seen_location,
            last_seen_at: body.last_seen_at,
            contact_phone: body.contact_phone,
            status: LostPetStatus::Lost.as_str().into(),
        })
        .returning(LostPetReportEntity::as_returning())
        .get_result(conn)
        .await?;

    info!(report_id = report.id, user_id = user.user_id, "Lost pet reported");

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(report),
            message: Some("Created lost pet report successfully"),
        },
    ))
}

/// Fetch a lost pet report.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Lost Pets"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Report ID to fetch")
    ),
    responses(
        (status = 200, description = "Get lost pet report successfully", body = StdResponse<LostPetReportEntity, String>)
    )
)]
async fn get_lost_pet_report(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let report: LostPetReportEntity = lost_pet_reports::table
        .find(id)
        .select(LostPetReportEntity::as_select())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(report),
        message: Some("Get lost pet report successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema, AsChangeset)]
#[diesel(table_name = crate::schema::lost_pet_reports)]
struct UpdateLostPetReportReq {
    #[validate(length(min = 1, max = 255))]
    pet_name: Option<String>,
    description: Option<String>,
    #[validate(length(min = 1, max = 255))]
    last_seen_location: Option<String>,
    last_seen_at: Option<DateTime<Utc>>,
    #[validate(length(min = 1, max = 30))]
    contact_phone: Option<String>,
    /// `lost` or `found`.
    #[validate(custom(function = "validate_lost_pet_status"))]
    status: Option<String>,
}

/// Update a report, typically to mark the pet found.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Lost Pets"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Report ID to update")
    ),
    request_body = UpdateLostPetReportReq,
    responses(
        (status = 200, description = "Updated lost pet report successfully", body = StdResponse<LostPetReportEntity, String>)
    )
)]
async fn update_lost_pet_report(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<UpdateLostPetReportReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let report: LostPetReportEntity = lost_pet_reports::table
        .find(id)
        .select(LostPetReportEntity::as_select())
        .get_result(conn)
        .await?;
    user.ensure_owner(report.user_id, "lost pet report")?;

    let updated: LostPetReportEntity = diesel::update(lost_pet_reports::table.find(id))
        .set((&body, lost_pet_reports::updated_at.eq(diesel::dsl::now)))
        .returning(LostPetReportEntity::as_returning())
        .get_result(conn)
        .await?;

    if updated.status != report.status {
        info!(report_id = id, status = %updated.status, "Lost pet report status changed");
    }

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Updated lost pet report successfully"),
    })
}

/// Delete a report.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Lost Pets"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Report ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted lost pet report successfully", body = StdResponse<LostPetReportEntity, String>)
    )
)]
async fn delete_lost_pet_report(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let report: LostPetReportEntity = lost_pet_reports::table
        .find(id)
        .select(LostPetReportEntity::as_select())
        .get_result(conn)
        .await?;
    user.ensure_owner(report.user_id, "lost pet report")?;

    let deleted: LostPetReportEntity = diesel::delete(lost_pet_reports::table.find(id))
        .returning(LostPetReportEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(deleted),
        message: Some("Deleted lost pet report successfully"),
    })
}
