use std::collections::HashMap;

use anyhow::Context;
use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::NaiveDate;
use diesel::{
    AsChangeset, BoolExpressionMethods, ExpressionMethods, QueryDsl, QueryResult,
    SelectableHelper,
};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
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
    models::{MedicalLogEntity, MedicalLogPetEntity, NewMedicalLogEntity},
    schema::{medical_log_pet, medical_logs, pets},
    services::lookups,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/medical-logs",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_medical_logs, create_medical_log))
            .routes(utoipa_axum::routes!(
                get_medical_log,
                update_medical_log,
                delete_medical_log
            )),
    )
}

#[derive(Serialize, ToSchema)]
struct MedicalLogRes {
    #[serde(flatten)]
    medical_log: MedicalLogEntity,
    pet_ids: Vec<i32>,
}

async fn pet_ids_by_log(
    conn: &mut AsyncPgConnection,
    log_ids: &[i32],
) -> QueryResult<HashMap<i32, Vec<i32>>> {
    let links: Vec<MedicalLogPetEntity> = medical_log_pet::table
        .filter(medical_log_pet::medical_log_id.eq_any(log_ids))
        .select(MedicalLogPetEntity::as_select())
        .order_by(medical_log_pet::pet_id.asc())
        .load(conn)
        .await?;

    let mut by_log: HashMap<i32, Vec<i32>> = HashMap::new();
    for link in links {
        by_log
            .entry(link.medical_log_id)
            .or_default()
            .push(link.pet_id);
    }
    Ok(by_log)
}

async fn with_pet_ids(
    conn: &mut AsyncPgConnection,
    medical_log: MedicalLogEntity,
) -> QueryResult<MedicalLogRes> {
    let pet_ids = pet_ids_by_log(conn, &[medical_log.id])
        .await?
        .remove(&medical_log.id)
        .unwrap_or_default();
    Ok(MedicalLogRes {
        medical_log,
        pet_ids,
    })
}

fn dedup_ids(mut ids: Vec<i32>) -> Vec<i32> {
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Every listed pet must exist. Customers and service providers may only log
/// for their own pets, vets and admins for any.
async fn check_pets(
    conn: &mut AsyncPgConnection,
    user: &AuthUser,
    pet_ids: &[i32],
) -> Result<(), AppError> {
    let owners: Vec<(i32, i32)> = pets::table
        .filter(pets::id.eq_any(pet_ids))
        .select((pets::id, pets::user_id))
        .load(conn)
        .await?;

    if owners.len() != pet_ids.len() {
        return Err(AppError::field(
            "pet_ids",
            "One or more selected pets do not exist.",
        ));
    }
    let any_pet = matches!(user.role, Role::Admin | Role::Vet);
    if !any_pet && owners.iter().any(|(_, owner)| *owner != user.user_id) {
        return Err(AppError::ForbiddenResource(
            "You can only log records for your own pets".into(),
        ));
    }
    Ok(())
}

fn pivot_rows(medical_log_id: i32, pet_ids: &[i32]) -> Vec<MedicalLogPetEntity> {
    pet_ids
        .iter()
        .map(|&pet_id| MedicalLogPetEntity {
            medical_log_id,
            pet_id,
        })
        .collect()
}

/// List medical logs written by the caller or attached to the caller's pets.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Medical Logs"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "List medical logs", body = StdResponse<Vec<MedicalLogRes>, String>)
    )
)]
async fn get_medical_logs(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut query = medical_logs::table
        .select(MedicalLogEntity::as_select())
        .order_by(medical_logs::log_date.desc())
        .then_order_by(medical_logs::id.desc())
        .into_boxed();
    if !user.is_admin() {
        let own_pet_log_ids: Vec<i32> = medical_log_pet::table
            .inner_join(pets::table)
            .filter(pets::user_id.eq(user.user_id))
            .select(medical_log_pet::medical_log_id)
            .load(conn)
            .await?;
        query = query.filter(
            medical_logs::user_id
                .eq(user.user_id)
                .or(medical_logs::id.eq_any(own_pet_log_ids)),
        );
    }

    let logs: Vec<MedicalLogEntity> = query
        .load(conn)
        .await
        .context("Failed to get medical logs")?;

    let log_ids: Vec<i32> = logs.iter().map(|log| log.id).collect();
    let mut pet_ids = pet_ids_by_log(conn, &log_ids).await?;
    let logs: Vec<MedicalLogRes> = logs
        .into_iter()
        .map(|medical_log| MedicalLogRes {
            pet_ids: pet_ids.remove(&medical_log.id).unwrap_or_default(),
            medical_log,
        })
        .collect();

    Ok(StdResponse {
        data: Some(logs),
        message: Some("Get medical logs successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema)]
struct CreateMedicalLogReq {
    #[validate(length(min = 1, message = "Select at least one pet."))]
    pet_ids: Vec<i32>,
    #[validate(length(min = 1, max = 255, message = "The title field is required."))]
    title: String,
    #[validate(length(min = 1, message = "The description field is required."))]
    description: String,
    diagnosis: Option<String>,
    treatment: Option<String>,
    log_date: NaiveDate,
}

/// Record a medical log for one or more pets.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Medical Logs"],
    security(("bearerAuth" = [])),
    request_body = CreateMedicalLogReq,
    responses(
        (status = 201, description = "Created medical log successfully", body = StdResponse<MedicalLogRes, String>),
        (status = 422, description = "Validation failed", body = crate::infra::app_error::ErrorBody)
    )
)]
async fn create_medical_log(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<CreateMedicalLogReq>,
) -> Result<impl IntoResponse, AppError> {
    let pet_ids = dedup_ids(body.pet_ids);

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    check_pets(conn, &user, &pet_ids).await?;
    let vet_id = lookups::vet_by_user(conn, user.user_id)
        .await?
        .map(|vet| vet.id);

    let new_log = NewMedicalLogEntity {
        user_id: user.user_id,
        vet_id,
        title: body.title,
        description: body.description,
        diagnosis: body.diagnosis,
        treatment: body.treatment,
        log_date: body.log_date,
    };

    let medical_log = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let medical_log: MedicalLogEntity = diesel::insert_into(medical_logs::table)
                    .values(new_log)
                    .returning(MedicalLogEntity::as_returning())
                    .get_result(conn)
                    .await?;

                diesel::insert_into(medical_log_pet::table)
                    .values(pivot_rows(medical_log.id, &pet_ids))
                    .execute(conn)
                    .await?;

                Ok::<MedicalLogRes, AppError>(MedicalLogRes {
                    medical_log,
                    pet_ids,
                })
            })
        })
        .await?;

    info!(
        medical_log_id = medical_log.medical_log.id,
        pets = medical_log.pet_ids.len(),
        user_id = user.user_id,
        "Medical log recorded"
    );

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(medical_log),
            message: Some("Created medical log successfully"),
        },
    ))
}

/// Fetch a medical log. Visible to its author, owners of an attached pet and admins.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Medical Logs"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Medical log ID to fetch")
    ),
    responses(
        (status = 200, description = "Get medical log successfully", body = StdResponse<MedicalLogRes, String>)
    )
)]
async fn get_medical_log(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let medical_log: MedicalLogEntity = medical_logs::table
        .find(id)
        .select(MedicalLogEntity::as_select())
        .get_result(conn)
        .await?;
    let medical_log = with_pet_ids(conn, medical_log).await?;

    if !user.owns(medical_log.medical_log.user_id) {
        let own_pets: i64 = pets::table
            .filter(pets::id.eq_any(&medical_log.pet_ids))
            .filter(pets::user_id.eq(user.user_id))
            .count()
            .get_result(conn)
            .await?;
        if own_pets == 0 {
            return Err(AppError::ForbiddenResource(
                "You do not have access to this medical log".into(),
            ));
        }
    }

    Ok(StdResponse {
        data: Some(medical_log),
        message: Some("Get medical log successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema)]
struct UpdateMedicalLogReq {
    /// Replaces the attached pets when given.
    #[validate(length(min = 1, message = "Select at least one pet."))]
    pet_ids: Option<Vec<i32>>,
    #[validate(length(min = 1, max = 255))]
    title: Option<String>,
    #[validate(length(min = 1))]
    description: Option<String>,
    diagnosis: Option<String>,
    treatment: Option<String>,
    log_date: Option<NaiveDate>,
}

#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::medical_logs)]
struct MedicalLogChanges {
    title: Option<String>,
    description: Option<String>,
    diagnosis: Option<String>,
    treatment: Option<String>,
    log_date: Option<NaiveDate>,
}

/// Update a medical log and optionally re-sync its pets.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Medical Logs"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Medical log ID to update")
    ),
    request_body = UpdateMedicalLogReq,
    responses(
        (status = 200, description = "Updated medical log successfully", body = StdResponse<MedicalLogRes, String>)
    )
)]
async fn update_medical_log(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<UpdateMedicalLogReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let medical_log: MedicalLogEntity = medical_logs::table
        .find(id)
        .select(MedicalLogEntity::as_select())
        .get_result(conn)
        .await?;
    user.ensure_owner(medical_log.user_id, "medical log")?;

    let pet_ids = body.pet_ids.map(dedup_ids);
    if let Some(pet_ids) = &pet_ids {
        check_pets(conn, &user, pet_ids).await?;
    }

    let changes = MedicalLogChanges {
        title: body.title,
        description: body.description,
        diagnosis: body.diagnosis,
        treatment: body.treatment,
        log_date: body.log_date,
    };

    let updated = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let updated: MedicalLogEntity = diesel::update(medical_logs::table.find(id))
                    .set((&changes, medical_logs::updated_at.eq(diesel::dsl::now)))
                    .returning(MedicalLogEntity::as_returning())
                    .get_result(conn)
                    .await?;

                if let Some(pet_ids) = pet_ids {
                    diesel::delete(
                        medical_log_pet::table.filter(medical_log_pet::medical_log_id.eq(id)),
                    )
                    .execute(conn)
                    .await?;
                    diesel::insert_into(medical_log_pet::table)
                        .values(pivot_rows(id, &pet_ids))
                        .execute(conn)
                        .await?;
                }

                Ok::<MedicalLogRes, AppError>(with_pet_ids(conn, updated).await?)
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Updated medical log successfully"),
    })
}

/// Delete a medical log. Its pet links go with it.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Medical Logs"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Medical log ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted medical log successfully", body = StdResponse<MedicalLogEntity, String>)
    )
)]
async fn delete_medical_log(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let medical_log: MedicalLogEntity = medical_logs::table
        .find(id)
        .select(MedicalLogEntity::as_select())
        .get_result(conn)
        .await?;
    user.ensure_owner(medical_log.user_id, "medical log")?;

    let deleted: MedicalLogEntity = diesel::delete(medical_logs::table.find(id))
        .returning(MedicalLogEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(deleted),
        message: Some("Deleted medical log successfully"),
    })
}
