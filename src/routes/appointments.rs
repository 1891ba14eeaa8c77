use anyhow::Context;
use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use diesel::{
    AsChangeset, BoolExpressionMethods, ExpressionMethods, OptionalExtension, QueryDsl,
    SelectableHelper,
};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use validator::Validate;

use crate::{
    domain::{
        appointment_flow::{self, AppointmentStatus, Party, validate_appointment_status},
        roles::Role,
    },
    infra::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        auth::AuthUser,
        validation::ValidatedJson,
    },
    models::{AppointmentEntity, NewAppointmentEntity},
    schema::{appointments, service_providers, vets},
    services::{lookups, notifications},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/appointments",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_appointments, create_appointment))
            .routes(utoipa_axum::routes!(
                get_appointment,
                update_appointment,
                delete_appointment
            )),
    )
}

/// List appointments visible to the caller.
///
/// Customers see their bookings. Vets and service providers additionally see
/// the appointments booked with their profile. Admins see everything.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Appointments"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "List appointments", body = StdResponse<Vec<AppointmentEntity>, String>)
    )
)]
async fn get_appointments(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut query = appointments::table
        .select(AppointmentEntity::as_select())
        .order_by(appointments::scheduled_at.asc())
        .into_boxed();

    let own = appointments::user_id.eq(user.user_id);
    match user.role {
        Role::Admin => {}
        Role::Vet => match lookups::vet_by_user(conn, user.user_id).await? {
            Some(vet) => query = query.filter(own.or(appointments::vet_id.eq(vet.id))),
            None => query = query.filter(own),
        },
        Role::ServiceProvider => {
            match lookups::service_provider_by_user(conn, user.user_id).await? {
                Some(provider) => {
                    query = query
                        .filter(own.or(appointments::service_provider_id.eq(provider.id)))
                }
                None => query = query.filter(own),
            }
        }
        Role::Customer => query = query.filter(own),
    }

    let appointments: Vec<AppointmentEntity> = query
        .load(conn)
        .await
        .context("Failed to get appointments")?;

    Ok(StdResponse {
        data: Some(appointments),
        message: Some("Get appointments successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema)]
struct CreateAppointmentReq {
    pet_id: i32,
    vet_id: Option<i32>,
    service_provider_id: Option<i32>,
    scheduled_at: DateTime<Utc>,
    #[validate(length(max = 1000))]
    reason: Option<String>,
}

enum BookedWith {
    Vet(i32),
    ServiceProvider(i32),
}

fn ensure_future(scheduled_at: DateTime<Utc>) -> Result<(), AppError> {
    if scheduled_at <= Utc::now() {
        return Err(AppError::field(
            "scheduled_at",
            "The scheduled time must be in the future.",
        ));
    }
    Ok(())
}

/// Book a vet or a service provider for one of the caller's pets.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Appointments"],
    security(("bearerAuth" = [])),
    request_body = CreateAppointmentReq,
    responses(
        (status = 201, description = "Created appointment successfully", body = StdResponse<AppointmentEntity, String>),
        (status = 422, description = "Validation failed", body = crate::infra::app_error::ErrorBody)
    )
)]
async fn create_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<CreateAppointmentReq>,
) -> Result<impl IntoResponse, AppError> {
    let booked_with = match (body.vet_id, body.service_provider_id) {
        (Some(vet_id), None) => BookedWith::Vet(vet_id),
        (None, Some(provider_id)) => BookedWith::ServiceProvider(provider_id),
        _ => {
            return Err(AppError::field(
                "provider",
                "Exactly one of vet_id or service_provider_id is required.",
            ));
        }
    };
    ensure_future(body.scheduled_at)?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    lookups::owned_pet(conn, &user, body.pet_id, "pet_id").await?;

    let (provider_user_id, is_available) = match booked_with {
        BookedWith::Vet(vet_id) => vets::table
            .find(vet_id)
            .select((vets::user_id, vets::is_available))
            .get_result::<(i32, bool)>(conn)
            .await
            .optional()?
            .ok_or_else(|| AppError::field("vet_id", "The selected vet does not exist."))?,
        BookedWith::ServiceProvider(provider_id) => service_providers::table
            .find(provider_id)
            .select((service_providers::user_id, service_providers::is_available))
            .get_result::<(i32, bool)>(conn)
            .await
            .optional()?
            .ok_or_else(|| {
                AppError::field(
                    "service_provider_id",
                    "The selected service provider does not exist.",
                )
            })?,
    };
    if !is_available {
        return Err(AppError::BadRequest(
            "The selected provider is not accepting appointments".into(),
        ));
    }

    let appointment = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let appointment: AppointmentEntity = diesel::insert_into(appointments::table)
                    .values(NewAppointmentEntity {
                        user_id: user.user_id,
                        pet_id: body.pet_id,
                        vet_id: body.vet_id,
                        service_provider_id: body.service_provider_id,
                        scheduled_at: body.scheduled_at,
                        reason: body.reason,
                        status: AppointmentStatus::Pending.as_str().into(),
                    })
                    .returning(AppointmentEntity::as_returning())
                    .get_result(conn)
                    .await?;

                notifications::notify(
                    conn,
                    provider_user_id,
                    "New appointment request",
                    format!(
                        "Appointment #{} was requested for {}.",
                        appointment.id,
                        appointment.scheduled_at.format("%Y-%m-%d %H:%M UTC")
                    ),
                )
                .await?;

                Ok::<AppointmentEntity, AppError>(appointment)
            })
        })
        .await?;

    info!(
        appointment_id = appointment.id,
        user_id = user.user_id,
        "Appointment requested"
    );

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(appointment),
            message: Some("Created appointment successfully"),
        },
    ))
}

/// Fetch an appointment the caller booked or is booked for.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Appointments"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Appointment ID to fetch")
    ),
    responses(
        (status = 200, description = "Get appointment successfully", body = StdResponse<AppointmentEntity, String>)
    )
)]
async fn get_appointment(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let appointment: AppointmentEntity = appointments::table
        .find(id)
        .select(AppointmentEntity::as_select())
        .get_result(conn)
        .await?;
    let provider_user_id =
        lookups::provider_user_id(conn, appointment.vet_id, appointment.service_provider_id)
            .await?;
    if Party::of(&user, appointment.user_id, provider_user_id).is_none() {
        return Err(AppError::ForbiddenResource(
            "You do not have access to this appointment".into(),
        ));
    }

    Ok(StdResponse {
        data: Some(appointment),
        message: Some("Get appointment successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema)]
struct UpdateAppointmentReq {
    scheduled_at: Option<DateTime<Utc>>,
    #[validate(length(max = 1000))]
    reason: Option<String>,
    /// One of `pending`, `accepted`, `canceled`.
    #[validate(custom(function = "validate_appointment_status"))]
    status: Option<String>,
}

#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::appointments)]
struct AppointmentChanges {
    scheduled_at: Option<DateTime<Utc>>,
    reason: Option<String>,
    status: Option<String>,
}

/// Reschedule an appointment or move it through its status flow.
///
/// The booker may reschedule while pending. Accepting is reserved for the
/// booked vet or provider; either side may cancel. Status changes notify the
/// other side.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Appointments"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Appointment ID to update")
    ),
    request_body = UpdateAppointmentReq,
    responses(
        (status = 200, description = "Updated appointment successfully", body = StdResponse<AppointmentEntity, String>),
        (status = 400, description = "Invalid status transition", body = crate::infra::app_error::ErrorBody),
        (status = 409, description = "Changed by another request", body = crate::infra::app_error::ErrorBody)
    )
)]
async fn update_appointment(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<UpdateAppointmentReq>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(scheduled_at) = body.scheduled_at {
        ensure_future(scheduled_at)?;
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let appointment: AppointmentEntity = appointments::table
        .find(id)
        .select(AppointmentEntity::as_select())
        .get_result(conn)
        .await?;
    let provider_user_id =
        lookups::provider_user_id(conn, appointment.vet_id, appointment.service_provider_id)
            .await?;
    let party = Party::of(&user, appointment.user_id, provider_user_id).ok_or_else(|| {
        AppError::ForbiddenResource("You do not have access to this appointment".into())
    })?;

    let current: AppointmentStatus = appointment
        .status
        .parse()
        .context("Stored appointment status is invalid")?;

    if body.scheduled_at.is_some() || body.reason.is_some() {
        appointment_flow::ensure_details_editable(current, party)?;
    }

    let next_status = match body.status.as_deref() {
        Some(raw) => {
            let requested: AppointmentStatus =
                raw.parse().context("Validated status failed to parse")?;
            Some(appointment_flow::transition(current, requested, party)?)
        }
        None => None,
    };

    let changes = AppointmentChanges {
        scheduled_at: body.scheduled_at,
        reason: body.reason,
        status: next_status.map(|status| status.as_str().to_string()),
    };
    let booker_id = appointment.user_id;

    let updated = conn
        .transaction(move |conn| {
            Box::pin(async move {
                // Guard on the status we validated against so a concurrent change loses.
                let updated: AppointmentEntity = diesel::update(
                    appointments::table
                        .find(id)
                        .filter(appointments::status.eq(current.as_str())),
                )
                .set((&changes, appointments::updated_at.eq(diesel::dsl::now)))
                .returning(AppointmentEntity::as_returning())
                .get_result(conn)
                .await
                .optional()?
                .ok_or_else(|| {
                    AppError::Conflict("Appointment was changed by another request".into())
                })?;

                if let Some(status) = next_status {
                    let (title, message) = appointment_flow::status_message(id, status);
                    for recipient in party.counterparts(booker_id, provider_user_id) {
                        notifications::notify(conn, recipient, title.clone(), message.clone())
                            .await?;
                    }
                }

                Ok::<AppointmentEntity, AppError>(updated)
            })
        })
        .await?;

    if let Some(status) = next_status {
        info!(
            appointment_id = id,
            from = %current,
            to = %status,
            user_id = user.user_id,
            "Appointment status changed"
        );
    }

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Updated appointment successfully"),
    })
}

/// Delete an appointment. Only the booker or an admin may do this.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Appointments"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Appointment ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted appointment successfully", body = StdResponse<AppointmentEntity, String>)
    )
)]
async fn delete_appointment(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let appointment: AppointmentEntity = appointments::table
        .find(id)
        .select(AppointmentEntity::as_select())
        .get_result(conn)
        .await?;
    user.ensure_owner(appointment.user_id, "appointment")?;

    let deleted: AppointmentEntity = diesel::delete(appointments::table.find(id))
        .returning(AppointmentEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(deleted),
        message: Some("Deleted appointment successfully"),
    })
}
