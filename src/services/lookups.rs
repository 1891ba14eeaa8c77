//! Loaders that combine a fetch with the ownership check most routes need.

use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::{
    infra::{app_error::AppError, auth::AuthUser},
    models::{PetEntity, ServiceProviderEntity, VetEntity},
    schema::{pets, service_providers, vets},
};

/// Loads a pet the caller must own. An unknown id is reported on `field` so
/// forms can highlight the offending input.
pub async fn owned_pet(
    conn: &mut AsyncPgConnection,
    user: &AuthUser,
    pet_id: i32,
    field: &str,
) -> Result<PetEntity, AppError> {
    let pet: PetEntity = pets::table
        .find(pet_id)
        .select(PetEntity::as_select())
        .get_result(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::field(field, "The selected pet does not exist."))?;

    if !user.owns(pet.user_id) {
        return Err(AppError::ForbiddenResource(
            "You can only use your own pets".into(),
        ));
    }
    Ok(pet)
}

pub async fn vet_by_user(
    conn: &mut AsyncPgConnection,
    user_id: i32,
) -> QueryResult<Option<VetEntity>> {
    vets::table
        .filter(vets::user_id.eq(user_id))
        .select(VetEntity::as_select())
        .first(conn)
        .await
        .optional()
}

pub async fn service_provider_by_user(
    conn: &mut AsyncPgConnection,
    user_id: i32,
) -> QueryResult<Option<ServiceProviderEntity>> {
    service_providers::table
        .filter(service_providers::user_id.eq(user_id))
        .select(ServiceProviderEntity::as_select())
        .first(conn)
        .await
        .optional()
}

/// User id behind the vet or service provider an appointment is booked with.
pub async fn provider_user_id(
    conn: &mut AsyncPgConnection,
    vet_id: Option<i32>,
    service_provider_id: Option<i32>,
) -> QueryResult<Option<i32>> {
    if let Some(vet_id) = vet_id {
        return vets::table
            .find(vet_id)
            .select(vets::user_id)
            .first(conn)
            .await
            .optional();
    }
    if let Some(service_provider_id) = service_provider_id {
        return service_providers::table
            .find(service_provider_id)
            .select(service_providers::user_id)
            .first(conn)
            .await
            .optional();
    }
    Ok(None)
}
