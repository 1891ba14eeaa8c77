use anyhow::Context;
use axum::{
    Extension,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use diesel::{AsChangeset, ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use validator::Validate;

use crate::{
    domain::market::{ListingType, listing_price, validate_listing_type},
    infra::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        auth::AuthUser,
        validation::ValidatedJson,
    },
    models::{NewPetMarketEntity, PetMarketEntity},
    schema::pet_markets,
    services::lookups,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/pet-markets",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_pet_markets, create_pet_market))
            .routes(utoipa_axum::routes!(
                get_pet_market,
                update_pet_market,
                delete_pet_market
            )),
    )
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct PetMarketFilter {
    /// `sale` or `adoption`.
    listing_type: Option<String>,
    available: Option<bool>,
}

/// Browse the marketplace.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Pet Market"],
    security(("bearerAuth" = [])),
    params(PetMarketFilter),
    responses(
        (status = 200, description = "List pet listings", body = StdResponse<Vec<PetMarketEntity>, String>)
    )
)]
async fn get_pet_markets(
    State(state): State<AppState>,
    Query(filter): Query<PetMarketFilter>,
) -> Result<impl IntoResponse, AppError> {
    let listing_type = filter
        .listing_type
        .as_deref()
        .map(str::parse::<ListingType>)
        .transpose()
        .map_err(|err| AppError::field("listing_type", err.to_string()))?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut query = pet_markets::table
        .select(PetMarketEntity::as_select())
        .order_by(pet_markets::created_at.desc())
        .into_boxed();
    if let Some(listing_type) = listing_type {
        query = query.filter(pet_markets::listing_type.eq(listing_type.as_str()));
    }
    if let Some(available) = filter.available {
        query = query.filter(pet_markets::is_available.eq(available));
    }

    let listings: Vec<PetMarketEntity> = query
        .load(conn)
        .await
        .context("Failed to get pet listings")?;

    Ok(StdResponse {
        data: Some(listings),
        message: Some("Get pet listings successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema)]
struct CreatePetMarketReq {
    pet_id: i32,
    /// `sale` or `adoption`.
    #[validate(custom(function = "validate_listing_type"))]
    listing_type: String,
    /// Required for sale listings, ignored for adoptions.
    price: Option<f64>,
    description: Option<String>,
    is_available: Option<bool>,
}

/// List one of the caller's pets for sale or adoption.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Pet Market"],
    security(("bearerAuth" = [])),
    request_body = CreatePetMarketReq,
    responses(
        (status = 201, description = "Created pet listing successfully", body = StdResponse<PetMarketEntity, String>),
        (status = 422, description = "Validation failed", body = crate::infra::app_error::ErrorBody)
    )
)]
async fn create_pet_market(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<CreatePetMarketReq>,
) -> Result<impl IntoResponse, AppError> {
    let listing_type: ListingType = body
        .listing_type
        .parse()
        .context("Validated listing type failed to parse")?;
    let price = listing_price(listing_type, body.price)?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    lookups::owned_pet(conn, &user, body.pet_id, "pet_id").await?;

    let listing: PetMarketEntity = diesel::insert_into(pet_markets::table)
        .values(NewPetMarketEntity {
            user_id: user.user_id,
            pet_id: body.pet_id,
            listing_type: listing_type.as_str().into(),
            price,
            description: body.description,
            is_available: body.is_available.unwrap_or(true),
        })
        .returning(PetMarketEntity::as_returning())
        .get_result(conn)
        .await?;

    info!(
        listing_id = listing.id,
        pet_id = listing.pet_id,
        listing_type = %listing.listing_type,
        "Pet listed"
    );

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(listing),
            message: Some("Created pet listing successfully"),
        },
    ))
}

/// Fetch a listing.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Pet Market"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Listing ID to fetch")
    ),
    responses(
        (status = 200, description = "Get pet listing successfully", body = StdResponse<PetMarketEntity, String>)
    )
)]
async fn get_pet_market(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let listing: PetMarketEntity = pet_markets::table
        .find(id)
        .select(PetMarketEntity::as_select())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(listing),
        message: Some("Get pet listing successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema)]
struct UpdatePetMarketReq {
    #[validate(custom(function = "validate_listing_type"))]
    listing_type: Option<String>,
    price: Option<f64>,
    description: Option<String>,
    is_available: Option<bool>,
}

#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::pet_markets)]
#[diesel(treat_none_as_null = true)]
struct PricingChanges {
    listing_type: String,
    price: Option<f64>,
}

#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::pet_markets)]
struct PetMarketChanges {
    description: Option<String>,
    is_available: Option<bool>,
}

/// Update a listing. The sale/price rule is checked against the merged listing.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Pet Market"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Listing ID to update")
    ),
    request_body = UpdatePetMarketReq,
    responses(
        (status = 200, description = "Updated pet listing successfully", body = StdResponse<PetMarketEntity, String>)
    )
)]
async fn update_pet_market(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<UpdatePetMarketReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let listing: PetMarketEntity = pet_markets::table
        .find(id)
        .select(PetMarketEntity::as_select())
        .get_result(conn)
        .await?;
    user.ensure_owner(listing.user_id, "pet listing")?;

    let listing_type: ListingType = body
        .listing_type
        .as_deref()
        .unwrap_or(&listing.listing_type)
        .parse()
        .context("Listing type failed to parse")?;
    let pricing = PricingChanges {
        listing_type: listing_type.as_str().into(),
        price: listing_price(listing_type, body.price.or(listing.price))?,
    };
    let changes = PetMarketChanges {
        description: body.description,
        is_available: body.is_available,
    };

    let updated: PetMarketEntity = diesel::update(pet_markets::table.find(id))
        .set((
            &pricing,
            &changes,
            pet_markets::updated_at.eq(diesel::dsl::now),
        ))
        .returning(PetMarketEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Updated pet listing successfully"),
    })
}

/// Remove a listing.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Pet Market"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Listing ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted pet listing successfully", body = StdResponse<PetMarketEntity, String>)
    )
)]
async fn delete_pet_market(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let listing: PetMarketEntity = pet_markets::table
        .find(id)
        .select(PetMarketEntity::as_select())
        .get_result(conn)
        .await?;
    user.ensure_owner(listing.user_id, "pet listing")?;

    let deleted: PetMarketEntity = diesel::delete(pet_markets::table.find(id))
        .returning(PetMarketEntity::as_returning())
        .get_result(conn)
        .await?;

    info!(listing_id = id, "Pet listing removed");

    Ok(StdResponse {
        data: Some(deleted),
        message: Some("Deleted pet listing successfully"),
    })
}
