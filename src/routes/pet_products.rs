use anyhow::Context;
use axum::{
    Extension,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use diesel::{AsChangeset, ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
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
    models::{NewPetProductEntity, PetProductEntity},
    schema::{categories, order_items, pet_products},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/pet-products",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_pet_products, create_pet_product))
            .routes(utoipa_axum::routes!(
                get_pet_product,
                update_pet_product,
                delete_pet_product
            )),
    )
}

async fn ensure_category(conn: &mut AsyncPgConnection, category_id: i32) -> Result<(), AppError> {
    categories::table
        .find(category_id)
        .select(categories::id)
        .get_result::<i32>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::field("category_id", "The selected category does not exist."))?;
    Ok(())
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct PetProductFilter {
    category_id: Option<i32>,
}

/// Browse the product catalogue.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Pet Products"],
    security(("bearerAuth" = [])),
    params(PetProductFilter),
    responses(
        (status = 200, description = "List products", body = StdResponse<Vec<PetProductEntity>, String>)
    )
)]
async fn get_pet_products(
    State(state): State<AppState>,
    Query(filter): Query<PetProductFilter>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut query = pet_products::table
        .select(PetProductEntity::as_select())
        .order_by(pet_products::name.asc())
        .into_boxed();
    if let Some(category_id) = filter.category_id {
        query = query.filter(pet_products::category_id.eq(category_id));
    }

    let products: Vec<PetProductEntity> = query
        .load(conn)
        .await
        .context("Failed to get products")?;

    Ok(StdResponse {
        data: Some(products),
        message: Some("Get products successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema)]
struct CreatePetProductReq {
    category_id: i32,
    #[validate(length(min = 1, max = 255, message = "The name field is required."))]
    name: String,
    description: Option<String>,
    #[validate(range(exclusive_min = 0.0, message = "The price must be greater than 0."))]
    price: f64,
    #[validate(range(min = 0, message = "The stock must be at least 0."))]
    stock: i32,
}

/// Put a product up for sale. Sellers are admins and service providers.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Pet Products"],
    security(("bearerAuth" = [])),
    request_body = CreatePetProductReq,
    responses(
        (status = 201, description = "Created product successfully", body = StdResponse<PetProductEntity, String>),
        (status = 403, description = "Caller cannot sell products", body = crate::infra::app_error::ErrorBody),
        (status = 422, description = "Validation failed", body = crate::infra::app_error::ErrorBody)
    )
)]
async fn create_pet_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<CreatePetProductReq>,
) -> Result<impl IntoResponse, AppError> {
    user.ensure_role(&[Role::ServiceProvider])?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    ensure_category(conn, body.category_id).await?;

    let product: PetProductEntity = diesel::insert_into(pet_products::table)
        .values(NewPetProductEntity {
            user_id: user.user_id,
            category_id: body.category_id,
            name: body.name,
            description: body.description,
            price: body.price,
            stock: body.stock,
        })
        .returning(PetProductEntity::as_returning())
        .get_result(conn)
        .await?;

    info!(
        product_id = product.id,
        seller_id = user.user_id,
        stock = product.stock,
        "Product created"
    );

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(product),
            message: Some("Created product successfully"),
        },
    ))
}

/// Fetch a product.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Pet Products"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Product ID to fetch")
    ),
    responses(
        (status = 200, description = "Get product successfully", body = StdResponse<PetProductEntity, String>)
    )
)]
async fn get_pet_product(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product: PetProductEntity = pet_products::table
        .find(id)
        .select(PetProductEntity::as_select())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(product),
        message: Some("Get product successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema, AsChangeset)]
#[diesel(table_name = crate::schema::pet_products)]
struct UpdatePetProductReq {
    category_id: Option<i32>,
    #[validate(length(min = 1, max = 255))]
    name: Option<String>,
    description: Option<String>,
    #[validate(range(exclusive_min = 0.0, message = "The price must be greater than 0."))]
    price: Option<f64>,
    #[validate(range(min = 0, message = "The stock must be at least 0."))]
    stock: Option<i32>,
}

/// Update a product. Price changes do not touch existing order snapshots.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Pet Products"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Product ID to update")
    ),
    request_body = UpdatePetProductReq,
    responses(
        (status = 200, description = "Updated product successfully", body = StdResponse<PetProductEntity, String>)
    )
)]
async fn update_pet_product(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<UpdatePetProductReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product: PetProductEntity = pet_products::table
        .find(id)
        .select(PetProductEntity::as_select())
        .get_result(conn)
        .await?;
    user.ensure_owner(product.user_id, "product")?;

    if let Some(category_id) = body.category_id {
        ensure_category(conn, category_id).await?;
    }

    let updated: PetProductEntity = diesel::update(pet_products::table.find(id))
        .set((&body, pet_products::updated_at.eq(diesel::dsl::now)))
        .returning(PetProductEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Updated product successfully"),
    })
}

/// Delete a product. Products that appear in orders are kept for the order history.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Pet Products"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Product ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted product successfully", body = StdResponse<PetProductEntity, String>),
        (status = 409, description = "Product is referenced by orders", body = crate::infra::app_error::ErrorBody)
    )
)]
async fn delete_pet_product(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product: PetProductEntity = pet_products::table
        .find(id)
        .select(PetProductEntity::as_select())
        .get_result(conn)
        .await?;
    user.ensure_owner(product.user_id, "product")?;

    let ordered: i64 = order_items::table
        .filter(order_items::pet_product_id.eq(id))
        .count()
        .get_result(conn)
        .await?;
    if ordered > 0 {
        return Err(AppError::Conflict(
            "Product has been ordered and cannot be deleted".into(),
        ));
    }

    let deleted: PetProductEntity = diesel::delete(pet_products::table.find(id))
        .returning(PetProductEntity::as_returning())
        .get_result(conn)
        .await?;

    info!(product_id = id, "Product deleted");

    Ok(StdResponse {
        data: Some(deleted),
        message: Some("Deleted product successfully"),
    })
}
