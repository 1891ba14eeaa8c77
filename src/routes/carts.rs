use anyhow::Context;
use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper, upsert::excluded};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use validator::Validate;

use crate::{
    domain::{order_flow::check_stock, round_cents},
    infra::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        auth::AuthUser,
        validation::ValidatedJson,
    },
    models::{CartEntity, NewCartEntity, PetProductEntity},
    schema::{carts, pet_products},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/carts",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_carts, create_cart, clear_cart))
            .routes(utoipa_axum::routes!(get_cart, update_cart, delete_cart)),
    )
}

#[derive(Serialize, ToSchema)]
struct CartLineRes {
    #[serde(flatten)]
    cart: CartEntity,
    product_name: String,
    unit_price: f64,
    line_total: f64,
}

impl CartLineRes {
    fn new(cart: CartEntity, product_name: String, unit_price: f64) -> Self {
        let line_total = round_cents(f64::from(cart.quantity) * unit_price);
        Self {
            cart,
            product_name,
            unit_price,
            line_total,
        }
    }
}

#[derive(Serialize, ToSchema)]
struct GetCartsRes {
    lines: Vec<CartLineRes>,
    total: f64,
}

async fn load_product(
    conn: &mut AsyncPgConnection,
    product_id: i32,
) -> Result<PetProductEntity, AppError> {
    pet_products::table
        .find(product_id)
        .select(PetProductEntity::as_select())
        .get_result(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::field("pet_product_id", "The selected product does not exist."))
}

async fn load_own_line(
    conn: &mut AsyncPgConnection,
    user: &AuthUser,
    id: i32,
) -> Result<CartEntity, AppError> {
    let cart: CartEntity = carts::table
        .find(id)
        .select(CartEntity::as_select())
        .get_result(conn)
        .await?;
    user.ensure_owner(cart.user_id, "cart item")?;
    Ok(cart)
}

/// The caller's cart with per-line and overall totals at current prices.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Get cart successfully", body = StdResponse<GetCartsRes, String>)
    )
)]
async fn get_carts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let rows: Vec<(CartEntity, String, f64)> = carts::table
        .inner_join(pet_products::table)
        .filter(carts::user_id.eq(user.user_id))
        .order_by(carts::id.asc())
        .select((CartEntity::as_select(), pet_products::name, pet_products::price))
        .load(conn)
        .await
        .context("Failed to get cart")?;

    let lines: Vec<CartLineRes> = rows
        .into_iter()
        .map(|(cart, name, price)| CartLineRes::new(cart, name, price))
        .collect();
    let total = round_cents(lines.iter().map(|line| line.line_total).sum());

    Ok(StdResponse {
        data: Some(GetCartsRes { lines, total }),
        message: Some("Get cart successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema)]
struct CreateCartReq {
    pet_product_id: i32,
    #[validate(range(min = 1, message = "The quantity must be at least 1."))]
    quantity: i32,
}

/// Add a product to the cart. Adding a product already in the cart raises its quantity.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    request_body = CreateCartReq,
    responses(
        (status = 201, description = "Added to cart successfully", body = StdResponse<CartLineRes, String>),
        (status = 400, description = "Not enough stock", body = crate::infra::app_error::ErrorBody)
    )
)]
async fn create_cart(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<CreateCartReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product = load_product(conn, body.pet_product_id).await?;

    let in_cart: i32 = carts::table
        .filter(carts::user_id.eq(user.user_id))
        .filter(carts::pet_product_id.eq(product.id))
        .select(carts::quantity)
        .first(conn)
        .await
        .optional()?
        .unwrap_or(0);
    let quantity = in_cart.saturating_add(body.quantity);
    check_stock(&product.name, quantity, product.stock)?;

    let cart: CartEntity = diesel::insert_into(carts::table)
        .values(NewCartEntity {
            user_id: user.user_id,
            pet_product_id: product.id,
            quantity,
        })
        .on_conflict((carts::user_id, carts::pet_product_id))
        .do_update()
        .set((
            carts::quantity.eq(excluded(carts::quantity)),
            carts::updated_at.eq(diesel::dsl::now),
        ))
        .returning(CartEntity::as_returning())
        .get_result(conn)
        .await?;

    info!(
        user_id = user.user_id,
        product_id = product.id,
        quantity,
        "Cart updated"
    );

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(CartLineRes::new(cart, product.name, product.price)),
            message: Some("Added to cart successfully"),
        },
    ))
}

/// Empty the caller's cart.
#[utoipa::path(
    delete,
    path = "/",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Cleared cart successfully", body = StdResponse<usize, String>)
    )
)]
async fn clear_cart(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let removed = diesel::delete(carts::table.filter(carts::user_id.eq(user.user_id)))
        .execute(conn)
        .await?;

    Ok(StdResponse {
        data: Some(removed),
        message: Some("Cleared cart successfully"),
    })
}

/// Fetch one cart line.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Cart line ID to fetch")
    ),
    responses(
        (status = 200, description = "Get cart item successfully", body = StdResponse<CartLineRes, String>)
    )
)]
async fn get_cart(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let cart = load_own_line(conn, &user, id).await?;
    let product = load_product(conn, cart.pet_product_id).await?;

    Ok(StdResponse {
        data: Some(CartLineRes::new(cart, product.name, product.price)),
        message: Some("Get cart item successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema)]
struct UpdateCartReq {
    #[validate(range(min = 1, message = "The quantity must be at least 1."))]
    quantity: i32,
}

/// Set the quantity of a cart line.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Cart line ID to update")
    ),
    request_body = UpdateCartReq,
    responses(
        (status = 200, description = "Updated cart item successfully", body = StdResponse<CartLineRes, String>),
        (status = 400, description = "Not enough stock", body = crate::infra::app_error::ErrorBody)
    )
)]
async fn update_cart(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<UpdateCartReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let cart = load_own_line(conn, &user, id).await?;
    let product = load_product(conn, cart.pet_product_id).await?;
    check_stock(&product.name, body.quantity, product.stock)?;

    let updated: CartEntity = diesel::update(carts::table.find(id))
        .set((
            carts::quantity.eq(body.quantity),
            carts::updated_at.eq(diesel::dsl::now),
        ))
        .returning(CartEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(CartLineRes::new(updated, product.name, product.price)),
        message: Some("Updated cart item successfully"),
    })
}

/// Remove one line from the cart.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Cart line ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted cart item successfully", body = StdResponse<CartEntity, String>)
    )
)]
async fn delete_cart(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    load_own_line(conn, &user, id).await?;

    let deleted: CartEntity = diesel::delete(carts::table.find(id))
        .returning(CartEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(deleted),
        message: Some("Deleted cart item successfully"),
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn line_total_is_rounded_to_cents() {
        let cart = CartEntity {
            id: 1,
            user_id: 2,
            pet_product_id: 3,
            quantity: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let line = CartLineRes::new(cart, "Chew toy".into(), 0.1);
        assert_eq!(line.line_total, 0.3);
    }
}
