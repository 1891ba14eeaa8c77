use anyhow::Context;
use axum::{
    Extension,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use validator::Validate;

use crate::{
    domain::order_flow::{
        OrderStatus, PaymentStatus, StockChange, ensure_items_editable, stock_change,
    },
    infra::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        auth::AuthUser,
        validation::ValidatedJson,
    },
    models::{NewOrderItemEntity, OrderEntity, OrderItemEntity, PetProductEntity},
    schema::{order_items, orders, pet_products},
    services::stock,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/order-items",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_order_items, create_order_item))
            .routes(utoipa_axum::routes!(
                get_order_item,
                update_order_item,
                delete_order_item
            )),
    )
}

/// Item plus the order total after the change.
#[derive(Serialize, ToSchema)]
struct OrderItemRes {
    item: OrderItemEntity,
    order_total: f64,
}

/// Items may change only on a pending, unpaid order.
fn ensure_editable(order: &OrderEntity) -> Result<(), AppError> {
    let status: OrderStatus = order
        .status
        .parse()
        .context("Stored order status is invalid")?;
    let payment: PaymentStatus = order
        .payment_status
        .parse()
        .context("Stored payment status is invalid")?;
    ensure_items_editable(status, payment)?;
    Ok(())
}

/// Loads the order and checks that the caller may still change its items.
async fn editable_order(
    conn: &mut AsyncPgConnection,
    user: &AuthUser,
    order_id: i32,
) -> Result<OrderEntity, AppError> {
    let order: OrderEntity = orders::table
        .find(order_id)
        .select(OrderEntity::as_select())
        .get_result(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::field("order_id", "The selected order does not exist."))?;
    user.ensure_owner(order.user_id, "order")?;
    ensure_editable(&order)?;
    Ok(order)
}

/// Re-checks the order under its row lock, inside the transaction that moves stock.
async fn lock_editable_order(
    conn: &mut AsyncPgConnection,
    order_id: i32,
) -> Result<(), AppError> {
    let order = stock::lock_order(conn, order_id).await?;
    ensure_editable(&order)
}

async fn load_item(conn: &mut AsyncPgConnection, id: i32) -> Result<OrderItemEntity, AppError> {
    Ok(order_items::table
        .find(id)
        .select(OrderItemEntity::as_select())
        .get_result(conn)
        .await?)
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct OrderItemFilter {
    order_id: Option<i32>,
}

/// List items of the caller's orders.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Order Items"],
    security(("bearerAuth" = [])),
    params(OrderItemFilter),
    responses(
        (status = 200, description = "List order items", body = StdResponse<Vec<OrderItemEntity>, String>)
    )
)]
async fn get_order_items(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(filter): Query<OrderItemFilter>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut query = order_items::table
        .inner_join(orders::table)
        .select(OrderItemEntity::as_select())
        .order_by(order_items::id.asc())
        .into_boxed();
    if !user.is_admin() {
        query = query.filter(orders::user_id.eq(user.user_id));
    }
    if let Some(order_id) = filter.order_id {
        query = query.filter(order_items::order_id.eq(order_id));
    }

    let items: Vec<OrderItemEntity> = query
        .load(conn)
        .await
        .context("Failed to get order items")?;

    Ok(StdResponse {
        data: Some(items),
        message: Some("Get order items successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema)]
struct CreateOrderItemReq {
    order_id: i32,
    pet_product_id: i32,
    #[validate(range(min = 1, message = "The quantity must be at least 1."))]
    quantity: i32,
}

/// Add a product to a pending, unpaid order at its current price.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Order Items"],
    security(("bearerAuth" = [])),
    request_body = CreateOrderItemReq,
    responses(
        (status = 201, description = "Created order item successfully", body = StdResponse<OrderItemRes, String>),
        (status = 400, description = "Order not pending, already paid or not enough stock", body = crate::infra::app_error::ErrorBody)
    )
)]
async fn create_order_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<CreateOrderItemReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = editable_order(conn, &user, body.order_id).await?;
    let product: PetProductEntity = pet_products::table
        .find(body.pet_product_id)
        .select(PetProductEntity::as_select())
        .get_result(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::field("pet_product_id", "The selected product does not exist."))?;

    let created = conn
        .transaction(move |conn| {
            Box::pin(async move {
                lock_editable_order(conn, order.id).await?;
                stock::reserve(conn, product.id, body.quantity).await?;

                let item: OrderItemEntity = diesel::insert_into(order_items::table)
                    .values(NewOrderItemEntity {
                        order_id: order.id,
                        pet_product_id: product.id,
                        quantity: body.quantity,
                        unit_price: product.price,
                    })
                    .returning(OrderItemEntity::as_returning())
                    .get_result(conn)
                    .await?;
                let order = stock::recompute_order_total(conn, order.id).await?;

                Ok::<OrderItemRes, AppError>(OrderItemRes {
                    item,
                    order_total: order.total_amount,
                })
            })
        })
        .await?;

    info!(
        order_id = created.item.order_id,
        item_id = created.item.id,
        quantity = created.item.quantity,
        "Order item added"
    );

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(created),
            message: Some("Created order item successfully"),
        },
    ))
}

/// Fetch an order item.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Order Items"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order item ID to fetch")
    ),
    responses(
        (status = 200, description = "Get order item successfully", body = StdResponse<OrderItemEntity, String>)
    )
)]
async fn get_order_item(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let item = load_item(conn, id).await?;
    let owner_id: i32 = orders::table
        .find(item.order_id)
        .select(orders::user_id)
        .get_result(conn)
        .await?;
    user.ensure_owner(owner_id, "order item")?;

    Ok(StdResponse {
        data: Some(item),
        message: Some("Get order item successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema)]
struct UpdateOrderItemReq {
    #[validate(range(min = 1, message = "The quantity must be at least 1."))]
    quantity: i32,
}

/// Change the quantity of an item on a pending, unpaid order.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Order Items"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order item ID to update")
    ),
    request_body = UpdateOrderItemReq,
    responses(
        (status = 200, description = "Updated order item successfully", body = StdResponse<OrderItemRes, String>),
        (status = 400, description = "Order not pending, already paid or not enough stock", body = crate::infra::app_error::ErrorBody)
    )
)]
async fn update_order_item(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<UpdateOrderItemReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let item = load_item(conn, id).await?;
    editable_order(conn, &user, item.order_id).await?;

    let (updated, change) = conn
        .transaction(move |conn| {
            Box::pin(async move {
                lock_editable_order(conn, item.order_id).await?;
                // Re-read under the order lock; the quantity may have moved meanwhile.
                let item = load_item(conn, id).await?;
                let change = stock_change(item.quantity, body.quantity);

                match change {
                    StockChange::Reserve(quantity) => {
                        stock::reserve(conn, item.pet_product_id, quantity).await?
                    }
                    StockChange::Release(quantity) => {
                        stock::release(conn, item.pet_product_id, quantity).await?
                    }
                    StockChange::Unchanged => {}
                }

                let updated: OrderItemEntity = diesel::update(order_items::table.find(id))
                    .set((
                        order_items::quantity.eq(body.quantity),
                        order_items::updated_at.eq(diesel::dsl::now),
                    ))
                    .returning(OrderItemEntity::as_returning())
                    .get_result(conn)
                    .await?;
                let order = stock::recompute_order_total(conn, updated.order_id).await?;

                Ok::<(OrderItemRes, StockChange), AppError>((
                    OrderItemRes {
                        item: updated,
                        order_total: order.total_amount,
                    },
                    change,
                ))
            })
        })
        .await?;

    info!(item_id = id, ?change, "Order item quantity changed");

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Updated order item successfully"),
    })
}

/// Remove an item from a pending, unpaid order and return it to stock.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Order Items"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order item ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted order item successfully", body = StdResponse<OrderItemRes, String>)
    )
)]
async fn delete_order_item(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let item = load_item(conn, id).await?;
    editable_order(conn, &user, item.order_id).await?;
    let order_id = item.order_id;

    let deleted = conn
        .transaction(move |conn| {
            Box::pin(async move {
                lock_editable_order(conn, order_id).await?;
                let deleted: OrderItemEntity = diesel::delete(order_items::table.find(id))
                    .returning(OrderItemEntity::as_returning())
                    .get_result(conn)
                    .await?;
                stock::release(conn, deleted.pet_product_id, deleted.quantity).await?;
                let order = stock::recompute_order_total(conn, deleted.order_id).await?;

                Ok::<OrderItemRes, AppError>(OrderItemRes {
                    item: deleted,
                    order_total: order.total_amount,
                })
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(deleted),
        message: Some("Deleted order item successfully"),
    })
}
