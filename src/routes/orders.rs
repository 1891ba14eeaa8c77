use std::collections::HashMap;

use anyhow::Context;
use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use diesel::{
    AsChangeset, ExpressionMethods, OptionalExtension, QueryDsl, QueryResult, SelectableHelper,
};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use validator::Validate;

use crate::{
    domain::order_flow::{
        self, CartLine, OrderStatus, PaymentMethod, PaymentStatus,
        validate_order_status, validate_payment_method,
    },
    infra::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        auth::AuthUser,
        validation::ValidatedJson,
    },
    models::{NewOrderEntity, NewOrderItemEntity, OrderEntity, OrderItemEntity},
    schema::{carts, order_items, orders, pet_products},
    services::{notifications, stock},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_orders, create_order))
            .routes(utoipa_axum::routes!(get_order, update_order, delete_order))
            .routes(utoipa_axum::routes!(pay_order)),
    )
}

#[derive(Serialize, ToSchema)]
struct OrderRes {
    #[serde(flatten)]
    order: OrderEntity,
    items: Vec<OrderItemEntity>,
}

async fn items_by_order(
    conn: &mut AsyncPgConnection,
    order_ids: &[i32],
) -> QueryResult<HashMap<i32, Vec<OrderItemEntity>>> {
    let items: Vec<OrderItemEntity> = order_items::table
        .filter(order_items::order_id.eq_any(order_ids))
        .select(OrderItemEntity::as_select())
        .order_by(order_items::id.asc())
        .load(conn)
        .await?;

    let mut group: HashMap<i32, Vec<OrderItemEntity>> = HashMap::new();
    for item in items {
        group.entry(item.order_id).or_default().push(item);
    }
    Ok(group)
}

async fn with_items(conn: &mut AsyncPgConnection, order: OrderEntity) -> QueryResult<OrderRes> {
    let items = items_by_order(conn, &[order.id])
        .await?
        .remove(&order.id)
        .unwrap_or_default();
    Ok(OrderRes { order, items })
}

async fn load_own_order(
    conn: &mut AsyncPgConnection,
    user: &AuthUser,
    id: i32,
) -> Result<OrderEntity, AppError> {
    let order: OrderEntity = orders::table
        .find(id)
        .select(OrderEntity::as_select())
        .get_result(conn)
        .await?;
    user.ensure_owner(order.user_id, "order")?;
    Ok(order)
}

fn order_state(order: &OrderEntity) -> anyhow::Result<(OrderStatus, PaymentStatus)> {
    let status: OrderStatus = order
        .status
        .parse()
        .context("Stored order status is invalid")?;
    let payment: PaymentStatus = order
        .payment_status
        .parse()
        .context("Stored payment status is invalid")?;
    Ok((status, payment))
}

/// List the caller's orders, newest first, each with its items.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "List orders", body = StdResponse<Vec<OrderRes>, String>)
    )
)]
async fn get_orders(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut query = orders::table
        .select(OrderEntity::as_select())
        .order_by(orders::created_at.desc())
        .then_order_by(orders::id.desc())
        .into_boxed();
    if !user.is_admin() {
        query = query.filter(orders::user_id.eq(user.user_id));
    }

    let orders: Vec<OrderEntity> = query.load(conn).await.context("Failed to get orders")?;

    let order_ids: Vec<i32> = orders.iter().map(|order| order.id).collect();
    let mut items = items_by_order(conn, &order_ids).await?;
    let orders: Vec<OrderRes> = orders
        .into_iter()
        .map(|order| OrderRes {
            items: items.remove(&order.id).unwrap_or_default(),
            order,
        })
        .collect();

    Ok(StdResponse {
        data: Some(orders),
        message: Some("Get orders successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema)]
struct CreateOrderReq {
    #[validate(length(max = 500))]
    shipping_address: Option<String>,
}

/// Check out the caller's cart.
///
/// Stock is checked and decremented, the order and its items are written, and
/// the cart is cleared in one transaction. Any shortfall rolls everything back.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    request_body = CreateOrderReq,
    responses(
        (status = 201, description = "Created order successfully", body = StdResponse<OrderRes, String>),
        (status = 400, description = "Empty cart or insufficient stock", body = crate::infra::app_error::ErrorBody)
    )
)]
async fn create_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<CreateOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let user_id = user.user_id;
    let order = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let lines: Vec<CartLine> = carts::table
                    .inner_join(pet_products::table)
                    .filter(carts::user_id.eq(user_id))
                    .order_by(carts::id.asc())
                    .select((
                        pet_products::id,
                        pet_products::name,
                        pet_products::price,
                        pet_products::stock,
                        carts::quantity,
                    ))
                    .load::<(i32, String, f64, i32, i32)>(conn)
                    .await?
                    .into_iter()
                    .map(
                        |(product_id, product_name, unit_price, stock, quantity)| CartLine {
                            product_id,
                            product_name,
                            unit_price,
                            stock,
                            quantity,
                        },
                    )
                    .collect();

                let plan = order_flow::plan_order(&lines)?;

                let order: OrderEntity = diesel::insert_into(orders::table)
                    .values(NewOrderEntity {
                        user_id,
                        total_amount: plan.total,
                        status: OrderStatus::Pending.as_str().into(),
                        payment_status: PaymentStatus::Unpaid.as_str().into(),
                        shipping_address: body.shipping_address,
                    })
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await?;

                let new_items: Vec<NewOrderItemEntity> = plan
                    .items
                    .iter()
                    .map(|item| NewOrderItemEntity {
                        order_id: order.id,
                        pet_product_id: item.product_id,
                        quantity: item.quantity,
                        unit_price: item.unit_price,
                    })
                    .collect();
                let items: Vec<OrderItemEntity> = diesel::insert_into(order_items::table)
                    .values(new_items)
                    .returning(OrderItemEntity::as_returning())
                    .get_results(conn)
                    .await?;

                for item in &plan.items {
                    stock::reserve(conn, item.product_id, item.quantity).await?;
                }

                diesel::delete(carts::table.filter(carts::user_id.eq(user_id)))
                    .execute(conn)
                    .await?;

                notifications::notify(
                    conn,
                    user_id,
                    "Order placed",
                    format!(
                        "Order #{} for {:.2} has been placed.",
                        order.id, order.total_amount
                    ),
                )
                .await?;

                Ok::<OrderRes, AppError>(OrderRes { order, items })
            })
        })
        .await?;

    info!(
        order_id = order.order.id,
        user_id,
        items = order.items.len(),
        total = order.order.total_amount,
        "Order created"
    );

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(order),
            message: Some("Created order successfully"),
        },
    ))
}

/// Fetch an order with its items.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to fetch")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<OrderRes, String>)
    )
)]
async fn get_order(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = load_own_order(conn, &user, id).await?;
    let order = with_items(conn, order).await?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Get order successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema)]
struct UpdateOrderReq {
    /// Only while the order is pending.
    #[validate(length(max = 500))]
    shipping_address: Option<String>,
    /// `canceled`, or `delivered` once paid.
    #[validate(custom(function = "validate_order_status"))]
    status: Option<String>,
}

#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::orders)]
struct OrderChanges {
    shipping_address: Option<String>,
    status: Option<String>,
}

/// Change the shipping address or move the order along.
///
/// Canceling returns every item to stock. Delivering requires payment.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to update")
    ),
    request_body = UpdateOrderReq,
    responses(
        (status = 200, description = "Updated order successfully", body = StdResponse<OrderRes, String>),
        (status = 400, description = "Invalid status transition", body = crate::infra::app_error::ErrorBody)
    )
)]
async fn update_order(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<UpdateOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = load_own_order(conn, &user, id).await?;
    let (current, payment) = order_state(&order)?;

    if body.shipping_address.is_some() {
        current.ensure_pending()?;
    }
    let next = match body.status.as_deref() {
        Some(raw) => {
            let requested: OrderStatus = raw.parse().context("Validated status failed to parse")?;
            Some(current.transition(requested, payment)?)
        }
        None => None,
    };

    let changes = OrderChanges {
        shipping_address: body.shipping_address,
        status: next.map(|status| status.as_str().to_string()),
    };
    let buyer_id = order.user_id;

    let updated = conn
        .transaction(move |conn| {
            Box::pin(async move {
                // Guard on the status we validated against so a concurrent change loses.
                let updated: OrderEntity = diesel::update(
                    orders::table
                        .find(id)
                        .filter(orders::status.eq(current.as_str())),
                )
                .set((&changes, orders::updated_at.eq(diesel::dsl::now)))
                .returning(OrderEntity::as_returning())
                .get_result(conn)
                .await
                .optional()?
                .ok_or_else(|| {
                    AppError::Conflict("Order was changed by another request".into())
                })?;

                if next == Some(OrderStatus::Canceled) {
                    stock::restore_order_stock(conn, id).await?;
                }

                if let Some(status) = next {
                    notifications::notify(
                        conn,
                        buyer_id,
                        format!("Order {status}"),
                        format!("Your order #{id} is now {status}."),
                    )
                    .await?;
                }

                Ok::<OrderRes, AppError>(with_items(conn, updated).await?)
            })
        })
        .await?;

    if let Some(status) = next {
        info!(
            order_id = id,
            from = %current,
            to = %status,
            user_id = user.user_id,
            "Order status changed"
        );
    }

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Updated order successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema)]
struct PayOrderReq {
    /// One of `cash_on_delivery`, `card`, `wallet`.
    #[validate(custom(function = "validate_payment_method"))]
    payment_method: String,
}

/// Settle a pending order.
#[utoipa::path(
    post,
    path = "/{id}/pay",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to pay")
    ),
    request_body = PayOrderReq,
    responses(
        (status = 200, description = "Paid order successfully", body = StdResponse<OrderRes, String>),
        (status = 400, description = "Order is not payable", body = crate::infra::app_error::ErrorBody),
        (status = 409, description = "Changed by another request", body = crate::infra::app_error::ErrorBody)
    )
)]
async fn pay_order(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<PayOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    let method: PaymentMethod = body
        .payment_method
        .parse()
        .context("Validated payment method failed to parse")?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = load_own_order(conn, &user, id).await?;
    let (status, payment) = order_state(&order)?;
    order_flow::ensure_payable(status, payment)?;
    let buyer_id = order.user_id;

    let paid = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let paid: OrderEntity = diesel::update(
                    orders::table
                        .find(id)
                        .filter(orders::status.eq(OrderStatus::Pending.as_str()))
                        .filter(orders::payment_status.eq(PaymentStatus::Unpaid.as_str())),
                )
                .set((
                    orders::payment_status.eq(PaymentStatus::Paid.as_str()),
                    orders::payment_method.eq(method.as_str()),
                    orders::updated_at.eq(diesel::dsl::now),
                ))
                .returning(OrderEntity::as_returning())
                .get_result(conn)
                .await
                .optional()?
                .ok_or_else(|| {
                    AppError::Conflict("Order was changed by another request".into())
                })?;

                notifications::notify(
                    conn,
                    buyer_id,
                    "Payment received",
                    format!(
                        "Payment of {:.2} for order #{id} was received.",
                        paid.total_amount
                    ),
                )
                .await?;

                Ok::<OrderRes, AppError>(with_items(conn, paid).await?)
            })
        })
        .await?;

    info!(
        order_id = id,
        method = method.as_str(),
        amount = paid.order.total_amount,
        "Order paid"
    );

    Ok(StdResponse {
        data: Some(paid),
        message: Some("Paid order successfully"),
    })
}

/// Delete an order. A pending order gives its stock back first.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted order successfully", body = StdResponse<OrderEntity, String>),
        (status = 409, description = "Changed by another request", body = crate::infra::app_error::ErrorBody)
    )
)]
async fn delete_order(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = load_own_order(conn, &user, id).await?;
    let (status, _) = order_state(&order)?;

    let deleted = conn
        .transaction(move |conn| {
            Box::pin(async move {
                // Under the row lock the status must still be the one we checked,
                // otherwise a concurrent cancel may already have restocked.
                let locked = stock::lock_order(conn, id).await?;
                if locked.status != status.as_str() {
                    return Err(AppError::Conflict(
                        "Order was changed by another request".into(),
                    ));
                }
                if status == OrderStatus::Pending {
                    stock::restore_order_stock(conn, id).await?;
                }

                let deleted: OrderEntity = diesel::delete(orders::table.find(id))
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await?;

                Ok::<OrderEntity, AppError>(deleted)
            })
        })
        .await?;

    info!(order_id = id, restocked = status == OrderStatus::Pending, "Order deleted");

    Ok(StdResponse {
        data: Some(deleted),
        message: Some("Deleted order successfully"),
    })
}
