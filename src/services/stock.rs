//! Product stock movements and order total bookkeeping.

use diesel::{ExpressionMethods, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::{
    domain::order_flow::{OrderFlowError, order_total},
    infra::app_error::AppError,
    models::{OrderEntity, OrderItemEntity, PetProductEntity},
    schema::{order_items, orders, pet_products},
};

/// Takes `quantity` units out of stock. The guarded update makes the check and
/// the decrement a single statement, so concurrent buyers cannot oversell.
pub async fn reserve(
    conn: &mut AsyncPgConnection,
    product_id: i32,
    quantity: i32,
) -> Result<(), AppError> {
    let updated = diesel::update(
        pet_products::table
            .find(product_id)
            .filter(pet_products::stock.ge(quantity)),
    )
    .set((
        pet_products::stock.eq(pet_products::stock - quantity),
        pet_products::updated_at.eq(diesel::dsl::now),
    ))
    .execute(conn)
    .await?;

    if updated == 1 {
        return Ok(());
    }

    let product: PetProductEntity = pet_products::table
        .find(product_id)
        .select(PetProductEntity::as_select())
        .get_result(conn)
        .await?;

    Err(OrderFlowError::InsufficientStock {
        product: product.name,
        requested: quantity,
        available: product.stock,
    }
    .into())
}

/// Loads the order and holds its row lock until the surrounding transaction
/// ends. Flows that move stock for an existing order take this lock first so
/// they serialize with cancellation, payment and deletion of that order.
pub async fn lock_order(
    conn: &mut AsyncPgConnection,
    order_id: i32,
) -> QueryResult<OrderEntity> {
    orders::table
        .find(order_id)
        .select(OrderEntity::as_select())
        .for_update()
        .get_result(conn)
        .await
}

/// Puts `quantity` units back into stock.
pub async fn release(
    conn: &mut AsyncPgConnection,
    product_id: i32,
    quantity: i32,
) -> QueryResult<()> {
    diesel::update(pet_products::table.find(product_id))
        .set((
            pet_products::stock.eq(pet_products::stock + quantity),
            pet_products::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)
        .await?;
    Ok(())
}

/// Returns every item of the order to stock. Used on cancellation and on
/// deleting a still-pending order.
pub async fn restore_order_stock(conn: &mut AsyncPgConnection, order_id: i32) -> QueryResult<()> {
    let items: Vec<OrderItemEntity> = order_items::table
        .filter(order_items::order_id.eq(order_id))
        .select(OrderItemEntity::as_select())
        .get_results(conn)
        .await?;

    for item in &items {
        release(conn, item.pet_product_id, item.quantity).await?;
    }
    Ok(())
}

/// Recomputes `orders.total_amount` from the unit-price snapshots of its items.
pub async fn recompute_order_total(
    conn: &mut AsyncPgConnection,
    order_id: i32,
) -> QueryResult<OrderEntity> {
    let items: Vec<OrderItemEntity> = order_items::table
        .filter(order_items::order_id.eq(order_id))
        .select(OrderItemEntity::as_select())
        .get_results(conn)
        .await?;

    let total = order_total(items.iter().map(|item| (item.quantity, item.unit_price)));

    diesel::update(orders::table.find(order_id))
        .set((
            orders::total_amount.eq(total),
            orders::updated_at.eq(diesel::dsl::now),
        ))
        .returning(OrderEntity::as_returning())
        .get_result(conn)
        .await
}
