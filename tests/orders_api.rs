//! Database-backed tests for checkout, order status changes, payment and
//! order item edits, including the stock bookkeeping around them.
//!
//! Skipped unless `PAWCARE_TEST_DATABASE_URL` points at a Postgres database.

mod common;

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use common::{
    TestDb, body_json, commit, json_auth, let_requests_block, open_transaction, seed, send_auth,
    token_for,
};
use diesel::sql_types::Integer;
use diesel_async::RunQueryDsl;
use pawcare_api::domain::roles::Role;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A customer and a seller with two products: Kibble (10.00, stock 5) and
/// Toy (2.50, stock 5).
struct Shop {
    customer: i32,
    token: String,
    kibble: i32,
    toy: i32,
}

async fn shop(db: &TestDb) -> Shop {
    let customer = seed::user(&db.pool, Role::Customer).await;
    let seller = seed::user(&db.pool, Role::ServiceProvider).await;
    Shop {
        customer,
        token: token_for(customer, Role::Customer),
        kibble: seed::product(&db.pool, seller, "Kibble", 10.0, 5).await,
        toy: seed::product(&db.pool, seller, "Toy", 2.5, 5).await,
    }
}

async fn add_to_cart(db: &TestDb, token: &str, product_id: i32, quantity: i32) {
    let response = json_auth(
        db.app.clone(),
        Method::POST,
        "/carts",
        token,
        json!({ "pet_product_id": product_id, "quantity": quantity }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

/// Fills the cart and checks out, returning the created order.
async fn checkout(db: &TestDb, token: &str, lines: &[(i32, i32)]) -> Value {
    for &(product_id, quantity) in lines {
        add_to_cart(db, token, product_id, quantity).await;
    }
    let response = json_auth(
        db.app.clone(),
        Method::POST,
        "/orders",
        token,
        json!({ "shipping_address": "1 Bark Street" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

fn order_id(order: &Value) -> i32 {
    order["id"].as_i64().expect("order id") as i32
}

fn item_for(order: &Value, product_id: i32) -> i32 {
    order["items"]
        .as_array()
        .expect("items")
        .iter()
        .find(|item| item["pet_product_id"] == product_id)
        .and_then(|item| item["id"].as_i64())
        .expect("item for product") as i32
}

async fn set_status(db: &TestDb, token: &str, order_id: i32, status: &str) -> StatusCode {
    json_auth(
        db.app.clone(),
        Method::PATCH,
        &format!("/orders/{order_id}"),
        token,
        json!({ "status": status }),
    )
    .await
    .status()
}

async fn pay(db: &TestDb, token: &str, order_id: i32) -> StatusCode {
    json_auth(
        db.app.clone(),
        Method::POST,
        &format!("/orders/{order_id}/pay"),
        token,
        json!({ "payment_method": "card" }),
    )
    .await
    .status()
}

// ---------------------------------------------------------------------------
// Checkout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn checkout_decrements_stock_and_clears_the_cart() {
    let Some(db) = common::test_db().await else {
        return;
    };
    let shop = shop(&db).await;

    let order = checkout(&db, &shop.token, &[(shop.kibble, 2), (shop.toy, 3)]).await;

    assert_eq!(order["status"], "pending");
    assert_eq!(order["payment_status"], "unpaid");
    assert_eq!(order["total_amount"], 27.5);
    assert_eq!(order["items"].as_array().map(Vec::len), Some(2));
    assert_eq!(seed::stock_of(&db.pool, shop.kibble).await, 3);
    assert_eq!(seed::stock_of(&db.pool, shop.toy).await, 2);

    let response = send_auth(db.app.clone(), Method::GET, "/carts", &shop.token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cart = body_json(response).await;
    assert_eq!(cart["data"]["lines"], json!([]));
    assert_eq!(cart["data"]["total"], 0.0);
}

#[tokio::test]
async fn checkout_with_insufficient_stock_changes_nothing() {
    let Some(db) = common::test_db().await else {
        return;
    };
    let shop = shop(&db).await;
    add_to_cart(&db, &shop.token, shop.kibble, 1).await;
    add_to_cart(&db, &shop.token, shop.toy, 3).await;
    // Stock drops after the items were carted.
    seed::set_stock(&db.pool, shop.toy, 1).await;

    let response = json_auth(
        db.app.clone(),
        Method::POST,
        "/orders",
        &shop.token,
        json!({}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    let message = json["message"].as_str().expect("message");
    assert!(message.contains("Toy"), "message should name the product: {message}");

    assert_eq!(seed::order_count(&db.pool, shop.customer).await, 0);
    assert_eq!(seed::stock_of(&db.pool, shop.kibble).await, 5);
    assert_eq!(seed::stock_of(&db.pool, shop.toy).await, 1);
    let response = send_auth(db.app.clone(), Method::GET, "/carts", &shop.token).await;
    let cart = body_json(response).await;
    assert_eq!(cart["data"]["lines"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn empty_cart_cannot_be_checked_out() {
    let Some(db) = common::test_db().await else {
        return;
    };
    let shop = shop(&db).await;

    let response = json_auth(db.app.clone(), Method::POST, "/orders", &shop.token, json!({})).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], "Your cart is empty");
}

// ---------------------------------------------------------------------------
// Status changes and payment
// ---------------------------------------------------------------------------

#[tokio::test]
async fn canceling_restores_stock_once() {
    let Some(db) = common::test_db().await else {
        return;
    };
    let shop = shop(&db).await;
    let order = checkout(&db, &shop.token, &[(shop.kibble, 2), (shop.toy, 1)]).await;
    let id = order_id(&order);

    assert_eq!(set_status(&db, &shop.token, id, "canceled").await, StatusCode::OK);
    assert_eq!(seed::stock_of(&db.pool, shop.kibble).await, 5);
    assert_eq!(seed::stock_of(&db.pool, shop.toy).await, 5);

    assert_eq!(
        set_status(&db, &shop.token, id, "canceled").await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(seed::stock_of(&db.pool, shop.kibble).await, 5);
}

#[tokio::test]
async fn delivery_requires_payment() {
    let Some(db) = common::test_db().await else {
        return;
    };
    let shop = shop(&db).await;
    let id = order_id(&checkout(&db, &shop.token, &[(shop.kibble, 1)]).await);

    assert_eq!(
        set_status(&db, &shop.token, id, "delivered").await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(pay(&db, &shop.token, id).await, StatusCode::OK);
    assert_eq!(pay(&db, &shop.token, id).await, StatusCode::BAD_REQUEST);
    assert_eq!(set_status(&db, &shop.token, id, "delivered").await, StatusCode::OK);

    let (status, payment, _) = seed::order_row(&db.pool, id).await;
    assert_eq!((status.as_str(), payment.as_str()), ("delivered", "paid"));
}

#[tokio::test]
async fn only_the_buyer_or_an_admin_may_change_an_order() {
    let Some(db) = common::test_db().await else {
        return;
    };
    let shop = shop(&db).await;
    let id = order_id(&checkout(&db, &shop.token, &[(shop.toy, 2)]).await);

    let stranger = seed::user(&db.pool, Role::Customer).await;
    let stranger_token = token_for(stranger, Role::Customer);
    assert_eq!(
        set_status(&db, &stranger_token, id, "canceled").await,
        StatusCode::FORBIDDEN
    );
    assert_eq!(pay(&db, &stranger_token, id).await, StatusCode::FORBIDDEN);

    let admin = seed::user(&db.pool, Role::Admin).await;
    let admin_token = token_for(admin, Role::Admin);
    assert_eq!(set_status(&db, &admin_token, id, "canceled").await, StatusCode::OK);
    assert_eq!(seed::stock_of(&db.pool, shop.toy).await, 5);
}

#[tokio::test]
async fn deleting_a_pending_order_restores_stock() {
    let Some(db) = common::test_db().await else {
        return;
    };
    let shop = shop(&db).await;
    let id = order_id(&checkout(&db, &shop.token, &[(shop.kibble, 4)]).await);
    assert_eq!(seed::stock_of(&db.pool, shop.kibble).await, 1);

    let response = send_auth(
        db.app.clone(),
        Method::DELETE,
        &format!("/orders/{id}"),
        &shop.token,
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(seed::stock_of(&db.pool, shop.kibble).await, 5);
    assert_eq!(seed::order_count(&db.pool, shop.customer).await, 0);
}

// ---------------------------------------------------------------------------
// Order items
// ---------------------------------------------------------------------------

#[tokio::test]
async fn items_of_a_paid_order_cannot_change() {
    let Some(db) = common::test_db().await else {
        return;
    };
    let shop = shop(&db).await;
    let order = checkout(&db, &shop.token, &[(shop.kibble, 1)]).await;
    let id = order_id(&order);
    let kibble_item = item_for(&order, shop.kibble);
    assert_eq!(pay(&db, &shop.token, id).await, StatusCode::OK);

    let added = json_auth(
        db.app.clone(),
        Method::POST,
        "/order-items",
        &shop.token,
        json!({ "order_id": id, "pet_product_id": shop.toy, "quantity": 3 }),
    )
    .await;
    assert_eq!(added.status(), StatusCode::BAD_REQUEST);

    let resized = json_auth(
        db.app.clone(),
        Method::PATCH,
        &format!("/order-items/{kibble_item}"),
        &shop.token,
        json!({ "quantity": 2 }),
    )
    .await;
    assert_eq!(resized.status(), StatusCode::BAD_REQUEST);

    let removed = send_auth(
        db.app.clone(),
        Method::DELETE,
        &format!("/order-items/{kibble_item}"),
        &shop.token,
    )
    .await;
    assert_eq!(removed.status(), StatusCode::BAD_REQUEST);

    let (_, payment, total) = seed::order_row(&db.pool, id).await;
    assert_eq!(payment, "paid");
    assert_eq!(total, 10.0);
    assert_eq!(seed::stock_of(&db.pool, shop.kibble).await, 4);
    assert_eq!(seed::stock_of(&db.pool, shop.toy).await, 5);
}

#[tokio::test]
async fn item_edits_move_stock_and_recompute_the_total() {
    let Some(db) = common::test_db().await else {
        return;
    };
    let shop = shop(&db).await;
    let order = checkout(&db, &shop.token, &[(shop.kibble, 1)]).await;
    let id = order_id(&order);

    let added = json_auth(
        db.app.clone(),
        Method::POST,
        "/order-items",
        &shop.token,
        json!({ "order_id": id, "pet_product_id": shop.toy, "quantity": 2 }),
    )
    .await;
    assert_eq!(added.status(), StatusCode::CREATED);
    let added = body_json(added).await;
    assert_eq!(added["data"]["order_total"], 15.0);
    let toy_item = added["data"]["item"]["id"].as_i64().expect("item id");
    assert_eq!(seed::stock_of(&db.pool, shop.toy).await, 3);

    let shrunk = json_auth(
        db.app.clone(),
        Method::PATCH,
        &format!("/order-items/{toy_item}"),
        &shop.token,
        json!({ "quantity": 1 }),
    )
    .await;
    assert_eq!(shrunk.status(), StatusCode::OK);
    assert_eq!(body_json(shrunk).await["data"]["order_total"], 12.5);
    assert_eq!(seed::stock_of(&db.pool, shop.toy).await, 4);

    let too_many = json_auth(
        db.app.clone(),
        Method::PATCH,
        &format!("/order-items/{toy_item}"),
        &shop.token,
        json!({ "quantity": 9 }),
    )
    .await;
    assert_eq!(too_many.status(), StatusCode::BAD_REQUEST);
    assert_eq!(seed::stock_of(&db.pool, shop.toy).await, 4);
}

// ---------------------------------------------------------------------------
// Concurrent changes
// ---------------------------------------------------------------------------

/// An item removal blocked behind another session races a cancel of the same
/// order. Whatever the interleaving, each unit goes back to stock once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn item_removal_racing_a_cancel_restocks_once() {
    let Some(db) = common::test_db().await else {
        return;
    };
    let shop = shop(&db).await;
    let order = checkout(&db, &shop.token, &[(shop.kibble, 1), (shop.toy, 2)]).await;
    let id = order_id(&order);
    let toy_item = item_for(&order, shop.toy);
    assert_eq!(seed::stock_of(&db.pool, shop.toy).await, 3);

    let mut blocker = open_transaction(&db.url).await;
    diesel::sql_query("SELECT id FROM order_items WHERE id = $1 FOR UPDATE")
        .bind::<Integer, _>(toy_item)
        .execute(&mut blocker)
        .await
        .expect("item row should lock");

    let removal = tokio::spawn({
        let app = db.app.clone();
        let token = shop.token.clone();
        async move {
            send_auth(app, Method::DELETE, &format!("/order-items/{toy_item}"), &token)
                .await
                .status()
        }
    });
    let_requests_block().await;

    let cancel = tokio::spawn({
        let app = db.app.clone();
        let token = shop.token.clone();
        async move {
            json_auth(
                app,
                Method::PATCH,
                &format!("/orders/{id}"),
                &token,
                json!({ "status": "canceled" }),
            )
            .await
            .status()
        }
    });
    let_requests_block().await;

    commit(blocker).await;
    let removal = removal.await.expect("removal task");
    let cancel = cancel.await.expect("cancel task");

    assert_eq!(removal, StatusCode::OK);
    assert_eq!(cancel, StatusCode::OK);
    assert_eq!(seed::stock_of(&db.pool, shop.toy).await, 5);
    assert_eq!(seed::stock_of(&db.pool, shop.kibble).await, 5);
}

/// A payment that loses to a concurrent one reports a conflict.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn payment_losing_a_race_is_a_conflict() {
    let Some(db) = common::test_db().await else {
        return;
    };
    let shop = shop(&db).await;
    let id = order_id(&checkout(&db, &shop.token, &[(shop.kibble, 1)]).await);

    let mut other = open_transaction(&db.url).await;
    diesel::sql_query("UPDATE orders SET payment_status = 'paid' WHERE id = $1")
        .bind::<Integer, _>(id)
        .execute(&mut other)
        .await
        .expect("order should update");

    let payment = tokio::spawn({
        let app = db.app.clone();
        let token = shop.token.clone();
        async move {
            json_auth(
                app,
                Method::POST,
                &format!("/orders/{id}/pay"),
                &token,
                json!({ "payment_method": "wallet" }),
            )
            .await
        }
    });
    let_requests_block().await;
    commit(other).await;

    let response = payment.await.expect("payment task");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        body_json(response).await["message"],
        "Order was changed by another request"
    );
}

/// Deleting a pending order while a cancel holds it must not restock twice.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn delete_after_a_concurrent_cancel_is_a_conflict() {
    let Some(db) = common::test_db().await else {
        return;
    };
    let shop = shop(&db).await;
    let id = order_id(&checkout(&db, &shop.token, &[(shop.toy, 2)]).await);

    let mut other = open_transaction(&db.url).await;
    diesel::sql_query("UPDATE orders SET status = 'canceled' WHERE id = $1")
        .bind::<Integer, _>(id)
        .execute(&mut other)
        .await
        .expect("order should update");
    diesel::sql_query("UPDATE pet_products SET stock = stock + 2 WHERE id = $1")
        .bind::<Integer, _>(shop.toy)
        .execute(&mut other)
        .await
        .expect("stock should update");

    let deletion = tokio::spawn({
        let app = db.app.clone();
        let token = shop.token.clone();
        async move {
            send_auth(app, Method::DELETE, &format!("/orders/{id}"), &token)
                .await
                .status()
        }
    });
    let_requests_block().await;
    commit(other).await;

    assert_eq!(deletion.await.expect("deletion task"), StatusCode::CONFLICT);
    assert_eq!(seed::stock_of(&db.pool, shop.toy).await, 5);
}
