//! Rows the HTTP flows need but do not create themselves: users, catalog
//! entries, pets and vet profiles. Every name is unique so tests can share
//! one database and run in parallel.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;

use pawcare_api::domain::roles::Role;
use pawcare_api::infra::db::DbPool;
use pawcare_api::schema::{appointments, categories, orders, pet_products, pets, users, vets};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

pub fn unique(label: &str) -> String {
    format!(
        "{label}-{}-{}-{}",
        std::process::id(),
        Utc::now().timestamp_micros(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

pub async fn user(pool: &DbPool, role: Role) -> i32 {
    let conn = &mut pool.get().await.expect("connection");
    diesel::insert_into(users::table)
        .values((
            users::name.eq(unique(role.as_str())),
            users::email.eq(format!("{}@pawcare.test", unique(role.as_str()))),
            users::role.eq(role.as_str()),
        ))
        .returning(users::id)
        .get_result(conn)
        .await
        .expect("user should insert")
}

/// A product in a fresh category, sold by `seller_id`.
pub async fn product(pool: &DbPool, seller_id: i32, name: &str, price: f64, stock: i32) -> i32 {
    let conn = &mut pool.get().await.expect("connection");
    let category_id: i32 = diesel::insert_into(categories::table)
        .values(categories::name.eq(unique("category")))
        .returning(categories::id)
        .get_result(conn)
        .await
        .expect("category should insert");

    diesel::insert_into(pet_products::table)
        .values((
            pet_products::user_id.eq(seller_id),
            pet_products::category_id.eq(category_id),
            pet_products::name.eq(name),
            pet_products::price.eq(price),
            pet_products::stock.eq(stock),
        ))
        .returning(pet_products::id)
        .get_result(conn)
        .await
        .expect("product should insert")
}

pub async fn stock_of(pool: &DbPool, product_id: i32) -> i32 {
    let conn = &mut pool.get().await.expect("connection");
    pet_products::table
        .find(product_id)
        .select(pet_products::stock)
        .get_result(conn)
        .await
        .expect("product should exist")
}

pub async fn set_stock(pool: &DbPool, product_id: i32, stock: i32) {
    let conn = &mut pool.get().await.expect("connection");
    diesel::update(pet_products::table.find(product_id))
        .set(pet_products::stock.eq(stock))
        .execute(conn)
        .await
        .expect("stock should update");
}

/// `(status, payment_status, total_amount)` of an order.
pub async fn order_row(pool: &DbPool, order_id: i32) -> (String, String, f64) {
    let conn = &mut pool.get().await.expect("connection");
    orders::table
        .find(order_id)
        .select((orders::status, orders::payment_status, orders::total_amount))
        .get_result(conn)
        .await
        .expect("order should exist")
}

pub async fn order_count(pool: &DbPool, user_id: i32) -> i64 {
    let conn = &mut pool.get().await.expect("connection");
    orders::table
        .filter(orders::user_id.eq(user_id))
        .count()
        .get_result(conn)
        .await
        .expect("orders should count")
}

pub async fn pet(pool: &DbPool, owner_id: i32) -> i32 {
    let conn = &mut pool.get().await.expect("connection");
    diesel::insert_into(pets::table)
        .values((
            pets::user_id.eq(owner_id),
            pets::name.eq("Milo"),
            pets::species.eq("cat"),
        ))
        .returning(pets::id)
        .get_result(conn)
        .await
        .expect("pet should insert")
}

pub async fn vet_profile(pool: &DbPool, user_id: i32) -> i32 {
    let conn = &mut pool.get().await.expect("connection");
    diesel::insert_into(vets::table)
        .values((
            vets::user_id.eq(user_id),
            vets::clinic_name.eq("Happy Paws"),
            vets::specialization.eq("General"),
            vets::license_number.eq(unique("VET")),
        ))
        .returning(vets::id)
        .get_result(conn)
        .await
        .expect("vet should insert")
}

pub async fn appointment_status(pool: &DbPool, appointment_id: i32) -> String {
    let conn = &mut pool.get().await.expect("connection");
    appointments::table
        .find(appointment_id)
        .select(appointments::status)
        .get_result(conn)
        .await
        .expect("appointment should exist")
}
