//! Database-backed tests for the appointment status flow.
//!
//! Skipped unless `PAWCARE_TEST_DATABASE_URL` points at a Postgres database.

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use serde_json::json;

use common::{
    TestDb, body_json, commit, json_auth, let_requests_block, open_transaction, seed, token_for,
};
use diesel::sql_types::Integer;
use diesel_async::RunQueryDsl;
use pawcare_api::domain::roles::Role;

struct Booking {
    id: i32,
    customer_token: String,
    vet_token: String,
}

/// A customer's pet booked with a vet, still pending.
async fn booking(db: &TestDb) -> Booking {
    let customer = seed::user(&db.pool, Role::Customer).await;
    let vet_user = seed::user(&db.pool, Role::Vet).await;
    let pet = seed::pet(&db.pool, customer).await;
    let vet = seed::vet_profile(&db.pool, vet_user).await;
    let customer_token = token_for(customer, Role::Customer);

    let response = json_auth(
        db.app.clone(),
        Method::POST,
        "/appointments",
        &customer_token,
        json!({
            "pet_id": pet,
            "vet_id": vet,
            "scheduled_at": (Utc::now() + Duration::days(3)).to_rfc3339(),
            "reason": "Vaccination"
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "pending");

    Booking {
        id: json["data"]["id"].as_i64().expect("appointment id") as i32,
        customer_token,
        vet_token: token_for(vet_user, Role::Vet),
    }
}

async fn set_status(db: &TestDb, token: &str, id: i32, status: &str) -> StatusCode {
    json_auth(
        db.app.clone(),
        Method::PATCH,
        &format!("/appointments/{id}"),
        token,
        json!({ "status": status }),
    )
    .await
    .status()
}

#[tokio::test]
async fn only_the_booked_vet_accepts_and_canceled_is_final() {
    let Some(db) = common::test_db().await else {
        return;
    };
    let booking = booking(&db).await;

    assert_eq!(
        set_status(&db, &booking.customer_token, booking.id, "accepted").await,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        set_status(&db, &booking.vet_token, booking.id, "accepted").await,
        StatusCode::OK
    );
    assert_eq!(
        set_status(&db, &booking.customer_token, booking.id, "canceled").await,
        StatusCode::OK
    );
    assert_eq!(
        set_status(&db, &booking.vet_token, booking.id, "accepted").await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(seed::appointment_status(&db.pool, booking.id).await, "canceled");
}

/// An accept validated against `pending` must not overwrite a cancel that
/// committed in the meantime.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn accept_losing_to_a_concurrent_cancel_is_a_conflict() {
    let Some(db) = common::test_db().await else {
        return;
    };
    let booking = booking(&db).await;

    let mut other = open_transaction(&db.url).await;
    diesel::sql_query("UPDATE appointments SET status = 'canceled' WHERE id = $1")
        .bind::<Integer, _>(booking.id)
        .execute(&mut other)
        .await
        .expect("appointment should update");

    let accept = tokio::spawn({
        let app = db.app.clone();
        let token = booking.vet_token.clone();
        let id = booking.id;
        async move {
            json_auth(
                app,
                Method::PATCH,
                &format!("/appointments/{id}"),
                &token,
                json!({ "status": "accepted" }),
            )
            .await
        }
    });
    let_requests_block().await;
    commit(other).await;

    let response = accept.await.expect("accept task");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        body_json(response).await["message"],
        "Appointment was changed by another request"
    );
    assert_eq!(seed::appointment_status(&db.pool, booking.id).await, "canceled");
}
