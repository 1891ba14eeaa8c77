//! HTTP-level integration tests for authentication, authorization and
//! request validation.

mod common;

use assert_matches::assert_matches;
use axum::http::{Method, StatusCode};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::json;

use common::{TEST_SECRET, body_json, build_test_app, get, get_with_header, json_auth, token_for};
use pawcare_api::domain::roles::Role;
use pawcare_api::infra::auth::Claims;

fn signed(claims: &Claims) -> String {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("token should encode")
}

// ---------------------------------------------------------------------------
// Public endpoints
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_ok_with_version() {
    let response = get(build_test_app(), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn openapi_document_lists_resources_and_bearer_scheme() {
    let response = get(build_test_app(), "/api-docs/openapi.json").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["info"]["title"], "PawCare API");
    let paths = json["paths"].as_object().expect("paths should be an object");
    for path in ["/orders/{id}/pay", "/notifications/read-all", "/health"] {
        assert!(paths.contains_key(path), "missing path {path}");
    }
    assert!(paths.keys().any(|path| path.starts_with("/pets")));
    assert_matches!(
        json["components"]["securitySchemes"]["bearerAuth"]["scheme"].as_str(),
        Some("bearer")
    );
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let response = get(build_test_app(), "/this-route-does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_authorization_header_is_rejected() {
    let response = get(build_test_app(), "/pets").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Missing Authorization header");
}

#[tokio::test]
async fn non_bearer_scheme_is_rejected() {
    let response = get_with_header(build_test_app(), "/pets", "Basic dXNlcjpwYXNz").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(
        json["message"],
        "Invalid Authorization format. Expected: Bearer <token>"
    );
}

#[tokio::test]
async fn garbage_token_is_rejected() {
    let response = get_with_header(build_test_app(), "/orders", "Bearer not.a.jwt").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Invalid or expired token");
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let now = Utc::now().timestamp();
    let token = signed(&Claims {
        sub: 1,
        role: "customer".into(),
        iat: now - 7200,
        exp: now - 3600,
    });

    let response =
        get_with_header(build_test_app(), "/carts", &format!("Bearer {token}")).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Invalid or expired token");
}

#[tokio::test]
async fn token_with_unknown_role_is_rejected() {
    let now = Utc::now().timestamp();
    let token = signed(&Claims {
        sub: 1,
        role: "groomer".into(),
        iat: now,
        exp: now + 3600,
    });

    let response =
        get_with_header(build_test_app(), "/vets", &format!("Bearer {token}")).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Token carries an unknown role");
}

// ---------------------------------------------------------------------------
// Role checks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn customers_cannot_manage_catalog_or_send_notifications() {
    let token = token_for(5, Role::Customer);
    let cases = [
        (
            Method::POST,
            "/categories",
            json!({ "name": "Toys" }),
        ),
        (
            Method::POST,
            "/pet-products",
            json!({ "category_id": 1, "name": "Ball", "price": 4.5, "stock": 10 }),
        ),
        (
            Method::POST,
            "/vets",
            json!({
                "clinic_name": "Happy Paws",
                "specialization": "Surgery",
                "license_number": "VET-001"
            }),
        ),
        (
            Method::POST,
            "/notifications",
            json!({ "user_id": 2, "title": "Hi", "message": "Hello" }),
        ),
        (
            Method::PATCH,
            "/emergency-shelters/1",
            json!({ "status": "approved" }),
        ),
    ];

    for (method, uri, body) in cases {
        let response = json_auth(build_test_app(), method.clone(), uri, &token, body).await;
        assert_eq!(
            response.status(),
            StatusCode::FORBIDDEN,
            "{method} {uri} should be forbidden"
        );
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_pet_name_is_a_field_error() {
    let token = token_for(5, Role::Customer);
    let response = json_auth(
        build_test_app(),
        Method::POST,
        "/pets",
        &token,
        json!({ "name": "", "species": "cat" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["message"], "The given data was invalid.");
    assert_eq!(json["errors"]["name"][0], "The name field is required.");
}

#[tokio::test]
async fn missing_required_field_is_reported_on_body() {
    let token = token_for(5, Role::Customer);
    let response = json_auth(
        build_test_app(),
        Method::POST,
        "/pets",
        &token,
        json!({ "name": "Milo" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert!(json["errors"]["body"].is_array());
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let token = token_for(5, Role::Customer);
    let response = common::raw_auth(
        build_test_app(),
        Method::POST,
        "/pets",
        &token,
        "{\"name\": ".to_string(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sale_listing_requires_a_price() {
    let token = token_for(5, Role::Customer);
    let response = json_auth(
        build_test_app(),
        Method::POST,
        "/pet-markets",
        &token,
        json!({ "pet_id": 1, "listing_type": "sale" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert!(json["errors"]["price"].is_array());
}

#[tokio::test]
async fn unknown_listing_type_is_rejected() {
    let token = token_for(5, Role::Customer);
    let response = json_auth(
        build_test_app(),
        Method::POST,
        "/pet-markets",
        &token,
        json!({ "pet_id": 1, "listing_type": "auction", "price": 10.0 }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert!(json["errors"]["listing_type"].is_array());
}

#[tokio::test]
async fn review_needs_exactly_one_target() {
    let token = token_for(5, Role::Customer);
    let response = json_auth(
        build_test_app(),
        Method::POST,
        "/reviews",
        &token,
        json!({ "vet_id": 1, "pet_product_id": 2, "rating": 4 }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert!(json["errors"]["target"].is_array());
}

#[tokio::test]
async fn review_rating_must_be_between_one_and_five() {
    let token = token_for(5, Role::Customer);
    let response = json_auth(
        build_test_app(),
        Method::POST,
        "/reviews",
        &token,
        json!({ "vet_id": 1, "rating": 6 }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["errors"]["rating"][0], "The rating must be between 1 and 5.");
}

#[tokio::test]
async fn appointment_cannot_book_vet_and_provider_together() {
    let token = token_for(5, Role::Customer);
    let scheduled_at = (Utc::now() + chrono::Duration::days(2)).to_rfc3339();
    let response = json_auth(
        build_test_app(),
        Method::POST,
        "/appointments",
        &token,
        json!({
            "pet_id": 1,
            "vet_id": 1,
            "service_provider_id": 1,
            "scheduled_at": scheduled_at
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert!(json["errors"]["provider"].is_array());
}

#[tokio::test]
async fn appointment_in_the_past_is_rejected() {
    let token = token_for(5, Role::Customer);
    let scheduled_at = (Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
    let response = json_auth(
        build_test_app(),
        Method::POST,
        "/appointments",
        &token,
        json!({ "pet_id": 1, "vet_id": 1, "scheduled_at": scheduled_at }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert!(json["errors"]["scheduled_at"].is_array());
}

#[tokio::test]
async fn unknown_payment_method_is_rejected() {
    let token = token_for(5, Role::Customer);
    let response = json_auth(
        build_test_app(),
        Method::POST,
        "/orders/1/pay",
        &token,
        json!({ "payment_method": "barter" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert!(json["errors"]["payment_method"].is_array());
}

#[tokio::test]
async fn cart_quantity_must_be_positive() {
    let token = token_for(5, Role::Customer);
    let response = json_auth(
        build_test_app(),
        Method::POST,
        "/carts",
        &token,
        json!({ "pet_product_id": 1, "quantity": 0 }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert!(json["errors"]["quantity"].is_array());
}

#[tokio::test]
async fn medical_log_needs_at_least_one_pet() {
    let token = token_for(9, Role::Vet);
    let response = json_auth(
        build_test_app(),
        Method::POST,
        "/medical-logs",
        &token,
        json!({
            "pet_ids": [],
            "title": "Checkup",
            "description": "Annual checkup",
            "log_date": "2025-06-01"
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["errors"]["pet_ids"][0], "Select at least one pet.");
}
