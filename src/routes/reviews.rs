use anyhow::Context;
use axum::{
    Extension,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use diesel::{
    AsChangeset, ExpressionMethods, QueryDsl, QueryResult, SelectableHelper, dsl::exists, select,
};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use validator::Validate;

use crate::{
    domain::market::ReviewTarget,
    infra::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        auth::AuthUser,
        validation::ValidatedJson,
    },
    models::{NewReviewEntity, ReviewEntity},
    schema::{pet_products, reviews, service_providers, vets},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/reviews",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_reviews, create_review))
            .routes(utoipa_axum::routes!(get_review, update_review, delete_review)),
    )
}

async fn target_exists(
    conn: &mut AsyncPgConnection,
    target: ReviewTarget,
) -> QueryResult<bool> {
    match target {
        ReviewTarget::Vet(id) => select(exists(vets::table.find(id))).get_result(conn).await,
        ReviewTarget::ServiceProvider(id) => {
            select(exists(service_providers::table.find(id)))
                .get_result(conn)
                .await
        }
        ReviewTarget::PetProduct(id) => {
            select(exists(pet_products::table.find(id)))
                .get_result(conn)
                .await
        }
    }
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct ReviewFilter {
    vet_id: Option<i32>,
    service_provider_id: Option<i32>,
    pet_product_id: Option<i32>,
}

/// List reviews, optionally for one vet, provider or product.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Reviews"],
    security(("bearerAuth" = [])),
    params(ReviewFilter),
    responses(
        (status = 200, description = "List reviews", body = StdResponse<Vec<ReviewEntity>, String>)
    )
)]
async fn get_reviews(
    State(state): State<AppState>,
    Query(filter): Query<ReviewFilter>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut query = reviews::table
        .select(ReviewEntity::as_select())
        .order_by(reviews::created_at.desc())
        .into_boxed();
    if let Some(vet_id) = filter.vet_id {
        query = query.filter(reviews::vet_id.eq(vet_id));
    }
    if let Some(service_provider_id) = filter.service_provider_id {
        query = query.filter(reviews::service_provider_id.eq(service_provider_id));
    }
    if let Some(pet_product_id) = filter.pet_product_id {
        query = query.filter(reviews::pet_product_id.eq(pet_product_id));
    }

    let reviews: Vec<ReviewEntity> = query.load(conn).await.context("Failed to get reviews")?;

    Ok(StdResponse {
        data: Some(reviews),
        message: Some("Get reviews successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema)]
struct CreateReviewReq {
    vet_id: Option<i32>,
    service_provider_id: Option<i32>,
    pet_product_id: Option<i32>,
    #[validate(range(min = 1, max = 5, message = "The rating must be between 1 and 5."))]
    rating: i32,
    #[validate(length(max = 2000))]
    comment: Option<String>,
}

/// Review a vet, a service provider or a product. One review per target.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Reviews"],
    security(("bearerAuth" = [])),
    request_body = CreateReviewReq,
    responses(
        (status = 201, description = "Created review successfully", body = StdResponse<ReviewEntity, String>),
        (status = 409, description = "Already reviewed", body = crate::infra::app_error::ErrorBody),
        (status = 422, description = "Validation failed", body = crate::infra::app_error::ErrorBody)
    )
)]
async fn create_review(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<CreateReviewReq>,
) -> Result<impl IntoResponse, AppError> {
    let target =
        ReviewTarget::from_ids(body.vet_id, body.service_provider_id, body.pet_product_id)?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    if !target_exists(conn, target).await? {
        return Err(AppError::field(
            target.field(),
            "The selected review target does not exist.",
        ));
    }

    let review: ReviewEntity = diesel::insert_into(reviews::table)
        .values(NewReviewEntity {
            user_id: user.user_id,
            vet_id: body.vet_id,
            service_provider_id: body.service_provider_id,
            pet_product_id: body.pet_product_id,
            rating: body.rating,
            comment: body.comment,
        })
        .returning(ReviewEntity::as_returning())
        .get_result(conn)
        .await?;

    info!(
        review_id = review.id,
        target = ?target,
        rating = review.rating,
        "Review created"
    );

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(review),
            message: Some("Created review successfully"),
        },
    ))
}

/// Fetch a review.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Reviews"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Review ID to fetch")
    ),
    responses(
        (status = 200, description = "Get review successfully", body = StdResponse<ReviewEntity, String>)
    )
)]
async fn get_review(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let review: ReviewEntity = reviews::table
        .find(id)
        .select(ReviewEntity::as_select())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(review),
        message: Some("Get review successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema, AsChangeset)]
#[diesel(table_name = crate::schema::reviews)]
struct UpdateReviewReq {
    #[validate(range(min = 1, max = 5, message = "The rating must be between 1 and 5."))]
    rating: Option<i32>,
    #[validate(length(max = 2000))]
    comment: Option<String>,
}

/// Edit a review's rating or comment. The target cannot change.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Reviews"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Review ID to update")
    ),
    request_body = UpdateReviewReq,
    responses(
        (status = 200, description = "Updated review successfully", body = StdResponse<ReviewEntity, String>)
    )
)]
async fn update_review(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<UpdateReviewReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let review: ReviewEntity = reviews::table
        .find(id)
        .select(ReviewEntity::as_select())
        .get_result(conn)
        .await?;
    user.ensure_owner(review.user_id, "review")?;

    let updated: ReviewEntity = diesel::update(reviews::table.find(id))
        .set((&body, reviews::updated_at.eq(diesel::dsl::now)))
        .returning(ReviewEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Updated review successfully"),
    })
}

/// Delete a review.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Reviews"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Review ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted review successfully", body = StdResponse<ReviewEntity, String>)
    )
)]
async fn delete_review(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let review: ReviewEntity = reviews::table
        .find(id)
        .select(ReviewEntity::as_select())
        .get_result(conn)
        .await?;
    user.ensure_owner(review.user_id, "review")?;

    let deleted: ReviewEntity = diesel::delete(reviews::table.find(id))
        .returning(ReviewEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(deleted),
        message: Some("Deleted review successfully"),
    })
}
