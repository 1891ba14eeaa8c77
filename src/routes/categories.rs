use anyhow::Context;
use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use diesel::{AsChangeset, ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use validator::Validate;

use crate::{
    infra::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        auth::AuthUser,
        validation::ValidatedJson,
    },
    models::{CategoryEntity, NewCategoryEntity},
    schema::{categories, pet_products},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/categories",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_categories, create_category))
            .routes(utoipa_axum::routes!(
                get_category,
                update_category,
                delete_category
            )),
    )
}

/// List product categories.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Categories"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "List categories", body = StdResponse<Vec<CategoryEntity>, String>)
    )
)]
async fn get_categories(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let categories: Vec<CategoryEntity> = categories::table
        .select(CategoryEntity::as_select())
        .order_by(categories::name.asc())
        .load(conn)
        .await
        .context("Failed to get categories")?;

    Ok(StdResponse {
        data: Some(categories),
        message: Some("Get categories successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema)]
struct CreateCategoryReq {
    #[validate(length(min = 1, max = 255, message = "The name field is required."))]
    name: String,
    description: Option<String>,
}

/// Create a category. Admin only.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Categories"],
    security(("bearerAuth" = [])),
    request_body = CreateCategoryReq,
    responses(
        (status = 201, description = "Created category successfully", body = StdResponse<CategoryEntity, String>),
        (status = 403, description = "Not an admin", body = crate::infra::app_error::ErrorBody),
        (status = 409, description = "Name already taken", body = crate::infra::app_error::ErrorBody)
    )
)]
async fn create_category(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<CreateCategoryReq>,
) -> Result<impl IntoResponse, AppError> {
    user.ensure_admin()?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let category: CategoryEntity = diesel::insert_into(categories::table)
        .values(NewCategoryEntity {
            name: body.name,
            description: body.description,
        })
        .returning(CategoryEntity::as_returning())
        .get_result(conn)
        .await?;

    info!(category_id = category.id, name = %category.name, "Category created");

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(category),
            message: Some("Created category successfully"),
        },
    ))
}

/// Fetch a category.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Categories"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Category ID to fetch")
    ),
    responses(
        (status = 200, description = "Get category successfully", body = StdResponse<CategoryEntity, String>)
    )
)]
async fn get_category(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let category: CategoryEntity = categories::table
        .find(id)
        .select(CategoryEntity::as_select())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(category),
        message: Some("Get category successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema, AsChangeset)]
#[diesel(table_name = crate::schema::categories)]
struct UpdateCategoryReq {
    #[validate(length(min = 1, max = 255))]
    name: Option<String>,
    description: Option<String>,
}

/// Rename or describe a category. Admin only.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Categories"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Category ID to update")
    ),
    request_body = UpdateCategoryReq,
    responses(
        (status = 200, description = "Updated category successfully", body = StdResponse<CategoryEntity, String>)
    )
)]
async fn update_category(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<UpdateCategoryReq>,
) -> Result<impl IntoResponse, AppError> {
    user.ensure_admin()?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let updated: CategoryEntity = diesel::update(categories::table.find(id))
        .set((&body, categories::updated_at.eq(diesel::dsl::now)))
        .returning(CategoryEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Updated category successfully"),
    })
}

/// Delete a category. Categories still holding products are kept. Admin only.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Categories"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Category ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted category successfully", body = StdResponse<CategoryEntity, String>),
        (status = 409, description = "Category still has products", body = crate::infra::app_error::ErrorBody)
    )
)]
async fn delete_category(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    user.ensure_admin()?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let products: i64 = pet_products::table
        .filter(pet_products::category_id.eq(id))
        .count()
        .get_result(conn)
        .await?;
    if products > 0 {
        return Err(AppError::Conflict(format!(
            "Category still has {products} product(s)"
        )));
    }

    let deleted: CategoryEntity = diesel::delete(categories::table.find(id))
        .returning(CategoryEntity::as_returning())
        .get_result(conn)
        .await?;

    info!(category_id = id, "Category deleted");

    Ok(StdResponse {
        data: Some(deleted),
        message: Some("Deleted category successfully"),
    })
}
