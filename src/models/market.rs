use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{Identifiable, Insertable, Queryable},
};
use serde::Serialize;
use utoipa::ToSchema;

// Pet listings

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::pet_markets)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PetMarketEntity {
    pub id: i32,
    pub user_id: i32,
    pub pet_id: i32,
    pub listing_type: String,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::pet_markets)]
pub struct NewPetMarketEntity {
    pub user_id: i32,
    pub pet_id: i32,
    pub listing_type: String,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub is_available: bool,
}

// Categories

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CategoryEntity {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::categories)]
pub struct NewCategoryEntity {
    pub name: String,
    pub description: Option<String>,
}

// Products

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::pet_products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PetProductEntity {
    pub id: i32,
    pub user_id: i32,
    pub category_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::pet_products)]
pub struct NewPetProductEntity {
    pub user_id: i32,
    pub category_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub stock: i32,
}

// Reviews

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::reviews)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ReviewEntity {
    pub id: i32,
    pub user_id: i32,
    pub vet_id: Option<i32>,
    pub service_provider_id: Option<i32>,
    pub pet_product_id: Option<i32>,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::reviews)]
pub struct NewReviewEntity {
    pub user_id: i32,
    pub vet_id: Option<i32>,
    pub service_provider_id: Option<i32>,
    pub pet_product_id: Option<i32>,
    pub rating: i32,
    pub comment: Option<String>,
}
