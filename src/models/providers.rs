use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{Identifiable, Insertable, Queryable},
};
use serde::Serialize;
use utoipa::ToSchema;

// Vets

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::vets)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct VetEntity {
    pub id: i32,
    pub user_id: i32,
    pub clinic_name: String,
    pub specialization: String,
    pub license_number: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::vets)]
pub struct NewVetEntity {
    pub user_id: i32,
    pub clinic_name: String,
    pub specialization: String,
    pub license_number: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_available: bool,
}

// Service providers

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::service_providers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ServiceProviderEntity {
    pub id: i32,
    pub user_id: i32,
    pub business_name: String,
    pub service_type: String,
    pub description: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::service_providers)]
pub struct NewServiceProviderEntity {
    pub user_id: i32,
    pub business_name: String,
    pub service_type: String,
    pub description: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_available: bool,
}
