use chrono::{DateTime, NaiveDate, Utc};
use diesel::{
    Selectable,
    prelude::{Identifiable, Insertable, Queryable},
};
use serde::Serialize;
use utoipa::ToSchema;

// Pets

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::pets)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PetEntity {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub species: String,
    pub breed: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub weight: Option<f64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::pets)]
pub struct NewPetEntity {
    pub user_id: i32,
    pub name: String,
    pub species: String,
    pub breed: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub weight: Option<f64>,
    pub notes: Option<String>,
}

// Medical logs

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::medical_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MedicalLogEntity {
    pub id: i32,
    pub user_id: i32,
    pub vet_id: Option<i32>,
    pub title: String,
    pub description: String,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    pub log_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::medical_logs)]
pub struct NewMedicalLogEntity {
    pub user_id: i32,
    pub vet_id: Option<i32>,
    pub title: String,
    pub description: String,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    pub log_date: NaiveDate,
}

/// Pivot row linking a medical log to one of its pets.
#[derive(Queryable, Selectable, Insertable, Serialize, Debug, Clone, Copy, ToSchema)]
#[diesel(table_name = crate::schema::medical_log_pet)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MedicalLogPetEntity {
    pub medical_log_id: i32,
    pub pet_id: i32,
}
