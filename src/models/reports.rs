use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{Identifiable, Insertable, Queryable},
};
use serde::Serialize;
use utoipa::ToSchema;

// Lost pet reports

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::lost_pet_reports)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LostPetReportEntity {
    pub id: i32,
    pub user_id: i32,
    pub pet_id: Option<i32>,
    pub pet_name: String,
    pub description: Option<String>,
    pub last_seen_location: String,
    pub last_seen_at: DateTime<Utc>,
    pub contact_phone: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::lost_pet_reports)]
pub struct NewLostPetReportEntity {
    pub user_id: i32,
    pub pet_id: Option<i32>,
    pub pet_name: String,
    pub description: Option<String>,
    pub last_seen_location: String,
    pub last_seen_at: DateTime<Utc>,
    pub contact_phone: String,
    pub status: String,
}

// Emergency shelter requests

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::emergency_shelters)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EmergencyShelterEntity {
    pub id: i32,
    pub user_id: i32,
    pub pet_id: Option<i32>,
    pub reason: String,
    pub location: String,
    pub contact_phone: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::emergency_shelters)]
pub struct NewEmergencyShelterEntity {
    pub user_id: i32,
    pub pet_id: Option<i32>,
    pub reason: String,
    pub location: String,
    pub contact_phone: String,
    pub status: String,
}
