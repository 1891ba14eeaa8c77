use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{Identifiable, Insertable, Queryable},
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::appointments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AppointmentEntity {
    pub id: i32,
    pub user_id: i32,
    pub pet_id: i32,
    pub vet_id: Option<i32>,
    pub service_provider_id: Option<i32>,
    pub scheduled_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::appointments)]
pub struct NewAppointmentEntity {
    pub user_id: i32,
    pub pet_id: i32,
    pub vet_id: Option<i32>,
    pub service_provider_id: Option<i32>,
    pub scheduled_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub status: String,
}
