use chrono::{DateTime, Utc};
use diesel::{Selectable, prelude::Queryable};
use serde::Serialize;
use utoipa::ToSchema;

/// Users are provisioned by the identity service; this service only reads them.
#[derive(Queryable, Selectable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserEntity {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
