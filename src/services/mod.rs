//! Database-bound steps shared by several routes.

pub mod lookups;
pub mod notifications;
pub mod stock;
