//! Diesel row types. `*Entity` structs mirror table rows, `New*` structs are insertables.

pub mod appointments;
pub mod commerce;
pub mod market;
pub mod notifications;
pub mod pets;
pub mod providers;
pub mod reports;
pub mod users;

pub use appointments::*;
pub use commerce::*;
pub use market::*;
pub use notifications::*;
pub use pets::*;
pub use providers::*;
pub use reports::*;
pub use users::*;
