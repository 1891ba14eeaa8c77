//! Business rules that do not touch the database.

use std::{borrow::Cow, str::FromStr};

use validator::ValidationError;

pub mod appointment_flow;
pub mod market;
pub mod order_flow;
pub mod reports;
pub mod roles;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Validator glue: accepts `value` when it parses as `T`.
pub(crate) fn one_of<T: FromStr>(
    value: &str,
    allowed: &'static [&'static str],
) -> Result<(), ValidationError> {
    if value.parse::<T>().is_ok() {
        return Ok(());
    }
    let mut err = ValidationError::new("one_of");
    err.message = Some(Cow::Owned(format!(
        "The selected value is invalid. Allowed: {}.",
        allowed.join(", ")
    )));
    Err(err)
}

/// Money is stored as float dollars; totals are rounded to cents.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
