use std::str::FromStr;

use validator::ValidationError;

use crate::{
    domain::{UnknownVariant, one_of},
    infra::app_error::AppError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingType {
    Sale,
    Adoption,
}

impl ListingType {
    pub const ALL: &'static [&'static str] = &["sale", "adoption"];

    pub fn as_str(self) -> &'static str {
        match self {
            ListingType::Sale => "sale",
            ListingType::Adoption => "adoption",
        }
    }
}

impl FromStr for ListingType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sale" => Ok(ListingType::Sale),
            "adoption" => Ok(ListingType::Adoption),
            other => Err(UnknownVariant::new("listing type", other)),
        }
    }
}

pub fn validate_listing_type(value: &str) -> Result<(), ValidationError> {
    one_of::<ListingType>(value, ListingType::ALL)
}

/// Returns the price to store: sale listings need a positive price,
/// adoption listings never carry one.
pub fn listing_price(
    listing_type: ListingType,
    price: Option<f64>,
) -> Result<Option<f64>, AppError> {
    match (listing_type, price) {
        (ListingType::Adoption, _) => Ok(None),
        (ListingType::Sale, Some(price)) if price > 0.0 => Ok(Some(price)),
        (ListingType::Sale, _) => Err(AppError::field(
            "price",
            "The price field is required for sale listings and must be greater than 0.",
        )),
    }
}

/// What a review is about. Exactly one id must be given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewTarget {
    Vet(i32),
    ServiceProvider(i32),
    PetProduct(i32),
}

impl ReviewTarget {
    pub fn from_ids(
        vet_id: Option<i32>,
        service_provider_id: Option<i32>,
        pet_product_id: Option<i32>,
    ) -> Result<Self, AppError> {
        match (vet_id, service_provider_id, pet_product_id) {
            (Some(id), None, None) => Ok(ReviewTarget::Vet(id)),
            (None, Some(id), None) => Ok(ReviewTarget::ServiceProvider(id)),
            (None, None, Some(id)) => Ok(ReviewTarget::PetProduct(id)),
            _ => Err(AppError::field(
                "target",
                "Exactly one of vet_id, service_provider_id or pet_product_id is required.",
            )),
        }
    }

    pub fn field(self) -> &'static str {
        match self {
            ReviewTarget::Vet(_) => "vet_id",
            ReviewTarget::ServiceProvider(_) => "service_provider_id",
            ReviewTarget::PetProduct(_) => "pet_product_id",
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn sale_needs_positive_price() {
        assert_eq!(listing_price(ListingType::Sale, Some(120.0)).unwrap(), Some(120.0));
        assert_matches!(
            listing_price(ListingType::Sale, None),
            Err(AppError::Validation(fields)) if fields.contains_key("price")
        );
        assert!(listing_price(ListingType::Sale, Some(0.0)).is_err());
    }

    #[test]
    fn adoption_drops_price() {
        assert_eq!(listing_price(ListingType::Adoption, Some(50.0)).unwrap(), None);
        assert_eq!(listing_price(ListingType::Adoption, None).unwrap(), None);
    }

    #[test]
    fn review_needs_exactly_one_target() {
        assert_eq!(
            ReviewTarget::from_ids(Some(3), None, None).unwrap(),
            ReviewTarget::Vet(3)
        );
        assert_eq!(
            ReviewTarget::from_ids(None, None, Some(8)).unwrap().field(),
            "pet_product_id"
        );
        assert!(ReviewTarget::from_ids(None, None, None).is_err());
        assert!(ReviewTarget::from_ids(Some(1), Some(2), None).is_err());
    }
}
