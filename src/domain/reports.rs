//! Lost-pet report and emergency shelter request statuses.

use std::{fmt, str::FromStr};

use validator::ValidationError;

use crate::{
    domain::{UnknownVariant, one_of},
    infra::app_error::AppError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LostPetStatus {
    Lost,
    Found,
}

impl LostPetStatus {
    pub const ALL: &'static [&'static str] = &["lost", "found"];

    pub fn as_str(self) -> &'static str {
        match self {
            LostPetStatus::Lost => "lost",
            LostPetStatus::Found => "found",
        }
    }
}

impl FromStr for LostPetStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lost" => Ok(LostPetStatus::Lost),
            "found" => Ok(LostPetStatus::Found),
            other => Err(UnknownVariant::new("lost pet status", other)),
        }
    }
}

pub fn validate_lost_pet_status(value: &str) -> Result<(), ValidationError> {
    one_of::<LostPetStatus>(value, LostPetStatus::ALL)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShelterStatus {
    Pending,
    Approved,
    Rejected,
}

impl ShelterStatus {
    pub const ALL: &'static [&'static str] = &["pending", "approved", "rejected"];

    pub fn as_str(self) -> &'static str {
        match self {
            ShelterStatus::Pending => "pending",
            ShelterStatus::Approved => "approved",
            ShelterStatus::Rejected => "rejected",
        }
    }

    /// Admin decision on a request. Decisions are final.
    pub fn decide(self, to: ShelterStatus) -> Result<ShelterStatus, AppError> {
        match (self, to) {
            (ShelterStatus::Pending, ShelterStatus::Approved | ShelterStatus::Rejected) => Ok(to),
            (from, to) => Err(AppError::BadRequest(format!(
                "Shelter request cannot move from {from} to {to}"
            ))),
        }
    }
}

impl fmt::Display for ShelterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShelterStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ShelterStatus::Pending),
            "approved" => Ok(ShelterStatus::Approved),
            "rejected" => Ok(ShelterStatus::Rejected),
            other => Err(UnknownVariant::new("shelter status", other)),
        }
    }
}

pub fn validate_shelter_status(value: &str) -> Result<(), ValidationError> {
    one_of::<ShelterStatus>(value, ShelterStatus::ALL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_requests_can_be_decided_once() {
        assert_eq!(
            ShelterStatus::Pending.decide(ShelterStatus::Approved).unwrap(),
            ShelterStatus::Approved
        );
        assert!(ShelterStatus::Approved.decide(ShelterStatus::Rejected).is_err());
        assert!(ShelterStatus::Pending.decide(ShelterStatus::Pending).is_err());
    }

    #[test]
    fn lost_status_validation() {
        assert!(validate_lost_pet_status("found").is_ok());
        assert!(validate_lost_pet_status("missing").is_err());
    }
}
