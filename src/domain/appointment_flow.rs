use std::{fmt, str::FromStr};

use validator::ValidationError;

use crate::{
    domain::{UnknownVariant, one_of},
    infra::{app_error::AppError, auth::AuthUser},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentStatus {
    Pending,
    Accepted,
    Canceled,
}

impl AppointmentStatus {
    pub const ALL: &'static [&'static str] = &["pending", "accepted", "canceled"];

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Accepted => "accepted",
            AppointmentStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AppointmentStatus::Pending),
            "accepted" => Ok(AppointmentStatus::Accepted),
            "canceled" => Ok(AppointmentStatus::Canceled),
            other => Err(UnknownVariant::new("appointment status", other)),
        }
    }
}

pub fn validate_appointment_status(value: &str) -> Result<(), ValidationError> {
    one_of::<AppointmentStatus>(value, AppointmentStatus::ALL)
}

/// How the caller relates to an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Admin,
    Booker,
    /// The user behind the booked vet or service provider profile.
    Provider,
}

impl Party {
    pub fn of(user: &AuthUser, booker_id: i32, provider_user_id: Option<i32>) -> Option<Party> {
        if user.is_admin() {
            Some(Party::Admin)
        } else if user.user_id == booker_id {
            Some(Party::Booker)
        } else if provider_user_id == Some(user.user_id) {
            Some(Party::Provider)
        } else {
            None
        }
    }

    /// Users to notify when this party changes the appointment.
    pub fn counterparts(self, booker_id: i32, provider_user_id: Option<i32>) -> Vec<i32> {
        match self {
            Party::Booker => provider_user_id.into_iter().collect(),
            Party::Provider => vec![booker_id],
            Party::Admin => std::iter::once(booker_id).chain(provider_user_id).collect(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AppointmentFlowError {
    #[error("Appointment cannot move from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Only the booked vet or service provider can accept an appointment")]
    NotAllowed,

    #[error("Only the person who booked can change appointment details")]
    NotBooker,

    #[error("Only pending appointments can be rescheduled")]
    NotEditable,
}

impl From<AppointmentFlowError> for AppError {
    fn from(err: AppointmentFlowError) -> Self {
        match err {
            AppointmentFlowError::NotAllowed | AppointmentFlowError::NotBooker => {
                AppError::ForbiddenResource(err.to_string())
            }
            _ => AppError::BadRequest(err.to_string()),
        }
    }
}

pub fn transition(
    from: AppointmentStatus,
    to: AppointmentStatus,
    party: Party,
) -> Result<AppointmentStatus, AppointmentFlowError> {
    use AppointmentStatus::*;

    match (from, to) {
        (Pending, Accepted) => match party {
            Party::Provider | Party::Admin => Ok(to),
            Party::Booker => Err(AppointmentFlowError::NotAllowed),
        },
        (Pending | Accepted, Canceled) => Ok(to),
        (from, to) => Err(AppointmentFlowError::InvalidTransition { from, to }),
    }
}

/// Rescheduling and reason edits belong to the booker while nothing is decided yet.
pub fn ensure_details_editable(
    status: AppointmentStatus,
    party: Party,
) -> Result<(), AppointmentFlowError> {
    match (status, party) {
        (_, Party::Provider) => Err(AppointmentFlowError::NotBooker),
        (AppointmentStatus::Pending, _) => Ok(()),
        _ => Err(AppointmentFlowError::NotEditable),
    }
}

pub fn status_message(appointment_id: i32, status: AppointmentStatus) -> (String, String) {
    let title = format!("Appointment {status}");
    let message = match status {
        AppointmentStatus::Pending => {
            format!("Appointment #{appointment_id} is awaiting confirmation.")
        }
        AppointmentStatus::Accepted => format!("Appointment #{appointment_id} has been accepted."),
        AppointmentStatus::Canceled => format!("Appointment #{appointment_id} has been canceled."),
    };
    (title, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::roles::Role;

    fn user(user_id: i32, role: Role) -> AuthUser {
        AuthUser { user_id, role }
    }

    #[test]
    fn party_resolution() {
        assert_eq!(Party::of(&user(1, Role::Customer), 1, Some(2)), Some(Party::Booker));
        assert_eq!(Party::of(&user(2, Role::Vet), 1, Some(2)), Some(Party::Provider));
        assert_eq!(Party::of(&user(9, Role::Admin), 1, Some(2)), Some(Party::Admin));
        assert_eq!(Party::of(&user(3, Role::Vet), 1, Some(2)), None);
    }

    #[test]
    fn only_provider_or_admin_accepts() {
        use AppointmentStatus::*;

        assert_eq!(transition(Pending, Accepted, Party::Provider), Ok(Accepted));
        assert_eq!(transition(Pending, Accepted, Party::Admin), Ok(Accepted));
        assert_eq!(
            transition(Pending, Accepted, Party::Booker),
            Err(AppointmentFlowError::NotAllowed)
        );
    }

    #[test]
    fn anyone_involved_can_cancel_until_canceled() {
        use AppointmentStatus::*;

        for party in [Party::Booker, Party::Provider, Party::Admin] {
            assert_eq!(transition(Pending, Canceled, party), Ok(Canceled));
            assert_eq!(transition(Accepted, Canceled, party), Ok(Canceled));
        }
        assert_eq!(
            transition(Canceled, Accepted, Party::Admin),
            Err(AppointmentFlowError::InvalidTransition {
                from: Canceled,
                to: Accepted
            })
        );
        assert!(transition(Accepted, Pending, Party::Provider).is_err());
    }

    #[test]
    fn details_edits() {
        assert!(ensure_details_editable(AppointmentStatus::Pending, Party::Booker).is_ok());
        assert_eq!(
            ensure_details_editable(AppointmentStatus::Accepted, Party::Booker),
            Err(AppointmentFlowError::NotEditable)
        );
        assert_eq!(
            ensure_details_editable(AppointmentStatus::Pending, Party::Provider),
            Err(AppointmentFlowError::NotBooker)
        );
    }

    #[test]
    fn counterparts_are_notified() {
        assert_eq!(Party::Booker.counterparts(1, Some(2)), vec![2]);
        assert_eq!(Party::Provider.counterparts(1, Some(2)), vec![1]);
        assert_eq!(Party::Admin.counterparts(1, Some(2)), vec![1, 2]);
        assert!(Party::Booker.counterparts(1, None).is_empty());
    }
}
