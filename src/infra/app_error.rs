use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::Serialize;
use utoipa::ToSchema;
use validator::ValidationErrors;

/// Field name to human readable messages, the shape the client renders next to form inputs.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

const VALIDATION_MESSAGE: &str = "The given data was invalid.";
const GENERIC_MESSAGE: &str = "Something went wrong";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    ForbiddenResource(String),

    #[error("resource not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Single-field validation failure, for rules `validator` cannot express.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        AppError::Validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::ForbiddenResource(_) => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error envelope returned for every non-2xx response.
#[derive(Serialize, ToSchema, Debug)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Validation(errors) => ErrorBody {
                message: VALIDATION_MESSAGE.into(),
                errors: Some(errors),
            },
            AppError::NotFound => ErrorBody {
                message: "Resource not found".into(),
                errors: None,
            },
            AppError::BadRequest(message)
            | AppError::Unauthorized(message)
            | AppError::ForbiddenResource(message)
            | AppError::Conflict(message) => ErrorBody {
                message,
                errors: None,
            },
            AppError::Other(err) => {
                tracing::error!(error = ?err, "Unhandled error");
                ErrorBody {
                    message: GENERIC_MESSAGE.into(),
                    errors: None,
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<DieselError> for AppError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => AppError::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                AppError::Conflict(match info.constraint_name() {
                    Some(constraint) => format!("Duplicate value violates {constraint}"),
                    None => "Resource already exists".into(),
                })
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                AppError::field("body", "A referenced record does not exist")
            }
            other => AppError::Other(other.into()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        for (field, errs) in errors.field_errors() {
            let messages = errs
                .iter()
                .map(|err| match &err.message {
                    Some(message) => message.to_string(),
                    None => format!("The {field} field is invalid ({}).", err.code),
                })
                .collect();
            fields.insert(field.to_string(), messages);
        }
        AppError::Validation(fields)
    }
}

/// Standard success envelope.
#[derive(Serialize, ToSchema, Debug)]
pub struct StdResponse<T, M> {
    pub data: Option<T>,
    pub message: Option<M>,
}

impl<T: Serialize, M: Serialize> IntoResponse for StdResponse<T, M> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use serde_json::Value;
    use validator::Validate;

    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_error_is_field_keyed() {
        let (status, json) = body_json(AppError::field("name", "The name field is required.")).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["message"], VALIDATION_MESSAGE);
        assert_eq!(json["errors"]["name"][0], "The name field is required.");
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, json) =
            body_json(AppError::Other(anyhow::anyhow!("connection refused on 5432"))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], GENERIC_MESSAGE);
        assert!(json.get("errors").is_none());
    }

    #[tokio::test]
    async fn simple_variants_keep_their_message() {
        let (status, json) = body_json(AppError::ForbiddenResource("Not your pet".into())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["message"], "Not your pet");

        let (status, _) = body_json(AppError::NotFound).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn diesel_errors_are_classified() {
        assert!(matches!(AppError::from(DieselError::NotFound), AppError::NotFound));

        let unique = DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new(String::from("duplicate key")),
        );
        assert_eq!(AppError::from(unique).status(), StatusCode::CONFLICT);

        let fk = DieselError::DatabaseError(
            DatabaseErrorKind::ForeignKeyViolation,
            Box::new(String::from("violates foreign key")),
        );
        assert_eq!(AppError::from(fk).status(), StatusCode::UNPROCESSABLE_ENTITY);

        assert_eq!(
            AppError::from(DieselError::RollbackTransaction).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 1, message = "The name field is required."))]
        name: String,
        #[validate(range(min = 1, max = 5))]
        rating: i32,
    }

    #[test]
    fn validator_errors_use_custom_or_default_messages() {
        let errors = Probe {
            name: String::new(),
            rating: 9,
        }
        .validate()
        .unwrap_err();

        let AppError::Validation(fields) = AppError::from(errors) else {
            panic!("expected a validation error");
        };
        assert_eq!(fields["name"], vec!["The name field is required."]);
        assert_eq!(fields["rating"], vec!["The rating field is invalid (range)."]);
    }
}
