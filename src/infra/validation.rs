//! `ValidatedJson`: serde deserialization followed by `validator` rules,
//! mapped onto the 422 field-keyed error envelope.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::infra::app_error::AppError;

pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(json_rejection)?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

fn json_rejection(rejection: JsonRejection) -> AppError {
    match rejection {
        // Well-formed JSON with the wrong shape is a validation problem.
        JsonRejection::JsonDataError(err) => AppError::field("body", err.body_text()),
        other => AppError::BadRequest(other.body_text()),
    }
}
