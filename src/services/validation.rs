//! JSON extraction with schema validation.
//!
//! Handlers taking [`ValidatedJson<T>`] only run once the body parsed and
//! `T::validate` passed; anything else is a 400 `VALIDATION_ERROR` with one
//! entry per offending field.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use crate::modules::auth::interface::{AuthError, FieldError};

pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(rejection_to_error)?;

        value.validate().map_err(|e| AuthError::Validation(field_errors(&e)))?;
        Ok(Self(value))
    }
}

fn rejection_to_error(rejection: JsonRejection) -> AuthError {
    AuthError::Validation(vec![FieldError {
        field: "body".to_string(),
        message: rejection.body_text(),
    }])
}

pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut out: Vec<FieldError> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| FieldError {
                field: field.to_string(),
                message: e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string()),
            })
        })
        .collect();
    out.sort_by(|a, b| a.field.cmp(&b.field));
    out
}
