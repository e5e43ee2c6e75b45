use std::borrow::Cow;

use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::request::Parts;
use axum::Json;
use localbid_market::MarketError;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError};

use crate::error::AppError;

/// `Json<T>` that also runs the `validator` rules on `T`.
/// Malformed bodies and rule violations are both a 400.
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
            .map_err(|rejection| AppError::ValidationError(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// `Path<T>` whose rejection is the usual `{"error": ...}` 400
pub struct ApiPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::ValidationError(rejection.body_text()))?;
        Ok(ApiPath(value))
    }
}

/// Character count of the value as it will be stored, i.e. trimmed
pub fn trimmed_length(
    value: &str,
    min: usize,
    max: usize,
    message: &'static str,
) -> Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        return Err(ValidationError::new("length").with_message(Cow::Borrowed(message)));
    }
    Ok(())
}

/// Adapts a domain rule failure for `#[validate(schema(...))]` functions
pub fn rule_error(err: MarketError) -> ValidationError {
    let message = match err {
        MarketError::Invalid(msg) => msg,
        other => other.to_string(),
    };
    ValidationError::new("rule").with_message(Cow::Owned(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trimmed_length_ignores_padding() {
        assert!(trimmed_length("   ab    ", 5, 255, "too short").is_err());
        assert!(trimmed_length("  drill  ", 5, 255, "too short").is_ok());
        assert!(trimmed_length(&"é".repeat(255), 5, 255, "too long").is_ok());
        assert!(trimmed_length(&"é".repeat(256), 5, 255, "too long").is_err());
    }
}
