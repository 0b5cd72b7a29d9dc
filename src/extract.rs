//! Request body extraction that reports malformed JSON through `ApiError`.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{ApiError, FieldError};

/// Like `axum::Json` on the request side, but a body that does not parse or does not
/// fit the target type is a 400 `validation_error` instead of axum's plain-text 4xx.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let detail = rejection.body_text();
        debug!(status = %rejection.status(), %detail, "request body rejected");
        let field = match rejection {
            JsonRejection::JsonDataError(_) => offending_field(&detail),
            _ => None,
        };
        ApiError::Validation(vec![FieldError::new(
            field.as_deref().unwrap_or("body"),
            detail,
        )])
    }
}

/// Field path named by a serde data error, e.g. `password` in
/// "...target type: password: invalid type: integer ..." or "missing field `password`".
fn offending_field(detail: &str) -> Option<String> {
    let reason = detail
        .split_once("target type: ")
        .map_or(detail, |(_, rest)| rest);
    if let Some((_, rest)) = reason.split_once("missing field `") {
        return rest.split_once('`').map(|(name, _)| name.to_string());
    }
    let (path, _) = reason.split_once(": ")?;
    let is_path = !path.is_empty()
        && path
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '[' | ']'));
    is_path.then(|| path.to_string())
}
