//! JSON body extractor that also runs `validator` rules.
//!
//! Malformed JSON answers 400. A body that parses but is mistyped, misses a
//! field or breaks a `#[validate]` rule answers 422. Both use the
//! `ApiResponse` envelope.

use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use super::ApiResponse;

/// `axum::Json<T>` followed by `T::validate()`.
///
/// ```ignore
/// async fn rename(ValidatedJson(body): ValidatedJson<UpdateParkingRequest>) { .. }
/// ```
pub struct ValidatedJson<T>(pub T);

pub enum ValidatedJsonRejection {
    Json(JsonRejection),
    Invalid(ValidationErrors),
}

/// `field: message` pairs sorted by field, one line per broken rule.
fn describe(errors: &ValidationErrors) -> String {
    let mut by_field: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (field, errs) in errors.field_errors() {
        for e in errs {
            let message = e
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| e.code.to_string());
            by_field.entry(field.to_string()).or_default().push(message);
        }
    }
    if by_field.is_empty() {
        return "Validation failed".to_string();
    }
    by_field
        .into_iter()
        .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

impl IntoResponse for ValidatedJsonRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Json(rejection) => (
                rejection.status(),
                format!("Invalid JSON: {}", rejection.body_text()),
            ),
            Self::Invalid(errors) => (StatusCode::UNPROCESSABLE_ENTITY, describe(&errors)),
        };
        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ValidatedJsonRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(ValidatedJsonRejection::Json)?;
        value.validate().map_err(ValidatedJsonRejection::Invalid)?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::post;
    use axum::Router;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::interfaces::http::modules::parkings::UpdateParkingRequest;
    use crate::interfaces::http::modules::spaces::MaintenanceRequest;

    async fn call(uri: &str, body: &str) -> (StatusCode, Value) {
        let app = Router::new()
            .route(
                "/rename",
                post(|ValidatedJson(_): ValidatedJson<UpdateParkingRequest>| async { "ok" }),
            )
            .route(
                "/maintenance",
                post(|ValidatedJson(_): ValidatedJson<MaintenanceRequest>| async { "ok" }),
            );
        let request = axum::http::Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn valid_body_passes() {
        let (status, _) = call("/rename", &json!({"name": "Central"}).to_string()).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_json_is_400() {
        let (status, body) = call("/rename", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn missing_field_is_422() {
        let (status, _) = call("/maintenance", "{}").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn broken_rule_names_the_field() {
        let (status, body) = call("/rename", &json!({"name": ""}).to_string()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().starts_with("name:"));
    }
}
