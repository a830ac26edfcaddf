//! Request extractors whose rejections use the API error envelope.

use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Query, Request,
    },
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use super::error::ApiError;

/// JSON request body; malformed or mistyped bodies become a 400
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::bad_request("Expected a JSON request body")
        }
        JsonRejection::JsonDataError(e) => ApiError::bad_request(e.body_text()),
        JsonRejection::JsonSyntaxError(_) => ApiError::bad_request("Malformed JSON body"),
        other => ApiError::bad_request(other.body_text()),
    }
}

/// Query string parameters; bad values become a 400
#[derive(Debug)]
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| QueryParams(value))
            .map_err(|rejection: QueryRejection| ApiError::bad_request(rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorCode;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Payload {
        name: String,
    }

    fn json_request(body: &str) -> Request {
        axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_body() {
        let JsonBody(payload) = JsonBody::<Payload>::from_request(json_request(r#"{"name":"x"}"#), &())
            .await
            .unwrap();
        assert_eq!(payload.name, "x");
    }

    #[tokio::test]
    async fn test_bad_bodies_are_bad_requests() {
        for body in [r#"{"name":"#, r#"{"name":5}"#, r#"{}"#] {
            let err = JsonBody::<Payload>::from_request(json_request(body), &())
                .await
                .unwrap_err();
            assert_eq!(err.code(), ErrorCode::BadRequest, "body {}", body);
        }
    }

    #[tokio::test]
    async fn test_missing_content_type() {
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(r#"{"name":"x"}"#))
            .unwrap();
        let err = JsonBody::<Payload>::from_request(req, &()).await.unwrap_err();
        assert_eq!(err.message(), "Expected a JSON request body");
    }
}
