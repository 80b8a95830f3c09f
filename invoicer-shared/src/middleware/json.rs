use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;

use crate::errors::AppError;

/// `axum::Json` whose rejections render as the standard error envelope.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Deserialize)]
    struct Payload {
        name: String,
    }

    async fn echo(ApiJson(body): ApiJson<Payload>) -> String {
        body.name
    }

    async fn send(body: &'static str) -> (StatusCode, serde_json::Value) {
        let app = Router::new().route("/", post(echo));
        let resp = app
            .oneshot(
                Request::post("/")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }

    #[tokio::test]
    async fn malformed_and_mistyped_bodies_are_bad_requests() {
        for body in ["{not json", r#"{"name": 5}"#, "{}"] {
            let (status, json) = send(body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
            assert_eq!(json["error"]["code"], "E0008");
            assert_eq!(json["error"]["message"], "bad request");
        }
    }

    #[tokio::test]
    async fn valid_body_passes_through() {
        let (status, _) = send(r#"{"name":"ok"}"#).await;
        assert_eq!(status, StatusCode::OK);
    }
}
