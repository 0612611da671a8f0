use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;

/// Custom JSON extractor that accepts both application/json and
/// application/scim+json as required by SCIM 2.0 (RFC 7644)
pub struct ScimJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ScimJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ScimJsonRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(content_type) = req.headers().get(header::CONTENT_TYPE) {
            let media_type = content_type
                .to_str()
                .map_err(|_| ScimJsonRejection::InvalidContentType)?
                .split(';')
                .next()
                .unwrap_or("")
                .trim()
                .to_lowercase();

            if media_type != "application/json" && media_type != "application/scim+json" {
                return Err(ScimJsonRejection::InvalidContentType);
            }
        }

        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ScimJson(value)),
            Err(rejection) => Err(ScimJsonRejection::JsonRejection(rejection)),
        }
    }
}

pub enum ScimJsonRejection {
    InvalidContentType,
    JsonRejection(JsonRejection),
}

impl IntoResponse for ScimJsonRejection {
    fn into_response(self) -> Response {
        let detail = match &self {
            ScimJsonRejection::InvalidContentType => {
                "Content-Type must be application/json or application/scim+json".to_string()
            }
            ScimJsonRejection::JsonRejection(rejection) => {
                format!("Invalid JSON: {}", rejection)
            }
        };
        let body = Json(json!({
            "schemas": ["urn:ietf:params:scim:api:messages:2.0:Error"],
            "status": "400",
            "scimType": "invalidValue",
            "detail": detail
        }));
        (StatusCode::BAD_REQUEST, body).into_response()
    }
}

/// SCIM responses carry application/scim+json
pub fn scim_content_type() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/scim+json"),
    );
    headers
}
