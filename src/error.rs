use axum::{http::StatusCode, Json};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    /// Filter failed to parse. Rendered as 400 `invalidFilter`.
    InvalidFilter(String),
    /// Filter exceeded the configured complexity budget. 400 `tooMany`.
    FilterTooComplex(String),
    /// PATCH path failed to parse. 400 `invalidPath`.
    InvalidPath(String),
    /// PATCH selector matched nothing where a target is required. 400 `noTarget`.
    NoTarget(String),
    /// PATCH touched an immutable attribute. 400 `mutability`.
    Mutability(String),
    /// Malformed request body, operation or value. 400 `invalidValue`.
    BadRequest(String),
    /// Non-2xx from the upstream; status and body pass through unchanged.
    Upstream { status: u16, body: serde_json::Value },
    /// Transport failure or timeout talking to the upstream. 502.
    UpstreamUnavailable(String),
    Serialization(serde_json::Error),
    Configuration(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidFilter(e) => write!(f, "Invalid filter: {}", e),
            AppError::FilterTooComplex(e) => write!(f, "Filter too complex: {}", e),
            AppError::InvalidPath(e) => write!(f, "Invalid path: {}", e),
            AppError::NoTarget(e) => write!(f, "No target: {}", e),
            AppError::Mutability(e) => write!(f, "Immutable attribute: {}", e),
            AppError::BadRequest(e) => write!(f, "Bad request: {}", e),
            AppError::Upstream { status, .. } => write!(f, "Upstream returned {}", status),
            AppError::UpstreamUnavailable(e) => write!(f, "Upstream unavailable: {}", e),
            AppError::Serialization(e) => write!(f, "Serialization error: {}", e),
            AppError::Configuration(e) => write!(f, "Configuration error: {}", e),
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err)
    }
}

pub type AppResult<T> = Result<T, AppError>;

// SCIM 2.0 standard error response helper
pub fn scim_error_response(
    status_code: StatusCode,
    scim_type: Option<&str>,
    detail: &str,
) -> (StatusCode, Json<serde_json::Value>) {
    let mut body = json!({
        "schemas": ["urn:ietf:params:scim:api:messages:2.0:Error"],
        "status": status_code.as_u16().to_string(),
        "detail": detail,
    });
    if let Some(kind) = scim_type {
        body["scimType"] = json!(kind);
    }
    (status_code, Json(body))
}

impl AppError {
    pub fn to_response(&self) -> (StatusCode, Json<serde_json::Value>) {
        match self {
            AppError::InvalidFilter(e) => {
                scim_error_response(StatusCode::BAD_REQUEST, Some("invalidFilter"), e)
            }
            AppError::FilterTooComplex(e) => {
                scim_error_response(StatusCode::BAD_REQUEST, Some("tooMany"), e)
            }
            AppError::InvalidPath(e) => {
                scim_error_response(StatusCode::BAD_REQUEST, Some("invalidPath"), e)
            }
            AppError::NoTarget(e) => {
                scim_error_response(StatusCode::BAD_REQUEST, Some("noTarget"), e)
            }
            AppError::Mutability(e) => {
                scim_error_response(StatusCode::BAD_REQUEST, Some("mutability"), e)
            }
            AppError::BadRequest(e) => {
                scim_error_response(StatusCode::BAD_REQUEST, Some("invalidValue"), e)
            }
            AppError::Upstream { status, body } => {
                // SCIM error envelopes from the upstream pass through as-is
                let status =
                    StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, Json(body.clone()))
            }
            AppError::UpstreamUnavailable(e) => {
                tracing::error!("upstream unavailable: {}", e);
                scim_error_response(
                    StatusCode::BAD_GATEWAY,
                    None,
                    "Upstream service unavailable",
                )
            }
            AppError::Serialization(e) => {
                tracing::error!("serialization error: {}", e);
                scim_error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    None,
                    "Internal server error",
                )
            }
            AppError::Configuration(e) => {
                tracing::error!("configuration error: {}", e);
                scim_error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    None,
                    "Internal server error",
                )
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {}", e);
                scim_error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    None,
                    "Internal server error",
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_error_envelope() {
        let err = AppError::InvalidFilter("unexpected token".to_string());
        let (status, Json(body)) = err.to_response();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["scimType"], "invalidFilter");
        assert_eq!(body["status"], "400");
        assert_eq!(
            body["schemas"][0],
            "urn:ietf:params:scim:api:messages:2.0:Error"
        );
    }

    #[test]
    fn test_complexity_error_uses_too_many() {
        let err = AppError::FilterTooComplex("complexity 3 exceeds limit 2".to_string());
        let (status, Json(body)) = err.to_response();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["scimType"], "tooMany");
    }

    #[test]
    fn test_upstream_body_passes_through() {
        let upstream_body = serde_json::json!({
            "schemas": ["urn:ietf:params:scim:api:messages:2.0:Error"],
            "status": "404",
            "detail": "User not found"
        });
        let err = AppError::Upstream {
            status: 404,
            body: upstream_body.clone(),
        };
        let (status, Json(body)) = err.to_response();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, upstream_body);
    }
}
