use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::extractors::scim_content_type;
use crate::resource::user::AppState;

/// Static ServiceProviderConfig document (RFC 7643 section 5) advertising the
/// capabilities the proxy adds in front of the legacy upstream.
pub async fn service_provider_config(State((_, config)): State<AppState>) -> Response {
    let body = json!({
        "schemas": ["urn:ietf:params:scim:schemas:core:2.0:ServiceProviderConfig"],
        "documentationUri": "https://tools.ietf.org/html/rfc7644",
        "patch": {
            "supported": true
        },
        "bulk": {
            "supported": false,
            "maxOperations": 0,
            "maxPayloadSize": 0
        },
        "filter": {
            "supported": true,
            "maxResults": config.filter.max_fetch_size
        },
        "changePassword": {
            "supported": false
        },
        "sort": {
            "supported": true
        },
        "etag": {
            "supported": false
        },
        "authenticationSchemes": [
            {
                "type": "httpbasic",
                "name": "HTTP Basic",
                "description": "Authentication scheme using the HTTP Basic Standard",
                "specUri": "https://tools.ietf.org/html/rfc2617"
            },
            {
                "type": "oauthbearertoken",
                "name": "OAuth Bearer Token",
                "description": "Authentication scheme using the OAuth Bearer Token Standard",
                "specUri": "https://tools.ietf.org/html/rfc6750"
            }
        ],
        "meta": {
            "location": "/v2/ServiceProviderConfig",
            "resourceType": "ServiceProviderConfig"
        }
    });
    (StatusCode::OK, scim_content_type(), Json(body)).into_response()
}
