use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::extractors::scim_content_type;

fn user_doc() -> Value {
    json!({
        "schemas": ["urn:ietf:params:scim:schemas:core:2.0:ResourceType"],
        "id": "User",
        "name": "User",
        "endpoint": "/Users",
        "description": "User Account",
        "schema": "urn:ietf:params:scim:schemas:core:2.0:User",
        "meta": {
            "location": "/v2/ResourceTypes/User",
            "resourceType": "ResourceType"
        }
    })
}

fn group_doc() -> Value {
    json!({
        "schemas": ["urn:ietf:params:scim:schemas:core:2.0:ResourceType"],
        "id": "Group",
        "name": "Group",
        "endpoint": "/Groups",
        "description": "Group",
        "schema": "urn:ietf:params:scim:schemas:core:2.0:Group",
        "meta": {
            "location": "/v2/ResourceTypes/Group",
            "resourceType": "ResourceType"
        }
    })
}

pub async fn resource_types() -> Response {
    let body = json!({
        "schemas": ["urn:ietf:params:scim:api:messages:2.0:ListResponse"],
        "totalResults": 2,
        "startIndex": 1,
        "itemsPerPage": 2,
        "Resources": [user_doc(), group_doc()]
    });
    (StatusCode::OK, scim_content_type(), Json(body)).into_response()
}

pub async fn user_resource_type() -> Response {
    (StatusCode::OK, scim_content_type(), Json(user_doc())).into_response()
}

pub async fn group_resource_type() -> Response {
    (StatusCode::OK, scim_content_type(), Json(group_doc())).into_response()
}
