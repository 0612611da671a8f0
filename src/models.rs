use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const LIST_RESPONSE_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:ListResponse";
pub const PATCH_OP_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";
pub const ERROR_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:Error";

/// SCIM-compliant PatchOperation struct that matches RFC 7644 specification
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScimPatchOperation {
    pub op: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// SCIM-compliant PatchOp struct that matches RFC 7644 specification
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScimPatchOp {
    pub schemas: Vec<String>,
    #[serde(rename = "Operations")]
    pub operations: Vec<ScimPatchOperation>,
}

/// SCIM ListResponse envelope. Resources stay opaque JSON because the proxy
/// performs no schema enforcement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScimListResponse {
    pub schemas: Vec<String>,
    #[serde(rename = "totalResults")]
    pub total_results: i64,
    #[serde(rename = "startIndex", skip_serializing_if = "Option::is_none")]
    pub start_index: Option<i64>,
    #[serde(rename = "itemsPerPage", skip_serializing_if = "Option::is_none")]
    pub items_per_page: Option<i64>,
    #[serde(rename = "Resources", default)]
    pub resources: Vec<Value>,
}

impl ScimListResponse {
    pub fn new(
        total_results: i64,
        start_index: i64,
        resources: Vec<Value>,
    ) -> Self {
        ScimListResponse {
            schemas: vec![LIST_RESPONSE_SCHEMA.to_string()],
            total_results,
            start_index: Some(start_index),
            items_per_page: Some(resources.len() as i64),
            resources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_response_serialization_uses_scim_names() {
        let response = ScimListResponse::new(2, 1, vec![json!({"id": "a"}), json!({"id": "b"})]);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["totalResults"], 2);
        assert_eq!(value["startIndex"], 1);
        assert_eq!(value["itemsPerPage"], 2);
        assert_eq!(value["Resources"].as_array().unwrap().len(), 2);
        assert_eq!(value["schemas"][0], LIST_RESPONSE_SCHEMA);
    }

    #[test]
    fn test_patch_op_deserializes_capitalized_operations() {
        let raw = json!({
            "schemas": [PATCH_OP_SCHEMA],
            "Operations": [
                {"op": "replace", "path": "active", "value": false}
            ]
        });
        let patch: ScimPatchOp = serde_json::from_value(raw).unwrap();
        assert_eq!(patch.operations.len(), 1);
        assert_eq!(patch.operations[0].op, "replace");
        assert_eq!(patch.operations[0].path.as_deref(), Some("active"));
    }

    #[test]
    fn test_list_response_tolerates_missing_resources() {
        let raw = json!({
            "schemas": [LIST_RESPONSE_SCHEMA],
            "totalResults": 0
        });
        let parsed: ScimListResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.total_results, 0);
        assert!(parsed.resources.is_empty());
    }
}
