use serde_json::{Map, Value};

/// Attributes present in every response regardless of projection, per RFC
/// 7644 section 3.4.2.5.
const ALWAYS_RETURNED: [&str; 3] = ["id", "schemas", "meta"];

/// Query parameters for SCIM attribute projection (`attributes` /
/// `excludedAttributes`). The proxy carries no schema registry, so
/// projection works structurally over the resource JSON: a requested
/// `name.givenName` keeps the `name` object with only that sub-attribute.
#[derive(Debug, Clone, Default)]
pub struct AttributeFilter {
    /// Comma-separated list of attributes to include (overrides default)
    pub attributes: Option<Vec<String>>,
    /// Comma-separated list of attributes to exclude from default set
    pub excluded_attributes: Option<Vec<String>>,
}

impl AttributeFilter {
    /// Parse attributes and excludedAttributes query parameters
    pub fn from_params(attributes: Option<&str>, excluded_attributes: Option<&str>) -> Self {
        let split = |raw: &str| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        };

        Self {
            attributes: attributes.map(split).filter(|v| !v.is_empty()),
            excluded_attributes: excluded_attributes.map(split).filter(|v| !v.is_empty()),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.attributes.is_none() && self.excluded_attributes.is_none()
    }

    /// Apply projection to one SCIM resource. Null-valued fields are scrubbed
    /// first; unassigned attributes never appear in SCIM responses.
    pub fn apply_to_resource(&self, resource: &Value) -> Value {
        let cleaned = Self::remove_null_fields(resource);

        if let Some(ref requested) = self.attributes {
            return self.project_included(&cleaned, requested);
        }
        if let Some(ref excluded) = self.excluded_attributes {
            return self.project_excluded(&cleaned, excluded);
        }
        cleaned
    }

    fn project_included(&self, resource: &Value, requested: &[String]) -> Value {
        let Value::Object(obj) = resource else {
            return resource.clone();
        };

        let mut projected = Map::new();
        for (key, value) in obj {
            if ALWAYS_RETURNED.iter().any(|a| key.eq_ignore_ascii_case(a)) {
                projected.insert(key.clone(), value.clone());
                continue;
            }

            // Fully requested attribute: keep as-is
            if requested.iter().any(|r| r.eq_ignore_ascii_case(key)) {
                projected.insert(key.clone(), value.clone());
                continue;
            }

            // Requested sub-attributes: keep the container with only those
            let sub_names: Vec<&str> = requested
                .iter()
                .filter_map(|r| {
                    let (head, tail) = r.split_once('.')?;
                    head.eq_ignore_ascii_case(key).then_some(tail)
                })
                .collect();
            if !sub_names.is_empty() {
                projected.insert(key.clone(), project_sub_attributes(value, &sub_names));
            }
        }
        Value::Object(projected)
    }

    fn project_excluded(&self, resource: &Value, excluded: &[String]) -> Value {
        let Value::Object(obj) = resource else {
            return resource.clone();
        };

        let mut projected = Map::new();
        for (key, value) in obj {
            if ALWAYS_RETURNED.iter().any(|a| key.eq_ignore_ascii_case(a)) {
                projected.insert(key.clone(), value.clone());
                continue;
            }
            if excluded.iter().any(|e| e.eq_ignore_ascii_case(key)) {
                continue;
            }

            // Excluded sub-attributes: keep the container minus those
            let sub_names: Vec<&str> = excluded
                .iter()
                .filter_map(|e| {
                    let (head, tail) = e.split_once('.')?;
                    head.eq_ignore_ascii_case(key).then_some(tail)
                })
                .collect();
            if sub_names.is_empty() {
                projected.insert(key.clone(), value.clone());
            } else {
                projected.insert(key.clone(), drop_sub_attributes(value, &sub_names));
            }
        }
        Value::Object(projected)
    }

    /// Remove null fields to comply with the SCIM response rules: unassigned
    /// attributes are omitted, not serialized as null.
    pub fn remove_null_fields(value: &Value) -> Value {
        match value {
            Value::Object(obj) => {
                let mut cleaned = Map::new();
                for (key, val) in obj {
                    match val {
                        Value::Null => continue,
                        Value::Object(_) => {
                            let inner = Self::remove_null_fields(val);
                            if inner.as_object().is_some_and(|o| !o.is_empty()) {
                                cleaned.insert(key.clone(), inner);
                            }
                        }
                        Value::Array(items) => {
                            let inner: Vec<Value> = items
                                .iter()
                                .map(Self::remove_null_fields)
                                .filter(|item| !item.is_null())
                                .collect();
                            if !inner.is_empty() {
                                cleaned.insert(key.clone(), Value::Array(inner));
                            }
                        }
                        _ => {
                            cleaned.insert(key.clone(), val.clone());
                        }
                    }
                }
                Value::Object(cleaned)
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(Self::remove_null_fields)
                    .filter(|item| !item.is_null())
                    .collect(),
            ),
            _ => value.clone(),
        }
    }
}

/// Keep only the named sub-attributes of a complex value. Arrays of objects
/// project element-wise.
fn project_sub_attributes(value: &Value, sub_names: &[&str]) -> Value {
    match value {
        Value::Object(obj) => {
            let mut projected = Map::new();
            for (key, val) in obj {
                if sub_names.iter().any(|s| s.eq_ignore_ascii_case(key)) {
                    projected.insert(key.clone(), val.clone());
                }
            }
            Value::Object(projected)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| project_sub_attributes(item, sub_names))
                .collect(),
        ),
        _ => value.clone(),
    }
}

fn drop_sub_attributes(value: &Value, sub_names: &[&str]) -> Value {
    match value {
        Value::Object(obj) => {
            let mut projected = Map::new();
            for (key, val) in obj {
                if !sub_names.iter().any(|s| s.eq_ignore_ascii_case(key)) {
                    projected.insert(key.clone(), val.clone());
                }
            }
            Value::Object(projected)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| drop_sub_attributes(item, sub_names))
                .collect(),
        ),
        _ => value.clone(),
    }
}
