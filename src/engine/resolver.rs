use serde_json::Value;

use crate::parser::filter_ast::AttrPath;

/// Case-insensitive key lookup on a JSON object. SCIM attribute names match
/// case-insensitively while the serialized spelling is preserved.
pub fn get_attr<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
    let obj = value.as_object()?;
    if let Some(found) = obj.get(name) {
        return Some(found);
    }
    obj.iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
}

/// Mutable variant of `get_attr`, returning the stored key spelling so
/// callers can write back under it.
pub fn get_attr_key(value: &Value, name: &str) -> Option<String> {
    let obj = value.as_object()?;
    if obj.contains_key(name) {
        return Some(name.to_string());
    }
    obj.keys()
        .find(|key| key.eq_ignore_ascii_case(name))
        .cloned()
}

/// Resolve an attribute path against a SCIM resource.
///
/// Returns every JSON value the path reaches: descending through an array
/// fans out element-wise, a missing attribute contributes nothing. A
/// URI-qualified path has its URN stripped and is matched from the root.
pub fn resolve<'a>(resource: &'a Value, path: &AttrPath) -> Vec<&'a Value> {
    let mut current: Vec<&'a Value> = vec![resource];

    for segment in &path.segments {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(_) => {
                    if let Some(found) = get_attr(value, segment) {
                        next.push(found);
                    }
                }
                Value::Array(items) => {
                    for item in items {
                        if let Some(found) = get_attr(item, segment) {
                            next.push(found);
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
        if current.is_empty() {
            break;
        }
    }

    current
}
