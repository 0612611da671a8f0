use serde_json::{Map, Value};

use crate::engine::evaluator::evaluate;
use crate::error::{AppError, AppResult};
use crate::parser::filter_ast::FilterNode;
use crate::parser::filter_parser::parse_filter;

/// SCIM PATCH path and applier according to RFC 7644 section 3.5.2.
/// Supports attrPath and valuePath with filter expressions.

/// Attributes the proxy never lets a PATCH touch.
const IMMUTABLE_ATTRIBUTES: [&str; 3] = ["schemas", "id", "meta"];

#[derive(Debug, Clone)]
pub enum ScimPath {
    /// Simple attribute path: "name.givenName"
    AttrPath(Vec<String>),
    /// Value path with filter: "emails[type eq \"work\"].value"
    ValuePath {
        attr_path: Vec<String>,
        selector: FilterNode,
        sub_attr: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOpKind {
    Add,
    Replace,
    Remove,
}

impl PatchOpKind {
    pub fn parse(op: &str) -> AppResult<Self> {
        match op.to_lowercase().as_str() {
            "add" => Ok(PatchOpKind::Add),
            "replace" => Ok(PatchOpKind::Replace),
            "remove" => Ok(PatchOpKind::Remove),
            other => Err(AppError::BadRequest(format!(
                "Unsupported PATCH operation: {}",
                other
            ))),
        }
    }
}

/// Apply one PATCH operation to a resource in place. Operations are applied
/// in document order by the caller; the first failure aborts the whole PATCH.
pub fn apply_patch_operation(
    resource: &mut Value,
    op: &str,
    path: Option<&str>,
    value: Option<&Value>,
    max_filter_complexity: usize,
) -> AppResult<()> {
    let kind = PatchOpKind::parse(op)?;

    let Some(path) = path else {
        return apply_without_path(resource, kind, value);
    };

    let parsed = ScimPath::parse(path, max_filter_complexity)?;
    parsed.check_mutability()?;

    match kind {
        PatchOpKind::Add | PatchOpKind::Replace => {
            let value = value.ok_or_else(|| {
                AppError::BadRequest(format!("PATCH {} requires a value", op.to_lowercase()))
            })?;
            parsed.apply_set(resource, kind, value)
        }
        PatchOpKind::Remove => {
            if value.is_some() && matches!(parsed, ScimPath::AttrPath(_)) {
                return Err(AppError::BadRequest(
                    "PATCH remove of a full attribute must not carry a value".to_string(),
                ));
            }
            parsed.apply_remove(resource)
        }
    }
}

/// With no path, `add`/`replace` take an object value whose top-level keys
/// are applied attribute by attribute.
fn apply_without_path(
    resource: &mut Value,
    kind: PatchOpKind,
    value: Option<&Value>,
) -> AppResult<()> {
    if kind == PatchOpKind::Remove {
        return Err(AppError::InvalidPath(
            "PATCH remove requires a path".to_string(),
        ));
    }

    let value = value.ok_or_else(|| {
        AppError::BadRequest("PATCH add/replace requires a value".to_string())
    })?;
    let Value::Object(entries) = value else {
        return Err(AppError::BadRequest(
            "PATCH without a path requires an object value".to_string(),
        ));
    };

    for (attr, attr_value) in entries {
        let path = ScimPath::AttrPath(vec![attr.clone()]);
        path.check_mutability()?;
        path.apply_set(resource, kind, attr_value)?;
    }
    Ok(())
}

impl ScimPath {
    /// Parse a SCIM PATCH path according to the RFC 7644 PATH ABNF.
    pub fn parse(path: &str, max_filter_complexity: usize) -> AppResult<Self> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(AppError::InvalidPath("Empty path".to_string()));
        }
        if trimmed.contains('[') {
            Self::parse_value_path(trimmed, max_filter_complexity)
        } else {
            if trimmed.contains(']') {
                return Err(AppError::InvalidPath(format!(
                    "Unbalanced brackets in path: {}",
                    trimmed
                )));
            }
            Self::parse_attr_path(trimmed)
        }
    }

    fn parse_attr_path(path: &str) -> AppResult<Self> {
        let segments = split_attr_segments(path)?;
        Ok(ScimPath::AttrPath(segments))
    }

    fn parse_value_path(path: &str, max_filter_complexity: usize) -> AppResult<Self> {
        let bracket_start = path.find('[').expect("caller checked for '['");
        let bracket_end = path.rfind(']').ok_or_else(|| {
            AppError::InvalidPath(format!("Unbalanced brackets in path: {}", path))
        })?;
        if bracket_end < bracket_start {
            return Err(AppError::InvalidPath(format!(
                "Malformed brackets in path: {}",
                path
            )));
        }

        let attr_part = &path[..bracket_start];
        if attr_part.is_empty() {
            return Err(AppError::InvalidPath(
                "Value path requires an attribute before '['".to_string(),
            ));
        }
        let attr_path = split_attr_segments(attr_part)?;

        let filter_expr = &path[bracket_start + 1..bracket_end];
        if filter_expr.contains('[') {
            return Err(AppError::InvalidPath(format!(
                "Nested value path in: {}",
                path
            )));
        }
        let selector = parse_filter(filter_expr, max_filter_complexity)
            .map_err(|e| match e {
                AppError::FilterTooComplex(msg) => AppError::FilterTooComplex(msg),
                other => AppError::InvalidPath(format!("Invalid selector: {}", other)),
            })?;

        let remainder = &path[bracket_end + 1..];
        let sub_attr = if remainder.is_empty() {
            None
        } else {
            let sub = remainder.strip_prefix('.').ok_or_else(|| {
                AppError::InvalidPath(format!("Malformed sub-attribute in path: {}", path))
            })?;
            if sub.is_empty() || sub.contains(['.', '[', ']']) {
                return Err(AppError::InvalidPath(format!(
                    "Invalid sub-attribute in path: {}",
                    path
                )));
            }
            Some(sub.to_string())
        };

        Ok(ScimPath::ValuePath {
            attr_path,
            selector,
            sub_attr,
        })
    }

    /// Reject paths that target the immutable bookkeeping attributes.
    pub fn check_mutability(&self) -> AppResult<()> {
        let first = match self {
            ScimPath::AttrPath(segments) => segments.first(),
            ScimPath::ValuePath { attr_path, .. } => attr_path.first(),
        };
        if let Some(attr) = first {
            if IMMUTABLE_ATTRIBUTES
                .iter()
                .any(|immutable| attr.eq_ignore_ascii_case(immutable))
            {
                return Err(AppError::Mutability(format!(
                    "Attribute '{}' is immutable",
                    attr
                )));
            }
        }
        Ok(())
    }

    fn apply_set(&self, resource: &mut Value, kind: PatchOpKind, value: &Value) -> AppResult<()> {
        match self {
            ScimPath::AttrPath(segments) => apply_attr_set(resource, segments, kind, value),
            ScimPath::ValuePath {
                attr_path,
                selector,
                sub_attr,
            } => apply_value_path_set(resource, attr_path, selector, sub_attr.as_deref(), kind, value),
        }
    }

    fn apply_remove(&self, resource: &mut Value) -> AppResult<()> {
        match self {
            ScimPath::AttrPath(segments) => apply_attr_remove(resource, segments),
            ScimPath::ValuePath {
                attr_path,
                selector,
                sub_attr,
            } => apply_value_path_remove(resource, attr_path, selector, sub_attr.as_deref()),
        }
    }
}

fn split_attr_segments(path: &str) -> AppResult<Vec<String>> {
    // URI-qualified paths drop the schema URN and address the root
    let unqualified = match path.rfind(':') {
        Some(last_colon) => &path[last_colon + 1..],
        None => path,
    };
    let segments: Vec<String> = unqualified.split('.').map(|s| s.to_string()).collect();
    if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
        return Err(AppError::InvalidPath(format!(
            "Invalid attribute path: {}",
            path
        )));
    }
    Ok(segments)
}

/// Descend to the object holding the final path segment. With `create` set,
/// missing intermediate objects are created on the way down.
fn navigate_parent<'a>(
    resource: &'a mut Value,
    segments: &[String],
    create: bool,
) -> AppResult<Option<&'a mut Map<String, Value>>> {
    let mut current = resource;

    for segment in &segments[..segments.len() - 1] {
        let obj = current.as_object_mut().ok_or_else(|| {
            AppError::BadRequest(format!(
                "Cannot navigate path: '{}' is not reachable through an object",
                segment
            ))
        })?;
        let key = match get_attr_key_in(obj, segment) {
            Some(key) => key,
            None if create => {
                obj.insert(segment.clone(), Value::Object(Map::new()));
                segment.clone()
            }
            None => return Ok(None),
        };
        current = obj.get_mut(&key).expect("key was just resolved");
    }

    match current.as_object_mut() {
        Some(obj) => Ok(Some(obj)),
        None => Err(AppError::BadRequest(
            "Cannot apply PATCH: target parent is not an object".to_string(),
        )),
    }
}

fn get_attr_key_in(obj: &Map<String, Value>, name: &str) -> Option<String> {
    if obj.contains_key(name) {
        return Some(name.to_string());
    }
    obj.keys().find(|key| key.eq_ignore_ascii_case(name)).cloned()
}

fn apply_attr_set(
    resource: &mut Value,
    segments: &[String],
    kind: PatchOpKind,
    value: &Value,
) -> AppResult<()> {
    let parent = navigate_parent(resource, segments, true)?
        .expect("create mode always yields a parent");
    let final_segment = &segments[segments.len() - 1];
    let key = get_attr_key_in(parent, final_segment).unwrap_or_else(|| final_segment.clone());

    match kind {
        PatchOpKind::Add => {
            // Adding to an existing multi-valued attribute appends;
            // everything else sets.
            let appended = match parent.get_mut(&key) {
                Some(Value::Array(existing)) => {
                    match value {
                        Value::Array(new_items) => existing.extend(new_items.iter().cloned()),
                        single => existing.push(single.clone()),
                    }
                    true
                }
                _ => false,
            };
            if !appended {
                parent.insert(key, value.clone());
            }
        }
        PatchOpKind::Replace => {
            parent.insert(key, value.clone());
        }
        PatchOpKind::Remove => unreachable!("remove is routed through apply_remove"),
    }
    Ok(())
}

fn apply_attr_remove(resource: &mut Value, segments: &[String]) -> AppResult<()> {
    let Some(parent) = navigate_parent(resource, segments, false)? else {
        // Removing under a missing parent is a no-op
        return Ok(());
    };
    let final_segment = &segments[segments.len() - 1];
    if let Some(key) = get_attr_key_in(parent, final_segment) {
        parent.remove(&key);
    }
    Ok(())
}

/// Resolve the multi-valued attribute a value path addresses, returning the
/// containing object and the resolved key, or None when absent.
fn locate_array_parent<'a>(
    resource: &'a mut Value,
    attr_path: &[String],
) -> AppResult<Option<(&'a mut Map<String, Value>, String)>> {
    let Some(parent) = navigate_parent(resource, attr_path, false)? else {
        return Ok(None);
    };
    let final_segment = &attr_path[attr_path.len() - 1];
    match get_attr_key_in(parent, final_segment) {
        Some(key) => Ok(Some((parent, key))),
        None => Ok(None),
    }
}

fn matching_indices(array: &[Value], selector: &FilterNode) -> Vec<usize> {
    array
        .iter()
        .enumerate()
        .filter(|&(_, item)| item.is_object() && evaluate(selector, item))
        .map(|(index, _)| index)
        .collect()
}

fn apply_value_path_set(
    resource: &mut Value,
    attr_path: &[String],
    selector: &FilterNode,
    sub_attr: Option<&str>,
    kind: PatchOpKind,
    value: &Value,
) -> AppResult<()> {
    let located = locate_array_parent(resource, attr_path)?;

    let Some((parent, key)) = located else {
        return match kind {
            // add needs a target element to modify
            PatchOpKind::Add => Err(AppError::NoTarget(format!(
                "No elements match the selector on '{}'",
                attr_path.join(".")
            ))),
            _ => Ok(()),
        };
    };

    let Some(Value::Array(array)) = parent.get_mut(&key) else {
        return Err(AppError::BadRequest(format!(
            "Value path requires a multi-valued attribute: {}",
            attr_path.join(".")
        )));
    };

    let indices = matching_indices(array, selector);
    if indices.is_empty() {
        return match kind {
            PatchOpKind::Add => Err(AppError::NoTarget(format!(
                "No elements match the selector on '{}'",
                attr_path.join(".")
            ))),
            // replace with an unmatched selector is a no-op
            _ => Ok(()),
        };
    }

    for index in indices {
        let element = &mut array[index];
        match (kind, sub_attr) {
            (_, Some(sub)) => {
                let obj = element.as_object_mut().ok_or_else(|| {
                    AppError::BadRequest("Matched element is not an object".to_string())
                })?;
                let sub_key = get_attr_key_in(obj, sub).unwrap_or_else(|| sub.to_string());
                obj.insert(sub_key, value.clone());
            }
            (PatchOpKind::Add, None) => {
                // Merge the object value into the matched element
                let Value::Object(new_entries) = value else {
                    return Err(AppError::BadRequest(
                        "PATCH add with a value path requires an object value".to_string(),
                    ));
                };
                let obj = element.as_object_mut().ok_or_else(|| {
                    AppError::BadRequest("Matched element is not an object".to_string())
                })?;
                for (new_key, new_value) in new_entries {
                    let resolved = get_attr_key_in(obj, new_key).unwrap_or_else(|| new_key.clone());
                    obj.insert(resolved, new_value.clone());
                }
            }
            (PatchOpKind::Replace, None) => {
                *element = value.clone();
            }
            (PatchOpKind::Remove, _) => unreachable!("remove is routed through apply_remove"),
        }
    }
    Ok(())
}

fn apply_value_path_remove(
    resource: &mut Value,
    attr_path: &[String],
    selector: &FilterNode,
    sub_attr: Option<&str>,
) -> AppResult<()> {
    let Some((parent, key)) = locate_array_parent(resource, attr_path)? else {
        return Ok(());
    };

    let Some(Value::Array(array)) = parent.get_mut(&key) else {
        return Err(AppError::BadRequest(format!(
            "Value path requires a multi-valued attribute: {}",
            attr_path.join(".")
        )));
    };

    let indices = matching_indices(array, selector);

    match sub_attr {
        Some(sub) => {
            for index in indices {
                if let Some(obj) = array[index].as_object_mut() {
                    if let Some(sub_key) = get_attr_key_in(obj, sub) {
                        obj.remove(&sub_key);
                    }
                }
            }
        }
        None => {
            for index in indices.iter().rev() {
                array.remove(*index);
            }
            if array.is_empty() {
                parent.remove(&key);
            }
        }
    }
    Ok(())
}
