use axum::http::HeaderMap;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::config::FilterConfig;
use crate::engine::evaluate;
use crate::engine::resolver::resolve;
use crate::error::{AppError, AppResult};
use crate::models::ScimListResponse;
use crate::parser::filter_ast::{AttrPath, FilterNode};
use crate::parser::ResourceType;
use crate::proxy::ResourceStore;

/// Window of a filtered list request, 1-based per SCIM.
#[derive(Debug, Clone, Copy)]
pub struct PageWindow {
    pub start_index: i64,
    pub count: i64,
}

impl PageWindow {
    pub fn new(start_index: i64, count: i64) -> Self {
        PageWindow {
            start_index: start_index.max(1),
            count: count.max(0),
        }
    }
}

/// Sort directive for the accumulated window, from the sortBy/sortOrder
/// query parameters.
///
/// The upstream cannot sort, so the adapter sorts the matched resources
/// itself. sortBy follows the same attribute-path rules as filters: dotted
/// sub-attributes (`name.givenName`) and URI-qualified names resolve against
/// the resource JSON, and a multi-valued target sorts on its first non-null
/// element.
#[derive(Debug, Clone)]
pub struct SortSpec {
    pub path: AttrPath,
    pub descending: bool,
}

impl SortSpec {
    /// Parse the sortBy/sortOrder pair. sortOrder without sortBy has nothing
    /// to act on and yields no directive.
    pub fn from_params(
        sort_by: Option<&str>,
        sort_order: Option<&str>,
    ) -> AppResult<Option<SortSpec>> {
        let Some(raw) = sort_by else {
            return Ok(None);
        };
        Ok(Some(SortSpec {
            path: parse_sort_path(raw)?,
            descending: parse_sort_order(sort_order)?,
        }))
    }
}

fn parse_sort_path(raw: &str) -> AppResult<AttrPath> {
    let trimmed = raw.trim();
    let (urn, attr) = match trimmed.rfind(':') {
        Some(last_colon) => (
            Some(trimmed[..last_colon].to_string()),
            &trimmed[last_colon + 1..],
        ),
        None => (None, trimmed),
    };

    let segments: Vec<String> = attr.split('.').map(|s| s.to_string()).collect();
    let well_formed = !segments.is_empty()
        && segments.iter().all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '$')
        });
    if !well_formed {
        return Err(AppError::BadRequest(format!(
            "Invalid sortBy attribute: '{}'",
            raw
        )));
    }

    Ok(AttrPath { urn, segments })
}

fn parse_sort_order(sort_order: Option<&str>) -> AppResult<bool> {
    match sort_order.map(|s| s.trim().to_lowercase()) {
        None => Ok(false),
        Some(order) if order == "ascending" => Ok(false),
        Some(order) if order == "descending" => Ok(true),
        Some(other) => Err(AppError::BadRequest(format!(
            "Invalid sortOrder: '{}' (expected ascending or descending)",
            other
        ))),
    }
}

/// Produce a correct filtered window over an upstream that cannot filter.
///
/// Upstream pages of `page_size` are fetched sequentially and matches
/// accumulated until the window is satisfiable, the scan budget
/// `min(count * fetch_multiplier, max_fetch_size)` is spent, or the upstream
/// is exhausted. `totalResults` is the number of matches observed: exact when
/// the upstream was exhausted, otherwise a lower bound.
///
/// Each page fetch is an await point, so a client disconnect (which drops
/// the request future) cancels the scan between pages.
pub async fn fetch_filtered_window(
    store: &dyn ResourceStore,
    resource_type: ResourceType,
    filter: &FilterNode,
    sort: Option<&SortSpec>,
    window: PageWindow,
    page_size: i64,
    config: &FilterConfig,
    headers: &HeaderMap,
) -> AppResult<ScimListResponse> {
    let page_size = page_size.max(1);
    // A zero count still probes one multiplier's worth of records so the
    // reported totalResults means something.
    let needed = if window.count == 0 {
        i64::MAX
    } else {
        window.start_index - 1 + window.count
    };
    let budget = (window.count.max(1) * config.fetch_multiplier).min(config.max_fetch_size);

    let mut matches: Vec<Value> = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut fetched: i64 = 0;
    let mut next_index: i64 = 1;
    let mut exhausted = false;

    while !exhausted && fetched < budget && (matches.len() as i64) < needed {
        let page = store
            .list(resource_type, next_index, page_size, headers)
            .await?;
        let received = page.resources.len() as i64;

        for resource in page.resources {
            // Windows must be unique by id; an upstream shifting under us
            // must not duplicate entries
            if let Some(id) = resource.get("id").and_then(Value::as_str) {
                if !seen_ids.insert(id.to_string()) {
                    continue;
                }
            }
            if evaluate(filter, &resource) {
                matches.push(resource);
            }
        }

        fetched += received;
        next_index += received;
        exhausted = received == 0
            || received < page_size
            || (page.total_results > 0 && fetched >= page.total_results);
    }

    if let Some(spec) = sort {
        sort_resources(&mut matches, spec);
    }

    let total_matches = matches.len() as i64;
    let from = (window.start_index - 1).min(total_matches) as usize;
    let to = (window.start_index - 1 + window.count).min(total_matches) as usize;
    let resources: Vec<Value> = matches
        .into_iter()
        .skip(from)
        .take(to.saturating_sub(from))
        .collect();

    Ok(ScimListResponse::new(
        total_matches,
        window.start_index,
        resources,
    ))
}

/// Stable sort using the evaluator's coercion rules; resources without the
/// sort attribute go last regardless of direction.
pub fn sort_resources(resources: &mut [Value], spec: &SortSpec) {
    resources.sort_by(|a, b| {
        let a_value = first_scalar(a, &spec.path);
        let b_value = first_scalar(b, &spec.path);
        match (a_value, b_value) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => {
                let ordering = compare_sort_values(a, b);
                if spec.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            }
        }
    });
}

fn first_scalar<'a>(resource: &'a Value, path: &AttrPath) -> Option<&'a Value> {
    resolve(resource, path)
        .into_iter()
        .flat_map(|value| match value {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            single => vec![single],
        })
        .find(|value| !value.is_null())
}

fn compare_sort_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(a), Value::String(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}
