use axum::http::HeaderMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::models::{ScimListResponse, ScimPatchOp, PATCH_OP_SCHEMA};
use crate::parser::filter_parser::parse_filter;
use crate::parser::patch_parser::{apply_patch_operation, PatchOpKind, ScimPath};
use crate::parser::ResourceType;
use crate::proxy::cache::{CachedStore, ResponseCache};
use crate::proxy::pagination::{fetch_filtered_window, sort_resources, PageWindow, SortSpec};
use crate::proxy::ResourceStore;
use crate::resource::attribute_filter::AttributeFilter;

/// Request coordinator: dispatches the SCIM surface onto the upstream store,
/// the pagination adapter and the PATCH engine.
///
/// Reads go through the cached store; the PATCH read-modify-write reads
/// through the raw upstream so it never works on stale data.
pub struct ProxyService {
    upstream: Arc<dyn ResourceStore>,
    store: Arc<dyn ResourceStore>,
    config: Arc<AppConfig>,
}

impl ProxyService {
    pub fn new(upstream: Arc<dyn ResourceStore>, config: Arc<AppConfig>) -> Self {
        let store: Arc<dyn ResourceStore> = if config.cache.enabled {
            let cache = Arc::new(ResponseCache::from_config(&config.cache));
            Arc::new(CachedStore::new(upstream.clone(), cache))
        } else {
            upstream.clone()
        };
        ProxyService {
            upstream,
            store,
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// GET /{Users,Groups} with filter, projection, sorting and pagination.
    pub async fn list(
        &self,
        resource_type: ResourceType,
        params: &HashMap<String, String>,
        headers: &HeaderMap,
    ) -> AppResult<ScimListResponse> {
        let start_index = parse_numeric_param(params, "startIndex")?.unwrap_or(1);
        let count = parse_numeric_param(params, "count")?
            .unwrap_or(100)
            .min(self.config.filter.max_fetch_size);
        let window = PageWindow::new(start_index, count);

        let projection = AttributeFilter::from_params(
            params.get("attributes").map(String::as_str),
            params.get("excludedAttributes").map(String::as_str),
        );
        let sort = SortSpec::from_params(
            params.get("sortBy").map(String::as_str),
            params.get("sortOrder").map(String::as_str),
        )?;

        let mut response = match params.get("filter") {
            Some(filter_str) => {
                let filter = parse_filter(filter_str, self.config.filter.max_complexity)?;
                fetch_filtered_window(
                    self.store.as_ref(),
                    resource_type,
                    &filter,
                    sort.as_ref(),
                    window,
                    self.config.upstream.page_size,
                    &self.config.filter,
                    headers,
                )
                .await?
            }
            None => {
                // Without a filter the upstream window is already correct;
                // forward it and only sort the returned page locally
                let mut page = self
                    .store
                    .list(resource_type, window.start_index, window.count, headers)
                    .await?;
                if let Some(ref spec) = sort {
                    sort_resources(&mut page.resources, spec);
                }
                page
            }
        };

        // Projection runs after filtering
        response.resources = response
            .resources
            .iter()
            .map(|resource| projection.apply_to_resource(resource))
            .collect();
        response.items_per_page = Some(response.resources.len() as i64);

        Ok(response)
    }

    pub async fn get(
        &self,
        resource_type: ResourceType,
        id: &str,
        headers: &HeaderMap,
    ) -> AppResult<Value> {
        self.store.get(resource_type, id, headers).await
    }

    pub async fn create(
        &self,
        resource_type: ResourceType,
        body: &Value,
        headers: &HeaderMap,
    ) -> AppResult<Value> {
        self.store.create(resource_type, body, headers).await
    }

    pub async fn replace(
        &self,
        resource_type: ResourceType,
        id: &str,
        body: &Value,
        headers: &HeaderMap,
    ) -> AppResult<Value> {
        self.store.replace(resource_type, id, body, headers).await
    }

    pub async fn delete(
        &self,
        resource_type: ResourceType,
        id: &str,
        headers: &HeaderMap,
    ) -> AppResult<()> {
        self.store.delete(resource_type, id, headers).await
    }

    /// PATCH a resource. Default mode is read-modify-write: fetch the current
    /// resource from the upstream (bypassing the cache), run the operations
    /// in document order, and PUT the result back. When the upstream natively
    /// supports RFC 7644 PATCH the document is validated and forwarded.
    ///
    /// The read-modify-write is not linearizable with concurrent writers on
    /// the upstream; a competing write between the GET and the PUT is lost.
    pub async fn patch(
        &self,
        resource_type: ResourceType,
        id: &str,
        patch: &ScimPatchOp,
        headers: &HeaderMap,
    ) -> AppResult<Value> {
        self.validate_patch(patch)?;

        if self.config.patch.upstream_native {
            let body = serde_json::to_value(patch)?;
            return self.store.patch(resource_type, id, &body, headers).await;
        }

        let mut resource = self.upstream.get(resource_type, id, headers).await?;
        for operation in &patch.operations {
            apply_patch_operation(
                &mut resource,
                &operation.op,
                operation.path.as_deref(),
                operation.value.as_ref(),
                self.config.filter.max_complexity,
            )?;
        }

        // The cached store invalidates this resource type on the write
        self.store
            .replace(resource_type, id, &resource, headers)
            .await
    }

    /// Reject malformed PATCH documents before touching the upstream.
    fn validate_patch(&self, patch: &ScimPatchOp) -> AppResult<()> {
        if !patch.schemas.iter().any(|s| s == PATCH_OP_SCHEMA) {
            return Err(AppError::BadRequest(format!(
                "PATCH request must declare the {} schema",
                PATCH_OP_SCHEMA
            )));
        }
        if patch.operations.is_empty() {
            return Err(AppError::BadRequest(
                "PATCH request carries no operations".to_string(),
            ));
        }
        for operation in &patch.operations {
            let kind = PatchOpKind::parse(&operation.op)?;
            match operation.path {
                Some(ref path) => {
                    let parsed = ScimPath::parse(path, self.config.filter.max_complexity)?;
                    parsed.check_mutability()?;
                }
                None if kind == PatchOpKind::Remove => {
                    return Err(AppError::InvalidPath(
                        "PATCH remove requires a path".to_string(),
                    ));
                }
                None => {}
            }
        }
        Ok(())
    }
}

fn parse_numeric_param(params: &HashMap<String, String>, name: &str) -> AppResult<Option<i64>> {
    match params.get(name) {
        Some(raw) => raw.trim().parse::<i64>().map(Some).map_err(|_| {
            AppError::BadRequest(format!("Invalid value for {}: '{}'", name, raw))
        }),
        None => Ok(None),
    }
}
