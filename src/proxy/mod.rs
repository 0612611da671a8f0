pub mod cache;
pub mod client;
pub mod pagination;
pub mod service;

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde_json::Value;

use crate::error::AppResult;
use crate::models::ScimListResponse;
use crate::parser::ResourceType;

/// The seam between the proxy core and the legacy upstream. `UpstreamClient`
/// implements it over HTTP, `CachedStore` decorates it with the response
/// cache, and tests substitute in-memory fakes.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch one page of resources; `start_index` is 1-based per SCIM.
    async fn list(
        &self,
        resource_type: ResourceType,
        start_index: i64,
        count: i64,
        headers: &HeaderMap,
    ) -> AppResult<ScimListResponse>;

    async fn get(
        &self,
        resource_type: ResourceType,
        id: &str,
        headers: &HeaderMap,
    ) -> AppResult<Value>;

    async fn create(
        &self,
        resource_type: ResourceType,
        body: &Value,
        headers: &HeaderMap,
    ) -> AppResult<Value>;

    async fn replace(
        &self,
        resource_type: ResourceType,
        id: &str,
        body: &Value,
        headers: &HeaderMap,
    ) -> AppResult<Value>;

    /// Upstream-native PATCH; only used when the deployment opts in.
    async fn patch(
        &self,
        resource_type: ResourceType,
        id: &str,
        body: &Value,
        headers: &HeaderMap,
    ) -> AppResult<Value>;

    async fn delete(
        &self,
        resource_type: ResourceType,
        id: &str,
        headers: &HeaderMap,
    ) -> AppResult<()>;
}
