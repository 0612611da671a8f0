use async_trait::async_trait;
use axum::http::HeaderMap;
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;

use crate::config::UpstreamConfig;
use crate::error::{AppError, AppResult};
use crate::models::ScimListResponse;
use crate::parser::ResourceType;
use crate::proxy::ResourceStore;

/// Hop-by-hop headers are connection-scoped and never forwarded (RFC 7230
/// section 6.1). `host`, `content-length` and `content-type` belong to the
/// proxy's own connection and body and are regenerated per request.
const NON_FORWARDED_HEADERS: [&str; 11] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
    "content-type",
];

/// Pooled HTTP client for the legacy upstream SCIM service.
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .user_agent(concat!("scim-proxy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(UpstreamClient {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Copy the client's request headers onto the upstream request, minus
    /// hop-by-hop headers. Authentication therefore passes through verbatim.
    fn forward_headers(headers: &HeaderMap) -> HeaderMap {
        let mut forwarded = HeaderMap::new();
        for (name, value) in headers {
            if NON_FORWARDED_HEADERS.contains(&name.as_str()) {
                continue;
            }
            forwarded.insert(name, value.clone());
        }
        if !forwarded.contains_key("accept") {
            forwarded.insert(
                "accept",
                axum::http::HeaderValue::from_static("application/scim+json"),
            );
        }
        forwarded
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        headers: &HeaderMap,
    ) -> AppResult<reqwest::Response> {
        // GETs are idempotent and retried once on connection-level failures;
        // writes go out exactly once.
        let attempts = if method == Method::GET { 2 } else { 1 };

        let mut last_error: Option<reqwest::Error> = None;
        for _ in 0..attempts {
            let mut builder = self
                .http
                .request(method.clone(), self.url(path))
                .headers(Self::forward_headers(headers));
            if let Some(body) = body {
                builder = builder
                    .header("Content-Type", "application/scim+json")
                    .json(body);
            }

            match builder.send().await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_timeout() => {
                    return Err(AppError::UpstreamUnavailable(format!(
                        "Upstream request timed out: {}",
                        e
                    )));
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(AppError::UpstreamUnavailable(format!(
            "Upstream request failed: {}",
            last_error.expect("at least one attempt was made")
        )))
    }

    /// Surface non-2xx upstream responses unchanged so SCIM error envelopes
    /// pass through.
    async fn into_json(response: reqwest::Response) -> AppResult<Value> {
        let status = response.status();
        if status.is_success() {
            if status == reqwest::StatusCode::NO_CONTENT {
                return Ok(Value::Null);
            }
            return response
                .json::<Value>()
                .await
                .map_err(|e| AppError::UpstreamUnavailable(format!(
                    "Failed to read upstream response: {}",
                    e
                )));
        }

        let body_text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<Value>(&body_text)
            .unwrap_or_else(|_| serde_json::json!({ "detail": body_text }));
        Err(AppError::Upstream {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ResourceStore for UpstreamClient {
    async fn list(
        &self,
        resource_type: ResourceType,
        start_index: i64,
        count: i64,
        headers: &HeaderMap,
    ) -> AppResult<ScimListResponse> {
        let path = format!(
            "{}?startIndex={}&count={}",
            resource_type.endpoint(),
            start_index,
            count
        );
        let response = self.send(Method::GET, &path, None, headers).await?;
        let body = Self::into_json(response).await?;
        serde_json::from_value(body).map_err(|e| {
            AppError::UpstreamUnavailable(format!("Malformed upstream ListResponse: {}", e))
        })
    }

    async fn get(
        &self,
        resource_type: ResourceType,
        id: &str,
        headers: &HeaderMap,
    ) -> AppResult<Value> {
        let path = format!("{}/{}", resource_type.endpoint(), id);
        let response = self.send(Method::GET, &path, None, headers).await?;
        Self::into_json(response).await
    }

    async fn create(
        &self,
        resource_type: ResourceType,
        body: &Value,
        headers: &HeaderMap,
    ) -> AppResult<Value> {
        let response = self
            .send(Method::POST, resource_type.endpoint(), Some(body), headers)
            .await?;
        Self::into_json(response).await
    }

    async fn replace(
        &self,
        resource_type: ResourceType,
        id: &str,
        body: &Value,
        headers: &HeaderMap,
    ) -> AppResult<Value> {
        let path = format!("{}/{}", resource_type.endpoint(), id);
        let response = self.send(Method::PUT, &path, Some(body), headers).await?;
        Self::into_json(response).await
    }

    async fn patch(
        &self,
        resource_type: ResourceType,
        id: &str,
        body: &Value,
        headers: &HeaderMap,
    ) -> AppResult<Value> {
        let path = format!("{}/{}", resource_type.endpoint(), id);
        let response = self.send(Method::PATCH, &path, Some(body), headers).await?;
        Self::into_json(response).await
    }

    async fn delete(
        &self,
        resource_type: ResourceType,
        id: &str,
        headers: &HeaderMap,
    ) -> AppResult<()> {
        let path = format!("{}/{}", resource_type.endpoint(), id);
        let response = self.send(Method::DELETE, &path, None, headers).await?;
        Self::into_json(response).await.map(|_| ())
    }
}
