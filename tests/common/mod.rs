use axum::Router;
use std::sync::Arc;

use scim_proxy::config::{
    AppConfig, CacheConfig, FilterConfig, PatchConfig, ServerConfig, UpstreamConfig,
};
use scim_proxy::proxy::client::UpstreamClient;
use scim_proxy::proxy::service::ProxyService;
use scim_proxy::startup::build_app;

/// Configuration pointed at a mock upstream, with proxy defaults suitable
/// for tests.
pub fn test_config(upstream_url: &str) -> AppConfig {
    AppConfig {
        upstream: UpstreamConfig {
            base_url: upstream_url.trim_end_matches('/').to_string(),
            timeout_secs: 5,
            page_size: 100,
        },
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            workers: 1,
        },
        cache: CacheConfig {
            enabled: true,
            ttl_secs: 60,
            max_entries: 100,
        },
        filter: FilterConfig {
            max_complexity: 50,
            max_fetch_size: 2000,
            fetch_multiplier: 20,
        },
        patch: PatchConfig {
            upstream_native: false,
        },
    }
}

/// Assemble the proxy app over the given configuration, exactly as the
/// binary does.
pub fn setup_app(config: AppConfig) -> Router {
    let config = Arc::new(config);
    let client = UpstreamClient::new(&config.upstream).expect("client should build");
    let proxy = Arc::new(ProxyService::new(Arc::new(client), config.clone()));
    build_app(proxy, config)
}

/// Proxy app in the default test configuration against a mock upstream URL.
pub fn setup_default_app(upstream_url: &str) -> Router {
    setup_app(test_config(upstream_url))
}

/// A page of users shaped like a legacy upstream ListResponse.
#[allow(dead_code)]
pub fn upstream_list_body(
    total: i64,
    start_index: i64,
    resources: Vec<serde_json::Value>,
) -> serde_json::Value {
    serde_json::json!({
        "schemas": ["urn:ietf:params:scim:api:messages:2.0:ListResponse"],
        "totalResults": total,
        "startIndex": start_index,
        "itemsPerPage": resources.len(),
        "Resources": resources
    })
}

#[allow(dead_code)]
pub fn upstream_user(id: &str, user_name: &str, active: bool) -> serde_json::Value {
    serde_json::json!({
        "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
        "id": id,
        "userName": user_name,
        "active": active,
        "meta": {"resourceType": "User"}
    })
}
