use std::env;

/// Application configuration, sourced from environment variables. The proxy
/// fronts exactly one upstream SCIM service, so there is no config file; the
/// deployment environment is the single source of truth.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub upstream: UpstreamConfig,
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub filter: FilterConfig,
    pub patch: PatchConfig,
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL of the legacy SCIM service, e.g. "http://legacy:8080/scim/v2"
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// The upstream's maximum server-side page size
    pub page_size: i64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Tokio worker thread count
    pub workers: usize,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub max_entries: usize,
}

#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// AST node budget per filter expression
    pub max_complexity: usize,
    /// Hard cap on upstream records scanned per filtered list request
    pub max_fetch_size: i64,
    /// Scan budget multiplier: fetch up to count * multiplier records
    pub fetch_multiplier: i64,
}

#[derive(Debug, Clone)]
pub struct PatchConfig {
    /// Forward PATCH documents verbatim instead of read-modify-write
    pub upstream_native: bool,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through a lookup function. Tests feed maps here so
    /// they never mutate process-wide environment state.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("UPSTREAM_BASE_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "UPSTREAM_BASE_URL is required".to_string())?;

        let parsed = url::Url::parse(&base_url)
            .map_err(|e| format!("Invalid UPSTREAM_BASE_URL '{}': {}", base_url, e))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(format!(
                "UPSTREAM_BASE_URL must be http or https, got '{}'",
                parsed.scheme()
            ));
        }

        Ok(AppConfig {
            upstream: UpstreamConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                timeout_secs: parse_var(&lookup, "UPSTREAM_TIMEOUT", 30)?,
                page_size: parse_var(&lookup, "UPSTREAM_PAGE_SIZE", 100)?,
            },
            server: ServerConfig {
                host: lookup("PROXY_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_var(&lookup, "PROXY_PORT", 8000u16)?,
                workers: parse_var(&lookup, "PROXY_WORKERS", 4usize)?,
            },
            cache: CacheConfig {
                enabled: parse_bool(&lookup, "CACHE_ENABLED", true)?,
                ttl_secs: parse_var(&lookup, "CACHE_TTL", 300)?,
                max_entries: parse_var(&lookup, "CACHE_MAX_SIZE", 1000usize)?,
            },
            filter: FilterConfig {
                max_complexity: parse_var(&lookup, "MAX_FILTER_COMPLEXITY", 50usize)?,
                max_fetch_size: parse_var(&lookup, "MAX_FILTER_FETCH_SIZE", 2000)?,
                fetch_multiplier: parse_var(&lookup, "FILTER_FETCH_MULTIPLIER", 20)?,
            },
            patch: PatchConfig {
                upstream_native: parse_bool(&lookup, "UPSTREAM_NATIVE_PATCH", false)?,
            },
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, String>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| format!("Invalid {}: '{}' ({})", key, raw, e)),
        None => Ok(default),
    }
}

fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> Result<bool, String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            other => Err(format!("Invalid {}: '{}'", key, other)),
        },
        None => Ok(default),
    }
}
