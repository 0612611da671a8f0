use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::extractors::{scim_content_type, ScimJson};
use crate::models::ScimPatchOp;
use crate::parser::ResourceType;
use crate::proxy::service::ProxyService;

pub type AppState = (Arc<ProxyService>, Arc<AppConfig>);

pub async fn search_users(
    State((proxy, _)): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, (StatusCode, Json<Value>)> {
    match proxy.list(ResourceType::User, &params, &headers).await {
        Ok(list) => Ok((StatusCode::OK, scim_content_type(), Json(list)).into_response()),
        Err(e) => Err(e.to_response()),
    }
}

pub async fn get_user(
    State((proxy, _)): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, (StatusCode, Json<Value>)> {
    match proxy.get(ResourceType::User, &id, &headers).await {
        Ok(user) => Ok((StatusCode::OK, scim_content_type(), Json(user)).into_response()),
        Err(e) => Err(e.to_response()),
    }
}

pub async fn create_user(
    State((proxy, _)): State<AppState>,
    headers: HeaderMap,
    ScimJson(payload): ScimJson<Value>,
) -> Result<Response, (StatusCode, Json<Value>)> {
    match proxy.create(ResourceType::User, &payload, &headers).await {
        Ok(user) => Ok((StatusCode::CREATED, scim_content_type(), Json(user)).into_response()),
        Err(e) => Err(e.to_response()),
    }
}

pub async fn update_user(
    State((proxy, _)): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    ScimJson(payload): ScimJson<Value>,
) -> Result<Response, (StatusCode, Json<Value>)> {
    match proxy.replace(ResourceType::User, &id, &payload, &headers).await {
        Ok(user) => Ok((StatusCode::OK, scim_content_type(), Json(user)).into_response()),
        Err(e) => Err(e.to_response()),
    }
}

pub async fn patch_user(
    State((proxy, _)): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    ScimJson(patch): ScimJson<ScimPatchOp>,
) -> Result<Response, (StatusCode, Json<Value>)> {
    match proxy.patch(ResourceType::User, &id, &patch, &headers).await {
        Ok(user) => Ok((StatusCode::OK, scim_content_type(), Json(user)).into_response()),
        Err(e) => Err(e.to_response()),
    }
}

pub async fn delete_user(
    State((proxy, _)): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, (StatusCode, Json<Value>)> {
    match proxy.delete(ResourceType::User, &id, &headers).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT.into_response()),
        Err(e) => Err(e.to_response()),
    }
}
