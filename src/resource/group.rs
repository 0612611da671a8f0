use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

use crate::extractors::{scim_content_type, ScimJson};
use crate::models::ScimPatchOp;
use crate::parser::ResourceType;
use crate::resource::user::AppState;

pub async fn search_groups(
    State((proxy, _)): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, (StatusCode, Json<Value>)> {
    match proxy.list(ResourceType::Group, &params, &headers).await {
        Ok(list) => Ok((StatusCode::OK, scim_content_type(), Json(list)).into_response()),
        Err(e) => Err(e.to_response()),
    }
}

pub async fn get_group(
    State((proxy, _)): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, (StatusCode, Json<Value>)> {
    match proxy.get(ResourceType::Group, &id, &headers).await {
        Ok(group) => Ok((StatusCode::OK, scim_content_type(), Json(group)).into_response()),
        Err(e) => Err(e.to_response()),
    }
}

pub async fn create_group(
    State((proxy, _)): State<AppState>,
    headers: HeaderMap,
    ScimJson(payload): ScimJson<Value>,
) -> Result<Response, (StatusCode, Json<Value>)> {
    match proxy.create(ResourceType::Group, &payload, &headers).await {
        Ok(group) => Ok((StatusCode::CREATED, scim_content_type(), Json(group)).into_response()),
        Err(e) => Err(e.to_response()),
    }
}

pub async fn update_group(
    State((proxy, _)): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    ScimJson(payload): ScimJson<Value>,
) -> Result<Response, (StatusCode, Json<Value>)> {
    match proxy.replace(ResourceType::Group, &id, &payload, &headers).await {
        Ok(group) => Ok((StatusCode::OK, scim_content_type(), Json(group)).into_response()),
        Err(e) => Err(e.to_response()),
    }
}

pub async fn patch_group(
    State((proxy, _)): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    ScimJson(patch): ScimJson<ScimPatchOp>,
) -> Result<Response, (StatusCode, Json<Value>)> {
    match proxy.patch(ResourceType::Group, &id, &patch, &headers).await {
        Ok(group) => Ok((StatusCode::OK, scim_content_type(), Json(group)).into_response()),
        Err(e) => Err(e.to_response()),
    }
}

pub async fn delete_group(
    State((proxy, _)): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, (StatusCode, Json<Value>)> {
    match proxy.delete(ResourceType::Group, &id, &headers).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT.into_response()),
        Err(e) => Err(e.to_response()),
    }
}
