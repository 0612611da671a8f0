use axum::{middleware, routing::get, Router};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::logging;
use crate::proxy::service::ProxyService;
use crate::resource::{group, health, resource_type, service_provider, user};

/// Assemble the proxy's router. Every SCIM route is registered both bare and
/// under /v2 for client compatibility; /health stays unprefixed.
pub fn build_app(proxy: Arc<ProxyService>, config: Arc<AppConfig>) -> Router {
    let mut app = Router::new().route("/health", get(health::health));

    for prefix in ["", "/v2"] {
        app = app
            .route(
                &format!("{}/Users", prefix),
                get(user::search_users).post(user::create_user),
            )
            .route(
                &format!("{}/Users/:id", prefix),
                get(user::get_user)
                    .put(user::update_user)
                    .patch(user::patch_user)
                    .delete(user::delete_user),
            )
            .route(
                &format!("{}/Groups", prefix),
                get(group::search_groups).post(group::create_group),
            )
            .route(
                &format!("{}/Groups/:id", prefix),
                get(group::get_group)
                    .put(group::update_group)
                    .patch(group::patch_group)
                    .delete(group::delete_group),
            )
            .route(
                &format!("{}/ServiceProviderConfig", prefix),
                get(service_provider::service_provider_config),
            )
            .route(
                &format!("{}/ResourceTypes", prefix),
                get(resource_type::resource_types),
            )
            .route(
                &format!("{}/ResourceTypes/User", prefix),
                get(resource_type::user_resource_type),
            )
            .route(
                &format!("{}/ResourceTypes/Group", prefix),
                get(resource_type::group_resource_type),
            );
    }

    app.layer(middleware::from_fn(logging::logging_middleware))
        .with_state((proxy, config))
}
