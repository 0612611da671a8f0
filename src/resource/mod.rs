pub mod attribute_filter;
pub mod group;
pub mod health;
pub mod resource_type;
pub mod service_provider;
pub mod user;
