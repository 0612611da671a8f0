use axum_test::TestServer;
use http::StatusCode;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

mod common;

#[tokio::test]
async fn test_get_resource_passthrough() {
    let upstream = MockServer::start().await;
    let user = common::upstream_user("abc", "alice", true);
    Mock::given(method("GET"))
        .and(path("/Users/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user.clone()))
        .mount(&upstream)
        .await;

    let app = common::setup_default_app(&upstream.uri());
    let server = TestServer::new(app).unwrap();

    let response = server.get("/Users/abc").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), user);
}

#[tokio::test]
async fn test_get_resource_is_cached() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Users/abc"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::upstream_user("abc", "alice", true)),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let app = common::setup_default_app(&upstream.uri());
    let server = TestServer::new(app).unwrap();

    server.get("/Users/abc").await.assert_status_ok();
    server.get("/Users/abc").await.assert_status_ok();
    // wiremock's expect(1) verifies on drop that only one request arrived
}

#[tokio::test]
async fn test_write_invalidates_cached_get() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Users/abc"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::upstream_user("abc", "alice", true)),
        )
        .expect(2)
        .mount(&upstream)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/Users/abc"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&upstream)
        .await;

    let app = common::setup_default_app(&upstream.uri());
    let server = TestServer::new(app).unwrap();

    server.get("/Users/abc").await.assert_status_ok();
    server.delete("/Users/abc").await.assert_status(StatusCode::NO_CONTENT);
    // The delete dropped the cached entry, so this hits the upstream again
    server.get("/Users/abc").await.assert_status_ok();
}

#[tokio::test]
async fn test_create_resource() {
    let upstream = MockServer::start().await;
    let payload = json!({
        "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
        "userName": "alice"
    });
    let created = common::upstream_user("new-id", "alice", true);
    Mock::given(method("POST"))
        .and(path("/Users"))
        .and(body_json(payload.clone()))
        .respond_with(ResponseTemplate::new(201).set_body_json(created.clone()))
        .mount(&upstream)
        .await;

    let app = common::setup_default_app(&upstream.uri());
    let server = TestServer::new(app).unwrap();

    let response = server.post("/Users").json(&payload).await;
    response.assert_status(StatusCode::CREATED);
    assert_eq!(response.json::<Value>(), created);
}

#[tokio::test]
async fn test_put_resource() {
    let upstream = MockServer::start().await;
    let payload = common::upstream_user("abc", "alice.renamed", true);
    Mock::given(method("PUT"))
        .and(path("/Users/abc"))
        .and(body_json(payload.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload.clone()))
        .mount(&upstream)
        .await;

    let app = common::setup_default_app(&upstream.uri());
    let server = TestServer::new(app).unwrap();

    let response = server.put("/Users/abc").json(&payload).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["userName"], "alice.renamed");
}

#[tokio::test]
async fn test_auth_headers_forwarded_hop_by_hop_stripped() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Users/abc"))
        .and(header("authorization", "Bearer secret-token"))
        .and(|request: &Request| !request.headers.contains_key("keep-alive"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::upstream_user("abc", "alice", true)),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let app = common::setup_default_app(&upstream.uri());
    let server = TestServer::new(app).unwrap();

    let response = server
        .get("/Users/abc")
        .add_header(
            http::HeaderName::from_static("authorization"),
            http::HeaderValue::from_static("Bearer secret-token"),
        )
        .add_header(
            http::HeaderName::from_static("keep-alive"),
            http::HeaderValue::from_static("timeout=5"),
        )
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_groups_crud_roundtrip() {
    let upstream = MockServer::start().await;
    let group = json!({
        "schemas": ["urn:ietf:params:scim:schemas:core:2.0:Group"],
        "id": "g1",
        "displayName": "Engineering",
        "members": [{"value": "u1"}]
    });
    Mock::given(method("GET"))
        .and(path("/Groups/g1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(group.clone()))
        .mount(&upstream)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/Groups/g1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&upstream)
        .await;

    let app = common::setup_default_app(&upstream.uri());
    let server = TestServer::new(app).unwrap();

    let response = server.get("/Groups/g1").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["displayName"], "Engineering");

    server
        .delete("/Groups/g1")
        .await
        .assert_status(StatusCode::NO_CONTENT);
}
