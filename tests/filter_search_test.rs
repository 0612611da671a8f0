use axum_test::TestServer;
use http::StatusCode;
use serde_json::Value;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

#[tokio::test]
async fn test_case_insensitive_filter_match() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::upstream_list_body(
            2,
            1,
            vec![
                common::upstream_user("1", "Alice", true),
                common::upstream_user("2", "bob", true),
            ],
        )))
        .mount(&upstream)
        .await;

    let app = common::setup_default_app(&upstream.uri());
    let server = TestServer::new(app).unwrap();

    let response = server
        .get("/Users")
        .add_query_param("filter", "userName eq \"alice\"")
        .await;
    response.assert_status_ok();

    let list: Value = response.json();
    assert_eq!(list["totalResults"], 1);
    assert_eq!(list["Resources"][0]["id"], "1");
    assert_eq!(list["itemsPerPage"], 1);
}

#[tokio::test]
async fn test_complex_attribute_filter() {
    let upstream = MockServer::start().await;
    let mut corp_user = common::upstream_user("1", "alice", true);
    corp_user["emails"] = serde_json::json!([
        {"type": "work", "primary": true, "value": "a@corp.io"},
        {"type": "home", "primary": false, "value": "a@home.io"}
    ]);
    let mut other_user = common::upstream_user("2", "bob", true);
    other_user["emails"] = serde_json::json!([
        {"type": "work", "primary": true, "value": "b@other.io"}
    ]);

    Mock::given(method("GET"))
        .and(path("/Users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::upstream_list_body(
            2,
            1,
            vec![corp_user, other_user],
        )))
        .mount(&upstream)
        .await;

    let app = common::setup_default_app(&upstream.uri());
    let server = TestServer::new(app).unwrap();

    let response = server
        .get("/Users")
        .add_query_param(
            "filter",
            "emails[type eq \"work\" and primary eq true].value co \"@corp\"",
        )
        .await;
    response.assert_status_ok();

    let list: Value = response.json();
    assert_eq!(list["totalResults"], 1);
    assert_eq!(list["Resources"][0]["id"], "1");
}

#[tokio::test]
async fn test_invalid_filter_returns_scim_error() {
    let upstream = MockServer::start().await;
    let app = common::setup_default_app(&upstream.uri());
    let server = TestServer::new(app).unwrap();

    let response = server
        .get("/Users")
        .add_query_param("filter", "userName eq")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let body: Value = response.json();
    assert_eq!(body["scimType"], "invalidFilter");
    assert_eq!(body["status"], "400");
    assert_eq!(
        body["schemas"][0],
        "urn:ietf:params:scim:api:messages:2.0:Error"
    );
}

#[tokio::test]
async fn test_filter_complexity_limit_returns_too_many() {
    let upstream = MockServer::start().await;
    let mut config = common::test_config(&upstream.uri());
    config.filter.max_complexity = 2;
    let server = TestServer::new(common::setup_app(config)).unwrap();

    // Two comparisons and one logical node: complexity 3
    let response = server
        .get("/Users")
        .add_query_param("filter", "active eq true and name.givenName sw \"A\"")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let body: Value = response.json();
    assert_eq!(body["scimType"], "tooMany");
}

#[tokio::test]
async fn test_projection_keeps_always_returned_attributes() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::upstream_list_body(
            1,
            1,
            vec![common::upstream_user("1", "alice", true)],
        )))
        .mount(&upstream)
        .await;

    let app = common::setup_default_app(&upstream.uri());
    let server = TestServer::new(app).unwrap();

    let response = server
        .get("/Users")
        .add_query_param("filter", "userName pr")
        .add_query_param("attributes", "userName")
        .await;
    response.assert_status_ok();

    let resource = &response.json::<Value>()["Resources"][0];
    assert!(resource.get("userName").is_some());
    assert!(resource.get("id").is_some());
    assert!(resource.get("schemas").is_some());
    assert!(resource.get("meta").is_some());
    assert!(resource.get("active").is_none());

    // excludedAttributes cannot drop the always-returned set either
    let response = server
        .get("/Users")
        .add_query_param("filter", "userName pr")
        .add_query_param("excludedAttributes", "id,active")
        .await;
    let resource = &response.json::<Value>()["Resources"][0];
    assert!(resource.get("id").is_some());
    assert!(resource.get("active").is_none());
}

#[tokio::test]
async fn test_sorted_filtered_results() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::upstream_list_body(
            3,
            1,
            vec![
                common::upstream_user("1", "carol", true),
                common::upstream_user("2", "Alice", true),
                common::upstream_user("3", "bob", true),
            ],
        )))
        .mount(&upstream)
        .await;

    let app = common::setup_default_app(&upstream.uri());
    let server = TestServer::new(app).unwrap();

    let response = server
        .get("/Users")
        .add_query_param("filter", "active eq true")
        .add_query_param("sortBy", "userName")
        .add_query_param("sortOrder", "descending")
        .await;
    response.assert_status_ok();

    let list: Value = response.json();
    let names: Vec<&str> = list["Resources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["userName"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["carol", "bob", "Alice"]);
}

#[tokio::test]
async fn test_v2_prefix_equivalent() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::upstream_list_body(
            1,
            1,
            vec![common::upstream_user("1", "alice", true)],
        )))
        .mount(&upstream)
        .await;

    let app = common::setup_default_app(&upstream.uri());
    let server = TestServer::new(app).unwrap();

    for route in ["/Users", "/v2/Users"] {
        let response = server
            .get(route)
            .add_query_param("filter", "userName eq \"alice\"")
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["totalResults"], 1);
    }
}

#[tokio::test]
async fn test_filtered_list_returns_scim_content_type() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Users"))
        .and(query_param("startIndex", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::upstream_list_body(
            0,
            1,
            vec![],
        )))
        .mount(&upstream)
        .await;

    let app = common::setup_default_app(&upstream.uri());
    let server = TestServer::new(app).unwrap();

    let response = server.get("/Users").await;
    response.assert_status_ok();
    let content_type = response.header("content-type");
    assert!(content_type
        .to_str()
        .unwrap()
        .starts_with("application/scim+json"));
}
