use axum_test::TestServer;
use serde_json::Value;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

fn users(from: usize, to: usize, active_every: usize) -> Vec<Value> {
    (from..to)
        .map(|i| common::upstream_user(&format!("u{}", i), &format!("user{:04}", i), i % active_every == 0))
        .collect()
}

#[tokio::test]
async fn test_unfiltered_list_forwards_window_to_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Users"))
        .and(query_param("startIndex", "11"))
        .and(query_param("count", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::upstream_list_body(
            100,
            11,
            users(10, 15, 1),
        )))
        .expect(1)
        .mount(&upstream)
        .await;

    let app = common::setup_default_app(&upstream.uri());
    let server = TestServer::new(app).unwrap();

    let response = server
        .get("/Users")
        .add_query_param("startIndex", "11")
        .add_query_param("count", "5")
        .await;
    response.assert_status_ok();

    let list: Value = response.json();
    assert_eq!(list["totalResults"], 100);
    assert_eq!(list["Resources"].as_array().unwrap().len(), 5);
    assert_eq!(list["Resources"][0]["id"], "u10");
}

#[tokio::test]
async fn test_filtered_window_spans_upstream_pages() {
    let upstream = MockServer::start().await;
    // 250 users in pages of 100; every other one is active
    Mock::given(method("GET"))
        .and(path("/Users"))
        .and(query_param("startIndex", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::upstream_list_body(
            250,
            1,
            users(0, 100, 2),
        )))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/Users"))
        .and(query_param("startIndex", "101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::upstream_list_body(
            250,
            101,
            users(100, 200, 2),
        )))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/Users"))
        .and(query_param("startIndex", "201"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::upstream_list_body(
            250,
            201,
            users(200, 250, 2),
        )))
        .mount(&upstream)
        .await;

    let app = common::setup_default_app(&upstream.uri());
    let server = TestServer::new(app).unwrap();

    // 125 matches in total; ask for matches 51..100
    let response = server
        .get("/Users")
        .add_query_param("filter", "active eq true")
        .add_query_param("startIndex", "51")
        .add_query_param("count", "50")
        .await;
    response.assert_status_ok();

    let list: Value = response.json();
    let resources = list["Resources"].as_array().unwrap();
    assert_eq!(resources.len(), 50);
    // The 51st active user is u100
    assert_eq!(resources[0]["id"], "u100");
    assert!(resources.iter().all(|r| r["active"].as_bool().unwrap()));
    assert_eq!(list["startIndex"], 51);
    assert!(list["totalResults"].as_i64().unwrap() >= 100);
}

#[tokio::test]
async fn test_filtered_window_exhausting_upstream_reports_exact_total() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Users"))
        .and(query_param("startIndex", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::upstream_list_body(
            60,
            1,
            users(0, 60, 3),
        )))
        .mount(&upstream)
        .await;

    let app = common::setup_default_app(&upstream.uri());
    let server = TestServer::new(app).unwrap();

    let response = server
        .get("/Users")
        .add_query_param("filter", "active eq true")
        .await;
    response.assert_status_ok();

    let list: Value = response.json();
    // Upstream exhausted in one short page, so the total is exact
    assert_eq!(list["totalResults"], 20);
    assert_eq!(list["Resources"].as_array().unwrap().len(), 20);
}

#[tokio::test]
async fn test_fetch_budget_caps_upstream_scanning() {
    let upstream = MockServer::start().await;
    for page in 0..20 {
        Mock::given(method("GET"))
            .and(path("/Users"))
            .and(query_param("startIndex", (page * 100 + 1).to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(common::upstream_list_body(
                2000,
                page * 100 + 1,
                users(page as usize * 100, (page as usize + 1) * 100, 2000),
            )))
            .mount(&upstream)
            .await;
    }

    let mut config = common::test_config(&upstream.uri());
    config.filter.max_fetch_size = 200;
    let server = TestServer::new(common::setup_app(config)).unwrap();

    let response = server
        .get("/Users")
        .add_query_param("filter", "active eq true")
        .add_query_param("count", "50")
        .await;
    response.assert_status_ok();

    let list: Value = response.json();
    // Only u0 is active within the 200-record budget
    assert_eq!(list["totalResults"], 1);

    // Two pages at most were fetched
    let requests = upstream.received_requests().await.unwrap();
    assert!(requests.len() <= 2, "scanned {} pages", requests.len());
}
