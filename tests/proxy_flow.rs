//! End-to-end tests: real listener, mock upstream.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use template_proxy::routing::ParameterMode;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

use common::{config_with_routes, start_proxy, ADMIN_KEY};

const GITHUB_PATH: &str =
    "/service/github/owner/twbs/repository/bootstrap/tag/v5.3.8/filename/bootstrap.zip";

fn github_pattern(upstream: &MockServer, cache: u64) -> String {
    format!(
        "github={}/{{owner}}/{{repository}}/releases/download/{{tag}}/{{filename}}|cache:{}",
        upstream.uri(),
        cache
    )
}

async fn mount_release(upstream: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/twbs/bootstrap/releases/download/v5.3.8/bootstrap.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("PK-zip", "application/zip"))
        .expect(expected_calls)
        .mount(upstream)
        .await;
}

#[tokio::test]
async fn test_github_release_miss_then_hit() {
    let upstream = MockServer::start().await;
    mount_release(&upstream, 1).await;

    let proxy = start_proxy(config_with_routes(
        None,
        vec![github_pattern(&upstream, 60)],
        ParameterMode::Named,
    ))
    .await;
    let client = reqwest::Client::new();

    let res = client.get(proxy.url(GITHUB_PATH)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let h = res.headers().clone();
    assert_eq!(h["content-type"], "application/zip");
    assert_eq!(h["content-disposition"], "attachment; filename=\"bootstrap.zip\"");
    assert_eq!(h["access-control-allow-origin"], "*");
    assert_eq!(h["x-cache"], "MISS");
    assert_eq!(h["x-cache-age"], "0");
    assert_eq!(h["x-cache-expires-in"], "60");
    assert_eq!(h["cache-control"], "public, max-age=60");
    assert!(h.contains_key("x-cache-expires-at"));
    assert!(h.contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "PK-zip");

    proxy.clock.advance(Duration::from_secs(15));

    let res = client.get(proxy.url(GITHUB_PATH)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let h = res.headers().clone();
    assert_eq!(h["x-cache"], "HIT");
    assert_eq!(h["x-cache-age"], "15");
    assert_eq!(h["x-cache-expires-in"], "45");
    assert_eq!(h["cache-control"], "public, max-age=45");
    assert_eq!(h["content-type"], "application/zip");
    assert_eq!(res.text().await.unwrap(), "PK-zip");
}

#[tokio::test]
async fn test_expired_entry_is_refetched() {
    let upstream = MockServer::start().await;
    mount_release(&upstream, 2).await;

    let proxy = start_proxy(config_with_routes(
        None,
        vec![github_pattern(&upstream, 60)],
        ParameterMode::Named,
    ))
    .await;
    let client = reqwest::Client::new();

    let res = client.get(proxy.url(GITHUB_PATH)).send().await.unwrap();
    assert_eq!(res.headers()["x-cache"], "MISS");

    proxy.clock.advance(Duration::from_secs(60));

    let res = client.get(proxy.url(GITHUB_PATH)).send().await.unwrap();
    assert_eq!(res.headers()["x-cache"], "MISS");
}

#[tokio::test]
async fn test_capture_placeholder_keeps_structure() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/docs/v1/guide.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("guide", "text/plain"))
        .expect(1)
        .mount(&upstream)
        .await;

    let proxy = start_proxy(config_with_routes(
        Some(format!("{}/files/{{path-last}}", upstream.uri())),
        Vec::new(),
        ParameterMode::Named,
    ))
    .await;

    let res = reqwest::get(proxy.url("/path-last/docs/v1/guide.txt")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-cache"], "DISABLED");
    assert!(res.headers().get("cache-control").is_none());
    assert_eq!(res.text().await.unwrap(), "guide");
}

#[tokio::test]
async fn test_missing_placeholder_is_rejected_before_fetch() {
    let upstream = MockServer::start().await;
    mount_release(&upstream, 0).await;

    let proxy = start_proxy(config_with_routes(
        None,
        vec![github_pattern(&upstream, 60)],
        ParameterMode::Named,
    ))
    .await;

    let res = reqwest::get(proxy.url(
        "/service/github/owner/twbs/repository/bootstrap/filename/bootstrap.zip",
    ))
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    assert!(res.text().await.unwrap().contains("tag"));
}

#[tokio::test]
async fn test_route_selection_errors() {
    let upstream = MockServer::start().await;
    let proxy = start_proxy(config_with_routes(
        None,
        vec![github_pattern(&upstream, 0)],
        ParameterMode::Named,
    ))
    .await;

    let res = reqwest::get(proxy.url("/service/gitlab/owner/x")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(res.text().await.unwrap().contains("gitlab"));

    let res = reqwest::get(proxy.url("/owner/twbs")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = reqwest::get(proxy.url("/service/github/owner")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_allow_list_rejects_with_403() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/facebook/react"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("ok", "text/plain"))
        .expect(1)
        .mount(&upstream)
        .await;

    let mut config = config_with_routes(
        Some(format!("{}/{{owner}}/{{repo}}", upstream.uri())),
        Vec::new(),
        ParameterMode::Named,
    );
    config.routes.allowed_params = vec![BTreeMap::from([(
        "owner".to_string(),
        "facebook*".to_string(),
    )])];
    let proxy = start_proxy(config).await;

    let res = reqwest::get(proxy.url("/owner/facebook/repo/react")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = reqwest::get(proxy.url("/owner/myfacebook/repo/react")).await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn test_positional_mode_folds_tail() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/rust-lang/src/lib.rs"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("fn main() {}", "text/plain"))
        .expect(1)
        .mount(&upstream)
        .await;

    let proxy = start_proxy(config_with_routes(
        Some(format!("{}/repos/{{1}}/{{2}}", upstream.uri())),
        Vec::new(),
        ParameterMode::Positional,
    ))
    .await;

    let res = reqwest::get(proxy.url("/rust-lang/src/lib.rs")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "fn main() {}");

    let res = reqwest::get(proxy.url("/rust-lang")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upstream_status_is_propagated_and_not_cached() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&upstream)
        .await;

    let proxy = start_proxy(config_with_routes(
        None,
        vec![github_pattern(&upstream, 60)],
        ParameterMode::Named,
    ))
    .await;

    for _ in 0..2 {
        let res = reqwest::get(proxy.url(GITHUB_PATH)).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn test_invalidate_requires_bearer_token() {
    let upstream = MockServer::start().await;
    mount_release(&upstream, 2).await;

    let proxy = start_proxy(config_with_routes(
        None,
        vec![github_pattern(&upstream, 60)],
        ParameterMode::Named,
    ))
    .await;
    let client = reqwest::Client::new();

    client.get(proxy.url(GITHUB_PATH)).send().await.unwrap();

    let res = client
        .delete(proxy.url("/invalidate-cache/github"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .delete(proxy.url("/invalidate-cache/github"))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .delete(proxy.url("/invalidate-cache/nope"))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .delete(proxy.url("/invalidate-cache/github"))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["route"], "github");
    assert_eq!(body["deleted"], 1);

    let res = client.get(proxy.url(GITHUB_PATH)).send().await.unwrap();
    assert_eq!(res.headers()["x-cache"], "MISS");
}

#[tokio::test]
async fn test_cleanup_removes_expired_entries() {
    let upstream = MockServer::start().await;
    mount_release(&upstream, 1).await;

    let proxy = start_proxy(config_with_routes(
        None,
        vec![github_pattern(&upstream, 60)],
        ParameterMode::Named,
    ))
    .await;
    let client = reqwest::Client::new();

    client.get(proxy.url(GITHUB_PATH)).send().await.unwrap();

    let cleanup = || {
        client
            .post(proxy.url("/cleanup-cache"))
            .bearer_auth(ADMIN_KEY)
            .send()
    };

    let body: Value = cleanup().await.unwrap().json().await.unwrap();
    assert_eq!(body["deleted"], 0);

    proxy.clock.advance(Duration::from_secs(61));

    let body: Value = cleanup().await.unwrap().json().await.unwrap();
    assert_eq!(body["deleted"], 1);
}

#[tokio::test]
async fn test_management_rejected_without_configured_key() {
    let upstream = MockServer::start().await;
    let mut config = config_with_routes(
        None,
        vec![github_pattern(&upstream, 60)],
        ParameterMode::Named,
    );
    config.admin.api_key = None;
    let proxy = start_proxy(config).await;

    let res = reqwest::Client::new()
        .post(proxy.url("/cleanup-cache"))
        .bearer_auth("anything")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_get_on_management_path_is_proxied() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/invalidate-cache/report.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("a,b", "text/csv"))
        .expect(1)
        .mount(&upstream)
        .await;

    let proxy = start_proxy(config_with_routes(
        Some(format!("{}/{{1}}/{{2}}", upstream.uri())),
        Vec::new(),
        ParameterMode::Positional,
    ))
    .await;

    let res = reqwest::get(proxy.url("/invalidate-cache/report.csv")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "a,b");
}
