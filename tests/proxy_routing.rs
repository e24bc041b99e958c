//! End-to-end routing through the running proxy.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;

mod common;

use common::{Reply, SeenRequest};

fn api_rules(api: SocketAddr, manager: SocketAddr) -> String {
    format!(
        r#"
        [[rules]]
        name = "api"
        match = "/api"
        target = "http://{api}"
        rewrite = {{ strip_prefix = "/api" }}
        change_origin = true
        follow_redirects = true

        [[rules.bypass]]
        path = "/api/manager"
        status = 302
        location = "http://localhost:20090"

        [[rules]]
        name = "manager"
        match = "/manager"
        target = "http://{manager}"
        change_origin = false
        "#
    )
}

#[tokio::test]
async fn test_api_path_is_rewritten_and_host_changed() {
    let api = common::start_echo_backend().await;
    let manager = common::start_echo_backend().await;
    let proxy = common::start_proxy(&api_rules(api, manager), None).await;

    let res = common::client().get(proxy.url("/api/users/5?page=2")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), format!("/users/5?page=2 host={api}"));
}

#[tokio::test]
async fn test_manager_path_forwarded_unchanged_with_client_host() {
    let api = common::start_echo_backend().await;
    let manager = common::start_echo_backend().await;
    let proxy = common::start_proxy(&api_rules(api, manager), None).await;

    let res = common::client().get(proxy.url("/manager/status")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), format!("/manager/status host={}", proxy.addr));
}

#[tokio::test]
async fn test_bypass_redirects_without_touching_backend() {
    let hits = Arc::new(AtomicU32::new(0));
    let counter = hits.clone();
    let api = common::start_programmable_backend(move |_| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Reply::ok("backend")
        }
    })
    .await;
    let manager = common::start_echo_backend().await;
    let proxy = common::start_proxy(&api_rules(api, manager), None).await;

    for path in ["/api/manager", "/api/manager?from=menu"] {
        let res = common::client().get(proxy.url(path)).send().await.unwrap();

        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers()["location"], "http://localhost:20090");
        assert!(res.headers().contains_key("x-request-id"));
    }
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unmatched_path_is_not_proxied() {
    let api = common::start_echo_backend().await;
    let manager = common::start_echo_backend().await;
    let proxy = common::start_proxy(&api_rules(api, manager), None).await;

    let res = common::client().get(proxy.url("/static/logo.png")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unmatched_path_served_from_static_dir() {
    let dir = std::env::temp_dir().join(format!("dev-proxy-static-{}", std::process::id()));
    std::fs::create_dir_all(dir.join("static")).unwrap();
    std::fs::write(dir.join("static/hello.txt"), "local file").unwrap();

    let api = common::start_echo_backend().await;
    let config = format!(
        r#"
        [fallback]
        static_dir = "{}"

        [[rules]]
        name = "api"
        match = "/api"
        target = "http://{api}"
        "#,
        dir.display()
    );
    let proxy = common::start_proxy(&config, None).await;

    let res = common::client().get(proxy.url("/static/hello.txt")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "local file");

    let res = common::client().get(proxy.url("/api/x")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), format!("/api/x host={api}"));

    let _ = std::fs::remove_dir_all(&dir);
}

async fn redirecting_backend() -> SocketAddr {
    common::start_programmable_backend(|seen: SeenRequest| async move {
        match seen.target.as_str() {
            "/old" => Reply::redirect(302, "/new"),
            "/submit" => Reply::redirect(303, "/done"),
            _ => Reply::ok(format!("{} {} body={}", seen.method, seen.target, seen.body)),
        }
    })
    .await
}

#[tokio::test]
async fn test_follow_redirects_chases_upstream() {
    let backend = redirecting_backend().await;
    let config = format!(
        r#"
        [[rules]]
        name = "follow"
        match = "/follow"
        target = "http://{backend}"
        rewrite = {{ strip_prefix = "/follow" }}
        follow_redirects = true

        [[rules]]
        name = "relay"
        match = "/relay"
        target = "http://{backend}"
        rewrite = {{ strip_prefix = "/relay" }}
        "#
    );
    let proxy = common::start_proxy(&config, None).await;
    let client = common::client();

    let res = client.get(proxy.url("/follow/old")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "GET /new body=");

    let res = client.get(proxy.url("/relay/old")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.headers()["location"], "/new");
}

#[tokio::test]
async fn test_see_other_switches_post_to_get() {
    let backend = redirecting_backend().await;
    let config = format!(
        r#"
        [[rules]]
        name = "follow"
        match = "/"
        target = "http://{backend}"
        follow_redirects = true
        "#
    );
    let proxy = common::start_proxy(&config, None).await;
    let client = common::client();

    let res = client.post(proxy.url("/echo")).body("payload").send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "POST /echo body=payload");

    let res = client.post(proxy.url("/submit")).body("payload").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "GET /done body=");
}

#[tokio::test]
async fn test_redirect_loop_stops_at_limit() {
    let hits = Arc::new(AtomicU32::new(0));
    let counter = hits.clone();
    let backend = common::start_programmable_backend(move |_| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Reply::redirect(307, "/again")
        }
    })
    .await;
    let config = format!(
        r#"
        [upstream]
        max_redirects = 2

        [[rules]]
        name = "loop"
        match = "/"
        target = "http://{backend}"
        follow_redirects = true
        "#
    );
    let proxy = common::start_proxy(&config, None).await;

    let res = common::client().get(proxy.url("/start")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

fn credentials_seen(seen: &SeenRequest) -> String {
    format!(
        "authorization={} cookie={}",
        seen.header("authorization").unwrap_or("-"),
        seen.header("cookie").unwrap_or("-")
    )
}

#[tokio::test]
async fn test_cross_origin_redirect_drops_credentials() {
    let foreign = common::start_programmable_backend(|seen: SeenRequest| async move {
        Reply::ok(format!("{} {}", seen.target, credentials_seen(&seen)))
    })
    .await;
    let home = common::start_programmable_backend(move |seen: SeenRequest| async move {
        match seen.target.as_str() {
            "/away" => Reply::redirect(302, format!("http://{foreign}/landing")),
            "/stay" => Reply::redirect(302, "/kept"),
            _ => Reply::ok(format!("{} {}", seen.target, credentials_seen(&seen))),
        }
    })
    .await;
    let config = format!(
        r#"
        [[rules]]
        name = "home"
        match = "/"
        target = "http://{home}"
        follow_redirects = true
        "#
    );
    let proxy = common::start_proxy(&config, None).await;
    let client = common::client();

    let res = client
        .get(proxy.url("/away"))
        .header("authorization", "Bearer SECRET")
        .header("cookie", "session=SECRET")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "/landing authorization=- cookie=-");

    let res = client
        .get(proxy.url("/stay"))
        .header("authorization", "Bearer SECRET")
        .header("cookie", "session=SECRET")
        .send()
        .await
        .unwrap();
    assert_eq!(
        res.text().await.unwrap(),
        "/kept authorization=Bearer SECRET cookie=session=SECRET"
    );
}

#[tokio::test]
async fn test_oversized_body_rejected_before_upstream() {
    let hits = Arc::new(AtomicU32::new(0));
    let counter = hits.clone();
    let backend = common::start_programmable_backend(move |seen: SeenRequest| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Reply::ok(format!("received {}", seen.body.len()))
        }
    })
    .await;
    let config = format!(
        r#"
        [upstream]
        max_buffered_body_bytes = 16

        [[rules]]
        name = "api"
        match = "/api"
        target = "http://{backend}"
        follow_redirects = true

        [[rules]]
        name = "stream"
        match = "/stream"
        target = "http://{backend}"
        "#
    );
    let proxy = common::start_proxy(&config, None).await;
    let client = common::client();

    let res = client.post(proxy.url("/api/upload")).body(vec![b'x'; 64]).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    // Without redirect replay nothing is buffered, so the limit does not apply.
    let res = client.post(proxy.url("/stream/upload")).body(vec![b'x'; 64]).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "received 64");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_slow_upstream_is_gateway_timeout() {
    let backend = common::start_programmable_backend(|_| async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        Reply::ok("late")
    })
    .await;
    let config = format!(
        r#"
        [upstream]
        request_timeout_secs = 1

        [[rules]]
        name = "slow"
        match = "/api"
        target = "http://{backend}"
        "#
    );
    let proxy = common::start_proxy(&config, None).await;

    let res = common::client().get(proxy.url("/api/report")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let dead = common::closed_addr().await;
    let config = format!(
        r#"
        [[rules]]
        name = "dead"
        match = "/api"
        target = "http://{dead}"
        "#
    );
    let proxy = common::start_proxy(&config, None).await;

    let res = common::client().get(proxy.url("/api/users")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_client_request_id_is_echoed() {
    let api = common::start_echo_backend().await;
    let manager = common::start_echo_backend().await;
    let proxy = common::start_proxy(&api_rules(api, manager), None).await;

    let res = common::client()
        .get(proxy.url("/api/users"))
        .header("x-request-id", "trace-42")
        .send()
        .await
        .unwrap();

    assert_eq!(res.headers()["x-request-id"], "trace-42");
}
