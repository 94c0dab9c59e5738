//! HttpTransport against a local mock server

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use guardia_uptime::clock::SystemClock;
use guardia_uptime::config::HttpMethod;
use guardia_uptime::probe::{HttpTransport, ProbeError, ProbeRequest, Transport};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport() -> HttpTransport {
    HttpTransport::new(Arc::new(SystemClock)).unwrap()
}

fn request(url: String) -> ProbeRequest {
    ProbeRequest {
        url,
        method: HttpMethod::Get,
        timeout: Duration::from_secs(5),
        follow_redirects: true,
        max_redirects: 3,
        user_agent: "guardia-uptime-test".to_string(),
        inspect_tls: true,
    }
}

fn redirect_to(location: &str) -> ResponseTemplate {
    ResponseTemplate::new(302).insert_header("Location", location)
}

#[tokio::test]
async fn test_reports_status_body_and_latency() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .and(header("user-agent", "guardia-uptime-test"))
        .respond_with(ResponseTemplate::new(200).set_body_string("all good"))
        .mount(&server)
        .await;

    let response = transport()
        .probe(&request(format!("{}/health", server.uri())))
        .await
        .unwrap();

    assert_eq!(response.status_code, 200);
    assert_eq!(response.body, "all good");
    assert!(response.ssl.is_none(), "plain http carries no certificate");
}

#[tokio::test]
async fn test_non_success_status_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let response = transport().probe(&request(server.uri())).await.unwrap();
    assert_eq!(response.status_code, 503);
}

#[tokio::test]
async fn test_follows_redirects() {
    let server = MockServer::start().await;
    Mock::given(path("/old"))
        .respond_with(redirect_to("/new"))
        .mount(&server)
        .await;
    Mock::given(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
        .mount(&server)
        .await;

    let response = transport()
        .probe(&request(format!("{}/old", server.uri())))
        .await
        .unwrap();

    assert_eq!(response.status_code, 200);
    assert_eq!(response.body, "moved");
    assert!(response.final_url.ends_with("/new"));
}

#[tokio::test]
async fn test_redirect_not_followed_when_disabled() {
    let server = MockServer::start().await;
    Mock::given(path("/old"))
        .respond_with(redirect_to("/new"))
        .mount(&server)
        .await;

    let mut req = request(format!("{}/old", server.uri()));
    req.follow_redirects = false;

    let response = transport().probe(&req).await.unwrap();
    assert_eq!(response.status_code, 302);
}

#[tokio::test]
async fn test_too_many_redirects() {
    let server = MockServer::start().await;
    Mock::given(path("/loop"))
        .respond_with(redirect_to("/loop"))
        .expect(4)
        .mount(&server)
        .await;

    let result = transport()
        .probe(&request(format!("{}/loop", server.uri())))
        .await;

    assert_eq!(result, Err(ProbeError::TooManyRedirects { max: 3 }));
    assert_eq!(
        result.unwrap_err().to_string(),
        "too many redirects (max 3)"
    );
}

#[tokio::test]
async fn test_redirect_without_location() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(301))
        .mount(&server)
        .await;

    let result = transport().probe(&request(server.uri())).await;
    assert_eq!(
        result,
        Err(ProbeError::RedirectWithoutLocation { status: 301 })
    );
}

#[tokio::test]
async fn test_see_other_switches_to_get() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .respond_with(ResponseTemplate::new(303).insert_header("Location", "/result"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/result"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut req = request(format!("{}/submit", server.uri()));
    req.method = HttpMethod::Post;

    let response = transport().probe(&req).await.unwrap();
    assert_eq!(response.status_code, 200);
}

#[tokio::test]
async fn test_head_has_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let mut req = request(server.uri());
    req.method = HttpMethod::Head;

    let response = transport().probe(&req).await.unwrap();
    assert_eq!(response.status_code, 204);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let mut req = request(server.uri());
    req.timeout = Duration::from_millis(200);

    let result = transport().probe(&req).await;
    assert_eq!(result, Err(ProbeError::Timeout(Duration::from_millis(200))));
}

#[tokio::test]
async fn test_connection_refused() {
    // bind then drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let result = transport()
        .probe(&request(format!("http://127.0.0.1:{port}/")))
        .await;
    assert_matches!(result, Err(ProbeError::Connect(_)));
}

#[tokio::test]
async fn test_invalid_url() {
    let result = transport().probe(&request("not a url".to_string())).await;
    assert_matches!(result, Err(ProbeError::InvalidUrl { .. }));
}
