//! End-to-end: a listener bound with an allowed-hosts ACL and a password,
//! fronting a managed-exporter handler that reverse-proxies to a mock
//! upstream. Exercises ACL accept, password rejection/acceptance, and the
//! proxied response body in one pass.

use std::net::{IpAddr, TcpListener as StdTcpListener};
use std::sync::Arc;

use sentinel::acl::AllowedHosts;
use sentinel::http::{HttpDispatcher, ManagedExporterHandler, PasswordConfig};
use sentinel::net::listener::BindSpec;
use sentinel::net::Listener;

fn free_port() -> u16 {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn proxies_authenticated_requests_and_rejects_the_rest() {
    let backend = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path("/metrics"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("metrics body"))
        .mount(&backend)
        .await;

    let handler = ManagedExporterHandler::new(
        "test-exporter".to_string(),
        "/metrics".to_string(),
        backend.address().to_string(),
        PasswordConfig::parse("secret"),
    );
    let mut dispatcher = HttpDispatcher::new();
    dispatcher.register(Arc::new(handler));

    let allowed_hosts = AllowedHosts::parse("127.0.0.1", false).unwrap();
    let port = free_port();
    let spec = BindSpec { bind: "127.0.0.1".parse::<IpAddr>().unwrap(), port, tls: false };

    let listener = Listener::new(spec, None, allowed_hosts, Arc::new(dispatcher)).unwrap();
    let handle = listener.start().await.unwrap();

    let base = format!("http://127.0.0.1:{port}/metrics");
    let client = reqwest::Client::new();

    let unauthenticated = client.get(&base).send().await.unwrap();
    assert_eq!(unauthenticated.status(), 401);

    let authenticated = client.get(format!("{base}?password=secret")).send().await.unwrap();
    assert_eq!(authenticated.status(), 200);
    assert_eq!(authenticated.text().await.unwrap(), "metrics body");

    let missing = client.get(format!("http://127.0.0.1:{port}/not-mapped")).send().await.unwrap();
    assert_eq!(missing.status(), 404);

    handle.stop().await;
}
