//! Integration tests for fetching dufs listings over HTTP.

mod support;

use dufs_crawler::listing::{ListingClient, ListingError, PathType};
use support::{listing_body, listing_mock};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_fetch_decodes_listing_in_server_order() {
    let server = MockServer::start().await;
    listing_mock(
        "/files/",
        "/files/",
        &[("zeta.txt", false), ("alpha", true), ("mid.bin", false)],
    )
    .expect(1)
    .mount(&server)
    .await;

    let client = ListingClient::new().expect("client");
    let listing = client
        .fetch(&format!("{}/files/", server.uri()))
        .await
        .expect("listing should decode");

    assert_eq!(listing.href, "/files/");
    let names: Vec<&str> = listing.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["zeta.txt", "alpha", "mid.bin"]);
    assert_eq!(listing.entries[1].path_type, PathType::Dir);
}

#[tokio::test]
async fn test_fetch_sends_browser_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("json", ""))
        .and(header("user-agent", "Mozilla/5.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_body("/", &[])))
        .expect(1)
        .mount(&server)
        .await;

    let client = ListingClient::new().expect("client");
    let result = client.fetch(&format!("{}/", server.uri())).await;
    assert!(result.is_ok(), "fetch should match UA mock: {:?}", result.err());
}

#[tokio::test]
async fn test_fetch_non_success_status_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/private/"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let client = ListingClient::new().expect("client");
    let result = client.fetch(&format!("{}/private/", server.uri())).await;
    match result {
        Err(ListingError::HttpStatus { status, url }) => {
            assert_eq!(status, 403);
            assert!(url.ends_with("/private/?json"), "url was {url}");
        }
        other => panic!("Expected HttpStatus(403), got: {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_html_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<!DOCTYPE html><html></html>"))
        .mount(&server)
        .await;

    let client = ListingClient::new().expect("client");
    let result = client.fetch(&format!("{}/", server.uri())).await;
    assert!(
        matches!(result, Err(ListingError::Decode { .. })),
        "got: {result:?}"
    );
}

#[tokio::test]
async fn test_fetch_connection_refused_is_network_error() {
    // Bind then drop a listener to get a port nothing is serving.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .expect("bind")
        .port();

    let client = ListingClient::new().expect("client");
    let result = client.fetch(&format!("http://127.0.0.1:{port}/")).await;
    assert!(
        matches!(result, Err(ListingError::Network { .. })),
        "got: {result:?}"
    );
}
