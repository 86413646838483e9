//! Redirect handling of the static fetcher against a mock server

mod common;

use mockito::Server;
use url::Url;

use common::{create_html_mock, create_redirect_mock, create_test_html};
use policy_locator::config::FetchSettings;
use policy_locator::{FetchStatus, StaticFetcher};

fn fetcher(max_redirects: usize) -> StaticFetcher {
    let settings = FetchSettings {
        timeout_secs: 5,
        max_redirects,
        max_retries: 0,
        ..FetchSettings::default()
    };
    StaticFetcher::new(&settings).unwrap()
}

fn at(server: &Server, path: &str) -> Url {
    Url::parse(&server.url()).unwrap().join(path).unwrap()
}

#[tokio::test]
async fn redirect_chain_is_recorded() {
    let mut server = Server::new_async().await;
    create_redirect_mock(&mut server, "/start", "/middle").await;
    create_redirect_mock(&mut server, "/middle", "/legal/privacy").await;
    create_html_mock(&mut server, "/legal/privacy", &create_test_html("Privacy Policy", "<h1>Privacy Policy</h1>")).await;

    let result = fetcher(10).fetch(&at(&server, "/start")).await;

    assert!(result.is_ok(), "{:?}", result.status);
    assert!(!result.rejoined);
    assert_eq!(result.requested_url, at(&server, "/start"));
    assert_eq!(result.final_url, at(&server, "/legal/privacy"));
    assert_eq!(result.redirect_chain, [at(&server, "/start"), at(&server, "/middle")]);
    assert!(result.html_body.unwrap().contains("<h1>Privacy Policy</h1>"));
}

#[tokio::test]
async fn redirects_past_the_limit_fail() {
    let mut server = Server::new_async().await;
    for (from, to) in [("/r0", "/r1"), ("/r1", "/r2"), ("/r2", "/r3")] {
        create_redirect_mock(&mut server, from, to).await;
    }
    let beyond = server
        .mock("GET", "/r3")
        .with_status(301)
        .with_header("location", "/done")
        .expect(0)
        .create_async()
        .await;
    let done = server
        .mock("GET", "/done")
        .with_status(200)
        .with_body("<html></html>")
        .expect(0)
        .create_async()
        .await;

    let result = fetcher(2).fetch(&at(&server, "/r0")).await;

    match &result.status {
        FetchStatus::NetworkError(message) => assert!(message.contains("more than 2 redirects"), "{message}"),
        other => panic!("expected a redirect failure, got {other:?}"),
    }
    assert!(result.html_body.is_none());
    assert_eq!(result.redirect_chain.len(), 3);
    beyond.assert_async().await;
    done.assert_async().await;
}

#[tokio::test]
async fn redirect_loop_is_detected() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("GET", "/a")
        .with_status(302)
        .with_header("location", "/b")
        .expect(1)
        .create_async()
        .await;
    create_redirect_mock(&mut server, "/b", "/a").await;

    let result = fetcher(10).fetch(&at(&server, "/a")).await;

    assert_eq!(result.status, FetchStatus::NetworkError("redirect loop".to_string()));
    assert_eq!(result.redirect_chain, [at(&server, "/a"), at(&server, "/b")]);
    assert_eq!(result.final_url, at(&server, "/a"));
    first.assert_async().await;
}

#[tokio::test]
async fn redirect_into_visited_url_stops_without_a_request() {
    let mut server = Server::new_async().await;
    create_redirect_mock(&mut server, "/old-privacy", "/privacy").await;
    let target = server
        .mock("GET", "/privacy")
        .with_status(200)
        .with_body("<html></html>")
        .expect(0)
        .create_async()
        .await;

    let result = fetcher(10)
        .fetch_unvisited(&at(&server, "/old-privacy"), |hop| hop.path() == "/privacy")
        .await;

    assert!(result.rejoined);
    assert_eq!(result.final_url, at(&server, "/privacy"));
    assert_eq!(result.redirect_chain, [at(&server, "/old-privacy")]);
    assert!(result.html_body.is_none());
    target.assert_async().await;
}

#[tokio::test]
async fn redirect_without_location_is_a_network_error() {
    let mut server = Server::new_async().await;
    server.mock("GET", "/moved").with_status(301).create_async().await;

    let result = fetcher(10).fetch(&at(&server, "/moved")).await;

    assert!(matches!(result.status, FetchStatus::NetworkError(ref m) if m.contains("without usable Location")));
    assert!(result.redirect_chain.is_empty());
}
