//! Site-type specializers driven through the engine, with mock servers
//! standing in for the repository host, the store and the developer site

mod common;

use mockito::Server;

use common::{create_html_mock, create_test_html, create_text_mock, landing_page, local_config};
use policy_locator::{Discoverer, DocumentKind};

fn repository_discoverer() -> Discoverer {
    let config = local_config()
        .code_repository_hosts(["127.0.0.1"])
        .build()
        .unwrap();
    Discoverer::new(config).unwrap()
}

fn marketplace_discoverer() -> Discoverer {
    let config = local_config()
        .app_marketplace_hosts(["127.0.0.1"])
        .build()
        .unwrap();
    Discoverer::new(config).unwrap()
}

// =============================================================================
// Code repositories
// =============================================================================

#[tokio::test]
async fn repository_policy_file_wins() {
    let mut host = Server::new_async().await;
    create_text_mock(
        &mut host,
        "/acme/widget/raw/HEAD/PRIVACY.md",
        "# Privacy\n\nWidget never sends telemetry.\n",
    )
    .await;

    let response = repository_discoverer()
        .discover(DocumentKind::Privacy, &format!("{}/acme/widget", host.url()))
        .await
        .unwrap();

    assert!(response.found, "{}", response.message);
    assert_eq!(response.method_used, "code_repository_policy_file");
    assert!(response.resolved_url.unwrap().ends_with("/raw/HEAD/PRIVACY.md"));
    assert!(response.document_excerpt.unwrap().contains("never sends telemetry"));
    assert_eq!(response.attempted_methods[0], "code_repository");
}

#[tokio::test]
async fn repository_readme_link_points_off_host() {
    let mut host = Server::new_async().await;
    let mut site = Server::new_async().await;
    create_text_mock(
        &mut host,
        "/acme/widget/raw/HEAD/README.md",
        &format!(
            "# Widget\n\nA widget.\n\n- [Contributing](CONTRIBUTING.md)\n- [Privacy Policy]({}/privacy)\n",
            site.url()
        ),
    )
    .await;
    create_html_mock(&mut site, "/privacy", &create_test_html("Privacy Policy", "<h1>Privacy Policy</h1>")).await;

    let response = repository_discoverer()
        .discover(DocumentKind::Privacy, &format!("{}/acme/widget", host.url()))
        .await
        .unwrap();

    assert!(response.found, "{}", response.message);
    assert_eq!(response.method_used, "code_repository_readme_link");
    assert_eq!(response.resolved_url.unwrap(), format!("{}/privacy", site.url()));
}

#[tokio::test]
async fn repository_section_is_returned_as_the_document() {
    let mut host = Server::new_async().await;
    create_text_mock(
        &mut host,
        "/acme/widget/raw/HEAD/README.md",
        "# Widget\n\nA widget.\n\n```sh\n# Privacy Policy\ncargo install widget\n```\n",
    )
    .await;
    create_text_mock(
        &mut host,
        "/acme/widget/raw/HEAD/SECURITY.md",
        "# Security\n\nReport issues to security@acme.example.\n\n## Privacy Policy\n\nWidget does not collect personal data.\n\n## Supported versions\n\nOnly the latest release.\n",
    )
    .await;

    let response = repository_discoverer()
        .discover(DocumentKind::Privacy, &format!("{}/acme/widget", host.url()))
        .await
        .unwrap();

    assert!(response.found, "{}", response.message);
    assert_eq!(response.method_used, "code_repository_content");
    assert!(response.resolved_url.unwrap().ends_with("/SECURITY.md"));
    let excerpt = response.document_excerpt.unwrap();
    assert!(excerpt.contains("does not collect personal data"));
    assert!(!excerpt.contains("latest release"));
}

// =============================================================================
// App marketplaces
// =============================================================================

fn listing(developer: &str, store: &str) -> String {
    format!(
        r#"<html><head><title>Widget on the App Store</title></head><body>
  <h1 class="product-header__title">Widget</h1>
  <h2 class="product-header__identity"><a href="/us/developer/acme/id1">Acme Labs</a></h2>
  <section class="app-privacy">
    <h2>App Privacy</h2>
    <a href="{developer}/legal/privacy">Developer's Privacy Policy</a>
    <span class="privacy-type__data-category-heading">Usage Data</span>
  </section>
  <section class="information">
    <a href="{developer}/">Developer Website</a>
  </section>
  <footer><a href="{store}/legal/privacy">Privacy Policy</a> <a href="{store}/legal/terms">Terms of Service</a></footer>
</body></html>"#
    )
}

#[tokio::test]
async fn marketplace_returns_developer_policy_not_operator() {
    let mut store = Server::new_async().await;
    let mut developer = Server::new_async().await;
    let store_listing = listing(&developer.url(), &store.url());
    create_html_mock(&mut store, "/us/app/widget/id123456", &store_listing).await;
    create_html_mock(&mut developer, "/legal/privacy", &create_test_html("Privacy Policy", "<h1>Privacy Policy</h1>")).await;

    let response = marketplace_discoverer()
        .discover(DocumentKind::Privacy, &format!("{}/us/app/widget/id123456", store.url()))
        .await
        .unwrap();

    assert!(response.found, "{}", response.message);
    assert_eq!(response.method_used, "app_marketplace_section");
    assert_eq!(response.resolved_url.unwrap(), format!("{}/legal/privacy", developer.url()));

    let details = response.app_details.unwrap();
    assert_eq!(details.app_name.as_deref(), Some("Widget"));
    assert_eq!(details.developer_name.as_deref(), Some("Acme Labs"));
    assert_eq!(details.data_categories, ["Usage Data"]);
}

#[tokio::test]
async fn marketplace_terms_come_from_developer_site() {
    let mut store = Server::new_async().await;
    let mut developer = Server::new_async().await;
    let store_listing = listing(&developer.url(), &store.url());
    create_html_mock(&mut store, "/us/app/widget/id123456", &store_listing).await;
    create_html_mock(
        &mut developer,
        "/",
        &landing_page(r#"<a href="/legal/privacy">Privacy Policy</a> <a href="/legal/terms">Terms of Service</a>"#),
    )
    .await;
    create_html_mock(&mut developer, "/legal/terms", &create_test_html("Terms of Service", "<h1>Terms of Service</h1>")).await;

    let response = marketplace_discoverer()
        .discover(DocumentKind::Terms, &format!("{}/us/app/widget/id123456", store.url()))
        .await
        .unwrap();

    assert!(response.found, "{}", response.message);
    assert_eq!(response.method_used, "app_marketplace_developer_site");
    let resolved = response.resolved_url.unwrap();
    assert!(resolved.starts_with(&format!("{}/", developer.url())), "{resolved}");
    assert!(!resolved.starts_with(&format!("{}/", store.url())));
}
