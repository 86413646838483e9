//! App marketplace specializer
//!
//! Store listings link the developer's own policy from a fixed region of the
//! page, surrounded by the store operator's legal links. Only the developer
//! region counts; anything on the operator's origin or domains is dropped.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};
use url::Url;

use super::SiteProfile;
use crate::discovery::request::DiscoveryRequest;
use crate::discovery::{AppDetails, Candidate, DocumentKind, SourceStage, dedupe_candidates, rank_candidates};
use crate::fetcher::StaticFetcher;
use crate::link_extractor::scoring::TextMatch;
use crate::link_extractor::{self, ElementContext, ExtractOptions, LinkScorer, anchor_text};
use crate::utils::{collapse_whitespace, host_matches_domain, normalize_label, origin_string, resolve_href};

// =============================================================================
// Selectors
// =============================================================================

static REGION_ANCHORS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        "section.app-privacy a[href], .app-privacy a[href], section.information a[href], \
         .information-list a[href], [data-developer-links] a[href]",
    )
    .expect("valid region selector")
});

static ALL_ANCHORS: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("valid anchor selector"));

static APP_NAME: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1.product-header__title, h1").expect("valid app name selector"));

static DEVELOPER_NAME: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        ".product-header__identity a, h2.product-header__identity, a[href*=\"/store/apps/dev\"], \
         [itemprop=\"author\"] [itemprop=\"name\"], [itemprop=\"author\"]",
    )
    .expect("valid developer selector")
});

static DATA_CATEGORIES: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".privacy-type__data-category-heading, .privacy-type__grid-content h3, [data-category]")
        .expect("valid data category selector")
});

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("valid title selector"));

const TITLE_SUFFIXES: &[&str] = &[" on the App Store", " - Apps on Google Play", " – Apps on Google Play"];

const DEVELOPER_SITE_LABELS: &[&str] = &["developer website", "visit website", "website"];

// =============================================================================
// Classification
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketplaceFlavor {
    AppStore { app_id: String },
    PlayStore { package: String },
    /// A listing on a configured marketplace host with an unknown layout.
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketplaceRef {
    pub store_url: Url,
    pub flavor: MarketplaceFlavor,
}

impl MarketplaceRef {
    /// An app listing on one of `hosts`. Store front pages are not listings.
    #[must_use]
    pub fn from_url(url: &Url, hosts: &[String]) -> Option<Self> {
        let host = url.host_str()?;
        if !hosts.iter().any(|known| host_matches_domain(host, known)) {
            return None;
        }

        let app_id = url
            .path_segments()?
            .filter_map(|segment| segment.strip_prefix("id"))
            .find(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()));
        let package = url
            .query_pairs()
            .find(|(key, _)| key == "id")
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty());

        let flavor = match (app_id, package) {
            (Some(app_id), _) => MarketplaceFlavor::AppStore {
                app_id: app_id.to_string(),
            },
            (None, Some(package)) if url.path().starts_with("/store/apps") => {
                MarketplaceFlavor::PlayStore { package }
            }
            _ if url.path().contains("/app/") || url.path().contains("/apps/details") => MarketplaceFlavor::Other,
            _ => return None,
        };

        Some(Self {
            store_url: url.clone(),
            flavor,
        })
    }

    /// Play's data-safety page, which carries the developer's privacy link.
    #[must_use]
    pub fn data_safety_url(&self) -> Option<Url> {
        let MarketplaceFlavor::PlayStore { package } = &self.flavor else {
            return None;
        };
        Url::parse(&format!(
            "{}/store/apps/datasafety?id={}",
            origin_string(&self.store_url),
            urlencoding::encode(package)
        ))
        .ok()
    }
}

// =============================================================================
// Discovery
// =============================================================================

#[derive(Debug, Default)]
pub struct MarketplaceFindings {
    pub candidates: Vec<Candidate>,
    pub app_details: Option<AppDetails>,
    /// Developer's own site, when the listing names it.
    pub developer_site: Option<Url>,
}

/// Run the marketplace strategy against a listing.
pub async fn discover(
    store: &MarketplaceRef,
    request: &mut DiscoveryRequest,
    fetcher: &StaticFetcher,
    options: &ExtractOptions<'_>,
    profile: &SiteProfile,
) -> MarketplaceFindings {
    let kind = request.kind();
    let Some((page_url, html)) = fetch_html(request, fetcher, &store.store_url).await else {
        info!(target: "policy_locator::specializer", "Store listing {} could not be fetched", store.store_url);
        return MarketplaceFindings::default();
    };

    let mut findings = analyze_listing(&html, &page_url, kind, options, profile, false);
    let qualifies = |findings: &MarketplaceFindings| findings.candidates.iter().any(|c| c.confidence() >= options.threshold);

    if !qualifies(&findings)
        && let Some(safety_url) = store.data_safety_url()
        && let Some((safety_page, safety_html)) = fetch_html(request, fetcher, &safety_url).await
    {
        let safety = analyze_listing(&safety_html, &safety_page, kind, options, profile, true);
        findings.candidates.extend(safety.candidates);
        findings.developer_site = findings.developer_site.take().or(safety.developer_site);
    }

    if kind == DocumentKind::Terms
        && !qualifies(&findings)
        && let Some(site) = findings.developer_site.clone()
    {
        findings
            .candidates
            .extend(scan_developer_site(&site, request, fetcher, options, profile).await);
    }

    let mut candidates = dedupe_candidates(std::mem::take(&mut findings.candidates));
    rank_candidates(&mut candidates);
    findings.candidates = candidates;
    debug!(
        target: "policy_locator::specializer",
        "Store listing {}: {} {kind} candidates",
        store.store_url,
        findings.candidates.len()
    );
    findings
}

async fn fetch_html(request: &mut DiscoveryRequest, fetcher: &StaticFetcher, url: &Url) -> Option<(Url, String)> {
    match request.fetch(fetcher, url).await {
        Some(result) if result.is_ok() => result.html_body.map(|html| (result.final_url, html)),
        Some(_) => None,
        None => request
            .page(url)
            .map(|page| (page.final_url.clone(), page.html.clone())),
    }
}

/// Fetch the developer's site root and extract the document link there.
async fn scan_developer_site(
    site: &Url,
    request: &mut DiscoveryRequest,
    fetcher: &StaticFetcher,
    options: &ExtractOptions<'_>,
    profile: &SiteProfile,
) -> Vec<Candidate> {
    let Ok(root) = Url::parse(&format!("{}/", origin_string(site))) else {
        return Vec::new();
    };
    if profile.excludes(&root) {
        return Vec::new();
    }
    let Some((page_url, html)) = fetch_html(request, fetcher, &root).await else {
        return Vec::new();
    };

    info!(target: "policy_locator::specializer", "Scanning developer site {page_url}");
    let site_options = options.with_off_site(false);
    let found = link_extractor::extract(&html, &page_url, request.kind(), &site_options)
        .into_iter()
        .map(|candidate| {
            Candidate::new(
                candidate.url().clone(),
                SourceStage::MarketplaceDeveloperSite,
                candidate.confidence(),
                format!("developer site {page_url}: {}", candidate.rationale()),
            )
        })
        .collect();
    profile.filter(found)
}

/// Pull developer-region links, the developer site and app details out of a
/// listing. `whole_page` treats every non-operator anchor as developer region
/// (Play's data-safety page has no stable region markup).
fn analyze_listing(
    html: &str,
    page_url: &Url,
    kind: DocumentKind,
    options: &ExtractOptions<'_>,
    profile: &SiteProfile,
    whole_page: bool,
) -> MarketplaceFindings {
    let document = Html::parse_document(html);
    let scorer = LinkScorer::new(kind, options.dictionary, options.weights);
    let privacy = LinkScorer::new(DocumentKind::Privacy, options.dictionary, options.weights);

    let selector: &Selector = if whole_page { &ALL_ANCHORS } else { &REGION_ANCHORS };
    let mut candidates = Vec::new();
    let mut developer_site = None;
    let mut privacy_site = None;

    for anchor in document.select(selector) {
        let Some(url) = anchor.value().attr("href").and_then(|href| resolve_href(page_url, href)) else {
            continue;
        };
        if profile.excludes(&url) {
            continue;
        }
        let text = anchor_text(&anchor);

        if developer_site.is_none() && is_developer_site_label(&text) {
            developer_site = Some(url.clone());
        }
        if privacy_site.is_none() && privacy.score(&text, &url, ElementContext::Body).is_some() {
            privacy_site = Some(url.clone());
        }

        let Some(signal) = scorer.score(&text, &url, ElementContext::Body) else {
            continue;
        };
        let confident = signal.text_match >= TextMatch::Strong || signal.href_match;
        let confidence = if confident {
            signal.computed_score.max(options.weights.marketplace_region)
        } else {
            signal.computed_score
        };
        candidates.push(Candidate::new(
            url,
            SourceStage::MarketplaceSection,
            confidence,
            format!("developer link '{text}' in the store listing"),
        ));
    }

    MarketplaceFindings {
        candidates,
        app_details: app_details(&document),
        developer_site: developer_site.or(privacy_site),
    }
}

fn is_developer_site_label(text: &str) -> bool {
    let label = normalize_label(text);
    DEVELOPER_SITE_LABELS.iter().any(|known| label == *known)
}

/// App name, developer and declared data categories, when the listing has them.
fn app_details(document: &Html) -> Option<AppDetails> {
    let app_name = document
        .select(&APP_NAME)
        .next()
        .map(own_text)
        .filter(|name| !name.is_empty())
        .or_else(|| {
            let title = document.select(&TITLE).next()?.text().collect::<String>();
            let title = collapse_whitespace(&title);
            let name = TITLE_SUFFIXES
                .iter()
                .find_map(|suffix| title.split_once(suffix).map(|(name, _)| name.trim().to_string()))?;
            (!name.is_empty()).then_some(name)
        });

    let developer_name = document
        .select(&DEVELOPER_NAME)
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .find(|name| !name.is_empty());

    let mut data_categories: Vec<String> = Vec::new();
    for element in document.select(&DATA_CATEGORIES) {
        let category = element
            .value()
            .attr("data-category")
            .map(collapse_whitespace)
            .unwrap_or_else(|| collapse_whitespace(&element.text().collect::<String>()));
        if !category.is_empty() && !data_categories.contains(&category) {
            data_categories.push(category);
        }
    }

    if app_name.is_none() && developer_name.is_none() && data_categories.is_empty() {
        return None;
    }
    Some(AppDetails {
        app_name,
        developer_name,
        data_categories,
    })
}

/// Text directly inside an element, ignoring badges nested in it; falls back
/// to the full text.
fn own_text(element: ElementRef<'_>) -> String {
    let direct: String = element
        .children()
        .filter_map(|child| child.value().as_text().map(|text| text.to_string()))
        .collect();
    let direct = collapse_whitespace(&direct);
    if direct.is_empty() {
        collapse_whitespace(&element.text().collect::<String>())
    } else {
        direct
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DiscoveryConfig, SiteSettings};
    use crate::specializer::SiteClassification;

    const APP_STORE_PAGE: &str = r#"
        <html><head><title>Widget on the App Store</title></head><body>
          <h1 class="product-header__title">Widget <span class="badge">4+</span></h1>
          <h2 class="product-header__identity"><a href="/us/developer/acme/id1">Acme Labs</a></h2>
          <section class="app-privacy">
            <h2>App Privacy</h2>
            <a href="https://acme.example/legal/privacy">Developer's Privacy Policy</a>
            <span class="privacy-type__data-category-heading">Contact Info</span>
            <span class="privacy-type__data-category-heading">Identifiers</span>
          </section>
          <section class="information">
            <a href="https://acme.example/">Developer Website</a>
          </section>
          <footer><a href="https://www.apple.com/legal/privacy/">Privacy Policy</a></footer>
        </body></html>"#;

    fn listing() -> (MarketplaceRef, SiteProfile) {
        let sites = SiteSettings::default();
        let url = Url::parse("https://apps.apple.com/us/app/widget/id123456").unwrap();
        let classification = SiteClassification::classify(&url, &sites);
        let profile = classification.profile(&sites);
        match classification {
            SiteClassification::AppMarketplace(store) => (store, profile),
            other => panic!("unexpected classification {other:?}"),
        }
    }

    #[test]
    fn recognizes_store_flavors() {
        let hosts = SiteSettings::default().app_marketplace_hosts;
        let play = Url::parse("https://play.google.com/store/apps/details?id=com.acme.widget&hl=en").unwrap();
        let play = MarketplaceRef::from_url(&play, &hosts).unwrap();
        assert_eq!(
            play.flavor,
            MarketplaceFlavor::PlayStore {
                package: "com.acme.widget".to_string()
            }
        );
        assert_eq!(
            play.data_safety_url().unwrap().as_str(),
            "https://play.google.com/store/apps/datasafety?id=com.acme.widget"
        );

        let (store, _) = listing();
        assert_eq!(
            store.flavor,
            MarketplaceFlavor::AppStore {
                app_id: "123456".to_string()
            }
        );
        assert!(MarketplaceRef::from_url(&Url::parse("https://play.google.com/store").unwrap(), &hosts).is_none());
    }

    #[test]
    fn developer_region_beats_operator_links() {
        let (store, profile) = listing();
        let config = DiscoveryConfig::default();
        let options = ExtractOptions::from_config(&config).with_off_site(true);

        let findings = analyze_listing(APP_STORE_PAGE, &store.store_url, DocumentKind::Privacy, &options, &profile, false);
        assert_eq!(findings.candidates.len(), 1);
        let candidate = &findings.candidates[0];
        assert_eq!(candidate.url().as_str(), "https://acme.example/legal/privacy");
        assert!(candidate.confidence() >= 0.75);
        assert_eq!(findings.developer_site.unwrap().as_str(), "https://acme.example/");

        let details = findings.app_details.unwrap();
        assert_eq!(details.app_name.as_deref(), Some("Widget"));
        assert_eq!(details.developer_name.as_deref(), Some("Acme Labs"));
        assert_eq!(details.data_categories, ["Contact Info", "Identifiers"]);
    }
}
