//! URL helpers shared by the fetcher, the extractors and the engine.

use std::net::IpAddr;

use url::Url;

/// Second-level labels that sit under a country code, as in `example.co.uk`.
const COMPOUND_SLDS: &[&str] = &["co", "com", "org", "net", "gov", "ac", "edu", "ne", "or"];

/// Subdomains that commonly host a site's legal documents.
const LEGAL_SUBDOMAINS: &[&str] = &["legal.", "terms.", "policies.", "policy.", "privacy.", "docs."];

/// Resolve an `href` found on a page against that page's URL.
///
/// Returns `None` for links that cannot lead to a document: fragments on the
/// same page, `javascript:`, `mailto:`, `tel:` and anything that is not http(s).
#[must_use]
pub fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:", "sms:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let mut resolved = base.join(href).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved)
}

/// Key used for the per-request visited set: the URL without its fragment.
#[must_use]
pub fn visit_key(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.trim().to_string(),
    }
}

/// Number of non-empty path segments, used to prefer `/privacy` over
/// `/legal/docs/privacy-v2` when confidences tie.
#[must_use]
pub fn path_depth(url: &Url) -> usize {
    url.path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).count())
        .unwrap_or(0)
}

/// `scheme://host[:port]` for a URL.
#[must_use]
pub fn origin_string(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// Whether the host is an IP literal or `localhost`.
#[must_use]
pub fn is_ip_or_localhost(host: &str) -> bool {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    bare.eq_ignore_ascii_case("localhost") || bare.parse::<IpAddr>().is_ok()
}

/// Registrable root of a host: `shop.example.co.uk` becomes `example.co.uk`,
/// `www.example.com` becomes `example.com`.
#[must_use]
pub fn root_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if is_ip_or_localhost(&host) {
        return host;
    }
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return host;
    }

    let n = labels.len();
    let tld = labels[n - 1];
    let sld = labels[n - 2];
    if tld.len() == 2 && COMPOUND_SLDS.contains(&sld) {
        labels[n - 3..].join(".")
    } else {
        labels[n - 2..].join(".")
    }
}

/// Whether `host` equals `domain` or is one of its subdomains.
#[must_use]
pub fn host_matches_domain(host: &str, domain: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let domain = domain.to_ascii_lowercase();
    host == domain || host.ends_with(&format!(".{domain}"))
}

/// Whether two hosts belong to the same site for link-scoring purposes.
///
/// Related means equal, sharing the same registrable root, one being a
/// subdomain of the other, or the link host being a dedicated legal
/// subdomain such as `legal.example.com`.
#[must_use]
pub fn domains_related(site_host: &str, link_host: &str) -> bool {
    let site = site_host.to_ascii_lowercase();
    let link = link_host.to_ascii_lowercase();
    if site == link {
        return true;
    }
    if is_ip_or_localhost(&site) || is_ip_or_localhost(&link) {
        return false;
    }

    let site_root = root_domain(&site);
    let link_root = root_domain(&link);
    if site_root == link_root {
        return true;
    }
    if host_matches_domain(&link, &site) || host_matches_domain(&site, &link) {
        return true;
    }

    LEGAL_SUBDOMAINS.iter().any(|prefix| {
        link.strip_prefix(prefix)
            .is_some_and(|rest| root_domain(rest) == site_root)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_domain_handles_compound_country_codes() {
        assert_eq!(root_domain("www.example.com"), "example.com");
        assert_eq!(root_domain("shop.example.co.uk"), "example.co.uk");
        assert_eq!(root_domain("example.com"), "example.com");
        assert_eq!(root_domain("127.0.0.1"), "127.0.0.1");
    }

    #[test]
    fn related_domains() {
        assert!(domains_related("www.example.com", "example.com"));
        assert!(domains_related("example.com", "legal.example.com"));
        assert!(domains_related("app.example.com", "help.example.com"));
        assert!(!domains_related("example.com", "google.com"));
        assert!(!domains_related("127.0.0.1", "10.0.0.1"));
    }

    #[test]
    fn resolve_href_drops_non_document_links() {
        let base = Url::parse("https://example.com/about/").unwrap();
        assert!(resolve_href(&base, "#top").is_none());
        assert!(resolve_href(&base, "javascript:void(0)").is_none());
        assert!(resolve_href(&base, "mailto:legal@example.com").is_none());
        assert_eq!(
            resolve_href(&base, "../privacy#section").unwrap().as_str(),
            "https://example.com/privacy"
        );
    }

    #[test]
    fn depth_counts_segments() {
        let shallow = Url::parse("https://example.com/privacy").unwrap();
        let deep = Url::parse("https://example.com/legal/docs/privacy-v2/").unwrap();
        assert_eq!(path_depth(&shallow), 1);
        assert_eq!(path_depth(&deep), 3);
    }
}
