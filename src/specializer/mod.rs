//! Site-type specializers
//!
//! Some sites have a predictable shape that beats generic link scoring:
//! code repositories keep legal text in files, app marketplaces keep the
//! developer's links in a fixed region. Classification happens once per
//! request; the resulting [`SiteProfile`] keeps every later stage from
//! returning the hosting operator's own legal pages.

pub mod app_marketplace;
pub mod code_repository;

use url::Url;

pub use app_marketplace::{MarketplaceFindings, MarketplaceFlavor, MarketplaceRef};
pub use code_repository::RepoRef;

use crate::config::SiteSettings;
use crate::discovery::Candidate;
use crate::utils::{host_matches_domain, is_ip_or_localhost, origin_string, root_domain};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteClassification {
    Generic,
    CodeRepository(RepoRef),
    AppMarketplace(MarketplaceRef),
}

impl SiteClassification {
    /// Classify by host against the configured host lists, then by path shape.
    #[must_use]
    pub fn classify(url: &Url, sites: &SiteSettings) -> Self {
        if let Some(repo) = RepoRef::from_url(url, &sites.code_repository_hosts) {
            return Self::CodeRepository(repo);
        }
        if let Some(store) = MarketplaceRef::from_url(url, &sites.app_marketplace_hosts) {
            return Self::AppMarketplace(store);
        }
        Self::Generic
    }

    #[must_use]
    pub fn is_generic(&self) -> bool {
        matches!(self, Self::Generic)
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::CodeRepository(_) => "code_repository",
            Self::AppMarketplace(_) => "app_marketplace",
        }
    }

    /// Link policy for every stage of a request on this site.
    #[must_use]
    pub fn profile(&self, sites: &SiteSettings) -> SiteProfile {
        match self {
            Self::Generic => SiteProfile::generic(),
            Self::CodeRepository(repo) => {
                let mut profile = SiteProfile::operated_by(&repo.origin, sites);
                profile.allowed_prefixes = repo.own_prefixes();
                profile
            }
            Self::AppMarketplace(store) => SiteProfile::operated_by(&store.store_url, sites),
        }
    }
}

/// Which links a request may return.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteProfile {
    allow_off_site: bool,
    excluded_origins: Vec<String>,
    excluded_domains: Vec<String>,
    /// URL prefixes that stay allowed even on an excluded origin.
    allowed_prefixes: Vec<String>,
}

impl SiteProfile {
    #[must_use]
    pub fn generic() -> Self {
        Self::default()
    }

    /// Hosted content: the operator's origin and domains are excluded,
    /// off-site links are expected.
    fn operated_by(site: &Url, sites: &SiteSettings) -> Self {
        let mut excluded_domains = sites.operator_domains.clone();
        if let Some(host) = site.host_str()
            && !is_ip_or_localhost(host)
        {
            excluded_domains.push(root_domain(host));
        }
        Self {
            allow_off_site: true,
            excluded_origins: vec![origin_string(site)],
            excluded_domains,
            allowed_prefixes: Vec::new(),
        }
    }

    #[must_use]
    pub fn allow_off_site(&self) -> bool {
        self.allow_off_site
    }

    /// Whether `url` belongs to the site operator rather than the content owner.
    #[must_use]
    pub fn excludes(&self, url: &Url) -> bool {
        let raw = url.as_str();
        if self.allowed_prefixes.iter().any(|prefix| raw.starts_with(prefix.as_str())) {
            return false;
        }
        if self.excluded_origins.contains(&origin_string(url)) {
            return true;
        }
        url.host_str().is_some_and(|host| {
            self.excluded_domains
                .iter()
                .any(|domain| host_matches_domain(host, domain))
        })
    }

    /// Drop operator candidates.
    #[must_use]
    pub fn filter(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        candidates
            .into_iter()
            .filter(|candidate| !self.excludes(candidate.url()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn classifies_by_host_and_path() {
        let sites = SiteSettings::default();
        assert!(matches!(
            SiteClassification::classify(&url("https://github.com/acme/widget"), &sites),
            SiteClassification::CodeRepository(_)
        ));
        assert!(matches!(
            SiteClassification::classify(&url("https://apps.apple.com/us/app/widget/id123456"), &sites),
            SiteClassification::AppMarketplace(_)
        ));
        assert!(SiteClassification::classify(&url("https://github.com/"), &sites).is_generic());
        assert!(SiteClassification::classify(&url("https://example.com/acme/widget"), &sites).is_generic());
    }

    #[test]
    fn marketplace_profile_excludes_operator() {
        let sites = SiteSettings::default();
        let store = url("https://play.google.com/store/apps/details?id=com.acme.widget");
        let profile = SiteClassification::classify(&store, &sites).profile(&sites);

        assert!(profile.allow_off_site());
        assert!(profile.excludes(&url("https://play.google.com/about/privacy")));
        assert!(profile.excludes(&url("https://policies.google.com/privacy")));
        assert!(!profile.excludes(&url("https://acme.example/privacy")));
    }

    #[test]
    fn repository_profile_keeps_repo_files() {
        let sites = SiteSettings::default();
        let repo = url("https://github.com/acme/widget");
        let profile = SiteClassification::classify(&repo, &sites).profile(&sites);

        assert!(!profile.excludes(&url("https://github.com/acme/widget/blob/main/PRIVACY.md")));
        assert!(!profile.excludes(&url(
            "https://raw.githubusercontent.com/acme/widget/HEAD/PRIVACY.md"
        )));
        assert!(profile.excludes(&url("https://github.com/site/privacy")));
        assert!(profile.excludes(&url("https://github.com/acme/widget-fork/blob/main/PRIVACY.md")));
    }
}
