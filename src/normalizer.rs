//! URL normalization
//!
//! Turns whatever the caller typed into an ordered list of equivalent URLs to
//! probe, most specific first. Input that cannot name an http(s) host fails
//! here, before any network traffic.

use url::{Host, Url};

use crate::discovery::DiscoveryError;
use crate::utils::url_utils::is_ip_or_localhost;

/// How a variant was derived from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantKind {
    /// The input itself, with `https` inferred when no scheme was given.
    Exact,
    /// The input with `www.` added or removed.
    WwwSwapped,
    /// Scheme and host only.
    Root,
    /// Scheme and host only, with the other scheme.
    RootOppositeScheme,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlVariant {
    pub url: Url,
    pub kind: VariantKind,
}

/// Normalize raw input into the ordered variant list.
///
/// Order: exact, `www.` swapped, base root, base root with the opposite
/// scheme. Variants that collapse onto an earlier one are dropped.
pub fn normalize(raw: &str) -> Result<Vec<UrlVariant>, DiscoveryError> {
    let exact = parse_input(raw)?;

    let mut variants = vec![UrlVariant {
        url: exact.clone(),
        kind: VariantKind::Exact,
    }];

    if let Some(swapped) = swap_www(&exact) {
        push_unique(&mut variants, swapped, VariantKind::WwwSwapped);
    }

    let root = root_of(&exact);
    push_unique(&mut variants, root.clone(), VariantKind::Root);

    let mut opposite = root;
    let other_scheme = if exact.scheme() == "https" { "http" } else { "https" };
    if opposite.set_scheme(other_scheme).is_ok() {
        if opposite.port().is_some() && opposite.port() == default_port(exact.scheme()) {
            let _ = opposite.set_port(None);
        }
        push_unique(&mut variants, opposite, VariantKind::RootOppositeScheme);
    }

    Ok(variants)
}

/// Parse and validate the caller's input, inferring `https` when needed.
pub fn parse_input(raw: &str) -> Result<Url, DiscoveryError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DiscoveryError::invalid_url(raw, "empty input"));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(DiscoveryError::invalid_url(raw, "contains whitespace"));
    }

    let candidate = if let Some((scheme, _)) = trimmed.split_once("://") {
        if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
            return Err(DiscoveryError::invalid_url(
                raw,
                format!("unsupported scheme '{scheme}'"),
            ));
        }
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed.trim_start_matches("//"))
    };

    let url = Url::parse(&candidate).map_err(|e| DiscoveryError::invalid_url(raw, e.to_string()))?;

    match url.host() {
        None => Err(DiscoveryError::invalid_url(raw, "missing host")),
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.');
            let labels_ok = domain
                .split('.')
                .all(|label| !label.is_empty() && !label.starts_with('-') && !label.ends_with('-'));
            if !labels_ok {
                Err(DiscoveryError::invalid_url(raw, format!("malformed host '{domain}'")))
            } else if !domain.contains('.') && !is_ip_or_localhost(domain) {
                Err(DiscoveryError::invalid_url(raw, format!("host '{domain}' has no domain suffix")))
            } else {
                Ok(url)
            }
        }
        Some(_) => Ok(url),
    }
}

fn swap_www(url: &Url) -> Option<Url> {
    let host = url.host_str()?;
    if is_ip_or_localhost(host) {
        return None;
    }
    let swapped_host = match host.strip_prefix("www.") {
        Some(bare) => bare.to_string(),
        None => format!("www.{host}"),
    };
    let mut swapped = url.clone();
    swapped.set_host(Some(&swapped_host)).ok()?;
    Some(swapped)
}

/// `scheme://host[:port]/` of a URL.
#[must_use]
pub fn root_of(url: &Url) -> Url {
    let mut root = url.clone();
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);
    let _ = root.set_username("");
    let _ = root.set_password(None);
    root
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

fn push_unique(variants: &mut Vec<UrlVariant>, url: Url, kind: VariantKind) {
    if !variants.iter().any(|v| v.url == url) {
        variants.push(UrlVariant { url, kind });
    }
}
