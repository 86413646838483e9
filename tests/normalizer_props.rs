//! Property tests for URL normalization

use policy_locator::normalizer::{VariantKind, normalize};
use proptest::prelude::*;

fn host() -> impl Strategy<Value = String> {
    ("[a-z][a-z0-9]{0,12}", prop::sample::select(vec!["com", "org", "io", "co.uk", "de"]))
        .prop_map(|(label, tld)| format!("{label}.{tld}"))
}

fn path() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z0-9_-]{1,8}", 0..4).prop_map(|segments| {
        if segments.is_empty() {
            String::new()
        } else {
            format!("/{}", segments.join("/"))
        }
    })
}

proptest! {
    #[test]
    fn bare_input_gets_https(host in host(), path in path()) {
        let variants = normalize(&format!("{host}{path}")).unwrap();
        prop_assert_eq!(variants[0].kind, VariantKind::Exact);
        prop_assert_eq!(variants[0].url.scheme(), "https");
        prop_assert_eq!(variants[0].url.host_str(), Some(host.as_str()));
    }

    #[test]
    fn variants_are_unique_and_exact_first(host in host(), path in path(), www in any::<bool>()) {
        let host = if www { format!("www.{host}") } else { host };
        let variants = normalize(&format!("http://{host}{path}")).unwrap();

        prop_assert_eq!(variants[0].kind, VariantKind::Exact);
        for (i, a) in variants.iter().enumerate() {
            for b in &variants[i + 1..] {
                prop_assert_ne!(&a.url, &b.url);
            }
        }
        prop_assert!(variants.iter().any(|v| v.url.path() == "/" && v.url.query().is_none()));
        prop_assert!(variants.iter().any(|v| v.url.scheme() == "https"));
    }

    #[test]
    fn whitespace_is_rejected(host in host(), gap in "[ \t]{1,3}") {
        let input = format!("{host}{gap}privacy");
        prop_assert!(normalize(&input).is_err());
    }
}
