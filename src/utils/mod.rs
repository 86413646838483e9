pub mod constants;
pub mod string_utils;
pub mod timeout;
pub mod url_utils;

pub use constants::*;
pub use string_utils::{collapse_whitespace, contains_term, normalize_label, safe_truncate_chars};
pub use timeout::bounded_step;
pub use url_utils::{
    domains_related, host_matches_domain, is_ip_or_localhost, origin_string, path_depth, resolve_href,
    root_domain, visit_key,
};
