use crate::domain::model::Category;
use regex::Regex;
use std::sync::LazyLock;

/// `http:`, `mailto:`, `data:`, `tel:`, `javascript:` and any other URI scheme.
static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap());

/// Decide whether a raw attribute or `url(...)` value may be rewritten.
///
/// Scheme-qualified and protocol-relative values are external, `#...` is an
/// in-page anchor, and everything else (including the empty string and values
/// that already carry a deployment prefix) is internal.
pub fn classify(raw: &str) -> Category {
    let value = raw.trim_start();
    if value.starts_with('#') {
        Category::Anchor
    } else if value.starts_with("//") || SCHEME_RE.is_match(value) {
        Category::External
    } else {
        Category::Internal
    }
}
