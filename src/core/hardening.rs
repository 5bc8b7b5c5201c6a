use crate::core::scanner::{attr_values, map_markup, splice, TAG_RE};
use regex::Captures;

/// Give every `<a target="_blank">` a `rel` carrying `noopener noreferrer`.
/// Returns the new markup and the number of links changed.
pub fn secure_blank_targets(html: &str) -> (String, usize) {
    let mut secured = 0;
    let out = map_markup(html, |markup| {
        TAG_RE
            .replace_all(markup, |caps: &Captures| {
                let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
                match secure_anchor(caps) {
                    Some(fixed) => {
                        secured += 1;
                        fixed
                    }
                    None => whole.to_string(),
                }
            })
            .into_owned()
    });
    (out, secured)
}

fn secure_anchor(caps: &Captures) -> Option<String> {
    if !caps[1].eq_ignore_ascii_case("a") {
        return None;
    }
    let whole = caps.get(0)?;
    let attrs = caps.get(2)?;
    let offset = attrs.start() - whole.start();
    let list = attrs.as_str();
    let values = attr_values(list);

    let opens_blank = values
        .iter()
        .any(|a| a.name == "target" && list[a.value.clone()].eq_ignore_ascii_case("_blank"));
    if !opens_blank {
        return None;
    }

    match values.iter().find(|a| a.name == "rel") {
        Some(rel) => {
            let current = &list[rel.value.clone()];
            let tokens: Vec<String> = current
                .split_whitespace()
                .map(|t| t.to_ascii_lowercase())
                .collect();
            if tokens.iter().any(|t| t == "noopener") {
                return None;
            }
            let mut joined = current.trim().to_string();
            for token in ["noopener", "noreferrer"] {
                if !tokens.iter().any(|t| t == token) {
                    if !joined.is_empty() {
                        joined.push(' ');
                    }
                    joined.push_str(token);
                }
            }
            // unquoted values cannot hold a space
            let new = if rel.quoted {
                joined
            } else {
                format!("\"{}\"", joined)
            };
            let range = offset + rel.value.start..offset + rel.value.end;
            Some(splice(whole.as_str(), vec![(range, new)]))
        }
        None => {
            let end = offset + list.len();
            Some(splice(
                whole.as_str(),
                vec![(end..end, " rel=\"noopener noreferrer\"".to_string())],
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adds_rel_when_missing() {
        let (out, n) = secure_blank_targets(r#"<a href="x" target="_blank">x</a>"#);
        assert_eq!(out, r#"<a href="x" target="_blank" rel="noopener noreferrer">x</a>"#);
        assert_eq!(n, 1);
    }

    #[test]
    fn test_extends_existing_rel() {
        let (out, n) = secure_blank_targets(r#"<a rel="external" target=_blank href="x">x</a>"#);
        assert_eq!(out, r#"<a rel="external noopener noreferrer" target=_blank href="x">x</a>"#);
        assert_eq!(n, 1);

        let (out, _) = secure_blank_targets(r#"<a rel=external target="_blank">x</a>"#);
        assert_eq!(out, r#"<a rel="external noopener noreferrer" target="_blank">x</a>"#);
    }

    #[test]
    fn test_leaves_safe_and_same_tab_links() {
        let html = r#"<a href="x" target="_blank" rel="noopener">x</a><a href="y">y</a><area target="_blank">"#;
        let (out, n) = secure_blank_targets(html);
        assert_eq!(out, html);
        assert_eq!(n, 0);
    }

    #[test]
    fn test_markup_inside_scripts_is_left_alone() {
        let html = r#"<script>el.innerHTML = '<a href="x" target="_blank">x</a>';</script>"#;
        let (out, n) = secure_blank_targets(html);
        assert_eq!(out, html);
        assert_eq!(n, 0);
    }

    #[test]
    fn test_is_idempotent() {
        let (once, _) = secure_blank_targets(r#"<A HREF="x" TARGET="_BLANK">x</A>"#);
        let (twice, n) = secure_blank_targets(&once);
        assert_eq!(once, twice);
        assert_eq!(n, 0);
    }
}
