use crate::core::classifier::classify;
use crate::domain::model::{Reference, ReferenceKind};
use regex::{Captures, Regex};
use std::ops::Range;
use std::sync::LazyLock;

/// A start tag with its attribute list. Quoted values may contain `>`.
pub(crate) static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<([A-Za-z][A-Za-z0-9-]*)((?:\s+[^\s"'>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>]+))?)*)\s*/?>"#,
    )
    .unwrap()
});

/// One attribute inside the list captured by `TAG_RE`.
pub(crate) static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\s+)([^\s"'>/=]+)(?:(\s*=\s*)(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#).unwrap()
});

static STYLE_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)(<style\b[^>]*>)(.*?)(</style\s*>)").unwrap());

static CSS_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^)"'\s]*))\s*\)"#).unwrap()
});

static ONCLICK_LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\blocation(?:\.href)?\s*=\s*(?:'([^']*)'|"([^"]*)")"#).unwrap()
});

/// Text that is not markup: comments, script bodies and template contents.
/// The `<script ...>` and `<template ...>` start tags themselves stay outside the match groups.
static OPAQUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?is)<!--.*?-->",
        r"|<script\b[^>]*>(.*?)</script\s*>",
        r"|<template\b[^>]*>(.*?)</template\s*>"
    ))
    .unwrap()
});

#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    pub rewrite_onclick: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            rewrite_onclick: true,
        }
    }
}

/// Callback deciding the new text of a reference; `None` keeps it.
pub type Visitor<'v> = dyn for<'r> FnMut(Reference<'r>) -> Option<String> + 'v;

/// Walk every reference in the markup and splice in the visitor's replacements.
/// Everything outside the reference values is copied byte for byte.
/// Comments, script bodies and template contents are copied untouched.
pub fn rewrite_references(html: &str, options: ScanOptions, visit: &mut Visitor<'_>) -> String {
    map_markup(html, |markup| {
        let styled = STYLE_BLOCK_RE.replace_all(markup, |caps: &Captures| {
            format!("{}{}{}", &caps[1], rewrite_css(&caps[2], visit), &caps[3])
        });

        TAG_RE
            .replace_all(&styled, |caps: &Captures| rewrite_tag(caps, options, visit))
            .into_owned()
    })
}

/// Byte ranges of the opaque regions, ascending and non-overlapping.
pub(crate) fn opaque_spans(html: &str) -> Vec<Range<usize>> {
    OPAQUE_RE
        .captures_iter(html)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)).or_else(|| c.get(0)))
        .map(|m| m.range())
        .collect()
}

pub(crate) fn in_spans(spans: &[Range<usize>], at: usize) -> bool {
    spans.iter().any(|s| s.contains(&at))
}

/// Apply `f` to each stretch of markup between opaque regions; the regions are kept verbatim.
pub(crate) fn map_markup(html: &str, mut f: impl FnMut(&str) -> String) -> String {
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    for span in opaque_spans(html) {
        out.push_str(&f(&html[cursor..span.start]));
        out.push_str(&html[span.clone()]);
        cursor = span.end;
    }
    out.push_str(&f(&html[cursor..]));
    out
}

/// Rewrite every `url(...)` argument in a stylesheet fragment.
pub fn rewrite_css(css: &str, visit: &mut Visitor<'_>) -> String {
    let mut edits = Vec::new();
    for caps in CSS_URL_RE.captures_iter(css) {
        let Some(value) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) else {
            continue;
        };
        if let Some(new) = visit_value(value.as_str(), ReferenceKind::StyleUrl, visit) {
            edits.push((value.range(), new));
        }
    }
    splice(css, edits)
}

fn rewrite_onclick(script: &str, visit: &mut Visitor<'_>) -> String {
    let mut edits = Vec::new();
    for caps in ONCLICK_LOCATION_RE.captures_iter(script) {
        let Some(value) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        if let Some(new) = visit_value(value.as_str(), ReferenceKind::OnclickHref, visit) {
            edits.push((value.range(), new));
        }
    }
    splice(script, edits)
}

fn rewrite_tag(caps: &Captures, options: ScanOptions, visit: &mut Visitor<'_>) -> String {
    let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
    let Some(attrs) = caps.get(2) else {
        return whole.to_string();
    };
    let tag = caps[1].to_ascii_lowercase();
    let offset = attrs.start() - caps.get(0).map(|m| m.start()).unwrap_or_default();

    let mut edits = Vec::new();
    for attr in attr_values(attrs.as_str()) {
        let range = offset + attr.value.start..offset + attr.value.end;
        let raw = &attrs.as_str()[attr.value.clone()];

        let replacement = match (tag.as_str(), attr.name.as_str()) {
            (_, "style") => Some(rewrite_css(raw, visit)).filter(|css| css != raw),
            (_, "onclick") if options.rewrite_onclick => {
                Some(rewrite_onclick(raw, visit)).filter(|js| js != raw)
            }
            _ => match reference_kind(&tag, &attr.name) {
                Some(kind) => visit_value(raw, kind, visit),
                None => None,
            },
        };

        if let Some(new) = replacement {
            edits.push((range, new));
        }
    }
    splice(whole, edits)
}

/// Which attributes carry references the engine is responsible for.
fn reference_kind(tag: &str, attr: &str) -> Option<ReferenceKind> {
    match (tag, attr) {
        ("link", "href") => Some(ReferenceKind::Link),
        ("script", "src") => Some(ReferenceKind::ScriptSrc),
        ("img" | "source", "src") => Some(ReferenceKind::ImageSrc),
        ("a" | "area", "href") => Some(ReferenceKind::AnchorHref),
        _ => None,
    }
}

fn visit_value(raw: &str, kind: ReferenceKind, visit: &mut Visitor<'_>) -> Option<String> {
    let reference = Reference {
        raw,
        kind,
        category: classify(raw),
    };
    visit(reference).filter(|new| new != raw)
}

pub(crate) struct AttrValue {
    pub name: String,
    /// Byte range of the value (without quotes) inside the attribute list.
    pub value: Range<usize>,
    pub quoted: bool,
}

/// Attributes with a value, names lowercased.
pub(crate) fn attr_values(attrs: &str) -> Vec<AttrValue> {
    ATTR_RE
        .captures_iter(attrs)
        .filter_map(|a| {
            let name = a.get(2)?.as_str().to_ascii_lowercase();
            let quoted = a.get(4).or_else(|| a.get(5)).is_some();
            let value = a.get(4).or_else(|| a.get(5)).or_else(|| a.get(6))?;
            Some(AttrValue {
                name,
                value: value.range(),
                quoted,
            })
        })
        .collect()
}

/// Apply non-overlapping, ascending byte-range replacements.
pub(crate) fn splice(text: &str, edits: Vec<(Range<usize>, String)>) -> String {
    if edits.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (range, new) in edits {
        out.push_str(&text[cursor..range.start]);
        out.push_str(&new);
        cursor = range.end;
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Category;

    fn collect(html: &str) -> Vec<(ReferenceKind, Category, String)> {
        let mut seen = Vec::new();
        rewrite_references(html, ScanOptions::default(), &mut |r: Reference<'_>| {
            seen.push((r.kind, r.category, r.raw.to_string()));
            None
        });
        seen
    }

    #[test]
    fn test_finds_each_kind() {
        let html = r##"<html><head>
<link rel="stylesheet" href="css/app.css">
<style>body { background: url('img/bg.png'); }</style>
<script src='js/main.js'></script>
</head><body>
<img src=img/logo.png alt="logo">
<a href="#top">top</a>
<a href="https://example.com">ext</a>
<button onclick="location.href='pages/contact.html'">go</button>
<div style="background-image:url(img/hero.jpg)"></div>
</body></html>"##;
        let seen = collect(html);
        let kinds: Vec<ReferenceKind> = seen.iter().map(|s| s.0).collect();
        assert_eq!(
            kinds,
            vec![
                ReferenceKind::StyleUrl,
                ReferenceKind::Link,
                ReferenceKind::ScriptSrc,
                ReferenceKind::ImageSrc,
                ReferenceKind::AnchorHref,
                ReferenceKind::AnchorHref,
                ReferenceKind::OnclickHref,
                ReferenceKind::StyleUrl,
            ]
        );
        assert_eq!(seen[4].1, Category::Anchor);
        assert_eq!(seen[5].1, Category::External);
        assert_eq!(seen[6].2, "pages/contact.html");
    }

    #[test]
    fn test_rewrite_preserves_surrounding_bytes() {
        let html = "<a  class='x'  HREF = 'a.html' >A</a><img src=\"b.png\"/>";
        let out = rewrite_references(html, ScanOptions::default(), &mut |r: Reference<'_>| {
            Some(format!("/{}", r.raw))
        });
        assert_eq!(out, "<a  class='x'  HREF = '/a.html' >A</a><img src=\"/b.png\"/>");
    }

    #[test]
    fn test_quoted_gt_inside_attribute() {
        let html = r#"<a title="a > b" href="x.html">x</a>"#;
        let out = rewrite_references(html, ScanOptions::default(), &mut |r: Reference<'_>| {
            Some(format!("/{}", r.raw))
        });
        assert_eq!(out, r#"<a title="a > b" href="/x.html">x</a>"#);
    }

    #[test]
    fn test_onclick_can_be_disabled() {
        let html = r#"<button onclick="location.href='x.html'">go</button>"#;
        let options = ScanOptions {
            rewrite_onclick: false,
        };
        let mut count = 0;
        rewrite_references(html, options, &mut |_r: Reference<'_>| {
            count += 1;
            None
        });
        assert_eq!(count, 0);
    }

    #[test]
    fn test_script_bodies_comments_and_templates_are_not_scanned() {
        let html = concat!(
            "<script src=\"js/app.js\"></script>\n",
            "<script>list.innerHTML += '<img src=\"' + p.photo + '\">';</script>\n",
            "<!-- <a href=\"old.html\">old</a> -->\n",
            "<template><img src=\"t.png\"></template>\n",
            "<a href=\"new.html\">new</a>"
        );
        let seen = collect(html);
        let raws: Vec<&str> = seen.iter().map(|s| s.2.as_str()).collect();
        assert_eq!(raws, vec!["js/app.js", "new.html"]);

        let out = rewrite_references(html, ScanOptions::default(), &mut |r: Reference<'_>| {
            Some(format!("/{}", r.raw))
        });
        assert!(out.contains("list.innerHTML += '<img src=\"' + p.photo + '\">';"));
        assert!(out.contains("<!-- <a href=\"old.html\">old</a> -->"));
        assert!(out.contains("<a href=\"/new.html\">"));
    }

    #[test]
    fn test_unrelated_attributes_are_ignored() {
        let seen = collect(r#"<base href="/app/"><iframe src="x.html"></iframe><div data-src="y.png"></div>"#);
        assert!(seen.is_empty());
    }
}
