use crate::core::scanner::{in_spans, opaque_spans};
use crate::domain::model::HostedBase;
use crate::utils::error::{Result, RootfixError};
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

static HEAD_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<head\b[^>]*>").unwrap());
static HTML_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<html\b[^>]*>").unwrap());
static DOCTYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\A\s*<!doctype\b[^>]*>").unwrap());
static BASE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<\s*base\b[^>]*>(?:\s*</base\s*>)?").unwrap());
static SCRIPT_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>(.*?)</script\s*>").unwrap());
/// Body of the historical unmarked helper: builds a `<base>` and prepends it to the head.
static LEGACY_SIGNATURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\.prepend\(\s*base\s*\)|createElement\(\s*['"]base['"]\s*\)"#).unwrap()
});

pub const DEFAULT_MARKER: &str = "ROOTFIX_BASE";
/// Identities used by earlier generations of the snippet.
pub const DEFAULT_LEGACY_MARKERS: [&str; 1] = ["ASEF_BASE_FIX"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnippetOutcome {
    Inserted,
    Replaced,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    pub text: String,
    pub outcome: SnippetOutcome,
    pub base_tags_removed: usize,
    pub legacy_blocks_removed: usize,
}

/// Keeps exactly one marked runtime base-resolution block per document.
#[derive(Debug, Clone)]
pub struct SnippetInjector {
    marker: String,
    hosted_base: HostedBase,
    canonical_re: Regex,
    legacy_res: Vec<Regex>,
}

impl SnippetInjector {
    pub fn new(marker: &str, legacy_markers: &[String], hosted_base: HostedBase) -> Result<Self> {
        let canonical_re = marker_block_re(marker)?;
        let legacy_res = legacy_markers
            .iter()
            .filter(|m| m.as_str() != marker)
            .map(|m| marker_block_re(m))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            marker: marker.to_string(),
            hosted_base,
            canonical_re,
            legacy_res,
        })
    }

    /// The `id` of the injected `<script>`.
    pub fn script_id(&self) -> String {
        self.marker.to_ascii_lowercase().replace(['_', ':'], "-")
    }

    pub fn start_marker(&self) -> String {
        format!("<!-- {} START -->", self.marker)
    }

    pub fn end_marker(&self) -> String {
        format!("<!-- {} END -->", self.marker)
    }

    /// Remove every earlier base construct and insert the canonical block right
    /// after the head opening tag, synthesizing a head when there is none.
    pub fn inject(&self, html: &str) -> Injection {
        let nl = if html.contains("\r\n") { "\r\n" } else { "\n" };

        let had_canonical = self.canonical_re.is_match(html);
        let mut text = self.canonical_re.replace_all(html, "").into_owned();

        let mut legacy_blocks_removed = 0;
        for re in &self.legacy_res {
            legacy_blocks_removed += re.find_iter(&text).count();
            text = re.replace_all(&text, "").into_owned();
        }

        // Script bodies and comments are not markup; only tags outside them count.
        let opaque = opaque_spans(&text);
        let legacy_scripts: Vec<Range<usize>> = SCRIPT_BLOCK_RE
            .captures_iter(&text)
            .filter(|c| LEGACY_SIGNATURE_RE.is_match(&c[1]))
            .filter_map(|c| c.get(0).map(|m| m.range()))
            .filter(|r| !in_spans(&opaque, r.start))
            .collect();
        legacy_blocks_removed += legacy_scripts.len();
        let text = remove_lines(&text, legacy_scripts);

        let opaque = opaque_spans(&text);
        let base_tags: Vec<Range<usize>> = BASE_TAG_RE
            .find_iter(&text)
            .map(|m| m.range())
            .filter(|r| !in_spans(&opaque, r.start))
            .collect();
        let base_tags_removed = base_tags.len();
        let text = remove_lines(&text, base_tags);

        let opaque = opaque_spans(&text);
        let first_tag = |re: &Regex| re.find_iter(&text).find(|m| !in_spans(&opaque, m.start()));
        let block = self.render(nl);
        let text = match first_tag(&*HEAD_OPEN_RE) {
            Some(head) => {
                let rest = &text[head.end()..];
                let trailer = if rest.starts_with('\n') || rest.starts_with("\r\n") {
                    ""
                } else {
                    nl
                };
                format!("{}{}{}{}{}", &text[..head.end()], nl, block, trailer, rest)
            }
            None => {
                let anchor = first_tag(&*HTML_OPEN_RE)
                    .or_else(|| DOCTYPE_RE.find(&text))
                    .map(|m| m.end());
                match anchor {
                    Some(at) => format!(
                        "{}{nl}<head>{nl}{}{nl}</head>{}",
                        &text[..at],
                        block,
                        &text[at..],
                        nl = nl
                    ),
                    None => format!("<head>{nl}{}{nl}</head>{nl}{}", block, text, nl = nl),
                }
            }
        };

        let outcome = if text == html {
            SnippetOutcome::Unchanged
        } else if had_canonical {
            SnippetOutcome::Replaced
        } else {
            SnippetOutcome::Inserted
        };

        Injection {
            text,
            outcome,
            base_tags_removed,
            legacy_blocks_removed,
        }
    }

    /// Render the canonical block for the configured hosted root.
    pub fn render(&self, nl: &str) -> String {
        let script = RUNTIME_SCRIPT.replace("__HOSTED_BASE__", self.hosted_base.as_str());
        let mut lines = vec![
            self.start_marker(),
            format!(
                "<script id=\"{}\" data-hosted-base=\"{}\">",
                self.script_id(),
                self.hosted_base
            ),
        ];
        lines.extend(script.lines().map(str::to_string));
        lines.push("</script>".to_string());
        lines.push(self.end_marker());
        lines.join(nl)
    }
}

fn marker_block_re(marker: &str) -> Result<Regex> {
    let name = regex::escape(marker);
    Regex::new(&format!(
        r"(?s)(?:\r?\n)?<!--\s*{name}\s+START\s*-->.*?<!--\s*{name}\s+END\s*-->"
    ))
    .map_err(|e| RootfixError::ConfigError {
        message: format!("invalid snippet marker '{}': {}", marker, e),
    })
}

/// Delete the spans; a span standing alone on its line takes the whole line with it.
fn remove_lines(text: &str, spans: Vec<Range<usize>>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        let line_start = text[..span.start].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let lead_blank = text[line_start..span.start]
            .chars()
            .all(|c| c == ' ' || c == '\t');

        let after = &text[span.end..];
        let trailing = after.len() - after.trim_start_matches([' ', '\t']).len();
        let rest = &after[trailing..];
        let newline = if rest.starts_with("\r\n") {
            Some(2)
        } else if rest.starts_with('\n') {
            Some(1)
        } else if rest.is_empty() {
            Some(0)
        } else {
            None
        };

        let (start, end) = match newline {
            Some(nl_len) if lead_blank && line_start >= cursor => {
                (line_start, span.end + trailing + nl_len)
            }
            _ => (span.start, span.end),
        };
        out.push_str(&text[cursor..start]);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Resolves the effective root in the browser. Keep free of `<` followed by a
/// letter so the reference scanner never mistakes it for markup.
const RUNTIME_SCRIPT: &str = r#"(function () {
  try {
    var HOSTED_BASE = "__HOSTED_BASE__";
    var host = location.hostname;
    var isLocal = location.protocol === "file:" || host === "" || host === "localhost" ||
      host === "0.0.0.0" || host === "::1" || host === "[::1]" || /^127\./.test(host) ||
      /\.localhost$/.test(host);
    var root = isLocal ? "/" : HOSTED_BASE;
    var prefix = isLocal ? "" : HOSTED_BASE.replace(/\/$/, "");

    var stale = document.querySelectorAll("base");
    for (var i = 0; i !== stale.length; i++) {
      if (stale[i].parentNode) stale[i].parentNode.removeChild(stale[i]);
    }
    var head = document.head;
    if (!head) {
      head = document.createElement("head");
      document.documentElement.insertBefore(head, document.documentElement.firstChild);
    }
    var base = document.createElement("base");
    base.setAttribute("href", root);
    head.insertBefore(base, head.firstChild);

    if (!prefix) return;
    var targets = [
      ["link[href]", "href"], ["script[src]", "src"], ["img[src]", "src"],
      ["source[src]", "src"], ["a[href]", "href"]
    ];
    for (var t = 0; t !== targets.length; t++) {
      var attr = targets[t][1];
      var nodes = document.querySelectorAll(targets[t][0]);
      for (var n = 0; n !== nodes.length; n++) {
        var value = nodes[n].getAttribute(attr);
        if (!value || value.charAt(0) !== "/" || value.charAt(1) === "/") continue;
        if (value === prefix || value.indexOf(prefix + "/") === 0) continue;
        nodes[n].setAttribute(attr, prefix + value);
      }
    }
  } catch (err) {
    if (window.console && console.warn) console.warn("rootfix: base resolution failed", err);
  }
})();"#;
