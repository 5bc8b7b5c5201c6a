use crate::core::hardening::secure_blank_targets;
use crate::core::injector::{SnippetInjector, SnippetOutcome};
use crate::core::normalizer::PathNormalizer;
use crate::core::scanner::{rewrite_css, rewrite_references, ScanOptions};
use crate::domain::model::{
    Category, Counters, Deployment, DocumentRef, FlaggedReference, Reference,
};
use crate::utils::error::{Result, RootfixError};

#[derive(Debug, Clone, Copy)]
pub struct RewriteOptions {
    pub scan: ScanOptions,
    pub secure_blank_targets: bool,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            scan: ScanOptions::default(),
            secure_blank_targets: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewritten {
    pub text: String,
    pub counters: Counters,
    pub flagged: Vec<FlaggedReference>,
}

/// The pure part of a document transaction: text in, text and counters out.
#[derive(Debug, Clone)]
pub struct Rewriter {
    normalizer: PathNormalizer,
    injector: SnippetInjector,
    options: RewriteOptions,
}

impl Rewriter {
    pub fn new(
        deployment: Deployment,
        marker: &str,
        legacy_markers: &[String],
        options: RewriteOptions,
    ) -> Result<Self> {
        let injector = SnippetInjector::new(marker, legacy_markers, deployment.hosted_base.clone())?;
        Ok(Self {
            normalizer: PathNormalizer::new(deployment),
            injector,
            options,
        })
    }

    pub fn deployment(&self) -> &Deployment {
        self.normalizer.deployment()
    }

    /// Rewrite a markup document: references, link hardening, then the snippet.
    pub fn rewrite(&self, html: &str, document_depth: usize) -> Rewritten {
        let mut counters = Counters::default();
        let mut flagged = Vec::new();

        let text = rewrite_references(html, self.options.scan, &mut |r: Reference<'_>| {
            self.visit(r, document_depth, &mut counters, &mut flagged)
        });

        let text = if self.options.secure_blank_targets {
            let (secured, count) = secure_blank_targets(&text);
            counters.blank_targets_secured = count;
            secured
        } else {
            text
        };

        let injection = self.injector.inject(&text);
        match injection.outcome {
            SnippetOutcome::Inserted => counters.snippets_inserted = 1,
            SnippetOutcome::Replaced => counters.snippets_replaced = 1,
            SnippetOutcome::Unchanged => {}
        }
        counters.base_tags_removed = injection.base_tags_removed;
        counters.legacy_blocks_removed = injection.legacy_blocks_removed;

        Rewritten {
            text: injection.text,
            counters,
            flagged,
        }
    }

    /// Rewrite a stylesheet: only `url(...)` references change, nothing is injected.
    pub fn rewrite_stylesheet(&self, css: &str, document_depth: usize) -> Rewritten {
        let mut counters = Counters::default();
        let mut flagged = Vec::new();
        let text = rewrite_css(css, &mut |r: Reference<'_>| {
            self.visit(r, document_depth, &mut counters, &mut flagged)
        });
        Rewritten {
            text,
            counters,
            flagged,
        }
    }

    /// Pick the rewrite that fits the document type.
    pub fn rewrite_document(&self, doc: &DocumentRef, content: &str) -> Rewritten {
        if doc.is_stylesheet() {
            self.rewrite_stylesheet(content, doc.depth())
        } else {
            self.rewrite(content, doc.depth())
        }
    }

    fn visit(
        &self,
        r: Reference<'_>,
        document_depth: usize,
        counters: &mut Counters,
        flagged: &mut Vec<FlaggedReference>,
    ) -> Option<String> {
        if r.category != Category::Internal {
            return None;
        }
        match self.normalizer.normalize(r.raw, document_depth) {
            Ok(normalized) => {
                counters.parent_segments_stripped += normalized.parent_segments;
                if normalized.escapes_root {
                    counters.root_escapes += 1;
                }
                if normalized.value != r.raw {
                    counters.references_fixed.bump(r.kind);
                }
                Some(normalized.value)
            }
            Err(RootfixError::MalformedReference { reference, reason }) => {
                tracing::debug!(
                    "Leaving malformed {} reference '{}': {}",
                    r.kind.as_str(),
                    reference,
                    reason
                );
                flagged.push(FlaggedReference {
                    kind: r.kind,
                    value: reference,
                    reason,
                });
                None
            }
            Err(other) => {
                flagged.push(FlaggedReference {
                    kind: r.kind,
                    value: r.raw.to_string(),
                    reason: other.to_string(),
                });
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::injector::DEFAULT_MARKER;
    use crate::domain::model::HostedBase;

    fn rewriter(local: bool) -> Rewriter {
        let base = HostedBase::parse("/app/").unwrap();
        let deployment = if local {
            Deployment::local(base)
        } else {
            Deployment::hosted(base)
        };
        Rewriter::new(deployment, DEFAULT_MARKER, &[], RewriteOptions::default()).unwrap()
    }

    const PAGE: &str = r##"<!DOCTYPE html>
<html>
<head>
  <base href="/app/">
  <link rel="stylesheet" href="css/app.css">
  <script src="https://cdn.example.com/lib.js"></script>
  <script src="/app/app/js/main.js"></script>
</head>
<body>
  <a href="../pages/about.html#team" target="_blank">About</a>
  <a href="#top">Top</a>
  <img src="{{ logo }}">
</body>
</html>
"##;

    #[test]
    fn test_rewrite_hosted_page() {
        let out = rewriter(false).rewrite(PAGE, 0);
        assert!(out.text.contains(r#"href="/app/css/app.css""#));
        assert!(out.text.contains(r#"src="https://cdn.example.com/lib.js""#));
        assert!(out.text.contains(r#"src="/app/js/main.js""#));
        assert!(out.text.contains(
            r#"href="/app/pages/about.html#team" target="_blank" rel="noopener noreferrer""#
        ));
        assert!(out.text.contains(r##"href="#top""##));

        assert_eq!(out.counters.references_fixed.link, 1);
        assert_eq!(out.counters.references_fixed.script_src, 1);
        assert_eq!(out.counters.references_fixed.anchor_href, 1);
        assert_eq!(out.counters.parent_segments_stripped, 1);
        assert_eq!(out.counters.root_escapes, 1);
        assert_eq!(out.counters.base_tags_removed, 1);
        assert_eq!(out.counters.snippets_inserted, 1);
        assert_eq!(out.counters.blank_targets_secured, 1);
        assert_eq!(out.flagged.len(), 1);
        assert_eq!(out.flagged[0].value, "{{ logo }}");
    }

    #[test]
    fn test_rewrite_local_page() {
        let out = rewriter(true).rewrite(PAGE, 0);
        assert!(out.text.contains(r#"href="/css/app.css""#));
        assert!(out.text.contains(r#"src="/js/main.js""#));
    }

    #[test]
    fn test_inline_script_markup_survives() {
        let html = "<html><head></head><body><ul id=\"list\"></ul>\n<script>\nfor (const p of people) {\n  list.innerHTML += '<img src=\"' + p.photo + '\">';\n}\n</script>\n</body></html>";
        let out = rewriter(false).rewrite(html, 0);
        assert!(out.text.contains("list.innerHTML += '<img src=\"' + p.photo + '\">';"));
        assert_eq!(out.counters.references_fixed.total(), 0);
        assert!(out.flagged.is_empty());
    }

    #[test]
    fn test_stylesheets_only_get_url_rewrites() {
        let css = "body { background: url('../img/bg.png'); }\n.logo { background: url(/img/logo.svg); }\n";
        let doc = DocumentRef::new(std::path::Path::new("/site"), "css/site.css");
        let out = rewriter(false).rewrite_document(&doc, css);
        assert_eq!(
            out.text,
            "body { background: url('/app/img/bg.png'); }\n.logo { background: url(/app/img/logo.svg); }\n"
        );
        assert_eq!(out.counters.references_fixed.style_url, 2);
        assert_eq!(out.counters.snippets_inserted, 0);
        assert!(!out.text.contains("<head>"));
        assert_eq!(rewriter(false).rewrite_document(&doc, &out.text).text, out.text);
    }

    #[test]
    fn test_second_pass_changes_nothing() {
        for local in [true, false] {
            let r = rewriter(local);
            let first = r.rewrite(PAGE, 1);
            let second = r.rewrite(&first.text, 1);
            assert_eq!(second.text, first.text);
            assert_eq!(second.counters, Counters::default());
        }
    }
}
