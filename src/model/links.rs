//! Locating and rewriting resource references inside markup and stylesheets.
//!
//! Used when a resource is renamed: every `href`/`src`/`xlink:href` attribute
//! and every CSS `url(..)`/`@import` that resolved to the old location is
//! re-pointed at the new one.

use memchr::memmem;

use crate::path;
use crate::util::{escape_xml, unescape_xml};

/// Reference syntax of a text resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSyntax {
    /// XML/HTML attributes (`href`, `src`, `xlink:href`).
    Markup,
    /// CSS `url(...)` and `@import "..."`.
    Css,
}

/// Byte range of a reference value inside the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
}

/// Collect raw reference values in document order.
pub fn find_references(text: &str, syntax: LinkSyntax) -> Vec<String> {
    spans(text, syntax)
        .into_iter()
        .map(|s| text[s.start..s.end].to_string())
        .collect()
}

/// Rewrite the references of a document.
///
/// Each internal reference is resolved against `source_href` (where the
/// document lived) and handed to `map`, which returns the new package-relative
/// target or `None` to keep the reference untouched. New values are written
/// relative to `dest_href` (where the document lives now), keeping fragments.
/// Returns `None` when nothing changed.
pub fn rewrite_references<F>(
    text: &str,
    syntax: LinkSyntax,
    source_href: &str,
    dest_href: &str,
    map: F,
) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut changed = false;

    for span in spans(text, syntax) {
        let raw = &text[span.start..span.end];
        let value = match syntax {
            LinkSyntax::Markup => unescape_xml(raw).into_owned(),
            LinkSyntax::Css => raw.to_string(),
        };
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || path::is_external(trimmed) {
            continue;
        }

        let decoded = path::decode(trimmed);
        let (_, fragment) = path::split_fragment(&decoded);
        let target = path::resolve(source_href, &decoded);
        let Some(new_target) = map(&target) else {
            continue;
        };

        let mut replacement = path::encode(&path::relative_to(dest_href, &new_target));
        if let Some(fragment) = fragment {
            replacement.push('#');
            replacement.push_str(fragment);
        }
        if replacement == trimmed {
            continue;
        }

        out.push_str(&text[last..span.start]);
        match syntax {
            LinkSyntax::Markup => out.push_str(&escape_xml(&replacement)),
            LinkSyntax::Css => out.push_str(&replacement),
        }
        last = span.end;
        changed = true;
    }

    if !changed {
        return None;
    }
    out.push_str(&text[last..]);
    Some(out)
}

fn spans(text: &str, syntax: LinkSyntax) -> Vec<Span> {
    let mut spans = match syntax {
        LinkSyntax::Markup => markup_spans(text.as_bytes()),
        LinkSyntax::Css => css_spans(text.as_bytes()),
    };
    spans.sort_by_key(|s| s.start);
    spans.dedup();
    spans
}

fn markup_spans(bytes: &[u8]) -> Vec<Span> {
    let mut spans = Vec::new();
    for name in [&b"href"[..], &b"src"[..]] {
        for pos in memmem::find_iter(bytes, name) {
            let preceded_ok = pos
                .checked_sub(1)
                .map(|i| matches!(bytes[i], b' ' | b'\t' | b'\n' | b'\r' | b':'))
                .unwrap_or(false);
            if !preceded_ok {
                continue;
            }

            let mut i = skip_ws(bytes, pos + name.len());
            if bytes.get(i) != Some(&b'=') {
                continue;
            }
            i = skip_ws(bytes, i + 1);
            let Some(&quote) = bytes.get(i) else { continue };
            if quote != b'"' && quote != b'\'' {
                continue;
            }
            let start = i + 1;
            if let Some(len) = memchr::memchr(quote, &bytes[start..]) {
                spans.push(Span {
                    start,
                    end: start + len,
                });
            }
        }
    }
    spans
}

fn css_spans(bytes: &[u8]) -> Vec<Span> {
    let mut spans = Vec::new();

    for pos in memmem::find_iter(bytes, b"url(") {
        let mut start = skip_ws(bytes, pos + 4);
        let quote = match bytes.get(start) {
            Some(&q @ (b'"' | b'\'')) => {
                start += 1;
                Some(q)
            }
            _ => None,
        };
        let end = match quote {
            Some(q) => memchr::memchr(q, &bytes[start..]).map(|l| start + l),
            None => memchr::memchr(b')', &bytes[start..]).map(|l| {
                let mut end = start + l;
                while end > start && bytes[end - 1].is_ascii_whitespace() {
                    end -= 1;
                }
                end
            }),
        };
        if let Some(end) = end {
            spans.push(Span { start, end });
        }
    }

    for pos in memmem::find_iter(bytes, b"@import") {
        let i = skip_ws(bytes, pos + 7);
        if let Some(&q @ (b'"' | b'\'')) = bytes.get(i) {
            let start = i + 1;
            if let Some(len) = memchr::memchr(q, &bytes[start..]) {
                spans.push(Span {
                    start,
                    end: start + len,
                });
            }
        }
    }

    spans
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rename(old: &'static str, new: &'static str) -> impl Fn(&str) -> Option<String> {
        move |target| (target == old).then(|| new.to_string())
    }

    #[test]
    fn test_find_markup_references() {
        let html = r#"<link rel="stylesheet" href="../Styles/a.css"/><img src='x.png'/>
<image xlink:href="cover.jpg"/><a data-href="no" href = "ch2.xhtml#s">"#;
        assert_eq!(
            find_references(html, LinkSyntax::Markup),
            vec!["../Styles/a.css", "x.png", "cover.jpg", "ch2.xhtml#s"]
        );
    }

    #[test]
    fn test_srcset_is_not_a_reference() {
        let html = r#"<img srcset="a.png 2x" src="b.png"/>"#;
        assert_eq!(find_references(html, LinkSyntax::Markup), vec!["b.png"]);
    }

    #[test]
    fn test_rewrite_stylesheet_link() {
        let html = r#"<head><link href="../Styles/old.css" rel="stylesheet"/></head>"#;
        let out = rewrite_references(
            html,
            LinkSyntax::Markup,
            "Text/ch1.xhtml",
            "Text/ch1.xhtml",
            rename("Styles/old.css", "Styles/new.css"),
        )
        .unwrap();
        assert_eq!(out, r#"<head><link href="../Styles/new.css" rel="stylesheet"/></head>"#);
    }

    #[test]
    fn test_rewrite_keeps_fragment_and_unrelated_links() {
        let html = r##"<a href="ch2.xhtml#n1">a</a><a href="#top">b</a><a href="http://x/ch2.xhtml">c</a>"##;
        let out = rewrite_references(
            html,
            LinkSyntax::Markup,
            "Text/ch1.xhtml",
            "Text/ch1.xhtml",
            rename("Text/ch2.xhtml", "Text/part/two.xhtml"),
        )
        .unwrap();
        assert!(out.contains(r#"href="part/two.xhtml#n1""#));
        assert!(out.contains(r##"href="#top""##));
        assert!(out.contains(r#"href="http://x/ch2.xhtml""#));
    }

    #[test]
    fn test_rewrite_unchanged_returns_none() {
        let html = r#"<img src="a.png"/>"#;
        assert!(
            rewrite_references(
                html,
                LinkSyntax::Markup,
                "ch.xhtml",
                "ch.xhtml",
                rename("b.png", "c.png")
            )
            .is_none()
        );
    }

    #[test]
    fn test_rebase_moved_document() {
        let html = r#"<img src="images/a.png"/>"#;
        let out = rewrite_references(html, LinkSyntax::Markup, "ch.xhtml", "Text/ch.xhtml", |t| {
            Some(t.to_string())
        })
        .unwrap();
        assert_eq!(out, r#"<img src="../images/a.png"/>"#);
    }

    #[test]
    fn test_css_urls() {
        let css = "@import \"base.css\";\n@font-face { src: url( ../Fonts/a.ttf ) }\nbody { background: url('bg.png') }";
        assert_eq!(
            find_references(css, LinkSyntax::Css),
            vec!["base.css", "../Fonts/a.ttf", "bg.png"]
        );
        let out = rewrite_references(
            css,
            LinkSyntax::Css,
            "Styles/main.css",
            "Styles/main.css",
            rename("Fonts/a.ttf", "Fonts/b.ttf"),
        )
        .unwrap();
        assert!(out.contains("url( ../Fonts/b.ttf )"));
    }
}
