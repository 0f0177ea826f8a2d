//! Href arithmetic for package-relative resource paths.
//!
//! Hrefs are `/`-separated, relative to the package document's directory and
//! never start with `/` once normalized.

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

/// Characters escaped when an href is written into XML.
const HREF_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'%');

/// Split `path#frag` into its parts.
pub fn split_fragment(href: &str) -> (&str, Option<&str>) {
    match href.find('#') {
        Some(i) => (&href[..i], Some(&href[i + 1..])),
        None => (href, None),
    }
}

/// The href without any `#fragment` suffix.
pub fn strip_fragment(href: &str) -> &str {
    split_fragment(href).0
}

/// Directory part including the trailing slash (`"Text/ch1.xhtml"` -> `"Text/"`).
pub fn parent_dir(href: &str) -> &str {
    let href = strip_fragment(href);
    match href.rfind('/') {
        Some(i) => &href[..=i],
        None => "",
    }
}

/// Final path segment without its extension (`"Text/ch1.xhtml"` -> `"ch1"`).
pub fn file_stem(href: &str) -> &str {
    let href = strip_fragment(href);
    let base = href.rsplit('/').next().unwrap_or(href);
    match base.rfind('.') {
        Some(0) | None => base,
        Some(i) => &base[..i],
    }
}

/// True for hrefs pointing outside the archive.
pub fn is_external(href: &str) -> bool {
    let href = href.trim();
    href.contains("://")
        || href.starts_with("mailto:")
        || href.starts_with("data:")
        || href.starts_with("javascript:")
        || href.starts_with("tel:")
}

/// Normalize separators and resolve `.`/`..` segments. Leading `..` that would
/// escape the root are dropped.
pub fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Resolve `relative` against the location of the resource at `base_href`.
///
/// Absolute references (`/x`) resolve from the package root, an empty
/// reference resolves to the base itself. The fragment is always stripped.
pub fn resolve(base_href: &str, relative: &str) -> String {
    let relative = strip_fragment(relative.trim());
    if relative.is_empty() {
        return normalize(strip_fragment(base_href));
    }
    if let Some(absolute) = relative.strip_prefix('/') {
        return normalize(absolute);
    }
    let mut joined = String::from(parent_dir(base_href));
    joined.push_str(relative);
    normalize(&joined)
}

/// Relative reference from the resource at `from_href` to `to_href`.
pub fn relative_to(from_href: &str, to_href: &str) -> String {
    let from_dir = normalize(parent_dir(from_href));
    let (to_path, fragment) = split_fragment(to_href);
    let to_path = normalize(to_path);

    let from_parts: Vec<&str> = from_dir.split('/').filter(|s| !s.is_empty()).collect();
    let to_parts: Vec<&str> = to_path.split('/').filter(|s| !s.is_empty()).collect();

    let common = from_parts
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count()
        .min(to_parts.len().saturating_sub(1));

    let mut parts: Vec<&str> = Vec::new();
    for _ in common..from_parts.len() {
        parts.push("..");
    }
    parts.extend_from_slice(&to_parts[common..]);

    let mut result = parts.join("/");
    if let Some(fragment) = fragment {
        result.push('#');
        result.push_str(fragment);
    }
    result
}

/// Percent-decode an href as found in a manifest or link attribute.
pub fn decode(href: &str) -> String {
    percent_decode_str(href).decode_utf8_lossy().into_owned()
}

/// Percent-encode the characters that may not appear raw in an href.
pub fn encode(href: &str) -> String {
    utf8_percent_encode(href, HREF_ESCAPE).to_string()
}

/// An href is valid once normalized: non-empty, relative, and free of
/// parent-directory escapes.
pub fn is_valid(href: &str) -> bool {
    !href.trim().is_empty()
        && !href.starts_with('/')
        && !href.contains('\\')
        && !href.contains('#')
        && !href.split('/').any(|s| s == ".." || s == "." || s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_resolve_parent_reference() {
        assert_eq!(resolve("Text/ch1.xhtml", "../images/x.png"), "images/x.png");
        assert_eq!(resolve("Text/ch1.xhtml", "ch2.xhtml#s1"), "Text/ch2.xhtml");
        assert_eq!(resolve("Text/ch1.xhtml", "./ch2.xhtml"), "Text/ch2.xhtml");
        assert_eq!(resolve("Text/ch1.xhtml", "/Styles/a.css"), "Styles/a.css");
        assert_eq!(resolve("Text/ch1.xhtml", ""), "Text/ch1.xhtml");
        assert_eq!(resolve("Text/ch1.xhtml", "#note"), "Text/ch1.xhtml");
        assert_eq!(resolve("ch1.xhtml", "images/x.png"), "images/x.png");
    }

    #[test]
    fn test_relative_to() {
        assert_eq!(relative_to("Text/ch1.xhtml", "images/x.png"), "../images/x.png");
        assert_eq!(relative_to("Text/ch1.xhtml", "Text/ch2.xhtml#a"), "ch2.xhtml#a");
        assert_eq!(relative_to("cover.xhtml", "images/cover.jpg"), "images/cover.jpg");
        assert_eq!(relative_to("a/b/c.xhtml", "a/d.css"), "../d.css");
        assert_eq!(relative_to("a/c.xhtml", "a/c.xhtml"), "c.xhtml");
    }

    #[test]
    fn test_parent_dir_and_stem() {
        assert_eq!(parent_dir("Text/ch1.xhtml"), "Text/");
        assert_eq!(parent_dir("ch1.xhtml"), "");
        assert_eq!(file_stem("Text/ch1.xhtml"), "ch1");
        assert_eq!(file_stem("Images/.hidden"), ".hidden");
        assert_eq!(file_stem("noext"), "noext");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/OEBPS//Text/./a.xhtml"), "OEBPS/Text/a.xhtml");
        assert_eq!(normalize("a\\b\\..\\c.css"), "a/c.css");
        assert_eq!(normalize("../../x.png"), "x.png");
    }

    #[test]
    fn test_decode_encode() {
        assert_eq!(decode("Text/chapter%201.xhtml"), "Text/chapter 1.xhtml");
        assert_eq!(encode("Text/chapter 1.xhtml"), "Text/chapter%201.xhtml");
        assert_eq!(encode("Text/ch1.xhtml"), "Text/ch1.xhtml");
    }

    #[test]
    fn test_is_valid_and_external() {
        assert!(is_valid("Text/ch1.xhtml"));
        assert!(!is_valid(""));
        assert!(!is_valid("../x"));
        assert!(!is_valid("/abs"));
        assert!(is_external("https://example.com/a"));
        assert!(is_external("mailto:a@b"));
        assert!(!is_external("Text/a.xhtml"));
    }

    proptest! {
        #[test]
        fn prop_relative_then_resolve_round_trips(
            from in "[a-c]{1,2}(/[a-c]{1,2}){0,2}/[x-z]{1,3}\\.xhtml",
            to in "[a-c]{1,2}(/[a-c]{1,2}){0,2}/[x-z]{1,3}\\.png",
        ) {
            let rel = relative_to(&from, &to);
            prop_assert_eq!(resolve(&from, &rel), to);
        }
    }
}
