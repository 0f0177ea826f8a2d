//! EPUB 3 navigation document: `toc` and `landmarks` navs.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, warn};

use crate::model::{Book, GuideReference, GuideType, Resources, TableOfContents, TocEntry};
use crate::path;
use crate::util::{escape_xml, local_name, normalize_whitespace, resolve_entity, unescape_xml};

pub const NAV_HREF: &str = "nav.xhtml";

/// What a navigation document contributes to the book.
#[derive(Debug, Default)]
pub struct NavDocument {
    pub toc: TableOfContents,
    pub landmarks: Vec<GuideReference>,
    /// Whether a `toc` nav was present at all.
    pub has_toc: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum NavKind {
    Toc,
    Landmarks,
    Other,
}

#[derive(Default)]
struct ItemState {
    label: String,
    href: Option<String>,
    epub_type: Option<String>,
    children: Vec<TocEntry>,
}

/// Read the navigation document at `nav_href`. Links resolve against the
/// nav document's own directory.
pub fn read_nav(text: &str, nav_href: &str, resources: &Resources) -> NavDocument {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);
    reader.config_mut().check_end_names = false;

    let mut doc = NavDocument::default();
    let mut kind: Option<NavKind> = None;
    let mut nav_depth = 0usize;
    let mut items: Vec<ItemState> = Vec::new();
    let mut entries: Vec<TocEntry> = Vec::new();
    let mut label_depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if local == b"nav" {
                    nav_depth += 1;
                    if nav_depth == 1 {
                        kind = Some(nav_kind(&e));
                        if kind == Some(NavKind::Toc) {
                            doc.has_toc = true;
                        }
                    }
                    continue;
                }
                if !matches!(kind, Some(NavKind::Toc | NavKind::Landmarks)) {
                    continue;
                }
                if label_depth > 0 {
                    label_depth += 1;
                    continue;
                }
                match local {
                    b"li" => items.push(ItemState::default()),
                    b"a" | b"span" if !items.is_empty() => {
                        label_depth = 1;
                        if let Some(item) = items.last_mut() {
                            read_link_attributes(&e, item);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if label_depth > 0 && let Some(item) = items.last_mut() {
                    item.label.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::CData(e)) => {
                if label_depth > 0 && let Some(item) = items.last_mut() {
                    item.label.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if label_depth > 0 && let Some(item) = items.last_mut() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        item.label.push_str(&resolved);
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if local == b"nav" {
                    nav_depth = nav_depth.saturating_sub(1);
                    if nav_depth == 0 {
                        if kind == Some(NavKind::Toc) {
                            doc.toc.entries.append(&mut entries);
                        }
                        kind = None;
                        items.clear();
                        entries.clear();
                        label_depth = 0;
                    }
                    continue;
                }
                if label_depth > 0 {
                    label_depth -= 1;
                    continue;
                }
                if local != b"li" {
                    continue;
                }
                let Some(item) = items.pop() else { continue };
                match kind {
                    Some(NavKind::Toc) => {
                        let finished = toc_entries(item, nav_href, resources);
                        match items.last_mut() {
                            Some(parent) => parent.children.extend(finished),
                            None => entries.extend(finished),
                        }
                    }
                    Some(NavKind::Landmarks) => {
                        if let Some(reference) = landmark(item, nav_href, resources) {
                            doc.landmarks.push(reference);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("Malformed navigation document {}: {}", nav_href, e);
                break;
            }
            _ => {}
        }
    }

    if kind == Some(NavKind::Toc) {
        doc.toc.entries.append(&mut entries);
    }
    doc
}

fn nav_kind(e: &BytesStart<'_>) -> NavKind {
    for attr in e.attributes().flatten() {
        if local_name(attr.key.as_ref()) == b"type" {
            let value = String::from_utf8_lossy(&attr.value);
            for token in value.split_ascii_whitespace() {
                match token {
                    "toc" => return NavKind::Toc,
                    "landmarks" => return NavKind::Landmarks,
                    _ => {}
                }
            }
        }
    }
    NavKind::Other
}

fn read_link_attributes(e: &BytesStart<'_>, item: &mut ItemState) {
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value);
        match attr.key.as_ref() {
            b"href" => item.href = Some(unescape_xml(value.trim()).into_owned()),
            key if local_name(key) == b"type" => {
                item.epub_type = Some(value.trim().to_string());
            }
            _ => {}
        }
    }
}

/// A finished `<li>` of the toc nav: an entry, a heading that groups its
/// children, or just its children when it points nowhere.
fn toc_entries(item: ItemState, nav_href: &str, resources: &Resources) -> Vec<TocEntry> {
    let title = normalize_whitespace(&item.label);
    let target = item
        .href
        .as_deref()
        .and_then(|href| resolve_target(href, nav_href, resources));

    match target {
        Some((href, fragment_id)) => vec![TocEntry {
            title,
            href: Some(href),
            fragment_id,
            children: item.children,
        }],
        None if !item.children.is_empty() && !title.is_empty() => {
            vec![TocEntry {
                title,
                href: None,
                fragment_id: None,
                children: item.children,
            }]
        }
        None => {
            if let Some(href) = &item.href {
                debug!("Navigation entry '{}' points to unknown {}", title, href);
            }
            item.children
        }
    }
}

fn landmark(item: ItemState, nav_href: &str, resources: &Resources) -> Option<GuideReference> {
    let title = normalize_whitespace(&item.label);
    let Some(epub_type) = item.epub_type.as_deref() else {
        warn!("Landmark '{}' has no epub:type", title);
        return None;
    };
    let mut tokens = epub_type.split_ascii_whitespace();
    let Some(semantic) = tokens
        .clone()
        .find_map(GuideType::parse)
        .or_else(|| tokens.next().and_then(GuideType::parse_or_other))
    else {
        warn!("Landmark '{}' has an empty epub:type", title);
        return None;
    };
    let href = item.href.as_deref().unwrap_or("");
    let Some((href, fragment_id)) = resolve_target(href, nav_href, resources) else {
        warn!("Landmark '{}' points to unresolved href '{}'", epub_type, href);
        return None;
    };
    let mut reference = GuideReference::new(semantic, &href, title);
    reference.fragment_id = fragment_id;
    Some(reference)
}

/// Registry href and fragment of a link found in the nav document.
fn resolve_target(
    raw: &str,
    nav_href: &str,
    resources: &Resources,
) -> Option<(String, Option<String>)> {
    if raw.trim().is_empty() {
        return None;
    }
    let resource = resources.get_by_resolved_href(nav_href, raw)?;
    let decoded = path::decode(raw);
    let fragment = path::split_fragment(&decoded)
        .1
        .filter(|f| !f.is_empty())
        .map(str::to_string);
    Some((resource.href().to_string(), fragment))
}

/// Serialize a navigation document located at `nav_href` with the book's
/// table of contents and the given landmarks.
pub fn write_nav(book: &Book, nav_href: &str, landmarks: &[GuideReference]) -> String {
    let title = book.metadata.title();
    let mut html = String::new();
    html.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE html>\n");
    html.push_str(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\"",
    );
    if let Some(lang) = book.metadata.language() {
        let lang = escape_xml(lang);
        html.push_str(&format!(" lang=\"{lang}\" xml:lang=\"{lang}\""));
    }
    html.push_str(">\n<head>\n");
    html.push_str(&format!("  <title>{}</title>\n", escape_xml(title)));
    html.push_str("</head>\n<body>\n");

    html.push_str("  <nav epub:type=\"toc\" id=\"toc\">\n");
    html.push_str("    <h1>Table of Contents</h1>\n");
    write_list(&mut html, &book.toc.entries, nav_href, 2);
    html.push_str("  </nav>\n");

    if !landmarks.is_empty() {
        html.push_str("  <nav epub:type=\"landmarks\" id=\"landmarks\" hidden=\"\">\n");
        html.push_str("    <h2>Landmarks</h2>\n    <ol>\n");
        for reference in landmarks {
            let href = path::encode(&path::relative_to(nav_href, &reference.complete_href()));
            html.push_str(&format!(
                "      <li><a epub:type=\"{}\" href=\"{}\">{}</a></li>\n",
                reference.semantic.epub3_name(),
                escape_xml(&href),
                escape_xml(&reference.title)
            ));
        }
        html.push_str("    </ol>\n  </nav>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn write_list(html: &mut String, entries: &[TocEntry], nav_href: &str, depth: usize) {
    let indent = "  ".repeat(depth);
    html.push_str(&format!("{indent}<ol>\n"));
    for entry in entries {
        html.push_str(&format!("{indent}  <li>"));
        match entry.complete_href() {
            Some(target) => {
                let href = path::encode(&path::relative_to(nav_href, &target));
                html.push_str(&format!(
                    "<a href=\"{}\">{}</a>",
                    escape_xml(&href),
                    escape_xml(&entry.title)
                ));
            }
            None => html.push_str(&format!("<span>{}</span>", escape_xml(&entry.title))),
        }
        if entry.children.is_empty() {
            html.push_str("</li>\n");
        } else {
            html.push('\n');
            write_list(html, &entry.children, nav_href, depth + 2);
            html.push_str(&format!("{indent}  </li>\n"));
        }
    }
    html.push_str(&format!("{indent}</ol>\n"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media_type::MediaType;
    use crate::model::Resource;

    fn resources(hrefs: &[&str]) -> Resources {
        let mut resources = Resources::new();
        for href in hrefs {
            resources.add(Resource::new("", *href, MediaType::XHTML, Vec::new()));
        }
        resources
    }

    const NAV: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<body>
  <nav epub:type="toc" id="toc">
    <ol>
      <li><a href="../Text/ch1.xhtml">Chapter <em>One</em></a>
        <ol><li><a href="../Text/ch1.xhtml#s1">Section</a></li></ol>
      </li>
      <li><span>Part II</span>
        <ol><li><a href="../Text/ch2.xhtml">Chapter Two</a></li></ol>
      </li>
    </ol>
  </nav>
  <nav epub:type="landmarks">
    <ol>
      <li><a epub:type="cover" href="../Text/cover.xhtml">Cover</a></li>
      <li><a epub:type="bodymatter" href="../Text/ch1.xhtml">Start</a></li>
      <li><a epub:type="frontispiece" href="../Text/ch1.xhtml">Odd</a></li>
      <li><a epub:type="index" href="../Text/missing.xhtml">Index</a></li>
    </ol>
  </nav>
  <nav epub:type="page-list"><ol><li><a href="../Text/ch1.xhtml#p1">1</a></li></ol></nav>
</body>
</html>"#;

    #[test]
    fn test_read_nav_toc() {
        let resources = resources(&["Text/ch1.xhtml", "Text/ch2.xhtml", "Text/cover.xhtml"]);
        let doc = read_nav(NAV, "Nav/nav.xhtml", &resources);

        assert!(doc.has_toc);
        assert_eq!(doc.toc.entries.len(), 2);
        let first = &doc.toc.entries[0];
        assert_eq!(first.title, "Chapter One");
        assert_eq!(first.href.as_deref(), Some("Text/ch1.xhtml"));
        assert_eq!(first.children[0].fragment_id.as_deref(), Some("s1"));

        let group = &doc.toc.entries[1];
        assert_eq!(group.title, "Part II");
        assert!(group.href.is_none());
        assert_eq!(group.children[0].href.as_deref(), Some("Text/ch2.xhtml"));
    }

    #[test]
    fn test_read_nav_landmarks_skip_unresolved() {
        let resources = resources(&["Text/ch1.xhtml", "Text/ch2.xhtml", "Text/cover.xhtml"]);
        let doc = read_nav(NAV, "Nav/nav.xhtml", &resources);

        let types: Vec<_> = doc.landmarks.iter().map(|r| r.semantic.clone()).collect();
        assert_eq!(
            types,
            vec![
                GuideType::Cover,
                GuideType::Text,
                GuideType::Other("other.frontispiece".into()),
            ]
        );
        assert_eq!(doc.landmarks[0].href, "Text/cover.xhtml");
        assert_eq!(doc.landmarks[1].title, "Start");
    }

    #[test]
    fn test_write_nav_reads_back() {
        let mut book = Book::default();
        book.metadata.add_title("Book");
        book.metadata.languages.push("en".into());
        book.toc.push(
            TocEntry::group("Part")
                .with_child(TocEntry::new("One", "Text/ch1.xhtml"))
                .with_child(TocEntry::new("Two", "Text/ch 2.xhtml#x")),
        );
        let landmarks = vec![GuideReference::new(GuideType::Toc, "nav.xhtml", "")];

        let xhtml = write_nav(&book, "nav.xhtml", &landmarks);
        assert!(xhtml.contains("href=\"Text/ch%202.xhtml#x\""));
        assert!(xhtml.contains("<a epub:type=\"toc\" href=\"nav.xhtml\">Table of Contents</a>"));
        assert!(xhtml.contains("xml:lang=\"en\""));

        let resources = resources(&["Text/ch1.xhtml", "Text/ch 2.xhtml", "nav.xhtml"]);
        let doc = read_nav(&xhtml, "nav.xhtml", &resources);
        assert_eq!(doc.toc, book.toc);
        assert_eq!(doc.landmarks, landmarks);
    }
}
