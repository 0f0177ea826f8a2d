//! NCX navigation document (EPUB 2, kept in EPUB 3 for older readers).

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, warn};

use crate::model::{Book, Resources, TableOfContents, TocEntry};
use crate::path;
use crate::util::{escape_xml, local_name, normalize_whitespace, resolve_entity, unescape_xml};

pub const NCX_HREF: &str = "toc.ncx";

#[derive(Default)]
struct NavPointState {
    label: String,
    src: Option<String>,
    children: Vec<TocEntry>,
}

/// Read the `navMap` of the NCX at `ncx_href` into a table of contents.
///
/// A navPoint whose `content/@src` does not resolve to a registered
/// resource is dropped; its children move up to its parent.
pub fn read_ncx(text: &str, ncx_href: &str, resources: &Resources) -> TableOfContents {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);
    reader.config_mut().check_end_names = false;

    let mut stack: Vec<NavPointState> = vec![NavPointState::default()];
    let mut in_nav_map = false;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match local_name(e.name().as_ref()) {
                b"navMap" => in_nav_map = true,
                b"navPoint" if in_nav_map => stack.push(NavPointState::default()),
                b"text" if in_nav_map => in_text = true,
                b"content" if in_nav_map => set_src(&e, &mut stack),
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if in_nav_map && local_name(e.name().as_ref()) == b"content" {
                    set_src(&e, &mut stack);
                }
            }
            Ok(Event::Text(e)) => {
                if in_text && let Some(state) = stack.last_mut() {
                    state.label.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if in_text && let Some(state) = stack.last_mut() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        state.label.push_str(&resolved);
                    }
                }
            }
            Ok(Event::End(e)) => match local_name(e.name().as_ref()) {
                b"navMap" => in_nav_map = false,
                b"text" => in_text = false,
                b"navPoint" if in_nav_map && stack.len() > 1 => {
                    let Some(state) = stack.pop() else { break };
                    let entry = to_entry(state, ncx_href, resources);
                    if let Some(parent) = stack.last_mut() {
                        parent.children.extend(entry);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("Malformed NCX {}: {}", ncx_href, e);
                break;
            }
            _ => {}
        }
    }

    // Unclosed navPoints of a truncated file still count.
    while stack.len() > 1 {
        if let Some(state) = stack.pop() {
            let entry = to_entry(state, ncx_href, resources);
            if let Some(parent) = stack.last_mut() {
                parent.children.extend(entry);
            }
        }
    }

    TableOfContents {
        entries: stack.pop().map(|s| s.children).unwrap_or_default(),
    }
}

fn set_src(e: &quick_xml::events::BytesStart<'_>, stack: &mut [NavPointState]) {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == b"src"
            && let Some(state) = stack.last_mut()
        {
            let raw = String::from_utf8_lossy(&attr.value);
            state.src = Some(unescape_xml(raw.trim()).into_owned());
        }
    }
}

/// The entry for a finished navPoint, or its children when it has no
/// resolvable target.
fn to_entry(state: NavPointState, ncx_href: &str, resources: &Resources) -> Vec<TocEntry> {
    let title = normalize_whitespace(&state.label);
    let target = state.src.as_deref().and_then(|src| {
        let resource = resources.get_by_resolved_href(ncx_href, src)?;
        let decoded = path::decode(src);
        let fragment = path::split_fragment(&decoded)
            .1
            .filter(|f| !f.is_empty())
            .map(str::to_string);
        Some((resource.href().to_string(), fragment))
    });

    match target {
        Some((href, fragment_id)) => vec![TocEntry {
            title,
            href: Some(href),
            fragment_id,
            children: state.children,
        }],
        None => {
            debug!(
                "Dropping navPoint '{}' without a resolvable target ({:?})",
                title, state.src
            );
            state.children
        }
    }
}

/// Serialize the book's table of contents as an NCX located at `ncx_href`.
///
/// `playOrder` is assigned in document order to entries that have a target.
/// Grouping entries are written without content or play order.
pub fn write_ncx(book: &Book, ncx_href: &str) -> String {
    let metadata = &book.metadata;
    let uid = metadata.book_id().map(|i| i.value.as_str()).unwrap_or("");

    let mut ncx = String::new();
    ncx.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE ncx PUBLIC "-//NISO//DTD ncx 2005-1//EN" "http://www.daisy.org/z3986/2005/ncx-2005-1.dtd">
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
"#,
    );
    ncx.push_str(&format!(
        "    <meta name=\"dtb:uid\" content=\"{}\"/>\n",
        escape_xml(uid)
    ));
    ncx.push_str(&format!(
        "    <meta name=\"dtb:depth\" content=\"{}\"/>\n",
        book.toc.depth().max(1)
    ));
    ncx.push_str("    <meta name=\"dtb:totalPageCount\" content=\"0\"/>\n");
    ncx.push_str("    <meta name=\"dtb:maxPageNumber\" content=\"0\"/>\n");
    ncx.push_str("  </head>\n");

    ncx.push_str(&format!(
        "  <docTitle>\n    <text>{}</text>\n  </docTitle>\n",
        escape_xml(metadata.title())
    ));
    for author in &metadata.creators {
        ncx.push_str(&format!(
            "  <docAuthor>\n    <text>{}</text>\n  </docAuthor>\n",
            escape_xml(&author.name)
        ));
    }

    ncx.push_str("  <navMap>\n");
    let mut counter = NavCounter::default();
    write_nav_points(&mut ncx, &book.toc.entries, ncx_href, 2, &mut counter);
    ncx.push_str("  </navMap>\n");
    ncx.push_str("</ncx>\n");
    ncx
}

#[derive(Default)]
struct NavCounter {
    id: usize,
    play_order: usize,
}

fn write_nav_points(
    ncx: &mut String,
    entries: &[TocEntry],
    ncx_href: &str,
    depth: usize,
    counter: &mut NavCounter,
) {
    let indent = "  ".repeat(depth);
    for entry in entries {
        counter.id += 1;
        match entry.complete_href() {
            Some(target) => {
                counter.play_order += 1;
                ncx.push_str(&format!(
                    "{indent}<navPoint id=\"navPoint-{}\" playOrder=\"{}\">\n",
                    counter.id, counter.play_order
                ));
                push_label(ncx, &indent, &entry.title);
                let src = path::encode(&path::relative_to(ncx_href, &target));
                ncx.push_str(&format!(
                    "{indent}  <content src=\"{}\"/>\n",
                    escape_xml(&src)
                ));
            }
            None => {
                ncx.push_str(&format!("{indent}<navPoint id=\"navPoint-{}\">\n", counter.id));
                push_label(ncx, &indent, &entry.title);
            }
        }
        write_nav_points(ncx, &entry.children, ncx_href, depth + 1, counter);
        ncx.push_str(&format!("{indent}</navPoint>\n"));
    }
}

fn push_label(ncx: &mut String, indent: &str, title: &str) {
    ncx.push_str(&format!(
        "{indent}  <navLabel>\n{indent}    <text>{}</text>\n{indent}  </navLabel>\n",
        escape_xml(title)
    ));
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

    #[test]
    fn test_read_ncx_nested_and_relative() {
        let ncx = r#"<?xml version="1.0"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <navMap>
    <navPoint id="p1" playOrder="1">
      <navLabel><text>Part &amp; One</text></navLabel>
      <content src="../Text/part1.xhtml"/>
      <navPoint id="c1" playOrder="2">
        <navLabel><text>Chapter
          1</text></navLabel>
        <content src="../Text/ch%201.xhtml#start"/>
      </navPoint>
    </navPoint>
  </navMap>
</ncx>"#;
        let resources = resources(&["Text/part1.xhtml", "Text/ch 1.xhtml"]);
        let toc = read_ncx(ncx, "Misc/toc.ncx", &resources);

        assert_eq!(toc.entries.len(), 1);
        assert_eq!(toc.entries[0].title, "Part & One");
        assert_eq!(toc.entries[0].href.as_deref(), Some("Text/part1.xhtml"));
        let child = &toc.entries[0].children[0];
        assert_eq!(child.title, "Chapter 1");
        assert_eq!(child.href.as_deref(), Some("Text/ch 1.xhtml"));
        assert_eq!(child.fragment_id.as_deref(), Some("start"));
    }

    #[test]
    fn test_unresolvable_nav_point_promotes_children() {
        let ncx = r#"<ncx><navMap>
    <navPoint id="g"><navLabel><text>Group</text></navLabel>
      <navPoint id="a"><navLabel><text>A</text></navLabel><content src="a.xhtml"/></navPoint>
      <navPoint id="b"><navLabel><text>B</text></navLabel><content src="b.xhtml"/></navPoint>
    </navPoint>
    <navPoint id="m"><navLabel><text>Missing</text></navLabel><content src="missing.xhtml"/></navPoint>
  </navMap></ncx>"#;
        let toc = read_ncx(ncx, "toc.ncx", &resources(&["a.xhtml", "b.xhtml"]));
        let titles: Vec<_> = toc.entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
    }

    #[test]
    fn test_write_ncx_play_order_skips_groups() {
        let mut book = Book::default();
        book.metadata.add_title("Title");
        book.toc.push(
            TocEntry::group("Group")
                .with_child(TocEntry::new("A", "Text/a.xhtml"))
                .with_child(TocEntry::new("B", "Text/b.xhtml#x")),
        );

        let ncx = write_ncx(&book, "toc.ncx");
        assert!(ncx.contains("<navPoint id=\"navPoint-1\">"));
        assert!(ncx.contains("<navPoint id=\"navPoint-2\" playOrder=\"1\">"));
        assert!(ncx.contains("<navPoint id=\"navPoint-3\" playOrder=\"2\">"));
        assert!(ncx.contains("<content src=\"Text/b.xhtml#x\"/>"));
        assert!(ncx.contains("<meta name=\"dtb:depth\" content=\"2\"/>"));
        assert!(ncx.contains("<text>Title</text>"));
    }
}
