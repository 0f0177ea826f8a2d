//! Cover page generation and scanning.

use quick_xml::Reader;
use quick_xml::events::Event;

use super::Version;
use crate::path;
use crate::util::{escape_xml, local_name, unescape_xml};

/// Size used for the generated page when the image header is unreadable.
pub const DEFAULT_COVER_SIZE: (u32, u32) = (600, 800);

/// Preferred href for a generated cover page.
pub const COVER_PAGE_HREF: &str = "cover.xhtml";

/// Build a minimal XHTML page showing `image_href` full-page through an
/// inline SVG, with the viewBox set to the image's size.
pub fn cover_page_xhtml(
    version: Version,
    page_href: &str,
    image_href: &str,
    (width, height): (u32, u32),
    title: &str,
) -> String {
    let reference = escape_xml(&path::encode(&path::relative_to(page_href, image_href)));
    let title = if title.trim().is_empty() { "Cover" } else { title };

    let mut out = String::with_capacity(1024);
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    match version {
        Version::Epub2 => {
            out.push_str("<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.1//EN\" \"http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd\">\n");
            out.push_str("<html xmlns=\"http://www.w3.org/1999/xhtml\">\n");
        }
        Version::Epub3 => {
            out.push_str("<!DOCTYPE html>\n");
            out.push_str("<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\">\n");
        }
    }
    out.push_str("<head>\n");
    out.push_str(&format!("  <title>{}</title>\n", escape_xml(title)));
    out.push_str("  <style type=\"text/css\">html, body { margin: 0; padding: 0; height: 100%; } svg { display: block; }</style>\n");
    out.push_str("</head>\n");
    out.push_str("<body>\n");
    out.push_str("  <div style=\"text-align: center; padding: 0; margin: 0;\">\n");
    out.push_str(&format!(
        "    <svg xmlns=\"http://www.w3.org/2000/svg\" xmlns:xlink=\"http://www.w3.org/1999/xlink\" version=\"1.1\" width=\"100%\" height=\"100%\" viewBox=\"0 0 {width} {height}\" preserveAspectRatio=\"xMidYMid meet\">\n"
    ));
    out.push_str(&format!(
        "      <image width=\"{width}\" height=\"{height}\" xlink:href=\"{reference}\"/>\n"
    ));
    out.push_str("    </svg>\n");
    out.push_str("  </div>\n");
    out.push_str("</body>\n");
    out.push_str("</html>\n");
    out
}

/// The raw `src` of the first `<img>` (or `href` of the first SVG `<image>`)
/// in a page, as written.
pub fn find_first_image_reference(xhtml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xhtml);
    reader.config_mut().check_end_names = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = e.name();
                let wanted: &[&[u8]] = match local_name(name.as_ref()) {
                    b"img" => &[&b"src"[..]],
                    b"image" => &[&b"xlink:href"[..], &b"href"[..]],
                    _ => continue,
                };
                for attr in e.attributes().flatten() {
                    if wanted.contains(&attr.key.as_ref()) {
                        let value = String::from_utf8_lossy(&attr.value);
                        let value = unescape_xml(value.trim()).into_owned();
                        if !value.is_empty() {
                            return Some(value);
                        }
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cover_page_contains_viewbox_and_relative_href() {
        let page = cover_page_xhtml(
            Version::Epub3,
            "Text/cover.xhtml",
            "Images/cover.jpg",
            (600, 800),
            "",
        );
        assert!(page.contains("viewBox=\"0 0 600 800\""));
        assert!(page.contains("xlink:href=\"../Images/cover.jpg\""));
        assert!(page.contains("<!DOCTYPE html>"));
        assert!(page.contains("<title>Cover</title>"));
    }

    #[test]
    fn test_cover_page_epub2_doctype() {
        let page = cover_page_xhtml(Version::Epub2, "cover.xhtml", "c.png", (10, 20), "My Book");
        assert!(page.contains("XHTML 1.1"));
        assert!(page.contains("xlink:href=\"c.png\""));
        assert!(page.contains("<title>My Book</title>"));
    }

    #[test]
    fn test_find_first_image_reference() {
        let html = r#"<html><body><p>Hi</p><img alt="x" src="../images/c.jpg"/><img src="b.png"/></body></html>"#;
        assert_eq!(find_first_image_reference(html).as_deref(), Some("../images/c.jpg"));

        let svg = r#"<html><body><svg><image xlink:href="cover.png"/></svg></body></html>"#;
        assert_eq!(find_first_image_reference(svg).as_deref(), Some("cover.png"));

        assert_eq!(find_first_image_reference("<html><body/></html>"), None);
    }

    #[test]
    fn test_generated_page_scans_back() {
        let page = cover_page_xhtml(Version::Epub3, "cover.xhtml", "images/a b.jpg", (1, 1), "");
        let found = find_first_image_reference(&page).map(|r| path::decode(&r));
        assert_eq!(found.as_deref(), Some("images/a b.jpg"));
    }
}
