//! Helpers for building EPUB archives in memory.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const CONTAINER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

/// Zip the given entries behind a stored `mimetype`.
pub fn build_epub(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("mimetype", stored).unwrap();
    zip.write_all(b"application/epub+zip").unwrap();
    for (name, data) in entries {
        zip.start_file(*name, deflated).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Manifest ids of every resource.
pub fn resource_ids(book: &quire::Book) -> std::collections::BTreeSet<String> {
    book.resources.iter().map(|r| r.id().to_string()).collect()
}

/// `(scheme, value)` of every identifier, in order.
pub fn identifiers(book: &quire::Book) -> Vec<(Option<String>, String)> {
    book.metadata
        .identifiers
        .iter()
        .map(|i| (i.scheme.clone(), i.value.clone()))
        .collect()
}

/// Minimal XHTML page.
pub fn xhtml(title: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>{title}</title></head><body>{body}</body></html>"#
    )
}

/// A PNG signature and IHDR chunk, enough for dimension sniffing.
pub fn png_header(width: u32, height: u32) -> Vec<u8> {
    let mut data = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    data.extend_from_slice(&13u32.to_be_bytes());
    data.extend_from_slice(b"IHDR");
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&[8, 6, 0, 0, 0]);
    data.extend_from_slice(&[0, 0, 0, 0]);
    data
}

pub const EPUB2_OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
    <dc:title>The Second Edition</dc:title>
    <dc:creator opf:role="aut" opf:file-as="Doe, Jane">Jane Doe</dc:creator>
    <dc:language>en</dc:language>
    <dc:identifier id="BookId" opf:scheme="ISBN">9780000000001</dc:identifier>
    <dc:date opf:event="publication">2001-02-03</dc:date>
    <meta name="cover" content="cover-img"/>
  </metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="cover-img" href="images/cover.png" media-type="image/png"/>
    <item id="ch1" href="text/chapter%201.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="text/ch2.xhtml" media-type="application/xhtml+xml"/>
    <item id="css" href="style.css" media-type="text/css"/>
    <item id="ghost" href="text/missing.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="ch1"/>
    <itemref idref="ch2" linear="no"/>
    <itemref idref="ghost"/>
  </spine>
  <guide>
    <reference type="text" title="Start" href="text/chapter%201.xhtml#start"/>
    <reference type="bogus" title="Nope" href="text/ch2.xhtml"/>
  </guide>
</package>"#;

pub const EPUB2_NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head><meta name="dtb:uid" content="9780000000001"/></head>
  <docTitle><text>The Second Edition</text></docTitle>
  <navMap>
    <navPoint id="p1" playOrder="1">
      <navLabel><text>Chapter One</text></navLabel>
      <content src="text/chapter%201.xhtml"/>
      <navPoint id="p2" playOrder="2">
        <navLabel><text>Section 1.1</text></navLabel>
        <content src="text/chapter%201.xhtml#s1"/>
      </navPoint>
    </navPoint>
    <navPoint id="p3" playOrder="3">
      <navLabel><text>Chapter Two</text></navLabel>
      <content src="text/ch2.xhtml"/>
    </navPoint>
  </navMap>
</ncx>"#;

/// An EPUB 2 book with an NCX, a guide, a cover meta and one manifest item
/// that is not in the archive.
pub fn epub2_book() -> Vec<u8> {
    let ch1 = xhtml(
        "One",
        r#"<h1 id="start">One</h1><p><a href="ch2.xhtml">next</a></p><img src="../images/cover.png" alt=""/>"#,
    );
    let ch2 = xhtml("Two", r#"<h1>Two</h1><p><a href="chapter%201.xhtml#s1">back</a></p>"#);
    let css = "body { background: url(images/cover.png); }";
    let png = png_header(600, 800);
    build_epub(&[
        ("META-INF/container.xml", CONTAINER.as_bytes()),
        ("OEBPS/content.opf", EPUB2_OPF.as_bytes()),
        ("OEBPS/toc.ncx", EPUB2_NCX.as_bytes()),
        ("OEBPS/images/cover.png", png.as_slice()),
        ("OEBPS/text/chapter 1.xhtml", ch1.as_bytes()),
        ("OEBPS/text/ch2.xhtml", ch2.as_bytes()),
        ("OEBPS/style.css", css.as_bytes()),
        ("OEBPS/stray.txt", b"not in the manifest"),
    ])
}

pub const EPUB3_OPF: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title id="t1">The Third Edition</dc:title>
    <meta refines="#t1" property="title-type">main</meta>
    <dc:creator id="c1">John Roe</dc:creator>
    <meta refines="#c1" property="role" scheme="marc:relators">aut</meta>
    <dc:language>fr</dc:language>
    <dc:identifier id="uid">urn:uuid:12345678-1234-1234-1234-123456789abc</dc:identifier>
    <meta property="dcterms:modified">2000-01-01T00:00:00Z</meta>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="img" href="img/cover.png" media-type="image/png" properties="cover-image"/>
    <item id="c1" href="c1.xhtml" media-type="application/xhtml+xml"/>
    <item id="c2" href="c2.xhtml" media-type="application/xhtml+xml" properties="scripted"/>
  </manifest>
  <spine>
    <itemref idref="c1"/>
    <itemref idref="c2"/>
  </spine>
</package>"##;

pub const EPUB3_NAV: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>Nav</title></head>
<body>
  <nav epub:type="toc" id="toc">
    <ol>
      <li><a href="c1.xhtml">Première</a></li>
      <li><span>Part Two</span>
        <ol>
          <li><a href="c2.xhtml#a">Deuxième</a></li>
        </ol>
      </li>
    </ol>
  </nav>
  <nav epub:type="landmarks">
    <ol>
      <li><a epub:type="bodymatter" href="c1.xhtml">Start</a></li>
    </ol>
  </nav>
</body>
</html>"#;

/// An EPUB 3 book with a nav document, landmarks and a `cover-image`.
pub fn epub3_book() -> Vec<u8> {
    epub3_with(EPUB3_OPF, EPUB3_NAV)
}

pub fn epub3_with(opf: &str, nav: &str) -> Vec<u8> {
    let c1 = xhtml("1", "<p>un</p>");
    let c2 = xhtml("2", r#"<p id="a">deux</p>"#);
    let png = png_header(300, 400);
    build_epub(&[
        ("META-INF/container.xml", CONTAINER.as_bytes()),
        ("OEBPS/content.opf", opf.as_bytes()),
        ("OEBPS/nav.xhtml", nav.as_bytes()),
        ("OEBPS/img/cover.png", png.as_slice()),
        ("OEBPS/c1.xhtml", c1.as_bytes()),
        ("OEBPS/c2.xhtml", c2.as_bytes()),
    ])
}
