//! Reading and writing EPUB 2 packages.

mod common;

use std::io::Cursor;

use quire::epub::{EpubConfig, EpubWriter};
use quire::{Book, GuideType, Version, read_epub_from_reader, write_epub_to_writer};

fn read(bytes: Vec<u8>) -> Book {
    read_epub_from_reader(Cursor::new(bytes)).expect("Failed to read EPUB")
}

fn round_trip(book: &mut Book) -> Book {
    let out = write_epub_to_writer(book, Cursor::new(Vec::new())).expect("Failed to write EPUB");
    read(out.into_inner())
}

#[test]
fn test_read_metadata() {
    let book = read(common::epub2_book());

    assert_eq!(book.version, Version::Epub2);
    assert_eq!(book.metadata.title(), "The Second Edition");
    assert_eq!(book.metadata.language(), Some("en"));

    let author = &book.metadata.creators[0];
    assert_eq!(author.name, "Jane Doe");
    assert_eq!(author.role.as_deref(), Some("aut"));
    assert_eq!(author.file_as.as_deref(), Some("Doe, Jane"));

    let id = book.metadata.book_id().unwrap();
    assert_eq!(id.value, "9780000000001");
    assert_eq!(id.scheme.as_deref(), Some("ISBN"));
    assert_eq!(book.metadata.identifiers.len(), 1);
}

#[test]
fn test_read_manifest_and_spine() {
    let book = read(common::epub2_book());

    // The manifest item missing from the archive is skipped; the stray
    // archive entry is not registered.
    assert!(book.resources.get_by_href("text/missing.xhtml").is_none());
    assert!(book.resources.get_by_href("stray.txt").is_none());

    // Percent-encoded manifest hrefs are decoded.
    let ch1 = book.resources.get_by_href("text/chapter 1.xhtml").unwrap();
    assert_eq!(ch1.id(), "ch1");

    let spine: Vec<_> = book.spine.iter().map(|r| (r.href.as_str(), r.linear)).collect();
    assert_eq!(
        spine,
        vec![("text/chapter 1.xhtml", true), ("text/ch2.xhtml", false)]
    );
    assert_eq!(book.ncx_href(), Some("toc.ncx"));
}

#[test]
fn test_read_ncx_toc() {
    let book = read(common::epub2_book());

    assert_eq!(book.toc.entries.len(), 2);
    let first = &book.toc.entries[0];
    assert_eq!(first.title, "Chapter One");
    assert_eq!(first.href.as_deref(), Some("text/chapter 1.xhtml"));
    assert_eq!(first.children[0].title, "Section 1.1");
    assert_eq!(first.children[0].fragment_id.as_deref(), Some("s1"));
    assert_eq!(book.toc.entries[1].href.as_deref(), Some("text/ch2.xhtml"));
    assert_eq!(book.toc.depth(), 2);
}

#[test]
fn test_read_guide() {
    let book = read(common::epub2_book());

    assert_eq!(book.guide.len(), 2);
    let start = &book.guide.references()[0];
    assert_eq!(start.semantic, GuideType::Text);
    assert_eq!(start.href, "text/chapter 1.xhtml");
    assert_eq!(start.fragment_id.as_deref(), Some("start"));
    assert_eq!(start.title, "Start");

    // Types outside the vocabulary are kept and written back prefixed.
    let custom = &book.guide.references()[1];
    assert_eq!(custom.semantic, GuideType::Other("other.bogus".into()));
    assert_eq!(custom.href, "text/ch2.xhtml");
}

#[test]
fn test_cover_page_generated_from_meta() {
    let book = read(common::epub2_book());

    assert_eq!(book.cover_image_href(), Some("images/cover.png"));
    let page = book.cover_page().expect("cover page should be synthesized");
    assert_eq!(page.href(), "cover.xhtml");
    let text = page.text().unwrap();
    assert!(text.contains("viewBox=\"0 0 600 800\""));
    assert!(text.contains("images/cover.png"));
}

#[test]
fn test_round_trip() {
    let mut book = read(common::epub2_book());
    let again = round_trip(&mut book);

    assert_eq!(again.version, Version::Epub2);
    assert_eq!(again.metadata.title(), book.metadata.title());
    assert_eq!(again.metadata.creators, book.metadata.creators);
    assert_eq!(again.metadata.book_id().unwrap().value, "9780000000001");
    assert_eq!(again.toc, book.toc);
    assert_eq!(common::resource_ids(&again), common::resource_ids(&book));
    assert_eq!(common::identifiers(&again), common::identifiers(&book));
    assert_eq!(again.cover_image_href(), Some("images/cover.png"));
    assert_eq!(again.cover_page_href(), Some("cover.xhtml"));

    // The cover page leads the reading order once written.
    let spine: Vec<_> = again.spine.iter().map(|r| r.href.as_str()).collect();
    assert_eq!(spine, vec!["cover.xhtml", "text/chapter 1.xhtml", "text/ch2.xhtml"]);
    assert!(!again.spine.references()[2].linear);

    for resource in book.resources.iter() {
        let copy = again.resources.get_by_href(resource.href()).unwrap();
        assert_eq!(copy.media_type, resource.media_type);
    }
    let css = again.resources.get_by_href("style.css").unwrap();
    assert_eq!(css.data, b"body { background: url(images/cover.png); }");
}

#[test]
fn test_guide_written_with_synthesized_references() {
    let mut book = read(common::epub2_book());
    let again = round_trip(&mut book);

    let types: Vec<_> = again.guide.references().iter().map(|r| r.semantic.clone()).collect();
    assert!(types.contains(&GuideType::Text));
    assert!(types.contains(&GuideType::Cover));
    let opf = again.package_document();
    assert!(opf.contains("<guide>"));
    assert!(opf.contains("type=\"cover\""));
    assert!(opf.contains("type=\"other.bogus\""));
}

#[test]
fn test_rename_rewrites_references() {
    let mut book = read(common::epub2_book());
    book.rename_resource("text/ch2.xhtml", "text/second.xhtml").unwrap();

    let ch1 = book.resources.get_by_href("text/chapter 1.xhtml").unwrap();
    assert!(ch1.text().unwrap().contains("href=\"second.xhtml\""));
    assert_eq!(book.spine.references()[1].href, "text/second.xhtml");
    assert_eq!(book.toc.entries[1].href.as_deref(), Some("text/second.xhtml"));

    let again = round_trip(&mut book);
    assert!(again.resources.contains_href("text/second.xhtml"));
    assert!(!again.resources.contains_href("text/ch2.xhtml"));
}

#[test]
fn test_convert_to_epub3() {
    let mut book = read(common::epub2_book());
    let toc = book.toc.clone();

    let config = EpubConfig {
        target_version: Some(Version::Epub3),
        ..Default::default()
    };
    let out = EpubWriter::new()
        .with_config(config)
        .write(&mut book, Cursor::new(Vec::new()))
        .unwrap();
    let again = read(out.into_inner());

    assert_eq!(again.version, Version::Epub3);
    assert_eq!(again.nav_href(), Some("nav.xhtml"));
    assert_eq!(again.ncx_href(), Some("toc.ncx"));
    assert_eq!(again.toc, toc);
    assert_eq!(again.cover_image_href(), Some("images/cover.png"));
    assert!(again.metadata.modified.is_some());

    let opf = again.package_document();
    assert!(opf.contains("properties=\"nav\""));
    assert!(opf.contains("properties=\"cover-image\""));
    assert!(!opf.contains("<guide>"));
}
