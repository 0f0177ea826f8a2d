//! [`Book`] to package document and archive entries.

use std::io::{Seek, Write};

use tracing::{debug, info, warn};

use super::archive::write_entries;
use super::codec_for;
use super::container::{CONTAINER_PATH, DEFAULT_PACKAGE_PATH, container_xml};
use super::metadata::{IdAllocator, write_metadata};
use crate::error::Result;
use crate::media_type::MediaType;
use crate::model::{Book, Resource};
use crate::path;
use crate::util::escape_xml;

/// Directory every resource is written under.
const CONTENT_DIR: &str = "OEBPS/";

/// Timestamp in the form `dcterms:modified` requires.
pub(crate) fn timestamp_now() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// The package document (OPF) describing the book as it is now.
///
/// Navigation documents are not regenerated here; the writer does that
/// before serializing.
pub fn package_document(book: &Book) -> String {
    let codec = codec_for(book.version);
    let mut ids = IdAllocator::new(book.resources.iter().map(|r| r.id().to_string()));
    let modified = book.metadata.modified.clone().unwrap_or_else(timestamp_now);
    let cover_id = book.cover_image().map(Resource::id);
    let metadata = write_metadata(&book.metadata, book.version, cover_id, &modified, &mut ids);

    let mut opf = String::with_capacity(4096);
    opf.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    opf.push_str(&format!(
        "<package xmlns=\"http://www.idpf.org/2007/opf\" version=\"{}\" unique-identifier=\"{}\"",
        codec.version(),
        escape_xml(&metadata.unique_identifier)
    ));
    if let Some(prefix) = &metadata.prefix {
        opf.push_str(&format!(" prefix=\"{}\"", escape_xml(prefix)));
    }
    opf.push_str(">\n");

    opf.push_str(
        "  <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\" xmlns:opf=\"http://www.idpf.org/2007/opf\">\n",
    );
    opf.push_str(&metadata.xml);
    opf.push_str("  </metadata>\n");

    // Manifest, sorted by id
    let mut resources: Vec<&Resource> = book.resources.iter().collect();
    resources.sort_by(|a, b| a.id().cmp(b.id()));
    opf.push_str("  <manifest>\n");
    for resource in resources {
        opf.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"",
            escape_xml(resource.id()),
            escape_xml(&path::encode(resource.href())),
            escape_xml(resource.media_type.name())
        ));
        let properties = codec.manifest_properties(book, resource);
        if !properties.is_empty() {
            opf.push_str(&format!(" properties=\"{}\"", escape_xml(&properties.join(" "))));
        }
        if let Some(fallback) = &resource.fallback {
            opf.push_str(&format!(" fallback=\"{}\"", escape_xml(fallback)));
        }
        if let Some(overlay) = &resource.media_overlay {
            opf.push_str(&format!(" media-overlay=\"{}\"", escape_xml(overlay)));
        }
        opf.push_str("/>\n");
    }
    opf.push_str("  </manifest>\n");

    write_spine(&mut opf, book);
    codec.write_guide(&mut opf, book);
    opf.push_str("</package>\n");
    opf
}

fn write_spine(opf: &mut String, book: &Book) {
    match book.ncx_resource() {
        Some(ncx) => opf.push_str(&format!("  <spine toc=\"{}\">\n", escape_xml(ncx.id()))),
        None => opf.push_str("  <spine>\n"),
    }

    if let Some(page) = book.cover_page()
        && !book.spine.contains(page.href())
    {
        opf.push_str(&format!("    <itemref idref=\"{}\"/>\n", escape_xml(page.id())));
    }

    for reference in book.spine.iter() {
        let Some(resource) = book.resources.get_by_href(&reference.href) else {
            warn!("Spine entry {} has no resource, not written", reference.href);
            continue;
        };
        opf.push_str(&format!("    <itemref idref=\"{}\"", escape_xml(resource.id())));
        if !reference.linear {
            opf.push_str(" linear=\"no\"");
        }
        opf.push_str("/>\n");
    }
    opf.push_str("  </spine>\n");
}

/// Regenerate navigation documents and serialize the archive.
pub(crate) fn write_book<W: Write + Seek>(book: &mut Book, writer: W, compression_level: u32) -> Result<W> {
    codec_for(book.version).write_navigation(book)?;

    let package_path = DEFAULT_PACKAGE_PATH;
    let container = container_xml(package_path);
    let opf = package_document(book);

    let mut entries: Vec<(String, &[u8])> = Vec::with_capacity(book.resources.len() + 2);
    entries.push((CONTAINER_PATH.to_string(), container.as_bytes()));
    entries.push((package_path.to_string(), opf.as_bytes()));
    for resource in book.resources.iter() {
        let name = format!("{CONTENT_DIR}{}", resource.href());
        if name == package_path {
            warn!("Resource {} collides with the package document, not written", resource.href());
            continue;
        }
        entries.push((name, resource.data.as_slice()));
    }

    let writer = write_entries(
        writer,
        entries.iter().map(|(name, data)| (name.as_str(), *data)),
        compression_level,
    )?;
    info!(
        "Wrote EPUB {} '{}': {} resources",
        book.version,
        book.metadata.title(),
        book.resources.len()
    );
    Ok(writer)
}

/// Href of the resource the book points at through `existing`, or of a new
/// empty resource at `preferred` (or a generated name when that is taken).
pub(crate) fn ensure_resource(
    book: &mut Book,
    existing: Option<&str>,
    preferred: &str,
    id: &str,
    media_type: MediaType,
) -> String {
    if let Some(href) = existing
        && book.resources.contains_href(href)
    {
        return href.to_string();
    }
    let resource = if book.resources.contains_href(preferred) {
        Resource::new(id, "", media_type, Vec::new())
    } else {
        Resource::new(id, preferred, media_type, Vec::new())
    };
    let href = book.add_resource(resource);
    debug!("Created navigation resource {}", href);
    href
}

/// Replace a resource's bytes with freshly generated UTF-8 text.
pub(crate) fn store_text(book: &mut Book, href: &str, text: String) {
    if let Some(resource) = book.resources.get_by_href_mut(href) {
        resource.set_text(text);
    }
}
