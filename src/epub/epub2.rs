//! EPUB 2.0.1: NCX table of contents and `<guide>`.

use tracing::warn;

use super::PackageCodec;
use super::ncx::{NCX_HREF, write_ncx};
use super::reader::{ReadContext, find_ncx, read_cover, read_guide, read_ncx_resource};
use super::writer::{ensure_resource, store_text};
use crate::error::Result;
use crate::media_type::MediaType;
use crate::model::{Book, Resource, Version};
use crate::path;
use crate::util::escape_xml;

pub(crate) struct Epub2Codec;

impl PackageCodec for Epub2Codec {
    fn version(&self) -> Version {
        Version::Epub2
    }

    fn read_navigation(&self, context: &ReadContext<'_>, book: &mut Book) -> Result<()> {
        read_guide(context, book);

        match find_ncx(context, book) {
            Some(ncx) => {
                book.set_ncx_resource(Some(&ncx))?;
                book.toc = read_ncx_resource(book, &ncx);
            }
            None => warn!("No NCX found, table of contents left empty"),
        }

        read_cover(context, book, None);
        Ok(())
    }

    fn write_navigation(&self, book: &mut Book) -> Result<()> {
        write_ncx_resource(book)
    }

    fn manifest_properties(&self, _book: &Book, _resource: &Resource) -> Vec<String> {
        Vec::new()
    }

    fn write_guide(&self, opf: &mut String, book: &Book) {
        let references = book
            .guide
            .with_synthesized(book.cover_page_href(), book.nav_href());
        let references: Vec<_> = references
            .iter()
            .filter(|r| book.resources.contains_href(&r.href))
            .collect();
        if references.is_empty() {
            return;
        }

        opf.push_str("  <guide>\n");
        for reference in references {
            opf.push_str(&format!(
                "    <reference type=\"{}\" title=\"{}\" href=\"{}\"/>\n",
                reference.semantic.epub2_name(),
                escape_xml(&reference.title),
                escape_xml(&path::encode(&reference.complete_href()))
            ));
        }
        opf.push_str("  </guide>\n");
    }
}

/// Regenerate the NCX from the table of contents, creating the resource
/// when the book has none.
pub(crate) fn write_ncx_resource(book: &mut Book) -> Result<()> {
    let existing = book.ncx_href().map(str::to_string);
    let href = ensure_resource(book, existing.as_deref(), NCX_HREF, "ncx", MediaType::NCX);
    book.set_ncx_resource(Some(&href))?;
    let ncx = write_ncx(book, &href);
    store_text(book, &href, ncx);
    Ok(())
}
