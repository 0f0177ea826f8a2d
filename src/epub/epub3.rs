//! EPUB 3: navigation document, landmarks and manifest properties.

use tracing::{debug, warn};

use super::PackageCodec;
use super::epub2::write_ncx_resource;
use super::nav::{NAV_HREF, read_nav, write_nav};
use super::reader::{ReadContext, find_ncx, read_cover, read_guide, read_ncx_resource};
use super::writer::{ensure_resource, store_text};
use crate::error::{Error, Result};
use crate::media_type::MediaType;
use crate::model::{Book, Resource, Version};

/// Manifest properties derived from the book rather than stored on the
/// resource.
const DERIVED_PROPERTIES: &[&str] = &["nav", "cover-image"];

pub(crate) struct Epub3Codec;

impl PackageCodec for Epub3Codec {
    fn version(&self) -> Version {
        Version::Epub3
    }

    fn read_navigation(&self, context: &ReadContext<'_>, book: &mut Book) -> Result<()> {
        let nav_href = context
            .href_with_property("nav")
            .map(str::to_string)
            .ok_or(Error::MissingNavDocument)?;
        book.set_nav_resource(Some(&nav_href))?;

        let nav = match book.resources.get_by_href(&nav_href).and_then(|r| r.text()) {
            Some(text) => read_nav(&text, &nav_href, &book.resources),
            None => {
                warn!("Navigation document {} is not readable", nav_href);
                Default::default()
            }
        };

        if let Some(ncx) = find_ncx(context, book) {
            book.set_ncx_resource(Some(&ncx))?;
        }

        if !nav.toc.is_empty() {
            book.toc = nav.toc;
        } else if let Some(ncx) = book.ncx_href().map(str::to_string) {
            debug!("Navigation document has no toc entries, using NCX {}", ncx);
            book.toc = read_ncx_resource(book, &ncx);
        } else if !nav.has_toc {
            warn!("Navigation document {} has no toc nav", nav_href);
        }

        if nav.landmarks.is_empty() {
            read_guide(context, book);
        } else {
            for landmark in nav.landmarks {
                book.guide.add_reference(landmark);
            }
        }

        let cover_image = context.href_with_property("cover-image").map(str::to_string);
        read_cover(context, book, cover_image);
        Ok(())
    }

    fn write_navigation(&self, book: &mut Book) -> Result<()> {
        let existing = book.nav_href().map(str::to_string);
        let href = ensure_resource(book, existing.as_deref(), NAV_HREF, "nav", MediaType::XHTML);
        book.set_nav_resource(Some(&href))?;

        let landmarks: Vec<_> = book
            .guide
            .with_synthesized(book.cover_page_href(), Some(&href))
            .into_iter()
            .filter(|r| book.resources.contains_href(&r.href))
            .collect();
        let xhtml = write_nav(book, &href, &landmarks);
        store_text(book, &href, xhtml);

        // Older reading systems still look for an NCX.
        write_ncx_resource(book)
    }

    fn manifest_properties(&self, book: &Book, resource: &Resource) -> Vec<String> {
        let mut properties: Vec<String> = resource
            .properties
            .iter()
            .filter(|p| !DERIVED_PROPERTIES.contains(&p.as_str()))
            .cloned()
            .collect();
        if book.nav_href() == Some(resource.href()) {
            properties.push("nav".to_string());
        }
        if book.cover_image_href() == Some(resource.href()) {
            properties.push("cover-image".to_string());
        }
        properties.dedup();
        properties
    }

    fn write_guide(&self, _opf: &mut String, _book: &Book) {
        // Landmarks live in the navigation document.
    }
}
