use std::fmt;

use tracing::debug;

use super::cover::{self, COVER_PAGE_HREF, DEFAULT_COVER_SIZE};
use super::guide::Guide;
use super::metadata::Metadata;
use super::resource::Resource;
use super::resources::Resources;
use super::spine::{Spine, SpineReference};
use super::toc::TableOfContents;
use crate::error::{Error, Result};
use crate::media_type::MediaType;
use crate::path;

/// EPUB version of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Version {
    Epub2,
    #[default]
    Epub3,
}

impl Version {
    /// Read `package/@version`. Anything starting with `3` is EPUB 3,
    /// everything else (including a missing attribute) is EPUB 2.
    pub fn from_attribute(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.starts_with('3') => Version::Epub3,
            _ => Version::Epub2,
        }
    }

    /// Value written to `package/@version`.
    pub fn as_str(self) -> &'static str {
        match self {
            Version::Epub2 => "2.0",
            Version::Epub3 => "3.0",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An EPUB publication held fully in memory.
///
/// Cross references (spine, TOC, guide, cover, nav) are stored as hrefs and
/// kept in step with the resource registry by [`Book::rename_resource`] and
/// [`Book::remove_resource`]. Mutating [`Book::resources`] directly skips
/// that bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct Book {
    pub version: Version,
    pub metadata: Metadata,
    pub resources: Resources,
    pub spine: Spine,
    pub toc: TableOfContents,
    /// Guide (EPUB 2) or landmarks (EPUB 3).
    pub guide: Guide,
    cover_image: Option<String>,
    cover_page: Option<String>,
    nav_resource: Option<String>,
    ncx_resource: Option<String>,
}

impl Book {
    pub fn new(version: Version) -> Self {
        Self {
            version,
            ..Default::default()
        }
    }

    pub fn cover_image(&self) -> Option<&Resource> {
        self.cover_image
            .as_deref()
            .and_then(|href| self.resources.get_by_href(href))
    }

    pub fn cover_page(&self) -> Option<&Resource> {
        self.cover_page
            .as_deref()
            .and_then(|href| self.resources.get_by_href(href))
    }

    /// EPUB 3 navigation document.
    pub fn nav_resource(&self) -> Option<&Resource> {
        self.nav_resource
            .as_deref()
            .and_then(|href| self.resources.get_by_href(href))
    }

    pub fn ncx_resource(&self) -> Option<&Resource> {
        self.ncx_resource
            .as_deref()
            .and_then(|href| self.resources.get_by_href(href))
    }

    pub fn cover_image_href(&self) -> Option<&str> {
        self.cover_image.as_deref()
    }

    pub fn cover_page_href(&self) -> Option<&str> {
        self.cover_page.as_deref()
    }

    pub fn nav_href(&self) -> Option<&str> {
        self.nav_resource.as_deref()
    }

    pub fn ncx_href(&self) -> Option<&str> {
        self.ncx_resource.as_deref()
    }

    /// Register a resource and return its final href.
    pub fn add_resource(&mut self, resource: Resource) -> String {
        self.resources.add(resource).href().to_string()
    }

    /// Append a resource to the reading order.
    ///
    /// Fails when the href is not registered or the resource is already in
    /// the spine.
    pub fn add_to_spine(&mut self, href: &str, linear: bool) -> Result<usize> {
        let resource = self
            .resources
            .get_by_href(href)
            .ok_or_else(|| Error::ResourceNotFound(href.to_string()))?;
        if self.spine.contains(resource.href()) {
            return Err(Error::DuplicateId(resource.id().to_string()));
        }
        let reference = SpineReference {
            href: resource.href().to_string(),
            linear,
        };
        Ok(self.spine.add_reference(reference, None))
    }

    /// Register a content document, append it to the spine and give it a
    /// top-level TOC entry. Returns the registered href.
    pub fn add_section(&mut self, title: &str, resource: Resource) -> Result<String> {
        let href = self.add_resource(resource);
        if !self.spine.contains(&href) {
            self.add_to_spine(&href, true)?;
        }
        self.toc.add_section(Some(&href), &[title]);
        Ok(href)
    }

    /// Remove a resource and every link the book holds to it.
    pub fn remove_resource(&mut self, href: &str) -> Option<Resource> {
        let removed = self.resources.remove(href)?;
        let href = removed.href();

        self.spine.remove(href);
        if self.spine.toc_resource.as_deref() == Some(href) {
            self.spine.toc_resource = None;
        }
        self.guide.retain(|r| r.href != href);
        self.toc.remove_resource(href);
        for pointer in [
            &mut self.cover_image,
            &mut self.cover_page,
            &mut self.nav_resource,
            &mut self.ncx_resource,
        ] {
            if pointer.as_deref() == Some(href) {
                *pointer = None;
            }
        }
        debug!("Removed resource {}", href);
        Some(removed)
    }

    /// Move a resource to `new_href`, updating the references held by other
    /// resources and by the book's navigation structures.
    pub fn rename_resource(&mut self, old_href: &str, new_href: &str) -> Result<()> {
        let old_href = path::strip_fragment(old_href).to_string();
        let new_href = path::normalize(new_href);
        self.resources.rename(&old_href, &new_href)?;

        self.spine.rename(&old_href, &new_href);
        self.toc.rename(&old_href, &new_href);
        self.guide.rename(&old_href, &new_href);
        for pointer in [
            &mut self.cover_image,
            &mut self.cover_page,
            &mut self.nav_resource,
            &mut self.ncx_resource,
        ] {
            if pointer.as_deref() == Some(old_href.as_str()) {
                *pointer = Some(new_href.clone());
            }
        }
        Ok(())
    }

    /// Use the image at `href` as the cover and regenerate the cover page
    /// to show it.
    pub fn set_cover_image(&mut self, href: &str) -> Result<()> {
        let resource = self
            .resources
            .get_by_href(href)
            .ok_or_else(|| Error::ResourceNotFound(href.to_string()))?;
        if !resource.media_type.is_image() {
            return Err(Error::InvalidHref(format!("{href} is not an image")));
        }
        self.cover_image = Some(resource.href().to_string());
        self.generate_cover_page();
        Ok(())
    }

    /// Use the document at `href` as the cover page and adopt the first
    /// image it shows as the cover image.
    pub fn set_cover_page(&mut self, href: &str) -> Result<()> {
        let resource = self
            .resources
            .get_by_href(href)
            .ok_or_else(|| Error::ResourceNotFound(href.to_string()))?;
        self.cover_page = Some(resource.href().to_string());
        self.rescan_cover_page();
        Ok(())
    }

    /// Forget the cover without removing any resource.
    pub fn clear_cover(&mut self) {
        self.cover_image = None;
        self.cover_page = None;
    }

    pub fn set_nav_resource(&mut self, href: Option<&str>) -> Result<()> {
        self.nav_resource = self.registered_href(href)?;
        Ok(())
    }

    pub fn set_ncx_resource(&mut self, href: Option<&str>) -> Result<()> {
        self.ncx_resource = self.registered_href(href)?;
        self.spine.toc_resource = self.ncx_resource.clone();
        Ok(())
    }

    /// (Re)write the cover page so it displays the cover image. Creates the
    /// page when the book has none. Returns the page href.
    pub(crate) fn generate_cover_page(&mut self) -> Option<String> {
        let image = self.cover_image()?;
        let image_href = image.href().to_string();
        let dimensions = image.image_dimensions().unwrap_or_else(|| {
            debug!("Cover image {} has unreadable dimensions", image_href);
            DEFAULT_COVER_SIZE
        });

        let page_href = match &self.cover_page {
            Some(href) if self.resources.contains_href(href) => href.clone(),
            _ if !self.resources.contains_href(COVER_PAGE_HREF) => COVER_PAGE_HREF.to_string(),
            _ => String::new(),
        };
        let title = self.metadata.title().to_string();

        let page_href = if page_href.is_empty() {
            // The generated name is only known after registration.
            let href = self.add_resource(Resource::anonymous(MediaType::XHTML, Vec::new()));
            let xhtml = cover::cover_page_xhtml(self.version, &href, &image_href, dimensions, &title);
            if let Some(page) = self.resources.get_by_href_mut(&href) {
                page.data = xhtml.into_bytes();
            }
            href
        } else {
            let xhtml =
                cover::cover_page_xhtml(self.version, &page_href, &image_href, dimensions, &title);
            match self.resources.get_by_href_mut(&page_href) {
                Some(page) => {
                    page.set_text(xhtml);
                    page.media_type = MediaType::XHTML;
                }
                None => {
                    self.resources.add(Resource::new(
                        "cover",
                        page_href.as_str(),
                        MediaType::XHTML,
                        xhtml.into_bytes(),
                    ));
                }
            }
            page_href
        };

        if let Some(page) = self.resources.get_by_href_mut(&page_href) {
            page.add_property("svg");
        }
        debug!("Generated cover page {} for {}", page_href, image_href);
        self.cover_page = Some(page_href.clone());
        Some(page_href)
    }

    /// Adopt the first image shown by the cover page as the cover image.
    /// Returns the adopted href.
    pub(crate) fn rescan_cover_page(&mut self) -> Option<String> {
        let href = {
            let page = self.cover_page()?;
            let text = page.text()?;
            let reference = cover::find_first_image_reference(&text)?;
            let image = self.resources.get_by_resolved_href(page.href(), &reference)?;
            if !image.media_type.is_image() {
                return None;
            }
            debug!("Cover page {} shows {}", page.href(), image.href());
            image.href().to_string()
        };
        self.cover_image = Some(href.clone());
        Some(href)
    }

    /// Set pointers without any regeneration. Used by the codecs while a
    /// book is being assembled.
    pub(crate) fn set_cover_pointers(&mut self, image: Option<String>, page: Option<String>) {
        self.cover_image = image;
        self.cover_page = page;
    }

    /// The package document (OPF) for the current state, in this book's
    /// version.
    pub fn package_document(&self) -> String {
        crate::epub::package_document(self)
    }

    fn registered_href(&self, href: Option<&str>) -> Result<Option<String>> {
        match href {
            None => Ok(None),
            Some(href) => self
                .resources
                .get_by_href(href)
                .map(|r| Some(r.href().to_string()))
                .ok_or_else(|| Error::ResourceNotFound(href.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GuideReference, GuideType, TocEntry};
    use crate::util::test_support::png_header;

    fn xhtml(id: &str, href: &str, body: &str) -> Resource {
        Resource::new(id, href, MediaType::XHTML, body.as_bytes().to_vec())
    }

    #[test]
    fn test_version_from_attribute() {
        assert_eq!(Version::from_attribute(Some("3.0")), Version::Epub3);
        assert_eq!(Version::from_attribute(Some(" 3.1")), Version::Epub3);
        assert_eq!(Version::from_attribute(Some("2.0.1")), Version::Epub2);
        assert_eq!(Version::from_attribute(None), Version::Epub2);
    }

    #[test]
    fn test_add_to_spine_rejects_duplicates() {
        let mut book = Book::default();
        let href = book.add_resource(xhtml("ch1", "ch1.xhtml", ""));
        assert_eq!(book.add_to_spine(&href, true).unwrap(), 0);
        assert!(matches!(book.add_to_spine(&href, true), Err(Error::DuplicateId(_))));
        assert!(matches!(
            book.add_to_spine("missing.xhtml", true),
            Err(Error::ResourceNotFound(_))
        ));
    }

    #[test]
    fn test_add_section() {
        let mut book = Book::default();
        let href = book
            .add_section("One", Resource::anonymous(MediaType::XHTML, Vec::new()))
            .unwrap();
        assert_eq!(href, "item_1.xhtml");
        assert_eq!(book.spine.len(), 1);
        assert_eq!(book.toc.entries[0].title, "One");
    }

    #[test]
    fn test_remove_resource_cleans_links() {
        let mut book = Book::default();
        book.add_section("One", xhtml("c1", "c1.xhtml", "")).unwrap();
        book.add_section("Two", xhtml("c2", "c2.xhtml", "")).unwrap();
        book.guide
            .add_reference(GuideReference::new(GuideType::Text, "c1.xhtml", "Start"));
        book.set_nav_resource(Some("c1.xhtml")).unwrap();

        let removed = book.remove_resource("c1.xhtml").unwrap();
        assert_eq!(removed.id(), "c1");
        assert_eq!(book.spine.len(), 1);
        assert!(book.guide.is_empty());
        assert_eq!(book.toc.entries.len(), 1);
        assert!(book.nav_resource().is_none());
        assert!(book.remove_resource("c1.xhtml").is_none());
    }

    #[test]
    fn test_rename_resource_updates_book_links() {
        let mut book = Book::default();
        book.add_resource(Resource::new(
            "img",
            "cover.png",
            MediaType::PNG,
            png_header(600, 800),
        ));
        book.add_section("One", xhtml("c1", "c1.xhtml", r#"<img src="cover.png"/>"#))
            .unwrap();
        book.toc.entries[0]
            .children
            .push(TocEntry::new("Sub", "c1.xhtml#s"));
        book.guide
            .add_reference(GuideReference::new(GuideType::Text, "c1.xhtml", ""));
        book.set_cover_image("cover.png").unwrap();

        book.rename_resource("c1.xhtml", "Text/c1.xhtml").unwrap();
        book.rename_resource("cover.png", "Images/cover.png").unwrap();

        assert_eq!(book.spine.references()[0].href, "Text/c1.xhtml");
        assert_eq!(book.toc.entries[0].href.as_deref(), Some("Text/c1.xhtml"));
        assert_eq!(
            book.toc.entries[0].children[0].complete_href().as_deref(),
            Some("Text/c1.xhtml#s")
        );
        assert_eq!(book.guide.references()[0].href, "Text/c1.xhtml");
        assert_eq!(book.cover_image_href(), Some("Images/cover.png"));
        let chapter = book.resources.get_by_id("c1").unwrap();
        assert_eq!(chapter.text().unwrap(), r#"<img src="../Images/cover.png"/>"#);
    }

    #[test]
    fn test_set_cover_image_generates_page() {
        let mut book = Book::default();
        book.add_resource(Resource::new(
            "img",
            "images/cover.png",
            MediaType::PNG,
            png_header(600, 800),
        ));
        book.set_cover_image("images/cover.png").unwrap();

        let page = book.cover_page().unwrap();
        assert_eq!(page.href(), "cover.xhtml");
        let text = page.text().unwrap();
        assert!(text.contains("viewBox=\"0 0 600 800\""));
        assert!(text.contains("images/cover.png"));
    }

    #[test]
    fn test_set_cover_image_unreadable_uses_default_size() {
        let mut book = Book::default();
        book.add_resource(Resource::new("img", "c.jpg", MediaType::JPEG, vec![1, 2, 3]));
        book.set_cover_image("c.jpg").unwrap();
        let text = book.cover_page().unwrap().text().unwrap().into_owned();
        assert!(text.contains("viewBox=\"0 0 600 800\""));
    }

    #[test]
    fn test_set_cover_image_rejects_non_images() {
        let mut book = Book::default();
        book.add_resource(xhtml("c1", "c1.xhtml", ""));
        assert!(book.set_cover_image("c1.xhtml").is_err());
        assert!(book.set_cover_image("nope.png").is_err());
    }

    #[test]
    fn test_set_cover_page_rescans_image() {
        let mut book = Book::default();
        book.add_resource(Resource::new("img", "images/c.png", MediaType::PNG, png_header(1, 1)));
        book.add_resource(xhtml(
            "cover",
            "Text/cover.xhtml",
            r#"<html><body><img src="../images/c.png"/></body></html>"#,
        ));
        book.set_cover_page("Text/cover.xhtml").unwrap();
        assert_eq!(book.cover_image_href(), Some("images/c.png"));
    }

    #[test]
    fn test_generated_page_avoids_taken_href() {
        let mut book = Book::default();
        book.add_resource(xhtml("other", "cover.xhtml", "unrelated"));
        book.add_resource(Resource::new("img", "c.png", MediaType::PNG, png_header(2, 3)));
        book.set_cover_image("c.png").unwrap();
        assert_eq!(book.cover_page_href(), Some("item_1.xhtml"));
        assert_eq!(
            book.resources.get_by_href("cover.xhtml").unwrap().text().unwrap(),
            "unrelated"
        );
    }
}
