//! Archive entries to [`Book`].

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, warn};

use super::container::{CONTAINER_PATH, DEFAULT_PACKAGE_PATH, parse_container};
use super::metadata::{ReadMetadata, read_metadata};
use super::ncx::read_ncx;
use super::package::{PackageDocument, parse_package};
use super::codec_for;
use crate::error::{Error, Result};
use crate::media_type::MediaTypes;
use crate::model::{Book, GuideReference, GuideType, Resource, SpineReference, TableOfContents, Version};
use crate::path;
use crate::util::{decode_text, extract_xml_encoding, strip_bom};

/// Manifest ids tried for the NCX when `spine/@toc` does not name one.
const COMMON_NCX_IDS: &[&str] = &["toc", "ncx", "ncxtoc", "TOC", "NCX", "Toc", "Ncx"];

/// What the version codecs need from the package document once the
/// manifest, metadata and spine have been read.
pub(crate) struct ReadContext<'a> {
    pub package: &'a PackageDocument,
    /// Manifest id -> registered href.
    pub manifest_hrefs: HashMap<String, String>,
    /// `<meta name="cover" content="..">`.
    pub cover_meta: Option<String>,
}

impl ReadContext<'_> {
    pub fn href_for_id(&self, id: &str) -> Option<&str> {
        self.manifest_hrefs.get(id).map(String::as_str)
    }

    /// Href of the first manifest item carrying `property`.
    pub fn href_with_property(&self, property: &str) -> Option<&str> {
        self.package
            .manifest
            .iter()
            .filter(|item| item.has_property(property))
            .find_map(|item| self.href_for_id(&item.id))
    }
}

/// Assemble a book from the entries of an EPUB archive.
pub(crate) fn read_book(mut entries: BTreeMap<String, Vec<u8>>, media_types: &MediaTypes) -> Result<Book> {
    let package_path = match entries.get(CONTAINER_PATH).and_then(|c| parse_container(c)) {
        Some(full_path) => path::normalize(&path::decode(&full_path)),
        None => {
            warn!(
                "No usable {}, assuming {}",
                CONTAINER_PATH, DEFAULT_PACKAGE_PATH
            );
            DEFAULT_PACKAGE_PATH.to_string()
        }
    };

    let package_bytes = entries.remove(&package_path).ok_or_else(|| {
        Error::PackageDocument(format!("{package_path} not found in archive"))
    })?;
    let package_text = decode_text(strip_bom(&package_bytes), None);
    let package = parse_package(&package_text)?;
    let version = Version::from_attribute(package.version.as_deref());
    debug!("Package document {} declares EPUB {}", package_path, version);

    let files = package_relative(entries, path::parent_dir(&package_path));
    let mut book = Book::new(version);
    let manifest_hrefs = read_manifest(&package, files, media_types, &mut book);

    let ReadMetadata { metadata, cover } = read_metadata(
        &package.metadata,
        package.unique_identifier.as_deref(),
        package.prefix.as_deref(),
    );
    book.metadata = metadata;

    let context = ReadContext {
        package: &package,
        manifest_hrefs,
        cover_meta: cover,
    };
    read_spine(&context, &mut book);
    codec_for(version).read_navigation(&context, &mut book)?;

    info!(
        "Read EPUB {} '{}': {} resources, {} spine items",
        version,
        book.metadata.title(),
        book.resources.len(),
        book.spine.len()
    );
    Ok(book)
}

/// Strip the package directory from every entry name. Entries outside it
/// cannot be addressed by the manifest and are dropped.
fn package_relative(entries: BTreeMap<String, Vec<u8>>, base: &str) -> HashMap<String, Vec<u8>> {
    let mut files = HashMap::with_capacity(entries.len());
    for (name, data) in entries {
        if name.starts_with("META-INF/") {
            continue;
        }
        match name.strip_prefix(base) {
            Some(relative) if !relative.is_empty() => {
                files.insert(relative.to_string(), data);
            }
            _ => warn!("Skipping {} outside the package directory '{}'", name, base),
        }
    }
    files
}

fn read_manifest(
    package: &PackageDocument,
    mut files: HashMap<String, Vec<u8>>,
    media_types: &MediaTypes,
    book: &mut Book,
) -> HashMap<String, String> {
    if package.manifest.is_empty() {
        warn!("Package document has an empty manifest");
    }

    let mut hrefs = HashMap::with_capacity(package.manifest.len());
    for item in &package.manifest {
        if item.href.is_empty() {
            warn!("Manifest item '{}' has no href", item.id);
            continue;
        }
        if path::is_external(&item.href) {
            debug!("Skipping remote manifest item {}", item.href);
            continue;
        }
        let href = path::normalize(&path::decode(&item.href));
        let Some(data) = files.remove(&href) else {
            warn!("Manifest item '{}' ({}) is missing from the archive", item.id, href);
            continue;
        };

        let media_type = media_types.resolve(&item.media_type, &href);
        let mut resource = Resource::new(item.id.as_str(), href, media_type, data)
            .with_properties(item.properties.iter().cloned());
        resource.fallback = item.fallback.clone();
        resource.media_overlay = item.media_overlay.clone();
        if resource.media_type.is_text()
            && let Some(encoding) = extract_xml_encoding(&resource.data)
            && !matches!(encoding.to_ascii_lowercase().as_str(), "utf-8" | "utf8")
        {
            resource.input_encoding = Some(encoding.to_string());
        }

        let registered = book.resources.add(resource);
        if registered.id() != item.id {
            debug!("Manifest id '{}' registered as '{}'", item.id, registered.id());
        }
        hrefs.insert(item.id.clone(), registered.href().to_string());
    }

    for name in files.keys() {
        debug!("Archive entry {} is not in the manifest", name);
    }
    hrefs
}

fn read_spine(context: &ReadContext<'_>, book: &mut Book) {
    if context.package.spine.is_empty() {
        warn!("Package document has an empty spine");
    }
    let mut references = Vec::with_capacity(context.package.spine.len());
    for itemref in &context.package.spine {
        match context.href_for_id(&itemref.idref) {
            Some(href) => references.push(SpineReference {
                href: href.to_string(),
                linear: itemref.linear,
            }),
            None => warn!("Spine references unknown manifest id '{}'", itemref.idref),
        }
    }
    book.spine.set_references(references);
}

/// `<guide>` references into `book.guide`. Blank or unresolved references
/// are logged and skipped. Types outside the vocabulary are kept as
/// [`GuideType::Other`].
pub(crate) fn read_guide(context: &ReadContext<'_>, book: &mut Book) {
    for item in &context.package.guide {
        if item.href.trim().is_empty() || item.kind.trim().is_empty() {
            warn!("Skipping guide reference with blank type or href");
            continue;
        }
        let Some(semantic) = GuideType::parse_or_other(&item.kind) else {
            continue;
        };
        if let GuideType::Other(name) = &semantic {
            debug!("Keeping guide reference of custom type '{}'", name);
        }
        let Some(resource) = book.resources.get_by_resolved_href("", &item.href) else {
            warn!("Guide reference '{}' points to unresolved href {}", item.kind, item.href);
            continue;
        };
        let decoded = path::decode(&item.href);
        let mut reference = GuideReference::new(semantic, resource.href(), item.title.trim());
        reference.fragment_id = path::split_fragment(&decoded)
            .1
            .filter(|f| !f.is_empty())
            .map(str::to_string);
        book.guide.add_reference(reference);
    }
}

/// The NCX: `spine/@toc`, then common ids, then the first resource with the
/// NCX media type.
pub(crate) fn find_ncx(context: &ReadContext<'_>, book: &Book) -> Option<String> {
    if let Some(id) = &context.package.spine_toc {
        match context.href_for_id(id) {
            Some(href) => return Some(href.to_string()),
            None => warn!("spine/@toc names unknown manifest id '{}'", id),
        }
    }
    for id in COMMON_NCX_IDS {
        if let Some(resource) = book.resources.get_by_id(id)
            && resource.media_type.is_ncx()
        {
            debug!("Using NCX with common id '{}'", id);
            return Some(resource.href().to_string());
        }
    }
    book.resources
        .iter()
        .find(|r| r.media_type.is_ncx())
        .map(|r| r.href().to_string())
}

/// Table of contents from the NCX at `ncx_href`.
pub(crate) fn read_ncx_resource(book: &Book, ncx_href: &str) -> TableOfContents {
    let Some(text) = book.resources.get_by_href(ncx_href).and_then(|r| r.text()) else {
        warn!("NCX {} is not readable", ncx_href);
        return TableOfContents::new();
    };
    read_ncx(&text, ncx_href, &book.resources)
}

/// Settle the cover pointers.
///
/// `declared_image` is the manifest's `cover-image` item (EPUB 3). The
/// legacy `<meta name="cover">` may name the image or the page; the cover
/// guide reference names the page. A page without an image gets its image
/// from the first picture it shows.
pub(crate) fn read_cover(context: &ReadContext<'_>, book: &mut Book, declared_image: Option<String>) {
    let mut image = declared_image;
    let mut page = None;

    if let Some(meta) = &context.cover_meta {
        let target = context
            .href_for_id(meta)
            .map(str::to_string)
            .or_else(|| book.resources.get_by_href(meta).map(|r| r.href().to_string()));
        match target.as_deref().and_then(|href| book.resources.get_by_href(href)) {
            Some(resource) if resource.media_type.is_image() => {
                if image.is_none() {
                    image = Some(resource.href().to_string());
                }
            }
            Some(resource) if resource.media_type.is_xhtml() => {
                page = Some(resource.href().to_string());
            }
            Some(resource) => debug!("Ignoring cover meta pointing at {}", resource.href()),
            None => warn!("Cover meta '{}' matches no resource", meta),
        }
    }

    if let Some(reference) = book.guide.first_by_type(GuideType::Cover)
        && let Some(resource) = book.resources.get_by_href(&reference.href)
    {
        if resource.media_type.is_image() {
            if image.is_none() {
                image = Some(resource.href().to_string());
            }
        } else if page.is_none() {
            page = Some(resource.href().to_string());
        }
    }

    book.set_cover_pointers(image, page);
    if book.cover_image().is_none() && book.cover_page().is_some() {
        book.rescan_cover_page();
    }
}
