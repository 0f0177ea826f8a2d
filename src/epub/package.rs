//! Version-neutral parse of the package document (OPF).
//!
//! One pass over the XML collects the raw metadata elements, manifest,
//! spine and guide. The version codecs interpret them.

use quick_xml::Reader;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};
use crate::util::{local_name, resolve_entity, unescape_xml};

/// Dublin Core elements recognized without a `dc:` prefix.
const DC_ELEMENTS: &[&str] = &[
    "title",
    "creator",
    "contributor",
    "identifier",
    "date",
    "language",
    "publisher",
    "subject",
    "description",
    "rights",
    "type",
    "format",
    "source",
    "relation",
    "coverage",
];

/// A child of `<metadata>`: either a Dublin Core element or a `<meta>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaElement {
    /// Local name (`title`, `creator`, `meta`, ...).
    pub name: String,
    pub is_dc: bool,
    /// Attributes with their qualified names (`opf:role`, `xml:lang`).
    pub attributes: Vec<(String, String)>,
    pub text: String,
}

impl MetaElement {
    /// Attribute by local name, ignoring any namespace prefix.
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.rsplit(':').next() == Some(local))
            .map(|(_, value)| value.as_str())
    }

    /// Attribute by exact qualified name.
    pub fn qualified_attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    /// Raw, possibly percent-encoded href relative to the package document.
    pub href: String,
    pub media_type: String,
    pub properties: Vec<String>,
    pub fallback: Option<String>,
    pub media_overlay: Option<String>,
}

impl ManifestItem {
    pub fn has_property(&self, property: &str) -> bool {
        self.properties.iter().any(|p| p == property)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRef {
    pub idref: String,
    pub linear: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuideItem {
    pub kind: String,
    pub href: String,
    pub title: String,
}

/// Raw content of a package document.
#[derive(Debug, Clone, Default)]
pub struct PackageDocument {
    pub version: Option<String>,
    pub unique_identifier: Option<String>,
    pub prefix: Option<String>,
    pub metadata: Vec<MetaElement>,
    pub manifest: Vec<ManifestItem>,
    /// `spine/@toc`
    pub spine_toc: Option<String>,
    pub spine: Vec<ItemRef>,
    pub guide: Vec<GuideItem>,
}

impl PackageDocument {
    pub fn manifest_item(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.id == id)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Other,
    Metadata,
    Manifest,
    Spine,
    Guide,
}

/// Parse a package document. Malformed XML or a missing `<package>` root
/// is an [`Error::PackageDocument`].
pub fn parse_package(content: &str) -> Result<PackageDocument> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);

    let mut package = PackageDocument::default();
    let mut seen_package = false;
    let mut section = Section::Other;
    let mut current: Option<MetaElement> = None;
    let mut depth_in_current = 0usize;

    loop {
        let event = reader.read_event().map_err(|e| {
            Error::PackageDocument(format!(
                "XML error at byte {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        match event {
            Event::Start(e) => {
                if current.is_some() {
                    // Markup nested inside a metadata value: keep the text only.
                    depth_in_current += 1;
                    continue;
                }
                if open_element(&e, false, &mut package, &mut section, &mut seen_package) {
                    current = start_meta_element(&e);
                    depth_in_current = 0;
                }
            }
            Event::Empty(e) => {
                if current.is_some() {
                    continue;
                }
                if open_element(&e, true, &mut package, &mut section, &mut seen_package)
                    && let Some(element) = start_meta_element(&e)
                {
                    package.metadata.push(element);
                }
            }
            Event::Text(e) => {
                if let Some(element) = current.as_mut() {
                    element.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::CData(e) => {
                if let Some(element) = current.as_mut() {
                    element.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::GeneralRef(e) => {
                if let Some(element) = current.as_mut() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    match resolve_entity(&entity) {
                        Some(resolved) => element.text.push_str(&resolved),
                        None => {
                            element.text.push('&');
                            element.text.push_str(&entity);
                            element.text.push(';');
                        }
                    }
                }
            }
            Event::End(e) => {
                if current.is_some() {
                    if depth_in_current > 0 {
                        depth_in_current -= 1;
                        continue;
                    }
                    if let Some(mut element) = current.take() {
                        element.text = element.text.trim().to_string();
                        package.metadata.push(element);
                    }
                    continue;
                }
                match local_name(e.name().as_ref()) {
                    b"metadata" | b"manifest" | b"spine" | b"guide" => section = Section::Other,
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_package {
        return Err(Error::PackageDocument("no <package> element".to_string()));
    }
    Ok(package)
}

/// Handle an opening tag outside metadata values. Returns `true` when the
/// element is a metadata child that should be captured.
fn open_element(
    e: &BytesStart<'_>,
    empty: bool,
    package: &mut PackageDocument,
    section: &mut Section,
    seen_package: &mut bool,
) -> bool {
    let name = e.name();
    let local = local_name(name.as_ref());

    match local {
        b"package" => {
            *seen_package = true;
            for attr in e.attributes().flatten() {
                match attr.key.as_ref() {
                    b"version" => package.version = Some(attr_value(&attr)),
                    b"unique-identifier" => package.unique_identifier = Some(attr_value(&attr)),
                    b"prefix" => package.prefix = Some(attr_value(&attr)),
                    _ => {}
                }
            }
            return false;
        }
        b"metadata" => {
            if !empty {
                *section = Section::Metadata;
            }
            return false;
        }
        // OEB 1.2 style wrappers inside <metadata>.
        b"dc-metadata" | b"x-metadata" if *section == Section::Metadata => return false,
        b"manifest" => {
            if !empty {
                *section = Section::Manifest;
            }
            return false;
        }
        b"spine" => {
            for attr in e.attributes().flatten() {
                if attr.key.as_ref() == b"toc" {
                    let value = attr_value(&attr);
                    if !value.trim().is_empty() {
                        package.spine_toc = Some(value.trim().to_string());
                    }
                }
            }
            if !empty {
                *section = Section::Spine;
            }
            return false;
        }
        b"guide" => {
            if !empty {
                *section = Section::Guide;
            }
            return false;
        }
        _ => {}
    }

    match (*section, local) {
        (Section::Metadata, _) => true,
        (Section::Manifest, b"item") => {
            package.manifest.push(manifest_item(e));
            false
        }
        (Section::Spine, b"itemref") => {
            let mut idref = String::new();
            let mut linear = true;
            for attr in e.attributes().flatten() {
                match attr.key.as_ref() {
                    b"idref" => idref = attr_value(&attr).trim().to_string(),
                    b"linear" => linear = !attr_value(&attr).trim().eq_ignore_ascii_case("no"),
                    _ => {}
                }
            }
            package.spine.push(ItemRef { idref, linear });
            false
        }
        (Section::Guide, b"reference") => {
            let mut item = GuideItem::default();
            for attr in e.attributes().flatten() {
                match attr.key.as_ref() {
                    b"type" => item.kind = attr_value(&attr).trim().to_string(),
                    b"href" => item.href = attr_value(&attr).trim().to_string(),
                    b"title" => item.title = attr_value(&attr),
                    _ => {}
                }
            }
            package.guide.push(item);
            false
        }
        _ => false,
    }
}

fn manifest_item(e: &BytesStart<'_>) -> ManifestItem {
    let mut item = ManifestItem::default();
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"id" => item.id = attr_value(&attr).trim().to_string(),
            b"href" => item.href = attr_value(&attr).trim().to_string(),
            b"media-type" => item.media_type = attr_value(&attr).trim().to_string(),
            b"properties" => {
                item.properties = attr_value(&attr)
                    .split_ascii_whitespace()
                    .map(str::to_string)
                    .collect()
            }
            b"fallback" => item.fallback = Some(attr_value(&attr).trim().to_string()),
            b"media-overlay" => item.media_overlay = Some(attr_value(&attr).trim().to_string()),
            _ => {}
        }
    }
    item
}

fn start_meta_element(e: &BytesStart<'_>) -> Option<MetaElement> {
    let qualified = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let local = qualified.rsplit(':').next().unwrap_or(&qualified).to_string();
    let prefix = qualified.split_once(':').map(|(p, _)| p.to_ascii_lowercase());

    let is_dc = match prefix.as_deref() {
        Some("dc") => true,
        Some(_) => false,
        None => DC_ELEMENTS.contains(&local.to_ascii_lowercase().as_str()),
    };
    if !is_dc && local != "meta" {
        return None;
    }

    let attributes = e
        .attributes()
        .flatten()
        .map(|attr| {
            (
                String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                attr_value(&attr),
            )
        })
        .collect();

    Some(MetaElement {
        name: if is_dc { local.to_ascii_lowercase() } else { local },
        is_dc,
        attributes,
        text: String::new(),
    })
}

fn attr_value(attr: &Attribute<'_>) -> String {
    let raw = String::from_utf8_lossy(&attr.value);
    unescape_xml(&raw).into_owned()
}
