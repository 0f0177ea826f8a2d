use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use super::links::{LinkSyntax, rewrite_references};
use super::resource::Resource;
use crate::error::{Error, Result};
use crate::media_type::{MediaCategory, MediaType};
use crate::path;

const ITEM_PREFIX: &str = "item_";
const IMAGE_PREFIX: &str = "image_";

/// The set of resources of a book, keyed by href.
///
/// Invariants: hrefs are unique, ids are unique, and every registered
/// resource has a valid id and href. [`Resources::add`] repairs missing or
/// invalid values instead of rejecting the resource.
#[derive(Debug, Clone, Default)]
pub struct Resources {
    by_href: BTreeMap<String, Resource>,
    /// id -> href
    ids: HashMap<String, String>,
    /// Next candidate for generated ids, per prefix.
    id_counters: HashMap<&'static str, usize>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_href.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_href.is_empty()
    }

    /// Register a resource, assigning a unique href and id when missing.
    ///
    /// A resource whose href is already taken replaces the previous one.
    pub fn add(&mut self, mut resource: Resource) -> &Resource {
        self.fix_href(&mut resource);
        if let Some(previous) = self.by_href.remove(&resource.href) {
            debug!("Replacing resource {} ({})", previous.href, previous.id);
            self.ids.remove(&previous.id);
        }
        self.fix_id(&mut resource);

        self.ids.insert(resource.id.clone(), resource.href.clone());
        let href = resource.href.clone();
        self.by_href.entry(href).or_insert(resource)
    }

    /// Remove by href (a fragment suffix is ignored).
    pub fn remove(&mut self, href: &str) -> Option<Resource> {
        let removed = self.by_href.remove(path::strip_fragment(href))?;
        self.ids.remove(&removed.id);
        Some(removed)
    }

    pub fn get_by_href(&self, href: &str) -> Option<&Resource> {
        self.by_href.get(path::strip_fragment(href))
    }

    pub fn get_by_href_mut(&mut self, href: &str) -> Option<&mut Resource> {
        self.by_href.get_mut(path::strip_fragment(href))
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Resource> {
        self.ids.get(id).and_then(|href| self.by_href.get(href))
    }

    pub fn get_by_id_mut(&mut self, id: &str) -> Option<&mut Resource> {
        let href = self.ids.get(id)?;
        self.by_href.get_mut(href)
    }

    /// Look up by id first, then by href.
    pub fn get_by_id_or_href(&self, id_or_href: &str) -> Option<&Resource> {
        self.get_by_id(id_or_href)
            .or_else(|| self.get_by_href(id_or_href))
    }

    /// Resolve a reference found inside the resource at `base_href` and
    /// return the resource it points to.
    pub fn get_by_resolved_href(&self, base_href: &str, relative: &str) -> Option<&Resource> {
        if path::is_external(relative) {
            return None;
        }
        let resolved = path::resolve(base_href, &path::decode(relative));
        self.by_href.get(&resolved)
    }

    pub fn contains_href(&self, href: &str) -> bool {
        self.by_href.contains_key(path::strip_fragment(href))
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    /// All resources, ordered by href.
    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.by_href.values()
    }

    /// Mutable access to every resource. Ids and hrefs stay read-only.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Resource> {
        self.by_href.values_mut()
    }

    pub fn hrefs(&self) -> impl Iterator<Item = &str> {
        self.by_href.keys().map(String::as_str)
    }

    pub fn by_media_type<'a>(&'a self, media_type: &'a MediaType) -> impl Iterator<Item = &'a Resource> {
        self.by_href.values().filter(move |r| &r.media_type == media_type)
    }

    pub fn by_media_types<'a>(
        &'a self,
        media_types: &'a [MediaType],
    ) -> impl Iterator<Item = &'a Resource> {
        self.by_href
            .values()
            .filter(move |r| media_types.contains(&r.media_type))
    }

    pub fn by_category(&self, category: MediaCategory) -> impl Iterator<Item = &Resource> {
        self.by_href
            .values()
            .filter(move |r| r.media_type.category() == category)
    }

    /// First resource carrying the given manifest property.
    pub fn by_property(&self, property: &str) -> Option<&Resource> {
        self.by_href.values().find(|r| r.has_property(property))
    }

    /// Change the id of a registered resource.
    pub fn set_id(&mut self, href: &str, new_id: &str) -> Result<()> {
        if !is_valid_id(new_id) {
            return Err(Error::InvalidId(new_id.to_string()));
        }
        match self.ids.get(new_id) {
            Some(owner) if owner == path::strip_fragment(href) => return Ok(()),
            Some(_) => return Err(Error::DuplicateId(new_id.to_string())),
            None => {}
        }
        let resource = self
            .by_href
            .get_mut(path::strip_fragment(href))
            .ok_or_else(|| Error::ResourceNotFound(href.to_string()))?;
        self.ids.remove(&resource.id);
        resource.id = new_id.to_string();
        self.ids.insert(resource.id.clone(), resource.href.clone());
        Ok(())
    }

    /// Move a resource to a new href and re-point every reference to it
    /// inside the markup and stylesheet resources, the moved one included.
    /// References made by the moved resource are rebased when its directory
    /// changes.
    pub fn rename(&mut self, old_href: &str, new_href: &str) -> Result<()> {
        let old_href = path::strip_fragment(old_href).to_string();
        let new_href = path::normalize(new_href);
        if !path::is_valid(&new_href) {
            return Err(Error::InvalidHref(new_href));
        }
        if old_href == new_href {
            return Ok(());
        }
        if self.by_href.contains_key(&new_href) {
            return Err(Error::DuplicateHref(new_href));
        }
        let mut resource = self
            .by_href
            .remove(&old_href)
            .ok_or_else(|| Error::ResourceNotFound(old_href.clone()))?;

        let moved_dir = path::parent_dir(&old_href) != path::parent_dir(&new_href);
        if let Some(syntax) = link_syntax(&resource.media_type) {
            let rebased = resource.text().and_then(|text| {
                rewrite_references(&text, syntax, &old_href, &new_href, |target| {
                    if target == old_href {
                        Some(new_href.clone())
                    } else {
                        moved_dir.then(|| target.to_string())
                    }
                })
            });
            if let Some(text) = rebased {
                resource.set_text(text);
            }
        }

        resource.href = new_href.clone();
        self.ids.insert(resource.id.clone(), new_href.clone());
        self.by_href.insert(new_href.clone(), resource);

        for other in self.by_href.values_mut() {
            if other.href == new_href {
                continue;
            }
            let Some(syntax) = link_syntax(&other.media_type) else {
                continue;
            };
            let rewritten = other.text().and_then(|text| {
                rewrite_references(&text, syntax, &other.href, &other.href, |target| {
                    (target == old_href).then(|| new_href.clone())
                })
            });
            if let Some(text) = rewritten {
                debug!("Updated references to {} in {}", old_href, other.href);
                other.set_text(text);
            }
        }

        Ok(())
    }

    fn fix_href(&mut self, resource: &mut Resource) {
        let normalized = path::normalize(path::strip_fragment(resource.href.trim()));
        if !normalized.is_empty() {
            resource.href = normalized;
            return;
        }

        let prefix = item_prefix(&resource.media_type);
        let extension = resource.media_type.default_extension();
        let mut n = 1;
        loop {
            let stem = format!("{prefix}{n}");
            if !self.has_stem(&stem) {
                resource.href = format!("{stem}{extension}");
                return;
            }
            n += 1;
        }
    }

    /// Whether some href is `stem` with or without an extension.
    fn has_stem(&self, stem: &str) -> bool {
        self.by_href.keys().any(|href| {
            href.strip_prefix(stem)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
        })
    }

    fn fix_id(&mut self, resource: &mut Resource) {
        let given = resource.id.trim();
        let source = if is_valid_id(given) {
            given
        } else {
            path::file_stem(&resource.href)
        };

        let mut id = sanitize_id(source);
        if let Some(first) = id.chars().next()
            && !is_id_start(first)
        {
            id = format!("{}{}", item_prefix(&resource.media_type), id);
        }

        if id.is_empty() || self.ids.contains_key(&id) {
            id = self.unique_id(item_prefix(&resource.media_type));
        }
        resource.id = id;
    }

    fn unique_id(&mut self, prefix: &'static str) -> String {
        let counter = self.id_counters.entry(prefix).or_insert(1);
        loop {
            let candidate = format!("{prefix}{counter}");
            if !self.ids.contains_key(&candidate) {
                return candidate;
            }
            *counter += 1;
        }
    }
}

fn item_prefix(media_type: &MediaType) -> &'static str {
    if media_type.is_bitmap_image() {
        IMAGE_PREFIX
    } else {
        ITEM_PREFIX
    }
}

fn link_syntax(media_type: &MediaType) -> Option<LinkSyntax> {
    match media_type.category() {
        MediaCategory::Xhtml
        | MediaCategory::Html
        | MediaCategory::Svg
        | MediaCategory::Ncx
        | MediaCategory::Smil => Some(LinkSyntax::Markup),
        MediaCategory::Css => Some(LinkSyntax::Css),
        _ => None,
    }
}

fn is_id_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_id_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// Whether `id` is usable as an XML id (NCName without colons).
pub fn is_valid_id(id: &str) -> bool {
    let mut chars = id.chars();
    chars.next().is_some_and(is_id_start) && chars.all(is_id_char)
}

fn sanitize_id(raw: &str) -> String {
    raw.chars()
        .map(|c| if is_id_char(c) { c } else { '_' })
        .collect()
}
