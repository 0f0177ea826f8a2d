use super::resource::Resource;
use super::resources::Resources;
use crate::path;

/// An item in the reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineReference {
    /// Href of the referenced resource.
    pub href: String,
    /// `false` for auxiliary content (`linear="no"`).
    pub linear: bool,
}

impl SpineReference {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            linear: true,
        }
    }

    pub fn non_linear(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            linear: false,
        }
    }
}

/// The linear reading order plus the legacy NCX pointer.
///
/// The spine does not check for duplicates; [`Book`](super::Book) does that
/// before inserting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Spine {
    references: Vec<SpineReference>,
    /// Href of the NCX resource (`spine/@toc`).
    pub toc_resource: Option<String>,
}

impl Spine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn references(&self) -> &[SpineReference] {
        &self.references
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpineReference> {
        self.references.iter()
    }

    /// Insert at `index` (clamped) or append. Returns the position used.
    pub fn add_reference(&mut self, reference: SpineReference, index: Option<usize>) -> usize {
        match index {
            Some(i) if i < self.references.len() => {
                self.references.insert(i, reference);
                i
            }
            _ => {
                self.references.push(reference);
                self.references.len() - 1
            }
        }
    }

    /// First spine resource with the given manifest id.
    pub fn find_first_resource_by_id<'a>(
        &self,
        id: &str,
        resources: &'a Resources,
    ) -> Option<&'a Resource> {
        self.references
            .iter()
            .filter_map(|r| resources.get_by_href(&r.href))
            .find(|r| r.id() == id)
    }

    /// Position of the first reference to `href` (fragment ignored).
    pub fn resource_index_of(&self, href: &str) -> Option<usize> {
        let href = path::strip_fragment(href);
        self.references
            .iter()
            .position(|r| path::strip_fragment(&r.href) == href)
    }

    pub fn contains(&self, href: &str) -> bool {
        self.resource_index_of(href).is_some()
    }

    /// Move the reference to `href` so it sits right before `before_href`.
    /// Returns `false` when either is not in the spine.
    pub fn move_before(&mut self, href: &str, before_href: &str) -> bool {
        let Some(from) = self.resource_index_of(href) else {
            return false;
        };
        let Some(target) = self.resource_index_of(before_href) else {
            return false;
        };
        if from == target {
            return true;
        }
        let reference = self.references.remove(from);
        let to = self.resource_index_of(before_href).unwrap_or(self.references.len());
        self.references.insert(to, reference);
        true
    }

    /// Remove every reference to `href`. Returns how many were removed.
    pub fn remove(&mut self, href: &str) -> usize {
        let href = path::strip_fragment(href).to_string();
        let before = self.references.len();
        self.references
            .retain(|r| path::strip_fragment(&r.href) != href);
        before - self.references.len()
    }

    pub fn retain<F>(&mut self, f: F)
    where
        F: FnMut(&SpineReference) -> bool,
    {
        self.references.retain(f);
    }

    pub(crate) fn set_references(&mut self, references: Vec<SpineReference>) {
        self.references = references;
    }

    /// Point every reference to `old_href` at `new_href`.
    pub(crate) fn rename(&mut self, old_href: &str, new_href: &str) {
        for reference in &mut self.references {
            if reference.href == old_href {
                reference.href = new_href.to_string();
            }
        }
        if self.toc_resource.as_deref() == Some(old_href) {
            self.toc_resource = Some(new_href.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media_type::MediaType;

    fn spine_of(hrefs: &[&str]) -> Spine {
        let mut spine = Spine::new();
        for href in hrefs {
            spine.add_reference(SpineReference::new(*href), None);
        }
        spine
    }

    fn hrefs(spine: &Spine) -> Vec<&str> {
        spine.iter().map(|r| r.href.as_str()).collect()
    }

    #[test]
    fn test_add_reference_at_index() {
        let mut spine = spine_of(&["a", "b"]);
        assert_eq!(spine.add_reference(SpineReference::new("c"), Some(0)), 0);
        assert_eq!(spine.add_reference(SpineReference::new("d"), Some(99)), 3);
        assert_eq!(hrefs(&spine), vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn test_resource_index_of_ignores_fragment() {
        let spine = spine_of(&["a.xhtml", "b.xhtml"]);
        assert_eq!(spine.resource_index_of("b.xhtml#x"), Some(1));
        assert_eq!(spine.resource_index_of("c.xhtml"), None);
    }

    #[test]
    fn test_move_before() {
        let mut spine = spine_of(&["a", "b", "c"]);
        assert!(spine.move_before("c", "a"));
        assert_eq!(hrefs(&spine), vec!["c", "a", "b"]);
        assert!(spine.move_before("c", "b"));
        assert_eq!(hrefs(&spine), vec!["a", "c", "b"]);
        assert!(!spine.move_before("z", "a"));
        assert!(!spine.move_before("a", "z"));
    }

    #[test]
    fn test_move_before_itself_keeps_order() {
        let mut spine = spine_of(&["c1", "c2", "c3"]);
        assert!(spine.move_before("c1", "c1"));
        assert_eq!(hrefs(&spine), vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn test_find_first_resource_by_id() {
        let mut resources = Resources::new();
        resources.add(Resource::new("one", "1.xhtml", MediaType::XHTML, Vec::new()));
        resources.add(Resource::new("two", "2.xhtml", MediaType::XHTML, Vec::new()));
        let spine = spine_of(&["2.xhtml"]);
        assert_eq!(
            spine.find_first_resource_by_id("two", &resources).map(Resource::href),
            Some("2.xhtml")
        );
        assert!(spine.find_first_resource_by_id("one", &resources).is_none());
    }

    #[test]
    fn test_remove_and_rename() {
        let mut spine = spine_of(&["a", "b", "a"]);
        spine.toc_resource = Some("toc.ncx".into());
        assert_eq!(spine.remove("a"), 2);
        spine.rename("b", "B");
        spine.rename("toc.ncx", "nav/toc.ncx");
        assert_eq!(hrefs(&spine), vec!["B"]);
        assert_eq!(spine.toc_resource.as_deref(), Some("nav/toc.ncx"));
    }
}
