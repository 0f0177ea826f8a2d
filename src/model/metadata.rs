//! Version-agnostic book metadata.
//!
//! Dublin Core elements are stored once; the EPUB 2 and EPUB 3 codecs
//! translate refinements to `opf:` attributes or `refines` metas.

use std::collections::BTreeMap;

/// An auxiliary property attached to one metadata element.
///
/// EPUB 3 writes these as `<meta refines="#id" property="...">`; EPUB 2 keeps
/// the ones it has attributes for (`role`, `file-as`, `identifier-type`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refinement {
    pub property: String,
    pub value: String,
    pub scheme: Option<String>,
}

impl Refinement {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
            scheme: None,
        }
    }
}

/// A plain Dublin Core value (title, publisher, subject, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DcValue {
    pub id: Option<String>,
    pub value: String,
    pub lang: Option<String>,
    pub refinements: Vec<Refinement>,
}

impl DcValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn refinement(&self, property: &str) -> Option<&str> {
        self.refinements
            .iter()
            .find(|r| r.property == property)
            .map(|r| r.value.as_str())
    }
}

impl From<&str> for DcValue {
    fn from(value: &str) -> Self {
        DcValue::new(value)
    }
}

impl From<String> for DcValue {
    fn from(value: String) -> Self {
        DcValue::new(value)
    }
}

/// A creator or contributor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Author {
    pub id: Option<String>,
    pub name: String,
    /// MARC relator code (`aut`, `edt`, `ill`, ...).
    pub role: Option<String>,
    pub file_as: Option<String>,
    /// Refinements other than role and file-as.
    pub refinements: Vec<Refinement>,
}

impl Author {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_file_as(mut self, file_as: impl Into<String>) -> Self {
        self.file_as = Some(file_as.into());
        self
    }

    /// Fold a refinement into the typed fields when it is one of them.
    pub fn refine(&mut self, refinement: Refinement) {
        match refinement.property.as_str() {
            "role" => self.role = Some(refinement.value),
            "file-as" => self.file_as = Some(refinement.value),
            _ => self.refinements.push(refinement),
        }
    }
}

/// A `dc:identifier`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identifier {
    pub id: Option<String>,
    /// `ISBN`, `UUID`, `URI`, ... (`opf:scheme` or `identifier-type`).
    pub scheme: Option<String>,
    pub value: String,
    /// Marks the identifier referenced by `package/@unique-identifier`.
    pub bookid: bool,
}

impl Identifier {
    pub fn new(scheme: Option<&str>, value: impl Into<String>) -> Self {
        Self {
            id: None,
            scheme: scheme.map(str::to_string),
            value: value.into(),
            bookid: false,
        }
    }

    /// A fresh random `urn:uuid:` identifier.
    pub fn random_uuid() -> Self {
        Self::new(Some("UUID"), format!("urn:uuid:{}", uuid::Uuid::new_v4()))
    }

    pub fn is_uuid(&self) -> bool {
        self.scheme
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("uuid"))
            || self.value.starts_with("urn:uuid:")
    }
}

/// A `dc:date` with its optional EPUB 2 event (`publication`, `creation`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateEvent {
    pub id: Option<String>,
    pub value: String,
    pub event: Option<String>,
}

impl DateEvent {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }
}

/// A `<meta>` element that is not folded into a Dublin Core element:
/// EPUB 2 `name`/`content` pairs, EPUB 3 properties and refines whose
/// target is unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaProperty {
    pub id: Option<String>,
    /// EPUB 3 `property` or EPUB 2 `name`.
    pub name: String,
    pub value: String,
    /// Target id without the leading `#`.
    pub refines: Option<String>,
    pub scheme: Option<String>,
    pub lang: Option<String>,
    /// Written as `<meta name=".." content=".."/>` rather than as an
    /// EPUB 3 property.
    pub legacy: bool,
}

impl MetaProperty {
    /// A `name`/`content` meta, understood by every reading system.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            legacy: true,
            ..Default::default()
        }
    }

    /// An EPUB 3 `<meta property="..">value</meta>`.
    pub fn property(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }
}

/// Book metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub titles: Vec<DcValue>,
    pub creators: Vec<Author>,
    pub contributors: Vec<Author>,
    pub identifiers: Vec<Identifier>,
    pub dates: Vec<DateEvent>,
    pub languages: Vec<String>,
    pub publishers: Vec<DcValue>,
    pub subjects: Vec<DcValue>,
    pub descriptions: Vec<DcValue>,
    pub rights: Vec<DcValue>,
    pub types: Vec<DcValue>,
    pub formats: Vec<DcValue>,
    pub sources: Vec<DcValue>,
    pub relations: Vec<DcValue>,
    pub coverages: Vec<DcValue>,
    /// `dcterms:modified`, refreshed on every EPUB 3 write.
    pub modified: Option<String>,
    pub meta: Vec<MetaProperty>,
    /// Vocabulary prefixes declared by `package/@prefix` (prefix -> URI).
    pub vocabularies: BTreeMap<String, String>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// The main title, or an empty string.
    pub fn title(&self) -> &str {
        self.titles.first().map(|t| t.value.as_str()).unwrap_or("")
    }

    pub fn add_title(&mut self, title: impl Into<String>) {
        self.titles.push(DcValue::new(title));
    }

    pub fn add_creator(&mut self, author: Author) {
        self.creators.push(author);
    }

    pub fn language(&self) -> Option<&str> {
        self.languages.first().map(String::as_str)
    }

    pub fn add_identifier(&mut self, identifier: Identifier) {
        self.identifiers.push(identifier);
        self.normalize_book_id();
    }

    /// The canonical identifier: the one flagged `bookid`, else the first.
    pub fn book_id(&self) -> Option<&Identifier> {
        self.identifiers
            .iter()
            .find(|i| i.bookid)
            .or_else(|| self.identifiers.first())
    }

    /// Flag the identifier at `index` as canonical and clear the others.
    /// Returns `false` for an out-of-range index.
    pub fn set_book_id(&mut self, index: usize) -> bool {
        if index >= self.identifiers.len() {
            return false;
        }
        for (i, identifier) in self.identifiers.iter_mut().enumerate() {
            identifier.bookid = i == index;
        }
        true
    }

    /// Make sure exactly one identifier is canonical when any exist.
    pub fn normalize_book_id(&mut self) {
        let index = self.identifiers.iter().position(|i| i.bookid).unwrap_or(0);
        self.set_book_id(index);
    }

    /// First free-standing meta with the given name/property.
    pub fn meta_value(&self, name: &str) -> Option<&str> {
        self.meta
            .iter()
            .find(|m| m.name == name && m.refines.is_none())
            .map(|m| m.value.as_str())
    }

    /// Replace every free-standing meta called `name` with one value.
    pub fn set_meta(&mut self, name: &str, value: impl Into<String>) {
        self.meta.retain(|m| !(m.name == name && m.refines.is_none()));
        self.meta.push(MetaProperty::new(name, value));
    }

    pub fn remove_meta(&mut self, name: &str) {
        self.meta.retain(|m| m.name != name);
    }
}
