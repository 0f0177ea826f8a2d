//! Metadata codec: `<metadata>` elements to [`Metadata`] and back.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, warn};

use super::package::MetaElement;
use crate::model::{Author, DateEvent, DcValue, Identifier, MetaProperty, Metadata, Refinement, Version};
use crate::util::escape_xml;

/// Prefixes EPUB 3 reading systems know without a declaration.
const RESERVED_PREFIXES: &[&str] = &[
    "a11y", "dcterms", "marc", "media", "msv", "onix", "prism", "rendition", "schema", "xsd",
];

/// URIs for common non-reserved prefixes, used when a property needs a
/// declaration the source book did not carry.
const KNOWN_VOCABULARIES: &[(&str, &str)] = &[
    ("calibre", "https://calibre-ebook.com"),
    (
        "ibooks",
        "http://vocabulary.itunes.apple.com/rdf/ibooks/vocabulary-extensions-1.0/",
    ),
    ("opf", "http://www.idpf.org/2007/opf"),
];

/// Where a Dublin Core element with an id ended up, for refines lookup.
#[derive(Clone, Copy)]
enum Target {
    Title(usize),
    Creator(usize),
    Contributor(usize),
    Identifier(usize),
    Value(DcList, usize),
}

#[derive(Clone, Copy)]
enum DcList {
    Publishers,
    Subjects,
    Descriptions,
    Rights,
    Types,
    Formats,
    Sources,
    Relations,
    Coverages,
}

impl DcList {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "publisher" => DcList::Publishers,
            "subject" => DcList::Subjects,
            "description" => DcList::Descriptions,
            "rights" => DcList::Rights,
            "type" => DcList::Types,
            "format" => DcList::Formats,
            "source" => DcList::Sources,
            "relation" => DcList::Relations,
            "coverage" => DcList::Coverages,
            _ => return None,
        })
    }

    fn get(self, metadata: &mut Metadata) -> &mut Vec<DcValue> {
        match self {
            DcList::Publishers => &mut metadata.publishers,
            DcList::Subjects => &mut metadata.subjects,
            DcList::Descriptions => &mut metadata.descriptions,
            DcList::Rights => &mut metadata.rights,
            DcList::Types => &mut metadata.types,
            DcList::Formats => &mut metadata.formats,
            DcList::Sources => &mut metadata.sources,
            DcList::Relations => &mut metadata.relations,
            DcList::Coverages => &mut metadata.coverages,
        }
    }
}

/// Result of reading `<metadata>`.
#[derive(Debug, Default)]
pub struct ReadMetadata {
    pub metadata: Metadata,
    /// Content of `<meta name="cover">`: usually a manifest id.
    pub cover: Option<String>,
}

/// Interpret the raw metadata elements.
///
/// EPUB 2 `opf:` attributes and EPUB 3 `refines` metas are both folded into
/// the element they describe. Refines pointing at unknown ids are kept as
/// free-standing [`MetaProperty`] values.
pub fn read_metadata(
    elements: &[MetaElement],
    unique_identifier: Option<&str>,
    prefix: Option<&str>,
) -> ReadMetadata {
    let mut out = ReadMetadata::default();
    let metadata = &mut out.metadata;
    let mut targets: HashMap<String, Target> = HashMap::new();
    let mut refines: Vec<&MetaElement> = Vec::new();

    if let Some(prefix) = prefix {
        metadata.vocabularies = parse_prefixes(prefix);
    }

    for element in elements {
        if !element.is_dc {
            if element.attr("refines").is_some() {
                refines.push(element);
            } else {
                read_meta(element, metadata, &mut out.cover);
            }
            continue;
        }

        let text = element.text.trim();
        if text.is_empty() {
            debug!("Skipping empty dc:{}", element.name);
            continue;
        }
        let id = element
            .attr("id")
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        let lang = element.attr("lang").map(str::to_string);

        let target = match element.name.as_str() {
            "title" => {
                metadata.titles.push(DcValue {
                    id: id.clone(),
                    value: text.to_string(),
                    lang,
                    refinements: Vec::new(),
                });
                Some(Target::Title(metadata.titles.len() - 1))
            }
            "creator" | "contributor" => {
                let author = Author {
                    id: id.clone(),
                    name: text.to_string(),
                    role: element.attr("role").map(str::to_string),
                    file_as: element.attr("file-as").map(str::to_string),
                    refinements: Vec::new(),
                };
                if element.name == "creator" {
                    metadata.creators.push(author);
                    Some(Target::Creator(metadata.creators.len() - 1))
                } else {
                    metadata.contributors.push(author);
                    Some(Target::Contributor(metadata.contributors.len() - 1))
                }
            }
            "identifier" => {
                let bookid = matches!((id.as_deref(), unique_identifier), (Some(a), Some(b)) if a == b);
                metadata.identifiers.push(Identifier {
                    id: id.clone(),
                    scheme: element.attr("scheme").map(str::to_string),
                    value: text.to_string(),
                    bookid,
                });
                Some(Target::Identifier(metadata.identifiers.len() - 1))
            }
            "date" => {
                metadata.dates.push(DateEvent {
                    id: id.clone(),
                    value: text.to_string(),
                    event: element.attr("event").map(str::to_string),
                });
                None
            }
            "language" => {
                metadata.languages.push(text.to_string());
                None
            }
            other => match DcList::from_name(other) {
                Some(list) => {
                    let values = list.get(metadata);
                    values.push(DcValue {
                        id: id.clone(),
                        value: text.to_string(),
                        lang,
                        refinements: Vec::new(),
                    });
                    Some(Target::Value(list, values.len() - 1))
                }
                None => {
                    debug!("Ignoring unknown dc:{}", other);
                    None
                }
            },
        };

        if let (Some(id), Some(target)) = (id, target) {
            targets.insert(id, target);
        }
    }

    for element in refines {
        let target_id = element
            .attr("refines")
            .unwrap_or_default()
            .trim()
            .trim_start_matches('#');
        let property = element.attr("property").unwrap_or_default().trim();
        let refinement = Refinement {
            property: property.to_string(),
            value: element.text.trim().to_string(),
            scheme: element.attr("scheme").map(str::to_string),
        };

        match targets.get(target_id).copied() {
            Some(target) if !property.is_empty() => fold_refinement(metadata, target, refinement),
            _ => {
                debug!("Keeping unmatched refines meta for #{}", target_id);
                metadata.meta.push(MetaProperty {
                    id: element.attr("id").map(str::to_string),
                    name: refinement.property,
                    value: refinement.value,
                    refines: Some(target_id.to_string()),
                    scheme: refinement.scheme,
                    lang: element.attr("lang").map(str::to_string),
                    legacy: false,
                });
            }
        }
    }

    if unique_identifier.is_some() && !metadata.identifiers.iter().any(|i| i.bookid) {
        warn!(
            "unique-identifier {:?} matches no dc:identifier",
            unique_identifier.unwrap_or_default()
        );
    }
    metadata.normalize_book_id();
    out
}

fn read_meta(element: &MetaElement, metadata: &mut Metadata, cover: &mut Option<String>) {
    if let Some(name) = element.attr("name") {
        let content = element.attr("content").unwrap_or_default().trim();
        if name.trim() == "cover" {
            if !content.is_empty() {
                *cover = Some(content.to_string());
            }
            return;
        }
        metadata.meta.push(MetaProperty::new(name.trim(), content));
        return;
    }

    let Some(property) = element.attr("property").map(str::trim) else {
        debug!("Ignoring meta without name or property");
        return;
    };
    if property == "dcterms:modified" {
        metadata.modified = Some(element.text.trim().to_string());
        return;
    }
    let event = match property {
        "dcterms:created" => Some(Some("creation")),
        "dcterms:issued" => Some(Some("publication")),
        "dcterms:date" => Some(None),
        _ => None,
    };
    if let Some(event) = event
        && !element.text.trim().is_empty()
    {
        metadata.dates.push(DateEvent {
            id: element.attr("id").map(str::to_string),
            value: element.text.trim().to_string(),
            event: event.map(str::to_string),
        });
        return;
    }
    metadata.meta.push(MetaProperty {
        id: element.attr("id").map(str::to_string),
        name: property.to_string(),
        value: element.text.trim().to_string(),
        refines: None,
        scheme: element.attr("scheme").map(str::to_string),
        lang: element.attr("lang").map(str::to_string),
        legacy: false,
    });
}

fn fold_refinement(metadata: &mut Metadata, target: Target, refinement: Refinement) {
    match target {
        Target::Creator(i) => metadata.creators[i].refine(refinement),
        Target::Contributor(i) => metadata.contributors[i].refine(refinement),
        Target::Identifier(i) if refinement.property == "identifier-type" => {
            metadata.identifiers[i].scheme = Some(refinement.value);
        }
        Target::Identifier(_) => {
            debug!("Dropping identifier refinement {}", refinement.property);
        }
        Target::Title(i) => metadata.titles[i].refinements.push(refinement),
        Target::Value(list, i) => list.get(metadata)[i].refinements.push(refinement),
    }
}

/// Parse `package/@prefix` (`"p1: uri1 p2: uri2"`).
pub fn parse_prefixes(value: &str) -> std::collections::BTreeMap<String, String> {
    let mut prefixes = std::collections::BTreeMap::new();
    let mut tokens = value.split_whitespace();
    while let Some(token) = tokens.next() {
        let Some(prefix) = token.strip_suffix(':') else {
            continue;
        };
        if let Some(uri) = tokens.next() {
            prefixes.insert(prefix.to_string(), uri.to_string());
        }
    }
    prefixes
}

/// Hands out XML ids that do not clash with anything already in the
/// package document.
///
/// `taken` holds every id a new allocation must avoid, including ids of
/// metadata elements not written yet. `written` holds the ids already
/// present in the output.
pub struct IdAllocator {
    taken: HashSet<String>,
    written: HashSet<String>,
}

impl IdAllocator {
    /// Allocator for a document that already contains the ids `written`
    /// (usually the manifest ids).
    pub fn new<I, S>(written: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let written: HashSet<String> = written.into_iter().map(Into::into).collect();
        Self {
            taken: written.clone(),
            written,
        }
    }

    /// Keep `id` away from future allocations without writing it yet.
    pub fn reserve(&mut self, id: &str) {
        self.taken.insert(id.to_string());
    }

    /// `preferred` if free, else `preferred` with a numeric suffix.
    pub fn allocate(&mut self, preferred: &str) -> String {
        let mut candidate = preferred.to_string();
        let mut n = 1;
        while self.taken.contains(&candidate) {
            candidate = format!("{preferred}{n}");
            n += 1;
        }
        self.taken.insert(candidate.clone());
        self.written.insert(candidate.clone());
        candidate
    }

    /// Keep an existing id, or allocate one when needed. An existing id
    /// that is already in the output is replaced by a fresh one.
    fn ensure(&mut self, existing: Option<&str>, needed: bool, preferred: &str) -> Option<String> {
        match existing {
            Some(id) if self.written.insert(id.to_string()) => {
                self.taken.insert(id.to_string());
                Some(id.to_string())
            }
            Some(id) => {
                debug!("Metadata id {} is used twice, renaming", id);
                Some(self.allocate(preferred))
            }
            None if needed => Some(self.allocate(preferred)),
            None => None,
        }
    }
}

/// Ids carried by metadata elements.
fn metadata_ids(metadata: &Metadata) -> impl Iterator<Item = &str> {
    let values = metadata
        .titles
        .iter()
        .chain(metadata.publishers.iter())
        .chain(metadata.subjects.iter())
        .chain(metadata.descriptions.iter())
        .chain(metadata.rights.iter())
        .chain(metadata.types.iter())
        .chain(metadata.formats.iter())
        .chain(metadata.sources.iter())
        .chain(metadata.relations.iter())
        .chain(metadata.coverages.iter())
        .filter_map(|v| v.id.as_deref());
    let authors = metadata
        .creators
        .iter()
        .chain(metadata.contributors.iter())
        .filter_map(|a| a.id.as_deref());
    let identifiers = metadata.identifiers.iter().filter_map(|i| i.id.as_deref());
    let dates = metadata.dates.iter().filter_map(|d| d.id.as_deref());
    let metas = metadata.meta.iter().filter_map(|m| m.id.as_deref());
    values
        .chain(authors)
        .chain(identifiers)
        .chain(dates)
        .chain(metas)
}

/// Serialized `<metadata>` children plus the id of the canonical identifier.
pub struct WrittenMetadata {
    pub xml: String,
    pub unique_identifier: String,
    /// Value for `package/@prefix`, EPUB 3 only.
    pub prefix: Option<String>,
}

/// Serialize metadata for `version`.
///
/// `cover_id` is the manifest id of the cover image, written as the legacy
/// `<meta name="cover">` in both versions. `modified` is the timestamp
/// written as `dcterms:modified` (EPUB 3).
pub fn write_metadata(
    metadata: &Metadata,
    version: Version,
    cover_id: Option<&str>,
    modified: &str,
    ids: &mut IdAllocator,
) -> WrittenMetadata {
    let mut xml = String::new();
    let epub3 = version == Version::Epub3;
    for id in metadata_ids(metadata) {
        ids.reserve(id);
    }

    // Identifiers first; the canonical one always needs an id.
    let canonical = metadata
        .identifiers
        .iter()
        .position(|i| i.bookid)
        .unwrap_or(0);
    let mut unique_identifier = String::from("BookId");
    for (index, identifier) in metadata.identifiers.iter().enumerate() {
        let is_canonical = index == canonical;
        let needs_id = is_canonical || (epub3 && identifier.scheme.is_some());
        let preferred = if is_canonical { "BookId" } else { "identifier" };
        let id = ids.ensure(identifier.id.as_deref(), needs_id, preferred);
        if is_canonical && let Some(id) = &id {
            unique_identifier = id.clone();
        }

        xml.push_str("    <dc:identifier");
        push_attr(&mut xml, "id", id.as_deref());
        if !epub3 {
            push_attr(&mut xml, "opf:scheme", identifier.scheme.as_deref());
        }
        xml.push_str(&format!(">{}</dc:identifier>\n", escape_xml(&identifier.value)));

        if epub3 && let (Some(id), Some(scheme)) = (&id, &identifier.scheme) {
            push_refines(&mut xml, id, "identifier-type", None, scheme);
        }
    }

    for (index, title) in metadata.titles.iter().enumerate() {
        let preferred = format!("title{}", index + 1);
        write_dc_value(&mut xml, "title", title, epub3, &preferred, ids);
    }

    for (list, name, preferred) in [
        (&metadata.creators, "creator", "creator"),
        (&metadata.contributors, "contributor", "contributor"),
    ] {
        for (index, author) in list.iter().enumerate() {
            write_author(&mut xml, name, author, epub3, &format!("{preferred}{}", index + 1), ids);
        }
    }

    let mut dates = metadata.dates.iter();
    if epub3 {
        // EPUB 3 allows a single dc:date; other events become dcterms metas.
        if let Some(first) = dates.next() {
            let id = ids.ensure(first.id.as_deref(), false, "date");
            xml.push_str("    <dc:date");
            push_attr(&mut xml, "id", id.as_deref());
            xml.push_str(&format!(">{}</dc:date>\n", escape_xml(&first.value)));
        }
        for date in dates {
            let property = match date.event.as_deref().map(str::to_ascii_lowercase).as_deref() {
                Some("creation") | Some("created") => "dcterms:created",
                Some("publication") | Some("issued") => "dcterms:issued",
                Some("modification") | Some("modified") => continue,
                _ => "dcterms:date",
            };
            let id = ids.ensure(date.id.as_deref(), false, "date");
            xml.push_str("    <meta");
            push_attr(&mut xml, "id", id.as_deref());
            xml.push_str(&format!(
                " property=\"{}\">{}</meta>\n",
                property,
                escape_xml(&date.value)
            ));
        }
    } else {
        for date in dates {
            let id = ids.ensure(date.id.as_deref(), false, "date");
            xml.push_str("    <dc:date");
            push_attr(&mut xml, "id", id.as_deref());
            push_attr(&mut xml, "opf:event", date.event.as_deref());
            xml.push_str(&format!(">{}</dc:date>\n", escape_xml(&date.value)));
        }
    }

    for language in &metadata.languages {
        xml.push_str(&format!("    <dc:language>{}</dc:language>\n", escape_xml(language)));
    }

    for (values, name) in [
        (&metadata.publishers, "publisher"),
        (&metadata.subjects, "subject"),
        (&metadata.descriptions, "description"),
        (&metadata.rights, "rights"),
        (&metadata.types, "type"),
        (&metadata.formats, "format"),
        (&metadata.sources, "source"),
        (&metadata.relations, "relation"),
        (&metadata.coverages, "coverage"),
    ] {
        for (index, value) in values.iter().enumerate() {
            write_dc_value(&mut xml, name, value, epub3, &format!("{name}{}", index + 1), ids);
        }
    }

    if epub3 {
        xml.push_str(&format!(
            "    <meta property=\"dcterms:modified\">{}</meta>\n",
            escape_xml(modified)
        ));
    }
    if let Some(cover_id) = cover_id {
        xml.push_str(&format!(
            "    <meta name=\"cover\" content=\"{}\"/>\n",
            escape_xml(cover_id)
        ));
    }

    for meta in &metadata.meta {
        if meta.name.trim().is_empty() {
            continue;
        }
        if meta.legacy || !epub3 {
            if meta.refines.is_some() {
                // No EPUB 2 form for a refinement of an unknown element.
                continue;
            }
            xml.push_str(&format!(
                "    <meta name=\"{}\" content=\"{}\"/>\n",
                escape_xml(&meta.name),
                escape_xml(&meta.value)
            ));
            continue;
        }
        xml.push_str("    <meta");
        push_attr(&mut xml, "id", meta.id.as_deref());
        let refines = meta.refines.as_ref().map(|r| format!("#{r}"));
        push_attr(&mut xml, "refines", refines.as_deref());
        push_attr(&mut xml, "property", Some(&meta.name));
        push_attr(&mut xml, "scheme", meta.scheme.as_deref());
        push_attr(&mut xml, "xml:lang", meta.lang.as_deref());
        xml.push_str(&format!(">{}</meta>\n", escape_xml(&meta.value)));
    }

    let prefix = epub3.then(|| prefix_attribute(metadata)).flatten();
    WrittenMetadata {
        xml,
        unique_identifier,
        prefix,
    }
}

fn write_author(
    xml: &mut String,
    element: &str,
    author: &Author,
    epub3: bool,
    preferred: &str,
    ids: &mut IdAllocator,
) {
    let refined = author.role.is_some() || author.file_as.is_some() || !author.refinements.is_empty();
    let id = ids.ensure(author.id.as_deref(), epub3 && refined, preferred);

    xml.push_str(&format!("    <dc:{element}"));
    push_attr(xml, "id", id.as_deref());
    if !epub3 {
        push_attr(xml, "opf:role", author.role.as_deref());
        push_attr(xml, "opf:file-as", author.file_as.as_deref());
    }
    xml.push_str(&format!(">{}</dc:{element}>\n", escape_xml(&author.name)));

    if let (true, Some(id)) = (epub3, id) {
        if let Some(role) = &author.role {
            push_refines(xml, &id, "role", Some("marc:relators"), role);
        }
        if let Some(file_as) = &author.file_as {
            push_refines(xml, &id, "file-as", None, file_as);
        }
        for refinement in &author.refinements {
            push_refines(xml, &id, &refinement.property, refinement.scheme.as_deref(), &refinement.value);
        }
    }
}

fn write_dc_value(
    xml: &mut String,
    element: &str,
    value: &DcValue,
    epub3: bool,
    preferred: &str,
    ids: &mut IdAllocator,
) {
    let id = ids.ensure(
        value.id.as_deref(),
        epub3 && !value.refinements.is_empty(),
        preferred,
    );
    xml.push_str(&format!("    <dc:{element}"));
    push_attr(xml, "id", id.as_deref());
    push_attr(xml, "xml:lang", value.lang.as_deref());
    xml.push_str(&format!(">{}</dc:{element}>\n", escape_xml(&value.value)));

    if let (true, Some(id)) = (epub3, id) {
        for refinement in &value.refinements {
            push_refines(xml, &id, &refinement.property, refinement.scheme.as_deref(), &refinement.value);
        }
    }
}

fn push_attr(xml: &mut String, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        xml.push_str(&format!(" {}=\"{}\"", name, escape_xml(value)));
    }
}

fn push_refines(xml: &mut String, id: &str, property: &str, scheme: Option<&str>, value: &str) {
    xml.push_str(&format!(
        "    <meta refines=\"#{}\" property=\"{}\"",
        escape_xml(id),
        escape_xml(property)
    ));
    push_attr(xml, "scheme", scheme);
    xml.push_str(&format!(">{}</meta>\n", escape_xml(value)));
}

/// Declarations for every non-reserved prefix in use, preferring the URIs
/// the book declared itself.
fn prefix_attribute(metadata: &Metadata) -> Option<String> {
    let mut names: Vec<&str> = metadata
        .meta
        .iter()
        .filter(|m| !m.legacy)
        .map(|m| m.name.as_str())
        .collect();
    let refinements = metadata
        .titles
        .iter()
        .chain(metadata.publishers.iter())
        .chain(metadata.subjects.iter())
        .flat_map(|v| v.refinements.iter())
        .chain(
            metadata
                .creators
                .iter()
                .chain(metadata.contributors.iter())
                .flat_map(|a| a.refinements.iter()),
        );
    names.extend(refinements.map(|r| r.property.as_str()));
    let used: BTreeSet<&str> = names
        .iter()
        .filter_map(|name| name.split_once(':').map(|(prefix, _)| prefix))
        .collect();

    let mut declarations: Vec<String> = Vec::new();
    for (prefix, uri) in &metadata.vocabularies {
        if !RESERVED_PREFIXES.contains(&prefix.as_str()) {
            declarations.push(format!("{prefix}: {uri}"));
        }
    }
    for prefix in used {
        if RESERVED_PREFIXES.contains(&prefix) || metadata.vocabularies.contains_key(prefix) {
            continue;
        }
        match KNOWN_VOCABULARIES.iter().find(|(p, _)| *p == prefix) {
            Some((p, uri)) => declarations.push(format!("{p}: {uri}")),
            None => warn!("No vocabulary URI known for prefix '{}'", prefix),
        }
    }

    (!declarations.is_empty()).then(|| declarations.join(" "))
}
