use std::fmt;

/// Semantic role of a guide reference (EPUB 2) or landmark (EPUB 3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GuideType {
    Cover,
    TitlePage,
    Toc,
    Index,
    Glossary,
    Acknowledgements,
    Bibliography,
    Colophon,
    CopyrightPage,
    Dedication,
    Epigraph,
    Foreword,
    ListOfIllustrations,
    ListOfTables,
    Notes,
    Preface,
    /// Start of the main body (`text` in EPUB 2, `bodymatter` in EPUB 3).
    Text,
    /// A type outside the vocabulary, kept with its `other.` prefix.
    Other(String),
}

impl GuideType {
    pub const ALL: [GuideType; 17] = [
        GuideType::Cover,
        GuideType::TitlePage,
        GuideType::Toc,
        GuideType::Index,
        GuideType::Glossary,
        GuideType::Acknowledgements,
        GuideType::Bibliography,
        GuideType::Colophon,
        GuideType::CopyrightPage,
        GuideType::Dedication,
        GuideType::Epigraph,
        GuideType::Foreword,
        GuideType::ListOfIllustrations,
        GuideType::ListOfTables,
        GuideType::Notes,
        GuideType::Preface,
        GuideType::Text,
    ];

    /// Value of `guide/reference/@type`.
    pub fn epub2_name(&self) -> &str {
        match self {
            GuideType::Cover => "cover",
            GuideType::TitlePage => "title-page",
            GuideType::Toc => "toc",
            GuideType::Index => "index",
            GuideType::Glossary => "glossary",
            GuideType::Acknowledgements => "acknowledgements",
            GuideType::Bibliography => "bibliography",
            GuideType::Colophon => "colophon",
            GuideType::CopyrightPage => "copyright-page",
            GuideType::Dedication => "dedication",
            GuideType::Epigraph => "epigraph",
            GuideType::Foreword => "foreword",
            GuideType::ListOfIllustrations => "loi",
            GuideType::ListOfTables => "lot",
            GuideType::Notes => "notes",
            GuideType::Preface => "preface",
            GuideType::Text => "text",
            GuideType::Other(name) => name.as_str(),
        }
    }

    /// Value of `epub:type` in the landmarks nav.
    pub fn epub3_name(&self) -> &str {
        match self {
            GuideType::Other(name) => name.strip_prefix("other.").unwrap_or(name.as_str()),
            GuideType::TitlePage => "titlepage",
            GuideType::Acknowledgements => "acknowledgments",
            GuideType::Notes => "endnotes",
            GuideType::Text => "bodymatter",
            other => other.epub2_name(),
        }
    }

    /// Parse either vocabulary, case-insensitively. Unknown values give `None`.
    pub fn parse(value: &str) -> Option<GuideType> {
        let value = value.trim().to_ascii_lowercase();
        let value = value.strip_prefix("other.").unwrap_or(&value);
        match value {
            "titlepage" | "title-page" => Some(GuideType::TitlePage),
            "acknowledgments" | "acknowledgements" => Some(GuideType::Acknowledgements),
            "notes" | "endnotes" | "footnotes" | "rearnotes" => Some(GuideType::Notes),
            "text" | "bodymatter" | "start" => Some(GuideType::Text),
            "copyright" => Some(GuideType::CopyrightPage),
            other => GuideType::ALL
                .into_iter()
                .find(|t| t.epub2_name() == other || t.epub3_name() == other),
        }
    }

    /// Like [`GuideType::parse`], but keeps an unknown non-blank value as
    /// [`GuideType::Other`].
    pub fn parse_or_other(value: &str) -> Option<GuideType> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        GuideType::parse(trimmed).or_else(|| {
            let name = trimmed.to_ascii_lowercase();
            Some(GuideType::Other(if name.starts_with("other.") {
                name
            } else {
                format!("other.{name}")
            }))
        })
    }

    /// Default title used when a reference carries none.
    pub fn default_title(&self) -> &str {
        match self {
            GuideType::Cover => "Cover",
            GuideType::TitlePage => "Title Page",
            GuideType::Toc => "Table of Contents",
            GuideType::Index => "Index",
            GuideType::Glossary => "Glossary",
            GuideType::Acknowledgements => "Acknowledgements",
            GuideType::Bibliography => "Bibliography",
            GuideType::Colophon => "Colophon",
            GuideType::CopyrightPage => "Copyright",
            GuideType::Dedication => "Dedication",
            GuideType::Epigraph => "Epigraph",
            GuideType::Foreword => "Foreword",
            GuideType::ListOfIllustrations => "List of Illustrations",
            GuideType::ListOfTables => "List of Tables",
            GuideType::Notes => "Notes",
            GuideType::Preface => "Preface",
            GuideType::Text => "Begin Reading",
            GuideType::Other(_) => self.epub3_name(),
        }
    }
}

impl fmt::Display for GuideType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.epub2_name())
    }
}

/// A semantically typed pointer into the book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideReference {
    pub href: String,
    pub semantic: GuideType,
    pub title: String,
    pub fragment_id: Option<String>,
}

impl GuideReference {
    /// Reference to `href`, which may carry a `#fragment`. An empty title is
    /// replaced by the type's default title.
    pub fn new(semantic: GuideType, href: &str, title: impl Into<String>) -> Self {
        let (path, fragment) = crate::path::split_fragment(href);
        let title = title.into();
        let title = if title.trim().is_empty() {
            semantic.default_title().to_string()
        } else {
            title
        };
        Self {
            href: path.to_string(),
            semantic,
            title,
            fragment_id: fragment.filter(|f| !f.is_empty()).map(str::to_string),
        }
    }

    pub fn complete_href(&self) -> String {
        match &self.fragment_id {
            Some(fragment) => format!("{}#{}", self.href, fragment),
            None => self.href.clone(),
        }
    }
}

/// Guide (EPUB 2) or landmarks (EPUB 3): a flat list of typed references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Guide {
    references: Vec<GuideReference>,
}

impl Guide {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_reference(&mut self, reference: GuideReference) -> usize {
        self.references.push(reference);
        self.references.len() - 1
    }

    pub fn references(&self) -> &[GuideReference] {
        &self.references
    }

    pub fn references_by_type(&self, semantic: GuideType) -> impl Iterator<Item = &GuideReference> {
        self.references.iter().filter(move |r| r.semantic == semantic)
    }

    pub fn first_by_type(&self, semantic: GuideType) -> Option<&GuideReference> {
        self.references_by_type(semantic).next()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn retain<F>(&mut self, f: F)
    where
        F: FnMut(&GuideReference) -> bool,
    {
        self.references.retain(f);
    }

    /// Replace any reference of `semantic` with one pointing at `href`.
    pub fn set_reference(&mut self, semantic: GuideType, href: &str, title: &str) {
        self.references.retain(|r| r.semantic != semantic);
        self.references
            .insert(0, GuideReference::new(semantic, href, title));
    }

    /// References as written: the explicit list, plus a cover and a toc
    /// reference synthesized from `cover_page`/`toc_href` when the list has
    /// none of that type.
    pub fn with_synthesized(&self, cover_page: Option<&str>, toc_href: Option<&str>) -> Vec<GuideReference> {
        let mut out = self.references.clone();
        if let Some(cover) = cover_page
            && self.first_by_type(GuideType::Cover).is_none()
        {
            out.insert(0, GuideReference::new(GuideType::Cover, cover, ""));
        }
        if let Some(toc) = toc_href
            && self.first_by_type(GuideType::Toc).is_none()
        {
            out.push(GuideReference::new(GuideType::Toc, toc, ""));
        }
        out
    }

    pub(crate) fn rename(&mut self, old_href: &str, new_href: &str) {
        for reference in &mut self.references {
            if reference.href == old_href {
                reference.href = new_href.to_string();
            }
        }
    }
}
