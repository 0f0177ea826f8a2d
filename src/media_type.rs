//! Media types known to EPUB packages and the lookup table over them.
//!
//! [`MediaTypes`] is an ordinary value: construct one (usually with
//! [`MediaTypes::default`]) and hand it to the readers that need it.

use std::borrow::Cow;
use std::fmt;

/// Semantic category of a media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaCategory {
    Xhtml,
    Html,
    Css,
    Javascript,
    Ncx,
    Package,
    Xml,
    Svg,
    Bitmap,
    Font,
    Audio,
    Video,
    Smil,
    PlainText,
    Other,
}

/// Manifest grouping used by editors to bucket resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemClass {
    Script,
    Style,
    Image,
    Text,
    None,
}

/// A MIME media type together with its file extensions.
#[derive(Debug, Clone)]
pub struct MediaType {
    name: Cow<'static, str>,
    default_extension: Cow<'static, str>,
    extensions: &'static [&'static str],
    aliases: &'static [&'static str],
    category: MediaCategory,
}

impl MediaType {
    pub const XHTML: MediaType = MediaType::known(
        "application/xhtml+xml",
        ".xhtml",
        &[".xhtml", ".htm", ".html"],
        &[],
        MediaCategory::Xhtml,
    );
    pub const HTML: MediaType =
        MediaType::known("text/html", ".html", &[], &[], MediaCategory::Html);
    pub const CSS: MediaType = MediaType::known("text/css", ".css", &[".css"], &[], MediaCategory::Css);
    pub const JAVASCRIPT: MediaType = MediaType::known(
        "application/javascript",
        ".js",
        &[".js"],
        &["text/javascript", "application/ecmascript"],
        MediaCategory::Javascript,
    );
    pub const NCX: MediaType = MediaType::known(
        "application/x-dtbncx+xml",
        ".ncx",
        &[".ncx"],
        &[],
        MediaCategory::Ncx,
    );
    pub const OPF: MediaType = MediaType::known(
        "application/oebps-package+xml",
        ".opf",
        &[".opf"],
        &[],
        MediaCategory::Package,
    );
    pub const XML: MediaType =
        MediaType::known("application/xml", ".xml", &[".xml"], &["text/xml"], MediaCategory::Xml);
    pub const SVG: MediaType =
        MediaType::known("image/svg+xml", ".svg", &[".svg"], &[], MediaCategory::Svg);
    pub const JPEG: MediaType = MediaType::known(
        "image/jpeg",
        ".jpg",
        &[".jpg", ".jpeg"],
        &["image/jpg"],
        MediaCategory::Bitmap,
    );
    pub const PNG: MediaType =
        MediaType::known("image/png", ".png", &[".png"], &[], MediaCategory::Bitmap);
    pub const GIF: MediaType =
        MediaType::known("image/gif", ".gif", &[".gif"], &[], MediaCategory::Bitmap);
    pub const WEBP: MediaType =
        MediaType::known("image/webp", ".webp", &[".webp"], &[], MediaCategory::Bitmap);
    pub const TTF: MediaType = MediaType::known(
        "font/ttf",
        ".ttf",
        &[".ttf"],
        &["application/x-font-ttf", "application/x-truetype-font", "font/truetype"],
        MediaCategory::Font,
    );
    pub const OTF: MediaType = MediaType::known(
        "font/otf",
        ".otf",
        &[".otf"],
        &["application/vnd.ms-opentype", "application/x-font-otf", "font/opentype"],
        MediaCategory::Font,
    );
    pub const WOFF: MediaType = MediaType::known(
        "font/woff",
        ".woff",
        &[".woff"],
        &["application/font-woff", "application/x-font-woff"],
        MediaCategory::Font,
    );
    pub const WOFF2: MediaType =
        MediaType::known("font/woff2", ".woff2", &[".woff2"], &[], MediaCategory::Font);
    pub const MP3: MediaType =
        MediaType::known("audio/mpeg", ".mp3", &[".mp3"], &[], MediaCategory::Audio);
    pub const MP4_AUDIO: MediaType =
        MediaType::known("audio/mp4", ".m4a", &[".m4a"], &[], MediaCategory::Audio);
    pub const OGG: MediaType =
        MediaType::known("audio/ogg", ".ogg", &[".ogg", ".oga"], &[], MediaCategory::Audio);
    pub const MP4_VIDEO: MediaType =
        MediaType::known("video/mp4", ".mp4", &[".mp4"], &[], MediaCategory::Video);
    pub const SMIL: MediaType = MediaType::known(
        "application/smil+xml",
        ".smil",
        &[".smil"],
        &[],
        MediaCategory::Smil,
    );
    pub const PLS: MediaType = MediaType::known(
        "application/pls+xml",
        ".pls",
        &[".pls"],
        &[],
        MediaCategory::Xml,
    );
    pub const PLAIN_TEXT: MediaType =
        MediaType::known("text/plain", ".txt", &[".txt"], &[], MediaCategory::PlainText);

    /// The standard table in lookup order. Extension lookups return the first
    /// match, so more specific types come first.
    pub const STANDARD: &'static [MediaType] = &[
        MediaType::XHTML,
        MediaType::CSS,
        MediaType::JAVASCRIPT,
        MediaType::NCX,
        MediaType::OPF,
        MediaType::SVG,
        MediaType::JPEG,
        MediaType::PNG,
        MediaType::GIF,
        MediaType::WEBP,
        MediaType::TTF,
        MediaType::OTF,
        MediaType::WOFF2,
        MediaType::WOFF,
        MediaType::MP3,
        MediaType::MP4_AUDIO,
        MediaType::OGG,
        MediaType::MP4_VIDEO,
        MediaType::SMIL,
        MediaType::PLS,
        MediaType::XML,
        MediaType::PLAIN_TEXT,
        MediaType::HTML,
    ];

    const fn known(
        name: &'static str,
        default_extension: &'static str,
        extensions: &'static [&'static str],
        aliases: &'static [&'static str],
        category: MediaCategory,
    ) -> Self {
        Self {
            name: Cow::Borrowed(name),
            default_extension: Cow::Borrowed(default_extension),
            extensions,
            aliases,
            category,
        }
    }

    /// A media type outside the standard table, e.g. read from a manifest.
    pub fn other(name: impl Into<String>, default_extension: impl Into<String>) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            default_extension: Cow::Owned(default_extension.into()),
            extensions: &[],
            aliases: &[],
            category: MediaCategory::Other,
        }
    }

    /// Canonical MIME name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Extension including the leading dot, used for generated hrefs.
    pub fn default_extension(&self) -> &str {
        &self.default_extension
    }

    pub fn extensions(&self) -> &[&'static str] {
        self.extensions
    }

    pub fn category(&self) -> MediaCategory {
        self.category
    }

    pub fn item_class(&self) -> ItemClass {
        match self.category {
            MediaCategory::Javascript => ItemClass::Script,
            MediaCategory::Css => ItemClass::Style,
            MediaCategory::Bitmap | MediaCategory::Svg => ItemClass::Image,
            MediaCategory::Xhtml | MediaCategory::Html => ItemClass::Text,
            _ => ItemClass::None,
        }
    }

    pub fn is_bitmap_image(&self) -> bool {
        self.category == MediaCategory::Bitmap
    }

    pub fn is_image(&self) -> bool {
        matches!(self.category, MediaCategory::Bitmap | MediaCategory::Svg)
    }

    pub fn is_font(&self) -> bool {
        self.category == MediaCategory::Font
    }

    pub fn is_xhtml(&self) -> bool {
        self.category == MediaCategory::Xhtml
    }

    pub fn is_css(&self) -> bool {
        self.category == MediaCategory::Css
    }

    pub fn is_ncx(&self) -> bool {
        self.category == MediaCategory::Ncx
    }

    pub fn is_xml(&self) -> bool {
        matches!(
            self.category,
            MediaCategory::Xhtml
                | MediaCategory::Ncx
                | MediaCategory::Package
                | MediaCategory::Xml
                | MediaCategory::Svg
                | MediaCategory::Smil
        )
    }

    /// Text kinds carry an input encoding and may be decoded to a string.
    pub fn is_text(&self) -> bool {
        self.is_xml()
            || matches!(
                self.category,
                MediaCategory::Html
                    | MediaCategory::Css
                    | MediaCategory::Javascript
                    | MediaCategory::PlainText
            )
    }

    fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    fn matches_filename(&self, filename: &str) -> bool {
        let lower = filename.to_ascii_lowercase();
        self.extensions.iter().any(|ext| lower.ends_with(ext))
    }
}

impl PartialEq for MediaType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for MediaType {}

impl std::hash::Hash for MediaType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Ordered lookup table of media types.
#[derive(Debug, Clone)]
pub struct MediaTypes {
    types: Vec<MediaType>,
}

impl Default for MediaTypes {
    fn default() -> Self {
        Self {
            types: MediaType::STANDARD.to_vec(),
        }
    }
}

impl MediaTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an additional type. It is consulted after the existing ones.
    pub fn register(&mut self, media_type: MediaType) {
        self.types.push(media_type);
    }

    /// First type whose accepted extensions end the filename (case-insensitive).
    pub fn by_extension(&self, filename: &str) -> Option<&MediaType> {
        let filename = filename.split('#').next().unwrap_or(filename);
        self.types.iter().find(|t| t.matches_filename(filename))
    }

    /// Type by canonical MIME name or a known alias. Parameters such as
    /// `; charset=utf-8` are ignored.
    pub fn by_name(&self, name: &str) -> Option<&MediaType> {
        let name = name.split(';').next().unwrap_or(name).trim();
        self.types.iter().find(|t| t.matches_name(name))
    }

    /// Best-effort type for a manifest item: by declared name, then by the
    /// href's extension, then an opaque type carrying the declared name.
    pub fn resolve(&self, declared: &str, href: &str) -> MediaType {
        if let Some(found) = self.by_name(declared) {
            return found.clone();
        }
        if let Some(found) = self.by_extension(href) {
            if !declared.trim().is_empty() {
                tracing::debug!(
                    "Unknown media type '{}' for {}, using {} from extension",
                    declared,
                    href,
                    found
                );
            }
            return found.clone();
        }
        let extension = href
            .rsplit('/')
            .next()
            .and_then(|base| base.rfind('.').map(|i| base[i..].to_string()))
            .unwrap_or_default();
        let name = if declared.trim().is_empty() {
            "application/octet-stream"
        } else {
            declared.trim()
        };
        MediaType::other(name, extension)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaType> {
        self.types.iter()
    }
}
