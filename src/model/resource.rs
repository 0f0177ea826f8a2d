use std::borrow::Cow;

use crate::media_type::{MediaCategory, MediaType};
use crate::util::{declare_utf8, decode_text, extract_image_dimensions};

/// A single asset of the book: content document, stylesheet, image, font...
///
/// `id` and `href` are assigned and kept unique by [`Resources`](super::Resources);
/// change them through the registry so that other resources and the book's
/// navigation structures follow along.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub(super) id: String,
    pub(super) href: String,
    pub media_type: MediaType,
    pub data: Vec<u8>,
    /// Declared character encoding for text kinds (`None` means UTF-8).
    pub input_encoding: Option<String>,
    /// EPUB 3 manifest `properties` tokens (`nav`, `cover-image`, `svg`, ...).
    pub properties: Vec<String>,
    pub fallback: Option<String>,
    pub media_overlay: Option<String>,
}

/// On-demand decoded form of a resource's bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<'a> {
    /// Markup or stylesheet text, decoded with the resource's input encoding.
    Text {
        category: MediaCategory,
        text: Cow<'a, str>,
    },
    /// Bitmap with dimensions read from its header. `None` when the header
    /// is not recognized.
    Image { dimensions: Option<(u32, u32)> },
    Binary(&'a [u8]),
}

impl Resource {
    /// Create a resource. An empty `id` or `href` is filled in when the
    /// resource is added to a registry.
    pub fn new(
        id: impl Into<String>,
        href: impl Into<String>,
        media_type: MediaType,
        data: Vec<u8>,
    ) -> Self {
        Self {
            id: id.into(),
            href: href.into(),
            media_type,
            data,
            input_encoding: None,
            properties: Vec::new(),
            fallback: None,
            media_overlay: None,
        }
    }

    /// A resource with neither id nor href yet.
    pub fn anonymous(media_type: MediaType, data: Vec<u8>) -> Self {
        Self::new("", "", media_type, data)
    }

    pub fn with_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = properties.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_input_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.input_encoding = Some(encoding.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    pub fn has_property(&self, property: &str) -> bool {
        self.properties.iter().any(|p| p == property)
    }

    pub fn add_property(&mut self, property: &str) {
        if !self.has_property(property) {
            self.properties.push(property.to_string());
        }
    }

    pub fn remove_property(&mut self, property: &str) {
        self.properties.retain(|p| p != property);
    }

    /// Replace the content with UTF-8 text. An XML declaration naming
    /// another encoding is updated to match.
    pub fn set_text(&mut self, text: String) {
        self.data = declare_utf8(text).into_bytes();
        self.input_encoding = None;
    }

    /// Decode the bytes according to the media type. Pure: repeated calls
    /// re-decode.
    pub fn decode(&self) -> Decoded<'_> {
        let category = self.media_type.category();
        if self.media_type.is_text() {
            Decoded::Text {
                category,
                text: decode_text(&self.data, self.input_encoding.as_deref()),
            }
        } else if self.media_type.is_bitmap_image() {
            Decoded::Image {
                dimensions: extract_image_dimensions(&self.data),
            }
        } else {
            Decoded::Binary(&self.data)
        }
    }

    /// Text content for text kinds, `None` for binary kinds.
    pub fn text(&self) -> Option<Cow<'_, str>> {
        match self.decode() {
            Decoded::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn image_dimensions(&self) -> Option<(u32, u32)> {
        match self.decode() {
            Decoded::Image { dimensions } => dimensions,
            _ => None,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_support::png_header;

    #[test]
    fn test_decode_text_uses_input_encoding() {
        let resource = Resource::new("c", "c.css", MediaType::CSS, vec![b'a', 0xE9])
            .with_input_encoding("iso-8859-1");
        assert_eq!(resource.text().as_deref(), Some("a\u{e9}"));
    }

    #[test]
    fn test_decode_image_dimensions() {
        let resource = Resource::new("img", "a.png", MediaType::PNG, png_header(40, 30));
        assert_eq!(resource.image_dimensions(), Some((40, 30)));
        assert!(resource.text().is_none());
    }

    #[test]
    fn test_decode_binary() {
        let resource = Resource::new("f", "f.ttf", MediaType::TTF, vec![0, 1, 0, 0]);
        assert_eq!(resource.decode(), Decoded::Binary(&[0, 1, 0, 0]));
    }

    #[test]
    fn test_properties() {
        let mut resource =
            Resource::anonymous(MediaType::XHTML, Vec::new()).with_properties(["nav"]);
        assert!(resource.has_property("nav"));
        resource.add_property("nav");
        resource.add_property("scripted");
        assert_eq!(resource.properties, vec!["nav", "scripted"]);
        resource.remove_property("nav");
        assert!(!resource.has_property("nav"));
    }
}
