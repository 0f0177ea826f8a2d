use tracing::{debug, warn};

use super::BookProcessor;
use crate::dom::ArenaDom;
use crate::error::{Error, Result};
use crate::media_type::MediaType;
use crate::model::Book;
use crate::util::decode_text;

/// Turns possibly malformed (X)HTML bytes into well-formed UTF-8 XHTML.
pub trait HtmlNormalizer {
    fn normalize(&self, data: &[u8], encoding: Option<&str>) -> Result<Vec<u8>>;
}

/// html5ever-backed normalizer.
#[derive(Debug, Default, Clone, Copy)]
pub struct XhtmlNormalizer;

impl HtmlNormalizer for XhtmlNormalizer {
    fn normalize(&self, data: &[u8], encoding: Option<&str>) -> Result<Vec<u8>> {
        let text = decode_text(data, encoding);
        let dom = ArenaDom::parse(&text);
        let root = dom
            .find_by_tag("html")
            .ok_or_else(|| Error::Normalization("document has no root element".into()))?;
        if dom.children(root).is_empty() {
            return Err(Error::Normalization("document is empty".into()));
        }
        Ok(dom.to_xhtml().into_bytes())
    }
}

/// Normalizes every HTML and XHTML resource.
///
/// Not part of the default pipelines. A resource the normalizer rejects
/// keeps its original bytes.
pub struct HtmlNormalization<N = XhtmlNormalizer> {
    normalizer: N,
}

impl Default for HtmlNormalization {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlNormalization {
    pub fn new() -> Self {
        Self {
            normalizer: XhtmlNormalizer,
        }
    }
}

impl<N: HtmlNormalizer> HtmlNormalization<N> {
    pub fn with_normalizer(normalizer: N) -> Self {
        Self { normalizer }
    }
}

impl<N: HtmlNormalizer> BookProcessor for HtmlNormalization<N> {
    fn name(&self) -> &str {
        "html-normalization"
    }

    fn process(&self, book: &mut Book) -> Result<()> {
        for resource in book.resources.iter_mut() {
            let is_html = resource.media_type == MediaType::HTML;
            if !is_html && !resource.media_type.is_xhtml() {
                continue;
            }
            match self
                .normalizer
                .normalize(&resource.data, resource.input_encoding.as_deref())
            {
                Ok(data) => {
                    debug!("Normalized {}", resource.href());
                    resource.data = data;
                    resource.input_encoding = None;
                    if is_html {
                        resource.media_type = MediaType::XHTML;
                    }
                }
                Err(e) => warn!("Keeping {} as is: {}", resource.href(), e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Resource;

    struct Rejecting;

    impl HtmlNormalizer for Rejecting {
        fn normalize(&self, _data: &[u8], _encoding: Option<&str>) -> Result<Vec<u8>> {
            Err(Error::Normalization("rejected".into()))
        }
    }

    #[test]
    fn test_tag_soup_becomes_xhtml() {
        let out = XhtmlNormalizer
            .normalize(b"<p>one<br>two<p>three", None)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(text.contains("<br/>"));
        assert!(text.contains("<p>three</p>"));
    }

    #[test]
    fn test_declared_encoding_is_honored() {
        let out = XhtmlNormalizer
            .normalize(b"<p>caf\xe9</p>", Some("windows-1252"))
            .unwrap();
        assert!(String::from_utf8(out).unwrap().contains("café"));
    }

    #[test]
    fn test_html_resource_converted() {
        let mut book = Book::default();
        book.add_resource(
            Resource::new("c", "c.html", MediaType::HTML, b"<p>x".to_vec())
                .with_input_encoding("utf-8"),
        );
        HtmlNormalization::new().process(&mut book).unwrap();

        let resource = book.resources.get_by_href("c.html").unwrap();
        assert_eq!(resource.media_type, MediaType::XHTML);
        assert_eq!(resource.input_encoding, None);
        assert!(resource.text().unwrap().contains("<p>x</p>"));
    }

    #[test]
    fn test_rejected_resource_keeps_bytes() {
        let mut book = Book::default();
        book.add_resource(Resource::new("c", "c.xhtml", MediaType::XHTML, b"<p>".to_vec()));
        HtmlNormalization::with_normalizer(Rejecting)
            .process(&mut book)
            .unwrap();
        assert_eq!(book.resources.get_by_href("c.xhtml").unwrap().data, b"<p>");
    }
}
