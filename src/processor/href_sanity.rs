use tracing::debug;

use super::BookProcessor;
use crate::error::Result;
use crate::model::{Book, SpineReference};
use crate::path;

/// Cleans up the reading order: drops entries whose resource is missing or
/// has a blank href, and collapses an entry that repeats the previous one
/// up to its fragment.
pub struct HrefSanityCheck;

impl BookProcessor for HrefSanityCheck {
    fn name(&self) -> &str {
        "href-sanity-check"
    }

    fn process(&self, book: &mut Book) -> Result<()> {
        let mut kept: Vec<SpineReference> = Vec::with_capacity(book.spine.len());
        for reference in book.spine.iter() {
            let target = path::strip_fragment(&reference.href);
            if target.trim().is_empty() || !book.resources.contains_href(target) {
                debug!("Dropping spine entry '{}' without a resource", reference.href);
                continue;
            }
            if let Some(previous) = kept.last()
                && path::strip_fragment(&previous.href) == target
            {
                debug!("Collapsing repeated spine entry {}", reference.href);
                continue;
            }
            kept.push(SpineReference {
                href: target.to_string(),
                linear: reference.linear,
            });
        }
        book.spine.set_references(kept);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media_type::MediaType;
    use crate::model::Resource;

    #[test]
    fn test_drops_missing_and_collapses_fragments() {
        let mut book = Book::default();
        for href in ["a.xhtml", "b.xhtml"] {
            book.add_resource(Resource::new("", href, MediaType::XHTML, Vec::new()));
        }
        book.spine.set_references(vec![
            SpineReference::new("a.xhtml"),
            SpineReference::new("a.xhtml#part2"),
            SpineReference::new("missing.xhtml"),
            SpineReference::new(""),
            SpineReference::new("b.xhtml"),
            SpineReference::non_linear("a.xhtml"),
        ]);

        HrefSanityCheck.process(&mut book).unwrap();

        let hrefs: Vec<_> = book.spine.iter().map(|r| r.href.as_str()).collect();
        assert_eq!(hrefs, vec!["a.xhtml", "b.xhtml", "a.xhtml"]);
        assert!(!book.spine.references()[2].linear);
    }
}
