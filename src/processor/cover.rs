use tracing::debug;

use super::BookProcessor;
use crate::error::Result;
use crate::model::Book;

/// Completes a half-specified cover.
///
/// With only a cover image, an XHTML page showing it in an SVG wrapper is
/// generated. With only a cover page, the first image it shows becomes the
/// cover image.
pub struct CoverPageSynthesis;

impl BookProcessor for CoverPageSynthesis {
    fn name(&self) -> &str {
        "cover-page"
    }

    fn process(&self, book: &mut Book) -> Result<()> {
        match (book.cover_image().is_some(), book.cover_page().is_some()) {
            (true, false) => {
                if let Some(page) = book.generate_cover_page() {
                    debug!("Synthesized cover page {}", page);
                }
            }
            (false, true) => {
                if book.rescan_cover_page().is_none() {
                    debug!("Cover page shows no image");
                }
            }
            _ => {}
        }
        Ok(())
    }
}
