use tracing::info;

use super::BookProcessor;
use crate::error::Result;
use crate::model::{Book, Identifier};

/// Gives a book without any identifier a random `urn:uuid:` one.
pub struct IdentifierRepair;

impl BookProcessor for IdentifierRepair {
    fn name(&self) -> &str {
        "identifier-repair"
    }

    fn process(&self, book: &mut Book) -> Result<()> {
        if book.metadata.identifiers.is_empty() {
            let identifier = Identifier::random_uuid();
            info!("Book has no identifier, generated {}", identifier.value);
            book.metadata.add_identifier(identifier);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adds_one_uuid() {
        let mut book = Book::default();
        IdentifierRepair.process(&mut book).unwrap();
        IdentifierRepair.process(&mut book).unwrap();

        assert_eq!(book.metadata.identifiers.len(), 1);
        let identifier = &book.metadata.identifiers[0];
        assert_eq!(identifier.scheme.as_deref(), Some("UUID"));
        assert!(identifier.bookid);
    }

    #[test]
    fn test_existing_identifiers_untouched() {
        let mut book = Book::default();
        book.metadata.add_identifier(Identifier::new(Some("ISBN"), "9780000000000"));
        let before = book.metadata.clone();
        IdentifierRepair.process(&mut book).unwrap();
        assert_eq!(book.metadata, before);
    }
}
