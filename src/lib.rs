//! # quire
//!
//! An in-memory model of EPUB publications with a reader and writer for
//! both EPUB 2 and EPUB 3.
//!
//! ## Features
//!
//! - Read EPUB 2/3 archives into a [`Book`]: metadata, manifest, spine,
//!   table of contents, guide/landmarks and cover
//! - Edit the book: add, rename and remove resources with references
//!   rewritten across markup and stylesheets
//! - Write EPUB 2 or EPUB 3, regenerating NCX and navigation documents
//!   from the model
//! - Run cleanup [`processor`]s after loading and before saving
//!
//! ## Quick Start
//!
//! ```no_run
//! use quire::{read_epub, write_epub};
//!
//! let mut book = read_epub("input.epub")?;
//! book.metadata.add_title("Another Title");
//! write_epub(&mut book, "output.epub")?;
//! # Ok::<(), quire::Error>(())
//! ```
//!
//! ## Building a Book
//!
//! ```
//! use quire::{Author, Book, MediaType, Resource, TocEntry, Version};
//!
//! let mut book = Book::new(Version::Epub3);
//! book.metadata.add_title("My Book");
//! book.metadata.add_creator(Author::new("Author Name"));
//! book.metadata.languages.push("en".into());
//!
//! let chapter = Resource::new("ch1", "text/ch1.xhtml", MediaType::XHTML, b"<html/>".to_vec());
//! let href = book.add_section("Chapter 1", chapter)?;
//! assert_eq!(book.toc.entries[0], TocEntry::new("Chapter 1", &href));
//! # Ok::<(), quire::Error>(())
//! ```

pub mod dom;
pub mod epub;
pub mod error;
pub mod media_type;
pub mod model;
pub mod path;
pub mod processor;
pub(crate) mod util;

pub use epub::{
    EpubConfig, EpubReader, EpubWriter, read_epub, read_epub_from_reader, write_epub,
    write_epub_to_writer,
};
pub use error::{Error, Result};
pub use media_type::{MediaCategory, MediaType, MediaTypes};
pub use model::{
    Author, Book, DateEvent, DcValue, Decoded, Guide, GuideReference, GuideType, Identifier,
    MetaProperty, Metadata, Refinement, Resource, Resources, Spine, SpineReference,
    TableOfContents, TocEntry, Version,
};
pub use processor::{BookProcessor, Pipeline};
