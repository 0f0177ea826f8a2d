//! EPUB 2 and EPUB 3 reading and writing.
//!
//! The archive layer and the package document parse are shared. What
//! differs between the versions (navigation documents, guide versus
//! landmarks, manifest properties) sits behind a `PackageCodec` strategy
//! picked by the package version.
//!
//! # Example
//!
//! ```no_run
//! use quire::epub::{EpubConfig, EpubReader, EpubWriter};
//! use quire::Version;
//!
//! let mut book = EpubReader::new().open("in.epub")?;
//! let config = EpubConfig {
//!     target_version: Some(Version::Epub3),
//!     ..Default::default()
//! };
//! EpubWriter::new().with_config(config).save(&mut book, "out.epub")?;
//! # Ok::<(), quire::Error>(())
//! ```

mod archive;
mod container;
mod epub2;
mod epub3;
mod metadata;
mod nav;
mod ncx;
mod package;
mod reader;
mod writer;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::Result;
use crate::media_type::MediaTypes;
use crate::model::{Book, Resource, Version};
use crate::processor::Pipeline;

pub use container::{CONTAINER_PATH, DEFAULT_PACKAGE_PATH};
pub use nav::NAV_HREF;
pub use ncx::NCX_HREF;
pub use writer::package_document;

use epub2::Epub2Codec;
use epub3::Epub3Codec;
use reader::ReadContext;

/// Version-specific half of the package codec.
pub(crate) trait PackageCodec {
    fn version(&self) -> Version;

    /// Table of contents, guide or landmarks, navigation pointers and cover,
    /// read once manifest, metadata and spine are in the book.
    fn read_navigation(&self, context: &ReadContext<'_>, book: &mut Book) -> Result<()>;

    /// Regenerate the navigation resources from the book's model.
    fn write_navigation(&self, book: &mut Book) -> Result<()>;

    /// `properties` tokens written on the resource's manifest item.
    fn manifest_properties(&self, book: &Book, resource: &Resource) -> Vec<String>;

    /// Append the `<guide>` element, if the version has one.
    fn write_guide(&self, opf: &mut String, book: &Book);
}

pub(crate) fn codec_for(version: Version) -> &'static dyn PackageCodec {
    match version {
        Version::Epub2 => &Epub2Codec,
        Version::Epub3 => &Epub3Codec,
    }
}

/// Reads EPUB archives into [`Book`]s and runs a post-load pipeline.
pub struct EpubReader {
    media_types: MediaTypes,
    pipeline: Pipeline,
}

impl EpubReader {
    /// Reader with the standard media types and [`Pipeline::post_load`].
    pub fn new() -> Self {
        Self {
            media_types: MediaTypes::default(),
            pipeline: Pipeline::post_load(),
        }
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_media_types(mut self, media_types: MediaTypes) -> Self {
        self.media_types = media_types;
        self
    }

    /// Read from any [`Read`] + [`Seek`] source.
    pub fn read<R: Read + Seek>(&self, reader: R) -> Result<Book> {
        let entries = archive::read_entries(reader)?;
        let mut book = reader::read_book(entries, &self.media_types)?;
        self.pipeline.run(&mut book);
        Ok(book)
    }

    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<Book> {
        let file = File::open(path)?;
        self.read(BufReader::new(file))
    }
}

impl Default for EpubReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for EPUB output.
#[derive(Debug, Clone, Copy)]
pub struct EpubConfig {
    /// Deflate level (0-9).
    pub compression_level: u32,
    /// Convert the book to this version before writing. `None` keeps the
    /// book's own version.
    pub target_version: Option<Version>,
}

impl Default for EpubConfig {
    fn default() -> Self {
        Self {
            compression_level: 6,
            target_version: None,
        }
    }
}

/// Writes [`Book`]s as EPUB archives after running a pre-save pipeline.
///
/// Writing regenerates the navigation documents (NCX, and the EPUB 3 nav)
/// from the book's table of contents and guide, and refreshes
/// `dcterms:modified` for EPUB 3.
pub struct EpubWriter {
    config: EpubConfig,
    pipeline: Pipeline,
}

impl EpubWriter {
    /// Writer with the default configuration and [`Pipeline::pre_save`].
    pub fn new() -> Self {
        Self {
            config: EpubConfig::default(),
            pipeline: Pipeline::pre_save(),
        }
    }

    pub fn with_config(mut self, config: EpubConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Write to any [`Write`] + [`Seek`] destination and hand it back.
    ///
    /// On failure the destination may hold a truncated archive; use
    /// [`EpubWriter::save`] for an all-or-nothing file.
    pub fn write<W: Write + Seek>(&self, book: &mut Book, writer: W) -> Result<W> {
        if let Some(version) = self.config.target_version
            && version != book.version
        {
            debug!("Converting EPUB {} to EPUB {}", book.version, version);
            book.version = version;
        }
        if book.version == Version::Epub3 {
            book.metadata.modified = Some(writer::timestamp_now());
        }
        self.pipeline.run(book);
        writer::write_book(book, writer, self.config.compression_level)
    }

    /// Write to `path` through a temporary file in the same directory that
    /// replaces `path` only once the archive is complete.
    pub fn save<P: AsRef<Path>>(&self, book: &mut Book, path: P) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp = tempfile::NamedTempFile::new_in(dir)?;
        let mut out = self.write(book, BufWriter::new(temp))?;
        out.flush()?;
        let temp = out.into_inner().map_err(|e| e.into_error())?;
        temp.persist(path).map_err(|e| {
            warn!("Could not move finished archive to {}", path.display());
            e.error
        })?;
        Ok(())
    }
}

impl Default for EpubWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Read an EPUB file with the default reader.
///
/// # Example
///
/// ```no_run
/// let book = quire::read_epub("book.epub")?;
/// println!("{}", book.metadata.title());
/// # Ok::<(), quire::Error>(())
/// ```
pub fn read_epub<P: AsRef<Path>>(path: P) -> Result<Book> {
    EpubReader::new().open(path)
}

/// Read an EPUB from any [`Read`] + [`Seek`] source with the default reader.
pub fn read_epub_from_reader<R: Read + Seek>(reader: R) -> Result<Book> {
    EpubReader::new().read(reader)
}

/// Save a book to `path` atomically with the default writer.
pub fn write_epub<P: AsRef<Path>>(book: &mut Book, path: P) -> Result<()> {
    EpubWriter::new().save(book, path)
}

/// Write a book to any [`Write`] + [`Seek`] destination with the default
/// writer.
pub fn write_epub_to_writer<W: Write + Seek>(book: &mut Book, writer: W) -> Result<W> {
    EpubWriter::new().write(book, writer)
}
