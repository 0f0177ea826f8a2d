//! In-memory model of an EPUB publication.
//!
//! This module contains:
//! - The [`Book`] aggregate and its [`Version`]
//! - Dublin Core and EPUB metadata
//! - The resource registry, which keeps ids and hrefs unique
//! - Spine, table of contents and guide/landmarks, all referencing
//!   resources by href
//! - Reference rewriting used when resources are renamed

mod book;
mod cover;
mod guide;
mod links;
mod metadata;
mod resource;
mod resources;
mod spine;
mod toc;

pub use book::{Book, Version};
pub use guide::{Guide, GuideReference, GuideType};
pub use links::{LinkSyntax, find_references, rewrite_references};
pub use metadata::{Author, DateEvent, DcValue, Identifier, MetaProperty, Metadata, Refinement};
pub use resource::{Decoded, Resource};
pub use resources::{Resources, is_valid_id};
pub use spine::{Spine, SpineReference};
pub use toc::{TableOfContents, TocEntry};
