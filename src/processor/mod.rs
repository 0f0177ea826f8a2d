//! Book processors and the pipeline that runs them.
//!
//! A processor is one transform over a [`Book`]. The [`Pipeline`] runs its
//! steps in order; a step that fails is logged and its partial changes are
//! rolled back, and the remaining steps still run.
//!
//! # Example
//!
//! ```
//! use quire::processor::{IdentifierRepair, Pipeline, from_fn};
//! use quire::Book;
//!
//! let pipeline = Pipeline::new()
//!     .with_step(IdentifierRepair)
//!     .with_step(from_fn("title", |book: &mut Book| {
//!         book.metadata.add_title("Untitled");
//!         Ok(())
//!     }));
//!
//! let mut book = Book::default();
//! assert!(pipeline.run(&mut book).is_empty());
//! assert_eq!(book.metadata.identifiers.len(), 1);
//! ```

mod cover;
mod href_sanity;
mod html;
mod identifier;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::Book;

pub use cover::CoverPageSynthesis;
pub use href_sanity::HrefSanityCheck;
pub use html::{HtmlNormalization, HtmlNormalizer, XhtmlNormalizer};
pub use identifier::IdentifierRepair;

/// One transform over a book.
pub trait BookProcessor {
    /// Name used in logs and in [`Error::Processor`].
    fn name(&self) -> &str;

    fn process(&self, book: &mut Book) -> Result<()>;
}

/// A processor made from a closure.
pub struct FnProcessor<F> {
    name: String,
    f: F,
}

impl<F> BookProcessor for FnProcessor<F>
where
    F: Fn(&mut Book) -> Result<()>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, book: &mut Book) -> Result<()> {
        (self.f)(book)
    }
}

/// Wrap a closure as a named processor.
pub fn from_fn<F>(name: impl Into<String>, f: F) -> FnProcessor<F>
where
    F: Fn(&mut Book) -> Result<()>,
{
    FnProcessor {
        name: name.into(),
        f,
    }
}

/// Ordered list of processors.
#[derive(Default)]
pub struct Pipeline {
    steps: Vec<Box<dyn BookProcessor>>,
}

impl Pipeline {
    /// An empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Steps run after a book is read: reading-order cleanup, cover
    /// completion and identifier repair.
    pub fn post_load() -> Self {
        Self::new()
            .with_step(HrefSanityCheck)
            .with_step(CoverPageSynthesis)
            .with_step(IdentifierRepair)
    }

    /// Steps run before a book is written. Same as [`Pipeline::post_load`];
    /// a book built in memory needs the same guarantees.
    pub fn pre_save() -> Self {
        Self::post_load()
    }

    pub fn with_step<P: BookProcessor + 'static>(mut self, step: P) -> Self {
        self.push(step);
        self
    }

    pub fn push<P: BookProcessor + 'static>(&mut self, step: P) {
        self.steps.push(Box::new(step));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.name())
    }

    /// Run every step in order. A failing step leaves the book as it was
    /// before that step; its error is logged and returned.
    pub fn run(&self, book: &mut Book) -> Vec<Error> {
        let mut failures = Vec::new();
        for step in &self.steps {
            let snapshot = book.clone();
            match step.process(book) {
                Ok(()) => debug!("Processor '{}' done", step.name()),
                Err(e) => {
                    warn!("Processor '{}' failed, changes discarded: {}", step.name(), e);
                    *book = snapshot;
                    failures.push(Error::Processor {
                        step: step.name().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
        failures
    }
}
