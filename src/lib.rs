//! # pdf-raster
//!
//! A minimal but complete PDF rendering core: container parsing,
//! decryption, page-tree resolution, content-stream interpretation and
//! CPU rasterization to RGBA surfaces, plus link-annotation extraction.
//! It is the engine a thin host-language binding sits on top of; the
//! binding's concerns (marshalling, exception translation) live outside
//! this crate.
//!
//! ## Quick start
//!
//! ```no_run
//! use pdf_raster::Document;
//!
//! let data = std::fs::read("document.pdf")?;
//! let mut doc = Document::open(data, None)?;
//!
//! let pages = doc.page_count()?;
//! let (width, height) = doc.page_size(0)?;
//! println!("{pages} pages, first is {width}x{height} pt");
//!
//! // Render page 0 at 2x into an RGBA8 surface.
//! let surface = doc.render_page(0, 2.0)?;
//! assert_eq!(surface.data().len() as u32, surface.width() * surface.height() * 4);
//!
//! // Clickable regions.
//! for link in doc.links(0)? {
//!     println!("{:?} -> {:?}", link.rect, link.target);
//! }
//!
//! doc.close();
//! # Ok::<(), pdf_raster::PdfError>(())
//! ```
//!
//! ## Encrypted documents
//!
//! ```no_run
//! use pdf_raster::{Document, PdfError};
//!
//! # let data = Vec::new();
//! let mut doc = Document::open_locked(data)?;
//! if doc.is_locked() {
//!     // Retry passwords without reparsing the file.
//!     match doc.unlock("first guess") {
//!         Err(PdfError::InvalidPassword) => doc.unlock("second guess")?,
//!         other => other?,
//!     }
//! }
//! # Ok::<(), PdfError>(())
//! ```
//!
//! ## Threading
//!
//! A [`Document`] is single-writer: operations take `&mut self`, and the
//! crate adds no internal locking. Share a handle across threads behind a
//! mutex, or open independent documents per thread — separate instances
//! share nothing and render in parallel.

pub mod core;
pub mod render;

pub use self::core::{
    Dict, Document, Link, LinkTarget, Object, ObjectRef, Page, PdfError, PdfResult,
};
pub use self::render::PixelSurface;
