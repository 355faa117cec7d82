//! Document handle: the boundary the host binding talks to.
//!
//! A [`Document`] owns the byte source, cross-reference table, encryption
//! state and caches. Lifecycle is explicit: [`Document::close`] tears the
//! resources down deterministically and is idempotent; every operation on
//! a closed handle fails with [`PdfError::ClosedHandle`]. Encrypted
//! documents open in a locked state; [`Document::unlock`] may be retried
//! with different passwords without reparsing the file.
//!
//! A `Document` is not internally synchronized. All operations take
//! `&mut self`, so safe Rust already enforces the one-in-flight-operation
//! rule; wrap the handle in a mutex to share it across threads. Distinct
//! documents are fully independent and render in parallel freely.

use std::num::NonZeroUsize;
use std::path::Path as FsPath;

use lru::LruCache;

use crate::core::annotation::{links_for_page, Link};
use crate::core::encryption::EncryptionState;
use crate::core::error::{PdfError, PdfResult};
use crate::core::page::{Page, PageTree};
use crate::core::parser::Object;
use crate::core::xref::XRef;
use crate::render::context::render_page_content;
use crate::render::skia_device::{demultiply_in_place, SkiaDevice};
use crate::render::surface::{output_dimensions, page_transform, PixelSurface};

/// Materialized pages kept per document.
const PAGE_CACHE_SIZE: usize = 16;

struct DocumentInner {
    xref: XRef,
    /// Flattened page list, built on first page access.
    tree: Option<PageTree>,
    pages: LruCache<usize, Page>,
    /// True while an /Encrypt dictionary exists and no password has
    /// validated yet.
    locked: bool,
}

/// An open PDF document.
pub struct Document {
    /// `None` after close().
    inner: Option<DocumentInner>,
}

impl Document {
    /// Opens a document from bytes, attempting decryption immediately.
    ///
    /// The empty password is always tried first (owner-only protection
    /// with a blank user password is common). Failure modes:
    /// [`PdfError::PasswordRequired`] when no password was given and one
    /// is needed, [`PdfError::InvalidPassword`] when the given password
    /// does not validate, [`PdfError::DocumentCorrupt`] when the file is
    /// structurally unusable.
    pub fn open(data: Vec<u8>, password: Option<&str>) -> PdfResult<Document> {
        let mut doc = Document::open_locked(data)?;
        if doc.is_locked() {
            match password {
                Some(pw) => doc.unlock(pw)?,
                None => return Err(PdfError::PasswordRequired),
            }
        }
        Ok(doc)
    }

    /// Opens a document from a file path.
    pub fn open_file(path: impl AsRef<FsPath>, password: Option<&str>) -> PdfResult<Document> {
        let data = std::fs::read(path)?;
        Document::open(data, password)
    }

    /// Parses the document structure but defers password validation.
    ///
    /// An encrypted document comes back locked: structure-level calls
    /// fail with [`PdfError::PasswordRequired`] until [`Document::unlock`]
    /// succeeds. The empty password is tried transparently.
    pub fn open_locked(data: Vec<u8>) -> PdfResult<Document> {
        let mut xref = XRef::parse(data)?;

        let mut locked = false;
        if let Some(encrypt_obj) = xref.trailer().get("Encrypt").cloned() {
            let encrypt_ref = encrypt_obj.as_reference();
            let encrypt_dict = match xref.resolve(&encrypt_obj)? {
                Object::Dictionary(d) => d,
                _ => return Err(PdfError::corrupt("/Encrypt is not a dictionary")),
            };
            let file_id = xref.file_id();
            let mut enc = EncryptionState::from_dict(&encrypt_dict, file_id, encrypt_ref)?;

            // Blank user passwords unlock transparently.
            locked = enc.unlock(b"").is_err();
            xref.encryption = Some(enc);
        }

        Ok(Document {
            inner: Some(DocumentInner {
                xref,
                tree: None,
                pages: LruCache::new(NonZeroUsize::new(PAGE_CACHE_SIZE).expect("nonzero")),
                locked,
            }),
        })
    }

    fn inner(&mut self) -> PdfResult<&mut DocumentInner> {
        self.inner.as_mut().ok_or(PdfError::ClosedHandle)
    }

    fn unlocked_inner(&mut self) -> PdfResult<&mut DocumentInner> {
        let inner = self.inner()?;
        if inner.locked {
            return Err(PdfError::PasswordRequired);
        }
        Ok(inner)
    }

    /// Whether the document still awaits a valid password.
    pub fn is_locked(&self) -> bool {
        self.inner.as_ref().map(|i| i.locked).unwrap_or(false)
    }

    /// Validates a password against the document's security handler.
    ///
    /// May be called repeatedly with different candidates; the document
    /// stays locked between failed attempts and nothing is reparsed.
    pub fn unlock(&mut self, password: &str) -> PdfResult<()> {
        let inner = self.inner()?;
        if !inner.locked {
            return Ok(());
        }
        let enc = inner
            .xref
            .encryption
            .as_mut()
            .ok_or(PdfError::ClosedHandle)?;
        enc.unlock(password.as_bytes())?;
        inner.locked = false;
        Ok(())
    }

    /// Releases the byte source and all caches. Idempotent; subsequent
    /// operations fail with [`PdfError::ClosedHandle`].
    pub fn close(&mut self) {
        self.inner = None;
    }

    /// Whether the handle is open and usable.
    pub fn is_valid(&self) -> bool {
        self.inner.is_some()
    }

    fn tree(inner: &mut DocumentInner) -> PdfResult<&PageTree> {
        if inner.tree.is_none() {
            inner.tree = Some(PageTree::load(&mut inner.xref)?);
        }
        Ok(inner.tree.as_ref().expect("just set"))
    }

    fn page(inner: &mut DocumentInner, index: usize) -> PdfResult<Page> {
        Self::tree(inner)?;
        if let Some(page) = inner.pages.get(&index) {
            return Ok(page.clone());
        }
        let tree = inner.tree.as_ref().expect("tree loaded above");
        let page = tree.page(&mut inner.xref, index)?;
        inner.pages.put(index, page.clone());
        Ok(page)
    }

    /// Number of pages in the document.
    pub fn page_count(&mut self) -> PdfResult<usize> {
        let inner = self.unlocked_inner()?;
        Ok(Self::tree(inner)?.page_count())
    }

    /// Page size in points: `(width, height)`, axes swapped when the
    /// effective /Rotate is 90 or 270.
    pub fn page_size(&mut self, index: usize) -> PdfResult<(f64, f64)> {
        let inner = self.unlocked_inner()?;
        let page = Self::page(inner, index)?;
        Ok(page.rotated_size())
    }

    /// Renders a page into a freshly allocated surface.
    ///
    /// Output dimensions are `ceil(media_width × scale)` by
    /// `ceil(media_height × scale)`, rotation applied. Same document
    /// bytes, page and scale produce byte-identical output.
    pub fn render_page(&mut self, index: usize, scale: f64) -> PdfResult<PixelSurface> {
        let (w, h) = self.render_dimensions(index, scale)?;
        let mut surface = PixelSurface::new(w, h);
        self.render_page_into(index, &mut surface, scale)?;
        Ok(surface)
    }

    /// Renders a page into caller-owned pixel memory.
    ///
    /// The surface dimensions must match [`Document::render_dimensions`]
    /// for this page and scale exactly; on mismatch the call fails with
    /// [`PdfError::SurfaceSizeMismatch`] and the surface is untouched, so
    /// the caller can re-allocate and retry.
    pub fn render_page_into(
        &mut self,
        index: usize,
        surface: &mut PixelSurface,
        scale: f64,
    ) -> PdfResult<()> {
        let (w, h) = self.render_dimensions(index, scale)?;
        if (surface.width(), surface.height()) != (w, h) {
            return Err(PdfError::SurfaceSizeMismatch {
                expected: (w, h),
                actual: (surface.width(), surface.height()),
            });
        }

        let inner = self.unlocked_inner()?;
        let page = Self::page(inner, index)?;
        let base = page_transform(page.media_box, page.rotate, scale);

        {
            let mut device = SkiaDevice::new(surface.data_mut(), w, h, &base)?;
            render_page_content(&mut inner.xref, &page, &mut device)?;
        }
        demultiply_in_place(surface.data_mut());
        Ok(())
    }

    /// The surface dimensions `render_page` would produce.
    pub fn render_dimensions(&mut self, index: usize, scale: f64) -> PdfResult<(u32, u32)> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(PdfError::syntax(format!("render scale {scale} is not positive")));
        }
        let inner = self.unlocked_inner()?;
        let page = Self::page(inner, index)?;
        Ok(output_dimensions(
            page.width(),
            page.height(),
            page.rotate,
            scale,
        ))
    }

    /// Link annotations of a page: clickable rectangles with URI or
    /// internal page targets. Malformed annotations are skipped.
    pub fn links(&mut self, index: usize) -> PdfResult<Vec<Link>> {
        let inner = self.unlocked_inner()?;
        let page = Self::page(inner, index)?;
        let tree = inner.tree.as_ref().expect("tree loaded by page()");
        // The tree is read-only here; the xref still materializes objects.
        links_for_page(&mut inner.xref, tree, &page)
    }
}
