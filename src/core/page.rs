//! Page tree resolution.
//!
//! The catalog's /Pages tree is a nested dictionary structure: interior
//! /Pages nodes carry /Kids arrays, leaves are /Page dictionaries, and the
//! attributes MediaBox, Resources and Rotate inherit from ancestors. Page
//! index is the depth-first, left-to-right order of the leaves. Real files
//! contain loops and lies (/Count disagreeing with /Kids), so traversal
//! carries a visited-set and a depth cap and trusts the flattened list over
//! the declared count.

use std::collections::HashSet;

use crate::core::error::{PdfError, PdfResult};
use crate::core::parser::{Dict, Object, ObjectRef};
use crate::core::xref::XRef;

/// Recursion cap for /Kids nesting. Genuine documents stay in single
/// digits; anything deeper is hostile or broken.
const MAX_TREE_DEPTH: usize = 64;

/// Cap for /Parent chain walks during attribute inheritance.
const MAX_PARENT_DEPTH: usize = 64;

/// Default page bounds when no MediaBox exists anywhere: US Letter.
pub const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// A resolved page: its dictionary plus the inherited attributes the rest
/// of the engine needs.
#[derive(Debug, Clone)]
pub struct Page {
    /// 0-based flattened index.
    pub index: usize,
    /// The leaf dictionary.
    pub dict: Dict,
    /// The leaf's own object reference, when it was reached through one.
    /// Link destinations compare against this.
    pub object_ref: Option<ObjectRef>,
    /// Normalized MediaBox [x0, y0, x1, y1], inherited if absent locally.
    pub media_box: [f64; 4],
    /// Effective rotation: one of 0, 90, 180, 270.
    pub rotate: i32,
    /// Inherited /Resources, resolved to a dictionary.
    pub resources: Option<Dict>,
}

impl Page {
    /// MediaBox width in points (pre-rotation).
    pub fn width(&self) -> f64 {
        self.media_box[2] - self.media_box[0]
    }

    /// MediaBox height in points (pre-rotation).
    pub fn height(&self) -> f64 {
        self.media_box[3] - self.media_box[1]
    }

    /// Page size as reported to callers: rotation of 90 or 270 swaps the
    /// axes, matching what viewers allocate bitmaps against.
    pub fn rotated_size(&self) -> (f64, f64) {
        if self.rotate == 90 || self.rotate == 270 {
            (self.height(), self.width())
        } else {
            (self.width(), self.height())
        }
    }

    /// The /Contents entry, unresolved (stream, array of streams, or ref).
    pub fn contents(&self) -> Option<&Object> {
        self.dict.get("Contents")
    }

    /// The /Annots entry, unresolved.
    pub fn annots(&self) -> Option<&Object> {
        self.dict.get("Annots")
    }
}

/// Flattened page list: the references (when present) and dictionaries of
/// every leaf, in page-index order.
pub struct PageTree {
    leaves: Vec<(Option<ObjectRef>, Dict)>,
}

impl PageTree {
    /// Walks the catalog's /Pages tree and flattens the leaves.
    ///
    /// A /Kids cycle or a nesting depth beyond [`MAX_TREE_DEPTH`] fails
    /// with `DocumentCorrupt`; this is structural damage, not a local
    /// parse wobble.
    pub fn load(xref: &mut XRef) -> PdfResult<PageTree> {
        let catalog = xref.catalog()?;
        let pages_entry = catalog
            .get("Pages")
            .cloned()
            .ok_or_else(|| PdfError::corrupt("catalog has no /Pages"))?;

        let root_ref = pages_entry.as_reference();
        let root = match xref.resolve(&pages_entry)? {
            Object::Dictionary(d) => d,
            _ => return Err(PdfError::corrupt("/Pages is not a dictionary")),
        };

        let mut leaves = Vec::new();
        let mut visited: HashSet<ObjectRef> = HashSet::new();
        if let Some(r) = root_ref {
            visited.insert(r);
        }
        Self::walk(xref, &root, root_ref, &mut visited, &mut leaves, 0)?;

        Ok(PageTree { leaves })
    }

    fn walk(
        xref: &mut XRef,
        node: &Dict,
        node_ref: Option<ObjectRef>,
        visited: &mut HashSet<ObjectRef>,
        leaves: &mut Vec<(Option<ObjectRef>, Dict)>,
        depth: usize,
    ) -> PdfResult<()> {
        if depth > MAX_TREE_DEPTH {
            return Err(PdfError::corrupt("page tree exceeds depth limit"));
        }

        let node_type = node.get("Type").and_then(Object::as_name);
        let has_kids = node.contains_key("Kids");

        if node_type == Some("Page") || (node_type.is_none() && !has_kids) {
            // A leaf. Tolerate missing /Type on leaves; plenty of writers
            // omit it.
            leaves.push((node_ref, node.clone()));
            return Ok(());
        }

        let kids = match node.get("Kids") {
            Some(k) => xref.resolve(k)?,
            None => {
                log::warn!("pages node without /Kids, skipping");
                return Ok(());
            }
        };
        let kids = match kids {
            Object::Array(a) => a,
            _ => {
                log::warn!("/Kids is not an array, skipping node");
                return Ok(());
            }
        };

        for kid in kids {
            let kid_ref = kid.as_reference();
            if let Some(r) = kid_ref {
                if !visited.insert(r) {
                    return Err(PdfError::corrupt(format!(
                        "page tree cycle through {} {} R",
                        r.num, r.gen
                    )));
                }
            }
            match xref.resolve(&kid)? {
                Object::Dictionary(d) => {
                    Self::walk(xref, &d, kid_ref, visited, leaves, depth + 1)?;
                }
                Object::Null => {
                    log::warn!("null kid in page tree, skipping");
                }
                _ => {
                    log::warn!("non-dictionary kid in page tree, skipping");
                }
            }
        }
        Ok(())
    }

    pub fn page_count(&self) -> usize {
        self.leaves.len()
    }

    /// Resolves a page by index into a [`Page`] with inherited attributes.
    pub fn page(&self, xref: &mut XRef, index: usize) -> PdfResult<Page> {
        let (object_ref, dict) = self
            .leaves
            .get(index)
            .cloned()
            .ok_or(PdfError::IndexOutOfRange {
                index,
                count: self.leaves.len(),
            })?;

        let media_box = inherited(xref, &dict, "MediaBox")?
            .as_ref()
            .and_then(rect_from_object)
            .unwrap_or(DEFAULT_MEDIA_BOX);

        let rotate = inherited(xref, &dict, "Rotate")?
            .and_then(|o| o.as_int())
            .map(normalize_rotation)
            .unwrap_or(0);

        let resources = match inherited(xref, &dict, "Resources")? {
            Some(obj) => match xref.resolve(&obj)? {
                Object::Dictionary(d) => Some(d),
                _ => None,
            },
            None => None,
        };

        Ok(Page {
            index,
            dict,
            object_ref,
            media_box,
            rotate,
            resources,
        })
    }

    /// Flattened index of the page with the given object reference, used
    /// when resolving link destinations.
    pub fn index_of(&self, r: ObjectRef) -> Option<usize> {
        self.leaves
            .iter()
            .position(|(leaf_ref, _)| *leaf_ref == Some(r))
    }
}

/// Resolves an inheritable attribute: the page's own value, else the
/// nearest ancestor's, following /Parent with a cycle guard.
fn inherited(xref: &mut XRef, dict: &Dict, key: &str) -> PdfResult<Option<Object>> {
    let mut current = dict.clone();
    let mut visited: HashSet<ObjectRef> = HashSet::new();

    for _ in 0..MAX_PARENT_DEPTH {
        if let Some(value) = current.get(key) {
            return Ok(Some(xref.resolve(value)?));
        }
        let parent = match current.get("Parent") {
            Some(p) => p.clone(),
            None => return Ok(None),
        };
        if let Some(r) = parent.as_reference() {
            if !visited.insert(r) {
                log::warn!("parent chain cycle while inheriting /{key}");
                return Ok(None);
            }
        }
        current = match xref.resolve(&parent)? {
            Object::Dictionary(d) => d,
            _ => return Ok(None),
        };
    }
    log::warn!("parent chain exceeded depth limit while inheriting /{key}");
    Ok(None)
}

/// Normalizes a rectangle array into [min_x, min_y, max_x, max_y].
fn rect_from_object(obj: &Object) -> Option<[f64; 4]> {
    let arr = obj.as_array()?;
    if arr.len() < 4 {
        return None;
    }
    let mut v = [0.0f64; 4];
    for (i, item) in arr.iter().take(4).enumerate() {
        v[i] = item.as_number()?;
    }
    Some([
        v[0].min(v[2]),
        v[1].min(v[3]),
        v[0].max(v[2]),
        v[1].max(v[3]),
    ])
}

/// Clamps /Rotate to a multiple of 90 in [0, 360).
fn normalize_rotation(rotate: i64) -> i32 {
    let r = rotate as i32;
    if r % 90 != 0 {
        return 0;
    }
    ((r % 360) + 360) % 360
}
