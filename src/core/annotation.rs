//! Link annotation extraction.
//!
//! Walks a page's /Annots array and produces clickable regions: a
//! rectangle in page space plus either a URI or a resolved target page
//! index. Individual annotations that are malformed, cyclic or otherwise
//! unusable are skipped; one bad entry never suppresses its siblings.

use std::collections::HashSet;

use crate::core::error::PdfResult;
use crate::core::page::{Page, PageTree};
use crate::core::parser::{Dict, Object, ObjectRef};
use crate::core::xref::XRef;

/// Name-tree recursion cap (/Names /Dests can nest).
const MAX_NAME_TREE_DEPTH: usize = 32;

/// Where a link points.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkTarget {
    /// External URI.
    Uri(String),
    /// 0-based index of a page in this document.
    Page(u32),
}

/// A clickable region on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    /// [llx, lly, urx, ury] in page space, normalized.
    pub rect: [f32; 4],
    pub target: LinkTarget,
}

/// Extracts the link annotations of a page.
pub fn links_for_page(
    xref: &mut XRef,
    tree: &PageTree,
    page: &Page,
) -> PdfResult<Vec<Link>> {
    let annots = match page.annots() {
        Some(a) => xref.resolve(a)?,
        None => return Ok(Vec::new()),
    };
    let annots = match annots {
        Object::Array(a) => a,
        _ => return Ok(Vec::new()),
    };

    let mut links = Vec::new();
    let mut visited: HashSet<ObjectRef> = HashSet::new();

    for entry in annots {
        if let Some(r) = entry.as_reference() {
            if !visited.insert(r) {
                continue;
            }
        }
        let dict = match xref.resolve(&entry) {
            Ok(Object::Dictionary(d)) => d,
            Ok(_) => continue,
            Err(e) => {
                log::warn!("skipping unreadable annotation: {e}");
                continue;
            }
        };

        if dict.get("Subtype").and_then(Object::as_name) != Some("Link") {
            continue;
        }

        match link_from_dict(xref, tree, &dict) {
            Ok(Some(link)) => links.push(link),
            Ok(None) => {}
            Err(e) => {
                log::warn!("skipping malformed link annotation: {e}");
            }
        }
    }

    Ok(links)
}

fn link_from_dict(
    xref: &mut XRef,
    tree: &PageTree,
    dict: &Dict,
) -> PdfResult<Option<Link>> {
    let rect = match dict.get("Rect").map(|r| xref.resolve(r)).transpose()? {
        Some(obj) => match normalized_rect(&obj) {
            Some(r) => r,
            None => return Ok(None),
        },
        None => return Ok(None),
    };

    // /A action takes precedence over a bare /Dest.
    if let Some(action) = dict.get("A") {
        let action = xref.resolve(action)?;
        if let Some(action_dict) = action.as_dict() {
            match action_dict.get("S").and_then(Object::as_name) {
                Some("URI") => {
                    let uri = action_dict
                        .get("URI")
                        .map(|u| xref.resolve(u))
                        .transpose()?
                        .as_ref()
                        .and_then(Object::as_string_bytes)
                        .map(|b| String::from_utf8_lossy(b).into_owned());
                    if let Some(uri) = uri {
                        return Ok(Some(Link {
                            rect,
                            target: LinkTarget::Uri(uri),
                        }));
                    }
                    return Ok(None);
                }
                Some("GoTo") => {
                    if let Some(dest) = action_dict.get("D") {
                        let dest = dest.clone();
                        if let Some(index) = resolve_destination(xref, tree, &dest)? {
                            return Ok(Some(Link {
                                rect,
                                target: LinkTarget::Page(index),
                            }));
                        }
                    }
                    return Ok(None);
                }
                _ => return Ok(None),
            }
        }
        return Ok(None);
    }

    if let Some(dest) = dict.get("Dest") {
        let dest = dest.clone();
        if let Some(index) = resolve_destination(xref, tree, &dest)? {
            return Ok(Some(Link {
                rect,
                target: LinkTarget::Page(index),
            }));
        }
    }

    Ok(None)
}

/// Resolves a destination (explicit array, name, or string) to a page
/// index. Unresolvable destinations yield `None`, not an error.
fn resolve_destination(
    xref: &mut XRef,
    tree: &PageTree,
    dest: &Object,
) -> PdfResult<Option<u32>> {
    let dest = xref.resolve(dest)?;
    match dest {
        Object::Array(arr) => {
            let first = match arr.first() {
                Some(f) => f,
                None => return Ok(None),
            };
            match first {
                Object::Reference(r) => Ok(tree.index_of(*r).map(|i| i as u32)),
                // Remote-document destinations carry an integer here;
                // treat an in-range one as a direct page index.
                Object::Number(n) if *n >= 0.0 => {
                    let index = *n as usize;
                    Ok((index < tree.page_count()).then_some(index as u32))
                }
                _ => Ok(None),
            }
        }
        Object::Name(name) => resolve_named_destination(xref, tree, name.as_bytes()),
        Object::String(bytes) | Object::HexString(bytes) => {
            resolve_named_destination(xref, tree, &bytes)
        }
        _ => Ok(None),
    }
}

/// Looks a name up in the catalog's /Dests dictionary or the /Names
/// /Dests name tree.
fn resolve_named_destination(
    xref: &mut XRef,
    tree: &PageTree,
    name: &[u8],
) -> PdfResult<Option<u32>> {
    let catalog = xref.catalog()?;

    // Old-style /Dests dictionary in the catalog.
    if let Some(dests) = catalog.get("Dests") {
        let dests = dests.clone();
        if let Some(dests) = xref.resolve(&dests)?.as_dict() {
            if let Some(dest) = dests.get(&String::from_utf8_lossy(name).into_owned()) {
                let dest = dest.clone();
                return destination_value(xref, tree, &dest);
            }
        }
    }

    // /Names /Dests name tree.
    let names_root = catalog
        .get("Names")
        .cloned()
        .map(|n| xref.resolve(&n))
        .transpose()?
        .and_then(|n| n.as_dict().and_then(|d| d.get("Dests")).cloned());
    let node = match names_root {
        Some(n) => xref.resolve(&n)?,
        None => return Ok(None),
    };

    let mut visited = HashSet::new();
    lookup_name_tree(xref, tree, &node, name, &mut visited, 0)
}

fn lookup_name_tree(
    xref: &mut XRef,
    tree: &PageTree,
    node: &Object,
    name: &[u8],
    visited: &mut HashSet<ObjectRef>,
    depth: usize,
) -> PdfResult<Option<u32>> {
    if depth > MAX_NAME_TREE_DEPTH {
        log::warn!("name tree exceeds depth limit");
        return Ok(None);
    }
    let dict = match node.as_dict() {
        Some(d) => d.clone(),
        None => return Ok(None),
    };

    // Leaf: /Names is a flat [key1 value1 key2 value2 ...] array.
    if let Some(pairs) = dict.get("Names") {
        if let Object::Array(pairs) = xref.resolve(pairs)? {
            for pair in pairs.chunks(2) {
                if let [key, value] = pair {
                    if key.as_string_bytes() == Some(name) {
                        return destination_value(xref, tree, &value.clone());
                    }
                }
            }
        }
        return Ok(None);
    }

    // Interior node: recurse into /Kids.
    if let Some(kids) = dict.get("Kids") {
        if let Object::Array(kids) = xref.resolve(kids)? {
            for kid in kids {
                if let Some(r) = kid.as_reference() {
                    if !visited.insert(r) {
                        continue;
                    }
                }
                let kid = xref.resolve(&kid)?;
                if let Some(found) =
                    lookup_name_tree(xref, tree, &kid, name, visited, depth + 1)?
                {
                    return Ok(Some(found));
                }
            }
        }
    }
    Ok(None)
}

/// A named destination's value may be the array itself or a dictionary
/// with a /D entry.
fn destination_value(
    xref: &mut XRef,
    tree: &PageTree,
    value: &Object,
) -> PdfResult<Option<u32>> {
    let value = xref.resolve(value)?;
    match &value {
        Object::Array(_) => resolve_destination(xref, tree, &value),
        Object::Dictionary(d) => match d.get("D") {
            Some(inner) => resolve_destination(xref, tree, &inner.clone()),
            None => Ok(None),
        },
        _ => Ok(None),
    }
}

fn normalized_rect(obj: &Object) -> Option<[f32; 4]> {
    let arr = obj.as_array()?;
    if arr.len() < 4 {
        return None;
    }
    let mut v = [0.0f64; 4];
    for (i, item) in arr.iter().take(4).enumerate() {
        v[i] = item.as_number()?;
    }
    Some([
        v[0].min(v[2]) as f32,
        v[1].min(v[3]) as f32,
        v[0].max(v[2]) as f32,
        v[1].max(v[3]) as f32,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::page::tests::build_pdf;
    use crate::core::page::PageTree;
    use crate::core::xref::XRef;

    fn load(pdf: Vec<u8>) -> (XRef, PageTree) {
        let mut xref = XRef::parse(pdf).unwrap();
        let tree = PageTree::load(&mut xref).unwrap();
        (xref, tree)
    }

    #[test]
    fn uri_link() {
        let pdf = build_pdf(&[
            (1, "<< /Type /Catalog /Pages 2 0 R >>"),
            (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
            (
                3,
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Annots [4 0 R] >>",
            ),
            (
                4,
                "<< /Type /Annot /Subtype /Link /Rect [10 20 110 40] \
                 /A << /S /URI /URI (https://example.com/doc) >> >>",
            ),
        ]);
        let (mut xref, tree) = load(pdf);
        let page = tree.page(&mut xref, 0).unwrap();
        let links = links_for_page(&mut xref, &tree, &page).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].rect, [10.0, 20.0, 110.0, 40.0]);
        assert_eq!(
            links[0].target,
            LinkTarget::Uri("https://example.com/doc".into())
        );
    }

    #[test]
    fn goto_dest_resolves_page_index() {
        let pdf = build_pdf(&[
            (1, "<< /Type /Catalog /Pages 2 0 R >>"),
            (2, "<< /Type /Pages /Kids [3 0 R 5 0 R] /Count 2 >>"),
            (
                3,
                "<< /Type /Page /Parent 2 0 R /Annots [4 0 R] >>",
            ),
            (
                4,
                "<< /Type /Annot /Subtype /Link /Rect [0 0 100 100] \
                 /Dest [5 0 R /XYZ 0 792 null] >>",
            ),
            (5, "<< /Type /Page /Parent 2 0 R >>"),
        ]);
        let (mut xref, tree) = load(pdf);
        let page = tree.page(&mut xref, 0).unwrap();
        let links = links_for_page(&mut xref, &tree, &page).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, LinkTarget::Page(1));
    }

    #[test]
    fn named_destination_through_name_tree() {
        let pdf = build_pdf(&[
            (
                1,
                "<< /Type /Catalog /Pages 2 0 R /Names << /Dests 6 0 R >> >>",
            ),
            (2, "<< /Type /Pages /Kids [3 0 R 5 0 R] /Count 2 >>"),
            (3, "<< /Type /Page /Parent 2 0 R /Annots [4 0 R] >>"),
            (
                4,
                "<< /Type /Annot /Subtype /Link /Rect [0 0 50 50] \
                 /A << /S /GoTo /D (chapter2) >> >>",
            ),
            (5, "<< /Type /Page /Parent 2 0 R >>"),
            (
                6,
                "<< /Names [(chapter1) [3 0 R /Fit] (chapter2) [5 0 R /Fit]] >>",
            ),
        ]);
        let (mut xref, tree) = load(pdf);
        let page = tree.page(&mut xref, 0).unwrap();
        let links = links_for_page(&mut xref, &tree, &page).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, LinkTarget::Page(1));
    }

    #[test]
    fn malformed_annotation_does_not_suppress_siblings() {
        let pdf = build_pdf(&[
            (1, "<< /Type /Catalog /Pages 2 0 R >>"),
            (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
            (
                3,
                "<< /Type /Page /Parent 2 0 R /Annots [9 0 R 4 0 R 5 0 R] >>",
            ),
            // 4 has no /Rect; 9 does not exist at all.
            (
                4,
                "<< /Type /Annot /Subtype /Link /A << /S /URI /URI (x) >> >>",
            ),
            (
                5,
                "<< /Type /Annot /Subtype /Link /Rect [1 2 3 4] \
                 /A << /S /URI /URI (https://ok) >> >>",
            ),
        ]);
        let (mut xref, tree) = load(pdf);
        let page = tree.page(&mut xref, 0).unwrap();
        let links = links_for_page(&mut xref, &tree, &page).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, LinkTarget::Uri("https://ok".into()));
    }

    #[test]
    fn non_link_annotations_are_ignored() {
        let pdf = build_pdf(&[
            (1, "<< /Type /Catalog /Pages 2 0 R >>"),
            (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
            (3, "<< /Type /Page /Parent 2 0 R /Annots [4 0 R] >>"),
            (
                4,
                "<< /Type /Annot /Subtype /Text /Rect [0 0 10 10] /Contents (note) >>",
            ),
        ]);
        let (mut xref, tree) = load(pdf);
        let page = tree.page(&mut xref, 0).unwrap();
        assert!(links_for_page(&mut xref, &tree, &page).unwrap().is_empty());
    }
}
