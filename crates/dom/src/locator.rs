//! Structural element addressing.
//!
//! A path identifies an element by its position in the tree alone, so the
//! same path resolves to "the same" element on any client rendering a
//! structurally identical document. Segments are `tag[index]` with a 1-based
//! index among preceding same-tag siblings, the index omitted when it is 1.

use ego_tree::{NodeId, Tree};

use crate::page::Element;

/// Compute the structural path of an element, e.g. `/html/body/button[2]`.
///
/// Returns `None` for the document node itself or an id from another tree.
pub fn locate(tree: &Tree<Element>, id: NodeId) -> Option<String> {
    let mut segments = Vec::new();
    let mut node = tree.get(id)?;
    while node.value().is_element() {
        let tag = node.value().tag.clone();
        let mut index = 1usize;
        for sibling in node.prev_siblings() {
            // Only element nodes live in this tree, so the document-type
            // exclusion of the DOM algorithm holds by construction.
            if sibling.value().tag == tag {
                index += 1;
            }
        }
        if index > 1 {
            segments.push(format!("{tag}[{index}]"));
        } else {
            segments.push(tag);
        }
        node = match node.parent() {
            Some(parent) => parent,
            None => break,
        };
    }
    if segments.is_empty() {
        return None;
    }
    segments.reverse();
    Some(format!("/{}", segments.join("/")))
}

/// Resolve a structural path against the local document.
///
/// `None` is an expected, non-fatal outcome: the path was computed on a
/// document this client does not structurally match (DOM drift).
pub fn resolve(tree: &Tree<Element>, path: &str) -> Option<NodeId> {
    let path = path.strip_prefix('/')?;
    if path.is_empty() {
        return None;
    }
    let mut current = tree.root();
    for segment in path.split('/') {
        let (tag, index) = parse_segment(segment)?;
        let mut seen = 0usize;
        let mut found = None;
        for child in current.children() {
            if child.value().tag == tag {
                seen += 1;
                if seen == index {
                    found = Some(child);
                    break;
                }
            }
        }
        current = found?;
    }
    Some(current.id())
}

/// Split `tag[3]` into `("tag", 3)`; a bare `tag` is index 1.
fn parse_segment(segment: &str) -> Option<(&str, usize)> {
    if let Some(open) = segment.find('[') {
        let tag = &segment[..open];
        let index = segment[open + 1..].strip_suffix(']')?.parse::<usize>().ok()?;
        if tag.is_empty() || index == 0 {
            return None;
        }
        Some((tag, index))
    } else if segment.is_empty() {
        None
    } else {
        Some((segment, 1))
    }
}
