//! Cover image removal
//!
//! When the cover is uploaded from its own file, the generator's copy of it
//! in the body is removed so it does not show twice. An image counts as the
//! cover when its source is `cover.png` (or `.jpg`, `.jpeg`, `.gif`), or when
//! its alt or title text mentions 封面. The first image placed right after a
//! comment mentioning 标题 is removed as well.

use super::html::{self, Element, Node};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

lazy_static! {
    static ref COVER_SOURCE_REGEX: Regex =
        Regex::new(r"(?i)^(?:\./)?cover\.(?:png|jpe?g|gif)$").unwrap();
}

/// Marks an image as the cover in its alt or title text
const COVER_MARKER: &str = "封面";
/// Marks the comment placed before the title image
const TITLE_MARKER: &str = "标题";

/// Remove the cover image from `content`
///
/// Returns `content` unchanged when no image qualifies.
pub fn remove_cover_image(content: &str) -> String {
    let mut nodes = html::parse(content);

    let mut removed = remove_marked_images(&mut nodes);
    if remove_image_after_title_comment(&mut nodes) {
        removed += 1;
    }

    if removed == 0 {
        return content.to_string();
    }

    debug!(removed, "Removed cover image from article body");
    html::serialize(&nodes)
}

fn is_cover_image(element: &Element) -> bool {
    if element.name != "img" {
        return false;
    }

    element
        .attr("src")
        .is_some_and(|src| COVER_SOURCE_REGEX.is_match(src.trim()))
        || element.attr("alt").is_some_and(|alt| alt.contains(COVER_MARKER))
        || element.attr("title").is_some_and(|title| title.contains(COVER_MARKER))
}

fn remove_marked_images(nodes: &mut Vec<Node>) -> usize {
    let before = nodes.len();
    nodes.retain(|node| !matches!(node, Node::Element(e) if is_cover_image(e)));
    let mut removed = before - nodes.len();

    for node in nodes.iter_mut() {
        if let Node::Element(element) = node {
            removed += remove_marked_images(&mut element.children);
        }
    }

    removed
}

/// Remove the first image, in document order, that follows a title comment
/// with nothing but whitespace in between
fn remove_image_after_title_comment(nodes: &mut Vec<Node>) -> bool {
    let mut after_title = false;
    let mut index = 0;

    while index < nodes.len() {
        let is_target =
            after_title && matches!(&nodes[index], Node::Element(e) if e.name == "img");
        if is_target {
            nodes.remove(index);
            return true;
        }

        match &mut nodes[index] {
            Node::Comment(text) => after_title = text.contains(TITLE_MARKER),
            Node::Text(text) if text.trim().is_empty() => {}
            Node::Text(_) => after_title = false,
            Node::Element(element) => {
                if remove_image_after_title_comment(&mut element.children) {
                    return true;
                }
                after_title = false;
            }
        }
        index += 1;
    }

    false
}
