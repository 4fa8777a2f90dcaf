//! Platform markup sanitizer
//!
//! Rewrites generated HTML into the subset the platform editor accepts:
//! only allowlisted tags, filtered attributes, `!important` inline styles,
//! no structural whitespace and no emoji. The transformation is total and
//! idempotent.
//!
//! # Examples
//!
//! ```
//! use wechat_draft_publisher::content::sanitize;
//!
//! let html = r#"<div style="color:red">Hi<script>evil()</script></div>"#;
//! assert_eq!(
//!     sanitize(html),
//!     r#"<p style="color:red !important;text-indent:0 !important;">Hi</p>"#
//! );
//! ```

use super::html::{self, Element, Node, append_node};
use super::style::sanitize_style;
use super::tags::{self, TagDisposition};
use tracing::debug;

/// Sanitize an HTML fragment for the platform editor
pub fn sanitize(input: &str) -> String {
    let nodes = html::parse(input);
    let mut nodes = sanitize_nodes(nodes);
    vacuum(&mut nodes, None);

    let output = html::serialize(&nodes);
    debug!(
        input_bytes = input.len(),
        output_bytes = output.len(),
        "Sanitized article content"
    );
    output
}

fn sanitize_nodes(nodes: Vec<Node>) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());

    for node in nodes {
        match node {
            Node::Text(text) => html::append_text(&mut out, &strip_emoji(&text)),
            Node::Element(element) => sanitize_element(element, &mut out),
            Node::Comment(_) => {}
        }
    }

    out
}

fn sanitize_element(element: Element, out: &mut Vec<Node>) {
    let name = match tags::classify(&element.name) {
        TagDisposition::Drop => return,
        TagDisposition::Unwrap => {
            for child in sanitize_nodes(element.children) {
                append_node(out, child);
            }
            return;
        }
        TagDisposition::Keep => element.name.clone(),
        TagDisposition::Rename(target) => target.to_string(),
        TagDisposition::Paragraph => "p".to_string(),
    };

    let mut children = if html::is_void(&name) {
        Vec::new()
    } else {
        sanitize_nodes(element.children)
    };

    // Tables hold rows only and rows hold cells only
    match name.as_str() {
        "table" => children.retain(|child| is_element_named(child, "tr")),
        "tr" => children.retain(|child| is_element_named(child, "td")),
        _ => {}
    }

    // Paragraphs never nest and never hold tables, at any depth
    if name == "p" && contains_paragraph_breaker(&children) {
        for child in children {
            append_node(out, child);
        }
        return;
    }

    let attrs = sanitize_attributes(&name, element.attrs);
    out.push(Node::Element(Element {
        name,
        attrs,
        children,
    }));
}

fn is_element_named(node: &Node, name: &str) -> bool {
    matches!(node, Node::Element(e) if e.name == name)
}

fn contains_paragraph_breaker(nodes: &[Node]) -> bool {
    nodes.iter().any(|node| match node {
        Node::Element(e) => {
            tags::breaks_paragraph(&e.name) || contains_paragraph_breaker(&e.children)
        }
        _ => false,
    })
}

fn sanitize_attributes(tag: &str, attrs: Vec<(String, String)>) -> Vec<(String, String)> {
    let allowed = tags::allowed_attributes(tag);
    let mut out: Vec<(String, String)> = Vec::new();

    for (name, value) in attrs {
        if !allowed.contains(&name.as_str()) {
            continue;
        }

        let value = match name.as_str() {
            "style" => sanitize_style(&value, tag),
            "href" | "src" if tags::is_script_url(&value) => continue,
            "alt" | "title" => strip_emoji(&value),
            _ => value,
        };

        if name == "style" && value.is_empty() {
            continue;
        }
        out.push((name, value));
    }

    if tag == "p" && !out.iter().any(|(name, _)| name == "style") {
        out.push(("style".to_string(), sanitize_style("", "p")));
    }

    out
}

/// Remove whitespace-only text that only carries source indentation
///
/// Inside tables and rows every such text goes. Elsewhere, including the top
/// level, it goes only when it touches a block, so the space between two
/// inline elements survives.
fn vacuum(nodes: &mut Vec<Node>, parent: Option<&str>) {
    for node in nodes.iter_mut() {
        if let Node::Element(element) = node {
            vacuum(&mut element.children, Some(element.name.as_str()));
        }
    }

    let structural_parent = matches!(parent, Some("table") | Some("tr"));
    let view: &[Node] = nodes;

    let removable: Vec<bool> = view
        .iter()
        .enumerate()
        .map(|(i, node)| match node {
            Node::Text(text) if is_blank(text) => {
                structural_parent
                    || is_block_at(view, i.checked_sub(1))
                    || is_block_at(view, Some(i + 1))
            }
            _ => false,
        })
        .collect();

    let mut flags = removable.into_iter();
    nodes.retain(|_| !flags.next().unwrap_or(false));
}

/// Whitespace in the HTML sense; a no-break space is content
fn is_blank(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii_whitespace())
}

fn is_block_at(nodes: &[Node], index: Option<usize>) -> bool {
    index
        .and_then(|i| nodes.get(i))
        .is_some_and(|n| matches!(n, Node::Element(e) if tags::is_block(&e.name)))
}

/// Whether `c` is an emoji or decorative pictograph
fn is_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x1F000..=0x1FAFF
            | 0x2600..=0x27BF
            | 0x2B00..=0x2BFF
            | 0x2300..=0x23FF
            | 0xFE0E..=0xFE0F
            | 0x200D
            | 0x20E3
            | 0xE0020..=0xE007F
            | 0x3030
            | 0x303D
            | 0x3297
            | 0x3299
    )
}

/// Delete emoji and their joiners and variation selectors
pub fn strip_emoji(text: &str) -> String {
    text.chars().filter(|c| !is_emoji(*c)).collect()
}
