//! Inline style filtering
//!
//! The platform editor overrides inline styles unless they are marked
//! `!important`, and it rejects animation, positioning and external
//! resources. Every surviving declaration is written as
//! `name:value !important;`.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref IMPORTANT_REGEX: Regex = Regex::new(r"(?i)\s*!\s*important\s*$").unwrap();
}

/// Declaration appended to every paragraph
pub const PARAGRAPH_INDENT: &str = "text-indent:0 !important;";

const ALLOWED_PROPERTIES: &[&str] = &[
    "font-size",
    "font-weight",
    "color",
    "line-height",
    "letter-spacing",
    "word-spacing",
    "text-align",
    "vertical-align",
    "background-color",
];

const FORBIDDEN_VALUE_MARKERS: &[&str] = &["url(", "expression(", "javascript:"];

fn is_allowed_property(name: &str, tag: &str) -> bool {
    ALLOWED_PROPERTIES.contains(&name)
        || name == "margin"
        || name.starts_with("margin-")
        || name == "padding"
        || name.starts_with("padding-")
        || name == "border"
        || name.starts_with("border-")
        || (name == "width" && tag == "img")
}

fn is_safe_value(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    let compact: String = lower.chars().filter(|c| !c.is_whitespace()).collect();
    !FORBIDDEN_VALUE_MARKERS
        .iter()
        .any(|marker| compact.contains(marker))
}

/// Filter a `style` attribute value for `tag`
///
/// Paragraphs always end with [`PARAGRAPH_INDENT`]; other tags may end up
/// with an empty string, meaning the attribute should be dropped.
pub fn sanitize_style(style: &str, tag: &str) -> String {
    let mut out = String::new();

    for declaration in style.split(';') {
        let Some((name, value)) = declaration.split_once(':') else {
            continue;
        };

        let name = name.trim().to_ascii_lowercase();
        let value = IMPORTANT_REGEX.replace(value.trim(), "");
        let value = value.trim();

        if value.is_empty() || !is_allowed_property(&name, tag) || !is_safe_value(value) {
            continue;
        }

        out.push_str(&name);
        out.push(':');
        out.push_str(value);
        out.push_str(" !important;");
    }

    if tag == "p" {
        out.push_str(PARAGRAPH_INDENT);
    }

    out
}
