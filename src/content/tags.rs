//! Element allowlist of the platform editor

/// Tags that may appear in sanitized output
pub const ALLOWED_TAGS: &[&str] = &[
    "p", "br", "strong", "em", "span", "img", "a", "table", "tr", "td",
];

/// What the sanitizer does with an element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagDisposition {
    /// Allowed as is
    Keep,
    /// Replaced by an allowed tag with the same meaning
    Rename(&'static str),
    /// Layout container, becomes a paragraph unless it holds blocks
    Paragraph,
    /// Element removed, children kept
    Unwrap,
    /// Element removed together with its content
    Drop,
}

pub fn classify(name: &str) -> TagDisposition {
    match name {
        "p" | "br" | "strong" | "em" | "span" | "img" | "a" | "table" | "tr" | "td" => {
            TagDisposition::Keep
        }

        "b" => TagDisposition::Rename("strong"),
        "i" => TagDisposition::Rename("em"),
        "th" => TagDisposition::Rename("td"),
        "font" | "u" | "code" | "small" | "mark" | "sub" | "sup" | "s" | "del" | "ins" => {
            TagDisposition::Rename("span")
        }

        "div" | "section" | "article" | "header" | "footer" | "main" | "aside" | "nav"
        | "figure" | "figcaption" | "blockquote" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
        | "li" | "dd" | "dt" | "pre" | "center" | "address" => TagDisposition::Paragraph,

        "script" | "style" | "noscript" | "template" | "head" | "title" | "meta" | "link"
        | "base" | "iframe" | "object" | "embed" | "svg" | "canvas" | "video" | "audio"
        | "form" | "input" | "button" | "select" | "textarea" | "plaintext" | "hr" | "col"
        | "colgroup" => {
            TagDisposition::Drop
        }

        // html, body, ul, ol, dl, thead, tbody, tfoot, caption and unknown tags
        _ => TagDisposition::Unwrap,
    }
}

/// Whether an allowed tag is block-level
pub fn is_block(name: &str) -> bool {
    matches!(name, "p" | "table" | "tr" | "td")
}

/// Whether a paragraph may not contain this tag
pub fn breaks_paragraph(name: &str) -> bool {
    matches!(name, "p" | "table")
}

/// Attributes kept on an allowed tag
pub fn allowed_attributes(tag: &str) -> &'static [&'static str] {
    match tag {
        "br" => &[],
        "img" => &["src", "alt", "style"],
        "a" => &["href", "title", "style"],
        "td" => &["colspan", "rowspan", "style"],
        _ => &["style"],
    }
}

/// Whether a link or image target uses a scripting scheme
pub fn is_script_url(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();

    compact.starts_with("javascript:") || compact.starts_with("vbscript:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_tags_are_kept() {
        for tag in ALLOWED_TAGS {
            assert_eq!(classify(tag), TagDisposition::Keep, "{}", tag);
        }
    }

    #[test]
    fn test_renames_target_allowed_tags() {
        for tag in ["b", "i", "th", "font", "u", "code", "sup", "del"] {
            match classify(tag) {
                TagDisposition::Rename(target) => assert!(ALLOWED_TAGS.contains(&target)),
                other => panic!("{} classified as {:?}", tag, other),
            }
        }
    }

    #[test]
    fn test_layout_and_dangerous_tags() {
        assert_eq!(classify("div"), TagDisposition::Paragraph);
        assert_eq!(classify("h2"), TagDisposition::Paragraph);
        assert_eq!(classify("script"), TagDisposition::Drop);
        assert_eq!(classify("iframe"), TagDisposition::Drop);
        assert_eq!(classify("ul"), TagDisposition::Unwrap);
        assert_eq!(classify("marquee"), TagDisposition::Unwrap);
    }

    #[test]
    fn test_allowed_attributes() {
        assert!(allowed_attributes("br").is_empty());
        assert!(allowed_attributes("img").contains(&"src"));
        assert!(!allowed_attributes("p").contains(&"class"));
        assert!(allowed_attributes("td").contains(&"colspan"));
    }

    #[test]
    fn test_script_urls() {
        assert!(is_script_url("javascript:alert(1)"));
        assert!(is_script_url("  JavaScript :alert(1)"));
        assert!(is_script_url("java\tscript:alert(1)"));
        assert!(!is_script_url("https://example.com/javascript:"));
        assert!(!is_script_url("./pic.png"));
    }
}
