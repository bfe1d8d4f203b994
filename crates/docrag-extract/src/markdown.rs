use regex::Regex;
use std::sync::OnceLock;

use docrag_core::traits::TextExtractor;
use docrag_core::types::PageText;
use docrag_core::{Error, Result};

use crate::single_page;

/// Markdown with markup stripped down to readable prose.
pub struct MarkdownExtractor;

struct Rules {
    fence: Regex,
    image: Regex,
    link: Regex,
    heading: Regex,
    quote: Regex,
    bullet: Regex,
    emphasis: Regex,
    underscore: Regex,
    code: Regex,
    html: Regex,
    rule: Regex,
    blank_run: Regex,
}

impl Rules {
    fn compile() -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            fence: Regex::new(r"(?m)^[ \t]*(```|~~~).*$")?,
            image: Regex::new(r"!\[([^\]]*)\]\([^)]*\)")?,
            link: Regex::new(r"\[([^\]]+)\]\([^)]*\)")?,
            heading: Regex::new(r"(?m)^[ \t]{0,3}#{1,6}[ \t]+")?,
            quote: Regex::new(r"(?m)^[ \t]*>[ \t]?")?,
            bullet: Regex::new(r"(?m)^[ \t]*(?:[-*+]|\d+[.)])[ \t]+")?,
            emphasis: Regex::new(r"(\*\*|\*|~~)([^*~\n]+)(\*\*|\*|~~)")?,
            // `_` is a word char, so `\b` only holds where the delimiter
            // does not sit inside an identifier like `foo_bar`.
            underscore: Regex::new(r"\b(__|_)([^_\n]+)(__|_)\b")?,
            code: Regex::new(r"`([^`]*)`")?,
            html: Regex::new(r"</?[A-Za-z][^>]*>")?,
            rule: Regex::new(r"(?m)^[ \t]*([-*_][ \t]*){3,}$")?,
            blank_run: Regex::new(r"\n{3,}")?,
        })
    }
}

fn rules() -> Result<&'static Rules> {
    static RULES: OnceLock<std::result::Result<Rules, regex::Error>> = OnceLock::new();
    RULES
        .get_or_init(Rules::compile)
        .as_ref()
        .map_err(|e| Error::Extraction(format!("markdown rules: {e}")))
}

pub fn strip_markdown(source: &str) -> Result<String> {
    let r = rules()?;
    let text = r.fence.replace_all(source, "");
    let text = r.rule.replace_all(&text, "");
    let text = r.image.replace_all(&text, "$1");
    let text = r.link.replace_all(&text, "$1");
    let text = r.heading.replace_all(&text, "");
    let text = r.quote.replace_all(&text, "");
    let text = r.bullet.replace_all(&text, "");
    let text = r.emphasis.replace_all(&text, "$2");
    let text = r.underscore.replace_all(&text, "$2");
    let text = r.code.replace_all(&text, "$1");
    let text = r.html.replace_all(&text, "");
    let joined = text.lines().map(str::trim_end).collect::<Vec<_>>().join("\n");
    Ok(r.blank_run.replace_all(&joined, "\n\n").trim().to_string())
}

impl TextExtractor for MarkdownExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<PageText>> {
        Ok(single_page(strip_markdown(&String::from_utf8_lossy(bytes))?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_headings_emphasis_and_links() {
        let md = "# Water\n\nThe **pump** runs on _solar_ power. See [the manual](http://x/y.pdf).\n";
        assert_eq!(strip_markdown(md).unwrap(), "Water\n\nThe pump runs on solar power. See the manual.");
    }

    #[test]
    fn underscores_inside_identifiers_survive() {
        let md = "Set foo_bar_baz and __init__ but keep _this_ plain, (_also_) too.";
        assert_eq!(strip_markdown(md).unwrap(), "Set foo_bar_baz and init but keep this plain, (also) too.");
    }

    #[test]
    fn strips_lists_quotes_code_and_html() {
        let md = "> Note\n\n- first `item`\n2. second <b>item</b>\n\n```rust\nlet x = 1;\n```\n---\n![diagram](d.png)";
        let text = strip_markdown(md).unwrap();
        assert_eq!(text, "Note\n\nfirst item\nsecond item\n\nlet x = 1;\n\ndiagram");
    }

    #[test]
    fn single_page_one() {
        let pages = MarkdownExtractor.extract(b"## Title\nBody.").unwrap();
        assert_eq!(pages, vec![PageText::new("Title\nBody.", Some(1))]);
    }
}
