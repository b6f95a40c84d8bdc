//! Minimal markup to HTML preview renderer.
//!
//! # Responsibility
//! - Render the small markup subset memos use (code, emphasis, images,
//!   links, bare URLs, `- ` lists, `#` headings) into preview HTML.
//!
//! # Invariants
//! - Input is HTML-escaped before any rule runs, so raw tags in memo text
//!   never reach the output unescaped.
//! - Rules run in a fixed order; images are handled before links.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static CODE_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(.*?)```").expect("valid code block regex"));
static INLINE_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([^`]+)`").expect("valid inline code regex"));
static BOLD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid bold regex"));
static ITALIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.+?)\*").expect("valid italic regex"));
static IMAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").expect("valid image regex"));
static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(.+?)\]\((.+?)\)").expect("valid link regex"));
// Group 1 marks URLs already inside an attribute or anchor text.
static BARE_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(href="|src="|">)?(https?://[^\s<>"]+)"#).expect("valid bare url regex")
});
static LIST_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^- (.+)$").expect("valid list item regex"));
static LIST_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)(<li>.*</li>)").expect("valid list block regex"));
static H3_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^### (.+)$").expect("valid h3 regex"));
static H2_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^## (.+)$").expect("valid h2 regex"));
static H1_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^# (.+)$").expect("valid h1 regex"));

/// Renders memo markup as preview HTML.
pub fn render_preview(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let html = escape_html(text);
    let html = CODE_BLOCK_RE.replace_all(&html, "<pre><code>${1}</code></pre>");
    let html = INLINE_CODE_RE.replace_all(&html, "<code>${1}</code>");
    let html = BOLD_RE.replace_all(&html, "<strong>${1}</strong>");
    let html = ITALIC_RE.replace_all(&html, "<em>${1}</em>");
    let html = IMAGE_RE.replace_all(
        &html,
        r#"<img src="${2}" alt="${1}" class="memo-image" loading="lazy" />"#,
    );
    let html = LINK_RE.replace_all(&html, r#"<a href="${2}" target="_blank">${1}</a>"#);
    let html = BARE_URL_RE.replace_all(&html, |caps: &Captures<'_>| {
        if caps.get(1).is_some() {
            caps[0].to_string()
        } else {
            format!(r#"<a href="{0}" target="_blank">{0}</a>"#, &caps[2])
        }
    });
    let html = LIST_ITEM_RE.replace_all(&html, "<li>${1}</li>");
    let html = LIST_BLOCK_RE.replace(&html, "<ul>${1}</ul>");
    let html = H3_RE.replace_all(&html, "<h3>${1}</h3>");
    let html = H2_RE.replace_all(&html, "<h2>${1}</h2>");
    let html = H1_RE.replace_all(&html, "<h1>${1}</h1>");
    html.replace('\n', "<br>")
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::render_preview;

    #[test]
    fn empty_input_renders_nothing() {
        assert_eq!(render_preview(""), "");
    }

    #[test]
    fn emphasis_and_code() {
        assert_eq!(
            render_preview("**bold** and *it* with `x`"),
            "<strong>bold</strong> and <em>it</em> with <code>x</code>"
        );
        assert_eq!(
            render_preview("```\nfn main() {}\n```"),
            "<pre><code><br>fn main() {}<br></code></pre>"
        );
    }

    #[test]
    fn images_render_before_links() {
        assert_eq!(
            render_preview("![cat](https://e.com/c.png)"),
            r#"<img src="https://e.com/c.png" alt="cat" class="memo-image" loading="lazy" />"#
        );
        assert_eq!(
            render_preview("[doc](https://e.com/d)"),
            r#"<a href="https://e.com/d" target="_blank">doc</a>"#
        );
    }

    #[test]
    fn bare_urls_are_linked_once() {
        assert_eq!(
            render_preview("see https://e.com/x now"),
            r#"see <a href="https://e.com/x" target="_blank">https://e.com/x</a> now"#
        );
    }

    #[test]
    fn list_items_share_one_list_and_headings_render() {
        assert_eq!(
            render_preview("# Title\n- a\n- b"),
            "<h1>Title</h1><br><ul><li>a</li><br><li>b</li></ul>"
        );
        assert_eq!(render_preview("### small"), "<h3>small</h3>");
    }

    #[test]
    fn raw_html_is_escaped() {
        assert_eq!(
            render_preview("<script>alert('x')</script>"),
            "&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"
        );
    }
}
