use regex::Regex;

use crate::app::Result;

/// Compiled clean-up expressions applied to extracted entry content.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    script: Regex,
    space_after_tag: Regex,
    space_before_tag: Regex,
    page_title: Regex,
}

impl Sanitizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            script: Regex::new(r"(?is)<script.*?</script>")?,
            space_after_tag: Regex::new(r">\s+")?,
            space_before_tag: Regex::new(r"\s+<")?,
            page_title: Regex::new(
                r"(?is)<\s*html.*?<\s*head.*?<\s*title[^>]*>(?P<title>.+?)</\s*title",
            )?,
        })
    }

    /// Drop `<script>` elements.
    pub fn remove_junk(&self, content: &str) -> String {
        self.script.replace_all(content, "").into_owned()
    }

    /// Collapse whitespace next to tag boundaries.
    pub fn minify(&self, content: &str) -> String {
        let content = self.space_after_tag.replace_all(content, ">");
        self.space_before_tag.replace_all(&content, "<").into_owned()
    }

    pub fn clean(&self, content: &str) -> String {
        self.minify(&self.remove_junk(content)).trim().to_string()
    }

    /// Text of the page's `<title>` element.
    pub fn page_title(&self, html: &str) -> Option<String> {
        self.page_title
            .captures(html)
            .and_then(|caps| caps.name("title"))
            .map(|m| html_escape::decode_html_entities(m.as_str().trim()).into_owned())
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_script_spans() {
        let s = Sanitizer::new().unwrap();
        let content = "<p>a</p><script type=\"text/javascript\">\nvar x = 1;\n</script><p>b</p><SCRIPT>y()</SCRIPT>";
        assert_eq!(s.remove_junk(content), "<p>a</p><p>b</p>");
    }

    #[test]
    fn test_minify_whitespace_at_tags() {
        let s = Sanitizer::new().unwrap();
        assert_eq!(
            s.minify("<div>\n   <p>hello world</p>\n</div>"),
            "<div><p>hello world</p></div>"
        );
    }

    #[test]
    fn test_clean_combines_both() {
        let s = Sanitizer::new().unwrap();
        assert_eq!(
            s.clean("  <p> text </p>\n<script>\nalert(1)\n</script>\n "),
            "<p>text</p>"
        );
    }

    #[test]
    fn test_page_title() {
        let s = Sanitizer::new().unwrap();
        let html = "<!DOCTYPE html>\n<HTML lang=\"en\"><head>\n<meta charset=\"utf-8\">\n<title>\n Tom &amp; Jerry News </title></head><body><title>no</title></body></html>";
        assert_eq!(s.page_title(html), Some("Tom & Jerry News".to_string()));
        assert_eq!(s.page_title("<p>no head</p>"), None);
    }
}
