//! Plain-text extraction for text, Markdown and HTML documents

use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use regex::Regex;
use scraper::{Html, Selector};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{Document, ExtractedDocument};

/// Format detected from a file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    /// Plain text
    Plain,
    /// Markdown
    Markdown,
    /// HTML
    Html,
}

impl TextFormat {
    /// Detect format from extension, `None` when unsupported
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "txt" | "text" => Some(Self::Plain),
            "md" | "markdown" => Some(Self::Markdown),
            "html" | "htm" => Some(Self::Html),
            _ => None,
        }
    }
}

/// Converts raw documents into plain text with a title
pub struct Extractor {
    horizontal_ws: Regex,
    blank_lines: Regex,
    title_selector: Selector,
    heading_selector: Selector,
    body_selector: Selector,
}

impl Extractor {
    /// Create a new extractor
    pub fn new() -> Result<Self> {
        let regex = |pattern: &str| {
            Regex::new(pattern).map_err(|e| Error::internal(format!("Invalid regex {}: {}", pattern, e)))
        };
        let selector = |css: &str| {
            Selector::parse(css).map_err(|e| Error::internal(format!("Invalid selector {}: {}", css, e)))
        };

        Ok(Self {
            horizontal_ws: regex(r"[ \t\u{a0}]+")?,
            blank_lines: regex(r"\n[ \t]*(\n[ \t]*)+")?,
            title_selector: selector("title")?,
            heading_selector: selector("h1, h2, h3")?,
            body_selector: selector("body")?,
        })
    }

    /// Extract text from a document
    ///
    /// Returns `Ok(None)` for unsupported file types.
    pub fn extract(&self, doc: &Document) -> Result<Option<ExtractedDocument>> {
        let format = match doc.extension().as_deref().and_then(TextFormat::from_extension) {
            Some(format) => format,
            None => {
                tracing::info!("Skipping '{}': unsupported file type", doc.file_name);
                return Ok(None);
            }
        };

        if doc.raw_text.contains('\0') {
            return Err(Error::extraction(&doc.file_name, "content looks binary (NUL bytes)"));
        }

        let (title, text) = match format {
            TextFormat::Plain => (None, doc.raw_text.clone()),
            TextFormat::Markdown => markdown_to_text(&doc.raw_text),
            TextFormat::Html => self.html_to_text(&doc.raw_text),
        };

        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| file_stem(&doc.file_name));

        Ok(Some(ExtractedDocument {
            id: doc.id,
            file_name: doc.file_name.clone(),
            title,
            text: self.normalize_whitespace(&text),
        }))
    }

    fn html_to_text(&self, html: &str) -> (Option<String>, String) {
        let document = Html::parse_document(html);

        let title = document
            .select(&self.title_selector)
            .next()
            .or_else(|| document.select(&self.heading_selector).next())
            .map(|el| el.text().collect::<String>());

        let mut text = String::new();
        if let Some(body) = document.select(&self.body_selector).next() {
            for node in body.descendants() {
                let Some(fragment) = node.value().as_text() else {
                    continue;
                };
                let hidden = node
                    .parent()
                    .and_then(|p| p.value().as_element().map(|e| e.name()))
                    .is_some_and(|name| matches!(name, "script" | "style" | "noscript"));
                if !hidden {
                    text.push_str(fragment);
                }
            }
        }

        (title, text)
    }

    fn normalize_whitespace(&self, text: &str) -> String {
        let text = text.replace("\r\n", "\n");
        let text = self.horizontal_ws.replace_all(&text, " ");
        self.blank_lines.replace_all(&text, "\n\n").trim().to_string()
    }
}

fn markdown_to_text(markdown: &str) -> (Option<String>, String) {
    let mut text = String::new();
    let mut title: Option<String> = None;
    let mut in_heading = false;
    let mut heading = String::new();

    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Heading { .. }) => {
                in_heading = true;
                heading.clear();
            }
            Event::End(TagEnd::Heading(_)) => {
                in_heading = false;
                if title.is_none() {
                    title = Some(heading.clone());
                }
                text.push_str("\n\n");
            }
            Event::Text(t) | Event::Code(t) => {
                if in_heading {
                    heading.push_str(&t);
                }
                text.push_str(&t);
            }
            Event::SoftBreak | Event::HardBreak => text.push('\n'),
            Event::End(TagEnd::Paragraph | TagEnd::Item | TagEnd::CodeBlock | TagEnd::BlockQuote(_)) => {
                text.push_str("\n\n");
            }
            _ => {}
        }
    }

    (title, text)
}

fn file_stem(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(file_name: &str, raw: &str) -> Option<ExtractedDocument> {
        Extractor::new().unwrap().extract(&Document::new(1, file_name, raw)).unwrap()
    }

    #[test]
    fn test_plain_text_passes_through() {
        let doc = extract("notes.txt", "  line one\r\n\r\n\r\n\tline   two ").unwrap();
        assert_eq!(doc.text, "line one\n\nline two");
        assert_eq!(doc.title, "notes");
    }

    #[test]
    fn test_markdown_strips_markup() {
        let doc = extract("guide.md", "# Setup Guide\n\nRun **cargo** `build`.\n\n- one\n- two\n").unwrap();
        assert_eq!(doc.title, "Setup Guide");
        assert!(doc.text.contains("Run cargo build."));
        assert!(!doc.text.contains("**"));
        assert!(!doc.text.contains('#'));
    }

    #[test]
    fn test_html_skips_scripts() {
        let html = r#"<html><head><title>Policy</title><style>p{}</style></head>
            <body><h1>Leave</h1><p>Staff get 20 days.</p><script>track()</script></body></html>"#;
        let doc = extract("policy.html", html).unwrap();
        assert_eq!(doc.title, "Policy");
        assert!(doc.text.contains("Staff get 20 days."));
        assert!(!doc.text.contains("track()"));
    }

    #[test]
    fn test_unsupported_extension_is_skipped() {
        assert!(extract("photo.png", "binary-ish").is_none());
        assert!(extract("Makefile", "all:").is_none());
    }

    #[test]
    fn test_binary_content_is_an_error() {
        let result = Extractor::new()
            .unwrap()
            .extract(&Document::new(3, "weird.txt", "abc\0def"));
        assert!(matches!(result, Err(Error::Extraction { .. })));
    }
}
