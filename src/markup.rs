//! Minimal markup scanning.
//!
//! The runtime treats rendered markup as opaque text. It only needs to
//! answer three questions about it: which id does the outermost element
//! carry, where does the element with a given id start and end, and
//! which ids does a fragment contain. This is a tag tokenizer, not an
//! HTML parser: it assumes well-formed markup, understands quoted
//! attributes, comments, void elements, self-closing tags and raw-text
//! `<script>`/`<style>` bodies, and nothing else.

use std::ops::Range;

use crate::id::ComponentId;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Markup substituted for a component whose `render()` failed.
pub fn placeholder(id: ComponentId) -> String {
    format!("<div id=\"{id}\"></div>")
}

/// The `id` attribute of the first element in `markup`, if any.
///
/// Leading whitespace and comments are skipped. Returns `None` when the
/// fragment does not start with an element or that element has no id.
pub fn outer_id(markup: &str) -> Option<&str> {
    Tokens::new(markup).find_map(|token| match token {
        Token::Open(tag) => Some(tag.attr("id")),
        Token::Close { .. } => Some(None),
        Token::Skipped => None,
    })?
}

/// True when `markup` is a single element (plus surrounding whitespace)
/// whose id equals `id`.
pub fn has_single_root(markup: &str, id: &str) -> bool {
    let Some(span) = element_span(markup, id) else {
        return false;
    };
    outer_id(markup) == Some(id)
        && markup[..span.start].trim().is_empty()
        && markup[span.end..].trim().is_empty()
}

/// Byte range of the element whose `id` attribute equals `id`, from its
/// opening `<` to the end of its closing tag.
pub fn element_span(doc: &str, id: &str) -> Option<Range<usize>> {
    locate(doc, id).map(|found| found.outer)
}

/// Byte range of the content of the element whose `id` equals `id`:
/// everything between its opening and closing tags. Empty for void and
/// self-closing elements.
pub fn content_span(doc: &str, id: &str) -> Option<Range<usize>> {
    locate(doc, id).map(|found| found.inner)
}

struct Located {
    outer: Range<usize>,
    inner: Range<usize>,
}

fn locate(doc: &str, id: &str) -> Option<Located> {
    let mut tokens = Tokens::new(doc);
    let open = loop {
        match tokens.next()? {
            Token::Open(tag) if tag.attr("id") == Some(id) => break tag,
            _ => {}
        }
    };
    let content_start = open.span.end;
    if open.is_leaf() {
        return Some(Located {
            outer: open.span,
            inner: content_start..content_start,
        });
    }

    let mut depth = 1usize;
    for token in tokens {
        match token {
            Token::Open(tag) if !tag.is_leaf() => depth += 1,
            Token::Close { start, end } => {
                depth -= 1;
                if depth == 0 {
                    return Some(Located {
                        outer: open.span.start..end,
                        inner: content_start..start,
                    });
                }
            }
            _ => {}
        }
    }
    // Unterminated element extends to the end of the document.
    Some(Located {
        outer: open.span.start..doc.len(),
        inner: content_start..doc.len(),
    })
}

/// Every `id` attribute in `markup`, in document order.
pub fn ids(markup: &str) -> Vec<&str> {
    Tokens::new(markup)
        .filter_map(|token| match token {
            Token::Open(tag) => tag.attr("id"),
            _ => None,
        })
        .collect()
}

struct OpenTag<'a> {
    name: &'a str,
    attrs: &'a str,
    self_closing: bool,
    span: Range<usize>,
}

impl<'a> OpenTag<'a> {
    fn is_leaf(&self) -> bool {
        self.self_closing || VOID_ELEMENTS.iter().any(|v| self.name.eq_ignore_ascii_case(v))
    }

    fn attr(&self, wanted: &str) -> Option<&'a str> {
        Attrs { rest: self.attrs }
            .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
            .map(|(_, value)| value)
    }
}

enum Token<'a> {
    Open(OpenTag<'a>),
    Close { start: usize, end: usize },
    Skipped,
}

struct Tokens<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Tokens<'a> {
    fn new(src: &'a str) -> Self {
        Tokens { src, pos: 0 }
    }

    /// Index just past the next `>` outside quotes, starting at `from`.
    fn tag_end(&self, from: usize) -> usize {
        let bytes = self.src.as_bytes();
        let mut quote = None;
        let mut i = from;
        while i < bytes.len() {
            match (quote, bytes[i]) {
                (None, b'"' | b'\'') => quote = Some(bytes[i]),
                (Some(q), c) if c == q => quote = None,
                (None, b'>') => return i + 1,
                _ => {}
            }
            i += 1;
        }
        bytes.len()
    }

    fn skip_raw_text(&mut self, name: &str) {
        let closing = format!("</{name}");
        let lower = self.src[self.pos..].to_ascii_lowercase();
        self.pos = match lower.find(&closing) {
            Some(offset) => self.pos + offset,
            None => self.src.len(),
        };
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let start = self.pos + self.src[self.pos..].find('<')?;
        let rest = &self.src[start..];

        if rest.starts_with("<!--") {
            self.pos = match rest.find("-->") {
                Some(offset) => start + offset + 3,
                None => self.src.len(),
            };
            return Some(Token::Skipped);
        }

        if rest.starts_with("</") {
            let end = self.tag_end(start);
            self.pos = end;
            return Some(Token::Close { start, end });
        }

        let name_len = rest[1..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == ':'))
            .unwrap_or(rest.len() - 1);
        if name_len == 0 || !rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            // `<!doctype>`, `<?xml?>` or a stray `<` in text.
            self.pos = if rest[1..].starts_with(['!', '?']) {
                self.tag_end(start)
            } else {
                start + 1
            };
            return Some(Token::Skipped);
        }

        let end = self.tag_end(start);
        let name = &rest[1..1 + name_len];
        // An unterminated tag runs to the end of the input with no `>` to drop.
        let body = &self.src[start + 1 + name_len..end];
        let inner = body.strip_suffix('>').unwrap_or(body);
        let self_closing = inner.trim_end().ends_with('/');
        self.pos = end;

        if !self_closing && RAW_TEXT_ELEMENTS.iter().any(|r| name.eq_ignore_ascii_case(r)) {
            self.skip_raw_text(&name.to_ascii_lowercase());
        }

        Some(Token::Open(OpenTag {
            name,
            attrs: inner.trim_end().trim_end_matches('/'),
            self_closing,
            span: start..end,
        }))
    }
}

struct Attrs<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Attrs<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<(&'a str, &'a str)> {
        let s = self.rest.trim_start();
        if s.is_empty() {
            return None;
        }
        let name_end = s
            .find(|c: char| c.is_whitespace() || c == '=')
            .unwrap_or(s.len());
        let name = &s[..name_end];
        let after = s[name_end..].trim_start();

        let Some(value_src) = after.strip_prefix('=') else {
            // Boolean attribute.
            self.rest = after;
            return Some((name, ""));
        };
        let value_src = value_src.trim_start();
        let (value, rest) = match value_src.chars().next() {
            Some(q @ ('"' | '\'')) => match value_src[1..].find(q) {
                Some(close) => (&value_src[1..1 + close], &value_src[close + 2..]),
                None => (&value_src[1..], ""),
            },
            _ => {
                let end = value_src
                    .find(char::is_whitespace)
                    .unwrap_or(value_src.len());
                (&value_src[..end], &value_src[end..])
            }
        };
        self.rest = rest;
        Some((name, value))
    }
}
