//! Locate and edit single fields of a tagged-text document in place.
//!
//! Documents are never re-serialised: edits are byte splices at the spans
//! reported by the pull parser, so everything outside the touched element
//! stays exactly as it was on disk.

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::ops::Range;

use crate::error::{Error, Result};

/// Position and text of one element inside a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    /// From `<` of the start tag through `>` of the end tag
    pub outer: Range<usize>,
    /// Content between the tags; empty for `<name/>`
    pub inner: Range<usize>,
    pub self_closing: bool,
    /// Unescaped text content
    pub text: String,
}

/// Find the first element called `name`, at any depth.
///
/// The whole document is read so that malformed input is reported even when
/// the element sits before the broken part.
pub fn find_element(content: &str, name: &str) -> Result<Option<Element>> {
    scan(content, |tag, _depth| tag == name.as_bytes())
}

/// The document's root element
pub fn root_element(content: &str) -> Result<Option<Element>> {
    scan(content, |_tag, depth| depth == 0)
}

fn scan<F>(content: &str, mut matches: F) -> Result<Option<Element>>
where
    F: FnMut(&[u8], usize) -> bool,
{
    // quick-xml drops a leading BOM without counting it in buffer_position,
    // so scan the body and shift every offset back onto `content`
    let (body, offset) = match content.strip_prefix('\u{feff}') {
        Some(body) => (body, content.len() - body.len()),
        None => (content, 0),
    };
    let mut reader = Reader::from_str(body);
    let mut depth = 0usize;
    let mut found: Option<Element> = None;
    // depth of the open element we are collecting text for
    let mut open: Option<usize> = None;

    loop {
        let event = reader.read_event()?;
        let end = reader.buffer_position() + offset;

        match event {
            Event::Start(e) => {
                if found.is_none() && open.is_none() && matches(e.name().as_ref(), depth) {
                    let start = tag_start(content, end);
                    found = Some(Element {
                        name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                        outer: start..end,
                        inner: end..end,
                        self_closing: false,
                        text: String::new(),
                    });
                    open = Some(depth);
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if found.is_none() && open.is_none() && matches(e.name().as_ref(), depth) {
                    let start = tag_start(content, end);
                    found = Some(Element {
                        name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                        outer: start..end,
                        inner: end..end,
                        self_closing: true,
                        text: String::new(),
                    });
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if open == Some(depth) {
                    if let Some(element) = found.as_mut() {
                        element.inner.end = tag_start(content, end);
                        element.outer.end = end;
                    }
                    open = None;
                }
            }
            Event::Text(t) => {
                if let (Some(_), Some(element)) = (open, found.as_mut()) {
                    // unknown entities (e.g. `&nbsp;` from scrapers) stay as written
                    match t.unescape() {
                        Ok(text) => element.text.push_str(&text),
                        Err(_) => element.text.push_str(&String::from_utf8_lossy(&t)),
                    }
                }
            }
            Event::CData(c) => {
                if let (Some(_), Some(element)) = (open, found.as_mut()) {
                    element.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(found)
}

/// `end` is just past the `>` of a tag; walk back to its `<`
fn tag_start(content: &str, end: usize) -> usize {
    content[..end].rfind('<').unwrap_or(0)
}

/// Replace the text content of `element`, keeping its tags and attributes.
pub fn replace_text(content: &str, element: &Element, value: &str) -> String {
    let escaped = escape(value);
    let mut out = String::with_capacity(content.len() + escaped.len());

    if element.self_closing {
        let open = content[element.outer.start..element.outer.end - 2].trim_end();
        out.push_str(&content[..element.outer.start]);
        out.push_str(open);
        out.push('>');
        out.push_str(&escaped);
        out.push_str("</");
        out.push_str(&element.name);
        out.push('>');
        out.push_str(&content[element.outer.end..]);
    } else {
        out.push_str(&content[..element.inner.start]);
        out.push_str(&escaped);
        out.push_str(&content[element.inner.end..]);
    }

    out
}

/// Render `<name>value</name>`
pub fn render_element(name: &str, value: &str) -> String {
    format!("<{name}>{}</{name}>", escape(value))
}

/// Insert `snippet` on its own line after `anchor`, indented like the anchor.
pub fn insert_after(content: &str, anchor: &Element, snippet: &str) -> String {
    let indent = line_indent(content, anchor.outer.start).unwrap_or("");
    let mut out = String::with_capacity(content.len() + snippet.len() + indent.len() + 1);
    out.push_str(&content[..anchor.outer.end]);
    out.push('\n');
    out.push_str(indent);
    out.push_str(snippet);
    out.push_str(&content[anchor.outer.end..]);
    out
}

/// Append `snippet` as the last child of the root element.
pub fn append_to_root(content: &str, snippet: &str) -> Result<String> {
    let root = root_element(content)?.ok_or_else(|| Error::MissingAnchor(snippet.to_string()))?;

    if root.self_closing {
        let open = content[root.outer.start..root.outer.end - 2].trim_end();
        return Ok(format!(
            "{}{}>{}</{}>{}",
            &content[..root.outer.start],
            open,
            snippet,
            root.name,
            &content[root.outer.end..]
        ));
    }

    // root.inner.end is where `</root>` begins
    let close = root.inner.end;
    let mut out = String::with_capacity(content.len() + snippet.len() + 8);
    match line_indent(content, close) {
        Some(indent) => {
            let line_start = close - indent.len();
            out.push_str(&content[..line_start]);
            out.push_str(indent);
            out.push_str("  ");
            out.push_str(snippet);
            out.push('\n');
            out.push_str(&content[line_start..]);
        }
        None => {
            out.push_str(&content[..close]);
            out.push_str(snippet);
            out.push_str(&content[close..]);
        }
    }
    Ok(out)
}

/// Leading whitespace of the line `pos` sits on, if only whitespace precedes it
fn line_indent(content: &str, pos: usize) -> Option<&str> {
    let line_start = content[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let prefix = &content[line_start..pos];
    if prefix.chars().all(|c| c == ' ' || c == '\t') {
        Some(prefix)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NFO: &str = "<?xml version=\"1.0\" encoding=\"utf-8\" standalone=\"yes\"?>\n<movie>\n  <title>Heat</title>\n  <releasedate>1995-12-15</releasedate>\n  <dateadded>2021-03-04 09:10:11</dateadded>\n</movie>\n";

    #[test]
    fn test_find_element_spans() {
        let el = find_element(NFO, "dateadded").unwrap().unwrap();
        assert_eq!(el.text, "2021-03-04 09:10:11");
        assert_eq!(&NFO[el.inner.clone()], "2021-03-04 09:10:11");
        assert_eq!(
            &NFO[el.outer.clone()],
            "<dateadded>2021-03-04 09:10:11</dateadded>"
        );
        assert!(find_element(NFO, "premiered").unwrap().is_none());
    }

    #[test]
    fn test_find_element_is_case_sensitive_and_first_wins() {
        let doc = "<Item><added>x</added><Added>one</Added><Added>two</Added></Item>";
        let el = find_element(doc, "Added").unwrap().unwrap();
        assert_eq!(el.text, "one");
    }

    #[test]
    fn test_find_element_unescapes_text() {
        let doc = "<movie><title>Tom &amp; Jerry</title></movie>";
        let el = find_element(doc, "title").unwrap().unwrap();
        assert_eq!(el.text, "Tom & Jerry");
    }

    #[test]
    fn test_find_element_keeps_unknown_entities() {
        let doc = "<movie><title>Am&eacute;lie&nbsp;(2001)</title></movie>";
        let el = find_element(doc, "title").unwrap().unwrap();
        assert_eq!(el.text, "Am&eacute;lie&nbsp;(2001)");
    }

    #[test]
    fn test_spans_account_for_bom() {
        let doc = "\u{feff}<?xml version=\"1.0\"?>\n<movie>\n  <dateadded>2021-01-01 00:00:00</dateadded>\n</movie>";
        let el = find_element(doc, "dateadded").unwrap().unwrap();
        assert_eq!(
            &doc[el.outer.clone()],
            "<dateadded>2021-01-01 00:00:00</dateadded>"
        );
        assert_eq!(&doc[el.inner.clone()], "2021-01-01 00:00:00");

        let out = replace_text(doc, &el, "2010-05-14 12:00:00");
        assert_eq!(out, doc.replace("2021-01-01 00:00:00", "2010-05-14 12:00:00"));
        assert!(out.starts_with('\u{feff}'));

        let root = root_element(doc).unwrap().unwrap();
        assert_eq!(root.name, "movie");
        assert!(doc[root.outer.clone()].starts_with("<movie>"));
        assert!(doc[root.outer.clone()].ends_with("</movie>"));
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        let doc = "<movie><title>Heat</title><plot>open</movie>";
        assert!(matches!(find_element(doc, "title"), Err(Error::Xml(_))));
    }

    #[test]
    fn test_replace_text_preserves_everything_else() {
        let el = find_element(NFO, "dateadded").unwrap().unwrap();
        let out = replace_text(NFO, &el, "1995-12-15 12:00:00");
        assert_eq!(
            out,
            NFO.replace("2021-03-04 09:10:11", "1995-12-15 12:00:00")
        );
    }

    #[test]
    fn test_replace_text_expands_self_closing() {
        let doc = "<movie>\n  <dateadded />\n</movie>";
        let el = find_element(doc, "dateadded").unwrap().unwrap();
        assert!(el.self_closing);
        let out = replace_text(doc, &el, "2000-01-01 12:00:00");
        assert_eq!(
            out,
            "<movie>\n  <dateadded>2000-01-01 12:00:00</dateadded>\n</movie>"
        );
    }

    #[test]
    fn test_insert_after_uses_anchor_indent() {
        let doc = "<movie>\n    <title>Heat</title>\n</movie>";
        let title = find_element(doc, "title").unwrap().unwrap();
        let out = insert_after(doc, &title, &render_element("dateadded", "v"));
        assert_eq!(
            out,
            "<movie>\n    <title>Heat</title>\n    <dateadded>v</dateadded>\n</movie>"
        );
    }

    #[test]
    fn test_append_to_root() {
        let doc = "<Title>\n  <LocalTitle>Heat</LocalTitle>\n</Title>\n";
        let out = append_to_root(doc, &render_element("Added", "v")).unwrap();
        assert_eq!(
            out,
            "<Title>\n  <LocalTitle>Heat</LocalTitle>\n  <Added>v</Added>\n</Title>\n"
        );

        let compact = "<Title><LocalTitle>Heat</LocalTitle></Title>";
        let out = append_to_root(compact, "<Added>v</Added>").unwrap();
        assert_eq!(out, "<Title><LocalTitle>Heat</LocalTitle><Added>v</Added></Title>");

        let empty = "<Title/>";
        let out = append_to_root(empty, "<Added>v</Added>").unwrap();
        assert_eq!(out, "<Title><Added>v</Added></Title>");
    }

    #[test]
    fn test_append_to_root_without_root() {
        assert!(matches!(
            append_to_root("   ", "<Added>v</Added>"),
            Err(Error::MissingAnchor(_))
        ));
    }
}
