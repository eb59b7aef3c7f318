//! Preview document
//!
//! Wraps a sanitized snapshot into the document loaded by the rendering
//! context: stylesheet imports first, the highlight style, an optional
//! fit-to-viewport transform, then the snapshot's own styles and body.

use scraper::{ElementRef, Html, Node};
use serde::{Deserialize, Serialize};

use super::sanitize::SanitizedSnapshot;

pub const HIGHLIGHT_CLASS: &str = "highlight";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const HIGHLIGHT_STYLE: &str =
    ".highlight { background-color: yellow !important; transition: background-color 0.3s; }\n";

/// Preview container and natural snapshot size, in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub container_width: f64,
    pub container_height: f64,
    pub content_width: f64,
    pub content_height: f64,
}

impl Viewport {
    /// Uniform scale that fits the content into the container, never enlarging
    pub fn scale(&self) -> f64 {
        let ratio = |container: f64, content: f64| {
            if content > 0.0 && container > 0.0 {
                container / content
            } else {
                1.0
            }
        };
        ratio(self.container_width, self.content_width)
            .min(ratio(self.container_height, self.content_height))
            .min(1.0)
    }
}

/// Full preview document for a sanitized snapshot
pub fn compose_document(snapshot: &SanitizedSnapshot, viewport: Option<&Viewport>) -> String {
    let mut style = snapshot.import_rules();
    style.push_str(HIGHLIGHT_STYLE);
    if let Some(scale) = viewport.map(Viewport::scale).filter(|s| *s < 1.0) {
        style.push_str(&format!(
            "body {{ transform: scale({:.4}); transform-origin: 0 0; }}\n",
            scale
        ));
    }

    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
         <meta http-equiv=\"Content-Security-Policy\" content=\"script-src 'none'; frame-src 'none'; object-src 'none'\">\
         <style>{}</style>{}</head><body>{}</body></html>",
        style, snapshot.head, snapshot.body
    )
}

/// Serialize a parsed preview document, adding the highlight class to
/// `marked` elements. Only the marked elements and their ancestors are
/// written here; every other subtree is serialized by the parser.
pub fn serialize_marked<'a>(document: &'a Html, marked: &[ElementRef<'a>]) -> String {
    let mut out = String::from("<!DOCTYPE html>");
    write_element(&mut out, document.root_element(), marked);
    out
}

fn write_element<'a>(out: &mut String, element: ElementRef<'a>, marked: &[ElementRef<'a>]) {
    let highlight = marked.contains(&element);
    let on_path = highlight
        || marked
            .iter()
            .any(|m| m.ancestors().any(|node| node.id() == element.id()));
    if !on_path {
        out.push_str(&element.html());
        return;
    }

    let value = element.value();
    let name = value.name();

    out.push('<');
    out.push_str(name);
    let mut has_class = false;
    for (attr, attr_value) in value.attrs() {
        let attr_value = if attr == "class" && highlight {
            has_class = true;
            with_highlight(attr_value)
        } else {
            attr_value.to_string()
        };
        out.push_str(&format!(" {}=\"{}\"", attr, escape_attribute(&attr_value)));
    }
    if highlight && !has_class {
        out.push_str(&format!(" class=\"{}\"", HIGHLIGHT_CLASS));
    }
    out.push('>');

    if VOID_ELEMENTS.contains(&name) {
        return;
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) if name == "style" => out.push_str(text),
            Node::Text(text) => out.push_str(&escape_text(text)),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    write_element(out, child, marked);
                }
            }
            _ => {}
        }
    }

    out.push_str(&format!("</{}>", name));
}

fn with_highlight(classes: &str) -> String {
    if classes.split_ascii_whitespace().any(|c| c == HIGHLIGHT_CLASS) {
        classes.to_string()
    } else {
        format!("{} {}", classes, HIGHLIGHT_CLASS).trim().to_string()
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('\u{a0}', "&nbsp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('\u{a0}', "&nbsp;")
        .replace('"', "&quot;")
}
