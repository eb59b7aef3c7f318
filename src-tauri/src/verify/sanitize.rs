//! Snapshot sanitizer
//!
//! Cleans an uploaded HTML snapshot with ammonia so only what is safe to
//! render survives: no scripts, no plugins or frames, no inline event
//! handlers, no `javascript:` URLs. Stylesheet links become `@import` rules
//! and relative references are made absolute. Every other tag and attribute
//! seen in the snapshot is allowed so selectors written against the live
//! page (data, ARIA and framework attributes included) still match.

use std::borrow::Cow;
use std::collections::HashSet;

use ammonia::{Builder, UrlRelative, UrlRelativeEvaluate};
use scraper::{ElementRef, Html, Node};
use serde::Serialize;

use super::url::BaseUrl;

/// Elements removed together with their content
const BLOCKED_ELEMENTS: &[&str] = &[
    "script", "noscript", "iframe", "frame", "frameset", "object", "embed", "applet", "portal",
];

/// Elements dropped on their own; stylesheet links are collected first
const DROPPED_ELEMENTS: &[&str] = &["link", "meta", "base", "html", "head", "body"];

const URL_SCHEMES: &[&str] = &["http", "https", "mailto", "tel", "data"];

/// Result of sanitizing a snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedSnapshot {
    /// `<style>` elements from the document head
    pub head: String,
    /// Serialized body content
    pub body: String,
    /// Absolute stylesheet URLs, in document order
    pub imports: Vec<String>,
    /// Number of elements, event handlers and comments removed
    pub removed: usize,
}

impl SanitizedSnapshot {
    /// `@import` rules for the extracted stylesheets
    pub fn import_rules(&self) -> String {
        self.imports
            .iter()
            .map(|url| format!("@import url(\"{}\");\n", url.replace('"', "%22")))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.body.trim().is_empty()
    }
}

/// Sanitize raw snapshot HTML, resolving relative references against `base`
pub fn sanitize(raw_html: &str, base: &BaseUrl) -> SanitizedSnapshot {
    let document = Html::parse_document(raw_html);
    let inventory = Inventory::collect(&document, base);

    let body = match section(&document, "body") {
        Some(body) => cleaner(&inventory, base).clean(&body.inner_html()).to_string(),
        None => String::new(),
    };

    if inventory.removed > 0 {
        log::debug!("Sanitizer removed {} unsafe nodes or attributes", inventory.removed);
    }

    SanitizedSnapshot {
        head: inventory.head,
        body,
        imports: inventory.imports,
        removed: inventory.removed,
    }
}

/// Everything the cleaner needs to know about the parsed snapshot
#[derive(Default)]
struct Inventory {
    head: String,
    imports: Vec<String>,
    tags: HashSet<String>,
    attributes: HashSet<String>,
    removed: usize,
}

impl Inventory {
    fn collect(document: &Html, base: &BaseUrl) -> Self {
        let mut inventory = Self::default();

        let links = document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|element| element.value().name() == "link");
        for link in links {
            let value = link.value();
            let is_stylesheet = value
                .attr("rel")
                .is_some_and(|rel| rel.split_ascii_whitespace().any(|r| r.eq_ignore_ascii_case("stylesheet")));
            let href = value.attr("href").map(|href| base.resolve(href)).filter(|url| is_fetchable(url));
            match href {
                Some(url) if is_stylesheet => inventory.imports.push(url),
                _ => inventory.removed += 1,
            }
        }

        if let Some(head) = section(document, "head") {
            for element in head.children().filter_map(ElementRef::wrap) {
                match element.value().name() {
                    "style" => inventory.head.push_str(&element.html()),
                    "link" => {}
                    _ => inventory.removed += 1,
                }
            }
        }

        if let Some(body) = section(document, "body") {
            for node in body.descendants().skip(1) {
                match node.value() {
                    Node::Element(element) => {
                        let name = element.name();
                        if BLOCKED_ELEMENTS.contains(&name) || (name != "link" && DROPPED_ELEMENTS.contains(&name)) {
                            inventory.removed += 1;
                        } else {
                            inventory.tags.insert(name.to_string());
                        }
                        for (attr, _) in element.attrs() {
                            if is_handler(attr) {
                                inventory.removed += 1;
                            } else {
                                inventory.attributes.insert(attr.to_string());
                            }
                        }
                    }
                    Node::Comment(_) => inventory.removed += 1,
                    _ => {}
                }
            }
        }

        for name in BLOCKED_ELEMENTS.iter().chain(DROPPED_ELEMENTS) {
            inventory.tags.remove(*name);
        }
        inventory
    }
}

fn cleaner<'a>(inventory: &'a Inventory, base: &BaseUrl) -> Builder<'a> {
    let mut cleaner = Builder::default();
    cleaner
        .tags(inventory.tags.iter().map(String::as_str).collect())
        .clean_content_tags(BLOCKED_ELEMENTS.iter().copied().collect())
        .generic_attributes(inventory.attributes.iter().map(String::as_str).collect())
        .url_schemes(URL_SCHEMES.iter().copied().collect())
        .url_relative(UrlRelative::Custom(Box::new(ResolveAgainst(base.clone()))))
        .link_rel(None)
        .strip_comments(true);
    cleaner
}

struct ResolveAgainst(BaseUrl);

impl<'a> UrlRelativeEvaluate<'a> for ResolveAgainst {
    fn evaluate<'url>(&self, url: &'url str) -> Option<Cow<'url, str>> {
        Some(Cow::Owned(self.0.resolve(url)))
    }
}

/// `<head>` or `<body>` of a parsed document
fn section<'a>(document: &'a Html, name: &str) -> Option<ElementRef<'a>> {
    document
        .root_element()
        .children()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name() == name)
}

/// Inline event handlers and nested documents
fn is_handler(attr: &str) -> bool {
    let lower = attr.to_ascii_lowercase();
    lower.starts_with("on") || lower == "srcdoc"
}

/// Root-relative, or an `http(s)` URL
fn is_fetchable(url: &str) -> bool {
    match ::url::Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => url.starts_with('/'),
    }
}
