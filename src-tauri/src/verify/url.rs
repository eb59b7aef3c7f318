//! Relative URL resolution for snapshot resources
//!
//! Stylesheet and image references inside a snapshot are made absolute
//! before rendering, following WHATWG URL joining. Without a configured
//! base, references resolve against the root of the current origin and are
//! emitted as `/path?query#fragment`.

use url::{Position, Url};

/// Stand-in origin for root-relative output; never emitted
const ROOT_ORIGIN: &str = "http://root.invalid/";

/// Where relative references are resolved from. `None` resolves against the
/// root of whatever origin serves the rendered document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseUrl(Option<Url>);

impl BaseUrl {
    /// Root of the current origin: relative paths resolve to `/...`
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse an absolute, hierarchical URL. The last path segment is
    /// treated as the document name unless the path ends with `/`.
    pub fn parse(url: &str) -> Option<Self> {
        Url::parse(url.trim())
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .map(|url| Self(Some(url)))
    }

    /// Resolve a reference found in the snapshot. References that cannot be
    /// joined are returned unchanged.
    pub fn resolve(&self, href: &str) -> String {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || is_absolute(href) {
            return href.to_string();
        }

        match &self.0 {
            Some(base) => base.join(href).map(String::from).unwrap_or_else(|_| href.to_string()),
            None => resolve_from_root(href),
        }
    }
}

fn resolve_from_root(href: &str) -> String {
    let Ok(joined) = Url::parse(ROOT_ORIGIN).and_then(|root| root.join(href)) else {
        return href.to_string();
    };
    // Protocol-relative references name their own host
    if joined.host_str() != Some("root.invalid") {
        return href.to_string();
    }
    joined[Position::BeforePath..].to_string()
}

/// Carries its own scheme
pub fn is_absolute(href: &str) -> bool {
    Url::parse(href).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> BaseUrl {
        BaseUrl::parse("https://example.com/shop/cart/index.html").unwrap()
    }

    #[test]
    fn test_absolute_passes_through() {
        let base = base();
        assert_eq!(base.resolve("https://cdn.example/x.css"), "https://cdn.example/x.css");
        assert_eq!(base.resolve("data:image/png;base64,AAAA"), "data:image/png;base64,AAAA");
        assert_eq!(base.resolve("mailto:qa@example.com"), "mailto:qa@example.com");
        assert_eq!(base.resolve("#top"), "#top");
    }

    #[test]
    fn test_relative_against_base() {
        let base = base();
        assert_eq!(base.resolve("./site.css"), "https://example.com/shop/cart/site.css");
        assert_eq!(base.resolve("img/logo.png"), "https://example.com/shop/cart/img/logo.png");
        assert_eq!(base.resolve("../site.css"), "https://example.com/shop/site.css");
        assert_eq!(base.resolve("../../../../site.css"), "https://example.com/site.css");
        assert_eq!(base.resolve("/static/site.css"), "https://example.com/static/site.css");
        assert_eq!(base.resolve("./a/../b.css"), "https://example.com/shop/cart/b.css");
    }

    #[test]
    fn test_query_and_fragment_kept_verbatim() {
        let base = BaseUrl::parse("https://e.com/a/page.html").unwrap();
        assert_eq!(base.resolve("x.css?v=q/../r"), "https://e.com/a/x.css?v=q/../r");
        assert_eq!(base.resolve("../x.css#a/../b"), "https://e.com/x.css#a/../b");
        assert_eq!(base.resolve("?v=2"), "https://e.com/a/page.html?v=2");
    }

    #[test]
    fn test_protocol_relative_takes_base_scheme() {
        assert_eq!(base().resolve("//cdn.example/x.css"), "https://cdn.example/x.css");
        assert_eq!(BaseUrl::root().resolve("//cdn.example/x.css"), "//cdn.example/x.css");
    }

    #[test]
    fn test_root_relative_without_base() {
        let root = BaseUrl::root();
        assert_eq!(root.resolve("./site.css"), "/site.css");
        assert_eq!(root.resolve("../site.css"), "/site.css");
        assert_eq!(root.resolve("/site.css"), "/site.css");
        assert_eq!(root.resolve("css/"), "/css/");
        assert_eq!(root.resolve("x.css?v=q/../r"), "/x.css?v=q/../r");
    }

    #[test]
    fn test_parse_base() {
        let bare = BaseUrl::parse("https://example.com").unwrap();
        assert_eq!(bare.resolve("x.css"), "https://example.com/x.css");
        let dir = BaseUrl::parse("http://localhost:3000/app/").unwrap();
        assert_eq!(dir.resolve("x.css"), "http://localhost:3000/app/x.css");
        assert!(BaseUrl::parse("not a url").is_none());
        assert!(BaseUrl::parse("mailto:qa@example.com").is_none());
    }
}
