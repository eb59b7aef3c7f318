//! Selector generation
//!
//! Turns a locator strategy and its value into the selector string the
//! rendering context evaluates.

use crate::domain::{LocatorStrategy, PomElement};

/// A selector ready for lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// CSS selector (querySelector semantics)
    Css(String),
    /// XPath location path, evaluated through its CSS translation
    XPath(String),
}

impl Selector {
    /// Classify a generated selector string. CSS selectors never start with
    /// `/`, so a leading slash means XPath. Empty strings yield `None`.
    pub fn parse(selector: &str) -> Option<Self> {
        let selector = selector.trim();
        if selector.is_empty() {
            None
        } else if selector.starts_with('/') {
            Some(Self::XPath(selector.to_string()))
        } else {
            Some(Self::Css(selector.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Css(s) | Self::XPath(s) => s,
        }
    }
}

/// Build the selector for a locator label and value.
///
/// An empty label or value gives an empty string, which callers treat as
/// "skip, not found". A label outside the closed set degrades to the raw
/// value.
pub fn generate_selector(locator: &str, value: &str) -> String {
    let value = value.trim();
    let locator = locator.trim();
    if locator.is_empty() || value.is_empty() {
        return String::new();
    }

    match LocatorStrategy::parse(locator) {
        Some(strategy) => selector_for_strategy(strategy, value),
        None => {
            log::debug!("Unknown locator strategy '{}', using value as selector", locator);
            value.to_string()
        }
    }
}

fn selector_for_strategy(strategy: LocatorStrategy, value: &str) -> String {
    match strategy {
        LocatorStrategy::Id if value.starts_with('#') => value.to_string(),
        LocatorStrategy::Id => format!("#{}", value),
        LocatorStrategy::Class if value.starts_with('.') => value.to_string(),
        LocatorStrategy::Class => format!(".{}", value),
        LocatorStrategy::Name => format!("[name='{}']", value),
        LocatorStrategy::CssSelector => value.to_string(),
        LocatorStrategy::Xpath if value.starts_with('/') => value.to_string(),
        LocatorStrategy::Xpath => format!("//{}", value),
    }
}

/// Selector for a POM element
pub fn selector_for(element: &PomElement) -> String {
    generate_selector(&element.locator, &element.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_and_class_prefixes() {
        assert_eq!(generate_selector("Id", "foo"), "#foo");
        assert_eq!(generate_selector("Id", "#foo"), "#foo");
        assert_eq!(generate_selector("Class", "bar"), ".bar");
        assert_eq!(generate_selector("Class", ".bar"), ".bar");
    }

    #[test]
    fn test_name_css_and_xpath() {
        assert_eq!(generate_selector("Name", "x"), "[name='x']");
        assert_eq!(generate_selector("Css-selector", ".a > b"), ".a > b");
        assert_eq!(generate_selector("Xpath", "//div"), "//div");
        assert_eq!(generate_selector("Xpath", "div"), "//div");
    }

    #[test]
    fn test_empty_inputs() {
        for strategy in LocatorStrategy::ALL {
            assert_eq!(generate_selector(strategy.as_str(), ""), "");
        }
        assert_eq!(generate_selector("", "foo"), "");
        assert_eq!(generate_selector("Id", "   "), "");
    }

    #[test]
    fn test_unknown_strategy_uses_raw_value() {
        assert_eq!(generate_selector("LinkText", "a.help"), "a.help");
    }

    #[test]
    fn test_selector_parse() {
        assert_eq!(Selector::parse(""), None);
        assert_eq!(Selector::parse("#a"), Some(Selector::Css("#a".to_string())));
        assert_eq!(Selector::parse("//div"), Some(Selector::XPath("//div".to_string())));
    }

    #[test]
    fn test_selector_for_element() {
        let element = PomElement::new("input", "Email", LocatorStrategy::Name, "email");
        assert_eq!(selector_for(&element), "[name='email']");
    }
}
