//! Locator Strategy
//!
//! The closed set of ways an element can be located on a page.

use serde::{Deserialize, Serialize};

/// How a POM element's `value` should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocatorStrategy {
    Id,
    Name,
    Class,
    #[serde(rename = "Css-selector")]
    CssSelector,
    Xpath,
}

impl LocatorStrategy {
    pub const ALL: [LocatorStrategy; 5] = [
        LocatorStrategy::Id,
        LocatorStrategy::Name,
        LocatorStrategy::Class,
        LocatorStrategy::CssSelector,
        LocatorStrategy::Xpath,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LocatorStrategy::Id => "Id",
            LocatorStrategy::Name => "Name",
            LocatorStrategy::Class => "Class",
            LocatorStrategy::CssSelector => "Css-selector",
            LocatorStrategy::Xpath => "Xpath",
        }
    }

    /// Parse the stored label; anything outside the closed set is `None`
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|strategy| strategy.as_str() == s)
    }
}

impl std::fmt::Display for LocatorStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
