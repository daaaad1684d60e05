//! Element locators.
//!
//! Accepts plain CSS plus the two text forms the landing page checks rely on:
//! `text=About` (smallest element whose text contains "About") and
//! `button:has-text("Submit")` (CSS matches filtered by text). Text matching is
//! case-insensitive substring matching.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::result::{MiradorError, MiradorResult};

const HAS_TEXT_OPEN: &str = ":has-text(";

/// Locator for a set of elements
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Locator {
    /// CSS selector (e.g., "button.primary")
    Css(String),
    /// Text content selector
    Text(String),
    /// CSS selector filtered by text content
    CssWithText {
        /// Base CSS selector
        css: String,
        /// Text content to match
        text: String,
    },
}

impl Locator {
    /// Create a CSS locator
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a text locator
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Parse the `text=`, `:has-text("...")` and plain CSS forms
    pub fn parse(input: &str) -> MiradorResult<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(MiradorError::config("empty locator"));
        }
        if let Some(text) = input.strip_prefix("text=") {
            let text = unquote(text.trim());
            if text.is_empty() {
                return Err(MiradorError::config(format!("empty text in locator {input:?}")));
            }
            return Ok(Self::Text(text.to_string()));
        }
        if let Some(open) = input.find(HAS_TEXT_OPEN) {
            let css = input[..open].trim();
            let rest = &input[open + HAS_TEXT_OPEN.len()..];
            let Some(inner) = rest.strip_suffix(')') else {
                return Err(MiradorError::config(format!(
                    "unterminated :has-text in locator {input:?}"
                )));
            };
            let text = unquote(inner.trim());
            if css.is_empty() || text.is_empty() {
                return Err(MiradorError::config(format!("malformed locator {input:?}")));
            }
            return Ok(Self::CssWithText {
                css: css.to_string(),
                text: text.to_string(),
            });
        }
        Ok(Self::Css(input.to_string()))
    }

    /// JavaScript expression evaluating to an `Array` of matched elements
    #[must_use]
    pub fn to_elements_expr(&self) -> String {
        match self {
            Self::Css(s) => format!("Array.from(document.querySelectorAll({s:?}))"),
            Self::Text(t) => format!(
                "(() => {{ const needle = {t:?}.toLowerCase(); \
                 const hit = (el) => (el.textContent || '').toLowerCase().includes(needle); \
                 return Array.from(document.querySelectorAll('body *')) \
                 .filter((el) => hit(el) && !Array.from(el.children).some(hit)); }})()"
            ),
            Self::CssWithText { css, text } => format!(
                "Array.from(document.querySelectorAll({css:?})).filter((el) => \
                 (el.textContent || '').toLowerCase().includes({text:?}.toLowerCase()))"
            ),
        }
    }
}

fn unquote(s: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|r| r.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => f.write_str(s),
            Self::Text(t) => write!(f, "text={t}"),
            Self::CssWithText { css, text } => write!(f, "{css}:has-text({text:?})"),
        }
    }
}

impl FromStr for Locator {
    type Err = MiradorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Locator {
    type Error = MiradorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Locator> for String {
    fn from(locator: Locator) -> Self {
        locator.to_string()
    }
}

impl From<&str> for Locator {
    /// Infallible conversion for literals; malformed text forms fall back to CSS
    fn from(value: &str) -> Self {
        Self::parse(value).unwrap_or_else(|_| Self::Css(value.to_string()))
    }
}
