//! Computed style properties observed by the collector.
//!
//! Values are kept exactly as the browser serialises them. Transparency and
//! zero checks are literal string comparisons against the canonical forms
//! below; `rgba(0, 0, 0, 0.01)` is not transparent and `0em` is not zero.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fully transparent color as serialised by `getComputedStyle`
pub const TRANSPARENT_RGBA: &str = "rgba(0, 0, 0, 0)";

/// The `transparent` keyword
pub const TRANSPARENT_KEYWORD: &str = "transparent";

/// Zero length as serialised by `getComputedStyle`
pub const ZERO_PX: &str = "0px";

/// Opaque black
pub const RGB_BLACK: &str = "rgb(0, 0, 0)";

/// Opaque white
pub const RGB_WHITE: &str = "rgb(255, 255, 255)";

/// A computed style property the collector can read
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StyleProperty {
    /// `color`
    Color,
    /// `background-color`
    BackgroundColor,
    /// `border-color`
    BorderColor,
    /// `font-family`
    FontFamily,
    /// `font-size`
    FontSize,
    /// `font-weight`
    FontWeight,
    /// `line-height`
    LineHeight,
}

impl StyleProperty {
    /// Every property, in declaration order
    pub const ALL: [Self; 7] = [
        Self::Color,
        Self::BackgroundColor,
        Self::BorderColor,
        Self::FontFamily,
        Self::FontSize,
        Self::FontWeight,
        Self::LineHeight,
    ];

    /// Property key on a `CSSStyleDeclaration` object
    #[must_use]
    pub const fn js_name(self) -> &'static str {
        match self {
            Self::Color => "color",
            Self::BackgroundColor => "backgroundColor",
            Self::BorderColor => "borderColor",
            Self::FontFamily => "fontFamily",
            Self::FontSize => "fontSize",
            Self::FontWeight => "fontWeight",
            Self::LineHeight => "lineHeight",
        }
    }

    /// CSS property name
    #[must_use]
    pub const fn css_name(self) -> &'static str {
        match self {
            Self::Color => "color",
            Self::BackgroundColor => "background-color",
            Self::BorderColor => "border-color",
            Self::FontFamily => "font-family",
            Self::FontSize => "font-size",
            Self::FontWeight => "font-weight",
            Self::LineHeight => "line-height",
        }
    }
}

impl fmt::Display for StyleProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.css_name())
    }
}

/// Exact match against `rgba(0, 0, 0, 0)` or `transparent`
#[must_use]
pub fn is_transparent(value: &str) -> bool {
    value == TRANSPARENT_RGBA || value == TRANSPARENT_KEYWORD
}

/// Exact match against `0px`
#[must_use]
pub fn is_zero_px(value: &str) -> bool {
    value == ZERO_PX
}
