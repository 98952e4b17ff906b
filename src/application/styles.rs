//! Style option vocabularies for CMS-driven page sections.
//!
//! Editors pick section padding, background, and button variants from fixed
//! lists in the CMS. The tables below map those keywords to CSS classes and
//! are built once per process.

use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::domain::style::{StyleOptionTable, strip_stega};

pub const DEFAULT_PADDING: &str = "md";
pub const DEFAULT_BACKGROUND: &str = "white";
pub const DEFAULT_BUTTON: &str = "primary";

static SECTION_PADDING: Lazy<StyleOptionTable<&'static str>> = Lazy::new(|| {
    StyleOptionTable::new(
        [
            ("none", "py-0"),
            ("sm", "py-8"),
            ("md", "py-16"),
            ("lg", "py-24"),
            ("xl", "py-32"),
            ("small-2xl", "pt-8 pb-32"),
        ],
        DEFAULT_PADDING,
    )
    .expect("padding table includes its default")
});

static SECTION_BACKGROUND: Lazy<StyleOptionTable<&'static str>> = Lazy::new(|| {
    StyleOptionTable::new(
        [
            ("white", "bg-white text-neutral-900"),
            ("gray-light", "bg-neutral-50 text-neutral-900"),
            ("gray", "bg-neutral-200 text-neutral-900"),
            ("dark", "bg-neutral-900 text-white"),
            ("brand", "bg-red-700 text-white"),
        ],
        DEFAULT_BACKGROUND,
    )
    .expect("background table includes its default")
});

static BUTTON_VARIANT: Lazy<StyleOptionTable<&'static str>> = Lazy::new(|| {
    StyleOptionTable::new(
        [
            ("primary", "btn bg-red-700 text-white hover:bg-red-800"),
            ("secondary", "btn bg-neutral-900 text-white hover:bg-neutral-700"),
            ("outline", "btn border border-current bg-transparent"),
            ("ghost", "btn bg-transparent underline-offset-4 hover:underline"),
        ],
        DEFAULT_BUTTON,
    )
    .expect("button table includes its default")
});

pub fn section_padding() -> &'static StyleOptionTable<&'static str> {
    &SECTION_PADDING
}

pub fn section_background() -> &'static StyleOptionTable<&'static str> {
    &SECTION_BACKGROUND
}

pub fn button_variant() -> &'static StyleOptionTable<&'static str> {
    &BUTTON_VARIANT
}

/// Style fields shared by every page-builder section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionStyle {
    #[serde(default)]
    pub padding: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub align: Option<String>,
}

/// CSS classes for a section wrapper.
pub fn section_classes(style: &SectionStyle) -> String {
    let padding = section_padding().lookup(style.padding.as_deref(), DEFAULT_PADDING);
    let background = section_background().lookup(style.background.as_deref(), DEFAULT_BACKGROUND);
    format!("{padding} {background}")
}

pub fn button_classes(variant: Option<&str>) -> &'static str {
    *button_variant().lookup(variant, DEFAULT_BUTTON)
}

/// Text alignment class. Compares the sanitized keyword exactly.
pub fn alignment_class(align: Option<&str>) -> &'static str {
    match align.map(strip_stega).as_deref() {
        Some("center") => "text-center",
        Some("right") => "text-right",
        _ => "text-left",
    }
}
