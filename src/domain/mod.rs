//! Content resolution core: languages, localized values, style tables, and
//! revalidation mapping. Everything here is pure and synchronous.

pub mod error;
pub mod language;
pub mod localized;
pub mod revalidation;
pub mod style;
