//! Application services: revalidation, catalog display helpers and the
//! site's static style tables.

pub mod dealers;
pub mod error;
pub mod pricing;
pub mod revalidation;
pub mod seo;
pub mod styles;
