//! Mapping CMS document changes to stale rendered paths.
//!
//! The CMS posts `{ "_type": ..., "slug": { "current": ... } }` whenever a
//! document is published. Each document type feeds a known set of pages, so
//! the mapping is a static table keyed by type. Unknown types invalidate the
//! home page only.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::DomainError;

pub const ROOT_PATH: &str = "/";
const HOME_SLUG: &str = "home";

pub const DEFAULT_PRODUCTS_PATH: &str = "/prodotti";
pub const DEFAULT_CATEGORIES_PATH: &str = "/categorie";
pub const DEFAULT_DEALERS_PATH: &str = "/rivenditori";
pub const DEFAULT_FAQ_PATH: &str = "/faq";

/// CMS document types the site knows about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentType {
    Page,
    Product,
    ProductCategory,
    Dealer,
    Testimonial,
    Faq,
    SiteSettings,
    Navigation,
    /// Any tag not listed above, kept verbatim for logging.
    Other(String),
}

impl DocumentType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "page" => Self::Page,
            "product" => Self::Product,
            "productCategory" => Self::ProductCategory,
            "dealer" => Self::Dealer,
            "testimonial" => Self::Testimonial,
            "faq" => Self::Faq,
            "siteSettings" => Self::SiteSettings,
            "navigation" => Self::Navigation,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Page => "page",
            Self::Product => "product",
            Self::ProductCategory => "productCategory",
            Self::Dealer => "dealer",
            Self::Testimonial => "testimonial",
            Self::Faq => "faq",
            Self::SiteSettings => "siteSettings",
            Self::Navigation => "navigation",
            Self::Other(tag) => tag,
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DocumentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DocumentType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Self::from_tag(&tag))
    }
}

/// Change notification as delivered by the CMS webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevalidationRequest {
    #[serde(rename = "_type")]
    pub document_type: DocumentType,
    #[serde(default, with = "slug_field", skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

impl RevalidationRequest {
    pub fn new(document_type: DocumentType, slug: Option<String>) -> Self {
        Self {
            document_type,
            slug,
        }
    }

    /// Slug without surrounding whitespace or slashes; `None` when blank.
    pub fn normalized_slug(&self) -> Option<&str> {
        self.slug
            .as_deref()
            .map(|slug| slug.trim().trim_matches('/'))
            .filter(|slug| !slug.is_empty())
    }
}

/// `slug` travels as `{ "current": "..." }`.
mod slug_field {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct SlugRef {
        #[serde(default)]
        current: Option<String>,
    }

    pub fn serialize<S: Serializer>(slug: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
        slug.as_ref()
            .map(|current| SlugRef {
                current: Some(current.clone()),
            })
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        let slug = Option::<SlugRef>::deserialize(deserializer)?;
        Ok(slug.and_then(|slug| slug.current))
    }
}

/// One cache invalidation to perform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InvalidationTarget {
    Path(String),
    /// Every cached page; used when global layout data changes.
    AllPages,
}

impl InvalidationTarget {
    pub const ALL_PAGES_SENTINEL: &'static str = "*";

    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Path(path) => path,
            Self::AllPages => Self::ALL_PAGES_SENTINEL,
        }
    }
}

impl fmt::Display for InvalidationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for InvalidationTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Ordered set of invalidation targets. Re-inserting a target is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PathSet {
    targets: Vec<InvalidationTarget>,
}

impl PathSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, target: InvalidationTarget) {
        if !self.targets.contains(&target) {
            self.targets.push(target);
        }
    }

    pub fn insert_path(&mut self, path: impl Into<String>) {
        self.insert(InvalidationTarget::path(path));
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.targets
            .iter()
            .any(|target| matches!(target, InvalidationTarget::Path(p) if p == path))
    }

    pub fn invalidates_all(&self) -> bool {
        self.targets.contains(&InvalidationTarget::AllPages)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InvalidationTarget> {
        self.targets.iter()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl<'a> IntoIterator for &'a PathSet {
    type Item = &'a InvalidationTarget;
    type IntoIter = std::slice::Iter<'a, InvalidationTarget>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.iter()
    }
}

impl FromIterator<InvalidationTarget> for PathSet {
    fn from_iter<I: IntoIterator<Item = InvalidationTarget>>(iter: I) -> Self {
        let mut set = PathSet::new();
        for target in iter {
            set.insert(target);
        }
        set
    }
}

/// Listing paths the dispatcher invalidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRoutes {
    products: String,
    categories: String,
    dealers: String,
    faq: String,
}

impl Default for SiteRoutes {
    fn default() -> Self {
        Self {
            products: DEFAULT_PRODUCTS_PATH.to_string(),
            categories: DEFAULT_CATEGORIES_PATH.to_string(),
            dealers: DEFAULT_DEALERS_PATH.to_string(),
            faq: DEFAULT_FAQ_PATH.to_string(),
        }
    }
}

impl SiteRoutes {
    /// Validate and normalize configured listing paths.
    ///
    /// Each path must be absolute and not the site root; a trailing slash is
    /// dropped.
    pub fn new(products: &str, categories: &str, dealers: &str, faq: &str) -> Result<Self, DomainError> {
        Ok(Self {
            products: normalize_route("products", products)?,
            categories: normalize_route("categories", categories)?,
            dealers: normalize_route("dealers", dealers)?,
            faq: normalize_route("faq", faq)?,
        })
    }

    pub fn products(&self) -> &str {
        &self.products
    }

    pub fn categories(&self) -> &str {
        &self.categories
    }

    pub fn dealers(&self) -> &str {
        &self.dealers
    }

    pub fn faq(&self) -> &str {
        &self.faq
    }

    pub fn product_detail(&self, slug: &str) -> String {
        format!("{}/{slug}", self.products)
    }

    /// Paths whose rendered output is stale after `request`'s document changed.
    pub fn paths_to_invalidate(&self, request: &RevalidationRequest) -> PathSet {
        let mut paths = PathSet::new();
        let slug = request.normalized_slug();

        match &request.document_type {
            DocumentType::Page => match slug {
                Some(slug) => {
                    paths.insert_path(format!("/{slug}"));
                    if slug == HOME_SLUG {
                        paths.insert_path(ROOT_PATH);
                    }
                }
                None => paths.insert_path(ROOT_PATH),
            },
            DocumentType::Product => {
                paths.insert_path(self.products.as_str());
                if let Some(slug) = slug {
                    paths.insert_path(self.product_detail(slug));
                }
                // Home lists featured products.
                paths.insert_path(ROOT_PATH);
            }
            DocumentType::ProductCategory => {
                paths.insert_path(self.products.as_str());
                paths.insert_path(self.categories.as_str());
            }
            DocumentType::Dealer => paths.insert_path(self.dealers.as_str()),
            DocumentType::Testimonial => paths.insert_path(ROOT_PATH),
            DocumentType::Faq => paths.insert_path(self.faq.as_str()),
            DocumentType::SiteSettings | DocumentType::Navigation => {
                paths.insert(InvalidationTarget::AllPages)
            }
            DocumentType::Other(_) => paths.insert_path(ROOT_PATH),
        }

        paths
    }
}

/// [`SiteRoutes::paths_to_invalidate`] with the default routes.
pub fn paths_to_invalidate(request: &RevalidationRequest) -> PathSet {
    SiteRoutes::default().paths_to_invalidate(request)
}

fn normalize_route(name: &str, path: &str) -> Result<String, DomainError> {
    let path = path.trim();
    if !path.starts_with('/') {
        return Err(DomainError::validation(format!(
            "route `{name}` must be an absolute path, got `{path}`"
        )));
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!(
            "route `{name}` must not be the site root"
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn request(body: serde_json::Value) -> RevalidationRequest {
        serde_json::from_value(body).expect("webhook body")
    }

    fn paths(set: &PathSet) -> Vec<&str> {
        set.iter().map(InvalidationTarget::as_str).collect()
    }

    #[test]
    fn parses_webhook_body() {
        let req = request(json!({"_type": "product", "slug": {"current": "policut-20"}, "_id": "abc"}));
        assert_eq!(req.document_type, DocumentType::Product);
        assert_eq!(req.slug.as_deref(), Some("policut-20"));

        let req = request(json!({"_type": "faq"}));
        assert_eq!(req.slug, None);

        let req = request(json!({"_type": "page", "slug": null}));
        assert_eq!(req.slug, None);

        let req = request(json!({"_type": "page", "slug": {}}));
        assert_eq!(req.slug, None);
    }

    #[test]
    fn missing_type_is_rejected() {
        let result = serde_json::from_value::<RevalidationRequest>(json!({"slug": {"current": "x"}}));
        assert!(result.is_err());
    }

    #[test]
    fn serializes_back_to_webhook_shape() {
        let req = RevalidationRequest::new(DocumentType::Product, Some("policut-20".to_string()));
        let value = serde_json::to_value(&req).expect("serialize");
        assert_eq!(value, json!({"_type": "product", "slug": {"current": "policut-20"}}));

        let req = RevalidationRequest::new(DocumentType::Other("banner".to_string()), None);
        let value = serde_json::to_value(&req).expect("serialize");
        assert_eq!(value, json!({"_type": "banner"}));
    }

    #[test]
    fn home_page_invalidates_slug_and_root() {
        let set = paths_to_invalidate(&request(json!({"_type": "page", "slug": {"current": "home"}})));
        assert!(set.contains_path("/home"));
        assert!(set.contains_path("/"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn other_page_invalidates_only_its_path() {
        let set = paths_to_invalidate(&request(json!({"_type": "page", "slug": {"current": "chi-siamo"}})));
        assert_eq!(paths(&set), vec!["/chi-siamo"]);
    }

    #[test]
    fn page_without_slug_invalidates_root() {
        let set = paths_to_invalidate(&request(json!({"_type": "page"})));
        assert_eq!(paths(&set), vec!["/"]);
    }

    #[test]
    fn product_invalidates_listing_detail_and_root() {
        let set = paths_to_invalidate(&request(json!({"_type": "product", "slug": {"current": "policut-20"}})));
        assert_eq!(paths(&set), vec!["/prodotti", "/prodotti/policut-20", "/"]);
    }

    #[test]
    fn product_without_slug_skips_detail() {
        let set = paths_to_invalidate(&request(json!({"_type": "product"})));
        assert_eq!(paths(&set), vec!["/prodotti", "/"]);
    }

    #[test]
    fn category_dealer_testimonial_and_faq() {
        let set = paths_to_invalidate(&request(json!({"_type": "productCategory"})));
        assert_eq!(paths(&set), vec!["/prodotti", "/categorie"]);

        let set = paths_to_invalidate(&request(json!({"_type": "dealer", "slug": {"current": "x"}})));
        assert_eq!(paths(&set), vec!["/rivenditori"]);

        let set = paths_to_invalidate(&request(json!({"_type": "testimonial"})));
        assert_eq!(paths(&set), vec!["/"]);

        let set = paths_to_invalidate(&request(json!({"_type": "faq"})));
        assert_eq!(paths(&set), vec!["/faq"]);
    }

    #[test]
    fn global_documents_invalidate_everything() {
        for tag in ["siteSettings", "navigation"] {
            let set = paths_to_invalidate(&request(json!({"_type": tag})));
            assert!(set.invalidates_all());
            assert_eq!(set.len(), 1);
            assert_eq!(paths(&set), vec![InvalidationTarget::ALL_PAGES_SENTINEL]);
        }
    }

    #[test]
    fn unknown_type_invalidates_exactly_root() {
        let set = paths_to_invalidate(&request(json!({"_type": "unknownThing"})));
        assert_eq!(paths(&set), vec!["/"]);
        assert!(!set.invalidates_all());
    }

    #[test]
    fn slugs_are_trimmed() {
        let req = RevalidationRequest::new(DocumentType::Page, Some(" /servizi/ ".to_string()));
        assert_eq!(paths(&paths_to_invalidate(&req)), vec!["/servizi"]);

        let req = RevalidationRequest::new(DocumentType::Product, Some("  ".to_string()));
        assert_eq!(paths(&paths_to_invalidate(&req)), vec!["/prodotti", "/"]);
    }

    #[test]
    fn path_set_ignores_duplicates() {
        let set: PathSet = [
            InvalidationTarget::path("/"),
            InvalidationTarget::path("/faq"),
            InvalidationTarget::path("/"),
        ]
        .into_iter()
        .collect();
        assert_eq!(paths(&set), vec!["/", "/faq"]);
    }

    #[test]
    fn configured_routes_are_used() {
        let routes = SiteRoutes::new("/en/products/", "/en/categories", "/dealers", "/help")
            .expect("valid routes");
        let req = RevalidationRequest::new(DocumentType::Product, Some("policut-20".to_string()));
        assert_eq!(
            paths(&routes.paths_to_invalidate(&req)),
            vec!["/en/products", "/en/products/policut-20", "/"]
        );
    }

    #[test]
    fn routes_must_be_absolute_and_not_root() {
        assert!(SiteRoutes::new("prodotti", "/c", "/d", "/f").is_err());
        assert!(SiteRoutes::new("/p", "/", "/d", "/f").is_err());
        assert!(SiteRoutes::new("/p", "/c", "/d", "").is_err());
    }

    #[test]
    fn path_set_serializes_as_strings() {
        let set: PathSet = [InvalidationTarget::path("/faq"), InvalidationTarget::AllPages]
            .into_iter()
            .collect();
        assert_eq!(serde_json::to_value(&set).expect("json"), json!(["/faq", "*"]));
    }
}
