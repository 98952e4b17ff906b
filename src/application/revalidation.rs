//! Executes CMS revalidation requests against the page cache.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::PageStore;
use crate::domain::revalidation::{DocumentType, PathSet, RevalidationRequest, SiteRoutes};

const METRIC_REVALIDATIONS: &str = "vetrina_revalidation_total";

/// Result of one revalidation.
#[derive(Debug, Clone, Serialize)]
pub struct RevalidationOutcome {
    #[serde(rename = "type")]
    pub document_type: DocumentType,
    pub paths: PathSet,
    /// Cached responses dropped; zero when no page cache is attached.
    pub evicted: usize,
}

#[derive(Clone)]
pub struct RevalidationService {
    routes: SiteRoutes,
    pages: Option<Arc<PageStore>>,
}

impl RevalidationService {
    pub fn new(routes: SiteRoutes, pages: Option<Arc<PageStore>>) -> Self {
        Self { routes, pages }
    }

    pub fn routes(&self) -> &SiteRoutes {
        &self.routes
    }

    /// Paths a request would invalidate, without touching the cache.
    pub fn plan(&self, request: &RevalidationRequest) -> PathSet {
        self.routes.paths_to_invalidate(request)
    }

    pub fn revalidate(&self, request: &RevalidationRequest) -> RevalidationOutcome {
        let paths = self.plan(request);
        let evicted = self
            .pages
            .as_ref()
            .map(|pages| pages.invalidate(&paths))
            .unwrap_or(0);

        if let DocumentType::Other(tag) = &request.document_type {
            debug!(document_type = %tag, "unrecognized document type, invalidating root");
        }

        info!(
            target = "vetrina::revalidate",
            document_type = %request.document_type,
            slug = request.normalized_slug().unwrap_or(""),
            paths = ?paths.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
            evicted,
            "Revalidated paths"
        );

        counter!(METRIC_REVALIDATIONS, "document_type" => metric_label(&request.document_type))
            .increment(1);

        RevalidationOutcome {
            document_type: request.document_type.clone(),
            paths,
            evicted,
        }
    }
}

fn metric_label(document_type: &DocumentType) -> &'static str {
    match document_type {
        DocumentType::Page => "page",
        DocumentType::Product => "product",
        DocumentType::ProductCategory => "productCategory",
        DocumentType::Dealer => "dealer",
        DocumentType::Testimonial => "testimonial",
        DocumentType::Faq => "faq",
        DocumentType::SiteSettings => "siteSettings",
        DocumentType::Navigation => "navigation",
        DocumentType::Other(_) => "other",
    }
}
