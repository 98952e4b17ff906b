//! schema.org JSON-LD for catalog pages.
//!
//! Every text field is resolved for the page language and stripped of stega
//! markers, since preview payloads would otherwise leak zero-width characters
//! into search-engine markup.

use serde::Deserialize;
use serde_json::{Map, Value, json};
use url::Url;

use crate::application::dealers::Dealer;
use crate::application::pricing::Price;
use crate::domain::language::Language;
use crate::domain::localized::{LocalizableValue, deserialize_localizable, resolve};
use crate::domain::style::strip_stega;

const SCHEMA_CONTEXT: &str = "https://schema.org";

/// Public identity of the site, used to build absolute URLs.
#[derive(Debug, Clone)]
pub struct SiteIdentity {
    pub name: String,
    pub base_url: Url,
}

impl From<&crate::config::SiteSettings> for SiteIdentity {
    fn from(settings: &crate::config::SiteSettings) -> Self {
        Self::new(settings.name.clone(), settings.public_url.clone())
    }
}

impl SiteIdentity {
    pub fn new(name: impl Into<String>, base_url: Url) -> Self {
        Self {
            name: name.into(),
            base_url,
        }
    }

    /// Join a site path (or pass through an already absolute URL).
    pub fn absolute_url(&self, path: &str) -> String {
        match self.base_url.join(path) {
            Ok(url) => url.into(),
            Err(_) => self.base_url.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    #[serde(default, deserialize_with = "deserialize_localizable")]
    pub name: Option<LocalizableValue>,
    #[serde(default, deserialize_with = "deserialize_localizable")]
    pub description: Option<LocalizableValue>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub price: Option<Price>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FaqEntry {
    #[serde(default, deserialize_with = "deserialize_localizable")]
    pub question: Option<LocalizableValue>,
    #[serde(default, deserialize_with = "deserialize_localizable")]
    pub answer: Option<LocalizableValue>,
}

#[derive(Debug, Clone)]
pub struct Breadcrumb {
    pub name: LocalizableValue,
    pub path: String,
}

pub fn organization(site: &SiteIdentity, logo_path: Option<&str>, same_as: &[String]) -> Value {
    let mut object = typed("Organization");
    object.insert("name".into(), Value::String(clean(&site.name)));
    object.insert("url".into(), Value::String(site.base_url.to_string()));
    if let Some(logo) = logo_path.filter(|logo| !logo.is_empty()) {
        object.insert("logo".into(), Value::String(site.absolute_url(logo)));
    }
    if !same_as.is_empty() {
        object.insert("sameAs".into(), json!(same_as));
    }
    Value::Object(object)
}

/// Product markup; a product without price gets no `offers` block.
pub fn product(site: &SiteIdentity, product: &ProductSummary, path: &str, language: Language) -> Value {
    let mut object = typed("Product");
    object.insert("name".into(), Value::String(text(product.name.as_ref(), language)));
    insert_text(&mut object, "description", text(product.description.as_ref(), language));
    object.insert("url".into(), Value::String(site.absolute_url(path)));
    object.insert(
        "brand".into(),
        json!({"@type": "Brand", "name": clean(&site.name)}),
    );
    if let Some(sku) = &product.sku {
        insert_text(&mut object, "sku", clean(sku));
    }
    if let Some(image) = product.image_url.as_deref().filter(|image| !image.is_empty()) {
        object.insert("image".into(), Value::String(site.absolute_url(image)));
    }
    if let Some(price) = &product.price {
        object.insert("offers".into(), offer(site, price, path));
    }
    Value::Object(object)
}

fn offer(site: &SiteIdentity, price: &Price, path: &str) -> Value {
    json!({
        "@type": "Offer",
        "price": price.decimal_string(),
        "priceCurrency": price.currency,
        "availability": "https://schema.org/InStock",
        "url": site.absolute_url(path),
    })
}

pub fn dealer(site: &SiteIdentity, dealer: &Dealer, path: &str) -> Value {
    let mut object = typed("LocalBusiness");
    object.insert("@id".into(), Value::String(format!("{}#{}", site.absolute_url(path), dealer.id)));
    object.insert("name".into(), Value::String(clean(&dealer.name)));

    let mut address = node("PostalAddress");
    let fields = [
        ("streetAddress", &dealer.address.street),
        ("addressLocality", &dealer.address.city),
        ("addressRegion", &dealer.address.province),
        ("postalCode", &dealer.address.postal_code),
        ("addressCountry", &dealer.address.country),
    ];
    for (key, value) in fields {
        if let Some(value) = value {
            insert_text(&mut address, key, clean(value));
        }
    }
    object.insert("address".into(), Value::Object(address));

    if let Some(location) = dealer.location {
        object.insert(
            "geo".into(),
            json!({"@type": "GeoCoordinates", "latitude": location.lat, "longitude": location.lng}),
        );
    }
    for (key, value) in [
        ("telephone", &dealer.phone),
        ("email", &dealer.email),
        ("url", &dealer.website),
    ] {
        if let Some(value) = value {
            insert_text(&mut object, key, clean(value));
        }
    }
    Value::Object(object)
}

/// FAQ markup; entries missing either side are skipped.
pub fn faq_page(entries: &[FaqEntry], language: Language) -> Value {
    let questions: Vec<Value> = entries
        .iter()
        .filter_map(|entry| {
            let question = text(entry.question.as_ref(), language);
            let answer = text(entry.answer.as_ref(), language);
            if question.is_empty() || answer.is_empty() {
                return None;
            }
            Some(json!({
                "@type": "Question",
                "name": question,
                "acceptedAnswer": {"@type": "Answer", "text": answer},
            }))
        })
        .collect();

    let mut object = typed("FAQPage");
    object.insert("mainEntity".into(), Value::Array(questions));
    Value::Object(object)
}

pub fn breadcrumbs(site: &SiteIdentity, trail: &[Breadcrumb], language: Language) -> Value {
    let items: Vec<Value> = trail
        .iter()
        .enumerate()
        .map(|(index, crumb)| {
            json!({
                "@type": "ListItem",
                "position": index + 1,
                "name": text(Some(&crumb.name), language),
                "item": site.absolute_url(&crumb.path),
            })
        })
        .collect();

    let mut object = typed("BreadcrumbList");
    object.insert("itemListElement".into(), Value::Array(items));
    Value::Object(object)
}

fn typed(kind: &str) -> Map<String, Value> {
    let mut object = Map::new();
    object.insert("@context".into(), Value::String(SCHEMA_CONTEXT.to_string()));
    object.extend(node(kind));
    object
}

fn node(kind: &str) -> Map<String, Value> {
    let mut object = Map::new();
    object.insert("@type".into(), Value::String(kind.to_string()));
    object
}

fn text(value: Option<&LocalizableValue>, language: Language) -> String {
    clean(&resolve(value, language))
}

fn clean(value: &str) -> String {
    strip_stega(value).trim().to_string()
}

fn insert_text(object: &mut Map<String, Value>, key: &str, value: String) {
    if !value.is_empty() {
        object.insert(key.to_string(), Value::String(value));
    }
}
