//! Dealer locator.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::domain::language::Language;
use crate::domain::localized::{AddressRecord, LocalizableValue, resolve};
use crate::domain::style::strip_stega;

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle distance in kilometres.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dealer {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: AddressRecord,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DealerQuery {
    /// Province code or name, matched case-insensitively.
    pub province: Option<String>,
    pub origin: Option<GeoPoint>,
    /// Only applies together with `origin`.
    pub radius_km: Option<f64>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealerMatch<'a> {
    pub dealer: &'a Dealer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    pub display_address: String,
}

/// Filter and rank dealers for the locator page.
///
/// With an origin, located dealers come first by distance and dealers
/// without coordinates follow by name; a radius drops the latter entirely.
/// Without an origin the result is ordered by name.
pub fn locate<'a>(dealers: &'a [Dealer], query: &DealerQuery, language: Language) -> Vec<DealerMatch<'a>> {
    let province = query
        .province
        .as_deref()
        .map(normalize_text)
        .filter(|province| !province.is_empty());

    let mut matches: Vec<DealerMatch<'a>> = dealers
        .iter()
        .filter(|dealer| match &province {
            Some(wanted) => dealer
                .address
                .province
                .as_deref()
                .is_some_and(|candidate| normalize_text(candidate) == *wanted),
            None => true,
        })
        .filter_map(|dealer| {
            let distance_km = query
                .origin
                .zip(dealer.location)
                .map(|(origin, location)| origin.distance_km(&location));

            if let (Some(_), Some(radius)) = (query.origin, query.radius_km) {
                match distance_km {
                    Some(distance) if distance <= radius => {}
                    _ => return None,
                }
            }

            let address = LocalizableValue::from(dealer.address.clone());
            Some(DealerMatch {
                dealer,
                distance_km,
                display_address: resolve(Some(&address), language),
            })
        })
        .collect();

    matches.sort_by(compare_matches);

    if let Some(limit) = query.limit {
        matches.truncate(limit);
    }
    matches
}

fn compare_matches(a: &DealerMatch<'_>, b: &DealerMatch<'_>) -> Ordering {
    let by_distance = match (a.distance_km, b.distance_km) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_distance.then_with(|| normalize_text(&a.dealer.name).cmp(&normalize_text(&b.dealer.name)))
}

fn normalize_text(value: &str) -> String {
    strip_stega(value).trim().to_lowercase()
}
