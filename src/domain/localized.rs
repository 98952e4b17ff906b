//! Localized CMS field values.
//!
//! A text field coming from the CMS is either a plain string, an object with
//! one entry per language, or a structured postal address. The shape is only
//! known at runtime, so [`LocalizableValue::from_json`] discriminates it once
//! (language keys first, then address keys) and [`resolve`] turns it into the
//! display string for a language.
//!
//! Resolution never fails: absent values and unrecognized shapes resolve to
//! the empty string.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

use super::language::Language;

const ADDRESS_SEPARATOR: &str = ", ";

/// Per-language variants of a text field. Any entry may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub it: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub es: Option<String>,
}

impl LocalizedMap {
    /// Non-empty text stored for `language`, if any.
    pub fn get(&self, language: Language) -> Option<&str> {
        let slot = match language {
            Language::It => &self.it,
            Language::En => &self.en,
            Language::Es => &self.es,
        };
        slot.as_deref().filter(|text| !text.is_empty())
    }

    /// Requested language, then `it`, `en`, `es`; empty when all are blank.
    pub fn resolve(&self, language: Language) -> String {
        [language, Language::It, Language::En, Language::Es]
            .into_iter()
            .find_map(|candidate| self.get(candidate))
            .unwrap_or_default()
            .to_string()
    }
}

/// Postal address as stored on dealer and company documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRecord {
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl AddressRecord {
    /// Single-line address: street, city, province, postal code, country.
    pub fn display(&self) -> String {
        [
            &self.street,
            &self.city,
            &self.province,
            &self.postal_code,
            &self.country,
        ]
        .into_iter()
        .filter_map(|part| part.as_deref().filter(|text| !text.is_empty()))
        .collect::<Vec<_>>()
        .join(ADDRESS_SEPARATOR)
    }
}

/// The three shapes a localizable CMS field can take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalizableValue {
    Plain(String),
    Localized(LocalizedMap),
    Address(AddressRecord),
}

impl LocalizableValue {
    /// Discriminate a raw CMS value.
    ///
    /// Strings and numbers become [`LocalizableValue::Plain`]. Objects with
    /// any of the `it`/`en`/`es` keys are localized maps; otherwise objects
    /// with `street` or `city` are addresses. Anything else is `None`.
    ///
    /// Entries are read with JavaScript truthiness: `null`, `""`, `0` and
    /// `false` all count as missing.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(Self::Plain(text.clone())),
            Value::Number(number) => Some(Self::Plain(number_text(number))),
            Value::Object(object) => {
                if Language::ALL
                    .iter()
                    .any(|language| object.contains_key(language.as_str()))
                {
                    Some(Self::Localized(LocalizedMap {
                        it: truthy_text(object, "it"),
                        en: truthy_text(object, "en"),
                        es: truthy_text(object, "es"),
                    }))
                } else if object.contains_key("street") || object.contains_key("city") {
                    Some(Self::Address(AddressRecord {
                        street: truthy_text(object, "street"),
                        city: truthy_text(object, "city"),
                        province: truthy_text(object, "province"),
                        postal_code: truthy_text(object, "postalCode"),
                        country: truthy_text(object, "country"),
                    }))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn resolve(&self, language: Language) -> String {
        match self {
            Self::Plain(text) => text.clone(),
            Self::Localized(map) => map.resolve(language),
            Self::Address(address) => address.display(),
        }
    }
}

impl From<&str> for LocalizableValue {
    fn from(text: &str) -> Self {
        Self::Plain(text.to_string())
    }
}

impl From<LocalizedMap> for LocalizableValue {
    fn from(map: LocalizedMap) -> Self {
        Self::Localized(map)
    }
}

impl From<AddressRecord> for LocalizableValue {
    fn from(address: AddressRecord) -> Self {
        Self::Address(address)
    }
}

/// Display string for `value` in `language`; empty when absent.
pub fn resolve(value: Option<&LocalizableValue>, language: Language) -> String {
    value
        .map(|value| value.resolve(language))
        .unwrap_or_default()
}

/// Discriminate and resolve a raw CMS value in one step.
pub fn resolve_json(value: Option<&Value>, language: Language) -> String {
    let value = value.and_then(LocalizableValue::from_json);
    resolve(value.as_ref(), language)
}

/// Serde adapter for document fields holding a localizable value.
///
/// Unrecognized shapes deserialize to `None` instead of failing the whole
/// document. Use with `#[serde(default, deserialize_with = "...")]`.
pub fn deserialize_localizable<'de, D>(deserializer: D) -> Result<Option<LocalizableValue>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(LocalizableValue::from_json))
}

/// Integral floats print without a fraction, so `1.0` reads `"1"`.
fn number_text(number: &Number) -> String {
    match number.as_f64() {
        Some(value) if number.is_f64() && value.fract() == 0.0 => (value + 0.0).to_string(),
        _ => number.to_string(),
    }
}

fn truthy_text(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) if number.as_f64() != Some(0.0) => Some(number_text(number)),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}
