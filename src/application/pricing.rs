//! Product price display.
//!
//! Prices come from the CMS as decimal amounts in major units. They are kept
//! in cents internally so VAT arithmetic and formatting stay exact.

use serde::{Deserialize, Deserializer};

use crate::domain::language::Language;

const EURO: &str = "EUR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Price {
    pub amount_cents: i64,
    /// ISO 4217 code.
    pub currency: String,
}

impl Price {
    pub fn eur(amount_cents: i64) -> Self {
        Self {
            amount_cents,
            currency: EURO.to_string(),
        }
    }

    /// Convert a major-unit amount (`1234.5`) rounding to the nearest cent.
    pub fn from_major(amount: f64, currency: impl Into<String>) -> Option<Self> {
        if !amount.is_finite() {
            return None;
        }
        Some(Self {
            amount_cents: (amount * 100.0).round() as i64,
            currency: currency.into(),
        })
    }

    /// Machine-readable amount with two decimals, e.g. `"1234.50"`.
    pub fn decimal_string(&self) -> String {
        let sign = if self.amount_cents < 0 { "-" } else { "" };
        let cents = self.amount_cents.unsigned_abs();
        format!("{sign}{}.{:02}", cents / 100, cents % 100)
    }

    /// Add VAT at `rate_percent`, rounding half away from zero to the cent.
    pub fn with_vat(&self, rate_percent: u32) -> Self {
        let gross = i128::from(self.amount_cents) * i128::from(100 + rate_percent);
        let rounded = if gross >= 0 {
            (gross + 50) / 100
        } else {
            (gross - 50) / 100
        };
        Self {
            amount_cents: i64::try_from(rounded).unwrap_or(i64::MAX),
            currency: self.currency.clone(),
        }
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct RawPrice {
            amount: f64,
            #[serde(default)]
            currency: Option<String>,
        }

        let raw = RawPrice::deserialize(deserializer)?;
        let currency = raw
            .currency
            .map(|code| code.trim().to_ascii_uppercase())
            .filter(|code| !code.is_empty())
            .unwrap_or_else(|| EURO.to_string());
        Price::from_major(raw.amount, currency)
            .ok_or_else(|| serde::de::Error::custom("price amount must be finite"))
    }
}

pub fn price_on_request_label(language: Language) -> &'static str {
    match language {
        Language::It => "Prezzo su richiesta",
        Language::En => "Price on request",
        Language::Es => "Precio bajo pedido",
    }
}

/// Display a price the way each market writes it; absent prices show the
/// "on request" label.
pub fn format_price(price: Option<&Price>, language: Language) -> String {
    let Some(price) = price else {
        return price_on_request_label(language).to_string();
    };

    let (thousands, decimal) = match language {
        Language::En => (',', '.'),
        Language::It | Language::Es => ('.', ','),
    };

    let cents = price.amount_cents.unsigned_abs();
    let sign = if price.amount_cents < 0 { "-" } else { "" };
    let number = format!(
        "{}{decimal}{:02}",
        group_thousands(cents / 100, thousands),
        cents % 100
    );

    let symbol = currency_symbol(&price.currency);
    match language {
        Language::En => format!("{sign}{symbol}{number}"),
        Language::It | Language::Es => format!("{sign}{number} {symbol}"),
    }
}

fn currency_symbol(code: &str) -> &str {
    match code {
        "EUR" => "€",
        "USD" => "$",
        "GBP" => "£",
        other => other,
    }
}

fn group_thousands(value: u64, separator: char) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(digit);
    }
    grouped
}
