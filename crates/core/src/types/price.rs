//! Type-safe price representation using decimal arithmetic.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A unit price as reported by the commerce backend.
///
/// The backend formats prices for display (`formatted`), so the bot never
/// needs locale logic; the decimal `amount` is kept for cart arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., rubles, not kopecks).
    pub amount: Decimal,
    /// ISO 4217 currency code as reported by the backend.
    pub currency: String,
    /// Whether `amount` already includes tax.
    pub includes_tax: bool,
    /// Backend-formatted display string (e.g., "250 ₽").
    pub formatted: String,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub fn new(
        amount: Decimal,
        currency: impl Into<String>,
        includes_tax: bool,
        formatted: impl Into<String>,
    ) -> Self {
        Self {
            amount,
            currency: currency.into(),
            includes_tax,
            formatted: formatted.into(),
        }
    }

    /// Build a price from an amount in minor units (kopecks, cents).
    #[must_use]
    pub fn from_minor_units(
        minor: i64,
        currency: impl Into<String>,
        includes_tax: bool,
        formatted: impl Into<String>,
    ) -> Self {
        Self::new(Decimal::new(minor, 2), currency, includes_tax, formatted)
    }

    /// Line subtotal for `quantity` units of this price.
    #[must_use]
    pub fn line_total(&self, quantity: u32) -> Decimal {
        self.amount * Decimal::from(quantity)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_total_multiplies_amount_by_quantity() {
        let price = Price::new(Decimal::from(250), "RUB", true, "250 ₽");
        assert_eq!(price.line_total(2), Decimal::from(500));
        assert_eq!(price.line_total(0), Decimal::ZERO);
    }

    #[test]
    fn from_minor_units_scales_to_standard_unit() {
        let price = Price::from_minor_units(25000, "RUB", true, "250 ₽");
        assert_eq!(price.amount, Decimal::from(250));
    }

    #[test]
    fn display_uses_backend_formatting() {
        let price = Price::from_minor_units(40000, "RUB", true, "400 ₽");
        assert_eq!(price.to_string(), "400 ₽");
    }
}
