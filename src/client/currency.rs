//! Display-side currency conversion for listing prices.
//!
//! Prices are stored in Mauritian rupees; the rates below are fixed and only
//! meant for showing an approximate price in another currency.

use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Currency {
    Mur,
    Usd,
    Eur,
}

impl FromStr for Currency {
    type Err = CurrencyError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        match code.trim().to_ascii_uppercase().as_str() {
            "MUR" => Ok(Currency::Mur),
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            _ => Err(CurrencyError::UnsupportedCurrency(code.to_string())),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CurrencyError {
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),
}

/// Static rate for one unit of `from` in `to`.
pub fn rate(from: Currency, to: Currency) -> f64 {
    match (from, to) {
        (Currency::Mur, Currency::Usd) => 0.021,
        (Currency::Mur, Currency::Eur) => 0.019,
        (Currency::Usd, Currency::Mur) => 45.5,
        (Currency::Usd, Currency::Eur) => 0.92,
        (Currency::Eur, Currency::Mur) => 49.5,
        (Currency::Eur, Currency::Usd) => 1.09,
        _ => 1.0,
    }
}

/// Round to 2 decimal places
pub fn round_to_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Strict conversion: unknown currency codes are an error.
pub fn try_convert_currency(amount: f64, from: &str, to: &str) -> Result<f64, CurrencyError> {
    if from.trim().eq_ignore_ascii_case(to.trim()) {
        return Ok(amount);
    }

    let from = from.parse::<Currency>()?;
    let to = to.parse::<Currency>()?;

    Ok(round_to_cents(amount * rate(from, to)))
}

/// Lenient conversion: an unsupported pair logs a warning and returns the
/// amount unchanged.
pub fn convert_currency(amount: f64, from: &str, to: &str) -> f64 {
    match try_convert_currency(amount, from, to) {
        Ok(converted) => converted,
        Err(e) => {
            tracing::warn!("Cannot convert {} from {} to {}: {}", amount, from, to, e);
            amount
        }
    }
}
