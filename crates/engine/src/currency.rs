use serde::{Deserialize, Serialize};

use crate::EngineError;

/// ISO currency code of a trip ledger and its expenses.
///
/// A trip keeps its expenses in a single currency; the engine never converts
/// between currencies, it refuses to mix them.
///
/// ## Minor units
///
/// Monetary values are stored as an `i64` number of **minor units** (see
/// `Money`). Every supported currency uses 2 fraction digits, so
/// `10.50 EUR` ⇄ `1050`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Eur,
    Usd,
    Gbp,
    Chf,
}

impl Currency {
    /// Canonical currency code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
            Currency::Chf => "CHF",
        }
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<&str> for Currency {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "EUR" => Ok(Currency::Eur),
            "USD" => Ok(Currency::Usd),
            "GBP" => Ok(Currency::Gbp),
            "CHF" => Ok(Currency::Chf),
            other => Err(EngineError::CurrencyMismatch(format!(
                "unsupported currency: {other}"
            ))),
        }
    }
}

/// Ensure an expense currency matches the trip ledger currency.
pub(crate) fn ensure_trip_currency(trip_currency: Currency, actual: Currency) -> Result<(), EngineError> {
    if trip_currency != actual {
        return Err(EngineError::CurrencyMismatch(format!(
            "trip currency is {}, got {}",
            trip_currency.code(),
            actual.code()
        )));
    }
    Ok(())
}
