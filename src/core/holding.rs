//! Holdings as stored by the user and their canonical, ingested form.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    #[default]
    #[serde(alias = "stock", alias = "etf")]
    Equity,
    #[serde(alias = "mf", alias = "fund")]
    MutualFund,
    #[serde(alias = "cryptocurrency")]
    Crypto,
    #[serde(alias = "fx", alias = "currency")]
    Forex,
    Commodity,
    #[serde(alias = "fixed", alias = "property")]
    FixedAsset,
}

impl AssetClass {
    /// Equities and funds are merged per instrument; everything else stays 1:1.
    pub fn is_grouped(&self) -> bool {
        matches!(self, AssetClass::Equity | AssetClass::MutualFund)
    }

    fn default_exchange(&self) -> &'static str {
        match self {
            AssetClass::Equity => "",
            AssetClass::MutualFund => "AMFI",
            AssetClass::Crypto => "CRYPTO",
            AssetClass::Forex => "FX",
            AssetClass::Commodity => "COMMODITY",
            AssetClass::FixedAsset => "ASSET",
        }
    }
}

impl Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                AssetClass::Equity => "Equity",
                AssetClass::MutualFund => "Mutual Fund",
                AssetClass::Crypto => "Crypto",
                AssetClass::Forex => "Forex",
                AssetClass::Commodity => "Commodity",
                AssetClass::FixedAsset => "Fixed Asset",
            }
        )
    }
}

/// Identity of a tradable instrument: symbol plus listing venue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrumentKey {
    pub symbol: String,
    pub exchange: String,
}

impl InstrumentKey {
    pub fn new(symbol: &str, exchange: &str) -> Self {
        Self {
            symbol: symbol.trim().to_uppercase(),
            exchange: exchange.trim().to_uppercase(),
        }
    }

    /// Crypto ids are provider slugs ("bitcoin") and stay lowercase.
    pub fn crypto(id: &str) -> Self {
        Self {
            symbol: id.trim().to_lowercase(),
            exchange: AssetClass::Crypto.default_exchange().to_string(),
        }
    }
}

impl Display for InstrumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.exchange.is_empty() {
            write!(f, "{}", self.symbol)
        } else {
            write!(f, "{}:{}", self.symbol, self.exchange)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseLot {
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub currency: String,
    pub date: Option<NaiveDate>,
}

impl PurchaseLot {
    pub fn cost(&self) -> Decimal {
        self.quantity * self.unit_price
    }
}

/// Canonical holding. `quantity` always equals the sum of lot quantities.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub key: InstrumentKey,
    pub name: Option<String>,
    pub asset_class: AssetClass,
    /// Currency the instrument is priced in.
    pub currency: String,
    pub quantity: Decimal,
    pub lots: Vec<PurchaseLot>,
    /// User-entered current value, used for fixed assets and unpriced commodities.
    pub current_value: Option<Decimal>,
}

impl Holding {
    /// Folds another record for the same instrument into this one.
    pub fn absorb(&mut self, other: Holding) {
        self.quantity += other.quantity;
        self.lots.extend(other.lots);
        if self.name.is_none() {
            self.name = other.name;
        }
        self.current_value = match (self.current_value, other.current_value) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };
    }

    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.key.to_string())
    }
}

/// Older records stored the position either as a bare quantity or as a small
/// record with an average price and/or invested amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyHolding {
    Number(Decimal),
    Structured {
        quantity: Decimal,
        #[serde(default, alias = "avgPrice")]
        avg_price: Option<Decimal>,
        #[serde(default)]
        invested: Option<Decimal>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLot {
    pub quantity: Decimal,
    #[serde(alias = "price")]
    pub unit_price: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// A holding as read from persistence, in whichever shape it was saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHolding {
    pub symbol: String,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default, rename = "type", alias = "asset_class")]
    pub asset_class: AssetClass,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub lots: Vec<RawLot>,
    #[serde(default)]
    pub holding: Option<LegacyHolding>,
    #[serde(default)]
    pub current_value: Option<Decimal>,
}

/// Defaults applied while resolving raw records.
#[derive(Debug, Clone)]
pub struct IngestContext {
    pub display_currency: String,
    pub crypto_currency: String,
}

impl RawHolding {
    /// Resolves any stored shape into the canonical holding. No code past
    /// this point looks at the legacy representation.
    pub fn into_holding(self, ctx: &IngestContext) -> Holding {
        let asset_class = self.asset_class;
        let key = match asset_class {
            AssetClass::Crypto => InstrumentKey::crypto(&self.symbol),
            _ => InstrumentKey::new(
                &self.symbol,
                self.exchange
                    .as_deref()
                    .unwrap_or(asset_class.default_exchange()),
            ),
        };
        let currency = self
            .currency
            .map(|c| c.trim().to_uppercase())
            .unwrap_or_else(|| native_currency(asset_class, &key, ctx));

        let lots: Vec<PurchaseLot> = if !self.lots.is_empty() {
            self.lots
                .into_iter()
                .map(|lot| PurchaseLot {
                    quantity: lot.quantity,
                    unit_price: lot.unit_price,
                    currency: lot
                        .currency
                        .map(|c| c.trim().to_uppercase())
                        .unwrap_or_else(|| currency.clone()),
                    date: lot.date,
                })
                .collect()
        } else {
            match self.holding {
                Some(legacy) => vec![synthetic_lot(legacy, &currency)],
                None if asset_class == AssetClass::FixedAsset => vec![PurchaseLot {
                    quantity: Decimal::ONE,
                    unit_price: Decimal::ZERO,
                    currency: currency.clone(),
                    date: None,
                }],
                None => Vec::new(),
            }
        };

        Holding {
            key,
            name: self.name,
            asset_class,
            quantity: lots.iter().map(|l| l.quantity).sum(),
            currency,
            lots,
            current_value: self.current_value,
        }
    }
}

fn synthetic_lot(legacy: LegacyHolding, currency: &str) -> PurchaseLot {
    let (quantity, unit_price) = match legacy {
        LegacyHolding::Number(quantity) => (quantity, Decimal::ZERO),
        LegacyHolding::Structured {
            quantity,
            avg_price,
            invested,
        } => {
            let unit_price = match (avg_price, invested) {
                (Some(avg), _) => avg,
                (None, Some(invested)) if !quantity.is_zero() => invested / quantity,
                _ => Decimal::ZERO,
            };
            (quantity, unit_price)
        }
    };
    PurchaseLot {
        quantity,
        unit_price,
        currency: currency.to_string(),
        date: None,
    }
}

fn native_currency(asset_class: AssetClass, key: &InstrumentKey, ctx: &IngestContext) -> String {
    match asset_class {
        AssetClass::Crypto => ctx.crypto_currency.clone(),
        AssetClass::Forex => key.symbol.clone(),
        AssetClass::MutualFund => "INR".to_string(),
        AssetClass::Equity => currency_for_exchange(&key.exchange)
            .map(str::to_string)
            .unwrap_or_else(|| ctx.display_currency.clone()),
        AssetClass::Commodity | AssetClass::FixedAsset => ctx.display_currency.clone(),
    }
}

/// Trading currency of well-known listing venues.
pub fn currency_for_exchange(exchange: &str) -> Option<&'static str> {
    let currency = match exchange {
        "US" | "NASDAQ" | "NYSE" | "AMEX" | "ARCA" | "BATS" | "OTC" => "USD",
        "NSE" | "BSE" => "INR",
        "LSE" => "GBP",
        "TSX" => "CAD",
        "ASX" => "AUD",
        "XETRA" | "FRA" | "EPA" | "AMS" => "EUR",
        "HKEX" => "HKD",
        "TSE" | "JPX" => "JPY",
        "SGX" => "SGD",
        _ => return None,
    };
    Some(currency)
}
