// Sale record - the unit of data stored in the ledger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Riel symbol, the currency label attached to whole-number sales
pub const RIEL: &str = "៛";

// ============================================================================
// AMOUNT
// ============================================================================

/// Amount - a price or total
///
/// Grammars with integer prices produce `Whole`, the flat-amount grammar
/// produces `Decimal`. Serialized as a bare JSON number either way.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Whole(u64),
    Decimal(f64),
}

impl Amount {
    pub fn as_f64(&self) -> f64 {
        match self {
            Amount::Whole(n) => *n as f64,
            Amount::Decimal(x) => *x,
        }
    }

    /// Non-negative and finite
    pub fn is_valid(&self) -> bool {
        match self {
            Amount::Whole(_) => true,
            Amount::Decimal(x) => x.is_finite() && *x >= 0.0,
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Whole(n) => write!(f, "{}", n),
            Amount::Decimal(x) => write!(f, "{}", x),
        }
    }
}

// ============================================================================
// SOURCE
// ============================================================================

/// Which entry point produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Bot,
    Dashboard,
    Cli,
    Import,
}

impl Source {
    pub fn name(&self) -> &str {
        match self {
            Source::Bot => "bot",
            Source::Dashboard => "dashboard",
            Source::Cli => "cli",
            Source::Import => "import",
        }
    }
}

// ============================================================================
// RECORD
// ============================================================================

/// One logged sale
///
/// Immutable once appended: the ledger never updates or deletes a record.
/// Field names on disk (`item`, `qty`, `price`, `total`) match the
/// historical `sales.json` layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: Uuid,

    pub item: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qty: Option<u64>,

    /// Unit price when `qty` is present, otherwise the flat amount
    pub price: Amount,

    pub total: Amount,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    pub timestamp: DateTime<Utc>,

    pub source: Source,
}

impl Record {
    /// Create a record stamped with a fresh id and the current time
    pub fn new(
        item: String,
        qty: Option<u64>,
        price: Amount,
        total: Amount,
        currency: Option<String>,
        source: Source,
    ) -> Self {
        Record {
            id: Uuid::new_v4(),
            item,
            qty,
            price,
            total,
            currency,
            timestamp: Utc::now(),
            source,
        }
    }

    /// Builder pattern: re-tag the entry point
    pub fn with_source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    /// Check the invariants a stored record must hold
    ///
    /// Returns a description of the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if self.item.trim().is_empty() {
            return Err("item is empty".to_string());
        }
        if !self.price.is_valid() {
            return Err(format!("price {} is negative or not finite", self.price));
        }
        if !self.total.is_valid() {
            return Err(format!("total {} is negative or not finite", self.total));
        }

        match (self.qty, self.price) {
            (Some(qty), Amount::Whole(price)) => {
                let expected = qty.checked_mul(price).map(Amount::Whole);
                if expected != Some(self.total) {
                    return Err(format!(
                        "total {} does not equal {} x {}",
                        self.total, qty, price
                    ));
                }
            }
            (Some(_), Amount::Decimal(_)) => {
                return Err("quantity given with a decimal price".to_string());
            }
            (None, price) => {
                if price != self.total {
                    return Err(format!(
                        "total {} does not equal amount {}",
                        self.total, price
                    ));
                }
            }
        }

        Ok(())
    }

    /// Total with its currency label, e.g. `10000 ៛`
    pub fn total_label(&self) -> String {
        match &self.currency {
            Some(currency) => format!("{} {}", self.total, currency),
            None => self.total.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apple(qty: u64, price: u64) -> Record {
        Record::new(
            "Apple".to_string(),
            Some(qty),
            Amount::Whole(price),
            Amount::Whole(qty * price),
            Some(RIEL.to_string()),
            Source::Cli,
        )
    }

    #[test]
    fn test_json_field_names() {
        let record = apple(5, 2000);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["item"], "Apple");
        assert_eq!(json["qty"], 5);
        assert_eq!(json["price"], 2000);
        assert_eq!(json["total"], 10000);
        assert_eq!(json["currency"], "៛");
        assert_eq!(json["source"], "cli");
    }

    #[test]
    fn test_optional_fields_omitted() {
        let record = Record::new(
            "coffee".to_string(),
            None,
            Amount::Decimal(2.5),
            Amount::Decimal(2.5),
            None,
            Source::Bot,
        );
        let json = serde_json::to_value(&record).unwrap();

        assert!(json.get("qty").is_none());
        assert!(json.get("currency").is_none());
        assert_eq!(json["price"], 2.5);
    }

    #[test]
    fn test_amount_untagged_decoding() {
        let whole: Amount = serde_json::from_str("2000").unwrap();
        let decimal: Amount = serde_json::from_str("12.5").unwrap();

        assert_eq!(whole, Amount::Whole(2000));
        assert_eq!(decimal, Amount::Decimal(12.5));
    }

    #[test]
    fn test_validate_accepts_consistent_record() {
        assert!(apple(5, 2000).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_wrong_total() {
        let mut record = apple(5, 2000);
        record.total = Amount::Whole(9999);

        let err = record.validate().unwrap_err();
        assert!(err.contains("does not equal"));
    }

    #[test]
    fn test_validate_rejects_negative_amount() {
        let record = Record::new(
            "refund".to_string(),
            None,
            Amount::Decimal(-1.0),
            Amount::Decimal(-1.0),
            None,
            Source::Dashboard,
        );

        assert!(record.validate().is_err());
    }

    #[test]
    fn test_total_label() {
        assert_eq!(apple(2, 1500).total_label(), "3000 ៛");
    }
}
