// Input Parser - one line of free text (or one web form) → Record
// Three sale-line grammars, one active per process

use crate::record::{Amount, Record, Source, RIEL};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::IntErrorKind;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// CORE TYPES
// ============================================================================

/// Grammar - the textual format a front end expects for a sale line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Grammar {
    /// `Item, Qty, Price` - total is `Qty * Price`
    #[default]
    ItemQtyPrice,
    /// `item, amount` - amount is a decimal, total equals amount
    ItemAmount,
    /// `Item Price` - split on the last whitespace run
    ItemPrice,
}

impl Grammar {
    pub const ALL: [Grammar; 3] = [Grammar::ItemQtyPrice, Grammar::ItemAmount, Grammar::ItemPrice];

    /// Configuration name
    pub fn name(&self) -> &'static str {
        match self {
            Grammar::ItemQtyPrice => "item-qty-price",
            Grammar::ItemAmount => "item-amount",
            Grammar::ItemPrice => "item-price",
        }
    }

    /// Expected-format hint shown to users on a parse failure
    pub fn hint(&self) -> &'static str {
        match self {
            Grammar::ItemQtyPrice => "Item, Qty, Price",
            Grammar::ItemAmount => "item, amount",
            Grammar::ItemPrice => "Item Price",
        }
    }

    pub fn currency(&self) -> Option<&'static str> {
        match self {
            Grammar::ItemQtyPrice | Grammar::ItemPrice => Some(RIEL),
            Grammar::ItemAmount => None,
        }
    }

    fn field_count(&self) -> usize {
        match self {
            Grammar::ItemQtyPrice => 3,
            Grammar::ItemAmount | Grammar::ItemPrice => 2,
        }
    }

    /// Parse one line of text into a record
    ///
    /// Never panics on malformed input; every failure comes back as a
    /// `ParseError` carrying this grammar's hint.
    ///
    /// # Examples
    ///
    /// ```
    /// use sales_ledger::{Amount, Grammar, Source};
    ///
    /// let record = Grammar::ItemQtyPrice.parse("Apple, 5, 2000", Source::Cli).unwrap();
    /// assert_eq!(record.qty, Some(5));
    /// assert_eq!(record.total, Amount::Whole(10000));
    ///
    /// assert!(Grammar::ItemQtyPrice.parse("Apple", Source::Cli).is_err());
    /// ```
    pub fn parse(&self, line: &str, source: Source) -> Result<Record, ParseError> {
        let fields = self.split(line).map_err(|reason| self.error(reason))?;
        self.parse_fields(&fields, source)
    }

    /// Build a record from fields that were already split (e.g. a web form)
    pub fn parse_fields(&self, fields: &SaleFields, source: Source) -> Result<Record, ParseError> {
        self.build(fields, source).map_err(|reason| self.error(reason))
    }

    fn error(&self, reason: ParseFailure) -> ParseError {
        ParseError {
            grammar: *self,
            reason,
        }
    }

    fn split(&self, line: &str) -> Result<SaleFields, ParseFailure> {
        let line = line.trim();

        match self {
            Grammar::ItemQtyPrice => {
                let parts: Vec<&str> = line.split(',').collect();
                match parts.as_slice() {
                    [item, qty, price] => Ok(SaleFields::new(item, Some(*qty), price)),
                    _ => Err(ParseFailure::FieldCount {
                        expected: 3,
                        found: parts.len(),
                    }),
                }
            }
            Grammar::ItemAmount => {
                let parts: Vec<&str> = line.split(',').collect();
                match parts.as_slice() {
                    [item, amount] => Ok(SaleFields::new(item, None, amount)),
                    _ => Err(ParseFailure::FieldCount {
                        expected: 2,
                        found: parts.len(),
                    }),
                }
            }
            Grammar::ItemPrice => match line.rsplit_once(char::is_whitespace) {
                Some((item, price)) => Ok(SaleFields::new(item, None, price)),
                None => Err(ParseFailure::FieldCount {
                    expected: 2,
                    found: if line.is_empty() { 0 } else { 1 },
                }),
            },
        }
    }

    fn build(&self, fields: &SaleFields, source: Source) -> Result<Record, ParseFailure> {
        let item = fields.item.trim();
        let qty = fields.qty.as_deref().map(str::trim).filter(|q| !q.is_empty());

        match (self, qty) {
            (Grammar::ItemQtyPrice, None) => {
                return Err(ParseFailure::MissingField { field: "qty" });
            }
            (Grammar::ItemAmount | Grammar::ItemPrice, Some(_)) => {
                return Err(ParseFailure::FieldCount {
                    expected: self.field_count(),
                    found: self.field_count() + 1,
                });
            }
            _ => {}
        }

        if item.is_empty() {
            return Err(ParseFailure::EmptyItem);
        }

        let currency = self.currency().map(str::to_string);

        let record = match self {
            Grammar::ItemQtyPrice => {
                let qty = parse_whole("qty", qty.unwrap_or_default())?;
                let price = parse_whole("price", &fields.price)?;
                let total = qty.checked_mul(price).ok_or(ParseFailure::Overflow)?;
                Record::new(
                    item.to_string(),
                    Some(qty),
                    Amount::Whole(price),
                    Amount::Whole(total),
                    currency,
                    source,
                )
            }
            Grammar::ItemAmount => {
                let amount = Amount::Decimal(parse_decimal("amount", &fields.price)?);
                Record::new(item.to_string(), None, amount, amount, currency, source)
            }
            Grammar::ItemPrice => {
                let price = Amount::Whole(parse_whole("price", &fields.price)?);
                Record::new(item.to_string(), None, price, price, currency, source)
            }
        };

        Ok(record)
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Grammar {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Grammar::ALL
            .into_iter()
            .find(|g| g.name() == wanted)
            .ok_or_else(|| {
                format!(
                    "unknown grammar `{}` (expected one of: item-qty-price, item-amount, item-price)",
                    s
                )
            })
    }
}

/// SaleFields - a sale line already split into its parts
///
/// `qty` is only meaningful for `Grammar::ItemQtyPrice`; for the other
/// grammars `price` holds the amount/price field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleFields {
    pub item: String,
    #[serde(default)]
    pub qty: Option<String>,
    pub price: String,
}

impl SaleFields {
    pub fn new(item: &str, qty: Option<&str>, price: &str) -> Self {
        SaleFields {
            item: item.to_string(),
            qty: qty.map(str::to_string),
            price: price.to_string(),
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Why a line was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("item is empty")]
    EmptyItem,

    #[error("{field} is missing")]
    MissingField { field: &'static str },

    #[error("{field} `{value}` is not a number")]
    NotANumber { field: &'static str, value: String },

    #[error("{field} must not be negative")]
    Negative { field: &'static str },

    #[error("number is too large")]
    Overflow,
}

/// Invalid-format outcome: the rejected reason plus the grammar it was checked against
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid format ({reason}), expected: {}", .grammar.hint())]
pub struct ParseError {
    pub grammar: Grammar,
    pub reason: ParseFailure,
}

impl ParseError {
    pub fn hint(&self) -> &'static str {
        self.grammar.hint()
    }
}

// ============================================================================
// NUMBER FIELDS
// ============================================================================

fn parse_whole(field: &'static str, raw: &str) -> Result<u64, ParseFailure> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ParseFailure::MissingField { field });
    }
    // -0 is zero, like -0.0 for decimals
    if let Some(rest) = value.strip_prefix('-') {
        match rest.parse::<u64>() {
            Ok(0) => return Ok(0),
            Ok(_) => return Err(ParseFailure::Negative { field }),
            Err(_) => {}
        }
    }

    value.parse::<u64>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow => ParseFailure::Overflow,
        _ => ParseFailure::NotANumber {
            field,
            value: value.to_string(),
        },
    })
}

fn parse_decimal(field: &'static str, raw: &str) -> Result<f64, ParseFailure> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ParseFailure::MissingField { field });
    }

    let number = value
        .parse::<f64>()
        .ok()
        .filter(|x| x.is_finite())
        .ok_or_else(|| ParseFailure::NotANumber {
            field,
            value: value.to_string(),
        })?;

    if number < 0.0 {
        return Err(ParseFailure::Negative { field });
    }

    // -0.0 → 0.0
    Ok(number.abs())
}

// ============================================================================
// TESTS
// ============================================================================
