use super::contract::UserId;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    VeryHigh,
    High,
    Medium,
    Low,
    #[default]
    Unknown,
}

/// Category assigned to a transaction by its source.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct CategoryClassification {
    pub primary: String,
    pub detailed: Option<String>,
    #[serde(default)]
    pub confidence: Confidence,
}

/// A read-only spending record supplied by a transaction feed.
///
/// Positive amounts are outflows; only those count toward a limit.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Transaction {
    pub id: String,
    pub user_id: UserId,
    pub name: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub category: CategoryClassification,
    /// Entered by hand rather than pulled from the banking provider.
    #[serde(default)]
    pub is_mock: bool,
}

impl Transaction {
    pub fn is_outflow(&self) -> bool {
        self.amount > Decimal::ZERO
    }
}

/// Inclusive calendar range.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Returns `None` when `end` falls before `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Smallest range covering both.
    pub fn union(self, other: DateRange) -> DateRange {
        DateRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}
