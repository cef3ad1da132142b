use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A statement row exactly as the ingestion layer found it.
///
/// Nothing here has been validated yet: the enricher parses `date` and
/// `amount` and drops (and counts) the row when either is unusable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    /// Date or date-time text.
    pub date: String,
    /// Amount text, possibly with currency symbol and separators.
    pub amount: String,
    /// Free-text description; may be empty.
    #[serde(default)]
    pub description: String,
    /// File name the row was read from, if any.
    #[serde(default)]
    pub source: Option<String>,
    /// 1-based data row number within `source`.
    #[serde(default)]
    pub row: Option<usize>,
}

impl RawTransaction {
    /// Build a raw row without provenance.
    pub fn new(
        date: impl Into<String>,
        amount: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            date: date.into(),
            amount: amount.into(),
            description: description.into(),
            source: None,
            row: None,
        }
    }
}

/// A validated transaction. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Local calendar date-time of the transaction.
    pub date: NaiveDateTime,
    /// Negative = expense, positive = income or refund.
    pub amount: Decimal,
    /// Free-text description; may be empty.
    pub description: String,
    /// File name the record came from, if any.
    #[serde(default)]
    pub source: Option<String>,
}

impl TransactionRecord {
    /// Create a record without provenance.
    pub fn new(date: NaiveDateTime, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            date,
            amount,
            description: description.into(),
            source: None,
        }
    }

    /// Calendar date part of [`Self::date`].
    pub fn day(&self) -> NaiveDate {
        self.date.date()
    }

    /// Returns true if this is an expense (negative amount).
    pub fn is_expense(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    /// Returns true if this is income (positive amount).
    pub fn is_income(&self) -> bool {
        self.amount > Decimal::ZERO
    }
}

// ── YearMonth ─────────────────────────────────────────────────────────────────

/// A calendar month of a specific year, ordered chronologically.
///
/// Displayed and serialised as `"YYYY-MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Returns `None` when `month` is not in `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// The month containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The following month.
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// The preceding month.
    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// First day of the month.
    pub fn first_day(&self) -> NaiveDate {
        // Every YearMonth holds a valid month, so day 1 always exists
        // within chrono's supported year range.
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Day `day` of this month, if it exists.
    pub fn day(&self, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, day)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got \"{s}\""))?;
        let year: i32 = y.parse().map_err(|_| format!("invalid year in \"{s}\""))?;
        let month: u32 = m.parse().map_err(|_| format!("invalid month in \"{s}\""))?;
        Self::new(year, month).ok_or_else(|| format!("month out of range in \"{s}\""))
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── CycleLabel ────────────────────────────────────────────────────────────────

/// Sentinel text for dates outside every generated billing cycle.
pub const OUT_OF_RANGE: &str = "OUT_OF_RANGE";

/// Which billing cycle a date belongs to.
///
/// A cycle is named after the month in which it closes, so with a start day
/// of 17 the cycle running 2025-09-17..=2025-10-16 is `"2025-10"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CycleLabel {
    Cycle(YearMonth),
    OutOfRange,
}

impl CycleLabel {
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, CycleLabel::OutOfRange)
    }

    /// The closing month, or `None` for the sentinel.
    pub fn month(&self) -> Option<YearMonth> {
        match self {
            CycleLabel::Cycle(ym) => Some(*ym),
            CycleLabel::OutOfRange => None,
        }
    }
}

impl fmt::Display for CycleLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleLabel::Cycle(ym) => ym.fmt(f),
            CycleLabel::OutOfRange => f.write_str(OUT_OF_RANGE),
        }
    }
}

impl Serialize for CycleLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ── EnrichedTransaction ───────────────────────────────────────────────────────

/// A validated record plus every bucket coordinate and its category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichedTransaction {
    #[serde(flatten)]
    pub record: TransactionRecord,
    /// Three-letter month abbreviation of the record date.
    pub calendar_month_label: &'static str,
    /// `ceil(day / 7)`, always in `1..=5`.
    pub calendar_week_of_month: u32,
    /// Billing cycle the date falls in.
    pub billing_cycle_label: CycleLabel,
    /// Week within the billing cycle, `0` when out of range.
    pub billing_cycle_week: u32,
    /// Exactly one category from the active rule set.
    pub category: String,
}

impl EnrichedTransaction {
    /// Calendar date of the underlying record.
    pub fn day(&self) -> NaiveDate {
        self.record.day()
    }

    /// Year-month of the underlying record (not the billing cycle).
    pub fn year_month(&self) -> YearMonth {
        YearMonth::of(self.day())
    }

    pub fn amount(&self) -> Decimal {
        self.record.amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── YearMonth ─────────────────────────────────────────────────────────────

    #[test]
    fn test_year_month_rejects_bad_month() {
        assert!(YearMonth::new(2025, 0).is_none());
        assert!(YearMonth::new(2025, 13).is_none());
        assert!(YearMonth::new(2025, 12).is_some());
    }

    #[test]
    fn test_year_month_next_wraps_year() {
        let dec = YearMonth::new(2025, 12).unwrap();
        assert_eq!(dec.next(), YearMonth::new(2026, 1).unwrap());
        assert_eq!(dec.next().prev(), dec);
    }

    #[test]
    fn test_year_month_ordering_is_chronological() {
        let a = YearMonth::new(2024, 12).unwrap();
        let b = YearMonth::new(2025, 1).unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_year_month_display_and_parse() {
        let ym = YearMonth::new(2025, 9).unwrap();
        assert_eq!(ym.to_string(), "2025-09");
        assert_eq!("2025-09".parse::<YearMonth>().unwrap(), ym);
        assert!("2025/09".parse::<YearMonth>().is_err());
        assert!("2025-13".parse::<YearMonth>().is_err());
    }

    // ── CycleLabel ────────────────────────────────────────────────────────────

    #[test]
    fn test_cycle_label_display() {
        let label = CycleLabel::Cycle(YearMonth::new(2025, 10).unwrap());
        assert_eq!(label.to_string(), "2025-10");
        assert_eq!(CycleLabel::OutOfRange.to_string(), "OUT_OF_RANGE");
    }

    #[test]
    fn test_cycle_label_serialises_as_text() {
        let label = CycleLabel::Cycle(YearMonth::new(2025, 10).unwrap());
        assert_eq!(serde_json::to_string(&label).unwrap(), "\"2025-10\"");
        assert_eq!(
            serde_json::to_string(&CycleLabel::OutOfRange).unwrap(),
            "\"OUT_OF_RANGE\""
        );
    }

    // ── TransactionRecord ─────────────────────────────────────────────────────

    #[test]
    fn test_record_sign_helpers() {
        let date = NaiveDate::from_ymd_opt(2025, 9, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let expense = TransactionRecord::new(date, Decimal::new(-5000, 2), "ifood");
        assert!(expense.is_expense());
        assert!(!expense.is_income());

        let zero = TransactionRecord::new(date, Decimal::ZERO, "ajuste");
        assert!(!zero.is_expense());
        assert!(!zero.is_income());
    }
}
