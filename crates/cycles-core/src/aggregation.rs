//! Bucketed summaries over enriched transactions.
//!
//! Aggregation is split in two phases. [`PartialSummary`] only sums totals
//! and counts per key, so partials built from any partition of the input can
//! be merged in any order. [`PartialSummary::finish`] then derives means,
//! shares of the grand total, per-period averages and the insight queries.
//! Amounts are [`Decimal`], which keeps merged sums exactly equal to direct
//! ones.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use clap::ValueEnum;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};

use crate::models::{EnrichedTransaction, TransactionRecord, YearMonth};

// ── Measure ───────────────────────────────────────────────────────────────────

/// Which value of a transaction is summed into its bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Measure {
    /// Raw signed amounts; income offsets spending.
    Signed,
    /// Expenses only, as positive magnitudes. Income and zero rows are skipped.
    #[default]
    Spending,
}

impl Measure {
    /// Contribution of `tx`, or `None` when the measure ignores it.
    pub fn value(&self, tx: &EnrichedTransaction) -> Option<Decimal> {
        let amount = tx.amount();
        match self {
            Measure::Signed => Some(amount),
            Measure::Spending => tx.record.is_expense().then(|| -amount),
        }
    }
}

// ── Dimension / BucketKey ─────────────────────────────────────────────────────

/// A grouping axis for summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Dimension {
    /// Week of the calendar month (1–5).
    CalendarWeek,
    /// Week within the billing cycle (1–4); out-of-range dates excluded.
    CycleWeek,
    /// Billing cycle label; out-of-range dates excluded.
    Cycle,
    Category,
    /// Calendar year-month.
    Month,
}

impl Dimension {
    /// Every dimension, in report order.
    pub const ALL: [Dimension; 5] = [
        Dimension::CalendarWeek,
        Dimension::CycleWeek,
        Dimension::Cycle,
        Dimension::Category,
        Dimension::Month,
    ];

    /// Bucket of `tx` along this dimension.
    pub fn key(&self, tx: &EnrichedTransaction) -> Option<BucketKey> {
        match self {
            Dimension::CalendarWeek => Some(BucketKey::CalendarWeek(tx.calendar_week_of_month)),
            Dimension::CycleWeek => {
                if tx.billing_cycle_label.is_out_of_range() || tx.billing_cycle_week == 0 {
                    None
                } else {
                    Some(BucketKey::CycleWeek(tx.billing_cycle_week))
                }
            }
            Dimension::Cycle => tx.billing_cycle_label.month().map(BucketKey::Cycle),
            Dimension::Category => Some(BucketKey::Category(tx.category.clone())),
            Dimension::Month => Some(BucketKey::Month(tx.year_month())),
        }
    }

    /// Short heading used in reports.
    pub fn title(&self) -> &'static str {
        match self {
            Dimension::CalendarWeek => "Calendar week",
            Dimension::CycleWeek => "Billing-cycle week",
            Dimension::Cycle => "Billing cycle",
            Dimension::Category => "Category",
            Dimension::Month => "Month",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dimension::CalendarWeek => "calendar-week",
            Dimension::CycleWeek => "cycle-week",
            Dimension::Cycle => "cycle",
            Dimension::Category => "category",
            Dimension::Month => "month",
        };
        f.write_str(name)
    }
}

/// A bucket along one [`Dimension`]. A summary only ever holds keys of one
/// variant, so the derived ordering is the natural order of that variant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketKey {
    CalendarWeek(u32),
    CycleWeek(u32),
    Cycle(YearMonth),
    Category(String),
    Month(YearMonth),
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketKey::CalendarWeek(w) | BucketKey::CycleWeek(w) => write!(f, "{w}"),
            BucketKey::Cycle(ym) | BucketKey::Month(ym) => ym.fmt(f),
            BucketKey::Category(name) => f.write_str(name),
        }
    }
}

impl Serialize for BucketKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BucketKey::CalendarWeek(w) | BucketKey::CycleWeek(w) => serializer.serialize_u32(*w),
            _ => serializer.collect_str(self),
        }
    }
}

// ── BucketStats / PartialSummary ──────────────────────────────────────────────

/// Running total and count for one bucket.
///
/// Totals saturate at the bounds of [`Decimal`] instead of overflowing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketStats {
    pub total: Decimal,
    pub count: usize,
}

impl BucketStats {
    pub fn add(&mut self, amount: Decimal) {
        self.total = self.total.saturating_add(amount);
        self.count += 1;
    }

    pub fn merge(&mut self, other: &BucketStats) {
        self.total = self.total.saturating_add(other.total);
        self.count += other.count;
    }
}

/// Totals and counts per key, without any derived statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialSummary<K: Ord> {
    buckets: BTreeMap<K, BucketStats>,
}

impl<K: Ord> Default for PartialSummary<K> {
    fn default() -> Self {
        Self {
            buckets: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone> PartialSummary<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate records into a fresh partial.
    pub fn from_records<'a, I, F>(records: I, key_fn: F, measure: Measure) -> Self
    where
        I: IntoIterator<Item = &'a EnrichedTransaction>,
        F: FnMut(&EnrichedTransaction) -> Option<K>,
    {
        let mut partial = Self::new();
        partial.extend(records, key_fn, measure);
        partial
    }

    pub fn add(&mut self, key: K, amount: Decimal) {
        self.buckets.entry(key).or_default().add(amount);
    }

    /// Accumulate every record the measure and `key_fn` both accept.
    pub fn extend<'a, I, F>(&mut self, records: I, mut key_fn: F, measure: Measure)
    where
        I: IntoIterator<Item = &'a EnrichedTransaction>,
        F: FnMut(&EnrichedTransaction) -> Option<K>,
    {
        for tx in records {
            let Some(value) = measure.value(tx) else {
                continue;
            };
            if let Some(key) = key_fn(tx) {
                self.add(key, value);
            }
        }
    }

    /// Fold `other` into `self`. Commutative and associative.
    pub fn merge(&mut self, other: &PartialSummary<K>) {
        for (key, stats) in &other.buckets {
            self.buckets.entry(key.clone()).or_default().merge(stats);
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<&BucketStats> {
        self.buckets.get(key)
    }

    /// Derive the final summary, normalising per-period averages by `periods`.
    pub fn finish(self, periods: usize) -> Summary<K> {
        let grand_total = self
            .buckets
            .values()
            .fold(Decimal::ZERO, |acc, s| acc.saturating_add(s.total));
        let period_divisor = Decimal::from(periods);
        let hundred = Decimal::ONE_HUNDRED;

        let rows = self
            .buckets
            .into_iter()
            .map(|(key, stats)| {
                let mean = div_or_zero(stats.total, Decimal::from(stats.count));
                let percent_of_total = match stats.total.checked_mul(hundred) {
                    Some(scaled) => div_or_zero(scaled, grand_total),
                    None => div_or_zero(stats.total, grand_total).saturating_mul(hundred),
                };
                let average_per_period = div_or_zero(stats.total, period_divisor);
                SummaryRow {
                    key,
                    total: stats.total,
                    count: stats.count,
                    mean,
                    percent_of_total,
                    average_per_period,
                }
            })
            .collect();

        Summary {
            rows,
            grand_total,
            periods,
        }
    }
}

fn div_or_zero(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        return Decimal::ZERO;
    }
    numerator
        .checked_div(denominator)
        .unwrap_or(Decimal::ZERO)
        .round_dp(DERIVED_DP)
        .normalize()
}

/// Decimal places kept on derived statistics (means, shares, averages).
const DERIVED_DP: u32 = 4;

// ── Summary ───────────────────────────────────────────────────────────────────

/// One emitted bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow<K> {
    pub key: K,
    pub total: Decimal,
    pub count: usize,
    pub mean: Decimal,
    /// Share of the grand total, in percent. `0` when the grand total is zero.
    pub percent_of_total: Decimal,
    /// `total / periods`. `0` when there are no periods.
    pub average_per_period: Decimal,
}

/// Finished summary: rows in ascending key order plus insight queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary<K> {
    rows: Vec<SummaryRow<K>>,
    grand_total: Decimal,
    periods: usize,
}

impl<K> Summary<K> {
    pub fn rows(&self) -> &[SummaryRow<K>] {
        &self.rows
    }

    pub fn grand_total(&self) -> Decimal {
        self.grand_total
    }

    pub fn periods(&self) -> usize {
        self.periods
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Bucket with the largest total.
    pub fn peak(&self) -> Option<&SummaryRow<K>> {
        self.argmax(|row| row.total)
    }

    /// Bucket with the most transactions.
    pub fn most_active(&self) -> Option<&SummaryRow<K>> {
        self.argmax(|row| row.count)
    }

    /// Bucket with the largest mean amount.
    pub fn highest_average(&self) -> Option<&SummaryRow<K>> {
        self.argmax(|row| row.mean)
    }

    /// First row (smallest key) holding the maximum of `metric`.
    fn argmax<V, F>(&self, metric: F) -> Option<&SummaryRow<K>>
    where
        V: PartialOrd,
        F: Fn(&SummaryRow<K>) -> V,
    {
        let mut best: Option<(&SummaryRow<K>, V)> = None;
        for row in &self.rows {
            let value = metric(row);
            let better = match &best {
                Some((_, current)) => value > *current,
                None => true,
            };
            if better {
                best = Some((row, value));
            }
        }
        best.map(|(row, _)| row)
    }
}

impl<K: PartialEq> Summary<K> {
    pub fn get(&self, key: &K) -> Option<&SummaryRow<K>> {
        self.rows.iter().find(|row| row.key == *key)
    }
}

// ── Entry points ──────────────────────────────────────────────────────────────

/// Group signed amounts by `key_fn` and summarise. Records for which
/// `key_fn` returns `None` are left out.
pub fn summarize<'a, K, I, F>(records: I, key_fn: F, periods: usize) -> Summary<K>
where
    K: Ord + Clone,
    I: IntoIterator<Item = &'a EnrichedTransaction>,
    F: FnMut(&EnrichedTransaction) -> Option<K>,
{
    summarize_with(records, key_fn, periods, Measure::Signed)
}

/// Like [`summarize`] with an explicit [`Measure`].
pub fn summarize_with<'a, K, I, F>(
    records: I,
    key_fn: F,
    periods: usize,
    measure: Measure,
) -> Summary<K>
where
    K: Ord + Clone,
    I: IntoIterator<Item = &'a EnrichedTransaction>,
    F: FnMut(&EnrichedTransaction) -> Option<K>,
{
    PartialSummary::from_records(records, key_fn, measure).finish(periods)
}

/// Summarise along a [`Dimension`].
pub fn summarize_dimension<'a, I>(
    records: I,
    dimension: Dimension,
    periods: usize,
    measure: Measure,
) -> Summary<BucketKey>
where
    I: IntoIterator<Item = &'a EnrichedTransaction>,
{
    summarize_with(records, |tx| dimension.key(tx), periods, measure)
}

/// Number of distinct calendar year-months among `records`.
pub fn distinct_months<'a, I>(records: I) -> usize
where
    I: IntoIterator<Item = &'a EnrichedTransaction>,
{
    records
        .into_iter()
        .map(EnrichedTransaction::year_month)
        .collect::<BTreeSet<_>>()
        .len()
}

// ── CashFlow ──────────────────────────────────────────────────────────────────

/// Income, expenses and net balance of a set of transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CashFlow {
    /// Sum of positive amounts.
    pub income: Decimal,
    /// Sum of negative amounts, as a positive magnitude.
    pub expenses: Decimal,
    /// `income - expenses`.
    pub net: Decimal,
    pub transactions: usize,
}

impl CashFlow {
    pub fn of<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a EnrichedTransaction>,
    {
        let mut flow = CashFlow::default();
        for tx in records {
            flow.add(&tx.record);
        }
        flow
    }

    pub fn add(&mut self, record: &TransactionRecord) {
        if record.is_income() {
            self.income = self.income.saturating_add(record.amount);
        } else if record.is_expense() {
            self.expenses = self.expenses.saturating_sub(record.amount);
        }
        self.net = self.net.saturating_add(record.amount);
        self.transactions += 1;
    }

    pub fn merge(&mut self, other: &CashFlow) {
        self.income = self.income.saturating_add(other.income);
        self.expenses = self.expenses.saturating_add(other.expenses);
        self.net = self.net.saturating_add(other.net);
        self.transactions += other.transactions;
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
