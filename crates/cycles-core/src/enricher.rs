//! Turns raw statement rows into fully-coordinated transactions.
//!
//! Enrichment parses each row's date and amount, attaches calendar and
//! billing-cycle coordinates, and classifies the description. Rows that fail
//! to parse are dropped and counted per reason; they never abort the stream.

use serde::Serialize;

use crate::calendar::{calendar_week_of_month, month_label, CycleCalendar, MonthLabelStyle};
use crate::classifier::RuleSet;
use crate::models::{EnrichedTransaction, RawTransaction, TransactionRecord};
use crate::parsing::{parse_amount, AmountSign, DateParser};

// ── DropReport ────────────────────────────────────────────────────────────────

/// Why a raw row was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MalformedDate,
    NonNumericAmount,
}

/// Counts of rows rejected during enrichment, per reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DropReport {
    pub malformed_date: usize,
    pub non_numeric_amount: usize,
}

impl DropReport {
    pub fn record(&mut self, reason: DropReason) {
        match reason {
            DropReason::MalformedDate => self.malformed_date += 1,
            DropReason::NonNumericAmount => self.non_numeric_amount += 1,
        }
    }

    pub fn merge(&mut self, other: &DropReport) {
        self.malformed_date += other.malformed_date;
        self.non_numeric_amount += other.non_numeric_amount;
    }

    pub fn total(&self) -> usize {
        self.malformed_date + self.non_numeric_amount
    }
}

// ── TransactionEnricher ───────────────────────────────────────────────────────

/// Applies the cycle calendar and the category rules to transactions.
#[derive(Debug, Clone)]
pub struct TransactionEnricher {
    calendar: CycleCalendar,
    rules: RuleSet,
    parser: DateParser,
    month_style: MonthLabelStyle,
    amount_sign: AmountSign,
}

impl TransactionEnricher {
    pub fn new(
        calendar: CycleCalendar,
        rules: RuleSet,
        parser: DateParser,
        month_style: MonthLabelStyle,
    ) -> Self {
        Self {
            calendar,
            rules,
            parser,
            month_style,
            amount_sign: AmountSign::default(),
        }
    }

    /// Read amounts with the given sign convention.
    pub fn with_amount_sign(mut self, amount_sign: AmountSign) -> Self {
        self.amount_sign = amount_sign;
        self
    }

    pub fn calendar(&self) -> &CycleCalendar {
        &self.calendar
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn parser(&self) -> &DateParser {
        &self.parser
    }

    /// Validate a raw row. The date is checked before the amount, so a row
    /// with both fields broken counts as a malformed date. Amounts outside
    /// [`crate::parsing::MAX_AMOUNT`] count as non-numeric.
    pub fn parse(&self, raw: &RawTransaction) -> Result<TransactionRecord, DropReason> {
        let date = self
            .parser
            .parse(&raw.date)
            .ok_or(DropReason::MalformedDate)?;
        let amount = parse_amount(&raw.amount)
            .map(|a| self.amount_sign.normalise(a))
            .ok_or(DropReason::NonNumericAmount)?;
        Ok(TransactionRecord {
            date,
            amount,
            description: raw.description.trim().to_string(),
            source: raw.source.clone(),
        })
    }

    /// Attach every coordinate and the category to an already-valid record.
    pub fn enrich_record(&self, record: TransactionRecord) -> EnrichedTransaction {
        let day = record.day();
        let cycle = self.calendar.billing_cycle(day);
        let category = self.rules.classify(&record.description).to_string();
        EnrichedTransaction {
            calendar_month_label: month_label(day, self.month_style),
            calendar_week_of_month: calendar_week_of_month(day),
            billing_cycle_label: cycle.label,
            billing_cycle_week: cycle.week_in_cycle,
            category,
            record,
        }
    }

    /// Lazily enrich `rows`, preserving their order.
    ///
    /// The returned adapter exposes the running [`DropReport`]; read it after
    /// the iterator is exhausted for final counts.
    pub fn enrich<I>(&self, rows: I) -> Enriched<'_, I::IntoIter>
    where
        I: IntoIterator<Item = RawTransaction>,
    {
        Enriched {
            enricher: self,
            rows: rows.into_iter(),
            report: DropReport::default(),
        }
    }
}

// ── Enriched ──────────────────────────────────────────────────────────────────

/// Iterator returned by [`TransactionEnricher::enrich`].
pub struct Enriched<'a, I> {
    enricher: &'a TransactionEnricher,
    rows: I,
    report: DropReport,
}

impl<I> Enriched<'_, I> {
    /// Drops seen so far.
    pub fn report(&self) -> DropReport {
        self.report
    }
}

impl<I> Iterator for Enriched<'_, I>
where
    I: Iterator<Item = RawTransaction>,
{
    type Item = EnrichedTransaction;

    fn next(&mut self) -> Option<Self::Item> {
        for raw in self.rows.by_ref() {
            match self.enricher.parse(&raw) {
                Ok(record) => return Some(self.enricher.enrich_record(record)),
                Err(reason) => {
                    tracing::debug!(
                        source = raw.source.as_deref().unwrap_or("-"),
                        row = raw.row.unwrap_or_default(),
                        date = %raw.date,
                        amount = %raw.amount,
                        ?reason,
                        "dropping statement row"
                    );
                    self.report.record(reason);
                }
            }
        }
        None
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{CycleDefinition, CycleSpan};
    use crate::models::{CycleLabel, YearMonth};
    use rust_decimal::Decimal;

    fn enricher() -> TransactionEnricher {
        let definition = CycleDefinition::new(17).unwrap();
        let span = CycleSpan::new(
            YearMonth::new(2025, 8).unwrap(),
            YearMonth::new(2025, 10).unwrap(),
        )
        .unwrap();
        TransactionEnricher::new(
            CycleCalendar::new(definition, span),
            RuleSet::builtin(),
            DateParser::utc(),
            MonthLabelStyle::Pt,
        )
    }

    fn cycle(y: i32, m: u32) -> CycleLabel {
        CycleLabel::Cycle(YearMonth::new(y, m).unwrap())
    }

    // ── scenario ─────────────────────────────────────────────────────────────

    #[test]
    fn test_enrich_three_transaction_scenario() {
        let enricher = enricher();
        let rows = vec![
            RawTransaction::new("2025-09-15", "-50", "ifood"),
            RawTransaction::new("2025-09-20", "-30", "uber"),
            RawTransaction::new("2025-10-01", "-20", "netflix"),
        ];
        let out: Vec<_> = enricher.enrich(rows).collect();
        assert_eq!(out.len(), 3);

        assert_eq!(out[0].billing_cycle_label, cycle(2025, 9));
        assert_eq!(out[0].billing_cycle_week, 4);
        assert_eq!(out[0].category, "Alimentação");
        assert_eq!(out[0].calendar_week_of_month, 3);
        assert_eq!(out[0].calendar_month_label, "set");

        assert_eq!(out[1].billing_cycle_label, cycle(2025, 10));
        assert_eq!(out[1].billing_cycle_week, 1);
        assert_eq!(out[1].category, "Transporte");

        assert_eq!(out[2].billing_cycle_label, cycle(2025, 10));
        assert_eq!(out[2].billing_cycle_week, 3);
        assert_eq!(out[2].category, "Lazer");
        assert_eq!(out[2].calendar_month_label, "out");
        assert_eq!(out[2].amount(), Decimal::from(-20));
    }

    // ── drops ────────────────────────────────────────────────────────────────

    #[test]
    fn test_drops_are_counted_per_reason() {
        let enricher = enricher();
        let rows = vec![
            RawTransaction::new("2025-09-15", "-50", "ifood"),
            RawTransaction::new("", "-10", "no date"),
            RawTransaction::new("31/02/2025", "-10", "impossible date"),
            RawTransaction::new("2025-09-16", "abc", "bad amount"),
            RawTransaction::new("garbage", "garbage", "both broken"),
            RawTransaction::new("2025-09-18", "R$ 1.234,56", "salario"),
        ];
        let mut iter = enricher.enrich(rows);
        let out: Vec<_> = iter.by_ref().collect();
        let report = iter.report();

        assert_eq!(out.len(), 2);
        assert_eq!(report.malformed_date, 3);
        assert_eq!(report.non_numeric_amount, 1);
        assert_eq!(report.total(), 4);
        assert_eq!(out[1].amount(), Decimal::new(123456, 2));
        assert_eq!(out[1].category, "Remuneração");
    }

    #[test]
    fn test_oversized_amount_is_dropped_not_kept() {
        let enricher = enricher();
        let rows = vec![
            RawTransaction::new("2025-09-15", "-1000000000000000000000000000", "huge"),
            RawTransaction::new("2025-09-15", "-50", "ifood"),
        ];
        let mut iter = enricher.enrich(rows);
        let out: Vec<_> = iter.by_ref().collect();
        assert_eq!(out.len(), 1);
        assert_eq!(iter.report().non_numeric_amount, 1);
    }

    #[test]
    fn test_expense_positive_amounts_are_flipped() {
        let enricher = enricher().with_amount_sign(AmountSign::ExpensePositive);
        let rows = vec![
            RawTransaction::new("2025-09-15", "50.00", "Ifood"),
            RawTransaction::new("2025-09-20", "-80.00", "Pagamento recebido"),
        ];
        let out: Vec<_> = enricher.enrich(rows).collect();
        assert_eq!(out[0].amount(), Decimal::new(-5000, 2));
        assert!(out[0].record.is_expense());
        assert_eq!(out[1].amount(), Decimal::new(8000, 2));
        assert!(out[1].record.is_income());
    }

    #[test]
    fn test_enrich_preserves_order() {
        let enricher = enricher();
        let rows = vec![
            RawTransaction::new("2025-10-01", "-1", "c"),
            RawTransaction::new("2025-08-20", "-2", "a"),
            RawTransaction::new("2025-09-01", "-3", "b"),
        ];
        let descriptions: Vec<String> = enricher
            .enrich(rows)
            .map(|t| t.record.description)
            .collect();
        assert_eq!(descriptions, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_enrich_is_lazy() {
        let enricher = enricher();
        let rows = vec![
            RawTransaction::new("2025-09-15", "-50", "ifood"),
            RawTransaction::new("bad", "-1", "x"),
            RawTransaction::new("2025-09-16", "-1", "y"),
        ];
        let mut iter = enricher.enrich(rows);
        assert!(iter.next().is_some());
        // The malformed row has not been pulled yet.
        assert_eq!(iter.report().total(), 0);
        assert!(iter.next().is_some());
        assert_eq!(iter.report().malformed_date, 1);
    }

    // ── out of range ─────────────────────────────────────────────────────────

    #[test]
    fn test_out_of_range_date_kept_with_sentinel() {
        let enricher = enricher();
        let out: Vec<_> = enricher
            .enrich(vec![RawTransaction::new("2024-01-05", "-5", "padaria")])
            .collect();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].billing_cycle_label, CycleLabel::OutOfRange);
        assert_eq!(out[0].billing_cycle_week, 0);
        assert_eq!(out[0].calendar_week_of_month, 1);
        assert_eq!(out[0].category, "Alimentação");
    }

    #[test]
    fn test_description_is_trimmed_and_source_kept() {
        let enricher = enricher();
        let mut raw = RawTransaction::new("2025-09-15", "-50", "  ifood  ");
        raw.source = Some("nubank.csv".to_string());
        let record = enricher.parse(&raw).unwrap();
        assert_eq!(record.description, "ifood");
        assert_eq!(record.source.as_deref(), Some("nubank.csv"));
    }

    #[test]
    fn test_drop_report_merge() {
        let mut a = DropReport {
            malformed_date: 1,
            non_numeric_amount: 2,
        };
        let b = DropReport {
            malformed_date: 3,
            non_numeric_amount: 0,
        };
        a.merge(&b);
        assert_eq!(a.malformed_date, 4);
        assert_eq!(a.non_numeric_amount, 2);
    }
}
