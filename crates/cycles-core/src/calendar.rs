//! Calendar-week and billing-cycle coordinates for transaction dates.
//!
//! Calendar weeks are fixed slices of the month (`ceil(day / 7)`). Billing
//! cycles run from a configurable start day to the day before it in the
//! following month and are generated on demand for a span of months, so the
//! calendar covers any date range without a hand-maintained table.

use chrono::{Datelike, Duration, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{CycleError, Result};
use crate::models::{CycleLabel, YearMonth};

// ── Calendar weeks and month labels ───────────────────────────────────────────

/// Week of the month as `ceil(day / 7)`: days 1–7 → 1, …, 29–31 → 5.
pub fn calendar_week_of_month(date: NaiveDate) -> u32 {
    week_of_day(date.day())
}

fn week_of_day(day: u32) -> u32 {
    day.div_ceil(7)
}

/// Human label for a calendar week, e.g. `"Semana 3 (Dias 15-21)"`.
pub fn calendar_week_label(week: u32) -> String {
    match week {
        1..=4 => format!("Semana {} (Dias {}-{})", week, week * 7 - 6, week * 7),
        5 => "Semana 5 (Dias 29+)".to_string(),
        other => format!("Semana {other}"),
    }
}

/// Language used for three-letter month labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MonthLabelStyle {
    /// `jan fev mar abr mai jun jul ago set out nov dez`
    Pt,
    /// `jan feb mar apr may jun jul aug sep oct nov dec`
    En,
}

const PT_MONTHS: [&str; 12] = [
    "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
];

const EN_MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Three-letter abbreviation of the month of `date`.
pub fn month_label(date: NaiveDate, style: MonthLabelStyle) -> &'static str {
    let idx = date.month0() as usize;
    match style {
        MonthLabelStyle::Pt => PT_MONTHS[idx],
        MonthLabelStyle::En => EN_MONTHS[idx],
    }
}

// ── CycleDefinition ───────────────────────────────────────────────────────────

/// Smallest and largest accepted cycle start day.
pub const MIN_START_DAY: u32 = 1;
pub const MAX_START_DAY: u32 = 28;

/// A billing cycle that starts on the same day every month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleDefinition {
    start_day: u32,
}

/// One generated billing cycle, closed on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub label: CycleLabel,
}

impl CycleInterval {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl CycleDefinition {
    /// Fails unless `start_day` is in `1..=28`, the days every month has.
    pub fn new(start_day: u32) -> Result<Self> {
        if !(MIN_START_DAY..=MAX_START_DAY).contains(&start_day) {
            return Err(CycleError::InvalidStartDay(start_day));
        }
        Ok(Self { start_day })
    }

    pub fn start_day(&self) -> u32 {
        self.start_day
    }

    /// The cycle that starts in `start_month`.
    ///
    /// It ends the day before the start day of the following month and is
    /// labelled with that following month.
    pub fn interval_starting_in(&self, start_month: YearMonth) -> CycleInterval {
        let close_month = start_month.next();
        // start_day <= 28 so both days exist in every month.
        let start = start_month
            .day(self.start_day)
            .unwrap_or_else(|| start_month.first_day());
        let next_start = close_month
            .day(self.start_day)
            .unwrap_or_else(|| close_month.first_day());
        CycleInterval {
            start,
            end: next_start - Duration::days(1),
            label: CycleLabel::Cycle(close_month),
        }
    }

    /// Generate every cycle whose start month lies in `span`, in order.
    pub fn generate(&self, span: CycleSpan) -> Vec<CycleInterval> {
        let mut intervals = Vec::with_capacity(span.month_count());
        let mut month = span.first;
        while month <= span.last {
            intervals.push(self.interval_starting_in(month));
            month = month.next();
        }
        intervals
    }

    /// Month in which the cycle containing `date` starts.
    pub fn start_month_of(&self, date: NaiveDate) -> YearMonth {
        let month = YearMonth::of(date);
        if date.day() >= self.start_day {
            month
        } else {
            month.prev()
        }
    }

    /// Week within the cycle, from the day of the month alone.
    ///
    /// Ranges are tested in order: `[s, s+6]` → 1, `[s+7, 31]` → 2,
    /// `[1, 7]` → 3, `[8, s-1]` → 4, anything else → 0.
    pub fn week_in_cycle(&self, day: u32) -> u32 {
        let s = self.start_day;
        if (s..=s + 6).contains(&day) {
            1
        } else if (s + 7..=31).contains(&day) {
            2
        } else if (1..=7).contains(&day) {
            3
        } else if (8..s).contains(&day) {
            4
        } else {
            0
        }
    }

    /// Inclusive day-of-month ranges of each cycle week (1 to 4).
    ///
    /// A week whose range is empty for this start day is `None`.
    pub fn week_day_ranges(&self) -> [Option<(u32, u32)>; 4] {
        let mut ranges = [None; 4];
        for day in 1..=31 {
            let week = self.week_in_cycle(day);
            if week == 0 {
                continue;
            }
            let slot = &mut ranges[(week - 1) as usize];
            *slot = match *slot {
                None => Some((day, day)),
                Some((lo, hi)) => Some((lo.min(day), hi.max(day))),
            };
        }
        ranges
    }

    /// Label for a cycle week, e.g. `"Semana 1 (17-23)"`.
    pub fn week_label(&self, week: u32) -> String {
        let range = (1..=4)
            .contains(&week)
            .then(|| self.week_day_ranges()[(week - 1) as usize])
            .flatten();
        match range {
            Some((lo, hi)) => format!("Semana {week} ({lo}-{hi})"),
            None => format!("Semana {week}"),
        }
    }
}

// ── CycleSpan ─────────────────────────────────────────────────────────────────

/// Inclusive range of cycle start months to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleSpan {
    pub first: YearMonth,
    pub last: YearMonth,
}

impl CycleSpan {
    pub fn new(first: YearMonth, last: YearMonth) -> Result<Self> {
        if last < first {
            return Err(CycleError::InvalidSpan {
                first: first.to_string(),
                last: last.to_string(),
            });
        }
        Ok(Self { first, last })
    }

    /// Smallest span whose cycles contain every date in `dates`.
    ///
    /// Returns `None` for an empty input.
    pub fn covering<I>(definition: &CycleDefinition, dates: I) -> Option<Self>
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let mut bounds: Option<(NaiveDate, NaiveDate)> = None;
        for date in dates {
            bounds = Some(match bounds {
                None => (date, date),
                Some((lo, hi)) => (lo.min(date), hi.max(date)),
            });
        }
        let (lo, hi) = bounds?;
        Some(Self {
            first: definition.start_month_of(lo),
            last: definition.start_month_of(hi),
        })
    }

    /// Number of start months in the span.
    pub fn month_count(&self) -> usize {
        let months = (self.last.year() - self.first.year()) * 12 + self.last.month() as i32
            - self.first.month() as i32;
        months as usize + 1
    }
}

// ── CycleCalendar ─────────────────────────────────────────────────────────────

/// Where a date falls in the billing calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BillingCycle {
    pub label: CycleLabel,
    pub week_in_cycle: u32,
}

/// A cycle definition plus the generated interval table for one span.
#[derive(Debug, Clone)]
pub struct CycleCalendar {
    definition: CycleDefinition,
    intervals: Vec<CycleInterval>,
}

impl CycleCalendar {
    pub fn new(definition: CycleDefinition, span: CycleSpan) -> Self {
        let intervals = definition.generate(span);
        tracing::debug!(
            start_day = definition.start_day(),
            first = %span.first,
            last = %span.last,
            cycles = intervals.len(),
            "generated billing cycles"
        );
        Self {
            definition,
            intervals,
        }
    }

    pub fn definition(&self) -> &CycleDefinition {
        &self.definition
    }

    /// Generated intervals, ascending and contiguous.
    pub fn intervals(&self) -> &[CycleInterval] {
        &self.intervals
    }

    /// The cycle containing `date`, if the span covers it.
    pub fn interval_for(&self, date: NaiveDate) -> Option<&CycleInterval> {
        // Intervals are sorted and contiguous: the candidate is the last one
        // starting on or before `date`.
        let idx = self.intervals.partition_point(|iv| iv.start <= date);
        let candidate = self.intervals.get(idx.checked_sub(1)?)?;
        candidate.contains(date).then_some(candidate)
    }

    /// Billing cycle label and week for `date`.
    ///
    /// Dates outside the generated span get [`CycleLabel::OutOfRange`] and
    /// week 0.
    pub fn billing_cycle(&self, date: NaiveDate) -> BillingCycle {
        match self.interval_for(date) {
            Some(interval) => BillingCycle {
                label: interval.label,
                week_in_cycle: self.definition.week_in_cycle(date.day()),
            },
            None => BillingCycle {
                label: CycleLabel::OutOfRange,
                week_in_cycle: 0,
            },
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
