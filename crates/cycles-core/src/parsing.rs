use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use clap::ValueEnum;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CycleError, Result};

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Resolve a timezone setting, where `"auto"` means the system timezone.
pub fn resolve_timezone(name: &str) -> Result<Tz> {
    let name = if name.eq_ignore_ascii_case("auto") {
        get_system_timezone()
    } else {
        name.to_string()
    };
    name.parse::<Tz>()
        .map_err(|_| CycleError::UnknownTimezone(name))
}

// ── DateParser ────────────────────────────────────────────────────────────────

/// Naive formats with a time component, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Date-only formats, tried in order. Slashed dates are day-first.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];

/// Parses statement date text into local calendar date-times.
///
/// Text carrying an explicit offset is converted into the configured
/// timezone first, so a purchase at 23:30 in São Paulo lands on the same day
/// it appears on the statement.
#[derive(Debug, Clone, Copy)]
pub struct DateParser {
    tz: Tz,
}

impl DateParser {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Parser that treats every date as UTC.
    pub fn utc() -> Self {
        Self { tz: Tz::UTC }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// `None` for empty or unrecognised text.
    pub fn parse(&self, s: &str) -> Option<NaiveDateTime> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        let normalised = match s.strip_suffix('Z') {
            Some(stripped) => format!("{stripped}+00:00"),
            None => s.to_string(),
        };
        if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
            return Some(dt.with_timezone(&self.tz).naive_local());
        }

        for fmt in DATETIME_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(naive);
            }
        }
        for fmt in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
                return date.and_hms_opt(0, 0, 0);
            }
        }
        None
    }
}

// ── Amounts ───────────────────────────────────────────────────────────────────

fn amount_noise() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Currency symbols, letters and whitespace around the number.
    RE.get_or_init(|| Regex::new(r"[^\d,.\-+]").expect("static regex"))
}

/// Largest accepted amount magnitude (exclusive): `10^20`.
///
/// Sums of millions of rows below this bound stay far inside `Decimal`'s
/// range, so aggregation never overflows on parsed input.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_661_992_960, 1_808_227_885, 5, false, 0);

/// Parse statement amount text into an exact decimal.
///
/// Accepts `-50.00`, `R$ 1.234,56`, `1,234.56`, `-12,5` and similar. When
/// both `,` and `.` appear, the last one is the decimal separator; a lone
/// `,` is a decimal comma. Returns `None` for anything non-numeric and for
/// magnitudes of [`MAX_AMOUNT`] or more.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let trimmed = s.trim();
    // "(12.34)" is accounting notation for a negative amount.
    let (negated, body) = match trimmed
        .strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let cleaned = amount_noise().replace_all(body, "");
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');
    let canonical = match (last_comma, last_dot) {
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => {
            if cleaned.matches(',').count() > 1 {
                cleaned.replace(',', "")
            } else {
                cleaned.replace(',', ".")
            }
        }
        (None, Some(_)) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        _ => cleaned.into_owned(),
    };

    let value = Decimal::from_str(&canonical).ok()?;
    if value.abs() >= MAX_AMOUNT {
        return None;
    }
    Some(if negated { -value } else { value })
}

/// Sign convention of a statement's amount column.
///
/// Records always use negative = expense; card exports that list purchases
/// as positive values are flipped on the way in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AmountSign {
    /// Bank account exports: debits are negative.
    #[default]
    ExpenseNegative,
    /// Credit card exports: purchases are positive, payments negative.
    ExpensePositive,
}

impl AmountSign {
    /// Convert a parsed amount to the negative = expense convention.
    pub fn normalise(&self, amount: Decimal) -> Decimal {
        match self {
            AmountSign::ExpenseNegative => amount,
            AmountSign::ExpensePositive => -amount,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
