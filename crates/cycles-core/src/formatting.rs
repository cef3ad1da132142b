use clap::ValueEnum;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

// ── CurrencyFormat ────────────────────────────────────────────────────────────

/// How money is written: symbol, separator after the symbol, digit grouping
/// and decimal mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencyFormat {
    pub symbol: &'static str,
    /// Inserted between the symbol and the number, e.g. `" "` for `R$ 10,00`.
    pub symbol_gap: &'static str,
    pub thousands_sep: char,
    pub decimal_sep: char,
}

impl CurrencyFormat {
    /// Brazilian real: `R$ 1.234,56`.
    pub const fn brl() -> Self {
        Self {
            symbol: "R$",
            symbol_gap: " ",
            thousands_sep: '.',
            decimal_sep: ',',
        }
    }

    /// US dollar: `$1,234.56`.
    pub const fn usd() -> Self {
        Self {
            symbol: "$",
            symbol_gap: "",
            thousands_sep: ',',
            decimal_sep: '.',
        }
    }
}

/// Currency selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    #[default]
    Brl,
    Usd,
}

impl Currency {
    pub fn format(&self) -> CurrencyFormat {
        match self {
            Currency::Brl => CurrencyFormat::brl(),
            Currency::Usd => CurrencyFormat::usd(),
        }
    }
}

// ── Formatting ────────────────────────────────────────────────────────────────

/// Format a decimal with digit grouping and a fixed number of decimal places.
///
/// Midpoints round away from zero.
///
/// # Examples
///
/// ```
/// use rust_decimal::Decimal;
/// use cycles_core::formatting::format_number;
///
/// assert_eq!(format_number(Decimal::new(12345, 1), 1, ',', '.'), "1,234.5");
/// assert_eq!(format_number(Decimal::new(12345, 1), 2, '.', ','), "1.234,50");
/// assert_eq!(format_number(Decimal::ZERO, 0, ',', '.'), "0");
/// ```
pub fn format_number(value: Decimal, decimals: u32, thousands_sep: char, decimal_sep: char) -> String {
    let rounded = value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();

    // `{:.N}` on a Decimal pads or truncates to exactly N places.
    let plain = format!("{:.prec$}", rounded.abs(), prec = decimals as usize);
    let (int_part, frac_part) = match plain.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (plain.as_str(), None),
    };

    let mut out = String::with_capacity(plain.len() + plain.len() / 3 + 1);
    if negative {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part, thousands_sep));
    if let Some(frac) = frac_part {
        out.push(decimal_sep);
        out.push_str(frac);
    }
    out
}

/// Format a monetary amount with two decimal places.
///
/// The sign goes after the symbol, as in `R$ -50,00`.
///
/// # Examples
///
/// ```
/// use rust_decimal::Decimal;
/// use cycles_core::formatting::{format_amount, CurrencyFormat};
///
/// assert_eq!(format_amount(Decimal::new(123456, 2), &CurrencyFormat::brl()), "R$ 1.234,56");
/// assert_eq!(format_amount(Decimal::new(-999, 2), &CurrencyFormat::usd()), "$-9.99");
/// ```
pub fn format_amount(amount: Decimal, format: &CurrencyFormat) -> String {
    format!(
        "{}{}{}",
        format.symbol,
        format.symbol_gap,
        format_number(amount, 2, format.thousands_sep, format.decimal_sep)
    )
}

/// Format a percentage value (already scaled to 0–100) as `"40.0%"`.
pub fn format_percent(value: Decimal, decimals: u32) -> String {
    let rounded = value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.prec$}%", rounded, prec = decimals as usize)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert `sep` every three digits from the right of an integer string.
fn group_thousands(s: &str, sep: char) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(sep);
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    // ── format_number ────────────────────────────────────────────────────────

    #[test]
    fn test_format_number_zero() {
        assert_eq!(format_number(Decimal::ZERO, 0, ',', '.'), "0");
        assert_eq!(format_number(Decimal::ZERO, 2, ',', '.'), "0.00");
    }

    #[test]
    fn test_format_number_millions() {
        assert_eq!(format_number(dec("1234567"), 0, ',', '.'), "1,234,567");
        assert_eq!(format_number(dec("1234567"), 0, '.', ','), "1.234.567");
    }

    #[test]
    fn test_format_number_negative() {
        assert_eq!(format_number(dec("-9876.5"), 1, ',', '.'), "-9,876.5");
    }

    #[test]
    fn test_format_number_rounds_half_away_from_zero() {
        assert_eq!(format_number(dec("1.005"), 2, ',', '.'), "1.01");
        assert_eq!(format_number(dec("-1.005"), 2, ',', '.'), "-1.01");
    }

    #[test]
    fn test_format_number_negative_zero_after_rounding() {
        assert_eq!(format_number(dec("-0.001"), 2, ',', '.'), "0.00");
    }

    // ── format_amount ────────────────────────────────────────────────────────

    #[test]
    fn test_format_amount_brl() {
        let brl = CurrencyFormat::brl();
        assert_eq!(format_amount(dec("1234.56"), &brl), "R$ 1.234,56");
        assert_eq!(format_amount(dec("-50"), &brl), "R$ -50,00");
        assert_eq!(format_amount(Decimal::ZERO, &brl), "R$ 0,00");
    }

    #[test]
    fn test_format_amount_usd() {
        let usd = CurrencyFormat::usd();
        assert_eq!(format_amount(dec("1000000"), &usd), "$1,000,000.00");
        assert_eq!(format_amount(dec("-9.99"), &usd), "$-9.99");
    }

    #[test]
    fn test_currency_selects_format() {
        assert_eq!(Currency::Brl.format(), CurrencyFormat::brl());
        assert_eq!(Currency::Usd.format(), CurrencyFormat::usd());
    }

    // ── format_percent ───────────────────────────────────────────────────────

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(dec("40"), 1), "40.0%");
        assert_eq!(format_percent(dec("33.3333"), 1), "33.3%");
        assert_eq!(format_percent(dec("12.25"), 1), "12.3%");
    }
}
