//! Plain-text and JSON rendering of an [`AnalysisResult`].

use std::fmt::Write as _;

use cycles_core::aggregation::{BucketKey, Dimension, Measure, Summary};
use cycles_core::calendar::{calendar_week_label, CycleDefinition};
use cycles_core::formatting::{format_amount, format_percent, CurrencyFormat};
use cycles_data::analysis::AnalysisResult;
use rust_decimal::Decimal;
use unicode_width::UnicodeWidthStr;

/// Everything the text report needs besides the result itself.
#[derive(Debug, Clone, Copy)]
pub struct ReportStyle {
    pub currency: CurrencyFormat,
    pub definition: CycleDefinition,
    pub measure: Measure,
}

// ── Labels ────────────────────────────────────────────────────────────────────

/// Display label of a bucket, with day ranges for week buckets.
pub fn bucket_label(key: &BucketKey, definition: &CycleDefinition) -> String {
    match key {
        BucketKey::CalendarWeek(week) => calendar_week_label(*week),
        BucketKey::CycleWeek(week) => definition.week_label(*week),
        other => other.to_string(),
    }
}

fn measure_caption(measure: Measure) -> &'static str {
    match measure {
        Measure::Spending => "spending",
        Measure::Signed => "signed amounts",
    }
}

// ── Text report ───────────────────────────────────────────────────────────────

/// Render the full text report.
pub fn render_text(result: &AnalysisResult, style: &ReportStyle) -> String {
    let mut out = String::new();
    let meta = &result.metadata;
    let money = |v: Decimal| format_amount(v, &style.currency);

    let _ = writeln!(out, "spend-cycles · {}", measure_caption(style.measure));
    let _ = writeln!(
        out,
        "{} files, {} rows, {} transactions, start day {}",
        meta.files_read, meta.rows_read, meta.transactions, meta.start_day
    );
    if let Some((first, last)) = meta.cycle_span {
        let _ = writeln!(out, "Cycles generated from {first} to {last}");
    }
    out.push('\n');

    let _ = writeln!(out, "CASH FLOW");
    let _ = writeln!(out, "  Income    {}", money(result.cash_flow.income));
    let _ = writeln!(out, "  Expenses  {}", money(result.cash_flow.expenses));
    let _ = writeln!(out, "  Net       {}", money(result.cash_flow.net));

    for section in &result.summaries {
        out.push('\n');
        render_dimension(&mut out, section.dimension, &section.summary, style);
    }

    out.push('\n');
    render_data_quality(&mut out, result);
    out
}

fn render_dimension(
    out: &mut String,
    dimension: Dimension,
    summary: &Summary<BucketKey>,
    style: &ReportStyle,
) {
    let _ = writeln!(out, "{}", dimension.title().to_uppercase());
    if summary.is_empty() {
        let _ = writeln!(out, "  No data.");
        return;
    }

    let money = |v: Decimal| format_amount(v, &style.currency);
    let header = [
        dimension.title().to_string(),
        "Total".to_string(),
        "Share".to_string(),
        "Mean".to_string(),
        "Count".to_string(),
        "Per period".to_string(),
    ];

    let mut rows: Vec<[String; 6]> = summary
        .rows()
        .iter()
        .map(|row| {
            [
                bucket_label(&row.key, &style.definition),
                money(row.total),
                format_percent(row.percent_of_total, 1),
                money(row.mean),
                row.count.to_string(),
                money(row.average_per_period),
            ]
        })
        .collect();

    let count: usize = summary.rows().iter().map(|r| r.count).sum();
    let per_period = if summary.periods() == 0 {
        Decimal::ZERO
    } else {
        summary.grand_total() / Decimal::from(summary.periods())
    };
    rows.push([
        "Total".to_string(),
        money(summary.grand_total()),
        String::new(),
        String::new(),
        count.to_string(),
        money(per_period),
    ]);

    for line in render_table(&header, &rows) {
        let _ = writeln!(out, "  {line}");
    }

    for line in insights(summary, style) {
        let _ = writeln!(out, "  {line}");
    }
}

/// Peak, most active and highest-average lines for one summary.
fn insights(summary: &Summary<BucketKey>, style: &ReportStyle) -> Vec<String> {
    let label = |key: &BucketKey| bucket_label(key, &style.definition);
    let mut lines = Vec::with_capacity(3);

    if let Some(peak) = summary.peak() {
        lines.push(format!(
            "Peak: {} concentrates the largest total, {} ({} of total).",
            label(&peak.key),
            format_amount(peak.total, &style.currency),
            format_percent(peak.percent_of_total, 1)
        ));
    }
    if let Some(active) = summary.most_active() {
        let noun = if active.count == 1 {
            "transaction"
        } else {
            "transactions"
        };
        lines.push(format!(
            "Most active: {} with {} {}.",
            label(&active.key),
            active.count,
            noun
        ));
    }
    if let Some(avg) = summary.highest_average() {
        lines.push(format!(
            "Highest average ticket: {} ({}).",
            label(&avg.key),
            format_amount(avg.mean, &style.currency)
        ));
    }
    lines
}

fn render_data_quality(out: &mut String, result: &AnalysisResult) {
    let meta = &result.metadata;
    let _ = writeln!(out, "DATA QUALITY");
    let _ = writeln!(out, "  Excluded rows          {}", meta.rows_excluded);
    let _ = writeln!(out, "  Malformed dates        {}", meta.dropped.malformed_date);
    let _ = writeln!(
        out,
        "  Non-numeric amounts    {}",
        meta.dropped.non_numeric_amount
    );
    for file in &meta.files_skipped {
        let _ = writeln!(out, "  Skipped file           {}", file.display());
    }
}

// ── Table layout ──────────────────────────────────────────────────────────────

/// Lay out a table by display width: first column left-aligned, the rest
/// right-aligned, with a rule under the header.
fn render_table<const N: usize>(header: &[String; N], rows: &[[String; N]]) -> Vec<String> {
    let mut widths = [0usize; N];
    for row in std::iter::once(header).chain(rows.iter()) {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.width());
        }
    }

    let format_row = |row: &[String; N]| {
        row.iter()
            .zip(widths.iter())
            .enumerate()
            .map(|(i, (cell, &width))| {
                let pad = " ".repeat(width.saturating_sub(cell.width()));
                if i == 0 {
                    format!("{cell}{pad}")
                } else {
                    format!("{pad}{cell}")
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
    };

    let total_width = widths.iter().sum::<usize>() + 2 * N.saturating_sub(1);
    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format_row(header));
    lines.push("─".repeat(total_width));
    lines.extend(rows.iter().map(format_row));
    lines
}

// ── JSON ──────────────────────────────────────────────────────────────────────

/// Pretty-printed JSON of the whole result.
pub fn render_json(result: &AnalysisResult) -> serde_json::Result<String> {
    serde_json::to_string_pretty(result)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use cycles_core::models::RawTransaction;
    use cycles_data::analysis::{analyze_rows, AnalysisOptions};

    fn scenario(measure: Measure) -> (AnalysisResult, ReportStyle) {
        let mut options = AnalysisOptions::new(17).unwrap();
        options.measure = measure;
        let rows = vec![
            RawTransaction::new("2025-09-15", "-50", "ifood"),
            RawTransaction::new("2025-09-20", "-30", "uber"),
            RawTransaction::new("2025-10-01", "-20", "netflix"),
        ];
        let result = analyze_rows(&options, rows).unwrap();
        let style = ReportStyle {
            currency: CurrencyFormat::brl(),
            definition: options.definition,
            measure,
        };
        (result, style)
    }

    // ── labels ────────────────────────────────────────────────────────────────

    #[test]
    fn test_bucket_label_for_weeks() {
        let def = CycleDefinition::new(17).unwrap();
        assert_eq!(
            bucket_label(&BucketKey::CalendarWeek(3), &def),
            "Semana 3 (Dias 15-21)"
        );
        assert_eq!(
            bucket_label(&BucketKey::CycleWeek(1), &def),
            def.week_label(1)
        );
        assert_eq!(
            bucket_label(&BucketKey::Category("Lazer".to_string()), &def),
            "Lazer"
        );
    }

    // ── text report ───────────────────────────────────────────────────────────

    #[test]
    fn test_render_text_contains_insights() {
        let (result, style) = scenario(Measure::Spending);
        let text = render_text(&result, &style);

        assert!(text.contains("CASH FLOW"));
        assert!(text.contains("Expenses  R$ 100,00"));
        assert!(text.contains("CALENDAR WEEK"));
        assert!(text.contains(
            "Peak: Semana 3 (Dias 15-21) concentrates the largest total, R$ 80,00 (80.0% of total)."
        ));
        assert!(text.contains("Most active: Semana 3 (Dias 15-21) with 2 transactions."));
        assert!(text.contains("Peak: Alimentação concentrates the largest total, R$ 50,00 (50.0% of total)."));
        assert!(text.contains("Highest average ticket: Alimentação (R$ 50,00)."));
    }

    #[test]
    fn test_render_text_signed_measure_caption() {
        let (result, style) = scenario(Measure::Signed);
        let text = render_text(&result, &style);
        assert!(text.starts_with("spend-cycles · signed amounts"));
        assert!(text.contains("R$ -50,00"));
    }

    #[test]
    fn test_render_text_empty_result() {
        let options = AnalysisOptions::new(17).unwrap();
        let result = analyze_rows(&options, vec![]).unwrap();
        let style = ReportStyle {
            currency: CurrencyFormat::usd(),
            definition: options.definition,
            measure: options.measure,
        };
        let text = render_text(&result, &style);
        assert!(text.contains("No data."));
        assert!(!text.contains("Peak:"));
        assert!(text.contains("Net       $0.00"));
    }

    #[test]
    fn test_render_text_reports_drops() {
        let options = AnalysisOptions::new(17).unwrap();
        let rows = vec![
            RawTransaction::new("2025-09-15", "-50", "ifood"),
            RawTransaction::new("not a date", "-1", "x"),
            RawTransaction::new("2025-09-16", "abc", "y"),
        ];
        let result = analyze_rows(&options, rows).unwrap();
        let style = ReportStyle {
            currency: CurrencyFormat::brl(),
            definition: options.definition,
            measure: options.measure,
        };
        let text = render_text(&result, &style);
        assert!(text.contains("Malformed dates        1"));
        assert!(text.contains("Non-numeric amounts    1"));
    }

    // ── table layout ──────────────────────────────────────────────────────────

    #[test]
    fn test_render_table_aligns_by_display_width() {
        let header = ["Category".to_string(), "Total".to_string()];
        let rows = vec![
            ["Alimentação".to_string(), "R$ 50,00".to_string()],
            ["Lazer".to_string(), "R$ 1.020,00".to_string()],
        ];
        let lines = render_table(&header, &rows);
        assert_eq!(lines.len(), 4);
        let widths: Vec<usize> = lines.iter().map(|l| l.width()).collect();
        assert!(widths.iter().all(|w| *w == widths[0]), "{widths:?}");
        assert!(lines[2].starts_with("Alimentação  "));
        assert!(lines[3].ends_with("R$ 1.020,00"));
    }

    // ── json ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_render_json_has_summaries() {
        let (result, _) = scenario(Measure::Spending);
        let json = render_json(&result).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["transactions"].as_array().unwrap().len(), 3);
        assert_eq!(value["summaries"].as_array().unwrap().len(), 5);
        assert_eq!(value["metadata"]["start_day"], 17);
    }
}
