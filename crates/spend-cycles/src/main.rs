mod bootstrap;
mod report;

use anyhow::{Context, Result};
use cycles_core::classifier::RuleSet;
use cycles_core::parsing::resolve_timezone;
use cycles_core::settings::{OutputFormat, Settings};
use cycles_data::analysis::{AnalysisOptions, ExclusionFilter};
use cycles_data::writer::write_enriched_csv;
use cycles_runtime::pipeline::ConcurrentPipeline;

use crate::report::ReportStyle;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("spend-cycles v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Start day: {}, timezone: {}, measure: {:?}",
        settings.start_day,
        settings.timezone,
        settings.measure
    );

    let options = build_options(&settings)?;
    let style = ReportStyle {
        currency: settings.currency.format(),
        definition: options.definition,
        measure: options.measure,
    };

    let pipeline = ConcurrentPipeline::new(options);
    let result = pipeline
        .run(&settings.paths)
        .await
        .context("analysing statements")?;

    tracing::info!(
        "Analysed {} transactions from {} files in {:.3}s",
        result.metadata.transactions,
        result.metadata.files_read,
        result.metadata.load_time_seconds + result.metadata.transform_time_seconds
    );

    if let Some(path) = &settings.output {
        let written = write_enriched_csv(path, &result.transactions)
            .with_context(|| format!("writing {}", path.display()))?;
        tracing::info!("Wrote {} enriched rows to {}", written, path.display());
    }

    match settings.format {
        OutputFormat::Text => print!("{}", report::render_text(&result, &style)),
        OutputFormat::Json => println!(
            "{}",
            report::render_json(&result).context("serialising the result")?
        ),
    }

    Ok(())
}

/// Turn CLI settings into pipeline options. Invalid rules or timezones stop
/// the run before any file is read.
fn build_options(settings: &Settings) -> Result<AnalysisOptions> {
    let mut options = AnalysisOptions::new(settings.start_day)?;
    if let Some(path) = &settings.rules {
        options.rules = RuleSet::load_from(path)
            .with_context(|| format!("loading category rules from {}", path.display()))?;
    }
    options.timezone = resolve_timezone(&settings.timezone)?;
    options.month_style = settings.month_labels;
    options.amount_sign = settings.amount_sign;
    options.measure = settings.measure;
    options.dimensions = settings.dimensions();
    options.exclusions = ExclusionFilter::new(&settings.exclude);
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use cycles_core::aggregation::{Dimension, Measure};
    use cycles_core::calendar::MonthLabelStyle;
    use cycles_core::parsing::AmountSign;
    use std::ffi::OsString;

    #[test]
    fn test_build_options_from_flags() {
        let settings = Settings::parse_from([
            "spend-cycles",
            "--start-day",
            "5",
            "--timezone",
            "America/Sao_Paulo",
            "--month-labels",
            "en",
            "--measure",
            "signed",
            "--group-by",
            "cycle",
            "--group-by",
            "category",
        ]);
        let options = build_options(&settings).unwrap();
        assert_eq!(options.definition.start_day(), 5);
        assert_eq!(options.timezone.name(), "America/Sao_Paulo");
        assert_eq!(options.month_style, MonthLabelStyle::En);
        assert_eq!(options.measure, Measure::Signed);
        assert_eq!(options.dimensions, vec![Dimension::Cycle, Dimension::Category]);
        assert!(options.exclusions.is_excluded("PAGAMENTO RECEBIDO"));
        assert_eq!(options.amount_sign, AmountSign::ExpenseNegative);
    }

    #[test]
    fn test_build_options_card_sign_convention() {
        let settings =
            Settings::parse_from(["spend-cycles", "--amount-sign", "expense-positive"]);
        let options = build_options(&settings).unwrap();
        assert_eq!(options.amount_sign, AmountSign::ExpensePositive);
    }

    #[test]
    fn test_build_options_rejects_unknown_timezone() {
        let settings = Settings::parse_from(["spend-cycles", "--timezone", "Mars/Olympus"]);
        assert!(build_options(&settings).is_err());
    }

    #[test]
    fn test_build_options_reads_rule_file() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let path = tmp.path().join("rules.json");
        std::fs::write(
            &path,
            r#"{"default_category": "Misc", "rules": [{"name": "Pets", "keywords": ["petz"]}]}"#,
        )
        .unwrap();
        let settings = Settings::parse_from([
            OsString::from("spend-cycles"),
            OsString::from("--rules"),
            path.into_os_string(),
        ]);
        let options = build_options(&settings).unwrap();
        assert_eq!(options.rules.classify("PETZ loja"), "Pets");
        assert_eq!(options.rules.classify("padaria"), "Misc");
    }

    #[test]
    fn test_build_options_missing_rule_file_errors() {
        let settings = Settings::parse_from(["spend-cycles", "--rules", "/nonexistent/rules.json"]);
        assert!(build_options(&settings).is_err());
    }
}
