//! Sequential analysis pipeline for spend-cycles.
//!
//! Loads statements, enriches every row, and reduces the result into one
//! summary per requested dimension. The stages are public so the concurrent
//! runtime can run [`enrich_batch`] per file and share [`finish_analysis`],
//! which keeps both pipelines' output identical.

use std::path::PathBuf;

use chrono::Utc;
use chrono_tz::Tz;
use cycles_core::aggregation::{
    distinct_months, BucketKey, CashFlow, Dimension, Measure, PartialSummary, Summary,
};
use cycles_core::calendar::{CycleCalendar, CycleDefinition, CycleSpan, MonthLabelStyle};
use cycles_core::classifier::RuleSet;
use cycles_core::enricher::{DropReport, TransactionEnricher};
use cycles_core::error::Result;
use cycles_core::models::{EnrichedTransaction, RawTransaction, YearMonth};
use cycles_core::parsing::{AmountSign, DateParser};
use serde::Serialize;
use tracing::{debug, warn};

use crate::reader::{load_statements, resolve_statement_files, StatementBatch};

// ── Options ───────────────────────────────────────────────────────────────────

/// Everything the pipeline needs besides the statements themselves.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub definition: CycleDefinition,
    pub rules: RuleSet,
    pub timezone: Tz,
    pub month_style: MonthLabelStyle,
    /// How the amount column encodes expenses.
    pub amount_sign: AmountSign,
    pub measure: Measure,
    pub dimensions: Vec<Dimension>,
    pub exclusions: ExclusionFilter,
    /// Fixed cycle span; when `None` the span is fitted to the data.
    pub span: Option<CycleSpan>,
}

impl AnalysisOptions {
    /// Options with the built-in rules, UTC, Portuguese labels, negative
    /// expenses, the spending measure and every dimension.
    pub fn new(start_day: u32) -> Result<Self> {
        Ok(Self {
            definition: CycleDefinition::new(start_day)?,
            rules: RuleSet::builtin(),
            timezone: Tz::UTC,
            month_style: MonthLabelStyle::Pt,
            amount_sign: AmountSign::ExpenseNegative,
            measure: Measure::Spending,
            dimensions: Dimension::ALL.to_vec(),
            exclusions: ExclusionFilter::default(),
            span: None,
        })
    }
}

/// Case-insensitive description fragments whose rows are left out entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionFilter {
    patterns: Vec<String>,
}

impl ExclusionFilter {
    /// Blank patterns are ignored, so `--exclude ""` disables filtering.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn is_excluded(&self, description: &str) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let lowered = description.to_lowercase();
        self.patterns.iter().any(|p| lowered.contains(p.as_str()))
    }
}

// ── Results ───────────────────────────────────────────────────────────────────

/// Metadata produced alongside the analysis result.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisMetadata {
    /// RFC 3339 timestamp when this result was generated.
    pub generated_at: String,
    pub start_day: u32,
    pub files_read: usize,
    pub files_skipped: Vec<PathBuf>,
    pub rows_read: usize,
    /// Rows removed by the exclusion filter before enrichment.
    pub rows_excluded: usize,
    pub dropped: DropReport,
    pub transactions: usize,
    /// Distinct calendar year-months used to normalise per-period averages.
    pub periods: usize,
    /// First and last cycle start month generated for the run.
    pub cycle_span: Option<(YearMonth, YearMonth)>,
    pub load_time_seconds: f64,
    pub transform_time_seconds: f64,
}

/// Summary along one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionSummary {
    pub dimension: Dimension,
    pub summary: Summary<BucketKey>,
}

/// The complete output of the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub transactions: Vec<EnrichedTransaction>,
    pub summaries: Vec<DimensionSummary>,
    pub cash_flow: CashFlow,
    pub metadata: AnalysisMetadata,
}

impl AnalysisResult {
    pub fn summary(&self, dimension: Dimension) -> Option<&Summary<BucketKey>> {
        self.summaries
            .iter()
            .find(|s| s.dimension == dimension)
            .map(|s| &s.summary)
    }
}

/// Enrichment output of one statement, before any derived statistics.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub source: String,
    pub rows_read: usize,
    pub rows_excluded: usize,
    pub dropped: DropReport,
    pub transactions: Vec<EnrichedTransaction>,
    /// One partial per configured dimension, in the same order.
    pub partials: Vec<PartialSummary<BucketKey>>,
    pub cash_flow: CashFlow,
}

// ── Stages ────────────────────────────────────────────────────────────────────

/// Build the enricher for a run.
///
/// Unless [`AnalysisOptions::span`] is set, the calendar covers every usable
/// date in `batches`; excluded rows and unparseable dates do not widen it.
/// With no usable dates at all it covers the current month.
pub fn prepare_enricher(
    options: &AnalysisOptions,
    batches: &[StatementBatch],
) -> Result<TransactionEnricher> {
    let parser = DateParser::new(options.timezone);
    let calendar = |span: CycleSpan| {
        TransactionEnricher::new(
            CycleCalendar::new(options.definition, span),
            options.rules.clone(),
            parser,
            options.month_style,
        )
        .with_amount_sign(options.amount_sign)
    };
    if let Some(span) = options.span {
        return Ok(calendar(span));
    }

    let dates = batches
        .iter()
        .flat_map(|b| b.rows.iter())
        .filter(|row| !options.exclusions.is_excluded(&row.description))
        .filter_map(|row| parser.parse(&row.date))
        .map(|dt| dt.date());

    let span = match CycleSpan::covering(&options.definition, dates) {
        Some(span) => span,
        None => {
            warn!("No parseable transaction dates; every row will be out of range");
            let today = YearMonth::of(Utc::now().date_naive());
            CycleSpan::new(today, today)?
        }
    };

    Ok(calendar(span))
}

/// Enrich one statement and accumulate its partial summaries.
pub fn enrich_batch(
    enricher: &TransactionEnricher,
    options: &AnalysisOptions,
    batch: StatementBatch,
) -> BatchOutcome {
    let rows_read = batch.rows.len();
    let (kept, excluded): (Vec<RawTransaction>, Vec<RawTransaction>) = batch
        .rows
        .into_iter()
        .partition(|row| !options.exclusions.is_excluded(&row.description));

    let mut enriched = enricher.enrich(kept);
    let transactions: Vec<EnrichedTransaction> = enriched.by_ref().collect();
    let dropped = enriched.report();

    let partials: Vec<PartialSummary<BucketKey>> = options
        .dimensions
        .iter()
        .map(|dim| PartialSummary::from_records(&transactions, |tx| dim.key(tx), options.measure))
        .collect();
    let cash_flow = CashFlow::of(&transactions);

    if dropped.total() > 0 {
        warn!(
            "{}: dropped {} rows with malformed dates and {} with non-numeric amounts",
            batch.source, dropped.malformed_date, dropped.non_numeric_amount
        );
    }
    debug!(
        "{}: {} rows, {} excluded, {} enriched",
        batch.source,
        rows_read,
        excluded.len(),
        transactions.len()
    );

    BatchOutcome {
        source: batch.source,
        rows_read,
        rows_excluded: excluded.len(),
        dropped,
        transactions,
        partials,
        cash_flow,
    }
}

/// Merge per-file outcomes in order and resolve the final summaries.
pub fn finish_analysis(
    options: &AnalysisOptions,
    enricher: &TransactionEnricher,
    outcomes: Vec<BatchOutcome>,
    mut metadata: AnalysisMetadata,
) -> AnalysisResult {
    let mut transactions = Vec::new();
    let mut merged: Vec<PartialSummary<BucketKey>> =
        options.dimensions.iter().map(|_| PartialSummary::new()).collect();
    let mut cash_flow = CashFlow::default();

    metadata.files_read = outcomes.len();
    for outcome in outcomes {
        metadata.rows_read += outcome.rows_read;
        metadata.rows_excluded += outcome.rows_excluded;
        metadata.dropped.merge(&outcome.dropped);
        cash_flow.merge(&outcome.cash_flow);
        for (acc, partial) in merged.iter_mut().zip(&outcome.partials) {
            acc.merge(partial);
        }
        transactions.extend(outcome.transactions);
    }

    let periods = distinct_months(&transactions);
    let summaries = options
        .dimensions
        .iter()
        .zip(merged)
        .map(|(dim, partial)| DimensionSummary {
            dimension: *dim,
            summary: partial.finish(periods),
        })
        .collect();

    let intervals = enricher.calendar().intervals();
    metadata.cycle_span = intervals.first().zip(intervals.last()).map(|(first, last)| {
        (
            YearMonth::of(first.start),
            YearMonth::of(last.start),
        )
    });
    metadata.start_day = options.definition.start_day();
    metadata.transactions = transactions.len();
    metadata.periods = periods;
    metadata.generated_at = Utc::now().to_rfc3339();

    AnalysisResult {
        transactions,
        summaries,
        cash_flow,
        metadata,
    }
}

// ── Entry points ──────────────────────────────────────────────────────────────

/// Analyse already-loaded statements.
pub fn analyze_batches(
    options: &AnalysisOptions,
    batches: Vec<StatementBatch>,
) -> Result<AnalysisResult> {
    let transform_start = std::time::Instant::now();
    let enricher = prepare_enricher(options, &batches)?;
    let outcomes: Vec<BatchOutcome> = batches
        .into_iter()
        .map(|batch| enrich_batch(&enricher, options, batch))
        .collect();

    let metadata = AnalysisMetadata {
        transform_time_seconds: transform_start.elapsed().as_secs_f64(),
        ..Default::default()
    };
    Ok(finish_analysis(options, &enricher, outcomes, metadata))
}

/// Analyse in-memory rows as a single unnamed statement.
pub fn analyze_rows(options: &AnalysisOptions, rows: Vec<RawTransaction>) -> Result<AnalysisResult> {
    analyze_batches(
        options,
        vec![StatementBatch {
            source: String::new(),
            rows,
        }],
    )
}

/// Run the full pipeline over files and directories.
///
/// 1. Resolve `paths` into statement files.
/// 2. Load each file, skipping the unreadable ones.
/// 3. Enrich and summarise.
pub fn analyze_statements(options: &AnalysisOptions, paths: &[PathBuf]) -> Result<AnalysisResult> {
    let load_start = std::time::Instant::now();
    let files = resolve_statement_files(paths)?;
    let loaded = load_statements(&files);
    let load_time = load_start.elapsed().as_secs_f64();

    let mut result = analyze_batches(options, loaded.batches)?;
    result.metadata.files_skipped = loaded.skipped;
    result.metadata.load_time_seconds = load_time;
    Ok(result)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
