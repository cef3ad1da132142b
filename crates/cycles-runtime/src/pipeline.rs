//! Concurrent statement pipeline.
//!
//! Each statement file is read and then enriched on its own blocking task.
//! Per-file outcomes carry only partial sums; they are put back into file
//! order and reduced once by [`finish_analysis`], so the result is the same
//! as the sequential pipeline in `cycles-data`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use cycles_core::enricher::TransactionEnricher;
use cycles_core::error::{CycleError, Result};
use cycles_data::analysis::{
    enrich_batch, finish_analysis, prepare_enricher, AnalysisMetadata, AnalysisOptions,
    AnalysisResult, BatchOutcome,
};
use cycles_data::reader::{read_statement, resolve_statement_files, StatementBatch};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Default number of files processed at the same time.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

// ── ConcurrentPipeline ────────────────────────────────────────────────────────

/// Runs the analysis with one blocking task per statement file.
///
/// # Example
/// ```no_run
/// use std::path::PathBuf;
/// use cycles_data::analysis::AnalysisOptions;
/// use cycles_runtime::pipeline::ConcurrentPipeline;
///
/// # async fn run() -> cycles_core::Result<()> {
/// let pipeline = ConcurrentPipeline::new(AnalysisOptions::new(17)?);
/// let result = pipeline.run(&[PathBuf::from("extratos")]).await?;
/// println!("{} transactions", result.transactions.len());
/// # Ok(())
/// # }
/// ```
pub struct ConcurrentPipeline {
    options: Arc<AnalysisOptions>,
    limit: Arc<Semaphore>,
}

impl ConcurrentPipeline {
    pub fn new(options: AnalysisOptions) -> Self {
        Self::with_max_concurrency(options, DEFAULT_MAX_CONCURRENCY)
    }

    /// `max_concurrency` is clamped to at least one.
    pub fn with_max_concurrency(options: AnalysisOptions, max_concurrency: usize) -> Self {
        Self {
            options: Arc::new(options),
            limit: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Resolve `paths`, load every statement and analyse them.
    ///
    /// Unreadable files are skipped with a warning, as in the sequential
    /// pipeline.
    pub async fn run(&self, paths: &[PathBuf]) -> Result<AnalysisResult> {
        let load_start = Instant::now();
        let owned = paths.to_vec();
        let files = tokio::task::spawn_blocking(move || resolve_statement_files(&owned))
            .await
            .map_err(join_error)??;

        let (batches, skipped) = self.load(files).await?;
        let load_time = load_start.elapsed().as_secs_f64();

        let mut result = self.run_batches(batches).await?;
        result.metadata.files_skipped = skipped;
        result.metadata.load_time_seconds = load_time;
        Ok(result)
    }

    /// Analyse statements that are already in memory.
    pub async fn run_batches(&self, batches: Vec<StatementBatch>) -> Result<AnalysisResult> {
        let transform_start = Instant::now();

        let options = Arc::clone(&self.options);
        let (enricher, batches) = tokio::task::spawn_blocking(move || {
            prepare_enricher(&options, &batches).map(|enricher| (enricher, batches))
        })
        .await
        .map_err(join_error)??;
        let enricher = Arc::new(enricher);

        let outcomes = self.enrich_all(Arc::clone(&enricher), batches).await?;

        let metadata = AnalysisMetadata {
            transform_time_seconds: transform_start.elapsed().as_secs_f64(),
            ..Default::default()
        };
        Ok(finish_analysis(&self.options, &enricher, outcomes, metadata))
    }

    /// Read files concurrently; returns loaded batches in file order plus the
    /// files that could not be read.
    async fn load(&self, files: Vec<PathBuf>) -> Result<(Vec<StatementBatch>, Vec<PathBuf>)> {
        let mut tasks = JoinSet::new();
        for (idx, file) in files.into_iter().enumerate() {
            let permit = Arc::clone(&self.limit)
                .acquire_owned()
                .await
                .map_err(|e| CycleError::Task(e.to_string()))?;
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let result = read_statement(&file);
                (idx, file, result)
            });
        }

        let mut loaded: Vec<(usize, StatementBatch)> = Vec::new();
        let mut skipped: Vec<(usize, PathBuf)> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (idx, file, result) = joined.map_err(join_error)?;
            match result {
                Ok(batch) => loaded.push((idx, batch)),
                Err(e) => {
                    tracing::warn!("Skipping statement {}: {}", file.display(), e);
                    skipped.push((idx, file));
                }
            }
        }

        loaded.sort_by_key(|(idx, _)| *idx);
        skipped.sort_by_key(|(idx, _)| *idx);
        tracing::debug!(
            "Loaded {} statements ({} skipped)",
            loaded.len(),
            skipped.len()
        );
        Ok((
            loaded.into_iter().map(|(_, b)| b).collect(),
            skipped.into_iter().map(|(_, f)| f).collect(),
        ))
    }

    /// Enrich every batch on its own task; outcomes come back in input order.
    async fn enrich_all(
        &self,
        enricher: Arc<TransactionEnricher>,
        batches: Vec<StatementBatch>,
    ) -> Result<Vec<BatchOutcome>> {
        let mut tasks = JoinSet::new();
        for (idx, batch) in batches.into_iter().enumerate() {
            let permit = Arc::clone(&self.limit)
                .acquire_owned()
                .await
                .map_err(|e| CycleError::Task(e.to_string()))?;
            let enricher = Arc::clone(&enricher);
            let options = Arc::clone(&self.options);
            tasks.spawn_blocking(move || {
                let _permit = permit;
                (idx, enrich_batch(&enricher, &options, batch))
            });
        }

        let mut outcomes: Vec<(usize, BatchOutcome)> = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            outcomes.push(joined.map_err(join_error)?);
        }
        outcomes.sort_by_key(|(idx, _)| *idx);
        Ok(outcomes.into_iter().map(|(_, o)| o).collect())
    }
}

fn join_error(err: tokio::task::JoinError) -> CycleError {
    CycleError::Task(err.to_string())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
