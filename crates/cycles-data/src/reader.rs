//! Statement discovery and CSV loading.
//!
//! Turns paths given on the command line into [`StatementBatch`]es of raw
//! rows. Nothing is parsed beyond splitting fields: dates and amounts stay
//! text until enrichment, which counts whatever it cannot use.

use std::io::Read;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use cycles_core::error::{CycleError, Result};
use cycles_core::models::RawTransaction;
use tracing::{debug, warn};

// ── Discovery ─────────────────────────────────────────────────────────────────

/// Find all `.csv` files recursively under `dir`, sorted by path.
pub fn find_csv_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Expand files and directories into the ordered list of statements to read.
///
/// Explicit files are kept whatever their extension; directories contribute
/// their CSV files. Duplicates keep their first position.
pub fn resolve_statement_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();
    for path in paths {
        if !path.exists() {
            return Err(CycleError::PathNotFound(path.clone()));
        }
        let found = if path.is_dir() {
            find_csv_files(path)
        } else {
            vec![path.clone()]
        };
        for file in found {
            if !files.contains(&file) {
                files.push(file);
            }
        }
    }

    if files.is_empty() {
        let shown = paths.first().cloned().unwrap_or_else(|| PathBuf::from("."));
        return Err(CycleError::NoStatementFiles(shown));
    }
    debug!("Resolved {} statement files", files.len());
    Ok(files)
}

// ── Columns ───────────────────────────────────────────────────────────────────

const DATE_HEADERS: &[&str] = &["data", "date", "dt"];
const AMOUNT_HEADERS: &[&str] = &["valor", "value", "amount", "quantia"];
const DESCRIPTION_HEADERS: &[&str] = &[
    "descricao",
    "descrição",
    "description",
    "historico",
    "histórico",
    "desc",
    "title",
    "titulo",
    "título",
];

/// Positions of the fields a statement row is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub date: usize,
    pub amount: usize,
    pub description: Option<usize>,
}

impl ColumnMap {
    /// Detect columns from a header record.
    ///
    /// An exact header name wins over a header merely containing a keyword.
    /// Each column serves at most one role, checked date, amount, then
    /// description. Missing roles fall back to positions 0, 1 and 2.
    pub fn detect(headers: &StringRecord) -> Result<Self> {
        let normalised: Vec<String> = headers
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_lowercase())
            .collect();

        let width = normalised.len();
        let too_narrow = || {
            CycleError::Config(format!(
                "statement needs a date and an amount column, found {width} columns"
            ))
        };
        if width < 2 {
            return Err(too_narrow());
        }

        let mut taken = vec![false; width];
        let date = find_column(&normalised, DATE_HEADERS, &mut taken);
        let amount = find_column(&normalised, AMOUNT_HEADERS, &mut taken);
        let description = find_column(&normalised, DESCRIPTION_HEADERS, &mut taken);

        let date = date
            .or_else(|| claim_free(&mut taken, 0))
            .ok_or_else(too_narrow)?;
        let amount = amount
            .or_else(|| claim_free(&mut taken, 1))
            .ok_or_else(too_narrow)?;
        let description = description.or_else(|| (width > 2 && !taken[2]).then_some(2));

        let map = Self {
            date,
            amount,
            description,
        };
        debug!(?map, headers = ?normalised, "detected statement columns");
        Ok(map)
    }

    fn to_raw(&self, record: &StringRecord) -> RawTransaction {
        let field = |idx: usize| record.get(idx).unwrap_or("").trim().to_string();
        RawTransaction {
            date: field(self.date),
            amount: field(self.amount),
            description: self.description.map(field).unwrap_or_default(),
            source: None,
            row: None,
        }
    }
}

fn find_column(headers: &[String], keywords: &[&str], taken: &mut [bool]) -> Option<usize> {
    let exact = headers
        .iter()
        .enumerate()
        .position(|(i, h)| !taken[i] && keywords.contains(&h.as_str()));
    let found = exact.or_else(|| {
        headers
            .iter()
            .enumerate()
            .position(|(i, h)| !taken[i] && keywords.iter().any(|kw| h.contains(kw)))
    })?;
    taken[found] = true;
    Some(found)
}

/// `preferred` if still free, else the first free column.
fn claim_free(taken: &mut [bool], preferred: usize) -> Option<usize> {
    let idx = if taken.get(preferred) == Some(&false) {
        preferred
    } else {
        taken.iter().position(|t| !t)?
    };
    taken[idx] = true;
    Some(idx)
}

/// Pick the field delimiter from a header line: `;`, tab or `,`, whichever
/// occurs most outside quotes. Ties go to `,`.
pub fn sniff_delimiter(header_line: &str) -> u8 {
    let mut in_quotes = false;
    let (mut commas, mut semicolons, mut tabs) = (0usize, 0usize, 0usize);
    for c in header_line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => commas += 1,
            ';' if !in_quotes => semicolons += 1,
            '\t' if !in_quotes => tabs += 1,
            _ => {}
        }
    }
    if semicolons > commas && semicolons >= tabs {
        b';'
    } else if tabs > commas && tabs > semicolons {
        b'\t'
    } else {
        b','
    }
}

// ── Reading ───────────────────────────────────────────────────────────────────

/// All raw rows of one statement file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementBatch {
    /// File name, recorded as provenance on every row.
    pub source: String,
    pub rows: Vec<RawTransaction>,
}

/// Rows from a reader whose delimiter is already known.
pub fn read_rows<R: Read>(reader: R, delimiter: u8, source: &str) -> Result<Vec<RawTransaction>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| csv_error(source, e))?
        .clone();
    let columns = ColumnMap::detect(&headers)?;

    let mut rows = Vec::new();
    for (idx, result) in csv_reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping unreadable row {} in {}: {}", idx + 1, source, e);
                continue;
            }
        };
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let mut raw = columns.to_raw(&record);
        raw.source = Some(source.to_string());
        raw.row = Some(idx + 1);
        rows.push(raw);
    }
    Ok(rows)
}

/// Read one statement file, sniffing its delimiter from the first line.
pub fn read_statement(path: &Path) -> Result<StatementBatch> {
    let content = std::fs::read_to_string(path).map_err(|source| CycleError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let first_line = content.lines().next().unwrap_or("");
    let delimiter = sniff_delimiter(first_line);
    let rows = read_rows(content.as_bytes(), delimiter, &source).map_err(|e| match e {
        CycleError::Csv { message, .. } => CycleError::Csv {
            path: path.to_path_buf(),
            message,
        },
        other => other,
    })?;

    debug!(
        "Read {} rows from {} (delimiter {:?})",
        rows.len(),
        path.display(),
        delimiter as char
    );
    Ok(StatementBatch { source, rows })
}

/// Statements that loaded, and the files that had to be skipped.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub batches: Vec<StatementBatch>,
    pub skipped: Vec<PathBuf>,
}

/// Read every file in order. Unreadable files are logged and skipped.
pub fn load_statements(files: &[PathBuf]) -> LoadOutcome {
    let mut outcome = LoadOutcome::default();
    for file in files {
        match read_statement(file) {
            Ok(batch) => outcome.batches.push(batch),
            Err(e) => {
                warn!("Skipping statement {}: {}", file.display(), e);
                outcome.skipped.push(file.clone());
            }
        }
    }
    outcome
}

fn csv_error(source: &str, err: csv::Error) -> CycleError {
    CycleError::Csv {
        path: PathBuf::from(source),
        message: err.to_string(),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
