use clap::{CommandFactory, Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::aggregation::{Dimension, Measure};
use crate::calendar::MonthLabelStyle;
use crate::formatting::Currency;
use crate::parsing::AmountSign;

/// Cycle start day used when nothing else is configured.
pub const DEFAULT_START_DAY: u32 = 17;

/// Description fragment of card bill payments, which are not spending.
pub const DEFAULT_EXCLUDE: &str = "Pagamento recebido";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// How the report is written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Weekly and billing-cycle spending analysis for bank statement exports
#[derive(Parser, Debug, Clone)]
#[command(
    name = "spend-cycles",
    about = "Weekly and billing-cycle spending analysis for bank statement exports",
    version
)]
pub struct Settings {
    /// Statement CSV files or directories to scan
    #[arg(value_name = "PATHS", default_value = ".")]
    pub paths: Vec<PathBuf>,

    /// Day of the month on which a billing cycle starts (1-28)
    #[arg(long, default_value = "17", value_parser = clap::value_parser!(u32).range(1..=28))]
    pub start_day: u32,

    /// JSON file with ordered category rules (built-in rules if omitted)
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Timezone for dates carrying an offset (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Language of month abbreviations
    #[arg(long, value_enum, default_value_t = MonthLabelStyle::Pt)]
    pub month_labels: MonthLabelStyle,

    /// Dimension to summarise by; repeat for several (all if omitted)
    #[arg(long = "group-by", value_enum)]
    pub group_by: Vec<Dimension>,

    /// Sign of purchases in the amount column
    #[arg(long, value_enum, default_value_t = AmountSign::ExpenseNegative)]
    pub amount_sign: AmountSign,

    /// Amount summed into each bucket
    #[arg(long, value_enum, default_value_t = Measure::Spending)]
    pub measure: Measure,

    /// Drop rows whose description contains this text (case-insensitive)
    #[arg(long, default_values_t = vec![DEFAULT_EXCLUDE.to_string()])]
    pub exclude: Vec<String>,

    /// Write the enriched transactions to this CSV file
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Currency used when printing amounts
    #[arg(long, value_enum, default_value_t = Currency::Brl)]
    pub currency: Currency,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

impl Settings {
    /// Dimensions to report, defaulting to all of them.
    pub fn dimensions(&self) -> Vec<Dimension> {
        if self.group_by.is_empty() {
            Dimension::ALL.to_vec()
        } else {
            let mut dims: Vec<Dimension> = Vec::with_capacity(self.group_by.len());
            for dim in &self.group_by {
                if !dims.contains(dim) {
                    dims.push(*dim);
                }
            }
            dims
        }
    }
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.spend-cycles/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_day: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month_labels: Option<MonthLabelStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
}

impl LastUsedParams {
    /// Default path of the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Config path rooted at `base_dir`.
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".spend-cycles").join("last_used.json")
    }

    /// Load persisted params from the default path.
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable {}: {}", path.display(), e);
            Self::default()
        })
    }

    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&Self::config_path())
    }

    /// Atomically write params to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    pub fn clear() -> Result<(), std::io::Error> {
        Self::clear_at(&Self::config_path())
    }

    /// Delete the config file at `path` if it exists.
    pub fn clear_at(path: &Path) -> Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings loading ───────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, fill unset options from the last run, resolve
    /// `"auto"` values, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`Self::load_with_last_used`] with an explicit config path.
    pub fn load_with_last_used_impl(args: Vec<std::ffi::OsString>, config_path: &Path) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            if let Err(e) = LastUsedParams::clear_at(config_path) {
                tracing::warn!("Could not clear {}: {}", config_path.display(), e);
            }
            return Self::resolve_auto_values(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins. clap keys args by field name, not flag spelling.
        if !is_arg_explicitly_set(&matches, "start_day") {
            if let Some(v) = last.start_day.filter(|d| (1..=28).contains(d)) {
                settings.start_day = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "timezone") {
            if let Some(v) = last.timezone {
                settings.timezone = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "month_labels") {
            if let Some(v) = last.month_labels {
                settings.month_labels = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "rules") && settings.rules.is_none() {
            settings.rules = last.rules;
        }
        if !is_arg_explicitly_set(&matches, "currency") {
            if let Some(v) = last.currency {
                settings.currency = v;
            }
        }

        settings = Self::resolve_auto_values(settings);

        let params = LastUsedParams::from(&settings);
        if let Err(e) = params.save_to(config_path) {
            tracing::warn!("Could not persist settings to {}: {}", config_path.display(), e);
        }

        settings
    }

    /// Resolve `"auto"` sentinel values and apply the `--debug` flag.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        if settings.timezone == "auto" {
            settings.timezone = crate::parsing::get_system_timezone();
        }
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            start_day: Some(s.start_day),
            timezone: Some(s.timezone.clone()),
            month_labels: Some(s.month_labels),
            rules: s.rules.clone(),
            currency: Some(s.currency),
        }
    }
}

/// `true` when `name` was supplied on the command line (not via default).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
