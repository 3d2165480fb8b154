//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use chrono::NaiveDateTime;
use clap::Parser;

use crate::aggregate::parse_datetime;
use crate::config::{FrequencyMode, ReferenceDate, RfmConfig, SegmentRules, Settings};

/// RFM customer segmentation and ABC/Pareto product analysis of sales data
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file
    #[arg(short, long, default_value = "data/sales.csv")]
    pub input: PathBuf,

    /// Directory for result tables and charts
    #[arg(short, long, default_value = "results")]
    pub output: PathBuf,

    /// JSON settings file (columns, thresholds, segment rules)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of quantile bins per RFM axis
    #[arg(short, long)]
    pub bins: Option<usize>,

    /// Cumulative revenue share closing class A
    #[arg(long)]
    pub a_threshold: Option<f64>,

    /// Cumulative revenue share closing class B
    #[arg(long)]
    pub b_threshold: Option<f64>,

    /// Fixed reference date for recency (default: day after the latest sale)
    #[arg(long)]
    pub reference_date: Option<String>,

    /// What counts as one purchase for frequency
    #[arg(long, value_enum)]
    pub frequency: Option<FrequencyMode>,

    /// Customer id column
    #[arg(long)]
    pub customer_column: Option<String>,

    /// Product id column
    #[arg(long)]
    pub product_column: Option<String>,

    /// Transaction date column
    #[arg(long)]
    pub date_column: Option<String>,

    /// Score a hypothetical customer: "recency,frequency,monetary"
    /// Example: --score "3,12,850.0" for 3 days, 12 purchases, $850
    #[arg(short, long)]
    pub score: Option<String>,

    /// Also render SVG charts
    #[arg(long)]
    pub charts: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Parse RFM values from the score string
    /// Expected format: "recency,frequency,monetary"
    pub fn parse_rfm_values(&self) -> crate::Result<Option<(f64, f64, f64)>> {
        let Some(score) = self.score.as_deref() else {
            return Ok(None);
        };

        let values = score
            .split(',')
            .map(str::trim)
            .map(|part| {
                part.parse::<f64>()
                    .map_err(|_| anyhow::anyhow!("Invalid score value: '{}'", part))
            })
            .collect::<crate::Result<Vec<f64>>>()?;

        match values[..] {
            [recency, frequency, monetary] => Ok(Some((recency, frequency, monetary))),
            _ => anyhow::bail!("Score values must be in format 'recency,frequency,monetary'"),
        }
    }

    fn parse_reference_date(&self) -> crate::Result<Option<NaiveDateTime>> {
        self.reference_date
            .as_deref()
            .map(|s| parse_datetime(s).ok_or_else(|| anyhow::anyhow!("Invalid reference date: {}", s)))
            .transpose()
    }

    /// Load the settings file, if any, and apply command-line overrides.
    ///
    /// Changing `--bins` also rescales the segment rules to the new score
    /// range, unless the settings file brought its own rules.
    pub fn settings(&self) -> crate::Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };

        if let Some(bins) = self.bins {
            let rfm = &settings.pipeline.rfm;
            if rfm.rules == SegmentRules::standard(rfm.bins) {
                settings.pipeline.rfm = RfmConfig::with_bins(bins);
            } else {
                settings.pipeline.rfm.bins = bins;
            }
        }
        if let Some(a) = self.a_threshold {
            settings.pipeline.abc.a_threshold = a;
        }
        if let Some(b) = self.b_threshold {
            settings.pipeline.abc.b_threshold = b;
        }
        if let Some(date) = self.parse_reference_date()? {
            settings.pipeline.aggregate.reference_date = ReferenceDate::Fixed(date);
        }
        if let Some(mode) = self.frequency {
            settings.pipeline.aggregate.frequency = mode;
        }
        if let Some(ref column) = self.customer_column {
            settings.columns.customer = column.clone();
        }
        if let Some(ref column) = self.product_column {
            settings.columns.product = column.clone();
        }
        if let Some(ref column) = self.date_column {
            settings.columns.date = column.clone();
        }

        Ok(settings)
    }
}
