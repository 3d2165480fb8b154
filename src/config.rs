//! Pipeline configuration: aggregation, RFM scoring and ABC thresholds

use std::path::Path;

use anyhow::Context;
use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::data::ColumnMap;
use crate::error::ConfigError;

/// Default number of quantile bins per RFM axis.
pub const DEFAULT_BINS: usize = 5;
/// Default cumulative revenue share closing class A.
pub const DEFAULT_A_THRESHOLD: f64 = 0.80;
/// Default cumulative revenue share closing class B.
pub const DEFAULT_B_THRESHOLD: f64 = 0.95;
/// Label for customers no rule matches.
pub const DEFAULT_FALLBACK_SEGMENT: &str = "Occasional";

/// Date recency is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceDate {
    /// One day after the latest valid transaction.
    #[default]
    DayAfterLatest,
    Fixed(NaiveDateTime),
}

/// What counts as one purchase for the frequency metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyMode {
    /// Every transaction line is one purchase.
    #[default]
    LineItems,
    /// Lines sharing an order id count once.
    DistinctOrders,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    pub reference_date: ReferenceDate,
    pub frequency: FrequencyMode,
}

/// Inclusive range of scores on one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ScoreRange {
    pub min: u8,
    pub max: u8,
}

impl ScoreRange {
    pub fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    pub fn at_least(min: u8) -> Self {
        Self { min, max: u8::MAX }
    }

    pub fn at_most(max: u8) -> Self {
        Self { min: 1, max }
    }

    pub fn any() -> Self {
        Self {
            min: 1,
            max: u8::MAX,
        }
    }

    pub fn contains(&self, score: u8) -> bool {
        (self.min..=self.max).contains(&score)
    }
}

impl Default for ScoreRange {
    fn default() -> Self {
        Self::any()
    }
}

/// A named predicate over an (R, F, M) score triple.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SegmentRule {
    pub name: String,
    #[serde(default)]
    pub recency: ScoreRange,
    #[serde(default)]
    pub frequency: ScoreRange,
    #[serde(default)]
    pub monetary: ScoreRange,
}

impl SegmentRule {
    pub fn matches(&self, r: u8, f: u8, m: u8) -> bool {
        self.recency.contains(r) && self.frequency.contains(f) && self.monetary.contains(m)
    }
}

/// Ordered segmentation rules; the first matching rule wins and the
/// fallback label catches everything else.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SegmentRules {
    pub rules: Vec<SegmentRule>,
    pub fallback: String,
}

impl SegmentRules {
    /// Standard rule order with thresholds scaled to `bins`.
    ///
    /// For 5 bins: Champions (R, F, M >= 4), Loyal (F, M >= 4),
    /// Potential (R >= 4, F <= 2), At Risk (R <= 2, F >= 3),
    /// Lost (R <= 2, F <= 2), otherwise Occasional.
    pub fn standard(bins: usize) -> Self {
        let bins = bins.clamp(1, u8::MAX as usize);
        let high = ((bins * 4 + 4) / 5).max(1) as u8;
        let low = ((bins * 2) / 5).max(1) as u8;
        let mid = low.saturating_add(1).min(bins as u8);

        let rule = |name: &str, recency, frequency, monetary| SegmentRule {
            name: name.to_string(),
            recency,
            frequency,
            monetary,
        };

        Self {
            rules: vec![
                rule(
                    "Champions",
                    ScoreRange::at_least(high),
                    ScoreRange::at_least(high),
                    ScoreRange::at_least(high),
                ),
                rule(
                    "Loyal",
                    ScoreRange::any(),
                    ScoreRange::at_least(high),
                    ScoreRange::at_least(high),
                ),
                rule(
                    "Potential",
                    ScoreRange::at_least(high),
                    ScoreRange::at_most(low),
                    ScoreRange::any(),
                ),
                rule(
                    "At Risk",
                    ScoreRange::at_most(low),
                    ScoreRange::at_least(mid),
                    ScoreRange::any(),
                ),
                rule(
                    "Lost",
                    ScoreRange::at_most(low),
                    ScoreRange::at_most(low),
                    ScoreRange::any(),
                ),
            ],
            fallback: DEFAULT_FALLBACK_SEGMENT.to_string(),
        }
    }

    /// Label for a score triple. Total: never fails to produce a label.
    pub fn classify(&self, r: u8, f: u8, m: u8) -> &str {
        self.rules
            .iter()
            .find(|rule| rule.matches(r, f, m))
            .map(|rule| rule.name.as_str())
            .unwrap_or(self.fallback.as_str())
    }

    /// Every label this rule set can produce, in evaluation order.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::with_capacity(self.rules.len() + 1);
        for name in self
            .rules
            .iter()
            .map(|r| r.name.as_str())
            .chain(std::iter::once(self.fallback.as_str()))
        {
            if !labels.contains(&name) {
                labels.push(name);
            }
        }
        labels
    }

    /// Check every rule is well formed and reachable on a `1..=bins` scale.
    pub fn validate(&self, bins: usize) -> Result<(), ConfigError> {
        if self.fallback.trim().is_empty() {
            return Err(ConfigError::EmptyLabel);
        }
        for rule in &self.rules {
            if rule.name.trim().is_empty() {
                return Err(ConfigError::EmptyLabel);
            }
            for (axis, range) in [
                ("recency", rule.recency),
                ("frequency", rule.frequency),
                ("monetary", rule.monetary),
            ] {
                if range.min == 0 || range.min > range.max {
                    return Err(ConfigError::InvalidRule {
                        name: rule.name.clone(),
                        reason: format!(
                            "{} range {}..={} is empty or below 1",
                            axis, range.min, range.max
                        ),
                    });
                }
                if usize::from(range.min) > bins {
                    return Err(ConfigError::InvalidRule {
                        name: rule.name.clone(),
                        reason: format!(
                            "{} minimum {} is above the top score {}",
                            axis, range.min, bins
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for SegmentRules {
    fn default() -> Self {
        Self::standard(DEFAULT_BINS)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RfmConfigFile")]
pub struct RfmConfig {
    /// Quantile bins per axis; also the top of the score scale.
    pub bins: usize,
    pub rules: SegmentRules,
}

impl RfmConfig {
    /// Config with `bins` bins and the standard rules for that scale.
    pub fn with_bins(bins: usize) -> Self {
        Self {
            bins,
            rules: SegmentRules::standard(bins),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bins < 1 || self.bins > u8::MAX as usize {
            return Err(ConfigError::InvalidBinCount(self.bins));
        }
        self.rules.validate(self.bins)
    }
}

impl Default for RfmConfig {
    fn default() -> Self {
        Self::with_bins(DEFAULT_BINS)
    }
}

/// `rfm` section of a settings file. Without explicit rules the standard
/// ones are scaled to the configured bin count.
#[derive(Deserialize)]
struct RfmConfigFile {
    #[serde(default = "default_bins")]
    bins: usize,
    #[serde(default)]
    rules: Option<SegmentRules>,
}

fn default_bins() -> usize {
    DEFAULT_BINS
}

impl From<RfmConfigFile> for RfmConfig {
    fn from(file: RfmConfigFile) -> Self {
        match file.rules {
            Some(rules) => Self { bins: file.bins, rules },
            None => Self::with_bins(file.bins),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct AbcConfig {
    /// Cumulative revenue share that closes class A.
    pub a_threshold: f64,
    /// Cumulative revenue share that closes class B.
    pub b_threshold: f64,
}

impl AbcConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [("A", self.a_threshold), ("B", self.b_threshold)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }
        if self.a_threshold >= self.b_threshold {
            return Err(ConfigError::ThresholdsNotIncreasing {
                a: self.a_threshold,
                b: self.b_threshold,
            });
        }
        Ok(())
    }
}

impl Default for AbcConfig {
    fn default() -> Self {
        Self {
            a_threshold: DEFAULT_A_THRESHOLD,
            b_threshold: DEFAULT_B_THRESHOLD,
        }
    }
}

/// Everything the analysis stages need.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub aggregate: AggregateConfig,
    pub rfm: RfmConfig,
    pub abc: AbcConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rfm.validate()?;
        self.abc.validate()
    }
}

/// Contents of a `--config` JSON file.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub columns: ColumnMap,
    #[serde(flatten)]
    pub pipeline: PipelineConfig,
}

impl Settings {
    /// Load settings from a JSON file. Absent keys take their defaults.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        let settings = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file '{}'", path.display()))?;
        Ok(settings)
    }
}
