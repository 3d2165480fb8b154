//! RFM scoring and rule-based customer segmentation

use crate::aggregate::CustomerSummary;
use crate::config::{RfmConfig, SegmentRules};
use crate::error::{Metric, Warning};
use crate::quantile::QuantileBins;

/// Per-axis scores; higher is better on every axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RfmScore {
    pub recency: u8,
    pub frequency: u8,
    pub monetary: u8,
}

impl RfmScore {
    /// Concatenated score code, e.g. `"545"`.
    pub fn code(&self) -> String {
        format!("{}{}{}", self.recency, self.frequency, self.monetary)
    }
}

/// A customer summary with its scores and segment.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCustomer {
    pub summary: CustomerSummary,
    pub score: RfmScore,
    pub segment: String,
}

/// Quantile boundaries and rules fitted on one population.
#[derive(Debug, Clone, PartialEq)]
pub struct RfmModel {
    pub recency: QuantileBins,
    pub frequency: QuantileBins,
    pub monetary: QuantileBins,
    pub rules: SegmentRules,
}

impl RfmModel {
    /// Fit boundaries for every axis on `customers`.
    pub fn fit(customers: &[CustomerSummary], config: &RfmConfig) -> Self {
        let recency: Vec<f64> = customers.iter().map(|c| c.recency as f64).collect();
        let frequency: Vec<f64> = customers.iter().map(|c| f64::from(c.frequency)).collect();
        let monetary: Vec<f64> = customers.iter().map(|c| c.monetary).collect();

        Self {
            recency: QuantileBins::fit(&recency, config.bins),
            frequency: QuantileBins::fit(&frequency, config.bins),
            monetary: QuantileBins::fit(&monetary, config.bins),
            rules: config.rules.clone(),
        }
    }

    /// Score raw metric values against the fitted boundaries.
    ///
    /// Recency is reversed: fewer days since the last purchase scores higher.
    pub fn score(&self, recency: f64, frequency: f64, monetary: f64) -> RfmScore {
        RfmScore {
            recency: self.recency.score_reversed(recency),
            frequency: self.frequency.score(frequency),
            monetary: self.monetary.score(monetary),
        }
    }

    pub fn segment(&self, score: &RfmScore) -> &str {
        self.rules.classify(score.recency, score.frequency, score.monetary)
    }

    /// Axes whose distribution could not fill every requested bin.
    pub fn degenerate_axes(&self) -> Vec<Warning> {
        [
            (Metric::Recency, &self.recency),
            (Metric::Frequency, &self.frequency),
            (Metric::Monetary, &self.monetary),
        ]
        .into_iter()
        .filter(|(_, bins)| bins.is_collapsed())
        .map(|(metric, bins)| Warning::DegenerateDistribution {
            metric,
            requested: bins.requested(),
            used: bins.bins_used(),
        })
        .collect()
    }
}

/// Customer count and value per segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentStats {
    pub segment: String,
    pub customers: usize,
    pub monetary: f64,
}

/// Output of [`score_customers`].
#[derive(Debug, Clone, PartialEq)]
pub struct RfmScoring {
    /// Same order as the input summaries.
    pub customers: Vec<ScoredCustomer>,
    /// `None` when there were no customers to fit on.
    pub model: Option<RfmModel>,
    /// One entry per label of the rule set, in rule order.
    pub segments: Vec<SegmentStats>,
    pub warnings: Vec<Warning>,
}

/// Score and segment every customer.
///
/// Quantile boundaries are recomputed from this population on every call.
/// Scores always fall within `1..=config.bins`; an axis with too many ties
/// collapses to fewer bins and is reported as a warning.
pub fn score_customers(customers: &[CustomerSummary], config: &RfmConfig) -> RfmScoring {
    if customers.is_empty() {
        tracing::warn!("no customers to score");
        return RfmScoring {
            customers: Vec::new(),
            model: None,
            segments: Vec::new(),
            warnings: vec![Warning::NoCustomers],
        };
    }

    let model = RfmModel::fit(customers, config);
    let warnings = model.degenerate_axes();
    for warning in &warnings {
        tracing::warn!(%warning, "collapsed quantile bins");
    }

    let scored: Vec<ScoredCustomer> = customers
        .iter()
        .map(|summary| {
            let score = model.score(summary.recency as f64, f64::from(summary.frequency), summary.monetary);
            ScoredCustomer {
                segment: model.segment(&score).to_string(),
                summary: summary.clone(),
                score,
            }
        })
        .collect();

    let segments = segment_stats(&scored, &model.rules);

    RfmScoring {
        customers: scored,
        model: Some(model),
        segments,
        warnings,
    }
}

fn segment_stats(customers: &[ScoredCustomer], rules: &SegmentRules) -> Vec<SegmentStats> {
    rules
        .labels()
        .into_iter()
        .map(|label| {
            let members = customers.iter().filter(|c| c.segment == label);
            let (count, monetary) = members.fold((0, 0.0), |(n, total), c| (n + 1, total + c.summary.monetary));
            SegmentStats {
                segment: label.to_string(),
                customers: count,
                monetary,
            }
        })
        .collect()
}
