//! End-to-end analysis: aggregate, then score customers and classify products

use chrono::NaiveDateTime;

use crate::abc::{classify_products, AbcClassification};
use crate::aggregate::{aggregate, RejectionTally, SalesOverview};
use crate::config::PipelineConfig;
use crate::data::RawRecord;
use crate::error::Warning;
use crate::rfm::{score_customers, RfmScoring};

/// Everything one run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub reference_date: Option<NaiveDateTime>,
    pub overview: SalesOverview,
    pub rejections: RejectionTally,
    pub total_records: usize,
    pub rfm: RfmScoring,
    pub abc: AbcClassification,
    /// Data-quality findings from every stage, in stage order.
    pub warnings: Vec<Warning>,
}

/// Run the whole analysis on a batch of records.
///
/// Configuration is validated before any record is looked at and an
/// invalid one fails with a [`ConfigError`](crate::error::ConfigError).
/// Bad rows, empty populations and degenerate distributions are reported
/// as warnings instead.
pub fn run_pipeline(records: &[RawRecord], config: &PipelineConfig) -> crate::Result<AnalysisReport> {
    config.validate()?;

    let aggregation = aggregate(records, &config.aggregate)?;
    let rejected = aggregation.rejections.total();
    tracing::info!(
        records = records.len(),
        rejected,
        customers = aggregation.customers.len(),
        products = aggregation.products.len(),
        "aggregation complete"
    );

    let mut warnings = Vec::new();
    if rejected > 0 {
        warnings.push(Warning::MalformedRecords {
            rejected,
            total: records.len(),
        });
    }

    let rfm = score_customers(&aggregation.customers, &config.rfm);
    warnings.extend(rfm.warnings.iter().cloned());

    let abc = classify_products(&aggregation.products, &config.abc);
    warnings.extend(abc.warnings.iter().cloned());

    Ok(AnalysisReport {
        reference_date: aggregation.reference_date,
        overview: aggregation.overview,
        rejections: aggregation.rejections,
        total_records: aggregation.total_records,
        rfm,
        abc,
        warnings,
    })
}
