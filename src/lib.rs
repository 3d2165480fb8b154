//! SalesForge: RFM customer segmentation and ABC/Pareto product analysis
//!
//! Transaction rows are aggregated into per-customer recency, frequency and
//! monetary metrics and per-product revenue. Customers are scored on
//! equal-population quantile bins and segmented by ordered rules; products
//! are ranked by revenue and classified A/B/C by cumulative share.

pub mod abc;
pub mod aggregate;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod quantile;
pub mod report;
pub mod rfm;
pub mod viz;

// Re-export public items for easier access
pub use abc::{classify_products, AbcClass, AbcClassification, ClassifiedProduct};
pub use aggregate::{aggregate, Aggregation, CustomerSummary, ProductSummary, RejectionTally, SalesOverview};
pub use cli::Args;
pub use config::{AbcConfig, AggregateConfig, FrequencyMode, PipelineConfig, ReferenceDate, RfmConfig, SegmentRules, Settings};
pub use data::{load_dataset, load_records, ColumnMap, DataQuality, Dataset, RawRecord};
pub use error::{ConfigError, RecordError, Warning};
pub use pipeline::{run_pipeline, AnalysisReport};
pub use rfm::{score_customers, RfmModel, RfmScore, RfmScoring, ScoredCustomer};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
