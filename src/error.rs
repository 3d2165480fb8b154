//! Error and warning types shared by the analysis stages

use std::fmt;

use thiserror::Error;

/// Invalid configuration. Always fatal, raised before any data is processed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("bin count must be at least 1, got {0}")]
    InvalidBinCount(usize),

    #[error("ABC threshold {name} must lie in (0, 1], got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    #[error("ABC thresholds must be strictly increasing (A = {a}, B = {b})")]
    ThresholdsNotIncreasing { a: f64, b: f64 },

    #[error("segment rule '{name}': {reason}")]
    InvalidRule { name: String, reason: String },

    #[error("segment label must not be empty")]
    EmptyLabel,
}

/// Why a single transaction row was excluded from aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Error)]
pub enum RecordError {
    #[error("missing customer id")]
    MissingCustomer,

    #[error("missing product id")]
    MissingProduct,

    #[error("missing or unparseable transaction date")]
    InvalidDate,

    #[error("missing or unparseable quantity, price or revenue")]
    InvalidNumber,

    #[error("non-positive quantity or negative revenue (return/cancellation)")]
    Return,
}

impl RecordError {
    /// Row checks in the order they are applied; a row is rejected for the
    /// first one it fails.
    pub const ALL: [RecordError; 5] = [
        RecordError::MissingCustomer,
        RecordError::MissingProduct,
        RecordError::InvalidDate,
        RecordError::InvalidNumber,
        RecordError::Return,
    ];

    /// Short column-safe name of the reason.
    pub fn tag(self) -> &'static str {
        match self {
            RecordError::MissingCustomer => "missing_customer",
            RecordError::MissingProduct => "missing_product",
            RecordError::InvalidDate => "invalid_date",
            RecordError::InvalidNumber => "invalid_number",
            RecordError::Return => "return",
        }
    }
}

/// Which RFM axis a message refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Recency,
    Frequency,
    Monetary,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::Recency => "recency",
            Metric::Frequency => "frequency",
            Metric::Monetary => "monetary",
        };
        f.write_str(name)
    }
}

/// Non-fatal data-quality findings surfaced alongside a result.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// Rows excluded from aggregation.
    MalformedRecords { rejected: usize, total: usize },
    /// No valid customers after cleaning; RFM output is empty.
    NoCustomers,
    /// No valid products after cleaning; ABC output is empty.
    NoProducts,
    /// A metric could not support the requested number of quantile bins.
    DegenerateDistribution {
        metric: Metric,
        requested: usize,
        used: usize,
    },
    /// Total product revenue is zero; every product is class C.
    ZeroRevenue,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MalformedRecords { rejected, total } => {
                write!(f, "{} of {} records rejected during cleaning", rejected, total)
            }
            Warning::NoCustomers => f.write_str("no valid customers; RFM scoring skipped"),
            Warning::NoProducts => f.write_str("no valid products; ABC classification skipped"),
            Warning::DegenerateDistribution {
                metric,
                requested,
                used,
            } => write!(
                f,
                "{} supports only {} of {} requested quantile bins",
                metric, used, requested
            ),
            Warning::ZeroRevenue => {
                f.write_str("total product revenue is zero; all products assigned class C")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_display() {
        let warning = Warning::DegenerateDistribution {
            metric: Metric::Frequency,
            requested: 5,
            used: 2,
        };
        assert_eq!(
            warning.to_string(),
            "frequency supports only 2 of 5 requested quantile bins"
        );
    }

    #[test]
    fn test_record_error_tags_are_distinct() {
        let mut tags: Vec<&str> = RecordError::ALL.iter().map(|r| r.tag()).collect();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), RecordError::ALL.len());
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::ThresholdsNotIncreasing { a: 0.9, b: 0.8 };
        assert!(err.to_string().contains("strictly increasing"));
    }
}
