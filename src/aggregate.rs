//! Reduce transaction rows to per-customer and per-product summaries using Polars

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use polars::prelude::*;

use crate::config::{AggregateConfig, FrequencyMode, ReferenceDate};
use crate::data::RawRecord;
use crate::error::RecordError;

/// Accepted date-time layouts, tried in order after RFC 3339.
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"];
/// Accepted date-only layouts.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

// Columns of the typed transaction frame
const CUSTOMER: &str = "customer";
const PRODUCT: &str = "product";
const ORDER: &str = "order";
/// Milliseconds since the Unix epoch.
const DATE: &str = "date";
/// `YYYY-MM` of the transaction date.
const MONTH: &str = "month";
const QUANTITY: &str = "quantity";
/// Line revenue: the revenue cell, or quantity x unit price.
const REVENUE: &str = "revenue";
/// Tag of the first failed row check, or [`VALID`].
const REASON: &str = "reason";
const VALID: &str = "valid";

// Aggregate columns
const LAST_PURCHASE: &str = "last_purchase";
const FREQUENCY: &str = "frequency";
const MONETARY: &str = "monetary";
const UNITS_SOLD: &str = "units_sold";
const SALES: &str = "sales";

/// Parse a date or date-time cell. Date-only values are taken at midnight.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_number(cell: Option<&str>) -> Result<Option<f64>, RecordError> {
    let Some(cell) = cell else {
        return Ok(None);
    };
    cell.trim()
        .trim_start_matches('$')
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
        .ok_or(RecordError::InvalidNumber)
}

/// Quantity and line revenue of a record.
///
/// An unparseable quantity or revenue cell fails the line even when the
/// other cells would be enough to price it.
fn line_amounts(record: &RawRecord) -> Result<(Option<f64>, f64), RecordError> {
    let quantity = parse_number(record.quantity.as_deref())?;
    let revenue = match parse_number(record.revenue.as_deref())? {
        Some(revenue) => revenue,
        None => {
            let price = parse_number(record.unit_price.as_deref())?.ok_or(RecordError::InvalidNumber)?;
            quantity.ok_or(RecordError::InvalidNumber)? * price
        }
    };
    Ok((quantity, revenue))
}

fn to_millis(date: NaiveDateTime) -> i64 {
    date.and_utc().timestamp_millis()
}

fn from_millis(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

/// Per-customer recency, frequency and monetary value.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerSummary {
    pub customer_id: String,
    /// Whole days between the last purchase and the reference date.
    pub recency: i64,
    pub frequency: u32,
    pub monetary: f64,
    pub last_purchase: NaiveDateTime,
}

/// Per-product sales totals.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSummary {
    pub product_id: String,
    pub revenue: f64,
    pub units_sold: f64,
    /// Number of sale lines.
    pub sales: u32,
}

/// Counts of excluded rows by reason.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RejectionTally {
    pub missing_customer: usize,
    pub missing_product: usize,
    pub invalid_date: usize,
    pub invalid_number: usize,
    pub returns: usize,
}

impl RejectionTally {
    pub fn add(&mut self, reason: RecordError, count: usize) {
        match reason {
            RecordError::MissingCustomer => self.missing_customer += count,
            RecordError::MissingProduct => self.missing_product += count,
            RecordError::InvalidDate => self.invalid_date += count,
            RecordError::InvalidNumber => self.invalid_number += count,
            RecordError::Return => self.returns += count,
        }
    }

    pub fn total(&self) -> usize {
        self.missing_customer + self.missing_product + self.invalid_date + self.invalid_number + self.returns
    }

    /// Non-zero counts with their reasons, for reporting.
    pub fn breakdown(&self) -> Vec<(RecordError, usize)> {
        [
            (RecordError::MissingCustomer, self.missing_customer),
            (RecordError::MissingProduct, self.missing_product),
            (RecordError::InvalidDate, self.invalid_date),
            (RecordError::InvalidNumber, self.invalid_number),
            (RecordError::Return, self.returns),
        ]
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .collect()
    }
}

/// Headline sales figures over the valid transactions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SalesOverview {
    pub total_sales: f64,
    pub transactions: usize,
    pub average_ticket: f64,
    pub unique_customers: usize,
    pub unique_products: usize,
    /// `YYYY-MM` to revenue, in calendar order.
    pub monthly_sales: Vec<(String, f64)>,
}

/// Output of [`aggregate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    /// `None` when no row survived cleaning.
    pub reference_date: Option<NaiveDateTime>,
    /// Sorted by customer id.
    pub customers: Vec<CustomerSummary>,
    /// Sorted by product id.
    pub products: Vec<ProductSummary>,
    pub overview: SalesOverview,
    pub rejections: RejectionTally,
    pub total_records: usize,
}

/// Group records into customer and product summaries.
///
/// Bad rows never abort the run: each is excluded and counted in the
/// returned [`RejectionTally`]. Empty input gives empty summaries. Errors
/// come only from Polars itself.
pub fn aggregate(records: &[RawRecord], config: &AggregateConfig) -> PolarsResult<Aggregation> {
    if records.is_empty() {
        return Ok(Aggregation::default());
    }

    let checked = transaction_frame(records)?
        .lazy()
        .with_column(rejection_reason().alias(REASON))
        .collect()?;
    let rejections = tally_rejections(&checked)?;

    let valid = checked
        .lazy()
        .filter(col(REASON).eq(lit(VALID)))
        .collect()?;

    let mut aggregation = summarize(&valid, config)?;
    aggregation.rejections = rejections;
    aggregation.total_records = records.len();
    Ok(aggregation)
}

/// Type the cells of every record: dates as epoch milliseconds, numbers as
/// floats, `null` where a cell is missing or unparseable.
fn transaction_frame(records: &[RawRecord]) -> PolarsResult<DataFrame> {
    let mut dates = Vec::with_capacity(records.len());
    let mut months = Vec::with_capacity(records.len());
    let mut quantities = Vec::with_capacity(records.len());
    let mut revenues = Vec::with_capacity(records.len());

    for record in records {
        let date = record.date.as_deref().and_then(parse_datetime);
        dates.push(date.map(to_millis));
        months.push(date.map(|d| format!("{:04}-{:02}", d.year(), d.month())));

        let (quantity, revenue) = match line_amounts(record) {
            Ok((quantity, revenue)) => (quantity, Some(revenue)),
            Err(_) => (None, None),
        };
        quantities.push(quantity);
        revenues.push(revenue);
    }

    DataFrame::new(vec![
        Series::new(CUSTOMER, text_cells(records, |r| r.customer.as_deref())),
        Series::new(PRODUCT, text_cells(records, |r| r.product.as_deref())),
        Series::new(ORDER, text_cells(records, |r| r.order.as_deref())),
        Series::new(DATE, dates),
        Series::new(MONTH, months),
        Series::new(QUANTITY, quantities),
        Series::new(REVENUE, revenues),
    ])
}

fn text_cells<'a>(records: &'a [RawRecord], field: fn(&RawRecord) -> Option<&str>) -> Vec<Option<&'a str>> {
    records.iter().map(field).collect()
}

/// Tag of the first check a row fails, [`VALID`] when it passes them all.
fn rejection_reason() -> Expr {
    let checks = [
        (RecordError::MissingCustomer, col(CUSTOMER).is_null()),
        (RecordError::MissingProduct, col(PRODUCT).is_null()),
        (RecordError::InvalidDate, col(DATE).is_null()),
        (RecordError::InvalidNumber, col(REVENUE).is_null()),
        // Returns and cancellations
        (
            RecordError::Return,
            col(QUANTITY)
                .lt_eq(lit(0.0))
                .or(col(REVENUE).lt(lit(0.0)))
                .fill_null(lit(false)),
        ),
    ];

    checks
        .into_iter()
        .rev()
        .fold(lit(VALID), |otherwise, (reason, failed)| {
            when(failed).then(lit(reason.tag())).otherwise(otherwise)
        })
}

/// Count the rows behind each rejection reason.
fn tally_rejections(checked: &DataFrame) -> PolarsResult<RejectionTally> {
    let masks: Vec<Expr> = RecordError::ALL
        .iter()
        .map(|reason| {
            col(REASON)
                .eq(lit(reason.tag()))
                .cast(DataType::UInt32)
                .sum()
                .alias(reason.tag())
        })
        .collect();
    let counts = checked.clone().lazy().select(masks).collect()?;

    let mut tally = RejectionTally::default();
    for reason in RecordError::ALL {
        let count = counts
            .column(reason.tag())?
            .cast(&DataType::UInt64)?
            .u64()?
            .get(0)
            .unwrap_or(0) as usize;
        if count > 0 {
            tracing::debug!(%reason, count, "records rejected");
        }
        tally.add(reason, count);
    }
    Ok(tally)
}

/// Group the valid rows by customer, product and month.
fn summarize(valid: &DataFrame, config: &AggregateConfig) -> PolarsResult<Aggregation> {
    let Some(latest) = valid.column(DATE)?.i64()?.max().and_then(from_millis) else {
        return Ok(Aggregation::default());
    };
    let reference_date = match config.reference_date {
        ReferenceDate::DayAfterLatest => latest + Duration::days(1),
        ReferenceDate::Fixed(date) => date,
    };

    let customers = customer_summaries(valid, config.frequency, reference_date)?;
    let products = product_summaries(valid)?;

    let per_month = valid
        .clone()
        .lazy()
        .group_by([col(MONTH)])
        .agg([col(REVENUE).sum().alias(REVENUE)])
        .sort([MONTH], SortMultipleOptions::default())
        .collect()?;
    let monthly_sales = per_month
        .column(MONTH)?
        .str()?
        .into_no_null_iter()
        .zip(per_month.column(REVENUE)?.f64()?.into_no_null_iter())
        .map(|(month, revenue)| (month.to_string(), revenue))
        .collect();

    let total_sales = valid.column(REVENUE)?.f64()?.sum().unwrap_or(0.0);
    let transactions = valid.height();
    let overview = SalesOverview {
        total_sales,
        transactions,
        average_ticket: total_sales / transactions as f64,
        unique_customers: customers.len(),
        unique_products: products.len(),
        monthly_sales,
    };

    Ok(Aggregation {
        reference_date: Some(reference_date),
        customers,
        products,
        overview,
        rejections: RejectionTally::default(),
        total_records: transactions,
    })
}

fn customer_summaries(
    valid: &DataFrame,
    mode: FrequencyMode,
    reference_date: NaiveDateTime,
) -> PolarsResult<Vec<CustomerSummary>> {
    let purchases = match mode {
        FrequencyMode::LineItems => col(CUSTOMER).count(),
        // A line without an order id is an order of its own
        FrequencyMode::DistinctOrders => col(ORDER).drop_nulls().n_unique() + col(ORDER).null_count(),
    };

    let rfm_df = valid
        .clone()
        .lazy()
        .group_by([col(CUSTOMER)])
        .agg([
            col(DATE).max().alias(LAST_PURCHASE),
            purchases.cast(DataType::UInt32).alias(FREQUENCY),
            col(REVENUE).sum().alias(MONETARY),
        ])
        .sort([CUSTOMER], SortMultipleOptions::default())
        .collect()?;

    let ids = rfm_df.column(CUSTOMER)?.str()?;
    let last = rfm_df.column(LAST_PURCHASE)?.i64()?;
    let frequency = rfm_df.column(FREQUENCY)?.u32()?;
    let monetary = rfm_df.column(MONETARY)?.f64()?;

    let customers = ids
        .into_no_null_iter()
        .zip(last.into_no_null_iter())
        .zip(frequency.into_no_null_iter())
        .zip(monetary.into_no_null_iter())
        .filter_map(|(((id, last_millis), frequency), monetary)| {
            let last_purchase = from_millis(last_millis)?;
            let recency = (reference_date - last_purchase).num_days();
            if recency < 0 {
                tracing::debug!(customer = id, "purchase after reference date, recency clamped to 0");
            }
            Some(CustomerSummary {
                customer_id: id.to_string(),
                recency: recency.max(0),
                frequency,
                monetary,
                last_purchase,
            })
        })
        .collect();

    Ok(customers)
}

fn product_summaries(valid: &DataFrame) -> PolarsResult<Vec<ProductSummary>> {
    let product_df = valid
        .clone()
        .lazy()
        .group_by([col(PRODUCT)])
        .agg([
            col(REVENUE).sum().alias(REVENUE),
            col(QUANTITY).fill_null(lit(0.0)).sum().alias(UNITS_SOLD),
            col(PRODUCT).count().cast(DataType::UInt32).alias(SALES),
        ])
        .sort([PRODUCT], SortMultipleOptions::default())
        .collect()?;

    let products = product_df
        .column(PRODUCT)?
        .str()?
        .into_no_null_iter()
        .zip(product_df.column(REVENUE)?.f64()?.into_no_null_iter())
        .zip(product_df.column(UNITS_SOLD)?.f64()?.into_no_null_iter())
        .zip(product_df.column(SALES)?.u32()?.into_no_null_iter())
        .map(|(((id, revenue), units_sold), sales)| ProductSummary {
            product_id: id.to_string(),
            revenue,
            units_sold,
            sales,
        })
        .collect();

    Ok(products)
}
