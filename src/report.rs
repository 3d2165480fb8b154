//! Result tables: CSV export through Polars and console summaries

use std::cmp::Ordering;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::Context;
use polars::prelude::*;

use crate::data::DataQuality;
use crate::pipeline::AnalysisReport;
use crate::rfm::ScoredCustomer;

pub const RFM_FILE: &str = "rfm_analysis.csv";
pub const ABC_FILE: &str = "abc_analysis.csv";
pub const MONTHLY_FILE: &str = "monthly_sales.csv";

/// Decimal places written for floating point columns.
const FLOAT_PRECISION: usize = 4;

/// Paths written by [`write_report`].
#[derive(Debug, Clone)]
pub struct WrittenTables {
    pub rfm: PathBuf,
    pub abc: PathBuf,
    pub monthly: PathBuf,
}

/// Customers ordered for export: monetary descending, then customer id.
pub fn customers_by_value(report: &AnalysisReport) -> Vec<&ScoredCustomer> {
    let mut customers: Vec<&ScoredCustomer> = report.rfm.customers.iter().collect();
    customers.sort_by(|a, b| {
        b.summary
            .monetary
            .partial_cmp(&a.summary.monetary)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.summary.customer_id.cmp(&b.summary.customer_id))
    });
    customers
}

/// Build the customer table.
pub fn rfm_frame(report: &AnalysisReport) -> crate::Result<DataFrame> {
    let customers = customers_by_value(report);

    let df = DataFrame::new(vec![
        Series::new("customer", customers.iter().map(|c| c.summary.customer_id.clone()).collect::<Vec<_>>()),
        Series::new(
            "last_purchase",
            customers
                .iter()
                .map(|c| c.summary.last_purchase.format("%Y-%m-%d %H:%M:%S").to_string())
                .collect::<Vec<_>>(),
        ),
        Series::new("recency", customers.iter().map(|c| c.summary.recency).collect::<Vec<i64>>()),
        Series::new("frequency", customers.iter().map(|c| c.summary.frequency).collect::<Vec<u32>>()),
        Series::new("monetary", customers.iter().map(|c| c.summary.monetary).collect::<Vec<f64>>()),
        Series::new("r", customers.iter().map(|c| u32::from(c.score.recency)).collect::<Vec<u32>>()),
        Series::new("f", customers.iter().map(|c| u32::from(c.score.frequency)).collect::<Vec<u32>>()),
        Series::new("m", customers.iter().map(|c| u32::from(c.score.monetary)).collect::<Vec<u32>>()),
        Series::new("rfm_code", customers.iter().map(|c| c.score.code()).collect::<Vec<_>>()),
        Series::new("segment", customers.iter().map(|c| c.segment.clone()).collect::<Vec<_>>()),
    ])?;

    Ok(df)
}

/// Build the product table, in rank order.
pub fn abc_frame(report: &AnalysisReport) -> crate::Result<DataFrame> {
    let products = &report.abc.products;

    let df = DataFrame::new(vec![
        Series::new("rank", products.iter().map(|p| p.rank as u32).collect::<Vec<u32>>()),
        Series::new("product", products.iter().map(|p| p.summary.product_id.clone()).collect::<Vec<_>>()),
        Series::new("sales", products.iter().map(|p| p.summary.sales).collect::<Vec<u32>>()),
        Series::new("units_sold", products.iter().map(|p| p.summary.units_sold).collect::<Vec<f64>>()),
        Series::new("revenue", products.iter().map(|p| p.summary.revenue).collect::<Vec<f64>>()),
        Series::new("revenue_share", products.iter().map(|p| p.revenue_share).collect::<Vec<f64>>()),
        Series::new("cumulative_share", products.iter().map(|p| p.cumulative_share).collect::<Vec<f64>>()),
        Series::new("class", products.iter().map(|p| p.class.as_str()).collect::<Vec<&str>>()),
    ])?;

    Ok(df)
}

/// Build the monthly sales table.
pub fn monthly_frame(report: &AnalysisReport) -> crate::Result<DataFrame> {
    let months = &report.overview.monthly_sales;
    let df = DataFrame::new(vec![
        Series::new("month", months.iter().map(|(m, _)| m.clone()).collect::<Vec<_>>()),
        Series::new("revenue", months.iter().map(|(_, r)| *r).collect::<Vec<f64>>()),
    ])?;
    Ok(df)
}

/// Write the customer, product and monthly tables as CSV into `output_dir`.
///
/// Identical reports produce byte-identical files.
pub fn write_report(report: &AnalysisReport, output_dir: impl AsRef<Path>) -> crate::Result<WrittenTables> {
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory '{}'", output_dir.display()))?;

    let tables = WrittenTables {
        rfm: output_dir.join(RFM_FILE),
        abc: output_dir.join(ABC_FILE),
        monthly: output_dir.join(MONTHLY_FILE),
    };

    write_csv(&mut rfm_frame(report)?, &tables.rfm)?;
    write_csv(&mut abc_frame(report)?, &tables.abc)?;
    write_csv(&mut monthly_frame(report)?, &tables.monthly)?;

    tracing::info!(dir = %output_dir.display(), "result tables written");
    Ok(tables)
}

fn write_csv(df: &mut DataFrame, path: &Path) -> crate::Result<()> {
    let mut file = File::create(path).with_context(|| format!("Failed to create '{}'", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_float_precision(Some(FLOAT_PRECISION))
        .finish(df)?;
    Ok(())
}

/// Print row count, duplicate rows and blank cells per column of the input.
pub fn print_data_quality(quality: &DataQuality) {
    println!("=== Data Understanding ===");
    println!("Rows: {}", quality.rows);
    println!("Duplicate rows: {}", quality.duplicate_rows);
    if quality.total_blank_cells() == 0 {
        println!("Missing values: none");
    } else {
        println!("Missing values:");
        for (column, count) in &quality.blank_cells {
            println!("  {:<16} {:>6}", column, count);
        }
    }
}

/// Print KPIs, data-quality notes and the segment and class tables.
pub fn print_summary(report: &AnalysisReport) {
    let overview = &report.overview;

    println!("=== Sales Overview ===");
    println!("Total sales: ${:.2}", overview.total_sales);
    println!("Transactions: {}", overview.transactions);
    println!("Average ticket: ${:.2}", overview.average_ticket);
    println!("Unique customers: {}", overview.unique_customers);
    println!("Unique products: {}", overview.unique_products);
    if let Some(reference) = report.reference_date {
        println!("Reference date: {}", reference.format("%Y-%m-%d %H:%M"));
    }

    if report.rejections.total() > 0 {
        println!(
            "\nRejected records: {} of {}",
            report.rejections.total(),
            report.total_records
        );
        for (reason, count) in report.rejections.breakdown() {
            println!("  {:>6}  {}", count, reason);
        }
    }

    if !report.rfm.segments.is_empty() {
        let customers = report.rfm.customers.len();
        println!("\n=== RFM Segments ===");
        println!("  Segment      | Customers |  Share |     Monetary");
        println!("  -------------|-----------|--------|-------------");
        for stats in &report.rfm.segments {
            let share = stats.customers as f64 / customers as f64 * 100.0;
            println!(
                "  {:<12} | {:>9} | {:>5.1}% | {:>12.2}",
                stats.segment, stats.customers, share, stats.monetary
            );
        }
    }

    if !report.abc.products.is_empty() {
        let products = report.abc.products.len();
        println!("\n=== ABC Classes ===");
        println!("  Class | Products |  Share |      Revenue | Revenue share");
        println!("  ------|----------|--------|--------------|--------------");
        for stats in &report.abc.classes {
            let share = stats.products as f64 / products as f64 * 100.0;
            println!(
                "  {:<5} | {:>8} | {:>5.1}% | {:>12.2} | {:>12.1}%",
                stats.class,
                stats.products,
                share,
                stats.revenue,
                stats.revenue_share * 100.0
            );
        }
    }

    if !report.warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &report.warnings {
            println!("  - {}", warning);
        }
    }
}
