//! Data loading and column normalization using Polars

use std::collections::HashMap;
use std::path::Path;

use polars::prelude::*;
use serde::Deserialize;

/// One row of the input table, untouched apart from trimming.
///
/// Blank cells are `None`. Validation happens during aggregation so that a
/// bad row is tallied instead of aborting the load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub customer: Option<String>,
    pub product: Option<String>,
    pub date: Option<String>,
    pub quantity: Option<String>,
    pub unit_price: Option<String>,
    pub revenue: Option<String>,
    pub order: Option<String>,
}

impl RawRecord {
    /// Build a record from quantity and unit price.
    pub fn new(customer: &str, product: &str, date: &str, quantity: f64, unit_price: f64) -> Self {
        Self {
            customer: Some(customer.to_string()),
            product: Some(product.to_string()),
            date: Some(date.to_string()),
            quantity: Some(quantity.to_string()),
            unit_price: Some(unit_price.to_string()),
            revenue: None,
            order: None,
        }
    }

    /// Attach an order id.
    pub fn with_order(mut self, order: &str) -> Self {
        self.order = Some(order.to_string());
        self
    }

    /// Attach a precomputed line revenue.
    pub fn with_revenue(mut self, revenue: f64) -> Self {
        self.revenue = Some(revenue.to_string());
        self
    }
}

/// Normalized names of the input columns.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub customer: String,
    pub product: String,
    pub date: String,
    pub quantity: String,
    pub unit_price: String,
    /// Precomputed line revenue; used instead of quantity x price when present.
    pub revenue: Option<String>,
    /// Order id, needed only when counting distinct orders.
    pub order: Option<String>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            customer: "customer".to_string(),
            product: "product".to_string(),
            date: "sale_date".to_string(),
            quantity: "amount".to_string(),
            unit_price: "price".to_string(),
            revenue: Some("total_sale".to_string()),
            order: Some("sale_id".to_string()),
        }
    }
}

/// Lower-case a header and collapse whitespace runs into underscores.
pub fn normalize_column_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Row-level data quality of the raw input table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataQuality {
    pub rows: usize,
    /// Rows identical to an earlier row in every column.
    pub duplicate_rows: usize,
    /// Missing or whitespace-only cells per column, in file order.
    pub blank_cells: Vec<(String, usize)>,
}

impl DataQuality {
    pub fn from_frame(df: &DataFrame) -> crate::Result<Self> {
        let unique_rows = df
            .clone()
            .lazy()
            .unique_stable(None, UniqueKeepStrategy::First)
            .collect()?
            .height();

        let mut blank_cells = Vec::with_capacity(df.width());
        for series in df.get_columns() {
            let text = series.cast(&DataType::String)?;
            let blanks = text
                .str()?
                .into_iter()
                .filter(|cell| cell.map_or(true, |s| s.trim().is_empty()))
                .count();
            blank_cells.push((series.name().to_string(), blanks));
        }

        Ok(Self {
            rows: df.height(),
            duplicate_rows: df.height() - unique_rows,
            blank_cells,
        })
    }

    pub fn total_blank_cells(&self) -> usize {
        self.blank_cells.iter().map(|(_, count)| count).sum()
    }
}

/// Records of one input file with its quality counts.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub records: Vec<RawRecord>,
    pub quality: DataQuality,
}

/// Load a CSV file as records and measure its data quality.
///
/// # Arguments
/// * `file_path` - Path to the CSV file
/// * `columns` - Normalized names of the columns to read
///
/// # Returns
/// * One record per data row, in file order, and the file's quality counts
pub fn load_dataset(file_path: impl AsRef<Path>, columns: &ColumnMap) -> crate::Result<Dataset> {
    let file_path = file_path.as_ref();

    // Read everything as text; parsing is the aggregator's job
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(file_path.to_path_buf()))?
        .finish()
        .map_err(|e| anyhow::anyhow!("Failed to read '{}': {}", file_path.display(), e))?;

    let quality = DataQuality::from_frame(&df)?;
    if quality.duplicate_rows > 0 {
        tracing::info!(duplicates = quality.duplicate_rows, "duplicate rows in input");
    }

    Ok(Dataset {
        records: records_from_frame(&df, columns)?,
        quality,
    })
}

/// Load every row of a CSV file as a [`RawRecord`].
pub fn load_records(file_path: impl AsRef<Path>, columns: &ColumnMap) -> crate::Result<Vec<RawRecord>> {
    Ok(load_dataset(file_path, columns)?.records)
}

/// Convert a text-typed DataFrame into records, matching headers by their
/// normalized form.
pub fn records_from_frame(df: &DataFrame, columns: &ColumnMap) -> crate::Result<Vec<RawRecord>> {
    let headers: HashMap<String, String> = df
        .get_column_names()
        .iter()
        .map(|name| (normalize_column_name(name), name.to_string()))
        .collect();

    let lookup = |wanted: &str| headers.get(&normalize_column_name(wanted)).cloned();

    let customer = lookup(columns.customer.as_str())
        .ok_or_else(|| anyhow::anyhow!("Missing customer column '{}'", columns.customer))?;
    let product = lookup(columns.product.as_str())
        .ok_or_else(|| anyhow::anyhow!("Missing product column '{}'", columns.product))?;
    let date = lookup(columns.date.as_str())
        .ok_or_else(|| anyhow::anyhow!("Missing date column '{}'", columns.date))?;
    let quantity = lookup(columns.quantity.as_str());
    let unit_price = lookup(columns.unit_price.as_str());
    let revenue = columns.revenue.as_deref().and_then(lookup);
    let order = columns.order.as_deref().and_then(lookup);

    if revenue.is_none() && (quantity.is_none() || unit_price.is_none()) {
        anyhow::bail!(
            "Input needs either a revenue column or both '{}' and '{}' columns",
            columns.quantity,
            columns.unit_price
        );
    }

    let height = df.height();
    let customer = text_column(df, Some(&customer), height)?;
    let product = text_column(df, Some(&product), height)?;
    let date = text_column(df, Some(&date), height)?;
    let quantity = text_column(df, quantity.as_deref(), height)?;
    let unit_price = text_column(df, unit_price.as_deref(), height)?;
    let revenue = text_column(df, revenue.as_deref(), height)?;
    let order = text_column(df, order.as_deref(), height)?;

    let records = (0..height)
        .map(|i| RawRecord {
            customer: customer[i].clone(),
            product: product[i].clone(),
            date: date[i].clone(),
            quantity: quantity[i].clone(),
            unit_price: unit_price[i].clone(),
            revenue: revenue[i].clone(),
            order: order[i].clone(),
        })
        .collect();

    Ok(records)
}

/// Trimmed, non-blank cell values of a column; all `None` when absent.
fn text_column(df: &DataFrame, name: Option<&str>, height: usize) -> crate::Result<Vec<Option<String>>> {
    let Some(name) = name else {
        return Ok(vec![None; height]);
    };

    let series = df.column(name)?.cast(&DataType::String)?;
    let values = series
        .str()?
        .into_iter()
        .map(|cell| {
            cell.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .collect();

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Sale Date,Sale ID,Customer,Product,Amount,Price,Total Sale").unwrap();
        writeln!(file, "2024-03-01,1001,Alice,Degreaser 1L,2,4.50,9.00").unwrap();
        writeln!(file, "2024-03-02,1002, Bob ,Glass Cleaner,1,3.25,").unwrap();
        writeln!(file, "2024-03-05,1003,,Floor Soap,3,2.00,6.00").unwrap();
        file
    }

    #[test]
    fn test_normalize_column_name() {
        assert_eq!(normalize_column_name("Sale Date"), "sale_date");
        assert_eq!(normalize_column_name("  Total   Sale "), "total_sale");
        assert_eq!(normalize_column_name("customer_id"), "customer_id");
    }

    #[test]
    fn test_load_records() {
        let test_file = create_test_csv();
        let records = load_records(test_file.path(), &ColumnMap::default()).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].customer.as_deref(), Some("Alice"));
        assert_eq!(records[0].revenue.as_deref(), Some("9.00"));
        assert_eq!(records[0].order.as_deref(), Some("1001"));
        // Cells are trimmed and blanks become None
        assert_eq!(records[1].customer.as_deref(), Some("Bob"));
        assert_eq!(records[1].revenue, None);
        assert_eq!(records[2].customer, None);
    }

    #[test]
    fn test_data_quality_counts() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "customer,product,sale_date,total_sale").unwrap();
        writeln!(file, "Alice,Soap,2024-03-01,9.00").unwrap();
        writeln!(file, "Alice,Soap,2024-03-01,9.00").unwrap();
        writeln!(file, ",Soap,2024-03-02,").unwrap();
        writeln!(file, "Bob, ,2024-03-03,4.00").unwrap();

        let dataset = load_dataset(file.path(), &ColumnMap::default()).unwrap();
        let quality = &dataset.quality;

        assert_eq!(dataset.records.len(), 4);
        assert_eq!(quality.rows, 4);
        assert_eq!(quality.duplicate_rows, 1);
        assert_eq!(
            quality.blank_cells,
            vec![
                ("customer".to_string(), 1),
                ("product".to_string(), 1),
                ("sale_date".to_string(), 0),
                ("total_sale".to_string(), 1),
            ]
        );
        assert_eq!(quality.total_blank_cells(), 3);
    }

    #[test]
    fn test_missing_required_column() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Sale Date,Product,Total Sale").unwrap();
        writeln!(file, "2024-03-01,Degreaser 1L,9.00").unwrap();

        let result = load_records(file.path(), &ColumnMap::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_revenue_or_quantity_and_price_required() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "customer,product,sale_date,amount").unwrap();
        writeln!(file, "Alice,Degreaser 1L,2024-03-01,2").unwrap();

        let result = load_records(file.path(), &ColumnMap::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_custom_column_names() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "InvoiceNo,StockCode,Quantity,InvoiceDate,UnitPrice,CustomerID").unwrap();
        writeln!(file, "536365,85123A,6,2010-12-01T08:26:00,2.55,17850").unwrap();

        let columns = ColumnMap {
            customer: "CustomerID".to_string(),
            product: "StockCode".to_string(),
            date: "InvoiceDate".to_string(),
            quantity: "Quantity".to_string(),
            unit_price: "UnitPrice".to_string(),
            revenue: None,
            order: Some("InvoiceNo".to_string()),
        };
        let records = load_records(file.path(), &columns).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].customer.as_deref(), Some("17850"));
        assert_eq!(records[0].quantity.as_deref(), Some("6"));
        assert_eq!(records[0].unit_price.as_deref(), Some("2.55"));
        assert_eq!(records[0].order.as_deref(), Some("536365"));
    }
}
