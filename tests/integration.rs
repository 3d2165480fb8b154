//! Integration tests for SalesForge

use salesforge::report::{write_report, ABC_FILE, RFM_FILE};
use salesforge::{load_dataset, load_records, run_pipeline, AbcClass, ColumnMap, PipelineConfig, Warning};
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

/// Create a test CSV file with sample data in the source layout
fn create_test_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "Sale Date,Sale,Sale ID,Customer,Product,Amount,Price,Total Sale,Pay,Image,Month,Year,Sale Type"
    )
    .unwrap();

    // Hotel Azul - frequent, recent, high value
    writeln!(file, "2024-05-02,1,S001,Hotel Azul,Degreaser 5L,4,25.00,100.00,Cash,,5,2024,Wholesale").unwrap();
    writeln!(file, "2024-05-20,1,S002,Hotel Azul,Degreaser 5L,4,25.00,100.00,Cash,,5,2024,Wholesale").unwrap();
    writeln!(file, "2024-06-29,1,S003,Hotel Azul,Floor Soap 5L,5,20.00,100.00,Card,,6,2024,Wholesale").unwrap();

    // Cafe Norte - two mid purchases
    writeln!(file, "2024-04-11,1,S004,Cafe Norte,Glass Cleaner 1L,6,5.00,30.00,Cash,,4,2024,Retail").unwrap();
    writeln!(file, "2024-06-01,1,S005,Cafe Norte,Degreaser 5L,1,25.00,25.00,Cash,,6,2024,Retail").unwrap();

    // Single-purchase customers spread over time
    writeln!(file, "2024-06-25,1,S006,Ana Ruiz,Glass Cleaner 1L,2,5.00,10.00,Cash,,6,2024,Retail").unwrap();
    writeln!(file, "2024-03-14,1,S007,Luis Paz,Floor Soap 5L,1,20.00,20.00,Card,,3,2024,Retail").unwrap();
    writeln!(file, "2024-02-02,1,S008,Marta Gil,Hand Soap 500ml,3,3.00,9.00,Cash,,2,2024,Retail").unwrap();
    writeln!(file, "2024-01-09,1,S009,Jose Lima,Bleach 1L,2,2.50,5.00,Cash,,1,2024,Retail").unwrap();

    // Rows that must be rejected: bad date, missing customer, return
    writeln!(file, "not-a-date,1,S010,Ana Ruiz,Bleach 1L,1,2.50,2.50,Cash,,6,2024,Retail").unwrap();
    writeln!(file, "2024-06-10,1,S011,,Bleach 1L,1,2.50,2.50,Cash,,6,2024,Retail").unwrap();
    writeln!(file, "2024-06-12,1,S012,Cafe Norte,Degreaser 5L,-1,25.00,-25.00,Cash,,6,2024,Retail").unwrap();

    file
}

#[test]
fn test_end_to_end_pipeline() {
    let test_file = create_test_csv();

    let records = load_records(test_file.path(), &ColumnMap::default()).unwrap();
    assert_eq!(records.len(), 12);

    let report = run_pipeline(&records, &PipelineConfig::default()).unwrap();

    // Rejections are tallied, never fatal
    assert_eq!(report.rejections.total(), 3);
    assert_eq!(report.rejections.invalid_date, 1);
    assert_eq!(report.rejections.missing_customer, 1);
    assert_eq!(report.rejections.returns, 1);
    assert!(report
        .warnings
        .contains(&Warning::MalformedRecords { rejected: 3, total: 12 }));

    // 6 customers, 5 products
    assert_eq!(report.rfm.customers.len(), 6);
    assert_eq!(report.abc.products.len(), 5);
    assert_eq!(report.overview.total_sales, 399.0);

    // Every customer has exactly one segment and scores on the 1..=5 scale
    let segmented: usize = report.rfm.segments.iter().map(|s| s.customers).sum();
    assert_eq!(segmented, 6);
    for c in &report.rfm.customers {
        for s in [c.score.recency, c.score.frequency, c.score.monetary] {
            assert!((1..=5).contains(&s));
        }
    }

    let hotel = report
        .rfm
        .customers
        .iter()
        .find(|c| c.summary.customer_id == "Hotel Azul")
        .unwrap();
    assert_eq!(hotel.summary.recency, 1);
    assert_eq!(hotel.summary.frequency, 3);
    assert_eq!(hotel.summary.monetary, 300.0);
    assert_eq!(hotel.segment, "Champions");
}

#[test]
fn test_data_quality_of_source_layout() {
    let test_file = create_test_csv();
    let dataset = load_dataset(test_file.path(), &ColumnMap::default()).unwrap();
    let quality = &dataset.quality;

    assert_eq!(quality.rows, 12);
    assert_eq!(quality.duplicate_rows, 0);
    assert_eq!(quality.blank_cells.len(), 13);

    let blanks = |column: &str| {
        quality
            .blank_cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, count)| *count)
            .unwrap()
    };
    assert_eq!(blanks("Image"), 12);
    assert_eq!(blanks("Customer"), 1);
    assert_eq!(blanks("Sale Date"), 0);
}

#[test]
fn test_abc_classes_cover_all_products() {
    let test_file = create_test_csv();
    let records = load_records(test_file.path(), &ColumnMap::default()).unwrap();
    let report = run_pipeline(&records, &PipelineConfig::default()).unwrap();

    let counted: usize = report.abc.classes.iter().map(|c| c.products).sum();
    assert_eq!(counted, report.abc.products.len());

    // Degreaser 5L: 225 of 399 (56%), Floor Soap 5L: 120 (86% cumulative)
    let top = &report.abc.products[0];
    assert_eq!(top.summary.product_id, "Degreaser 5L");
    assert_eq!(top.class, AbcClass::A);
    assert_eq!(report.abc.products[1].summary.product_id, "Floor Soap 5L");
    assert_eq!(report.abc.products[1].class, AbcClass::A);
    assert_eq!(report.abc.products[2].class, AbcClass::B);
    assert!(report.abc.classes[0].revenue_share >= 0.80);
}

#[test]
fn test_rerun_is_byte_identical() {
    let test_file = create_test_csv();
    let records = load_records(test_file.path(), &ColumnMap::default()).unwrap();

    let first_dir = tempdir().unwrap();
    let second_dir = tempdir().unwrap();

    let first = run_pipeline(&records, &PipelineConfig::default()).unwrap();
    write_report(&first, first_dir.path()).unwrap();
    let second = run_pipeline(&records, &PipelineConfig::default()).unwrap();
    write_report(&second, second_dir.path()).unwrap();

    for name in [RFM_FILE, ABC_FILE] {
        let a = std::fs::read(first_dir.path().join(name)).unwrap();
        let b = std::fs::read(second_dir.path().join(name)).unwrap();
        assert_eq!(a, b, "{} differs between runs", name);
    }
}

#[test]
fn test_no_valid_transactions() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "customer,product,sale_date,amount,price").unwrap();
    writeln!(file, "a,p1,garbage,1,2.0").unwrap();
    writeln!(file, ",p2,2024-01-01,1,2.0").unwrap();
    writeln!(file, "c,,2024-01-01,1,2.0").unwrap();

    let records = load_records(file.path(), &ColumnMap::default()).unwrap();
    let report = run_pipeline(&records, &PipelineConfig::default()).unwrap();

    assert!(report.rfm.customers.is_empty());
    assert!(report.abc.products.is_empty());
    assert_eq!(report.rejections.total(), records.len());
    assert_eq!(report.reference_date, None);
}

#[test]
fn test_error_handling_invalid_config() {
    let test_file = create_test_csv();
    let records = load_records(test_file.path(), &ColumnMap::default()).unwrap();

    let mut config = PipelineConfig::default();
    config.rfm.bins = 0;
    assert!(run_pipeline(&records, &config).is_err());

    let mut config = PipelineConfig::default();
    config.abc.a_threshold = 0.99;
    config.abc.b_threshold = 0.95;
    assert!(run_pipeline(&records, &config).is_err());
}

#[test]
fn test_missing_file() {
    let dir = tempdir().unwrap();
    let result = load_records(dir.path().join("missing.csv"), &ColumnMap::default());
    assert!(result.is_err());
}
