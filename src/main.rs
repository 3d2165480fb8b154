//! SalesForge: RFM segmentation and ABC/Pareto analysis CLI
//!
//! This is the main entrypoint that orchestrates data loading, analysis,
//! export, visualization and single-customer scoring.

use anyhow::Result;
use clap::Parser;
use salesforge::{load_dataset, report, run_pipeline, viz, AnalysisReport, Args, DataQuality, Settings};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    init_logging(args.verbose);

    if args.verbose {
        println!("SalesForge - RFM Segmentation & ABC Analysis");
        println!("============================================\n");
    }

    // Configuration errors abort before any data is read
    let settings = args.settings()?;
    settings.pipeline.validate()?;

    if let Some(rfm_values) = args.parse_rfm_values()? {
        run_score_mode(&args, &settings, rfm_values)?;
    } else {
        run_full_pipeline(&args, &settings)?;
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn analyze(args: &Args, settings: &Settings) -> Result<(AnalysisReport, DataQuality)> {
    if args.verbose {
        println!("Loading data from: {}", args.input.display());
    }
    let dataset = load_dataset(&args.input, &settings.columns)?;
    let report = run_pipeline(&dataset.records, &settings.pipeline)?;
    Ok((report, dataset.quality))
}

/// Place one hypothetical customer on the boundaries fitted to the dataset
fn run_score_mode(args: &Args, settings: &Settings, rfm_values: (f64, f64, f64)) -> Result<()> {
    println!("=== Score Mode ===");
    println!(
        "Input RFM values: R={}, F={}, M={}",
        rfm_values.0, rfm_values.1, rfm_values.2
    );

    let start_time = Instant::now();
    let (report, _) = analyze(args, settings)?;

    let Some(model) = report.rfm.model.as_ref() else {
        anyhow::bail!("No valid customers in '{}' to fit scoring boundaries on", args.input.display());
    };

    let score = model.score(rfm_values.0, rfm_values.1, rfm_values.2);
    let segment = model.segment(&score);

    println!("\n✓ Scores: R={} F={} M={} ({})", score.recency, score.frequency, score.monetary, score.code());
    println!("✓ Segment: {}", segment);
    println!("  Processing time: {:.2}s", start_time.elapsed().as_secs_f64());

    if let Some(stats) = report.rfm.segments.iter().find(|s| s.segment == segment) {
        let percentage = stats.customers as f64 / report.rfm.customers.len() as f64 * 100.0;
        println!("\nSegment {} details:", segment);
        println!("  Size: {} customers ({:.1}% of total)", stats.customers, percentage);
        println!("  Monetary: ${:.2}", stats.monetary);
    }

    Ok(())
}

/// Run the full analysis and write its outputs
fn run_full_pipeline(args: &Args, settings: &Settings) -> Result<()> {
    println!("=== Sales Analysis Pipeline ===\n");

    let start_time = Instant::now();

    // Step 1: Load, aggregate, score and classify
    let (report, quality) = analyze(args, settings)?;
    println!(
        "✓ Data analyzed: {} records, {} customers, {} products",
        report.total_records,
        report.rfm.customers.len(),
        report.abc.products.len()
    );
    if args.verbose {
        println!("  Analysis time: {:.2}s", start_time.elapsed().as_secs_f64());
        if let Some(model) = &report.rfm.model {
            println!("  Recency edges: {:?}", model.recency.edges());
            println!("  Frequency edges: {:?}", model.frequency.edges());
            println!("  Monetary edges: {:?}", model.monetary.edges());
        }
    }

    // Step 2: Print summary
    println!();
    report::print_data_quality(&quality);
    println!();
    report::print_summary(&report);

    // Step 3: Export tables
    let tables = report::write_report(&report, &args.output)?;
    println!("\n✓ Tables written");
    println!("  {}", tables.rfm.display());
    println!("  {}", tables.abc.display());
    println!("  {}", tables.monthly.display());

    // Step 4: Charts
    if args.charts {
        let charts = viz::generate_charts(&report, settings.pipeline.abc.a_threshold, &args.output)?;
        println!("\n✓ Charts written");
        for path in charts {
            println!("  {}", path.display());
        }
    }

    println!("\n=== Pipeline Complete ===");
    println!("Total processing time: {:.2}s", start_time.elapsed().as_secs_f64());

    Ok(())
}
