//! Visualization functions using Plotters: sales trend, top customers and
//! products, segments and Pareto curve

use std::path::{Path, PathBuf};

use plotters::prelude::*;

use crate::abc::AbcClass;
use crate::pipeline::AnalysisReport;
use crate::report::customers_by_value;

/// Bars in the top customer and top product charts
pub const TOP_N: usize = 10;

/// Color palette for segment bars, cycled when there are more segments
const SEGMENT_COLORS: [RGBColor; 6] = [
    RGBColor(31, 119, 180),
    RGBColor(44, 160, 44),
    RGBColor(255, 127, 14),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(127, 127, 127),
];

fn class_color(class: AbcClass) -> RGBColor {
    match class {
        AbcClass::A => RGBColor(44, 160, 44),
        AbcClass::B => RGBColor(255, 127, 14),
        AbcClass::C => RGBColor(214, 39, 40),
    }
}

/// Line chart of revenue per month
pub fn create_monthly_trend_chart(report: &AnalysisReport, output_path: &Path) -> crate::Result<()> {
    let months = &report.overview.monthly_sales;
    let max_revenue = months.iter().map(|(_, r)| *r).fold(0.0, f64::max).max(1.0);
    let n = months.len().max(1);

    let root = SVGBackend::new(output_path, (900, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Monthly Sales Trend", ("sans-serif", 28))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(0f64..(n as f64 - 1.0).max(1.0), 0f64..(max_revenue * 1.1))?;

    chart
        .configure_mesh()
        .x_desc("Month")
        .y_desc("Sales ($)")
        .x_labels(n.min(12))
        .x_label_formatter(&|x| {
            let idx = x.round() as usize;
            months.get(idx).map(|(m, _)| m.clone()).unwrap_or_default()
        })
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    let points: Vec<(f64, f64)> = months.iter().enumerate().map(|(i, (_, r))| (i as f64, *r)).collect();
    chart.draw_series(LineSeries::new(points.clone(), BLUE.stroke_width(2)))?;
    chart.draw_series(points.into_iter().map(|p| Circle::new(p, 4, BLUE.filled())))?;

    root.present()?;
    Ok(())
}

/// Horizontal bar chart of labeled values, the first bar on top
fn create_ranking_chart(caption: &str, x_desc: &str, bars: &[(String, f64)], output_path: &Path) -> crate::Result<()> {
    let max_value = bars.iter().map(|(_, v)| *v).fold(0.0, f64::max).max(1.0);
    let n = bars.len().max(1);

    let root = SVGBackend::new(output_path, (900, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 28))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(180)
        .build_cartesian_2d(0f64..(max_value * 1.1), -0.5f64..(n as f64 - 0.5))?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n)
        .y_label_formatter(&|y| {
            let idx = y.round();
            if idx < 0.0 || idx as usize >= n {
                return String::new();
            }
            bars.get(n - 1 - idx as usize)
                .map(|(label, _)| label.clone())
                .unwrap_or_default()
        })
        .x_desc(x_desc)
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (i, (_, value)) in bars.iter().enumerate() {
        let y = (n - 1 - i) as f64;
        chart.draw_series(std::iter::once(Rectangle::new(
            [(0.0, y - 0.35), (*value, y + 0.35)],
            SEGMENT_COLORS[0].filled(),
        )))?;
    }

    root.present()?;
    Ok(())
}

/// Top customers by monetary value
pub fn create_top_customers_chart(report: &AnalysisReport, output_path: &Path) -> crate::Result<()> {
    let bars: Vec<(String, f64)> = customers_by_value(report)
        .into_iter()
        .take(TOP_N)
        .map(|c| (c.summary.customer_id.clone(), c.summary.monetary))
        .collect();
    create_ranking_chart("Top 10 Customers by Revenue", "Revenue ($)", &bars, output_path)
}

/// Top products by revenue
pub fn create_top_products_chart(report: &AnalysisReport, output_path: &Path) -> crate::Result<()> {
    let bars: Vec<(String, f64)> = report
        .abc
        .products
        .iter()
        .take(TOP_N)
        .map(|p| (p.summary.product_id.clone(), p.summary.revenue))
        .collect();
    create_ranking_chart("Top 10 Products by Revenue", "Revenue ($)", &bars, output_path)
}

/// Bar chart of customers per RFM segment
pub fn create_segment_chart(report: &AnalysisReport, output_path: &Path) -> crate::Result<()> {
    let segments = &report.rfm.segments;
    let max_count = segments.iter().map(|s| s.customers).max().unwrap_or(0).max(1) as f64;
    let n = segments.len().max(1);

    let root = SVGBackend::new(output_path, (800, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Customer Segmentation (RFM)", ("sans-serif", 28))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), 0f64..(max_count * 1.1))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&|x| {
            let idx = x.round();
            if idx < 0.0 {
                return String::new();
            }
            segments
                .get(idx as usize)
                .map(|s| s.segment.clone())
                .unwrap_or_default()
        })
        .y_desc("Customers")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (i, stats) in segments.iter().enumerate() {
        let color = SEGMENT_COLORS[i % SEGMENT_COLORS.len()];
        let x = i as f64;
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x - 0.35, 0.0), (x + 0.35, stats.customers as f64)],
            color.filled(),
        )))?;
    }

    root.present()?;
    Ok(())
}

/// Pareto chart: revenue bars colored by class with the cumulative share
/// curve and the class A threshold on a percentage scale
pub fn create_pareto_chart(report: &AnalysisReport, a_threshold: f64, output_path: &Path) -> crate::Result<()> {
    let products = &report.abc.products;
    let max_revenue = products.iter().map(|p| p.summary.revenue).fold(0.0, f64::max).max(1.0);
    let n = products.len().max(1) as f64;

    let root = SVGBackend::new(output_path, (900, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Pareto Analysis - Products", ("sans-serif", 28))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .right_y_label_area_size(60)
        .build_cartesian_2d(0f64..n, 0f64..(max_revenue * 1.1))?
        .set_secondary_coord(0f64..n, 0f64..105f64);

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Product rank")
        .y_desc("Revenue ($)")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart
        .configure_secondary_axes()
        .y_desc("Cumulative share (%)")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (i, product) in products.iter().enumerate() {
        let x = i as f64;
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x + 0.1, 0.0), (x + 0.9, product.summary.revenue)],
            class_color(product.class).filled(),
        )))?;
    }

    let curve: Vec<(f64, f64)> = products
        .iter()
        .enumerate()
        .map(|(i, p)| (i as f64 + 0.5, p.cumulative_share * 100.0))
        .collect();
    chart
        .draw_secondary_series(LineSeries::new(curve, RED.stroke_width(2)))?
        .label("Cumulative share")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

    let threshold = a_threshold * 100.0;
    chart
        .draw_secondary_series(LineSeries::new(vec![(0.0, threshold), (n, threshold)], BLACK.stroke_width(1)))?
        .label(format!("{:.0}% threshold", threshold))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .position(SeriesLabelPosition::LowerRight)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Write every chart into `output_dir` and return the paths written
pub fn generate_charts(report: &AnalysisReport, a_threshold: f64, output_dir: &Path) -> crate::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;

    let trend = output_dir.join("1_monthly_sales_trend.svg");
    let top_customers = output_dir.join("2_top_customers.svg");
    let segments = output_dir.join("3_rfm_segments.svg");
    let top_products = output_dir.join("4_top_products.svg");
    let pareto = output_dir.join("5_pareto_products.svg");

    create_monthly_trend_chart(report, &trend)?;
    create_top_customers_chart(report, &top_customers)?;
    create_segment_chart(report, &segments)?;
    create_top_products_chart(report, &top_products)?;
    create_pareto_chart(report, a_threshold, &pareto)?;

    tracing::info!(dir = %output_dir.display(), "charts written");
    Ok(vec![trend, top_customers, segments, top_products, pareto])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::data::RawRecord;
    use crate::pipeline::run_pipeline;
    use tempfile::tempdir;

    fn create_test_report() -> AnalysisReport {
        let records = vec![
            RawRecord::new("alice", "soap", "2024-01-15", 2.0, 5.0),
            RawRecord::new("bob", "wax", "2024-02-02", 1.0, 40.0),
            RawRecord::new("bob", "soap", "2024-03-03", 1.0, 5.0),
            RawRecord::new("carol", "bleach", "2024-03-10", 3.0, 3.0),
            RawRecord::new("dave", "polish", "2024-03-11", 1.0, 12.0),
        ];
        run_pipeline(&records, &PipelineConfig::default()).unwrap()
    }

    #[test]
    fn test_create_pareto_chart() {
        let report = create_test_report();
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("pareto.svg");

        let result = create_pareto_chart(&report, 0.8, &output_path);
        assert!(result.is_ok());
        assert!(output_path.exists());
    }

    #[test]
    fn test_generate_charts() {
        let report = create_test_report();
        let temp_dir = tempdir().unwrap();

        let paths = generate_charts(&report, 0.8, temp_dir.path()).unwrap();
        assert_eq!(paths.len(), 5);
        assert!(paths.iter().all(|p| p.exists()));
        assert!(temp_dir.path().join("2_top_customers.svg").exists());
        assert!(temp_dir.path().join("4_top_products.svg").exists());
    }

    #[test]
    fn test_top_customers_chart_labels_by_value() {
        let report = create_test_report();
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("top_customers.svg");

        create_top_customers_chart(&report, &output_path).unwrap();
        let svg = std::fs::read_to_string(&output_path).unwrap();
        for customer in ["alice", "bob", "carol", "dave"] {
            assert!(svg.contains(customer), "{} missing from chart", customer);
        }
    }

    #[test]
    fn test_top_products_chart_keeps_top_ten() {
        let records: Vec<RawRecord> = (1..=12)
            .map(|i| RawRecord::new("alice", &format!("item{:02}", i), "2024-01-15", 1.0, i as f64))
            .collect();
        let report = run_pipeline(&records, &PipelineConfig::default()).unwrap();
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("top_products.svg");

        create_top_products_chart(&report, &output_path).unwrap();
        let svg = std::fs::read_to_string(&output_path).unwrap();
        assert!(svg.contains("item12"));
        assert!(svg.contains("item03"));
        assert!(!svg.contains("item02"));
        assert!(!svg.contains("item01"));
    }

    #[test]
    fn test_charts_with_empty_report() {
        let report = run_pipeline(&[], &PipelineConfig::default()).unwrap();
        let temp_dir = tempdir().unwrap();

        let result = generate_charts(&report, 0.8, temp_dir.path());
        assert!(result.is_ok());
    }
}
