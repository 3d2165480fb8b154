//! ABC / Pareto classification of products by cumulative revenue share

use std::cmp::Ordering;
use std::fmt;

use crate::aggregate::ProductSummary;
use crate::config::AbcConfig;
use crate::error::Warning;

/// Relative slack when comparing cumulative revenue against a threshold.
const SHARE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AbcClass {
    A,
    B,
    C,
}

impl AbcClass {
    pub const ALL: [AbcClass; 3] = [AbcClass::A, AbcClass::B, AbcClass::C];

    pub fn as_str(&self) -> &'static str {
        match self {
            AbcClass::A => "A",
            AbcClass::B => "B",
            AbcClass::C => "C",
        }
    }
}

impl fmt::Display for AbcClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A product summary with its Pareto position and class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedProduct {
    pub summary: ProductSummary,
    /// 1-based position by revenue, descending.
    pub rank: usize,
    /// This product's share of total revenue.
    pub revenue_share: f64,
    /// Share of total revenue up to and including this product.
    pub cumulative_share: f64,
    pub class: AbcClass,
}

/// Totals for one class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassStats {
    pub class: AbcClass,
    pub products: usize,
    pub revenue: f64,
    pub revenue_share: f64,
}

/// Output of [`classify_products`].
#[derive(Debug, Clone, PartialEq)]
pub struct AbcClassification {
    /// In rank order.
    pub products: Vec<ClassifiedProduct>,
    /// Always A, B, C in that order.
    pub classes: Vec<ClassStats>,
    pub total_revenue: f64,
    pub warnings: Vec<Warning>,
}

/// Rank products by revenue and assign ABC classes.
///
/// A product is class A while the revenue ranked before it has not yet
/// reached `a_threshold` of the total, so the product that crosses the
/// threshold is still A. Class B follows the same rule with `b_threshold`;
/// everything after is C. Equal revenues are ordered by product id.
///
/// # Arguments
/// * `products` - Per-product revenue totals
/// * `config` - Cumulative share thresholds closing classes A and B
///
/// # Returns
/// * Products in rank order with class statistics and any warnings
pub fn classify_products(products: &[ProductSummary], config: &AbcConfig) -> AbcClassification {
    let mut warnings = Vec::new();
    if products.is_empty() {
        tracing::warn!("no products to classify");
        warnings.push(Warning::NoProducts);
    }

    let mut ranked: Vec<&ProductSummary> = products.iter().collect();
    ranked.sort_by(|a, b| {
        b.revenue
            .partial_cmp(&a.revenue)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.product_id.cmp(&b.product_id))
    });

    let total_revenue: f64 = ranked.iter().map(|p| p.revenue).sum();
    let zero_revenue = !products.is_empty() && total_revenue <= 0.0;
    if zero_revenue {
        tracing::warn!(products = products.len(), "total revenue is zero; every product is class C");
        warnings.push(Warning::ZeroRevenue);
    }

    let reached = |cumulative: f64, threshold: f64| {
        cumulative >= threshold * total_revenue - SHARE_TOLERANCE * total_revenue
    };

    let mut cumulative = 0.0;
    let classified: Vec<ClassifiedProduct> = ranked
        .into_iter()
        .enumerate()
        .map(|(i, summary)| {
            let class = if zero_revenue {
                AbcClass::C
            } else if !reached(cumulative, config.a_threshold) {
                AbcClass::A
            } else if !reached(cumulative, config.b_threshold) {
                AbcClass::B
            } else {
                AbcClass::C
            };
            cumulative += summary.revenue;

            let (revenue_share, cumulative_share) = if zero_revenue {
                (0.0, 0.0)
            } else {
                (summary.revenue / total_revenue, cumulative / total_revenue)
            };

            ClassifiedProduct {
                summary: summary.clone(),
                rank: i + 1,
                revenue_share,
                cumulative_share,
                class,
            }
        })
        .collect();

    let classes = AbcClass::ALL
        .iter()
        .map(|&class| {
            let (count, revenue) = classified
                .iter()
                .filter(|p| p.class == class)
                .fold((0, 0.0), |(n, total), p| (n + 1, total + p.summary.revenue));
            ClassStats {
                class,
                products: count,
                revenue,
                revenue_share: if total_revenue > 0.0 { revenue / total_revenue } else { 0.0 },
            }
        })
        .collect();

    AbcClassification {
        products: classified,
        classes,
        total_revenue,
        warnings,
    }
}
