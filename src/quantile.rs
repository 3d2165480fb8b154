//! Equal-population quantile binning with duplicate-edge collapse

/// Quantile boundaries fitted on one metric of the current population.
///
/// `edges` are strictly increasing. With `n` edges there are `n - 1` bins,
/// except for a constant population which has a single edge and one bin.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantileBins {
    edges: Vec<f64>,
    requested: usize,
}

impl QuantileBins {
    /// Fit `bins` equal-population bins on `values`.
    ///
    /// Edges are the `i / bins` quantiles (linear interpolation between
    /// order statistics). Duplicate edges are dropped, so a metric with many
    /// tied values ends up with fewer bins than requested instead of failing.
    pub fn fit(values: &[f64], bins: usize) -> Self {
        let requested = bins.max(1);
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        sorted.sort_by(f64::total_cmp);

        if sorted.is_empty() {
            return Self {
                edges: Vec::new(),
                requested,
            };
        }

        let mut edges: Vec<f64> = Vec::with_capacity(requested + 1);
        for i in 0..=requested {
            let edge = quantile(&sorted, i as f64 / requested as f64);
            if edges.last().map_or(true, |&last| edge > last) {
                edges.push(edge);
            }
        }

        Self { edges, requested }
    }

    /// Number of bins the data actually supports (at least 1).
    pub fn bins_used(&self) -> usize {
        self.edges.len().saturating_sub(1).max(1)
    }

    /// Number of bins asked for.
    pub fn requested(&self) -> usize {
        self.requested
    }

    /// True when ties forced fewer bins than requested.
    pub fn is_collapsed(&self) -> bool {
        self.bins_used() < self.requested
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// 1-based bin of `value`: the first upper edge that is `>= value`.
    ///
    /// Values outside the fitted range clamp to the first or last bin.
    pub fn bin_of(&self, value: f64) -> usize {
        if self.edges.len() < 2 {
            return 1;
        }
        let upper = &self.edges[1..];
        let idx = upper.partition_point(|&edge| edge < value);
        (idx + 1).min(upper.len())
    }

    /// Score on the `1..=scale` axis for `value`; ascending with the value.
    pub fn score(&self, value: f64) -> u8 {
        score_of(self.bin_of(value), self.bins_used(), self.requested)
    }

    /// Score on the `1..=scale` axis for `value`; descending with the value.
    pub fn score_reversed(&self, value: f64) -> u8 {
        let used = self.bins_used();
        let reversed = used + 1 - self.bin_of(value);
        score_of(reversed, used, self.requested)
    }
}

/// Map bin `bin` of `used` onto a `1..=scale` score.
///
/// The first bin scores 1 and the last scores `scale`, with the bins in
/// between spread evenly (rounded half up). When `used == scale` this is the
/// identity. A single bin maps to the middle of the scale.
pub fn score_of(bin: usize, used: usize, scale: usize) -> u8 {
    let scale = scale.clamp(1, u8::MAX as usize);
    let used = used.max(1);
    if used == 1 {
        return ((scale + 1) / 2) as u8;
    }
    let bin = bin.clamp(1, used);
    let step = 2 * (bin - 1) * (scale - 1) + (used - 1);
    let score = 1 + step / (2 * (used - 1));
    score.clamp(1, scale) as u8
}

/// Linear-interpolated quantile of an ascending, non-empty slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_values_fill_all_bins() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let bins = QuantileBins::fit(&values, 5);

        assert_eq!(bins.bins_used(), 5);
        assert!(!bins.is_collapsed());
        let assigned: Vec<usize> = values.iter().map(|&v| bins.bin_of(v)).collect();
        assert_eq!(assigned, vec![1, 1, 2, 2, 3, 3, 4, 4, 5, 5]);
    }

    #[test]
    fn test_low_cardinality_collapses() {
        // Mostly single purchases, as is typical for frequency
        let values = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 5.0];
        let bins = QuantileBins::fit(&values, 5);

        assert!(bins.is_collapsed());
        assert_eq!(bins.edges(), &[1.0, 2.0, 5.0]);
        assert_eq!(bins.bins_used(), 2);
        assert_eq!(bins.bin_of(1.0), 1);
        assert_eq!(bins.bin_of(2.0), 1);
        assert_eq!(bins.bin_of(5.0), 2);
    }

    #[test]
    fn test_constant_population_single_bin() {
        let bins = QuantileBins::fit(&[7.0, 7.0, 7.0], 5);
        assert_eq!(bins.bins_used(), 1);
        assert_eq!(bins.bin_of(7.0), 1);
        assert_eq!(bins.score(7.0), 3);
        assert_eq!(bins.score_reversed(7.0), 3);
    }

    #[test]
    fn test_out_of_range_values_clamp() {
        let bins = QuantileBins::fit(&[10.0, 20.0, 30.0, 40.0, 50.0], 5);
        assert_eq!(bins.bin_of(-100.0), 1);
        assert_eq!(bins.bin_of(1e9), 5);
    }

    #[test]
    fn test_score_mapping_stays_on_scale() {
        for scale in 1..=10 {
            for used in 1..=scale {
                let mut previous = 0;
                for bin in 1..=used {
                    let score = score_of(bin, used, scale) as usize;
                    assert!((1..=scale).contains(&score));
                    assert!(score >= previous);
                    previous = score;
                }
            }
        }
        assert_eq!(score_of(1, 2, 5), 1);
        assert_eq!(score_of(2, 2, 5), 5);
        assert_eq!(score_of(2, 3, 5), 3);
        assert_eq!(score_of(3, 5, 5), 3);
        assert_eq!(score_of(1, 1, 5), 3);
    }

    #[test]
    fn test_reversed_score_is_non_increasing() {
        let values: Vec<f64> = vec![1.0, 3.0, 3.0, 8.0, 15.0, 40.0, 90.0, 200.0];
        let bins = QuantileBins::fit(&values, 5);
        let scores: Vec<u8> = values.iter().map(|&v| bins.score_reversed(v)).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(scores[0], 5);
        assert_eq!(*scores.last().unwrap(), 1);
    }

    #[test]
    fn test_empty_population() {
        let bins = QuantileBins::fit(&[], 5);
        assert_eq!(bins.bins_used(), 1);
        assert_eq!(bins.bin_of(3.0), 1);
    }
}
