//! Cumulative damage series and their shape normalization.
//!
//! The parser emits per-second damage as *cumulative* arrays. Per-target
//! series come nested three deep, and depending on the parser version the
//! outer two levels are either `[target][phase][time]` or
//! `[phase][target][time]`. [`SeriesShape::detect`] decides which one a
//! player's data uses, once, and everything downstream works on plain
//! [`CumulativeSeries`] values.

use serde::{Deserialize, Serialize};

/// Running total sampled once per second.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CumulativeSeries(pub Vec<f64>);

impl CumulativeSeries {
    pub fn new(values: Vec<f64>) -> Self {
        Self(
            values
                .into_iter()
                .map(|v| if v.is_finite() { v } else { 0.0 })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Final cumulative value.
    pub fn total(&self) -> f64 {
        self.0.last().copied().unwrap_or(0.0).max(0.0)
    }

    /// Per-second increments; negative steps clamp to zero.
    pub fn per_second(&self) -> Vec<f64> {
        let mut prev = 0.0;
        self.0
            .iter()
            .map(|&current| {
                let delta = (current - prev).max(0.0);
                prev = current;
                delta
            })
            .collect()
    }

    /// Element-wise sum. Shorter series hold their last value.
    pub fn sum(series: &[CumulativeSeries]) -> CumulativeSeries {
        let len = series.iter().map(CumulativeSeries::len).max().unwrap_or(0);
        let mut out = vec![0.0; len];
        for s in series {
            let mut last = 0.0;
            for (i, slot) in out.iter_mut().enumerate() {
                if let Some(&v) = s.0.get(i) {
                    last = v;
                }
                *slot += last;
            }
        }
        CumulativeSeries(out)
    }
}

/// Nesting order of a raw per-target series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesShape {
    /// No usable data.
    Empty,
    /// `[target][phase][time]`
    TargetPhaseTime,
    /// `[phase][target][time]`
    PhaseTargetTime,
}

impl SeriesShape {
    /// Decide the nesting order using the fight's target count as a hint.
    ///
    /// When the outer length matches the target count, or nothing
    /// distinguishes the two readings, the target-major form wins.
    pub fn detect(raw: &[Vec<Vec<f64>>], target_count: usize) -> Self {
        let has_data = raw
            .iter()
            .any(|outer| outer.iter().any(|inner| !inner.is_empty()));
        if !has_data {
            return SeriesShape::Empty;
        }
        if target_count > 0 && raw.len() != target_count {
            let inner_len = raw.first().map(Vec::len).unwrap_or(0);
            if inner_len == target_count {
                return SeriesShape::PhaseTargetTime;
            }
        }
        SeriesShape::TargetPhaseTime
    }

    /// Phase-0 cumulative series for every target, in target order.
    /// Targets without data yield an empty series.
    pub fn per_target(self, raw: &[Vec<Vec<f64>>]) -> Vec<CumulativeSeries> {
        match self {
            SeriesShape::Empty => Vec::new(),
            SeriesShape::TargetPhaseTime => raw
                .iter()
                .map(|target| CumulativeSeries::new(target.first().cloned().unwrap_or_default()))
                .collect(),
            SeriesShape::PhaseTargetTime => raw
                .first()
                .map(|targets| targets.iter().map(|s| CumulativeSeries::new(s.clone())).collect())
                .unwrap_or_default(),
        }
    }
}

/// Phase-0 series of a `[phase][time]` array.
pub fn phase_zero(raw: &[Vec<f64>]) -> Option<CumulativeSeries> {
    raw.first()
        .filter(|s| !s.is_empty())
        .map(|s| CumulativeSeries::new(s.clone()))
}

/// Maximum sum over any `window` consecutive values.
pub fn max_rolling_sum(values: &[f64], window: usize) -> f64 {
    if values.is_empty() || window == 0 {
        return 0.0;
    }
    let mut sum = 0.0;
    let mut best = 0.0_f64;
    for (i, v) in values.iter().enumerate() {
        sum += v;
        if i >= window {
            sum -= values[i - window];
        }
        if i + 1 >= window && sum > best {
            best = sum;
        }
    }
    // Series shorter than the window never fill it.
    best.max(0.0)
}

/// Sum `values` into consecutive buckets of `width` entries.
pub fn bucket_sums(values: &[f64], width: usize) -> Vec<f64> {
    if width == 0 {
        return Vec::new();
    }
    values.chunks(width).map(|chunk| chunk.iter().sum()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_second_clamps_negative_steps() {
        let series = CumulativeSeries::new(vec![0.0, 100.0, 250.0, 240.0, 400.0]);
        assert_eq!(series.per_second(), vec![0.0, 100.0, 150.0, 0.0, 160.0]);
        assert_eq!(series.total(), 400.0);
    }

    #[test]
    fn test_sum_holds_last_value() {
        let a = CumulativeSeries::new(vec![10.0, 20.0, 30.0]);
        let b = CumulativeSeries::new(vec![5.0]);
        assert_eq!(CumulativeSeries::sum(&[a, b]).0, vec![15.0, 25.0, 35.0]);
    }

    #[test]
    fn test_detect_target_major() {
        // two targets, one phase each
        let raw = vec![vec![vec![0.0, 10.0]], vec![vec![0.0, 5.0]]];
        let shape = SeriesShape::detect(&raw, 2);
        assert_eq!(shape, SeriesShape::TargetPhaseTime);
        let per_target = shape.per_target(&raw);
        assert_eq!(per_target.len(), 2);
        assert_eq!(per_target[1].total(), 5.0);
    }

    #[test]
    fn test_detect_phase_major() {
        // one phase, three targets
        let raw = vec![vec![vec![0.0, 1.0], vec![0.0, 2.0], vec![0.0, 3.0]]];
        let shape = SeriesShape::detect(&raw, 3);
        assert_eq!(shape, SeriesShape::PhaseTargetTime);
        let totals: Vec<f64> = shape.per_target(&raw).iter().map(|s| s.total()).collect();
        assert_eq!(totals, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_detect_without_target_hint() {
        let raw = vec![vec![vec![0.0, 100.0, 200.0]]];
        assert_eq!(SeriesShape::detect(&raw, 0), SeriesShape::TargetPhaseTime);
        assert_eq!(SeriesShape::detect(&[], 4), SeriesShape::Empty);
        assert_eq!(SeriesShape::detect(&[vec![vec![]]], 1), SeriesShape::Empty);
    }

    #[test]
    fn test_max_rolling_sum() {
        let values = vec![1.0, 5.0, 2.0, 8.0, 0.0];
        assert_eq!(max_rolling_sum(&values, 1), 8.0);
        assert_eq!(max_rolling_sum(&values, 2), 10.0);
        assert_eq!(max_rolling_sum(&values, 30), 0.0);
        assert_eq!(max_rolling_sum(&[], 5), 0.0);
    }

    #[test]
    fn test_bucket_sums() {
        let values: Vec<f64> = (1..=12).map(f64::from).collect();
        assert_eq!(bucket_sums(&values, 5), vec![15.0, 40.0, 23.0]);
    }
}
