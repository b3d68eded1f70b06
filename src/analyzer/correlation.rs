// Static pairwise correlation across return series, plus strong-pair
// classification.
use crate::analyzer::stats::pearson;
use crate::model::{AnalysisError, CorrelationMatrix, ReturnSeries, StrongPair};

pub const DEFAULT_STRONG_THRESHOLD: f64 = 0.5;

pub struct CorrelationEngine;

impl CorrelationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Pairwise Pearson correlation matrix. Alignment is pairwise-complete:
    /// each coefficient is computed over the intersection of the two series'
    /// dates, so a gap in one series never discards data for unrelated
    /// pairs. The diagonal is exactly 1.0 and the matrix is symmetric by
    /// construction. A pair with zero variance on its overlap stays
    /// undefined (`None`).
    pub fn correlation(
        &self,
        series: &[ReturnSeries],
    ) -> Result<CorrelationMatrix, AnalysisError> {
        if series.is_empty() {
            return Err(AnalysisError::InsufficientData(
                "no return series to correlate".into(),
            ));
        }

        let names = series.iter().map(|s| s.name.clone()).collect();
        let mut matrix = CorrelationMatrix::identity(names);

        for i in 0..series.len() {
            for j in (i + 1)..series.len() {
                let (x, y) = align_pair(&series[i], &series[j]);
                matrix.set(i, j, pearson(&x, &y));
            }
        }

        Ok(matrix)
    }

    /// Pairs with `|r| > threshold`, upper triangle only (no self-pairs, no
    /// symmetric duplicates), sorted by descending absolute coefficient.
    /// The sort is stable, so ties keep the original row/column order.
    pub fn classify_strong_pairs(
        &self,
        matrix: &CorrelationMatrix,
        threshold: f64,
    ) -> Vec<StrongPair> {
        let mut pairs = Vec::new();
        for i in 0..matrix.len() {
            for j in (i + 1)..matrix.len() {
                if let Some(r) = matrix.get(i, j) {
                    if r.abs() > threshold {
                        pairs.push(StrongPair {
                            a: matrix.names[i].clone(),
                            b: matrix.names[j].clone(),
                            coefficient: r,
                        });
                    }
                }
            }
        }
        pairs.sort_by(|a, b| {
            b.coefficient
                .abs()
                .partial_cmp(&a.coefficient.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        pairs
    }
}

/// Values of both series restricted to their shared dates. Both date
/// vectors are ascending, so a single merge pass suffices.
fn align_pair(a: &ReturnSeries, b: &ReturnSeries) -> (Vec<f64>, Vec<f64>) {
    let mut x = Vec::new();
    let mut y = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.dates.len() && j < b.dates.len() {
        match a.dates[i].cmp(&b.dates[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                x.push(a.values[i]);
                y.push(b.values[j]);
                i += 1;
                j += 1;
            }
        }
    }
    (x, y)
}
