// Simple return series derived from a prepared price table.
use crate::model::{AnalysisError, PreparedSeries, ReturnSeries};

pub struct ReturnCalculator;

impl ReturnCalculator {
    pub fn new() -> Self {
        Self
    }

    /// `r[t] = close[t] / close[t-1] - 1`, with `r[0] = 0.0` by convention:
    /// every downstream consumer assumes a fully populated series of the
    /// same length as its source. A still-undefined close (leading gap)
    /// contributes 0.0, the same result the fill-zero convention gives the
    /// first row.
    pub fn returns(&self, series: &PreparedSeries) -> Result<ReturnSeries, AnalysisError> {
        if series.len() < 2 {
            return Err(AnalysisError::InsufficientData(format!(
                "{}: need at least 2 observations, got {}",
                series.name,
                series.len()
            )));
        }

        let mut values = Vec::with_capacity(series.len());
        values.push(0.0);
        for t in 1..series.len() {
            let value = match (series.close[t - 1], series.close[t]) {
                (Some(prev), Some(cur)) if prev != 0.0 => cur / prev - 1.0,
                _ => 0.0,
            };
            values.push(value);
        }

        Ok(ReturnSeries {
            name: series.name.clone(),
            dates: series.dates.clone(),
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::preparer::SeriesPreparer;
    use crate::model::{RawBar, RawSeries};

    fn prepared(name: &str, closes: &[f64]) -> PreparedSeries {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| RawBar {
                date: format!("202401{:02}", i + 1),
                close: Some(c),
                ..RawBar::default()
            })
            .collect();
        SeriesPreparer::new()
            .prepare(&RawSeries {
                name: name.into(),
                bars,
            })
            .unwrap()
    }

    #[test]
    fn constant_close_yields_all_zeros() {
        let series = prepared("flat", &[10.0, 10.0, 10.0, 10.0]);
        let returns = ReturnCalculator::new().returns(&series).unwrap();
        assert_eq!(returns.values, vec![0.0; 4]);
    }

    #[test]
    fn first_return_is_zero_and_length_matches() {
        let series = prepared("a", &[100.0, 101.0, 102.0]);
        let returns = ReturnCalculator::new().returns(&series).unwrap();
        assert_eq!(returns.len(), series.len());
        assert_eq!(returns.values[0], 0.0);
        assert!((returns.values[1] - 0.01).abs() < 1e-12);
        assert!((returns.values[2] - (102.0 / 101.0 - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn fails_below_two_observations() {
        let series = prepared("short", &[100.0]);
        assert!(matches!(
            ReturnCalculator::new().returns(&series),
            Err(AnalysisError::InsufficientData(_))
        ));
    }
}
