// Rolling-window statistics over aligned return/volume series: pairwise
// correlation, annualized volatility and volume–price correlation.
use crate::analyzer::returns::ReturnCalculator;
use crate::analyzer::stats::{pearson, sample_std};
use crate::model::{AnalysisError, PreparedSeries, ReturnSeries, RollingResult};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// Standard trading-day annualization factor for volatility.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

pub struct RollingWindowEngine;

impl RollingWindowEngine {
    pub fn new() -> Self {
        Self
    }

    /// Rolling Pearson correlation for every instrument pair, over the
    /// common (intersection) date index; a date missing from any series is
    /// dropped before windowing. One column per unordered pair, named
    /// `"A/B"`. Rows before the first full window are undefined, as are
    /// windows with zero variance on either side.
    pub fn rolling_correlation(
        &self,
        returns: &[ReturnSeries],
        window: usize,
    ) -> Result<RollingResult, AnalysisError> {
        validate_window(window)?;
        if returns.len() < 2 {
            return Err(AnalysisError::InsufficientData(
                "need at least two return series for pairwise correlation".into(),
            ));
        }

        let dates = intersect_dates(returns);
        if dates.len() < window {
            return Err(AnalysisError::InsufficientData(format!(
                "only {} shared observations for a window of {}",
                dates.len(),
                window
            )));
        }

        let aligned: Vec<Vec<f64>> = returns.iter().map(|s| restrict(s, &dates)).collect();

        let mut columns = Vec::new();
        let mut values = Vec::new();
        for i in 0..returns.len() {
            for j in (i + 1)..returns.len() {
                columns.push(format!("{}/{}", returns[i].name, returns[j].name));
                values.push(rolling_pair_corr(&aligned[i], &aligned[j], window));
            }
        }

        Ok(RollingResult {
            dates,
            columns,
            values,
        })
    }

    /// Trailing sample standard deviation of returns over `window`
    /// observations, annualized by √252. Each instrument rolls over its own
    /// observations; the result table is indexed by the union of all dates.
    /// Instruments with fewer than `window` observations are skipped.
    pub fn rolling_volatility(
        &self,
        returns: &[ReturnSeries],
        window: usize,
    ) -> Result<RollingResult, AnalysisError> {
        validate_window(window)?;

        let qualifying: Vec<&ReturnSeries> = returns
            .iter()
            .filter(|s| {
                if s.len() >= window {
                    true
                } else {
                    warn!(
                        "skipping {}: {} observations < window {}",
                        s.name,
                        s.len(),
                        window
                    );
                    false
                }
            })
            .collect();
        if qualifying.is_empty() {
            return Err(AnalysisError::InsufficientData(format!(
                "no instrument has {} observations",
                window
            )));
        }

        let dates = union_dates(qualifying.iter().map(|s| s.dates.as_slice()));
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for s in &qualifying {
            let mut column = vec![None; dates.len()];
            let annualizer = TRADING_DAYS_PER_YEAR.sqrt();
            for (offset, w) in s.values.windows(window).enumerate() {
                let t = offset + window - 1;
                let row = position(&dates, s.dates[t]);
                column[row] = sample_std(w).map(|sd| sd * annualizer);
            }
            columns.push(s.name.clone());
            values.push(column);
        }

        Ok(RollingResult {
            dates,
            columns,
            values,
        })
    }

    /// Rolling correlation between each instrument's returns and the
    /// percent-change of its traded volume. Instruments without volume data
    /// are omitted, not an error. The first volume change is undefined, so
    /// windows start one row later than pure return windows.
    pub fn rolling_volume_price_correlation(
        &self,
        series: &[PreparedSeries],
        window: usize,
    ) -> Result<RollingResult, AnalysisError> {
        validate_window(window)?;
        let calculator = ReturnCalculator::new();

        let mut included: Vec<(&PreparedSeries, ReturnSeries, Vec<Option<f64>>)> = Vec::new();
        for s in series {
            if !s.has_volume() {
                warn!("skipping {}: no volume data", s.name);
                continue;
            }
            if s.len() < window + 1 {
                warn!(
                    "skipping {}: {} observations too few for volume window {}",
                    s.name,
                    s.len(),
                    window
                );
                continue;
            }
            let returns = match calculator.returns(s) {
                Ok(r) => r,
                Err(e) => {
                    warn!("skipping {}: {}", s.name, e);
                    continue;
                }
            };
            let changes = volume_changes(&s.volume);
            included.push((s, returns, changes));
        }

        if included.is_empty() {
            return Err(AnalysisError::InsufficientData(format!(
                "no instrument has volume data covering a window of {}",
                window
            )));
        }

        let dates = union_dates(included.iter().map(|(s, _, _)| s.dates.as_slice()));
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for (s, returns, changes) in &included {
            let mut column = vec![None; dates.len()];
            for t in (window - 1)..s.len() {
                let slice = &changes[t + 1 - window..=t];
                if slice.iter().all(|c| c.is_some()) {
                    let vol: Vec<f64> = slice.iter().map(|c| c.unwrap()).collect();
                    let ret = &returns.values[t + 1 - window..=t];
                    column[position(&dates, s.dates[t])] = pearson(ret, &vol);
                }
            }
            columns.push(s.name.clone());
            values.push(column);
        }

        Ok(RollingResult {
            dates,
            columns,
            values,
        })
    }
}

fn validate_window(window: usize) -> Result<(), AnalysisError> {
    if window < 2 {
        return Err(AnalysisError::DegenerateInput(format!(
            "rolling window must cover at least 2 observations, got {}",
            window
        )));
    }
    Ok(())
}

fn rolling_pair_corr(x: &[f64], y: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut column = vec![None; x.len()];
    for (offset, wx) in x.windows(window).enumerate() {
        let t = offset + window - 1;
        column[t] = pearson(wx, &y[offset..offset + window]);
    }
    column
}

/// Percent change of volume, index-aligned with the series: undefined at the
/// first row and wherever volume (or its predecessor) is missing or zero.
fn volume_changes(volume: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut changes = vec![None; volume.len()];
    for t in 1..volume.len() {
        if let (Some(prev), Some(cur)) = (volume[t - 1], volume[t]) {
            if prev != 0.0 {
                changes[t] = Some(cur / prev - 1.0);
            }
        }
    }
    changes
}

fn intersect_dates(series: &[ReturnSeries]) -> Vec<NaiveDate> {
    let mut common: BTreeSet<NaiveDate> = series[0].dates.iter().copied().collect();
    for s in &series[1..] {
        let dates: BTreeSet<NaiveDate> = s.dates.iter().copied().collect();
        common = common.intersection(&dates).copied().collect();
    }
    common.into_iter().collect()
}

fn union_dates<'a>(series: impl Iterator<Item = &'a [NaiveDate]>) -> Vec<NaiveDate> {
    let mut all = BTreeSet::new();
    for dates in series {
        all.extend(dates.iter().copied());
    }
    all.into_iter().collect()
}

fn restrict(series: &ReturnSeries, dates: &[NaiveDate]) -> Vec<f64> {
    let by_date: HashMap<NaiveDate, f64> = series
        .dates
        .iter()
        .copied()
        .zip(series.values.iter().copied())
        .collect();
    dates.iter().map(|d| by_date[d]).collect()
}

fn position(dates: &[NaiveDate], date: NaiveDate) -> usize {
    dates.binary_search(&date).expect("date drawn from this index")
}
