// Normalizes one raw price table into a date-indexed, gap-filled series.
// Every analysis engine works on the output of this step.
use crate::model::{AnalysisError, PreparedSeries, RawSeries};
use chrono::NaiveDate;

pub struct SeriesPreparer;

impl SeriesPreparer {
    pub fn new() -> Self {
        Self
    }

    /// Builds a `PreparedSeries`: dates parsed and strictly ascending with
    /// duplicates resolved last-wins, numeric gaps forward-filled in date
    /// order. The input is never mutated.
    pub fn prepare(&self, raw: &RawSeries) -> Result<PreparedSeries, AnalysisError> {
        if raw.bars.is_empty() {
            return Err(AnalysisError::Schema("date".into()));
        }
        if !raw.bars.iter().any(|b| b.close.is_some()) {
            return Err(AnalysisError::Schema("close".into()));
        }

        let mut rows: Vec<(NaiveDate, usize)> = Vec::with_capacity(raw.bars.len());
        for (idx, bar) in raw.bars.iter().enumerate() {
            let date =
                parse_trade_date(&bar.date).ok_or_else(|| AnalysisError::Schema("date".into()))?;
            rows.push((date, idx));
        }

        // Stable sort keeps input order within a date, so the last raw
        // observation for a duplicated date wins below.
        rows.sort_by_key(|(date, _)| *date);

        let mut series = PreparedSeries {
            name: raw.name.clone(),
            dates: Vec::with_capacity(rows.len()),
            open: Vec::with_capacity(rows.len()),
            high: Vec::with_capacity(rows.len()),
            low: Vec::with_capacity(rows.len()),
            close: Vec::with_capacity(rows.len()),
            volume: Vec::with_capacity(rows.len()),
            amount: Vec::with_capacity(rows.len()),
        };

        for (date, idx) in rows {
            let bar = &raw.bars[idx];
            if series.dates.last() == Some(&date) {
                let last = series.dates.len() - 1;
                series.open[last] = bar.open;
                series.high[last] = bar.high;
                series.low[last] = bar.low;
                series.close[last] = bar.close;
                series.volume[last] = bar.volume;
                series.amount[last] = bar.amount;
            } else {
                series.dates.push(date);
                series.open.push(bar.open);
                series.high.push(bar.high);
                series.low.push(bar.low);
                series.close.push(bar.close);
                series.volume.push(bar.volume);
                series.amount.push(bar.amount);
            }
        }

        forward_fill(&mut series.open);
        forward_fill(&mut series.high);
        forward_fill(&mut series.low);
        forward_fill(&mut series.close);
        forward_fill(&mut series.volume);
        forward_fill(&mut series.amount);

        Ok(series)
    }
}

/// Parses a trade date in either `YYYYMMDD` or `YYYY-MM-DD` form.
fn parse_trade_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
        .ok()
}

/// Last-known-value propagation in index order. Leading `None`s (no prior
/// value) are left as-is.
fn forward_fill(column: &mut [Option<f64>]) {
    let mut last = None;
    for cell in column.iter_mut() {
        match *cell {
            Some(v) => last = Some(v),
            None => *cell = last,
        }
    }
}
