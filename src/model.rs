// Core structs shared by the analysis engines, plus per-subsystem errors.
use chrono::NaiveDate;
use thiserror::Error;

/// One raw daily observation as delivered by the cache store. The date is
/// kept as text until `SeriesPreparer` parses and indexes it.
#[derive(Debug, Clone, Default)]
pub struct RawBar {
    pub date: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
    pub amount: Option<f64>,
}

/// One instrument's raw price table, exactly as loaded.
#[derive(Debug, Clone)]
pub struct RawSeries {
    pub name: String,
    pub bars: Vec<RawBar>,
}

/// A date-indexed series: dates strictly ascending and unique, numeric
/// columns forward-filled (a leading gap stays `None`).
#[derive(Debug, Clone)]
pub struct PreparedSeries {
    pub name: String,
    pub dates: Vec<NaiveDate>,
    pub open: Vec<Option<f64>>,
    pub high: Vec<Option<f64>>,
    pub low: Vec<Option<f64>>,
    pub close: Vec<Option<f64>>,
    pub volume: Vec<Option<f64>>,
    pub amount: Vec<Option<f64>>,
}

impl PreparedSeries {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn has_volume(&self) -> bool {
        self.volume.iter().any(|v| v.is_some())
    }
}

/// Simple returns aligned 1:1 with the source series index.
/// The first value is 0.0 by convention, never undefined.
#[derive(Debug, Clone)]
pub struct ReturnSeries {
    pub name: String,
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl ReturnSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// Symmetric pairwise correlation table. A `None` cell marks a pair whose
/// coefficient is undefined (zero variance on the overlap); such pairs are
/// omitted from reports rather than shown as a spurious number.
#[derive(Debug, Clone)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    cells: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    /// Unit diagonal, everything else undefined until set.
    pub fn identity(names: Vec<String>) -> Self {
        let n = names.len();
        let mut cells = vec![vec![None; n]; n];
        for (i, row) in cells.iter_mut().enumerate() {
            row[i] = Some(1.0);
        }
        Self { names, cells }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.cells[i][j]
    }

    /// Sets both `(i, j)` and `(j, i)`, so the matrix stays symmetric by
    /// construction.
    pub fn set(&mut self, i: usize, j: usize, value: Option<f64>) {
        self.cells[i][j] = value;
        self.cells[j][i] = value;
    }
}

/// One strongly correlated instrument pair, as reported by
/// `classify_strong_pairs`.
#[derive(Debug, Clone, PartialEq)]
pub struct StrongPair {
    pub a: String,
    pub b: String,
    pub coefficient: f64,
}

/// Instrument → cluster label mapping for one fixed k.
#[derive(Debug, Clone)]
pub struct ClusterAssignment {
    pub instruments: Vec<String>,
    pub labels: Vec<usize>,
}

impl ClusterAssignment {
    /// Instruments grouped by label, index = label value.
    pub fn groups(&self, k: usize) -> Vec<Vec<&str>> {
        let mut groups = vec![Vec::new(); k];
        for (name, &label) in self.instruments.iter().zip(&self.labels) {
            groups[label].push(name.as_str());
        }
        groups
    }
}

/// Elbow/silhouette sweep record for one candidate cluster count.
#[derive(Debug, Clone, Copy)]
pub struct SweepPoint {
    pub k: usize,
    pub inertia: f64,
    pub silhouette: f64,
}

/// A time-indexed table of windowed statistics: one column per instrument or
/// instrument pair, `None` where the trailing window is not yet full.
#[derive(Debug, Clone)]
pub struct RollingResult {
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<String>,
    /// Column-major: `values[col][row]`, each column as long as `dates`.
    pub values: Vec<Vec<Option<f64>>>,
}

impl RollingResult {
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(&self.values[idx])
    }

    /// Latest defined value of a column, with its date.
    pub fn last_defined(&self, col: usize) -> Option<(NaiveDate, f64)> {
        self.values[col]
            .iter()
            .zip(&self.dates)
            .rev()
            .find_map(|(v, d)| v.map(|v| (*d, v)))
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("missing required field: {0}")]
    Schema(String),
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    #[error("degenerate input: {0}")]
    DegenerateInput(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("no cached series for {0}")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}
