// K-means clustering of per-instrument return profiles, with an
// elbow/silhouette sweep to suggest the cluster count.
use crate::model::{AnalysisError, ClusterAssignment, ReturnSeries, SweepPoint};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeSet, HashMap};

/// Fixed seed and restart count: determinism is configuration here, not
/// randomness exposed to the caller.
pub const KMEANS_SEED: u64 = 42;
pub const KMEANS_RESTARTS: usize = 10;
const MAX_ITERATIONS: usize = 300;

/// Return matrix with rows = instruments, columns = dates, plus its
/// standardized copy used for the actual clustering.
#[derive(Debug, Clone)]
pub struct ClusterData {
    pub instruments: Vec<String>,
    pub dates: Vec<NaiveDate>,
    pub raw: Vec<Vec<f64>>,
    pub scaled: Vec<Vec<f64>>,
}

#[derive(Debug, Clone)]
struct KMeansFit {
    labels: Vec<usize>,
    inertia: f64,
}

pub struct ClusteringEngine {
    seed: u64,
    restarts: usize,
    /// Column means/stds fit on the first prepared matrix and reused for
    /// every later call on this instance.
    scaler: Option<(Vec<f64>, Vec<f64>)>,
    /// Fitted models cached per k; reset only by constructing a new engine.
    models: HashMap<usize, KMeansFit>,
}

impl ClusteringEngine {
    pub fn new() -> Self {
        Self {
            seed: KMEANS_SEED,
            restarts: KMEANS_RESTARTS,
            scaler: None,
            models: HashMap::new(),
        }
    }

    /// Builds one row per instrument over the union of all dates (a missing
    /// return counts as 0.0, the fill-zero convention), then standardizes
    /// each column to zero mean / unit variance. A zero-variance column is
    /// left at scale 1.0.
    pub fn prepare(&mut self, series: &[ReturnSeries]) -> Result<ClusterData, AnalysisError> {
        if series.is_empty() {
            return Err(AnalysisError::InsufficientData(
                "no return series to cluster".into(),
            ));
        }

        let dates: Vec<NaiveDate> = series
            .iter()
            .flat_map(|s| s.dates.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut raw = Vec::with_capacity(series.len());
        for s in series {
            let by_date: HashMap<NaiveDate, f64> =
                s.dates.iter().copied().zip(s.values.iter().copied()).collect();
            raw.push(
                dates
                    .iter()
                    .map(|d| by_date.get(d).copied().unwrap_or(0.0))
                    .collect::<Vec<f64>>(),
            );
        }

        if self.scaler.is_none() {
            self.scaler = Some(fit_scaler(&raw));
        }
        let (means, stds) = self.scaler.as_ref().unwrap();
        let scaled = raw
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(c, v)| (v - means[c]) / stds[c])
                    .collect()
            })
            .collect();

        Ok(ClusterData {
            instruments: series.iter().map(|s| s.name.clone()).collect(),
            dates,
            raw,
            scaled,
        })
    }

    /// Fits k-means for every k in `[2, k_max]`, recording inertia and mean
    /// silhouette per k. Each fit lands in the per-k cache, so a later
    /// `cluster` call for the same k reuses it.
    pub fn sweep(
        &mut self,
        data: &ClusterData,
        k_max: usize,
    ) -> Result<Vec<SweepPoint>, AnalysisError> {
        if data.scaled.len() < k_max {
            return Err(AnalysisError::DegenerateInput(format!(
                "{} instruments cannot support a sweep up to k={}",
                data.scaled.len(),
                k_max
            )));
        }

        let mut points = Vec::new();
        for k in 2..=k_max {
            tracing::info!("fitting k-means for k={}", k);
            let fit = self.fit_cached(&data.scaled, k);
            points.push(SweepPoint {
                k,
                inertia: fit.inertia,
                silhouette: mean_silhouette(&data.scaled, &fit.labels, k),
            });
        }
        Ok(points)
    }

    /// Labels every instrument with a cluster in `[0, k)`. Label values
    /// carry no semantic ordering across different fits.
    pub fn cluster(
        &mut self,
        data: &ClusterData,
        k: usize,
    ) -> Result<ClusterAssignment, AnalysisError> {
        if k < 1 || k > data.scaled.len() {
            return Err(AnalysisError::DegenerateInput(format!(
                "cannot split {} instruments into {} clusters",
                data.scaled.len(),
                k
            )));
        }
        let fit = self.fit_cached(&data.scaled, k);
        Ok(ClusterAssignment {
            instruments: data.instruments.clone(),
            labels: fit.labels.clone(),
        })
    }

    fn fit_cached(&mut self, rows: &[Vec<f64>], k: usize) -> &KMeansFit {
        let (seed, restarts) = (self.seed, self.restarts);
        self.models
            .entry(k)
            .or_insert_with(|| best_of_restarts(rows, k, seed, restarts))
    }
}

/// Per-column mean and (population) standard deviation; zero variance maps
/// to scale 1.0 so constant columns pass through unchanged.
fn fit_scaler(rows: &[Vec<f64>]) -> (Vec<f64>, Vec<f64>) {
    let n_cols = rows.first().map_or(0, |r| r.len());
    let n = rows.len() as f64;
    let mut means = vec![0.0; n_cols];
    let mut stds = vec![0.0; n_cols];
    for c in 0..n_cols {
        let mean = rows.iter().map(|r| r[c]).sum::<f64>() / n;
        let var = rows.iter().map(|r| (r[c] - mean).powi(2)).sum::<f64>() / n;
        means[c] = mean;
        stds[c] = if var == 0.0 { 1.0 } else { var.sqrt() };
    }
    (means, stds)
}

/// Runs Lloyd's algorithm `restarts` times from one seeded RNG and keeps the
/// fit with the lowest inertia. Same input, same k and same seed always
/// produce the same labels.
fn best_of_restarts(rows: &[Vec<f64>], k: usize, seed: u64, restarts: usize) -> KMeansFit {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut best: Option<KMeansFit> = None;
    for _ in 0..restarts {
        let fit = lloyd(rows, k, &mut rng);
        if best.as_ref().is_none_or(|b| fit.inertia < b.inertia) {
            best = Some(fit);
        }
    }
    best.expect("at least one restart")
}

fn lloyd(rows: &[Vec<f64>], k: usize, rng: &mut StdRng) -> KMeansFit {
    let n = rows.len();
    let dim = rows[0].len();

    // k distinct observations as initial centers.
    let mut centroids: Vec<Vec<f64>> = rand::seq::index::sample(rng, n, k)
        .iter()
        .map(|i| rows[i].clone())
        .collect();

    let mut labels = vec![0usize; n];
    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (i, row) in rows.iter().enumerate() {
            let nearest = nearest_centroid(row, &centroids);
            if labels[i] != nearest {
                labels[i] = nearest;
                changed = true;
            }
        }

        for (j, centroid) in centroids.iter_mut().enumerate() {
            let mut sum = vec![0.0; dim];
            let mut count = 0usize;
            for (row, &label) in rows.iter().zip(&labels) {
                if label == j {
                    for (s, v) in sum.iter_mut().zip(row) {
                        *s += v;
                    }
                    count += 1;
                }
            }
            // An emptied cluster keeps its previous center.
            if count > 0 {
                for s in sum.iter_mut() {
                    *s /= count as f64;
                }
                *centroid = sum;
            }
        }

        if !changed {
            break;
        }
    }

    let inertia = rows
        .iter()
        .zip(&labels)
        .map(|(row, &label)| squared_distance(row, &centroids[label]))
        .sum();

    KMeansFit { labels, inertia }
}

fn nearest_centroid(row: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::MAX;
    for (j, centroid) in centroids.iter().enumerate() {
        let dist = squared_distance(row, centroid);
        if dist < best_dist {
            best_dist = dist;
            best = j;
        }
    }
    best
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Mean silhouette coefficient over all points. A point alone in its
/// cluster scores 0.
fn mean_silhouette(rows: &[Vec<f64>], labels: &[usize], k: usize) -> f64 {
    let n = rows.len();
    if n == 0 || k < 2 {
        return 0.0;
    }

    let mut counts = vec![0usize; k];
    for &label in labels {
        counts[label] += 1;
    }

    let mut total = 0.0;
    for i in 0..n {
        // Mean distance from point i to every cluster.
        let mut dist_sums = vec![0.0; k];
        for j in 0..n {
            if i != j {
                dist_sums[labels[j]] += squared_distance(&rows[i], &rows[j]).sqrt();
            }
        }

        let own = labels[i];
        if counts[own] <= 1 {
            continue; // singleton: silhouette 0
        }
        let a = dist_sums[own] / (counts[own] - 1) as f64;
        let b = (0..k)
            .filter(|&c| c != own && counts[c] > 0)
            .map(|c| dist_sums[c] / counts[c] as f64)
            .fold(f64::MAX, f64::min);
        if b == f64::MAX {
            continue;
        }
        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }
    total / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(name: &str, values: &[f64]) -> ReturnSeries {
        ReturnSeries {
            name: name.into(),
            dates: (0..values.len() as u32)
                .map(|i| NaiveDate::from_ymd_opt(2024, 1, 1 + i).unwrap())
                .collect(),
            values: values.to_vec(),
        }
    }

    fn two_group_input() -> Vec<ReturnSeries> {
        vec![
            series("up1", &[0.0, 0.01, 0.012, 0.011, 0.01]),
            series("up2", &[0.0, 0.011, 0.01, 0.012, 0.009]),
            series("down1", &[0.0, -0.01, -0.012, -0.011, -0.01]),
            series("down2", &[0.0, -0.009, -0.011, -0.01, -0.012]),
        ]
    }

    #[test]
    fn standardized_columns_have_zero_mean() {
        let mut engine = ClusteringEngine::new();
        let data = engine.prepare(&two_group_input()).unwrap();
        for c in 0..data.dates.len() {
            let mean: f64 =
                data.scaled.iter().map(|r| r[c]).sum::<f64>() / data.scaled.len() as f64;
            assert!(mean.abs() < 1e-9, "column {} mean {}", c, mean);
        }
    }

    #[test]
    fn separates_two_obvious_groups() {
        let mut engine = ClusteringEngine::new();
        let data = engine.prepare(&two_group_input()).unwrap();
        let assignment = engine.cluster(&data, 2).unwrap();
        assert_eq!(assignment.labels.len(), 4);
        assert!(assignment.labels.iter().all(|&l| l < 2));
        assert_eq!(assignment.labels[0], assignment.labels[1]);
        assert_eq!(assignment.labels[2], assignment.labels[3]);
        assert_ne!(assignment.labels[0], assignment.labels[2]);
    }

    #[test]
    fn clustering_is_deterministic_across_engine_instances() {
        let input = two_group_input();

        let mut first = ClusteringEngine::new();
        let data = first.prepare(&input).unwrap();
        let labels_a = first.cluster(&data, 3).unwrap().labels;
        // Same instance again: served from the per-k cache.
        let labels_b = first.cluster(&data, 3).unwrap().labels;

        let mut second = ClusteringEngine::new();
        let data2 = second.prepare(&input).unwrap();
        let labels_c = second.cluster(&data2, 3).unwrap().labels;

        assert_eq!(labels_a, labels_b);
        assert_eq!(labels_a, labels_c);
    }

    #[test]
    fn sweep_records_one_point_per_k() {
        let mut engine = ClusteringEngine::new();
        let data = engine.prepare(&two_group_input()).unwrap();
        let points = engine.sweep(&data, 4).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].k, 2);
        assert_eq!(points[2].k, 4);
        for p in &points {
            assert!(p.inertia >= 0.0);
            assert!(p.silhouette >= -1.0 && p.silhouette <= 1.0);
        }
    }

    #[test]
    fn sweep_rejects_more_clusters_than_instruments() {
        let mut engine = ClusteringEngine::new();
        let data = engine.prepare(&two_group_input()).unwrap();
        assert!(matches!(
            engine.sweep(&data, 5),
            Err(AnalysisError::DegenerateInput(_))
        ));
    }

    #[test]
    fn cluster_rejects_degenerate_k() {
        let mut engine = ClusteringEngine::new();
        let data = engine.prepare(&two_group_input()).unwrap();
        assert!(matches!(
            engine.cluster(&data, 0),
            Err(AnalysisError::DegenerateInput(_))
        ));
        assert!(matches!(
            engine.cluster(&data, 9),
            Err(AnalysisError::DegenerateInput(_))
        ));
    }

    #[test]
    fn prepare_aligns_on_union_with_zero_fill() {
        let a = series("a", &[0.0, 0.01, 0.02]);
        let mut b = series("b", &[0.0, 0.03]);
        // Shift b so it misses a's first date and adds one new date.
        b.dates = vec![
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
        ];
        let mut engine = ClusteringEngine::new();
        let data = engine.prepare(&[a, b]).unwrap();
        assert_eq!(data.dates.len(), 4);
        // b has no observation on a's first and third dates.
        assert_eq!(data.raw[1], vec![0.0, 0.0, 0.0, 0.03]);
        // a has no observation on b's last date.
        assert_eq!(data.raw[0], vec![0.0, 0.01, 0.02, 0.0]);
    }
}
