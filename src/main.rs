use chrono::Duration;
use stocklens::analyzer::{
    ClusteringEngine, CorrelationEngine, ReturnCalculator, RollingWindowEngine, SeriesPreparer,
};
use stocklens::config::load_config;
use stocklens::model::{PreparedSeries, RawSeries, ReturnSeries};
use stocklens::report;
use stocklens::storage::SqliteStorage;
use tracing::{error, info, warn};

fn main() {
    tracing_subscriber::fmt::init();

    let config = match load_config("config.json") {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Config load error: {}", e);
            return;
        }
    };

    let storage = match SqliteStorage::new(&config.db_path) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to open price cache {}: {}", config.db_path, e);
            return;
        }
    };

    // Load and prepare every configured instrument. A failed instrument is
    // skipped with a warning; the run continues with whatever qualifies.
    let preparer = SeriesPreparer::new();
    let calculator = ReturnCalculator::new();
    let max_age = Duration::days(config.cache_max_age_days);

    let mut prepared: Vec<PreparedSeries> = Vec::new();
    for instrument in &config.instruments {
        match storage.is_fresh(&instrument.code, max_age) {
            Ok(true) => {}
            Ok(false) => warn!(
                "cache for {} ({}) is stale or missing; using what is there",
                instrument.name, instrument.code
            ),
            Err(e) => warn!("freshness check failed for {}: {}", instrument.code, e),
        }

        let raw = match storage.load_series(&instrument.code) {
            Ok(series) => RawSeries {
                // Report under the configured display name.
                name: instrument.name.clone(),
                bars: series.bars,
            },
            Err(e) => {
                warn!("skipping {}: {}", instrument.name, e);
                continue;
            }
        };

        match preparer.prepare(&raw) {
            Ok(series) => {
                info!("{}: {} observations", series.name, series.len());
                prepared.push(series);
            }
            Err(e) => warn!("skipping {}: {}", instrument.name, e),
        }
    }

    if prepared.len() < 2 {
        error!(
            "only {} instrument(s) usable; nothing to analyze",
            prepared.len()
        );
        return;
    }

    let mut returns: Vec<ReturnSeries> = Vec::new();
    for series in &prepared {
        match calculator.returns(series) {
            Ok(r) => returns.push(r),
            Err(e) => warn!("no returns for {}: {}", series.name, e),
        }
    }

    run_correlation(&config, &returns);
    run_clustering(&config, &returns);
    run_rolling(&config, &returns, &prepared);

    info!("Analysis run complete.");
}

fn run_correlation(config: &stocklens::config::AppConfig, returns: &[ReturnSeries]) {
    info!("Computing return correlation...");
    let engine = CorrelationEngine::new();
    match engine.correlation(returns) {
        Ok(matrix) => {
            report::print_correlation_matrix(&matrix);
            let pairs = engine.classify_strong_pairs(&matrix, config.correlation_threshold);
            report::print_strong_pairs(&pairs, config.correlation_threshold);
        }
        Err(e) => warn!("correlation failed: {}", e),
    }
}

fn run_clustering(config: &stocklens::config::AppConfig, returns: &[ReturnSeries]) {
    info!("Clustering return profiles...");
    let mut engine = ClusteringEngine::new();
    let data = match engine.prepare(returns) {
        Ok(data) => data,
        Err(e) => {
            warn!("cluster preparation failed: {}", e);
            return;
        }
    };

    let k_max = config.max_clusters.min(data.instruments.len());
    if k_max < 2 {
        warn!("too few instruments for a cluster sweep");
        return;
    }
    match engine.sweep(&data, k_max) {
        Ok(points) => report::print_sweep(&points),
        Err(e) => warn!("cluster sweep failed: {}", e),
    }

    let k = config.cluster_count.min(data.instruments.len()).max(1);
    match engine.cluster(&data, k) {
        Ok(assignment) => report::print_clusters(&assignment, k),
        Err(e) => warn!("clustering failed: {}", e),
    }
}

fn run_rolling(
    config: &stocklens::config::AppConfig,
    returns: &[ReturnSeries],
    prepared: &[PreparedSeries],
) {
    info!(
        "Rolling-window analysis (window = {})...",
        config.rolling_window
    );
    let engine = RollingWindowEngine::new();

    match engine.rolling_correlation(returns, config.rolling_window) {
        Ok(result) => report::print_rolling_summary("Rolling correlation", &result),
        Err(e) => warn!("rolling correlation failed: {}", e),
    }

    match engine.rolling_volatility(returns, config.rolling_window) {
        Ok(result) => report::print_rolling_summary("Annualized volatility", &result),
        Err(e) => warn!("rolling volatility failed: {}", e),
    }

    match engine.rolling_volume_price_correlation(prepared, config.rolling_window) {
        Ok(result) => report::print_rolling_summary("Volume-price correlation", &result),
        Err(e) => warn!("volume-price correlation failed: {}", e),
    }
}
