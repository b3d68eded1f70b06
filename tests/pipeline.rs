// End-to-end run over the cache store and every engine, with the
// three-instrument scenario: a riser, a faller and a flat series.
use stocklens::analyzer::{
    ClusteringEngine, CorrelationEngine, ReturnCalculator, RollingWindowEngine, SeriesPreparer,
};
use stocklens::model::{RawBar, RawSeries};
use stocklens::storage::SqliteStorage;

fn raw(name: &str, closes: &[f64]) -> RawSeries {
    RawSeries {
        name: name.into(),
        bars: closes
            .iter()
            .enumerate()
            .map(|(i, &close)| RawBar {
                date: format!("202401{:02}", i + 1),
                close: Some(close),
                volume: Some(1000.0 + 10.0 * i as f64),
                ..RawBar::default()
            })
            .collect(),
    }
}

#[test]
fn three_instrument_scenario() {
    let storage = SqliteStorage::new(":memory:").unwrap();
    storage.save_series("UP", &raw("riser", &[100.0, 101.0, 102.0, 103.0])).unwrap();
    storage.save_series("DN", &raw("faller", &[50.0, 49.0, 48.0, 47.0])).unwrap();
    storage.save_series("FL", &raw("flat", &[10.0, 10.0, 10.0, 10.0])).unwrap();

    let preparer = SeriesPreparer::new();
    let calculator = ReturnCalculator::new();
    let mut returns = Vec::new();
    for code in ["UP", "DN", "FL"] {
        let series = preparer.prepare(&storage.load_series(code).unwrap()).unwrap();
        assert!(series.dates.windows(2).all(|w| w[0] < w[1]));
        returns.push(calculator.returns(&series).unwrap());
    }

    let engine = CorrelationEngine::new();
    let matrix = engine.correlation(&returns).unwrap();

    // Riser and faller move in strict opposition.
    let r = matrix.get(0, 1).unwrap();
    assert!(r < -0.99, "expected strong negative correlation, got {}", r);

    // The flat instrument has zero return variance: its pairs must be
    // undefined, never a spurious coefficient.
    assert_eq!(matrix.get(0, 2), None);
    assert_eq!(matrix.get(1, 2), None);
    assert_eq!(matrix.get(2, 2), Some(1.0));

    let pairs = engine.classify_strong_pairs(&matrix, 0.5);
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].a, "riser");
    assert_eq!(pairs[0].b, "faller");
    assert!(pairs[0].coefficient < -0.99);
}

#[test]
fn rolling_volatility_of_flat_instrument_is_zero() {
    let preparer = SeriesPreparer::new();
    let calculator = ReturnCalculator::new();
    let flat = preparer.prepare(&raw("flat", &[10.0, 10.0, 10.0, 10.0])).unwrap();
    let returns = calculator.returns(&flat).unwrap();

    let result = RollingWindowEngine::new()
        .rolling_volatility(&[returns], 2)
        .unwrap();
    let column = result.column("flat").unwrap();
    assert_eq!(column[0], None);
    for v in &column[1..] {
        assert_eq!(*v, Some(0.0));
    }
}

#[test]
fn clustering_groups_the_opposed_movers_apart() {
    let preparer = SeriesPreparer::new();
    let calculator = ReturnCalculator::new();
    let returns: Vec<_> = [
        raw("riser", &[100.0, 101.0, 102.0, 103.0]),
        raw("faller", &[50.0, 49.0, 48.0, 47.0]),
        raw("flat", &[10.0, 10.0, 10.0, 10.0]),
    ]
    .iter()
    .map(|r| calculator.returns(&preparer.prepare(r).unwrap()).unwrap())
    .collect();

    let mut engine = ClusteringEngine::new();
    let data = engine.prepare(&returns).unwrap();
    let first = engine.cluster(&data, 2).unwrap();
    assert_ne!(first.labels[0], first.labels[1]);

    // Fresh engine, same configuration: identical labels.
    let mut again = ClusteringEngine::new();
    let data2 = again.prepare(&returns).unwrap();
    let second = again.cluster(&data2, 2).unwrap();
    assert_eq!(first.labels, second.labels);
}
