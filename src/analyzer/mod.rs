// Analyzer module: data preparation plus the three statistics engines.

pub mod clustering;
pub mod correlation;
pub mod preparer;
pub mod returns;
pub mod rolling;
pub mod stats;

pub use clustering::ClusteringEngine;
pub use correlation::CorrelationEngine;
pub use preparer::SeriesPreparer;
pub use returns::ReturnCalculator;
pub use rolling::RollingWindowEngine;
