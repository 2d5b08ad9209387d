pub mod cls;
pub mod collector;
pub mod metric;

pub use cls::ClsTracker;
pub use collector::{CollectorStats, PersistedVital, VitalsCollector, VITALS_KEY};
pub use metric::{rating, MetricName, MetricSample, Rating, Unit};
