pub mod audits;
pub mod curves;
pub mod report;

pub use audits::{accessibility_score, best_practices_score, seo_score};
pub use curves::{performance_score, sub_score, Curve};
pub use report::{LighthouseExport, LighthouseScores, ScoreEstimator};
