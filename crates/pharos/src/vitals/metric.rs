use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Web-vital metric names. Serialized in their conventional uppercase form,
/// which is also the key format of the persisted `webVitals` object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MetricName {
    Lcp,
    Fid,
    Cls,
    Fcp,
    Ttfb,
    Tti,
    Si,
    Tbt,
}

impl MetricName {
    pub const ALL: [MetricName; 8] = [
        MetricName::Lcp,
        MetricName::Fid,
        MetricName::Cls,
        MetricName::Fcp,
        MetricName::Ttfb,
        MetricName::Tti,
        MetricName::Si,
        MetricName::Tbt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricName::Lcp => "LCP",
            MetricName::Fid => "FID",
            MetricName::Cls => "CLS",
            MetricName::Fcp => "FCP",
            MetricName::Ttfb => "TTFB",
            MetricName::Tti => "TTI",
            MetricName::Si => "SI",
            MetricName::Tbt => "TBT",
        }
    }

    pub fn unit(self) -> Unit {
        match self {
            MetricName::Cls => Unit::Score,
            _ => Unit::Ms,
        }
    }

    /// `[good, poor]` boundaries for the coarse three-way rating.
    pub fn thresholds(self) -> [f64; 2] {
        match self {
            MetricName::Lcp => [2_500.0, 4_000.0],
            MetricName::Fid => [100.0, 300.0],
            MetricName::Cls => [0.1, 0.25],
            MetricName::Fcp => [1_800.0, 3_000.0],
            MetricName::Ttfb => [800.0, 1_800.0],
            MetricName::Tti => [3_800.0, 7_300.0],
            MetricName::Si => [3_400.0, 5_800.0],
            MetricName::Tbt => [200.0, 600.0],
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Ms,
    Score,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rating {
    Good,
    NeedsImprovement,
    Poor,
    Unknown,
}

impl Rating {
    pub fn as_str(self) -> &'static str {
        match self {
            Rating::Good => "good",
            Rating::NeedsImprovement => "needs-improvement",
            Rating::Poor => "poor",
            Rating::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classifies a value against the metric's `[good, poor]` thresholds. Both
/// boundaries are inclusive on the better side.
pub fn rating(name: MetricName, value: f64) -> Rating {
    if !value.is_finite() {
        return Rating::Unknown;
    }
    let [good, poor] = name.thresholds();
    if value <= good {
        Rating::Good
    } else if value <= poor {
        Rating::NeedsImprovement
    } else {
        Rating::Poor
    }
}

/// One collected measurement. Samples are immutable; the collector replaces
/// the whole sample when a metric is re-observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: MetricName,
    pub value: f64,
    pub unit: Unit,
    pub rating: Rating,
    pub timestamp: DateTime<Utc>,
}

impl MetricSample {
    pub fn new(name: MetricName, value: f64) -> Self {
        Self { name, value, unit: name.unit(), rating: rating(name, value), timestamp: Utc::now() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_boundaries_are_inclusive() {
        assert_eq!(rating(MetricName::Lcp, 2_500.0), Rating::Good);
        assert_eq!(rating(MetricName::Lcp, 2_500.1), Rating::NeedsImprovement);
        assert_eq!(rating(MetricName::Lcp, 4_000.0), Rating::NeedsImprovement);
        assert_eq!(rating(MetricName::Lcp, 4_000.1), Rating::Poor);
    }

    #[test]
    fn test_cls_uses_fractional_thresholds() {
        assert_eq!(rating(MetricName::Cls, 0.05), Rating::Good);
        assert_eq!(rating(MetricName::Cls, 0.2), Rating::NeedsImprovement);
        assert_eq!(rating(MetricName::Cls, 0.3), Rating::Poor);
    }

    #[test]
    fn test_non_finite_values_rate_unknown() {
        assert_eq!(rating(MetricName::Fcp, f64::NAN), Rating::Unknown);
        assert_eq!(rating(MetricName::Fcp, f64::INFINITY), Rating::Unknown);
    }

    #[test]
    fn test_sample_derives_unit_and_rating() {
        let sample = MetricSample::new(MetricName::Cls, 0.02);
        assert_eq!(sample.unit, Unit::Score);
        assert_eq!(sample.rating, Rating::Good);

        let sample = MetricSample::new(MetricName::Ttfb, 2_000.0);
        assert_eq!(sample.unit, Unit::Ms);
        assert_eq!(sample.rating, Rating::Poor);
    }

    #[test]
    fn test_serde_uses_conventional_names() {
        let json = serde_json::to_string(&MetricName::Ttfb).unwrap();
        assert_eq!(json, "\"TTFB\"");
        let json = serde_json::to_string(&Rating::NeedsImprovement).unwrap();
        assert_eq!(json, "\"needs-improvement\"");
    }
}
