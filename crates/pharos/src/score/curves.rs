use crate::vitals::{MetricName, MetricSample};

/// Scoring curve for one metric: `[good, medium, poor]` breakpoints plus the
/// weight it carries in the blended performance score. The constants mirror
/// the Lighthouse-style weighting this estimator approximates; FID carries no
/// weight and is rated but never scored.
#[derive(Debug, Clone, Copy)]
pub struct Curve {
    pub weight: f64,
    pub breakpoints: [f64; 3],
}

pub fn curve(name: MetricName) -> Option<Curve> {
    let curve = match name {
        MetricName::Fcp => Curve { weight: 0.10, breakpoints: [1_800.0, 3_000.0, 4_500.0] },
        MetricName::Si => Curve { weight: 0.10, breakpoints: [3_400.0, 5_800.0, 8_300.0] },
        MetricName::Lcp => Curve { weight: 0.25, breakpoints: [2_500.0, 4_000.0, 6_000.0] },
        MetricName::Ttfb => Curve { weight: 0.05, breakpoints: [800.0, 1_800.0, 3_000.0] },
        MetricName::Tbt => Curve { weight: 0.30, breakpoints: [200.0, 600.0, 1_200.0] },
        MetricName::Cls => Curve { weight: 0.15, breakpoints: [0.10, 0.25, 0.50] },
        MetricName::Tti => Curve { weight: 0.05, breakpoints: [3_800.0, 7_300.0, 12_000.0] },
        MetricName::Fid => return None,
    };
    Some(curve)
}

/// Piecewise-linear sub-score: 90..=100 below `good`, 75..90 to `medium`,
/// 50..75 to `poor`, then `50 * poor / value` decaying toward 0.
pub fn sub_score(value: f64, [good, medium, poor]: [f64; 3]) -> f64 {
    let value = value.max(0.0);
    if value <= good {
        90.0 + 10.0 * (1.0 - value / good)
    } else if value <= medium {
        75.0 + 15.0 * (1.0 - (value - good) / (medium - good))
    } else if value <= poor {
        50.0 + 25.0 * (1.0 - (value - medium) / (poor - medium))
    } else {
        (50.0 * poor / value).max(0.0)
    }
}

/// Weighted blend over whichever scoreable metrics are present, weights
/// renormalized to the available set. `None` when nothing scoreable was
/// collected.
pub fn performance_score(samples: &[MetricSample]) -> Option<u8> {
    let mut weighted = 0.0;
    let mut total_weight = 0.0;

    for sample in samples {
        if !sample.value.is_finite() {
            continue;
        }
        let Some(curve) = curve(sample.name) else {
            continue;
        };
        weighted += curve.weight * sub_score(sample.value, curve.breakpoints);
        total_weight += curve.weight;
    }

    if total_weight <= 0.0 {
        return None;
    }

    let blended = (weighted / total_weight).round().clamp(0.0, 100.0);
    Some(blended as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LCP_BREAKPOINTS: [f64; 3] = [2_500.0, 4_000.0, 6_000.0];

    #[test]
    fn test_sub_score_anchors_at_breakpoints() {
        assert_eq!(sub_score(0.0, LCP_BREAKPOINTS), 100.0);
        assert_eq!(sub_score(2_500.0, LCP_BREAKPOINTS), 90.0);
        assert_eq!(sub_score(4_000.0, LCP_BREAKPOINTS), 75.0);
        assert_eq!(sub_score(6_000.0, LCP_BREAKPOINTS), 50.0);
        assert_eq!(sub_score(12_000.0, LCP_BREAKPOINTS), 25.0);
    }

    #[test]
    fn test_sub_score_is_monotonically_non_increasing() {
        let mut previous = f64::INFINITY;
        for step in 0..600 {
            let value = f64::from(step) * 25.0;
            let score = sub_score(value, LCP_BREAKPOINTS);
            assert!(
                score <= previous,
                "score rose from {previous} to {score} at value {value}"
            );
            previous = score;
        }
    }

    #[test]
    fn test_performance_score_renormalizes_over_available() {
        // A lone metric carries its full weight, so the blended score equals
        // its own sub-score.
        let samples = vec![MetricSample::new(MetricName::Lcp, 2_500.0)];
        assert_eq!(performance_score(&samples), Some(90));
    }

    #[test]
    fn test_performance_score_weights_heavy_metrics_harder() {
        let balanced = vec![
            MetricSample::new(MetricName::Tbt, 200.0),
            MetricSample::new(MetricName::Ttfb, 800.0),
        ];
        let tbt_poor = vec![
            MetricSample::new(MetricName::Tbt, 1_200.0),
            MetricSample::new(MetricName::Ttfb, 800.0),
        ];
        let ttfb_poor = vec![
            MetricSample::new(MetricName::Tbt, 200.0),
            MetricSample::new(MetricName::Ttfb, 3_000.0),
        ];

        let balanced = performance_score(&balanced).unwrap();
        let tbt_poor = performance_score(&tbt_poor).unwrap();
        let ttfb_poor = performance_score(&ttfb_poor).unwrap();
        assert!(tbt_poor < ttfb_poor, "TBT weighs 0.30 against TTFB's 0.05");
        assert!(tbt_poor < balanced && ttfb_poor < balanced);
    }

    #[test]
    fn test_performance_score_ignores_unscoreable_samples() {
        assert_eq!(performance_score(&[]), None);
        let only_fid = vec![MetricSample::new(MetricName::Fid, 50.0)];
        assert_eq!(performance_score(&only_fid), None);
        let with_nan = vec![
            MetricSample::new(MetricName::Lcp, f64::NAN),
            MetricSample::new(MetricName::Ttfb, 800.0),
        ];
        assert_eq!(performance_score(&with_nan), Some(90));
    }
}
