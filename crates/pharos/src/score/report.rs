use crate::bridge::DomSource;
use crate::score::audits;
use crate::score::curves::performance_score;
use crate::vitals::MetricSample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LighthouseScores {
    pub performance: Option<u8>,
    pub accessibility: Option<u8>,
    pub best_practices: Option<u8>,
    pub seo: Option<u8>,
}

/// Derives the four category scores on demand. Performance is blended from
/// whatever samples the collector has; the static categories audit a DOM
/// snapshot and stay `None` when no DOM source is wired in.
#[derive(Default)]
pub struct ScoreEstimator {
    dom: Option<Arc<dyn DomSource>>,
}

impl ScoreEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dom(mut self, dom: Arc<dyn DomSource>) -> Self {
        self.dom = Some(dom);
        self
    }

    pub fn scores(&self, samples: &[MetricSample]) -> LighthouseScores {
        let dom = self.dom.as_ref().and_then(|d| d.snapshot());
        LighthouseScores {
            performance: performance_score(samples),
            accessibility: dom.as_ref().map(audits::accessibility_score),
            best_practices: dom.as_ref().map(audits::best_practices_score),
            seo: dom.as_ref().map(audits::seo_score),
        }
    }
}

/// Shape of `export_lighthouse_data()`, also what the CLI `score` command
/// reads back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LighthouseExport {
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub metrics: Vec<MetricSample>,
    pub scores: LighthouseScores,
    #[serde(rename = "userAgent")]
    pub user_agent: String,
}

impl LighthouseExport {
    pub fn new(
        url: impl Into<String>,
        user_agent: impl Into<String>,
        metrics: Vec<MetricSample>,
        scores: LighthouseScores,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            url: url.into(),
            metrics,
            scores,
            user_agent: user_agent.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::StaticDom;
    use crate::vitals::{MetricName, Rating};

    fn all_good_samples() -> Vec<MetricSample> {
        vec![
            MetricSample::new(MetricName::Lcp, 1_200.0),
            MetricSample::new(MetricName::Fid, 40.0),
            MetricSample::new(MetricName::Cls, 0.02),
            MetricSample::new(MetricName::Fcp, 900.0),
            MetricSample::new(MetricName::Ttfb, 300.0),
            MetricSample::new(MetricName::Tti, 2_000.0),
            MetricSample::new(MetricName::Si, 1_700.0),
            MetricSample::new(MetricName::Tbt, 80.0),
        ]
    }

    #[test]
    fn test_all_good_metrics_score_in_the_green() {
        let samples = all_good_samples();
        for sample in &samples {
            assert_eq!(sample.rating, Rating::Good, "{} should rate good", sample.name);
        }

        let estimator = ScoreEstimator::new();
        let scores = estimator.scores(&samples);
        let performance = scores.performance.unwrap();
        assert!(
            (90..=100).contains(&performance),
            "expected a green score, got {performance}"
        );
        assert_eq!(scores.accessibility, None);
        assert_eq!(scores.seo, None);
    }

    #[test]
    fn test_dom_source_enables_static_categories() {
        let dom = StaticDom::with_summary(crate::bridge::DomSummary {
            url: "https://app.example/".to_string(),
            title: Some("Example".to_string()),
            meta_description: Some("desc".to_string()),
            has_viewport_meta: true,
            has_doctype: true,
            https: true,
            node_count: 100,
            console_error_count: 0,
            images: vec![],
            links: vec![],
            controls: vec![],
        });

        let estimator = ScoreEstimator::new().with_dom(Arc::new(dom));
        let scores = estimator.scores(&[]);
        assert_eq!(scores.performance, None);
        assert_eq!(scores.accessibility, Some(95));
        assert_eq!(scores.best_practices, Some(95));
        assert_eq!(scores.seo, Some(90));
    }

    #[test]
    fn test_export_round_trips_with_camel_case_agent() {
        let export = LighthouseExport::new(
            "https://app.example/pricing",
            "Mozilla/5.0",
            all_good_samples(),
            LighthouseScores { performance: Some(95), ..LighthouseScores::default() },
        );

        let json = serde_json::to_string(&export).unwrap();
        assert!(json.contains("\"userAgent\":\"Mozilla/5.0\""));

        let back: LighthouseExport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.metrics.len(), 8);
        assert_eq!(back.scores.performance, Some(95));
    }
}
