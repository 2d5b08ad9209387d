use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub src: String,
    pub has_alt: bool,
    pub has_dimensions: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSummary {
    pub href: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlSummary {
    pub name: String,
    pub has_label: bool,
}

/// Flattened view of the document that the static audits run against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DomSummary {
    pub url: String,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub has_viewport_meta: bool,
    pub has_doctype: bool,
    pub https: bool,
    pub node_count: usize,
    pub console_error_count: usize,
    pub images: Vec<ImageSummary>,
    pub links: Vec<LinkSummary>,
    pub controls: Vec<ControlSummary>,
}

pub trait DomSource: Send + Sync {
    fn snapshot(&self) -> Option<DomSummary>;
}

#[derive(Default)]
pub struct StaticDom {
    summary: RwLock<Option<DomSummary>>,
}

impl StaticDom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_summary(summary: DomSummary) -> Self {
        Self { summary: RwLock::new(Some(summary)) }
    }

    pub fn set(&self, summary: DomSummary) {
        *self.summary.write() = Some(summary);
    }
}

impl DomSource for StaticDom {
    fn snapshot(&self) -> Option<DomSummary> {
        self.summary.read().clone()
    }
}
