pub mod analytics;
pub mod dom;
pub mod errors;
pub mod fetch;
pub mod performance;
pub mod store;
pub mod visibility;

pub use analytics::{AnalyticsEvent, AnalyticsSink, MemoryAnalytics, NoopAnalytics};
pub use dom::{ControlSummary, DomSource, DomSummary, ImageSummary, LinkSummary, StaticDom};
pub use errors::{ErrorEventSource, ErrorEvents, PageErrorEvent, PageErrorKind};
pub use fetch::{HttpFetcher, ResourceFetcher};
pub use performance::{
    FirstInputEntry, LayoutShiftEntry, LcpEntry, LongTaskEntry, MemoryInfo, NavigationTiming,
    PaintTiming, PerformanceSource, StaticPerformance,
};
pub use store::{FileStore, LocalStore, MemoryStore};
pub use visibility::{AlwaysVisible, ManualVisibility, VisibilityGate};
