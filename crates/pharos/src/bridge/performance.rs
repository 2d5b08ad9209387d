use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct NavigationTiming {
    pub request_start: f64,
    pub response_start: f64,
    pub dom_interactive: f64,
    pub dom_complete: f64,
    pub load_event_end: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PaintTiming {
    pub first_paint: Option<f64>,
    pub first_contentful_paint: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LcpEntry {
    pub start_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutShiftEntry {
    pub start_time: f64,
    pub value: f64,
    pub had_recent_input: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FirstInputEntry {
    pub start_time: f64,
    pub processing_start: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LongTaskEntry {
    pub start_time: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MemoryInfo {
    pub used_heap_bytes: u64,
    pub total_heap_bytes: u64,
    pub heap_limit_bytes: u64,
}

/// Pull-style snapshot of the host's performance timeline. `None` from an
/// accessor means the capability is unsupported on this host, which callers
/// must treat differently from "no entries yet".
pub trait PerformanceSource: Send + Sync {
    fn navigation_timing(&self) -> Option<NavigationTiming>;
    fn paint_timing(&self) -> Option<PaintTiming>;
    fn lcp_entries(&self) -> Vec<LcpEntry>;
    fn layout_shifts(&self) -> Vec<LayoutShiftEntry>;
    fn first_input(&self) -> Option<FirstInputEntry>;
    fn long_tasks(&self) -> Option<Vec<LongTaskEntry>>;
    fn memory(&self) -> Option<MemoryInfo>;
    fn is_hidden(&self) -> bool;
    /// Milliseconds since navigation start.
    fn now_ms(&self) -> f64;

    fn connect(&self) {}
    fn disconnect(&self) {}
}

/// In-memory source fed by setters. Host adapters that buffer observer
/// callbacks can push into one of these; tests script it directly.
#[derive(Default)]
pub struct StaticPerformance {
    inner: RwLock<PerformanceState>,
}

#[derive(Default)]
struct PerformanceState {
    navigation: Option<NavigationTiming>,
    paint: Option<PaintTiming>,
    lcp: Vec<LcpEntry>,
    shifts: Vec<LayoutShiftEntry>,
    first_input: Option<FirstInputEntry>,
    long_tasks: Option<Vec<LongTaskEntry>>,
    memory: Option<MemoryInfo>,
    hidden: bool,
    now_ms: f64,
}

impl StaticPerformance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_navigation_timing(&self, timing: NavigationTiming) {
        self.inner.write().navigation = Some(timing);
    }

    pub fn set_paint_timing(&self, timing: PaintTiming) {
        self.inner.write().paint = Some(timing);
    }

    pub fn push_lcp(&self, start_time: f64) {
        self.inner.write().lcp.push(LcpEntry { start_time });
    }

    pub fn push_layout_shift(&self, entry: LayoutShiftEntry) {
        self.inner.write().shifts.push(entry);
    }

    pub fn set_first_input(&self, entry: FirstInputEntry) {
        self.inner.write().first_input = Some(entry);
    }

    pub fn push_long_task(&self, entry: LongTaskEntry) {
        self.inner.write().long_tasks.get_or_insert_with(Vec::new).push(entry);
    }

    pub fn set_long_tasks_supported(&self, supported: bool) {
        let mut state = self.inner.write();
        if supported {
            state.long_tasks.get_or_insert_with(Vec::new);
        } else {
            state.long_tasks = None;
        }
    }

    pub fn set_memory(&self, memory: MemoryInfo) {
        self.inner.write().memory = Some(memory);
    }

    pub fn set_hidden(&self, hidden: bool) {
        self.inner.write().hidden = hidden;
    }

    pub fn set_now_ms(&self, now_ms: f64) {
        self.inner.write().now_ms = now_ms;
    }
}

impl PerformanceSource for StaticPerformance {
    fn navigation_timing(&self) -> Option<NavigationTiming> {
        self.inner.read().navigation
    }

    fn paint_timing(&self) -> Option<PaintTiming> {
        self.inner.read().paint
    }

    fn lcp_entries(&self) -> Vec<LcpEntry> {
        self.inner.read().lcp.clone()
    }

    fn layout_shifts(&self) -> Vec<LayoutShiftEntry> {
        self.inner.read().shifts.clone()
    }

    fn first_input(&self) -> Option<FirstInputEntry> {
        self.inner.read().first_input
    }

    fn long_tasks(&self) -> Option<Vec<LongTaskEntry>> {
        self.inner.read().long_tasks.clone()
    }

    fn memory(&self) -> Option<MemoryInfo> {
        self.inner.read().memory
    }

    fn is_hidden(&self) -> bool {
        self.inner.read().hidden
    }

    fn now_ms(&self) -> f64 {
        self.inner.read().now_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_source_round_trip() {
        let source = StaticPerformance::new();
        source.set_navigation_timing(NavigationTiming {
            request_start: 10.0,
            response_start: 120.0,
            dom_interactive: 800.0,
            dom_complete: 1500.0,
            load_event_end: 1600.0,
        });
        source.push_lcp(1200.0);
        source.push_lcp(1800.0);
        source.set_hidden(true);

        let nav = source.navigation_timing().unwrap();
        assert_eq!(nav.response_start, 120.0);
        assert_eq!(source.lcp_entries().len(), 2);
        assert!(source.is_hidden());
    }

    #[test]
    fn test_long_task_capability_flag() {
        let source = StaticPerformance::new();
        assert!(source.long_tasks().is_none());

        source.push_long_task(LongTaskEntry { start_time: 100.0, duration: 80.0 });
        assert_eq!(source.long_tasks().unwrap().len(), 1);

        source.set_long_tasks_supported(false);
        assert!(source.long_tasks().is_none());
    }
}
