use crate::bridge::LayoutShiftEntry;

/// A shift joins the current session window only when it lands within both
/// bounds; otherwise the window is sealed and a new one starts.
pub const SESSION_GAP_MS: f64 = 1_000.0;
pub const SESSION_SPAN_MS: f64 = 5_000.0;

#[derive(Debug, Clone)]
struct SessionWindow {
    value: f64,
    start: f64,
    last: f64,
}

/// Cumulative Layout Shift with session windowing. Shifts flagged
/// `had_recent_input` are excluded; the reported value is the largest
/// window total seen so far, including the window still open.
#[derive(Debug, Clone, Default)]
pub struct ClsTracker {
    current: Option<SessionWindow>,
    sealed_max: f64,
}

impl ClsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: &LayoutShiftEntry) {
        if entry.had_recent_input {
            return;
        }

        match &mut self.current {
            Some(window)
                if entry.start_time - window.last <= SESSION_GAP_MS
                    && entry.start_time - window.start <= SESSION_SPAN_MS =>
            {
                window.value += entry.value;
                window.last = entry.start_time;
            }
            _ => {
                if let Some(window) = self.current.take() {
                    self.sealed_max = self.sealed_max.max(window.value);
                }
                self.current = Some(SessionWindow {
                    value: entry.value,
                    start: entry.start_time,
                    last: entry.start_time,
                });
            }
        }
    }

    pub fn value(&self) -> f64 {
        let open = self.current.as_ref().map_or(0.0, |w| w.value);
        self.sealed_max.max(open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shift(start_time: f64, value: f64) -> LayoutShiftEntry {
        LayoutShiftEntry { start_time, value, had_recent_input: false }
    }

    #[test]
    fn test_shifts_within_gap_accumulate() {
        let mut tracker = ClsTracker::new();
        tracker.add(&shift(0.0, 0.05));
        tracker.add(&shift(900.0, 0.05));
        assert!((tracker.value() - 0.10).abs() < 1e-9);
    }

    #[test]
    fn test_gap_over_one_second_starts_new_session() {
        let mut tracker = ClsTracker::new();
        tracker.add(&shift(0.0, 0.05));
        tracker.add(&shift(900.0, 0.05));
        tracker.add(&shift(2_000.0, 0.05));
        // The third shift opens a fresh window; the max stays with the first.
        assert!((tracker.value() - 0.10).abs() < 1e-9);
    }

    #[test]
    fn test_reports_largest_session() {
        let mut tracker = ClsTracker::new();
        tracker.add(&shift(0.0, 0.3));
        tracker.add(&shift(5_000.0, 0.05));
        tracker.add(&shift(5_100.0, 0.05));
        assert!((tracker.value() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_span_over_five_seconds_starts_new_session() {
        let mut tracker = ClsTracker::new();
        for i in 0..7 {
            tracker.add(&shift(f64::from(i) * 900.0, 0.01));
        }
        // Entries at 0..=4500 ms share one window (span bound inclusive);
        // 5400 ms exceeds the span and opens a second.
        assert!((tracker.value() - 0.06).abs() < 1e-9);
    }

    #[test]
    fn test_recent_input_shifts_are_excluded() {
        let mut tracker = ClsTracker::new();
        tracker.add(&shift(0.0, 0.05));
        tracker.add(&LayoutShiftEntry { start_time: 100.0, value: 0.5, had_recent_input: true });
        assert!((tracker.value() - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_empty_tracker_reports_zero() {
        assert_eq!(ClsTracker::new().value(), 0.0);
    }
}
