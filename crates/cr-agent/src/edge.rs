//! One-shot completion detection for polled operations.

/// Turns a polled `done()` flag into a single completion event per run.
///
/// Starts latched at `true`: an operation that was never started reports
/// `done()` from boot, so the edge stays flat until a run begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionEdgeTracker {
    previously_done: bool,
}

impl CompletionEdgeTracker {
    pub fn new() -> Self {
        Self {
            previously_done: true,
        }
    }

    /// Record a start. Guarantees the next observed `done == true` fires,
    /// even if the run finished before the tracker saw it running.
    pub fn arm(&mut self) {
        self.previously_done = false;
    }

    /// Observe the current `done()` value. Returns true exactly on the
    /// false→true transition.
    pub fn observe(&mut self, done_now: bool) -> bool {
        let fired = done_now && !self.previously_done;
        self.previously_done = done_now;
        fired
    }
}

impl Default for CompletionEdgeTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_fires_at_boot() {
        let mut edge = CompletionEdgeTracker::new();
        for _ in 0..1_000 {
            assert!(!edge.observe(true));
        }
    }

    #[test]
    fn fires_once_per_run_regardless_of_length() {
        for running_ticks in [1, 10, 10_000] {
            let mut edge = CompletionEdgeTracker::new();
            let mut fires = 0;
            for _ in 0..running_ticks {
                fires += edge.observe(false) as u32;
            }
            for _ in 0..50 {
                fires += edge.observe(true) as u32;
            }
            assert_eq!(fires, 1, "running for {running_ticks} ticks");
        }
    }

    #[test]
    fn fires_again_on_next_run() {
        let mut edge = CompletionEdgeTracker::new();
        assert!(!edge.observe(false));
        assert!(edge.observe(true));
        assert!(!edge.observe(false));
        assert!(edge.observe(true));
        assert!(!edge.observe(true));
    }

    #[test]
    fn armed_tracker_fires_for_instant_completion() {
        let mut edge = CompletionEdgeTracker::new();
        edge.arm();
        assert!(edge.observe(true));
        assert!(!edge.observe(true));
    }

    #[test]
    fn arming_while_running_does_not_double_fire() {
        let mut edge = CompletionEdgeTracker::new();
        edge.arm();
        assert!(!edge.observe(false));
        edge.arm();
        assert!(!edge.observe(false));
        assert!(edge.observe(true));
        assert!(!edge.observe(true));
    }
}
