//! Sliding-window rate estimation shared by the three independent pace
//! measurements a `StreamConsumer` keeps: grab pace, decode pace, and
//! reader pace.

use std::collections::VecDeque;
use std::time::Instant;

/// Lower bound enforced on `minimum_adaptive_mode_samples`; also used to
/// derive the retained window size (`10 * minimum_adaptive_mode_samples`).
pub const MIN_ADAPTIVE_SAMPLES_FLOOR: usize = 2;

pub struct PaceMonitor {
    ticks: VecDeque<Instant>,
    sample_size: usize,
}

impl PaceMonitor {
    pub fn new(minimum_adaptive_mode_samples: usize) -> Self {
        let floor = minimum_adaptive_mode_samples.max(MIN_ADAPTIVE_SAMPLES_FLOOR);
        Self {
            ticks: VecDeque::with_capacity(floor * 10),
            sample_size: floor * 10,
        }
    }

    /// Records the current monotonic time, dropping the oldest sample if
    /// the window is already full.
    pub fn tick(&mut self) {
        if self.ticks.len() == self.sample_size {
            self.ticks.pop_front();
        }
        self.ticks.push_back(Instant::now());
    }

    /// Ticks-per-second over the retained window. 0 if fewer than two
    /// samples are present (a single timestamp has no elapsed span).
    pub fn fps(&self) -> f64 {
        fps_over(&self.ticks)
    }

    pub fn reset(&mut self) {
        self.ticks.clear();
    }

    pub fn sample_count(&self) -> usize {
        self.ticks.len()
    }
}

fn fps_over(ticks: &VecDeque<Instant>) -> f64 {
    let n = ticks.len();
    if n < 2 {
        return 0.0;
    }
    let span = ticks[n - 1].duration_since(ticks[0]).as_secs_f64();
    if span <= 0.0 {
        return 0.0;
    }
    (n - 1) as f64 / span
}

/// `(n+1) / (now - oldest_retained_timestamp)`, as if one more tick landed
/// right now. Returns 0 if the monitor has no samples at all.
pub fn projected_fps_if_tick_now(monitor: &PaceMonitor) -> f64 {
    let Some(&oldest) = monitor.ticks.front() else {
        return 0.0;
    };
    let span = Instant::now().duration_since(oldest).as_secs_f64();
    if span <= 0.0 {
        return 0.0;
    }
    (monitor.ticks.len() + 1) as f64 / span
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn empty_monitor_reports_zero_fps() {
        let monitor = PaceMonitor::new(2);
        assert_eq!(monitor.fps(), 0.0);
        assert_eq!(monitor.sample_count(), 0);
    }

    #[test]
    fn single_tick_reports_zero_fps() {
        let mut monitor = PaceMonitor::new(2);
        monitor.tick();
        assert_eq!(monitor.fps(), 0.0);
    }

    #[test]
    fn fps_reflects_spacing_between_ticks() {
        let mut monitor = PaceMonitor::new(2);
        for _ in 0..5 {
            monitor.tick();
            sleep(Duration::from_millis(20));
        }
        let fps = monitor.fps();
        assert!(fps > 0.0 && fps < 1000.0, "fps was {fps}");
    }

    #[test]
    fn window_drops_oldest_samples_beyond_sample_size() {
        let mut monitor = PaceMonitor::new(2); // sample_size = 20
        for _ in 0..30 {
            monitor.tick();
        }
        assert_eq!(monitor.sample_count(), 20);
    }

    #[test]
    fn minimum_samples_is_floored_at_two() {
        let monitor = PaceMonitor::new(0);
        assert_eq!(monitor.sample_size, 20);
    }

    #[test]
    fn reset_clears_all_samples() {
        let mut monitor = PaceMonitor::new(2);
        monitor.tick();
        monitor.tick();
        monitor.reset();
        assert_eq!(monitor.sample_count(), 0);
    }

    #[test]
    fn projected_fps_is_zero_without_samples() {
        let monitor = PaceMonitor::new(2);
        assert_eq!(projected_fps_if_tick_now(&monitor), 0.0);
    }

    #[test]
    fn projected_fps_accounts_for_one_extra_tick() {
        let mut monitor = PaceMonitor::new(2);
        monitor.tick();
        sleep(Duration::from_millis(20));
        monitor.tick();
        let projected = projected_fps_if_tick_now(&monitor);
        assert!(projected > 0.0);
    }
}
