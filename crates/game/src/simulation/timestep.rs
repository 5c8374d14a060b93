use std::time::Duration;

/// Largest wall-clock step fed into an accumulator at once.
pub const MAX_FRAME_DELTA: Duration = Duration::from_millis(250);

pub struct FixedTimestep {
    period: Duration,
    accumulator: Duration,
}

impl FixedTimestep {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            accumulator: Duration::ZERO,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn accumulate(&mut self, delta: Duration) {
        self.accumulator = (self.accumulator + delta.min(MAX_FRAME_DELTA)).min(MAX_FRAME_DELTA);
    }

    pub fn should_tick(&self) -> bool {
        self.accumulator >= self.period
    }

    /// Consumes one period if available. Callers fire at most once per loop
    /// iteration, so a backlog drains over the following iterations.
    pub fn consume_tick(&mut self) -> bool {
        if self.accumulator >= self.period {
            self.accumulator -= self.period;
            true
        } else {
            false
        }
    }

    pub fn alpha(&self) -> f32 {
        self.accumulator.as_secs_f32() / self.period.as_secs_f32()
    }

    pub fn reset(&mut self) {
        self.accumulator = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_timestep_accumulation() {
        let mut ts = FixedTimestep::new(Duration::from_millis(10));

        ts.accumulate(Duration::from_millis(25));
        assert!(ts.should_tick());
        assert!(ts.consume_tick());
        assert!(ts.consume_tick());
        assert!(!ts.consume_tick());
        assert!((ts.alpha() - 0.5).abs() < 1e-3);

        ts.reset();
        assert!(!ts.should_tick());
    }

    #[test]
    fn large_deltas_are_clamped() {
        let mut ts = FixedTimestep::new(Duration::from_millis(100));
        ts.accumulate(Duration::from_secs(5));

        let mut ticks = 0;
        while ts.consume_tick() {
            ticks += 1;
        }
        assert_eq!(ticks, 2);
    }
}
