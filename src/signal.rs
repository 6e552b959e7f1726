use crate::IntersectionId;
use smallvec::SmallVec;

/// The fixed-time signal cycle of one intersection.
///
/// The state is the current phase index and the time spent in it. [advance](Self::advance)
/// is the only transition; it never stops cycling.
#[derive(Clone, Debug)]
pub struct SignalController {
    /// The intersection being controlled.
    intersection: IntersectionId,
    /// The duration of each phase in s.
    durations: SmallVec<[f64; 4]>,
    /// The current phase index.
    phase: usize,
    /// The time since the current phase began, in s.
    elapsed: f64,
}

impl SignalController {
    /// Creates a controller in phase 0 with nothing elapsed.
    ///
    /// # Panics
    /// If `durations` is empty or contains a non-positive duration.
    pub fn new(intersection: IntersectionId, durations: &[f64]) -> Self {
        assert!(!durations.is_empty(), "Signal cycle must have at least one phase");
        assert!(
            durations.iter().all(|d| *d > 0.0),
            "Phase durations must be positive"
        );
        Self {
            intersection,
            durations: durations.iter().copied().collect(),
            phase: 0,
            elapsed: 0.0,
        }
    }

    /// Advances the signal timing by `dt` seconds.
    /// Time left over when a phase ends carries into the next phase.
    pub fn advance(&mut self, dt: f64) {
        if !(dt > 0.0) {
            return;
        }
        self.elapsed += dt;
        while self.elapsed >= self.durations[self.phase] {
            self.elapsed -= self.durations[self.phase];
            self.phase = (self.phase + 1) % self.durations.len();
        }
    }

    pub fn intersection(&self) -> IntersectionId {
        self.intersection
    }

    /// The current phase index.
    pub fn phase(&self) -> usize {
        self.phase
    }

    /// The time spent in the current phase, in s.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    /// The time for one full cycle through every phase.
    pub fn cycle_length(&self) -> f64 {
        self.durations.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn controller(durations: &[f64]) -> SignalController {
        SignalController::new(IntersectionId::default(), durations)
    }

    #[test]
    fn starts_in_phase_zero() {
        let signal = controller(&[10.0, 20.0]);
        assert_eq!(signal.phase(), 0);
        assert_eq!(signal.elapsed(), 0.0);
    }

    #[test]
    fn carries_over_remainder() {
        let mut signal = controller(&[10.0, 20.0]);
        for _ in 0..3 {
            signal.advance(4.0);
        }
        assert_eq!(signal.phase(), 1);
        assert_approx_eq!(signal.elapsed(), 2.0);
    }

    #[test]
    fn large_step_skips_whole_phases() {
        let mut signal = controller(&[5.0, 5.0, 5.0]);
        signal.advance(12.0);
        assert_eq!(signal.phase(), 2);
        assert_approx_eq!(signal.elapsed(), 2.0);
    }

    #[test]
    fn cycles_through_every_phase_in_order() {
        let mut signal = controller(&[3.0, 7.0, 2.5, 4.0]);
        let mut visited = vec![signal.phase()];
        for _ in 0..1000 {
            signal.advance(0.5);
            assert!(signal.elapsed() < signal.durations()[signal.phase()]);
            if *visited.last().unwrap() != signal.phase() {
                visited.push(signal.phase());
            }
        }
        for pair in visited.windows(2) {
            assert_eq!(pair[1], (pair[0] + 1) % 4);
        }
        assert!(visited.len() > 8);
    }

    #[test]
    fn no_drift_over_long_runs() {
        let mut signal = controller(&[30.0, 30.0]);
        // 0.1 is not exactly representable, so a reset-to-zero scheme would drift.
        for _ in 0..60_000 {
            signal.advance(0.1);
        }
        // 6000 s is exactly 100 cycles.
        assert!(signal.phase() == 0 || signal.elapsed() > 29.9);
    }

    #[test]
    fn ignores_non_positive_steps() {
        let mut signal = controller(&[1.0]);
        signal.advance(0.0);
        signal.advance(-5.0);
        assert_eq!(signal.elapsed(), 0.0);
    }

    #[test]
    #[should_panic]
    fn rejects_zero_duration() {
        controller(&[10.0, 0.0]);
    }
}
