//! Run statistics and the fitness computed from them.

/// The outcome of one simulation run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulationResult {
    /// Vehicles which reached the end of their route.
    pub completed: usize,
    /// Vehicles which entered the network.
    pub generated: usize,
    /// Arrivals turned away because their entry link was full.
    pub dropped: usize,
    /// Mean wait time in s over every vehicle that entered the network,
    /// including those still travelling when the run ended.
    pub mean_wait: f64,
    /// Whether the run was terminated by a collision.
    pub collision_detected: bool,
    /// The number of ticks simulated.
    pub ticks: usize,
    /// The simulated time in s.
    pub elapsed: f64,
}

/// Weights of the fitness function
/// `completed_weight * completed - wait_penalty * mean_wait - collision_penalty * collided`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FitnessWeights {
    pub completed_weight: f64,
    pub wait_penalty: f64,
    pub collision_penalty: f64,
    /// Runs generating fewer vehicles than this score `-idle_penalty`; 0 disables the check.
    pub min_generated: usize,
    pub idle_penalty: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            completed_weight: 1.0,
            wait_penalty: 0.5,
            collision_penalty: 10_000.0,
            min_generated: 3,
            idle_penalty: 10_000.0,
        }
    }
}

impl FitnessWeights {
    /// Scores a run; higher is better.
    pub fn fitness(&self, result: &SimulationResult) -> f64 {
        if result.generated < self.min_generated {
            return -self.idle_penalty;
        }
        let collided = if result.collision_detected { 1.0 } else { 0.0 };
        self.completed_weight * result.completed as f64
            - self.wait_penalty * result.mean_wait
            - self.collision_penalty * collided
    }
}

/// Accumulates statistics over a run.
#[derive(Clone, Debug, Default)]
pub struct MetricsCollector {
    generated: usize,
    dropped: usize,
    completed: usize,
    /// Total wait time of completed vehicles in s.
    completed_wait: f64,
    collision: bool,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_generated(&mut self) {
        self.generated += 1;
    }

    pub fn record_dropped(&mut self) {
        self.dropped += 1;
    }

    pub fn record_completed(&mut self, wait_time: f64) {
        self.completed += 1;
        self.completed_wait += wait_time;
    }

    pub fn record_collision(&mut self) {
        self.collision = true;
    }

    pub fn collision_detected(&self) -> bool {
        self.collision
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Produces the result, folding in the wait times of vehicles still in the network.
    pub fn finish(
        &self,
        active_waits: impl Iterator<Item = f64>,
        ticks: usize,
        elapsed: f64,
    ) -> SimulationResult {
        let (active, active_wait) = active_waits.fold((0usize, 0.0), |(n, sum), w| (n + 1, sum + w));
        let count = self.completed + active;
        let mean_wait = if count > 0 {
            (self.completed_wait + active_wait) / count as f64
        } else {
            0.0
        };
        SimulationResult {
            completed: self.completed,
            generated: self.generated,
            dropped: self.dropped,
            mean_wait,
            collision_detected: self.collision,
            ticks,
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn result(completed: usize, mean_wait: f64, collision: bool) -> SimulationResult {
        SimulationResult {
            completed,
            generated: completed + 2,
            dropped: 0,
            mean_wait,
            collision_detected: collision,
            ticks: 120,
            elapsed: 60.0,
        }
    }

    #[test]
    fn mean_wait_includes_active_vehicles() {
        let mut metrics = MetricsCollector::new();
        metrics.record_generated();
        metrics.record_generated();
        metrics.record_generated();
        metrics.record_completed(4.0);
        let result = metrics.finish([2.0, 6.0].into_iter(), 10, 5.0);
        assert_eq!(result.completed, 1);
        assert_eq!(result.generated, 3);
        assert_approx_eq!(result.mean_wait, 4.0);
    }

    #[test]
    fn empty_run_has_zero_wait() {
        let result = MetricsCollector::new().finish(std::iter::empty(), 0, 0.0);
        assert_eq!(result.mean_wait, 0.0);
    }

    #[test]
    fn fitness_is_linear_in_parameters() {
        for (wait_penalty, collision_penalty) in [(0.5, 1e4), (2.0, 1e3), (0.0, 1.0)] {
            let weights = FitnessWeights {
                wait_penalty,
                collision_penalty,
                ..Default::default()
            };
            assert_approx_eq!(weights.fitness(&result(10, 4.0, false)), 10.0 - wait_penalty * 4.0);
            assert_approx_eq!(
                weights.fitness(&result(10, 4.0, true)),
                10.0 - wait_penalty * 4.0 - collision_penalty
            );
        }
    }

    #[test]
    fn collision_never_beats_clean_run() {
        let weights = FitnessWeights::default();
        let crashed = weights.fitness(&result(500, 0.0, true));
        let idle = weights.fitness(&result(1, 100.0, false));
        assert!(crashed < idle);
    }

    #[test]
    fn idle_runs_are_penalised() {
        let weights = FitnessWeights::default();
        let mut r = result(0, 0.0, false);
        r.generated = 2;
        assert_eq!(weights.fitness(&r), -weights.idle_penalty);
        r.generated = 3;
        assert_eq!(weights.fitness(&r), 0.0);

        let disabled = FitnessWeights {
            min_generated: 0,
            ..Default::default()
        };
        r.generated = 0;
        assert_eq!(disabled.fitness(&r), 0.0);
    }
}
