//! Whole optimizations on the built-in scenarios.

use signal_ga::{
    scenarios, Crossover, Interval, Optimizer, OptimizerConfig, Selection,
    SimulationConfig,
};

fn config() -> OptimizerConfig {
    OptimizerConfig {
        pop_size: 20,
        generations: 10,
        seed: 7,
        ..Default::default()
    }
}

#[test]
fn same_seed_same_optimum() {
    let scenario = scenarios::corridor(0.1);
    let a = Optimizer::new(&scenario, &config()).run().unwrap();
    let b = Optimizer::new(&scenario, &config()).run().unwrap();
    assert_eq!(a.genome, b.genome);
    assert_eq!(a.fitness, b.fitness);
    assert_eq!(a.history, b.history);
}

#[test]
fn best_fitness_never_regresses() {
    let scenario = scenarios::corridor(0.2);
    let result = Optimizer::new(&scenario, &config()).run().unwrap();
    assert_eq!(result.history.len(), 10);
    for pair in result.history.windows(2) {
        assert!(pair[1].best >= pair[0].best);
        assert!(pair[1].best_ever >= pair[0].best_ever);
    }
    for stats in &result.history {
        assert!(stats.worst <= stats.mean + 1e-9 && stats.mean <= stats.best + 1e-9);
        assert_eq!(stats.evaluated, 20);
        assert_eq!(stats.abandoned, 0);
    }
    assert_eq!(result.genome.len(), 4);
    assert!(result.genome.durations().iter().all(|d| (5.0..=90.0).contains(d)));
}

#[test]
fn every_operator_combination_runs() {
    let scenario = scenarios::four_way(0.1);
    for selection in [Selection::Tournament { size: 2 }, Selection::Rank] {
        for crossover in [Crossover::Uniform, Crossover::Arithmetic, Crossover::SinglePoint] {
            let config = OptimizerConfig {
                pop_size: 6,
                generations: 3,
                bounds: Interval::new(10.0, 40.0),
                selection,
                crossover,
                simulation: SimulationConfig {
                    duration: 30.0,
                    ..Default::default()
                },
                ..config()
            };
            let result = Optimizer::new(&scenario, &config).run().unwrap();
            assert_eq!(result.history.len(), 3);
            assert!(result.genome.durations().iter().all(|d| (10.0..=40.0).contains(d)));
        }
    }
}

#[cfg(feature = "serde")]
#[test]
fn result_serializes_to_json() {
    let scenario = scenarios::corridor(0.1);
    let config = OptimizerConfig {
        pop_size: 4,
        generations: 2,
        ..config()
    };
    let result = Optimizer::new(&scenario, &config).run().unwrap();
    let json = serde_json::to_string(&result).unwrap();
    let back: signal_ga::OptimizationResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back.genome.len(), result.genome.len());
    assert_eq!(back.generation, result.generation);
    assert_eq!(back.history.len(), 2);
}
