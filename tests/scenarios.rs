//! Rollouts on every built-in network.

use signal_ga::{evaluate, scenarios, Genome, Simulation, SimulationConfig};

#[test]
fn every_scenario_runs_deterministically() {
    let config = SimulationConfig::default();
    for scenario in scenarios::all(0.2) {
        let genome = Genome::new(vec![15.0; scenario.network.phase_count()]);
        let a = evaluate(&scenario, &config, &genome, 3).unwrap();
        let b = evaluate(&scenario, &config, &genome, 3).unwrap();
        assert_eq!(a, b, "{}", scenario.name);
        assert!(a.ticks >= 1 && a.ticks <= config.max_ticks(), "{}", scenario.name);
        assert!(a.generated > 0, "{}", scenario.name);
        assert!(a.completed <= a.generated, "{}", scenario.name);
    }
}

#[test]
fn t_junction_cycles_three_phases() {
    let scenario = scenarios::t_junction(0.0);
    let genome = Genome::new(vec![5.0, 10.0, 15.0]);
    let sim = Simulation::new(&scenario, &SimulationConfig::default(), &genome, 1).unwrap();

    let mut phases = vec![];
    let result = sim.run_observed(|snapshot| phases.push(snapshot.signals[0].phase));

    // 0.5 s ticks: 10, 20 and 30 ticks per phase, 60 per cycle.
    assert_eq!(result.ticks, 120);
    assert_eq!(phases[8], 0);
    assert_eq!(phases[9], 1);
    assert_eq!(phases[28], 1);
    assert_eq!(phases[29], 2);
    assert_eq!(phases[58], 2);
    assert_eq!(phases[59], 0);
    assert_eq!(phases[69], 1);
}

#[test]
fn t_junction_southern_arm_waits_for_its_phase() {
    let scenario = scenarios::t_junction(0.3);
    let network = &scenario.network;
    let south = network.iter_intersections().next().unwrap().lane_groups()[2].links()[0];
    // The southern arm's phase comes last, after 40 s of east-west green.
    let genome = Genome::new(vec![20.0, 20.0, 20.0]);
    let mut sim = Simulation::new(&scenario, &SimulationConfig::default(), &genome, 9).unwrap();

    for _ in 0..80 {
        sim.step();
        assert!(!sim.has_right_of_way(south));
        assert!(sim
            .link_vehicles(south)
            .all(|v| v.pos_front() <= network.link(south).length()));
    }
    sim.step();
    assert!(sim.has_right_of_way(south));
}

#[test]
fn optimizer_handles_odd_phase_counts() {
    let scenario = scenarios::arterial_three(0.1);
    let config = signal_ga::OptimizerConfig {
        pop_size: 4,
        generations: 2,
        seed: 3,
        ..Default::default()
    };
    let result = signal_ga::Optimizer::new(&scenario, &config).run().unwrap();
    assert_eq!(result.genome.len(), 10);
}
