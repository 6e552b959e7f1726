use std::time::Instant;

use signal_ga::{scenarios, Optimizer, OptimizerConfig};

fn main() {
    env_logger::init();

    let scenario = scenarios::corridor(0.1);
    let config = OptimizerConfig::default();
    let optimizer = Optimizer::new(&scenario, &config);

    println!(
        "Optimizing {} ({} phases, population {}, {} generations)...",
        scenario.name,
        scenario.network.phase_count(),
        config.pop_size,
        config.generations
    );
    let start = Instant::now();
    let result = optimizer.run_with_progress(|stats| {
        println!(
            "Gen {:>3}: best {:>9.3}  mean {:>9.3}  worst {:>9.3}",
            stats.generation, stats.best, stats.mean, stats.worst
        )
    });

    match result {
        Ok(result) => {
            println!("Finished in {:?}", start.elapsed());
            println!("Best genome: {:?} (generation {})", result.genome, result.generation);
            println!(
                "Fitness {:.3}: {} completed, mean wait {:.2} s, collision {}",
                result.fitness,
                result.result.completed,
                result.result.mean_wait,
                result.result.collision_detected
            );
        }
        Err(err) => {
            eprintln!("Optimization failed: {}", err);
            std::process::exit(1);
        }
    }
}
