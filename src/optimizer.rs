use crate::error::{EvaluationTimeout, GenomeShapeError, OptimizeError};
use crate::metrics::{FitnessWeights, SimulationResult};
use crate::scenarios::Scenario;
use crate::simulation::{evaluate, SimulationConfig};
use crate::util::Interval;
use crate::Genome;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::time::{Duration, Instant};

mod operators;

/// Durations are never allowed to fall below this, whatever the configured bounds, in s.
const MIN_DURATION_FLOOR: f64 = 0.1;

/// The ChaCha stream reserved for breeding, disjoint from every rollout stream.
const BREEDING_STREAM: u64 = u64::MAX;

/// How parents are chosen from a ranked population.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Selection {
    /// The best of `size` uniformly drawn genomes.
    Tournament { size: usize },
    /// Linear rank weighting: the best genome is `n` times as likely as the worst.
    Rank,
}

/// How two parents are combined into a child.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Crossover {
    /// Each gene is taken from either parent with equal probability.
    Uniform,
    /// Each gene is a random blend of the parents' genes.
    Arithmetic,
    /// Genes before a random cut come from the first parent, the rest from the second.
    SinglePoint,
}

/// Parameters of an optimization.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OptimizerConfig {
    /// The number of genomes per generation.
    pub pop_size: usize,
    /// The number of generations to evolve.
    pub generations: usize,
    /// Bounds on each phase duration, in s.
    pub bounds: Interval,
    /// The per-gene mutation probability.
    pub mutation_rate: f64,
    /// The largest change a mutation makes to a duration, in s.
    pub mutation_delta: f64,
    pub crossover: Crossover,
    /// The probability a child is bred by crossover rather than cloned from one parent.
    pub crossover_rate: f64,
    pub selection: Selection,
    /// The seed from which all randomness of the optimization derives.
    pub seed: u64,
    /// The parameters of every rollout, including the simulated duration.
    pub simulation: SimulationConfig,
    pub fitness: FitnessWeights,
    /// Wall-clock limit. Genomes not yet started when it expires are not evaluated.
    pub time_budget: Option<Duration>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            pop_size: 20,
            generations: 50,
            bounds: Interval::new(5.0, 90.0),
            mutation_rate: 0.1,
            mutation_delta: 10.0,
            crossover: Crossover::Uniform,
            crossover_rate: 0.9,
            selection: Selection::Tournament { size: 3 },
            seed: 42,
            simulation: SimulationConfig::default(),
            fitness: FitnessWeights::default(),
            time_budget: None,
        }
    }
}

impl OptimizerConfig {
    /// Replaces out-of-range values with the nearest valid value.
    pub fn normalized(&self) -> Self {
        let probability = |p: f64| if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 };
        let pop_size = self.pop_size.max(2);
        let generations = self.generations.max(1);
        if generations != self.generations {
            log::warn!("generation count {} raised to {}", self.generations, generations);
        }
        let bounds = self.bounds.normalized(MIN_DURATION_FLOOR);
        if bounds != self.bounds {
            log::warn!("duration bounds {:?} normalized to {:?}", self.bounds, bounds);
        }
        let selection = match self.selection {
            Selection::Tournament { size } => Selection::Tournament {
                size: size.clamp(1, pop_size),
            },
            Selection::Rank => Selection::Rank,
        };
        Self {
            pop_size,
            generations,
            bounds,
            mutation_rate: probability(self.mutation_rate),
            mutation_delta: if self.mutation_delta.is_finite() {
                self.mutation_delta.abs()
            } else {
                0.0
            },
            crossover_rate: probability(self.crossover_rate),
            selection,
            simulation: self.simulation.normalized(),
            ..self.clone()
        }
    }
}

/// A genome with the outcome of its rollout.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Evaluation {
    pub genome: Genome,
    pub fitness: f64,
    pub result: SimulationResult,
}

impl Evaluation {
    /// Orders evaluations best-first: higher fitness, then lower mean wait.
    pub fn rank(a: &Self, b: &Self) -> Ordering {
        b.fitness
            .total_cmp(&a.fitness)
            .then_with(|| a.result.mean_wait.total_cmp(&b.result.mean_wait))
    }

    /// Whether this evaluation ranks strictly ahead of `other`.
    pub fn is_better_than(&self, other: &Self) -> bool {
        Self::rank(self, other) == Ordering::Less
    }
}

/// Summary of one generation.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GenerationStats {
    pub generation: usize,
    pub best: f64,
    pub mean: f64,
    pub worst: f64,
    /// The best fitness seen in this or any earlier generation.
    pub best_ever: f64,
    pub evaluated: usize,
    pub abandoned: usize,
}

/// The outcome of an optimization, ready to be handed to a persistence layer.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OptimizationResult {
    /// The best genome seen in any generation.
    pub genome: Genome,
    pub fitness: f64,
    /// The generation in which `genome` was first evaluated.
    pub generation: usize,
    /// The rollout which produced `fitness`.
    pub result: SimulationResult,
    pub history: Vec<GenerationStats>,
}

/// Evolves phase durations for a scenario with a genetic algorithm.
pub struct Optimizer<'a> {
    scenario: &'a Scenario,
    config: OptimizerConfig,
}

/// The seed of the rollout of genome `index` in generation `generation`.
///
/// Each rollout draws its seed from its own ChaCha stream, so seeds are
/// reproducible and independent of evaluation order.
pub fn rollout_seed(seed: u64, generation: usize, index: usize) -> u64 {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(((generation as u64) << 32) | (index as u64 & 0xffff_ffff));
    rng.next_u64()
}

impl<'a> Optimizer<'a> {
    /// Creates an optimizer. Out-of-range configuration values are normalized.
    pub fn new(scenario: &'a Scenario, config: &OptimizerConfig) -> Self {
        Self {
            scenario,
            config: config.normalized(),
        }
    }

    /// The normalized configuration in use.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Runs every generation and returns the best genome seen.
    pub fn run(&self) -> Result<OptimizationResult, OptimizeError> {
        self.run_with_progress(|_| {})
    }

    /// Like [run](Self::run), calling `progress` after each generation is ranked.
    pub fn run_with_progress(
        &self,
        progress: impl FnMut(&GenerationStats),
    ) -> Result<OptimizationResult, OptimizeError> {
        let deadline = self.config.time_budget.map(|budget| Instant::now() + budget);
        self.evolve(
            &|| deadline.is_some_and(|deadline| Instant::now() >= deadline),
            progress,
        )
    }

    /// The generation loop. `expired` is polled before each rollout starts;
    /// once it returns true, remaining genomes are abandoned and the loop stops
    /// after ranking the current generation.
    fn evolve(
        &self,
        expired: &(impl Fn() -> bool + Sync),
        mut progress: impl FnMut(&GenerationStats),
    ) -> Result<OptimizationResult, OptimizeError> {
        let config = &self.config;
        let genome_len = self.scenario.network.phase_count();

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        rng.set_stream(BREEDING_STREAM);

        let mut population = (0..config.pop_size)
            .map(|_| Genome::random(genome_len, &config.bounds, &mut rng))
            .collect::<Vec<_>>();
        let mut elite: Option<Evaluation> = None;
        let mut best: Option<(Evaluation, usize)> = None;
        let mut history = vec![];

        for generation in 0..config.generations {
            let (mut ranked, abandoned) =
                self.evaluate_generation(generation, &population, elite.take(), expired)?;
            if ranked.is_empty() {
                break;
            }
            ranked.sort_by(Evaluation::rank);

            let leader = &ranked[0];
            if best.as_ref().map_or(true, |(b, _)| leader.is_better_than(b)) {
                best = Some((leader.clone(), generation));
            }

            let stats = GenerationStats {
                generation,
                best: leader.fitness,
                mean: ranked.iter().map(|e| e.fitness).sum::<f64>() / ranked.len() as f64,
                worst: ranked[ranked.len() - 1].fitness,
                best_ever: best.as_ref().map_or(leader.fitness, |(b, _)| b.fitness),
                evaluated: ranked.len(),
                abandoned,
            };
            log::info!(
                "generation {}/{}: best {:.3}, best ever {:.3}",
                generation + 1,
                config.generations,
                stats.best,
                stats.best_ever
            );
            progress(&stats);
            history.push(stats);

            if abandoned > 0 {
                log::warn!("time budget exhausted after generation {}", generation);
                break;
            }

            population = self.breed(&ranked, &mut rng);
            elite = Some(ranked.swap_remove(0));
        }

        let (best, generation) = best.ok_or(OptimizeError::NoEvaluations)?;
        Ok(OptimizationResult {
            genome: best.genome,
            fitness: best.fitness,
            generation,
            result: best.result,
            history,
        })
    }

    /// Evaluates a generation in parallel. The elite, if any, sits at index 0 and
    /// keeps its previous evaluation. Returns the evaluations and the number of
    /// genomes abandoned because `expired` returned true before they started.
    fn evaluate_generation(
        &self,
        generation: usize,
        population: &[Genome],
        elite: Option<Evaluation>,
        expired: &(impl Fn() -> bool + Sync),
    ) -> Result<(Vec<Evaluation>, usize), GenomeShapeError> {
        let results = population
            .par_iter()
            .enumerate()
            .map(|(index, genome)| {
                if let (0, Some(elite)) = (index, &elite) {
                    return Some(Ok(elite.clone()));
                }
                if expired() {
                    log::warn!("{}", EvaluationTimeout { generation, index });
                    return None;
                }
                let seed = rollout_seed(self.config.seed, generation, index);
                Some(self.evaluate(genome, seed))
            })
            .collect::<Vec<_>>();

        let abandoned = results.iter().filter(|r| r.is_none()).count();
        let evaluated = results.into_iter().flatten().collect::<Result<Vec<_>, _>>()?;
        Ok((evaluated, abandoned))
    }

    /// Runs one rollout and scores it.
    pub fn evaluate(&self, genome: &Genome, seed: u64) -> Result<Evaluation, GenomeShapeError> {
        let result = evaluate(self.scenario, &self.config.simulation, genome, seed)?;
        Ok(Evaluation {
            genome: genome.clone(),
            fitness: self.config.fitness.fitness(&result),
            result,
        })
    }

    /// Produces the next population: the best genome unchanged, then bred children.
    fn breed(&self, ranked: &[Evaluation], rng: &mut ChaCha8Rng) -> Vec<Genome> {
        let config = &self.config;
        let mut next = Vec::with_capacity(config.pop_size);
        next.push(ranked[0].genome.clone());

        while next.len() < config.pop_size {
            let a = &operators::select(config.selection, ranked, rng).genome;
            let b = &operators::select(config.selection, ranked, rng).genome;
            let mut child = if rng.gen_bool(config.crossover_rate) {
                operators::crossover(config.crossover, a, b, rng)
            } else {
                a.clone()
            };
            operators::mutate(&mut child, config.mutation_rate, config.mutation_delta, rng);
            next.push(child.clamped(&config.bounds));
        }
        next
    }
}
