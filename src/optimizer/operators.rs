//! Selection, crossover and mutation.

use super::{Crossover, Evaluation, Selection};
use crate::Genome;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

/// Picks a parent from a population ranked best-first.
pub(crate) fn select<'a>(
    strategy: Selection,
    ranked: &'a [Evaluation],
    rng: &mut impl Rng,
) -> &'a Evaluation {
    let idx = match strategy {
        Selection::Tournament { size } => (0..size.max(1))
            .map(|_| rng.gen_range(0..ranked.len()))
            .min()
            .unwrap_or(0),
        Selection::Rank => rank_index(ranked.len(), rng),
    };
    &ranked[idx]
}

/// Samples an index with linearly decreasing weight: the best of `n` has weight `n`, the worst 1.
fn rank_index(n: usize, rng: &mut impl Rng) -> usize {
    WeightedIndex::new((1..=n).rev())
        .map(|weights| weights.sample(rng))
        .unwrap_or(0)
}

/// Combines two parents gene by gene.
pub(crate) fn crossover(strategy: Crossover, a: &Genome, b: &Genome, rng: &mut impl Rng) -> Genome {
    let (a, b) = (a.durations(), b.durations());
    let durations = match strategy {
        Crossover::Uniform => a
            .iter()
            .zip(b)
            .map(|(x, y)| if rng.gen_bool(0.5) { *x } else { *y })
            .collect(),
        Crossover::Arithmetic => a
            .iter()
            .zip(b)
            .map(|(x, y)| {
                let alpha: f64 = rng.gen();
                alpha * x + (1.0 - alpha) * y
            })
            .collect(),
        Crossover::SinglePoint => {
            if a.len() < 2 {
                a.to_vec()
            } else {
                let cut = rng.gen_range(1..a.len());
                a[..cut].iter().chain(&b[cut..]).copied().collect()
            }
        }
    };
    Genome::new(durations)
}

/// Perturbs each gene with probability `rate` by a uniform delta in `[-max_delta, max_delta]`.
pub(crate) fn mutate(genome: &mut Genome, rate: f64, max_delta: f64, rng: &mut impl Rng) {
    for gene in genome.durations_mut() {
        if rng.gen_bool(rate) {
            *gene += rng.gen_range(-max_delta..=max_delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimulationResult;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ranked(n: usize) -> Vec<Evaluation> {
        (0..n)
            .map(|i| Evaluation {
                genome: Genome::new(vec![i as f64]),
                fitness: -(i as f64),
                result: SimulationResult {
                    completed: 0,
                    generated: 0,
                    dropped: 0,
                    mean_wait: 0.0,
                    collision_detected: false,
                    ticks: 0,
                    elapsed: 0.0,
                },
            })
            .collect()
    }

    #[test]
    fn tournament_favours_the_best() {
        let pop = ranked(10);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut counts = [0usize; 10];
        for _ in 0..2000 {
            let pick = select(Selection::Tournament { size: 3 }, &pop, &mut rng);
            counts[pick.genome.durations()[0] as usize] += 1;
        }
        assert!(counts[0] > counts[9]);
        assert!(counts[0] > counts[5]);
    }

    #[test]
    fn rank_selection_covers_population() {
        let pop = ranked(5);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut counts = [0usize; 5];
        for _ in 0..3000 {
            let pick = select(Selection::Rank, &pop, &mut rng);
            counts[pick.genome.durations()[0] as usize] += 1;
        }
        assert!(counts.iter().all(|c| *c > 0));
        assert!(counts[0] > counts[4]);
        // Expected shares 5:4:3:2:1 of 3000.
        assert!((800..1200).contains(&counts[0]));
        assert!((100..300).contains(&counts[4]));
    }

    #[test]
    fn children_take_genes_from_parents() {
        let a = Genome::new(vec![10.0; 6]);
        let b = Genome::new(vec![20.0; 6]);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        for strategy in [Crossover::Uniform, Crossover::SinglePoint] {
            let child = crossover(strategy, &a, &b, &mut rng);
            assert_eq!(child.len(), 6);
            assert!(child.durations().iter().all(|d| *d == 10.0 || *d == 20.0));
        }

        let child = crossover(Crossover::SinglePoint, &a, &b, &mut rng);
        assert_eq!(child.durations()[0], 10.0);
        assert_eq!(child.durations()[5], 20.0);

        let child = crossover(Crossover::Arithmetic, &a, &b, &mut rng);
        assert!(child.durations().iter().all(|d| (10.0..=20.0).contains(d)));
    }

    #[test]
    fn mutation_is_bounded() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut genome = Genome::new(vec![50.0; 100]);
        mutate(&mut genome, 1.0, 10.0, &mut rng);
        assert!(genome.durations().iter().all(|d| (40.0..=60.0).contains(d)));

        let mut genome = Genome::new(vec![50.0; 100]);
        mutate(&mut genome, 0.0, 10.0, &mut rng);
        assert!(genome.durations().iter().all(|d| *d == 50.0));
    }
}
