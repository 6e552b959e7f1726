use crate::error::GenomeShapeError;
use crate::util::Interval;
use crate::Network;
use rand::Rng;
use std::fmt;

/// Phase durations for every intersection, flattened in the network's phase enumeration order.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Genome {
    durations: Vec<f64>,
}

impl Genome {
    /// Creates a genome from raw durations. No clamping is applied.
    pub fn new(durations: Vec<f64>) -> Self {
        Self { durations }
    }

    /// Samples a genome with each duration uniform within `bounds`.
    pub fn random(len: usize, bounds: &Interval, rng: &mut impl Rng) -> Self {
        let durations = (0..len)
            .map(|_| {
                if bounds.length() > 0.0 {
                    rng.gen_range(bounds.min..=bounds.max)
                } else {
                    bounds.min
                }
            })
            .collect();
        Self { durations }
    }

    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    /// Raises every duration below `min_duration` (including non-finite ones) to `min_duration`.
    pub fn normalized(&self, min_duration: f64) -> Self {
        let durations = self
            .durations
            .iter()
            .map(|&d| if d.is_finite() && d >= min_duration { d } else { min_duration })
            .collect();
        Self { durations }
    }

    /// Clamps every duration into `bounds`.
    pub fn clamped(&self, bounds: &Interval) -> Self {
        Self {
            durations: self.durations.iter().map(|&d| bounds.clamp(d)).collect(),
        }
    }

    /// Checks that the genome has one duration per phase of the network.
    pub fn check_shape(&self, network: &Network) -> Result<(), GenomeShapeError> {
        let expected = network.phase_count();
        if self.len() == expected {
            Ok(())
        } else {
            Err(GenomeShapeError {
                expected,
                actual: self.len(),
            })
        }
    }

    pub(crate) fn durations_mut(&mut self) -> &mut [f64] {
        &mut self.durations
    }
}

impl From<Vec<f64>> for Genome {
    fn from(durations: Vec<f64>) -> Self {
        Self::new(durations)
    }
}

impl fmt::Debug for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Genome[")?;
        for (i, d) in self.durations.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:.1}", d)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn normalization_raises_non_positive_genes() {
        let genome = Genome::new(vec![0.0, -4.0, 12.0, f64::NAN, 3.0]);
        let normalized = genome.normalized(5.0);
        assert_eq!(normalized.durations(), &[5.0, 5.0, 12.0, 5.0, 5.0]);
        assert!(normalized.durations().iter().all(|d| *d >= 5.0));
    }

    #[test]
    fn clamping_respects_both_bounds() {
        let genome = Genome::new(vec![1.0, 50.0, 400.0]);
        let clamped = genome.clamped(&Interval::new(5.0, 90.0));
        assert_eq!(clamped.durations(), &[5.0, 50.0, 90.0]);
    }

    #[test]
    fn random_genomes_lie_within_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let bounds = Interval::new(5.0, 90.0);
        for _ in 0..50 {
            let genome = Genome::random(8, &bounds, &mut rng);
            assert_eq!(genome.len(), 8);
            assert!(genome.durations().iter().all(|d| bounds.contains(*d)));
        }
    }
}
