use crate::vehicle::VehicleAttributes;
use crate::{LinkId, Network, RouteId};
use rand::distributions::WeightedIndex;
use rand::Rng;
use rand_distr::{Bernoulli, Distribution, Normal};
use smallvec::SmallVec;

/// The smallest and largest factor applied to a vehicle's desired speed.
const SPEED_FACTOR_RANGE: (f64, f64) = (0.75, 1.25);

/// Vehicle arrival configuration.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeneratorConfig {
    /// The per-tick arrival probability for entry links not listed in `rates`.
    pub default_rate: f64,
    /// Per-tick arrival probabilities for specific entry links.
    pub rates: Vec<(LinkId, f64)>,
    /// The attributes of generated vehicles.
    pub vehicle: VehicleAttributes,
    /// The standard deviation of the desired speed factor; 0 disables variation.
    pub speed_stddev: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            default_rate: 0.1,
            rates: vec![],
            vehicle: VehicleAttributes::default(),
            speed_stddev: 0.0,
        }
    }
}

impl GeneratorConfig {
    /// The configured arrival probability for an entry link.
    pub fn rate_for(&self, link: LinkId) -> f64 {
        self.rates
            .iter()
            .find(|(id, _)| *id == link)
            .map(|(_, rate)| *rate)
            .unwrap_or(self.default_rate)
    }
}

/// A vehicle requested by the generator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Arrival {
    /// The entry link.
    pub link: LinkId,
    /// The chosen route, which starts on `link`.
    pub route: RouteId,
    /// The desired speed of the new vehicle in m/s.
    pub speed: f64,
}

/// A stochastic source of vehicles at the network's entry links.
///
/// The generator owns no randomness of its own; every draw comes from the
/// generator passed to [generate](Self::generate), so a run is reproducible from its seed.
#[derive(Clone, Debug)]
pub struct VehicleGenerator {
    entries: Vec<Entry>,
    vehicle: VehicleAttributes,
    speed_factor: Option<Normal<f64>>,
}

#[derive(Clone, Debug)]
struct Entry {
    link: LinkId,
    /// `None` if the configured rate is not a probability, in which case nothing arrives.
    arrival: Option<Bernoulli>,
    routes: SmallVec<[RouteId; 4]>,
    /// `None` if every route weight is zero, in which case routes are chosen uniformly.
    choice: Option<WeightedIndex<f64>>,
}

impl VehicleGenerator {
    /// Creates a generator for every entry link of the network.
    pub fn new(network: &Network, config: &GeneratorConfig) -> Self {
        let entries = network
            .entries()
            .iter()
            .map(|(link, routes)| {
                let rate = config.rate_for(*link);
                let arrival = Bernoulli::new(rate).ok();
                if arrival.is_none() {
                    log::warn!("entry {:?} has invalid arrival rate {}, disabled", link, rate);
                }
                let weights = routes.iter().map(|id| network.route(*id).weight());
                Entry {
                    link: *link,
                    arrival,
                    routes: routes.clone(),
                    choice: WeightedIndex::new(weights).ok(),
                }
            })
            .collect();

        let speed_factor = if config.speed_stddev > 0.0 {
            Normal::new(1.0, config.speed_stddev).ok()
        } else {
            None
        };

        Self {
            entries,
            vehicle: config.vehicle,
            speed_factor,
        }
    }

    /// The attributes shared by all generated vehicles.
    pub fn vehicle(&self) -> &VehicleAttributes {
        &self.vehicle
    }

    /// Draws this tick's arrivals, in entry order.
    pub fn generate(&self, rng: &mut impl Rng) -> SmallVec<[Arrival; 4]> {
        let mut arrivals = SmallVec::new();
        for entry in &self.entries {
            let Some(arrival) = &entry.arrival else {
                continue;
            };
            if !arrival.sample(rng) || entry.routes.is_empty() {
                continue;
            }
            let route_idx = match &entry.choice {
                Some(choice) => choice.sample(rng),
                None => rng.gen_range(0..entry.routes.len()),
            };
            let factor = match &self.speed_factor {
                Some(distr) => distr
                    .sample(rng)
                    .clamp(SPEED_FACTOR_RANGE.0, SPEED_FACTOR_RANGE.1),
                None => 1.0,
            };
            arrivals.push(Arrival {
                link: entry.link,
                route: entry.routes[route_idx],
                speed: self.vehicle.speed * factor,
            });
        }
        arrivals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn same_seed_same_arrivals() {
        let scenario = scenarios::corridor(0.3);
        let generator = VehicleGenerator::new(&scenario.network, &scenario.generator);
        let mut a = ChaCha8Rng::seed_from_u64(11);
        let mut b = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..200 {
            assert_eq!(generator.generate(&mut a), generator.generate(&mut b));
        }
    }

    #[test]
    fn routes_start_on_their_entry() {
        let scenario = scenarios::corridor(1.0);
        let generator = VehicleGenerator::new(&scenario.network, &scenario.generator);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let arrivals = generator.generate(&mut rng);
        assert_eq!(arrivals.len(), scenario.network.entries().len());
        for arrival in arrivals {
            let route = scenario.network.route(arrival.route);
            assert_eq!(route.links()[0], arrival.link);
        }
    }

    #[test]
    fn zero_rate_generates_nothing() {
        let mut scenario = scenarios::corridor(0.0);
        scenario.generator.default_rate = 0.0;
        let generator = VehicleGenerator::new(&scenario.network, &scenario.generator);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert!((0..100).all(|_| generator.generate(&mut rng).is_empty()));
    }

    #[test]
    fn invalid_rate_disables_entry() {
        let mut scenario = scenarios::corridor(0.5);
        scenario.generator.default_rate = 7.0;
        let generator = VehicleGenerator::new(&scenario.network, &scenario.generator);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert!((0..100).all(|_| generator.generate(&mut rng).is_empty()));
    }

    #[test]
    fn speed_variation_is_clamped() {
        let mut scenario = scenarios::corridor(1.0);
        scenario.generator.speed_stddev = 2.0;
        let generator = VehicleGenerator::new(&scenario.network, &scenario.generator);
        let base = scenario.generator.vehicle.speed;
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..50 {
            for arrival in generator.generate(&mut rng) {
                assert!(arrival.speed >= 0.75 * base - 1e-9);
                assert!(arrival.speed <= 1.25 * base + 1e-9);
            }
        }
    }
}
