use crate::error::GenomeShapeError;
use crate::generator::{Arrival, VehicleGenerator};
use crate::metrics::{MetricsCollector, SimulationResult};
use crate::network::Link;
use crate::scenarios::Scenario;
use crate::signal::SignalController;
use crate::{Genome, LinkId, Network, Vehicle, VehicleId, VehicleSet};
use cgmath::MetricSpace;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use slotmap::SecondaryMap;
use std::collections::VecDeque;

pub use snapshot::{SignalSnapshot, Snapshot, VehicleSnapshot};

mod snapshot;

/// Overlap tolerated between consecutive vehicles before it counts as a collision, in m.
const OVERLAP_TOLERANCE: f64 = 1e-6;

/// Parameters of a simulation run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulationConfig {
    /// The tick duration in s.
    pub dt: f64,
    /// The simulated run duration in s.
    pub duration: f64,
    /// Phase durations below this are raised to it before the run starts, in s.
    pub min_phase_duration: f64,
    /// The minimum bumper-to-bumper gap between queued vehicles in m.
    pub min_gap: f64,
    /// Distance before a red stop line at which vehicles slow down, in m.
    pub slow_distance: f64,
    /// The fraction of their speed vehicles keep inside the slow zone.
    pub slow_factor: f64,
    /// Vehicles on crossing links closer than this have collided, in m.
    pub collision_radius: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt: 0.5,
            duration: 60.0,
            min_phase_duration: 5.0,
            min_gap: 2.5,
            slow_distance: 30.0,
            slow_factor: 0.4,
            collision_radius: 3.0,
        }
    }
}

impl SimulationConfig {
    /// Replaces out-of-range values with defaults or the nearest valid value.
    pub fn normalized(&self) -> Self {
        let default = Self::default();
        let positive_or = |value: f64, fallback: f64| {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                fallback
            }
        };
        let non_negative = |value: f64| if value.is_finite() { value.max(0.0) } else { 0.0 };
        Self {
            dt: positive_or(self.dt, default.dt),
            duration: non_negative(self.duration),
            min_phase_duration: positive_or(self.min_phase_duration, default.min_phase_duration),
            min_gap: non_negative(self.min_gap),
            slow_distance: non_negative(self.slow_distance),
            slow_factor: if self.slow_factor.is_finite() {
                self.slow_factor.clamp(0.0, 1.0)
            } else {
                default.slow_factor
            },
            collision_radius: non_negative(self.collision_radius),
        }
    }

    /// The number of ticks after which the simulated time reaches the run duration.
    pub fn max_ticks(&self) -> usize {
        (self.duration / self.dt).ceil() as usize
    }
}

/// A single rollout: one genome simulated on one network with one seed.
///
/// All mutable state (vehicles, signal states, randomness) is owned by the
/// simulation, so independent simulations may share a [Network] across threads.
pub struct Simulation<'a> {
    /// The road network.
    network: &'a Network,
    /// The run parameters.
    config: SimulationConfig,
    /// The source of new vehicles.
    generator: VehicleGenerator,
    /// One signal controller per intersection, in phase enumeration order.
    signals: Vec<SignalController>,
    /// Whether each link may currently discharge at its stop line.
    green: SecondaryMap<LinkId, bool>,
    /// The vehicles on each link, lead vehicle first.
    lanes: SecondaryMap<LinkId, VecDeque<VehicleId>>,
    /// The vehicles being simulated.
    vehicles: VehicleSet,
    /// The run's only source of randomness.
    rng: ChaCha8Rng,
    metrics: MetricsCollector,
    /// The number of ticks simulated.
    tick: usize,
    /// The next vehicle sequence number.
    seq: usize,
}

/// Simulates `genome` on the scenario until the configured duration elapses or a collision occurs.
pub fn evaluate(
    scenario: &Scenario,
    config: &SimulationConfig,
    genome: &Genome,
    seed: u64,
) -> Result<SimulationResult, GenomeShapeError> {
    let result = Simulation::new(scenario, config, genome, seed)?.run();
    log::debug!(
        "rollout {:?} seed={} completed={} mean_wait={:.2} collision={}",
        genome,
        seed,
        result.completed,
        result.mean_wait,
        result.collision_detected
    );
    Ok(result)
}

impl<'a> Simulation<'a> {
    /// Creates a simulation at tick 0. Phase durations are normalized to the
    /// configured minimum before the first tick.
    pub fn new(
        scenario: &'a Scenario,
        config: &SimulationConfig,
        genome: &Genome,
        seed: u64,
    ) -> Result<Self, GenomeShapeError> {
        let network = &scenario.network;
        genome.check_shape(network)?;
        let config = config.normalized();
        let genome = genome.normalized(config.min_phase_duration);

        let signals = network
            .phase_ranges()
            .iter()
            .map(|(id, range)| SignalController::new(*id, &genome.durations()[range.clone()]))
            .collect();

        let mut green = SecondaryMap::new();
        let mut lanes = SecondaryMap::new();
        for link in network.iter_links() {
            green.insert(link.id(), true);
            lanes.insert(link.id(), VecDeque::new());
        }

        Ok(Self {
            network,
            generator: VehicleGenerator::new(network, &scenario.generator),
            config,
            signals,
            green,
            lanes,
            vehicles: VehicleSet::with_key(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            metrics: MetricsCollector::new(),
            tick: 0,
            seq: 0,
        })
    }

    /// Advances the simulation by one tick. Does nothing once the run is finished.
    pub fn step(&mut self) {
        if self.is_finished() {
            return;
        }
        self.update_signals();
        self.generate_vehicles();
        self.move_vehicles();
        self.detect_collisions();
        self.tick += 1;
    }

    /// Whether the run duration has elapsed or a collision has occurred.
    pub fn is_finished(&self) -> bool {
        self.metrics.collision_detected() || self.tick >= self.config.max_ticks()
    }

    /// Runs to completion.
    pub fn run(mut self) -> SimulationResult {
        while !self.is_finished() {
            self.step();
        }
        self.result()
    }

    /// Runs to completion, passing a snapshot of the state to `observer` after each tick.
    pub fn run_observed(mut self, mut observer: impl FnMut(&Snapshot)) -> SimulationResult {
        while !self.is_finished() {
            self.step();
            observer(&self.snapshot());
        }
        self.result()
    }

    /// The statistics of the run so far.
    pub fn result(&self) -> SimulationResult {
        self.metrics.finish(
            self.vehicles.values().map(|v| v.wait_time()),
            self.tick,
            self.time(),
        )
    }

    /// Gets the number of ticks simulated.
    pub fn tick(&self) -> usize {
        self.tick
    }

    /// Gets the simulated time in s.
    pub fn time(&self) -> f64 {
        self.tick as f64 * self.config.dt
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn network(&self) -> &Network {
        self.network
    }

    /// The signal controllers, in phase enumeration order.
    pub fn signals(&self) -> &[SignalController] {
        &self.signals
    }

    /// Returns an iterator over all the vehicles in the simulation.
    pub fn iter_vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    /// Gets a reference to the vehicle with the given ID, if it is still in the network.
    pub fn get_vehicle(&self, vehicle_id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(vehicle_id)
    }

    /// The vehicles on a link, lead vehicle first.
    pub fn link_vehicles(&self, link_id: LinkId) -> impl Iterator<Item = &Vehicle> {
        self.lanes[link_id].iter().map(|id| &self.vehicles[*id])
    }

    /// Whether vehicles on the link may currently pass its stop line.
    pub fn has_right_of_way(&self, link_id: LinkId) -> bool {
        self.green[link_id]
    }

    /// Records which lane groups have right-of-way this tick, then advances the signals.
    fn update_signals(&mut self) {
        for signal in &mut self.signals {
            let intersection = self.network.intersection(signal.intersection());
            let phase = intersection.phase(signal.phase());
            for (group_idx, group) in intersection.lane_groups().iter().enumerate() {
                let green = phase.contains(&group_idx);
                for link_id in group.links() {
                    self.green[*link_id] = green;
                }
            }
            signal.advance(self.config.dt);
        }
    }

    /// Admits this tick's arrivals; arrivals at a full entry link are dropped.
    fn generate_vehicles(&mut self) {
        let arrivals = self.generator.generate(&mut self.rng);
        for arrival in arrivals {
            match self.entry_limit(arrival.link) {
                Some(limit) if limit >= 0.0 => self.add_vehicle(&arrival),
                _ => self.metrics.record_dropped(),
            }
        }
    }

    /// Adds a vehicle at the start of its entry link.
    fn add_vehicle(&mut self, arrival: &Arrival) {
        let attributes = *self.generator.vehicle();
        let seq = self.seq;
        let vehicle_id = self.vehicles.insert_with_key(|id| {
            let mut vehicle = Vehicle::new(id, seq, &attributes, arrival.route, arrival.link);
            vehicle.set_speed(arrival.speed);
            vehicle
        });
        self.lanes[arrival.link].push_back(vehicle_id);
        self.seq += 1;
        self.metrics.record_generated();
    }

    /// The furthest position a vehicle entering the link may occupy,
    /// or `None` if the link is at capacity.
    fn entry_limit(&self, link_id: LinkId) -> Option<f64> {
        let link = self.network.link(link_id);
        let lane = &self.lanes[link_id];
        if lane.len() >= link.capacity() {
            return None;
        }
        let limit = lane
            .back()
            .map(|id| self.vehicles[*id].pos_rear() - self.config.min_gap)
            .unwrap_or(f64::INFINITY);
        Some(f64::min(limit, link.length()))
    }

    /// The furthest position the lead vehicle of a link may reach this tick,
    /// and whether it may leave the link.
    fn exit_limit(&self, link: &Link, vehicle: &Vehicle) -> (f64, bool) {
        let length = link.length();
        if !self.green[link.id()] {
            return (length, false);
        }
        match vehicle.next_link(self.network) {
            None => (f64::INFINITY, true),
            Some(next) => match self.entry_limit(next) {
                Some(limit) if limit >= 0.0 => (length + limit, true),
                _ => (length, false),
            },
        }
    }

    /// Moves every vehicle once, link by link, lead vehicle first, so that each
    /// vehicle is limited by the already-moved vehicle ahead of it.
    fn move_vehicles(&mut self) {
        let network = self.network;
        for link in network.iter_links() {
            let mut idx = 0;
            let mut leader_rear: Option<f64> = None;

            while let Some(&vehicle_id) = self.lanes[link.id()].get(idx) {
                let vehicle = &self.vehicles[vehicle_id];

                // Vehicles which crossed onto this link have already moved this tick.
                if vehicle.moved_in(self.tick) {
                    leader_rear = Some(vehicle.pos_rear());
                    idx += 1;
                    continue;
                }

                let (limit, may_exit) = match leader_rear {
                    Some(rear) => (rear - self.config.min_gap, false),
                    None => self.exit_limit(link, vehicle),
                };
                let target = vehicle.pos_front() + self.travel_distance(link, vehicle);

                let vehicle = &mut self.vehicles[vehicle_id];
                vehicle.drive(target, limit, self.config.dt, self.tick);

                if may_exit && vehicle.pos_front() >= link.length() {
                    self.leave_link(vehicle_id, link);
                } else {
                    leader_rear = Some(vehicle.pos_rear());
                    idx += 1;
                }
            }
        }
    }

    /// The distance a vehicle would cover this tick if unobstructed.
    fn travel_distance(&self, link: &Link, vehicle: &Vehicle) -> f64 {
        let mut speed = f64::min(vehicle.speed(), link.speed_limit());
        let to_stop_line = link.length() - vehicle.pos_front();
        if !self.green[link.id()] && to_stop_line <= self.config.slow_distance {
            speed *= self.config.slow_factor;
        }
        speed * self.config.dt
    }

    /// Moves the lead vehicle of a link onto the next link of its route,
    /// or removes it from the simulation at the end of its route.
    fn leave_link(&mut self, vehicle_id: VehicleId, link: &Link) {
        self.lanes[link.id()].pop_front();
        let vehicle = &mut self.vehicles[vehicle_id];
        match vehicle.next_link(self.network) {
            Some(next) => {
                vehicle.enter_next_link(next, link.length());
                self.lanes[next].push_back(vehicle_id);
            }
            None => {
                vehicle.complete();
                self.metrics.record_completed(vehicle.wait_time());
                self.vehicles.remove(vehicle_id);
            }
        }
    }

    /// Flags a collision if vehicles overlap on a link, or if vehicles on
    /// crossing links are within the collision radius of each other.
    fn detect_collisions(&mut self) {
        if self.find_overlap() || self.find_crossing_collision() {
            self.metrics.record_collision();
        }
    }

    fn find_overlap(&self) -> bool {
        for (link_id, lane) in &self.lanes {
            let overlap = lane
                .iter()
                .zip(lane.iter().skip(1))
                .map(|(lead, follower)| (&self.vehicles[*lead], &self.vehicles[*follower]))
                .find(|(lead, follower)| follower.pos_front() > lead.pos_rear() + OVERLAP_TOLERANCE);
            if let Some((lead, follower)) = overlap {
                log::trace!(
                    "tick {}: {:?} overlaps {:?} on {:?}",
                    self.tick,
                    follower.id(),
                    lead.id(),
                    link_id
                );
                return true;
            }
        }
        false
    }

    fn find_crossing_collision(&self) -> bool {
        for conflict in self.network.link_conflicts() {
            let [a, b] = conflict.links;
            for va in self.link_vehicles(a) {
                let pa = self.network.link(a).sample(va.pos_mid());
                for vb in self.link_vehicles(b) {
                    let pb = self.network.link(b).sample(vb.pos_mid());
                    if pa.distance(pb) < self.config.collision_radius {
                        log::trace!(
                            "tick {}: {:?} on {:?} collided with {:?} on {:?}",
                            self.tick,
                            va.id(),
                            a,
                            vb.id(),
                            b
                        );
                        return true;
                    }
                }
            }
        }
        false
    }
}
