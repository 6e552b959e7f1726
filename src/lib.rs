//! Traffic signal timing search: a deterministic, time-stepped traffic
//! microsimulation and a genetic optimizer which evolves phase durations
//! against it.

pub use error::{EvaluationTimeout, GenomeShapeError, InvalidTopologyError, OptimizeError};
pub use generator::{GeneratorConfig, VehicleGenerator};
pub use genome::Genome;
pub use metrics::{FitnessWeights, MetricsCollector, SimulationResult};
pub use network::{
    Endpoint, Intersection, IntersectionAttributes, LaneGroup, Link, LinkAttributes, Network,
    NetworkBuilder, Route,
};
pub use optimizer::{
    Crossover, Evaluation, GenerationStats, OptimizationResult, Optimizer, OptimizerConfig,
    Selection,
};
pub use scenarios::Scenario;
pub use signal::SignalController;
pub use simulation::{
    evaluate, SignalSnapshot, Simulation, SimulationConfig, Snapshot, VehicleSnapshot,
};
pub use slotmap::{Key, KeyData};
pub use util::Interval;
pub use vehicle::{Vehicle, VehicleAttributes, VehicleState};

mod error;
mod generator;
mod genome;
pub mod math;
mod metrics;
mod network;
mod optimizer;
pub mod scenarios;
mod signal;
mod simulation;
mod util;
mod vehicle;

slotmap::new_key_type! {
    /// Unique ID of a [Link].
    pub struct LinkId;
    /// Unique ID of an [Intersection].
    pub struct IntersectionId;
    /// Unique ID of a [Route].
    pub struct RouteId;
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
}

type VehicleSet = slotmap::SlotMap<VehicleId, Vehicle>;
