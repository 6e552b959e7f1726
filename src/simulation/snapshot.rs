//! Read-only views of the simulation state, for visualisation.

use super::Simulation;
use crate::math::Point2d;
use crate::{IntersectionId, LinkId, VehicleId, VehicleState};

/// The state of the simulation at the end of a tick.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Snapshot {
    pub tick: usize,
    /// The simulated time in s.
    pub time: f64,
    pub vehicles: Vec<VehicleSnapshot>,
    pub signals: Vec<SignalSnapshot>,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct VehicleSnapshot {
    pub id: VehicleId,
    pub link: LinkId,
    /// The position of the vehicle's front along its link, in m.
    pub pos: f64,
    /// The world coordinates of the vehicle's centre.
    pub world_pos: Point2d,
    /// The speed over the last tick, in m/s.
    pub vel: f64,
    pub state: VehicleState,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SignalSnapshot {
    pub intersection: IntersectionId,
    pub phase: usize,
    /// The time spent in the current phase, in s.
    pub elapsed: f64,
}

impl<'a> Simulation<'a> {
    /// Captures the position and state of every vehicle and the phase of every signal.
    pub fn snapshot(&self) -> Snapshot {
        let vehicles = self
            .vehicles
            .values()
            .map(|vehicle| VehicleSnapshot {
                id: vehicle.id(),
                link: vehicle.link_id(),
                pos: vehicle.pos_front(),
                world_pos: self.network.link(vehicle.link_id()).sample(vehicle.pos_mid()),
                vel: vehicle.vel(),
                state: vehicle.state(),
            })
            .collect();

        let signals = self
            .signals
            .iter()
            .map(|signal| SignalSnapshot {
                intersection: signal.intersection(),
                phase: signal.phase(),
                elapsed: signal.elapsed(),
            })
            .collect();

        Snapshot {
            tick: self.tick,
            time: self.time(),
            vehicles,
            signals,
        }
    }
}
