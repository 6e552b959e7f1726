use crate::{LinkId, Network, RouteId, VehicleId};

/// The length of a vehicle's stationary step, below which it counts as waiting, in m.
const STOPPED_EPSILON: f64 = 1e-9;

/// What a vehicle did during the last simulated tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VehicleState {
    /// Moving along its route.
    EnRoute,
    /// Held by a red signal, a full link or the vehicle ahead.
    Waiting,
    /// Left the network at the end of its route.
    Completed,
}

/// The attributes of a simulated vehicle.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VehicleAttributes {
    /// The vehicle length in m.
    pub length: f64,
    /// The desired cruising speed in m/s, before any link speed limit.
    pub speed: f64,
}

impl Default for VehicleAttributes {
    fn default() -> Self {
        Self {
            length: 4.5,
            speed: 13.9,
        }
    }
}

/// A simulated vehicle.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// The vehicle's ID.
    id: VehicleId,
    /// Creation order within the run.
    seq: usize,
    /// The vehicle length in m.
    length: f64,
    /// The desired speed in m/s.
    speed: f64,
    /// The speed over the last tick in m/s.
    vel: f64,
    /// The route being followed.
    route: RouteId,
    /// The index of the current link within the route.
    route_idx: usize,
    /// The link currently travelled on.
    link: LinkId,
    /// The longitudinal position of the vehicle's front along the link, in m.
    pos: f64,
    /// Total time spent waiting in s.
    wait_time: f64,
    state: VehicleState,
    /// The last tick in which the vehicle moved.
    last_tick: Option<usize>,
}

impl Vehicle {
    pub(crate) fn new(
        id: VehicleId,
        seq: usize,
        attributes: &VehicleAttributes,
        route: RouteId,
        link: LinkId,
    ) -> Self {
        Self {
            id,
            seq,
            length: attributes.length,
            speed: attributes.speed,
            vel: 0.0,
            route,
            route_idx: 0,
            link,
            pos: 0.0,
            wait_time: 0.0,
            state: VehicleState::EnRoute,
            last_tick: None,
        }
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// The order in which the vehicle entered the network.
    pub fn seq(&self) -> usize {
        self.seq
    }

    /// The vehicle's length in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// The desired speed in m/s.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// The speed achieved over the last tick, in m/s.
    pub fn vel(&self) -> f64 {
        self.vel
    }

    pub fn route_id(&self) -> RouteId {
        self.route
    }

    /// The ID of the link the vehicle is currently travelling on.
    pub fn link_id(&self) -> LinkId {
        self.link
    }

    /// The longitudinal position of the front of the vehicle in m.
    pub fn pos_front(&self) -> f64 {
        self.pos
    }

    /// The longitudinal position of the rear of the vehicle in m.
    pub fn pos_rear(&self) -> f64 {
        self.pos - self.length
    }

    /// The longitudinal position of the centre of the vehicle in m.
    pub fn pos_mid(&self) -> f64 {
        self.pos - 0.5 * self.length
    }

    /// The accumulated time spent waiting, in s.
    pub fn wait_time(&self) -> f64 {
        self.wait_time
    }

    pub fn state(&self) -> VehicleState {
        self.state
    }

    /// The link after the current one on the vehicle's route, if any.
    pub fn next_link(&self, network: &Network) -> Option<LinkId> {
        network
            .route(self.route)
            .links()
            .get(self.route_idx + 1)
            .copied()
    }

    pub(crate) fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
    }

    pub(crate) fn moved_in(&self, tick: usize) -> bool {
        self.last_tick == Some(tick)
    }

    /// Moves the vehicle forward to `target`, never past `limit` and never backwards.
    /// A vehicle which cannot move at all is waiting and accrues `dt` of wait time.
    pub(crate) fn drive(&mut self, target: f64, limit: f64, dt: f64, tick: usize) {
        let new_pos = f64::max(f64::min(target, limit), self.pos);
        let dist = new_pos - self.pos;
        self.pos = new_pos;
        self.vel = dist / dt;
        self.last_tick = Some(tick);
        if dist <= STOPPED_EPSILON {
            self.state = VehicleState::Waiting;
            self.wait_time += dt;
        } else {
            self.state = VehicleState::EnRoute;
        }
    }

    /// Moves the vehicle from the end of its current link onto the next link of its route.
    pub(crate) fn enter_next_link(&mut self, next: LinkId, prev_length: f64) {
        self.route_idx += 1;
        self.link = next;
        self.pos -= prev_length;
    }

    pub(crate) fn complete(&mut self) {
        self.state = VehicleState::Completed;
    }
}
