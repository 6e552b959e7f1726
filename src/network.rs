//! The static road network: links, signalised intersections and routes.

use crate::error::InvalidTopologyError;
use crate::math::{LineSegment2d, Point2d};
use crate::{IntersectionId, LinkId, RouteId};
use itertools::Itertools;
use slotmap::SlotMap;
use smallvec::SmallVec;
use std::ops::Range;

/// The road length taken up by one queued vehicle, used to derive link capacities, in m.
const DEFAULT_VEHICLE_SPACING: f64 = 7.0;

/// Where a link starts or ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Endpoint {
    /// The edge of the modelled network.
    Boundary,
    /// A signalised intersection.
    Intersection(IntersectionId),
}

/// A link represents a single lane of traffic between two endpoints.
#[derive(Clone, Debug)]
pub struct Link {
    /// The link ID.
    id: LinkId,
    /// The centre line of the link.
    geometry: LineSegment2d,
    /// Where the link starts.
    from: Endpoint,
    /// Where the link ends.
    to: Endpoint,
    /// Speed limit in m/s.
    speed_limit: f64,
    /// The maximum number of vehicles on the link at once.
    capacity: usize,
    /// The intersection and lane group governing the end of the link, if any.
    control: Option<(IntersectionId, usize)>,
}

/// The attributes of a link.
#[derive(Clone, Copy, Debug)]
pub struct LinkAttributes {
    /// The centre line of the link.
    pub geometry: LineSegment2d,
    /// Where the link starts.
    pub from: Endpoint,
    /// Where the link ends.
    pub to: Endpoint,
    /// The speed limit in m/s.
    pub speed_limit: f64,
    /// The maximum number of concurrent vehicles; 0 derives it from the link length.
    pub capacity: usize,
}

/// A set of links sharing a common right-of-way grant at one intersection.
#[derive(Clone, Debug, Default)]
pub struct LaneGroup {
    links: SmallVec<[LinkId; 4]>,
}

/// A signalised intersection.
#[derive(Clone, Debug)]
pub struct Intersection {
    id: IntersectionId,
    name: String,
    lane_groups: Vec<LaneGroup>,
    /// Each phase is the set of lane groups given right-of-way together.
    phases: Vec<SmallVec<[usize; 4]>>,
    /// Pairs of lane groups with crossing movements.
    conflicts: Vec<(usize, usize)>,
}

/// The attributes of an intersection.
#[derive(Clone, Debug, Default)]
pub struct IntersectionAttributes {
    /// A human readable name.
    pub name: String,
}

/// A fixed sequence of links from an entry boundary to an exit boundary.
#[derive(Clone, Debug)]
pub struct Route {
    id: RouteId,
    links: Vec<LinkId>,
    weight: f64,
}

/// Two links which physically cross.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LinkConflict {
    pub links: [LinkId; 2],
}

/// An immutable, validated road network.
#[derive(Clone, Debug)]
pub struct Network {
    links: SlotMap<LinkId, Link>,
    intersections: SlotMap<IntersectionId, Intersection>,
    routes: SlotMap<RouteId, Route>,
    link_conflicts: Vec<LinkConflict>,
    /// Entry links, with the routes starting on each.
    entries: Vec<(LinkId, SmallVec<[RouteId; 4]>)>,
    /// The genome slice of each intersection, in iteration order.
    phase_ranges: Vec<(IntersectionId, Range<usize>)>,
}

/// Incrementally describes a network, which is validated by [NetworkBuilder::build].
#[derive(Default)]
pub struct NetworkBuilder {
    links: SlotMap<LinkId, Link>,
    intersections: SlotMap<IntersectionId, Intersection>,
    routes: SlotMap<RouteId, Route>,
    link_conflicts: Vec<LinkConflict>,
    bad_group_links: Vec<LinkId>,
}

impl Link {
    /// Gets the link's ID.
    pub fn id(&self) -> LinkId {
        self.id
    }

    /// Gets the length of the link in m.
    pub fn length(&self) -> f64 {
        self.geometry.length()
    }

    /// Gets the line segment representing the link's centre line.
    pub fn geometry(&self) -> &LineSegment2d {
        &self.geometry
    }

    /// The world position `pos` metres along the link.
    pub fn sample(&self, pos: f64) -> Point2d {
        self.geometry.sample(pos)
    }

    pub fn from(&self) -> Endpoint {
        self.from
    }

    pub fn to(&self) -> Endpoint {
        self.to
    }

    /// The speed limit in m/s.
    pub fn speed_limit(&self) -> f64 {
        self.speed_limit
    }

    /// The maximum number of vehicles on the link at once.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The intersection and lane group index controlling the stop line at the end of this link.
    /// `None` for exit links and uncontrolled connectors.
    pub fn control(&self) -> Option<(IntersectionId, usize)> {
        self.control
    }
}

impl LaneGroup {
    /// The links in the lane group.
    pub fn links(&self) -> &[LinkId] {
        &self.links
    }
}

impl Intersection {
    pub fn id(&self) -> IntersectionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lane_groups(&self) -> &[LaneGroup] {
        &self.lane_groups
    }

    /// The number of phases in the signal cycle. Always at least one.
    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }

    /// The lane groups given right-of-way during the given phase.
    pub fn phase(&self, phase: usize) -> &[usize] {
        &self.phases[phase]
    }

    /// Whether two lane groups have crossing movements.
    pub fn conflicts(&self, a: usize, b: usize) -> bool {
        self.conflicts
            .iter()
            .any(|&(x, y)| (x, y) == (a, b) || (y, x) == (a, b))
    }
}

impl Route {
    pub fn id(&self) -> RouteId {
        self.id
    }

    /// The links of the route, in driving order.
    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    /// The relative likelihood of this route being chosen at its entry link.
    pub fn weight(&self) -> f64 {
        self.weight
    }
}

impl Network {
    /// Gets a reference to the link with the given ID.
    pub fn link(&self, id: LinkId) -> &Link {
        &self.links[id]
    }

    /// Returns an iterator over all the links in the network.
    pub fn iter_links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Gets a reference to the intersection with the given ID.
    pub fn intersection(&self, id: IntersectionId) -> &Intersection {
        &self.intersections[id]
    }

    /// Returns an iterator over the intersections, in phase enumeration order.
    pub fn iter_intersections(&self) -> impl Iterator<Item = &Intersection> {
        self.intersections.values()
    }

    /// Gets a reference to the route with the given ID.
    pub fn route(&self, id: RouteId) -> &Route {
        &self.routes[id]
    }

    pub fn iter_routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    /// The entry links and the routes which start on each.
    pub fn entries(&self) -> &[(LinkId, SmallVec<[RouteId; 4]>)] {
        &self.entries
    }

    /// The total number of phases over all intersections, i.e. the genome length.
    pub fn phase_count(&self) -> usize {
        self.phase_ranges.last().map(|(_, r)| r.end).unwrap_or(0)
    }

    /// The slice of a flattened genome belonging to each intersection.
    pub fn phase_ranges(&self) -> &[(IntersectionId, Range<usize>)] {
        &self.phase_ranges
    }

    pub(crate) fn link_conflicts(&self) -> &[LinkConflict] {
        &self.link_conflicts
    }
}

impl NetworkBuilder {
    /// Creates an empty network description.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds an intersection with no lane groups or phases yet.
    pub fn add_intersection(&mut self, attributes: &IntersectionAttributes) -> IntersectionId {
        self.intersections.insert_with_key(|id| Intersection {
            id,
            name: attributes.name.clone(),
            lane_groups: vec![],
            phases: vec![],
            conflicts: vec![],
        })
    }

    /// Adds a link to the network.
    pub fn add_link(&mut self, attributes: &LinkAttributes) -> LinkId {
        self.links.insert_with_key(|id| Link {
            id,
            geometry: attributes.geometry,
            from: attributes.from,
            to: attributes.to,
            speed_limit: attributes.speed_limit,
            capacity: attributes.capacity,
            control: None,
        })
    }

    /// Adds a lane group to an intersection and returns its index.
    /// Every link must end at the intersection.
    pub fn add_lane_group(&mut self, intersection: IntersectionId, links: &[LinkId]) -> usize {
        for link_id in links {
            if !self.links.contains_key(*link_id) {
                self.bad_group_links.push(*link_id);
            }
        }
        let intersection = &mut self.intersections[intersection];
        intersection.lane_groups.push(LaneGroup {
            links: links.iter().copied().collect(),
        });
        intersection.lane_groups.len() - 1
    }

    /// Appends a phase to an intersection's signal cycle and returns its index.
    pub fn add_phase(&mut self, intersection: IntersectionId, lane_groups: &[usize]) -> usize {
        let intersection = &mut self.intersections[intersection];
        intersection.phases.push(lane_groups.iter().copied().collect());
        intersection.phases.len() - 1
    }

    /// Specifies that two lane groups of an intersection have crossing movements
    /// and may not be granted right-of-way in the same phase.
    pub fn add_group_conflict(&mut self, intersection: IntersectionId, a: usize, b: usize) {
        self.intersections[intersection].conflicts.push((a, b));
    }

    /// Specifies that two links physically cross. Returns false, and records nothing,
    /// if either link is unknown or their centre lines do not intersect.
    pub fn add_link_conflict(&mut self, a: LinkId, b: LinkId) -> bool {
        let (Some(link_a), Some(link_b)) = (self.links.get(a), self.links.get(b)) else {
            return false;
        };
        if a == b || link_a.geometry.intersect(&link_b.geometry).is_none() {
            return false;
        }
        self.link_conflicts.push(LinkConflict { links: [a, b] });
        true
    }

    /// Adds a route. The weight is relative to the other routes starting on the same link.
    pub fn add_route(&mut self, links: &[LinkId], weight: f64) -> RouteId {
        self.routes.insert_with_key(|id| Route {
            id,
            links: links.to_vec(),
            weight,
        })
    }

    /// Validates the description and produces an immutable [Network].
    pub fn build(mut self) -> Result<Network, InvalidTopologyError> {
        if let Some(link_id) = self.bad_group_links.first() {
            return Err(InvalidTopologyError::UnknownLink(*link_id));
        }
        self.validate_links()?;
        self.assign_lane_groups()?;
        self.validate_phases()?;
        self.validate_routes()?;

        let mut entries: Vec<(LinkId, SmallVec<[RouteId; 4]>)> = vec![];
        for route in self.routes.values() {
            let entry = route.links[0];
            match entries.iter_mut().find(|(link_id, _)| *link_id == entry) {
                Some((_, routes)) => routes.push(route.id),
                None => entries.push((entry, smallvec::smallvec![route.id])),
            }
        }

        let mut offset = 0;
        let phase_ranges = self
            .intersections
            .values()
            .map(|intersection| {
                let range = offset..offset + intersection.phase_count();
                offset = range.end;
                (intersection.id, range)
            })
            .collect();

        Ok(Network {
            links: self.links,
            intersections: self.intersections,
            routes: self.routes,
            link_conflicts: self.link_conflicts,
            entries,
            phase_ranges,
        })
    }

    /// Checks link endpoints and geometry, and derives missing capacities.
    fn validate_links(&mut self) -> Result<(), InvalidTopologyError> {
        for link in self.links.values_mut() {
            for endpoint in [link.from, link.to] {
                if let Endpoint::Intersection(id) = endpoint {
                    if !self.intersections.contains_key(id) {
                        return Err(InvalidTopologyError::UnknownIntersection(id));
                    }
                }
            }
            let length = link.geometry.length();
            if !(length > 0.0) {
                return Err(InvalidTopologyError::DegenerateLink { link: link.id });
            }
            if link.capacity == 0 {
                link.capacity = usize::max((length / DEFAULT_VEHICLE_SPACING) as usize, 1);
            }
        }
        Ok(())
    }

    /// Marks each approach link with the lane group controlling it.
    fn assign_lane_groups(&mut self) -> Result<(), InvalidTopologyError> {
        for intersection in self.intersections.values() {
            for (group_idx, group) in intersection.lane_groups.iter().enumerate() {
                for link_id in &group.links {
                    let link = &mut self.links[*link_id];
                    if link.to != Endpoint::Intersection(intersection.id) {
                        return Err(InvalidTopologyError::LinkNotApproach {
                            intersection: intersection.id,
                            link: *link_id,
                        });
                    }
                    if link.control.is_some() {
                        return Err(InvalidTopologyError::DuplicateLaneGroupMember {
                            intersection: intersection.id,
                            link: *link_id,
                        });
                    }
                    link.control = Some((intersection.id, group_idx));
                }
            }
        }
        Ok(())
    }

    /// Checks phases against the lane groups and their conflicts.
    /// An empty cycle is replaced by one phase per lane group.
    fn validate_phases(&mut self) -> Result<(), InvalidTopologyError> {
        for intersection in self.intersections.values_mut() {
            let num_groups = intersection.lane_groups.len();
            for &(a, b) in &intersection.conflicts {
                if let Some(group) = [a, b].into_iter().find(|g| *g >= num_groups) {
                    return Err(InvalidTopologyError::UnknownConflictGroup {
                        intersection: intersection.id,
                        group,
                    });
                }
            }

            if intersection.phases.is_empty() {
                log::warn!(
                    "intersection {:?} has no phases, defaulting to one phase per lane group",
                    intersection.id
                );
                intersection.phases = (0..num_groups).map(|g| smallvec::smallvec![g]).collect();
                if intersection.phases.is_empty() {
                    intersection.phases.push(SmallVec::new());
                }
            }

            for (phase_idx, phase) in intersection.phases.iter().enumerate() {
                if let Some(group) = phase.iter().find(|g| **g >= num_groups) {
                    return Err(InvalidTopologyError::UnknownLaneGroup {
                        intersection: intersection.id,
                        phase: phase_idx,
                        group: *group,
                    });
                }
                if let Some((a, b)) = phase
                    .iter()
                    .tuple_combinations()
                    .find(|(a, b)| intersection.conflicts(**a, **b))
                {
                    return Err(InvalidTopologyError::ConflictingPhase {
                        intersection: intersection.id,
                        phase: phase_idx,
                        a: *a,
                        b: *b,
                    });
                }
            }
        }
        Ok(())
    }

    /// Checks that every route runs contiguously from the boundary to the boundary.
    fn validate_routes(&mut self) -> Result<(), InvalidTopologyError> {
        for route in self.routes.values_mut() {
            if route.links.is_empty() {
                return Err(InvalidTopologyError::EmptyRoute(route.id));
            }
            if let Some(link_id) = route.links.iter().find(|l| !self.links.contains_key(**l)) {
                return Err(InvalidTopologyError::UnknownLink(*link_id));
            }
            let first = &self.links[route.links[0]];
            let last = &self.links[route.links[route.links.len() - 1]];
            if first.from != Endpoint::Boundary || last.to != Endpoint::Boundary {
                return Err(InvalidTopologyError::RouteNotBoundaryToBoundary(route.id));
            }
            for (from, to) in route.links.iter().tuple_windows() {
                let joint = self.links[*from].to;
                if joint == Endpoint::Boundary || joint != self.links[*to].from {
                    return Err(InvalidTopologyError::DiscontiguousRoute {
                        route: route.id,
                        from: *from,
                        to: *to,
                    });
                }
            }
            if !(route.weight.is_finite() && route.weight >= 0.0) {
                log::warn!("route {:?} has weight {}, using 0", route.id, route.weight);
                route.weight = 0.0;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight(x0: f64, x1: f64, from: Endpoint, to: Endpoint) -> LinkAttributes {
        LinkAttributes {
            geometry: LineSegment2d::from_ends(Point2d::new(x0, 0.0), Point2d::new(x1, 0.0)),
            from,
            to,
            speed_limit: 10.0,
            capacity: 0,
        }
    }

    /// A single intersection with a west approach, an east exit and a north approach.
    fn junction() -> (NetworkBuilder, IntersectionId, [LinkId; 3]) {
        let mut b = NetworkBuilder::new();
        let x = b.add_intersection(&IntersectionAttributes::default());
        let w_in = b.add_link(&straight(-100.0, 0.0, Endpoint::Boundary, Endpoint::Intersection(x)));
        let e_out = b.add_link(&straight(0.0, 100.0, Endpoint::Intersection(x), Endpoint::Boundary));
        let n_in = b.add_link(&LinkAttributes {
            geometry: LineSegment2d::from_ends(Point2d::new(0.0, 70.0), Point2d::new(0.0, 0.0)),
            ..straight(0.0, 1.0, Endpoint::Boundary, Endpoint::Intersection(x))
        });
        (b, x, [w_in, e_out, n_in])
    }

    #[test]
    fn builds_valid_junction() {
        let (mut b, x, [w_in, e_out, n_in]) = junction();
        let ew = b.add_lane_group(x, &[w_in]);
        let ns = b.add_lane_group(x, &[n_in]);
        b.add_group_conflict(x, ew, ns);
        b.add_phase(x, &[ew]);
        b.add_phase(x, &[ns]);
        b.add_route(&[w_in, e_out], 1.0);
        let net = b.build().unwrap();

        assert_eq!(net.phase_count(), 2);
        assert_eq!(net.link(w_in).control(), Some((x, ew)));
        assert_eq!(net.link(e_out).control(), None);
        assert_eq!(net.link(w_in).capacity(), 14);
        assert_eq!(net.entries().len(), 1);
        assert_eq!(net.entries()[0].0, w_in);
    }

    #[test]
    fn rejects_conflicting_phase() {
        let (mut b, x, [w_in, _, n_in]) = junction();
        let ew = b.add_lane_group(x, &[w_in]);
        let ns = b.add_lane_group(x, &[n_in]);
        b.add_group_conflict(x, ns, ew);
        b.add_phase(x, &[ew, ns]);
        assert!(matches!(
            b.build(),
            Err(InvalidTopologyError::ConflictingPhase { phase: 0, .. })
        ));
    }

    #[test]
    fn rejects_undefined_lane_group() {
        let (mut b, x, [w_in, _, _]) = junction();
        b.add_lane_group(x, &[w_in]);
        b.add_phase(x, &[0]);
        b.add_phase(x, &[3]);
        assert!(matches!(
            b.build(),
            Err(InvalidTopologyError::UnknownLaneGroup {
                phase: 1,
                group: 3,
                ..
            })
        ));
    }

    #[test]
    fn rejects_discontiguous_route() {
        let (mut b, x, [w_in, e_out, n_in]) = junction();
        b.add_lane_group(x, &[w_in, n_in]);
        b.add_route(&[w_in, n_in, e_out], 1.0);
        assert!(matches!(
            b.build(),
            Err(InvalidTopologyError::DiscontiguousRoute { .. })
        ));
    }

    #[test]
    fn rejects_route_ending_inside() {
        let (mut b, x, [w_in, _, _]) = junction();
        b.add_lane_group(x, &[w_in]);
        b.add_route(&[w_in], 1.0);
        assert!(matches!(
            b.build(),
            Err(InvalidTopologyError::RouteNotBoundaryToBoundary(_))
        ));
    }

    #[test]
    fn rejects_group_link_not_ending_at_intersection() {
        let (mut b, x, [_, e_out, _]) = junction();
        b.add_lane_group(x, &[e_out]);
        assert!(matches!(
            b.build(),
            Err(InvalidTopologyError::LinkNotApproach { .. })
        ));
    }

    #[test]
    fn empty_cycle_defaults_to_round_robin() {
        let (mut b, x, [w_in, _, n_in]) = junction();
        b.add_lane_group(x, &[w_in]);
        b.add_lane_group(x, &[n_in]);
        let net = b.build().unwrap();
        let intersection = net.intersection(x);
        assert_eq!(intersection.phase_count(), 2);
        assert_eq!(intersection.phase(1), &[1]);
    }

    #[test]
    fn link_conflict_requires_crossing_geometry() {
        let (mut b, _, [w_in, e_out, n_in]) = junction();
        assert!(!b.add_link_conflict(w_in, e_out));
        assert!(b.add_link_conflict(w_in, n_in));
    }
}
