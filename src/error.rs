//! Error types.

use crate::{IntersectionId, LinkId, RouteId};
use thiserror::Error;

/// The network description is malformed. Raised by [NetworkBuilder::build](crate::NetworkBuilder::build)
/// before any simulation can start.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidTopologyError {
    #[error("link {0:?} is not part of the network")]
    UnknownLink(LinkId),
    #[error("intersection {0:?} is not part of the network")]
    UnknownIntersection(IntersectionId),
    #[error("link {link:?} has zero length")]
    DegenerateLink { link: LinkId },
    #[error("phase {phase} of intersection {intersection:?} references undefined lane group {group}")]
    UnknownLaneGroup {
        intersection: IntersectionId,
        phase: usize,
        group: usize,
    },
    #[error("conflict at intersection {intersection:?} references undefined lane group {group}")]
    UnknownConflictGroup {
        intersection: IntersectionId,
        group: usize,
    },
    #[error("phase {phase} of intersection {intersection:?} grants conflicting lane groups {a} and {b}")]
    ConflictingPhase {
        intersection: IntersectionId,
        phase: usize,
        a: usize,
        b: usize,
    },
    #[error("link {link:?} in a lane group of intersection {intersection:?} does not end there")]
    LinkNotApproach {
        intersection: IntersectionId,
        link: LinkId,
    },
    #[error("link {link:?} belongs to more than one lane group of intersection {intersection:?}")]
    DuplicateLaneGroupMember {
        intersection: IntersectionId,
        link: LinkId,
    },
    #[error("route {0:?} has no links")]
    EmptyRoute(RouteId),
    #[error("route {route:?}: link {to:?} does not start where {from:?} ends")]
    DiscontiguousRoute {
        route: RouteId,
        from: LinkId,
        to: LinkId,
    },
    #[error("route {0:?} must start and end at the network boundary")]
    RouteNotBoundaryToBoundary(RouteId),
}

/// A genome's length does not match the network's phase count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("genome has {actual} durations but the network has {expected} phases")]
pub struct GenomeShapeError {
    pub expected: usize,
    pub actual: usize,
}

/// A rollout was abandoned before it started because the wall-clock budget ran out.
/// The genome is excluded from selection for that generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("evaluation of genome {index} in generation {generation} was abandoned")]
pub struct EvaluationTimeout {
    pub generation: usize,
    pub index: usize,
}

/// Errors raised by [Optimizer::run](crate::Optimizer::run).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizeError {
    #[error(transparent)]
    GenomeShape(#[from] GenomeShapeError),
    #[error("the time budget expired before any genome was evaluated")]
    NoEvaluations,
}
