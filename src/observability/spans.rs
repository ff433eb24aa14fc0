//! Span helpers for ring operations.

use tracing::{span, Level, Span};

/// Span covering one join or leave, including rebuild and migration
#[inline]
pub fn membership_span(event: &str, position: u64) -> Span {
    span!(
        Level::INFO,
        "ring.membership",
        membership.event = %event,
        node.position = position
    )
}

/// Span covering a routed store or lookup
#[inline]
pub fn route_span(operation: &str, start: u64, target: u64) -> Span {
    span!(
        Level::DEBUG,
        "ring.route",
        route.operation = %operation,
        route.start = start,
        route.target = target
    )
}
