//! Threshold configuration: base/min/max per event type and the viewer-count
//! multiplier bracket table. Pure data plus the one deterministic function
//! that turns it into a fire threshold — kept dependency-free so `engine`
//! and `server` never disagree on the numbers.

use crate::event_type::EventType;

/// Base/min/max threshold configuration for a single event type.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EventConfig {
    pub base: i64,
    pub min: i64,
    pub max: i64,
}

/// Defaults table from the design doc, indexed by [`EventType`].
pub fn config_for(ty: EventType) -> EventConfig {
    match ty {
        EventType::Helpful1 => EventConfig { base: 5, min: 3, max: 50 },
        EventType::Helpful2 => EventConfig { base: 6, min: 4, max: 60 },
        EventType::Helpful3 => EventConfig { base: 12, min: 8, max: 100 },
        EventType::Adversarial1 => EventConfig { base: 6, min: 4, max: 45 },
        EventType::Adversarial2 => EventConfig { base: 7, min: 5, max: 55 },
        EventType::Adversarial3 => EventConfig { base: 10, min: 6, max: 80 },
    }
}

/// Ordered `(upper_bound, multiplier)` brackets. The last entry's bound is
/// unused — any viewer count above the second-to-last bound gets the last
/// entry's multiplier (the "unbounded tail").
const MULTIPLIER_BRACKETS: &[(i64, f64)] = &[
    (5, 1.0),
    (10, 1.2),
    (20, 1.5),
    (50, 2.0),
    (i64::MAX, 3.0),
];

/// Step function over [`MULTIPLIER_BRACKETS`]. Brackets are `<= bound`,
/// strict; viewer counts past the last finite bound fall into the tail.
pub fn multiplier_for(viewers: i64) -> f64 {
    for &(bound, multiplier) in MULTIPLIER_BRACKETS {
        if viewers <= bound {
            return multiplier;
        }
    }
    // Unreachable: the last bound is i64::MAX.
    MULTIPLIER_BRACKETS.last().unwrap().1
}

/// `threshold = clamp(ceil(base * multiplier(viewers)), min, max)`.
pub fn threshold_for(ty: EventType, viewers: i64) -> i64 {
    let EventConfig { base, min, max } = config_for(ty);
    let raw = (base as f64) * multiplier_for(viewers);
    let ceiled = raw.ceil() as i64;
    ceiled.clamp(min, max)
}
