//! Maps an agent's distance to its slot into a movement magnitude.
//!
//! Inside the arrive radius the agent slows to a stop, between arrive and
//! inner it cruises at 1.0, past the inner radius it speeds up to catch the
//! formation, saturating at the outer radius.

use serde::{Deserialize, Serialize};

use super::{clamp_reported, ClampEvents};
use crate::math::*;

/// How distance past the inner radius ramps into extra speed.
///
/// Every mapping is monotonic and saturating over `[min, max]`; the family is
/// deliberately non-invertible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMapping {
    Constant,
    Linear,
    Quadratic,
    SquareRoot,
}

impl Default for DistanceMapping {
    fn default() -> Self {
        Self::Linear
    }
}

impl DistanceMapping {
    /// Evaluates the mapping over `[min, max]`, clamped to `[0, 1]`.
    pub fn eval(self, min: TReal, max: TReal, distance: TReal) -> TReal {
        if matches!(self, Self::Constant) {
            return 1.;
        }
        let span = max - min;
        let ratio = if span <= TReal::EPSILON {
            // degenerate interval, saturate at the boundary
            if distance >= max {
                1.
            } else {
                0.
            }
        } else {
            ((distance - min) / span).clamp(0., 1.)
        };
        match self {
            Self::Constant => 1.,
            Self::Linear => ratio,
            Self::Quadratic => ratio * ratio,
            Self::SquareRoot => ratio.sqrt(),
        }
    }
}

/// Catch-up radius profile.
///
/// Invariant `arrive_radius <= inner_radius <= outer_radius` is maintained by
/// clamping on mutation, never by rejecting input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CatchUpSpec {
    pub arrive_radius: TReal,
    pub inner_radius: TReal,
    pub outer_radius: TReal,
    /// Extra speed gained when the outer radius is reached.
    pub catch_up_multiplier: TReal,
    pub mapping: DistanceMapping,
}

impl Default for CatchUpSpec {
    fn default() -> Self {
        Self {
            arrive_radius: 0.5,
            inner_radius: 2.,
            outer_radius: 10.,
            catch_up_multiplier: 1.,
            mapping: DistanceMapping::default(),
        }
    }
}

impl CatchUpSpec {
    /// Clamps the radii into a valid ordering, reporting what changed.
    pub fn sanitize(&mut self) -> ClampEvents {
        let mut events = ClampEvents::new();
        self.arrive_radius = clamp_reported(
            &mut events,
            "arrive_radius",
            self.arrive_radius,
            self.arrive_radius.max(0.),
        );
        self.inner_radius = clamp_reported(
            &mut events,
            "inner_radius",
            self.inner_radius,
            self.inner_radius.max(self.arrive_radius),
        );
        self.outer_radius = clamp_reported(
            &mut events,
            "outer_radius",
            self.outer_radius,
            self.outer_radius.max(self.inner_radius),
        );
        events
    }

    /// Sets the outer radius, clamped to stay at or beyond the inner radius.
    pub fn set_outer_radius(&mut self, value: TReal) {
        self.outer_radius = value.max(self.inner_radius);
    }

    /// Sets the inner radius, clamped between the arrive and outer radii.
    pub fn set_inner_radius(&mut self, value: TReal) {
        self.inner_radius = value.clamp(self.arrive_radius, self.outer_radius);
    }

    /// Sets the arrive radius, clamped to `[0, inner_radius]`.
    pub fn set_arrive_radius(&mut self, value: TReal) {
        self.arrive_radius = value.clamp(0., self.inner_radius);
    }
}

/// Movement magnitude for an agent `distance` away from its slot.
pub fn magnitude(distance: TReal, spec: &CatchUpSpec) -> TReal {
    if distance <= spec.arrive_radius {
        spec.mapping.eval(0., spec.arrive_radius, distance)
    } else if distance < spec.inner_radius {
        1.
    } else {
        1. + spec.catch_up_multiplier * spec.mapping.eval(spec.inner_radius, spec.outer_radius, distance)
    }
}
