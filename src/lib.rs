//! Formation flying for agent flocks.
//!
//! Lays a group of agents out in a geometric formation (line, circle, box,
//! cross, arrow, vee), decides which agent takes which slot through a
//! blended greedy/Hungarian assignment solver, and maps each agent's
//! distance to its slot into a catch-up movement magnitude.
//!
//! The crate is engine-agnostic: the host's steering layer feeds world
//! positions in and consumes `(direction, magnitude)` pairs per tick. All
//! layout math is pure functions over explicit inputs, safe to evaluate
//! from worker threads without locking.

pub mod formation;
pub mod math;

pub use formation::catch_up::{self, CatchUpSpec, DistanceMapping};
pub use formation::group::{AgentId, FormationGroup, FormationMembers};
pub use formation::shapes;
pub use formation::slotting::{assign_slots, SlottingError, SlottingStrategy};
pub use formation::{
    ClampEvent, ClampEvents, ComputedLayout, FormationPivot, FormationSpec, FormationUnit,
    ShapeMode, ShapeVariant, SlotSteering,
};
