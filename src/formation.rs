use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::math::*;

pub mod catch_up;
pub mod group;
pub mod shapes;
pub mod slotting;

use catch_up::CatchUpSpec;

/// Whether a shape stays in the ground plane or stacks vertically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeMode {
    Planar,
    Spatial,
}

impl Default for ShapeMode {
    fn default() -> Self {
        Self::Planar
    }
}

/// Closed set of formation shapes.
///
/// Each variant partitions the formation into layers (rings, rows, wings)
/// that fill up before the next one is started; the last populated layer may
/// be sparse.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ShapeVariant {
    Line,
    Circle {
        solid: bool,
    },
    Box {
        /// (lateral count, depth count) of one layer.
        agents_per_line: (u32, u32),
        solid: bool,
        mode: ShapeMode,
    },
    Cross {
        mode: ShapeMode,
    },
    Arrow {
        solid: bool,
        mode: ShapeMode,
    },
    Vee {
        /// (wing thickness, vertical extrusion).
        agents_per_line: (u32, u32),
        solid: bool,
        mode: ShapeMode,
    },
}

impl Default for ShapeVariant {
    fn default() -> Self {
        Self::Line
    }
}

/// Record of a parameter that had to be clamped into its valid range.
///
/// Sanitizers clamp and report instead of rejecting; callers decide whether
/// to surface the event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClampEvent {
    pub field: &'static str,
    pub requested: TReal,
    pub applied: TReal,
}

pub type ClampEvents = SmallVec<[ClampEvent; 4]>;

#[inline]
pub(crate) fn clamp_reported(
    events: &mut ClampEvents,
    field: &'static str,
    requested: TReal,
    applied: TReal,
) -> TReal {
    if (requested - applied).abs() > TReal::EPSILON {
        events.push(ClampEvent {
            field,
            requested,
            applied,
        });
    }
    applied
}

/// Per-agent formation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormationSpec {
    /// Total number of slots in the formation. At least 1.
    pub size: u32,
    /// The slot this agent occupies. Always less than `size`.
    ///
    /// Owned by the [`group::FormationGroup`] while the agent is under group
    /// management.
    pub position_in_formation: u32,
    /// Distance between neighbouring slots.
    pub spacing: TReal,
    pub shape: ShapeVariant,
    /// World axis the consumer treats as up. Zero falls back to +Y.
    pub up_axis: TVec3,
}

impl Default for FormationSpec {
    fn default() -> Self {
        Self {
            size: 1,
            position_in_formation: 0,
            spacing: 1.,
            shape: ShapeVariant::default(),
            up_axis: TVec3::Y,
        }
    }
}

impl FormationSpec {
    /// Clamps all fields into their valid ranges, reporting what changed.
    pub fn sanitize(&mut self) -> ClampEvents {
        let mut events = ClampEvents::new();
        if self.size < 1 {
            clamp_reported(&mut events, "size", self.size as TReal, 1.);
            self.size = 1;
        }
        if self.position_in_formation >= self.size {
            clamp_reported(
                &mut events,
                "position_in_formation",
                self.position_in_formation as TReal,
                (self.size - 1) as TReal,
            );
            self.position_in_formation = self.size - 1;
        }
        self.spacing = clamp_reported(&mut events, "spacing", self.spacing, self.spacing.max(0.));
        match &mut self.shape {
            ShapeVariant::Box {
                agents_per_line, ..
            }
            | ShapeVariant::Vee {
                agents_per_line, ..
            } => {
                if agents_per_line.0 < 1 {
                    clamp_reported(&mut events, "agents_per_line.0", agents_per_line.0 as TReal, 1.);
                    agents_per_line.0 = 1;
                }
                if agents_per_line.1 < 1 {
                    clamp_reported(&mut events, "agents_per_line.1", agents_per_line.1 as TReal, 1.);
                    agents_per_line.1 = 1;
                }
            }
            _ => {}
        }
        events
    }
}

/// Slot layout derived from a [`FormationSpec`].
///
/// Cached on the unit and only refreshed by an explicit
/// [`FormationUnit::recompute`], so batched spec edits cost one recompute.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ComputedLayout {
    /// Offset of the assigned slot from the formation pivot, in the pivot's
    /// local basis.
    pub local_offset: TVec3,
    /// Number of populated layers.
    pub layer_count: u32,
    /// Number of under-capacity layers (0 or 1).
    pub sparse_layer_count: u32,
}

/// The single reference transform a formation is anchored on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FormationPivot {
    pub position: TVec3,
    pub rotation: TQuat,
}

impl Default for FormationPivot {
    fn default() -> Self {
        Self {
            position: TVec3::ZERO,
            rotation: TQuat::IDENTITY,
        }
    }
}

impl FormationPivot {
    /// The world position of a slot given its pivot-local offset.
    #[inline]
    pub fn slot_world_pos(&self, local_offset: TVec3) -> TVec3 {
        self.position + self.rotation * local_offset
    }
}

/// What the steering consumer acts on each evaluation tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SlotSteering {
    /// Unit vector towards the assigned slot, zero when already there.
    pub direction: TVec3,
    /// Movement magnitude from the catch-up radius profile.
    pub magnitude: TReal,
}

/// One agent's formation state: shape parameters, catch-up profile and the
/// cached slot layout.
#[derive(Debug, Clone, Default)]
pub struct FormationUnit {
    spec: FormationSpec,
    catch_up: CatchUpSpec,
    layout: ComputedLayout,
}

impl FormationUnit {
    pub fn new(mut spec: FormationSpec, mut catch_up: CatchUpSpec) -> (Self, ClampEvents) {
        let mut events = spec.sanitize();
        events.extend(catch_up.sanitize());
        let mut unit = Self {
            spec,
            catch_up,
            layout: ComputedLayout::default(),
        };
        unit.recompute();
        (unit, events)
    }

    pub fn spec(&self) -> &FormationSpec {
        &self.spec
    }

    pub fn catch_up(&self) -> &CatchUpSpec {
        &self.catch_up
    }

    pub fn layout(&self) -> &ComputedLayout {
        &self.layout
    }

    pub fn position_in_formation(&self) -> u32 {
        self.spec.position_in_formation
    }

    /// Edits the unit's parameters in place. The edit is sanitized but the
    /// cached layout is left stale until [`Self::recompute`] so a batch of
    /// edits costs one recompute.
    pub fn edit(
        &mut self,
        edit: impl FnOnce(&mut FormationSpec, &mut CatchUpSpec),
    ) -> ClampEvents {
        edit(&mut self.spec, &mut self.catch_up);
        let mut events = self.spec.sanitize();
        events.extend(self.catch_up.sanitize());
        events
    }

    /// Refreshes the cached layout from the current spec.
    pub fn recompute(&mut self) {
        self.layout = shapes::compute_position(&self.spec);
    }

    /// Group-owned write of the assigned slot. Leaves the layout stale.
    pub(crate) fn set_position_in_formation(&mut self, slot: u32, size: u32) {
        self.spec.size = size.max(1);
        self.spec.position_in_formation = slot.min(self.spec.size - 1);
    }

    /// Steering contribution towards the assigned slot for the current tick.
    pub fn slot_steering(&self, current_pos: TVec3, pivot: &FormationPivot) -> SlotSteering {
        let target = pivot.slot_world_pos(self.layout.local_offset);
        let offset = target - current_pos;
        let dist_sq = offset.length_squared();
        if dist_sq <= TReal::EPSILON {
            return SlotSteering {
                direction: TVec3::ZERO,
                magnitude: catch_up::magnitude(0., &self.catch_up),
            };
        }
        let dist = dist_sq.sqrt();
        SlotSteering {
            direction: offset / dist,
            magnitude: catch_up::magnitude(dist, &self.catch_up),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_sanitize_clamps_and_reports() {
        let mut spec = FormationSpec {
            size: 0,
            position_in_formation: 9,
            spacing: -2.,
            shape: ShapeVariant::Box {
                agents_per_line: (0, 0),
                solid: true,
                mode: ShapeMode::Planar,
            },
            up_axis: TVec3::Y,
        };
        let events = spec.sanitize();
        assert_eq!(spec.size, 1);
        assert_eq!(spec.position_in_formation, 0);
        assert_eq!(spec.spacing, 0.);
        assert!(matches!(
            spec.shape,
            ShapeVariant::Box {
                agents_per_line: (1, 1),
                ..
            }
        ));
        let fields: Vec<_> = events.iter().map(|e| e.field).collect();
        assert!(fields.contains(&"size"));
        assert!(fields.contains(&"position_in_formation"));
        assert!(fields.contains(&"spacing"));
        assert!(fields.contains(&"agents_per_line.0"));
    }

    #[test]
    fn spec_sanitize_is_quiet_on_valid_input() {
        let mut spec = FormationSpec {
            size: 5,
            position_in_formation: 2,
            ..Default::default()
        };
        assert!(spec.sanitize().is_empty());
    }

    #[test]
    fn unit_recompute_is_explicit() {
        let (mut unit, _) = FormationUnit::new(
            FormationSpec {
                size: 5,
                position_in_formation: 0,
                spacing: 2.,
                ..Default::default()
            },
            CatchUpSpec::default(),
        );
        assert_eq!(unit.layout().local_offset, TVec3::new(-4., 0., 0.));

        unit.edit(|spec, _| spec.position_in_formation = 4);
        // layout stays stale until asked for a recompute
        assert_eq!(unit.layout().local_offset, TVec3::new(-4., 0., 0.));
        unit.recompute();
        assert_eq!(unit.layout().local_offset, TVec3::new(4., 0., 0.));
    }

    #[test]
    fn slot_steering_points_at_slot() {
        let (unit, _) = FormationUnit::new(
            FormationSpec {
                size: 5,
                position_in_formation: 4,
                spacing: 2.,
                ..Default::default()
            },
            CatchUpSpec::default(),
        );
        let pivot = FormationPivot {
            position: TVec3::new(10., 0., 0.),
            rotation: TQuat::IDENTITY,
        };
        // slot sits at (14, 0, 0)
        let out = unit.slot_steering(TVec3::new(14., 0., -3.), &pivot);
        assert!((out.direction - TVec3::Z).length() < 1e-6);

        let out = unit.slot_steering(TVec3::new(14., 0., 0.), &pivot);
        assert_eq!(out.direction, TVec3::ZERO);
    }

    #[test]
    fn pivot_rotates_slot_offsets() {
        let pivot = FormationPivot {
            position: TVec3::new(1., 0., 0.),
            rotation: TQuat::from_rotation_y(real::consts::FRAC_PI_2),
        };
        let world = pivot.slot_world_pos(TVec3::new(2., 0., 0.));
        assert!((world - TVec3::new(1., 0., -2.)).length() < 1e-5);
    }
}
