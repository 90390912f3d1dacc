//! Group-level orchestration: sizes the formation, lays out candidate
//! slots, runs the slotting strategy and writes the assignment back into
//! the member units.

use educe::Educe;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::catch_up::CatchUpSpec;
use super::slotting::{SlottingError, SlottingStrategy};
use super::{ClampEvents, FormationPivot, FormationSpec, FormationUnit};
use crate::math::*;

/// Opaque handle to the host-side agent a unit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u64);

/// Member roster with change tracking.
///
/// Additions and removals accumulate until [`Self::take_changes`] so a
/// caller can tell when the group needs reconfiguring.
#[derive(Debug, Default, Clone, Educe)]
#[educe(Deref)]
pub struct FormationMembers {
    #[educe(Deref)]
    members: SmallVec<[AgentId; 8]>,
    added: SmallVec<[AgentId; 4]>,
    removed: SmallVec<[AgentId; 4]>,
}

impl FormationMembers {
    #[inline]
    fn push(&mut self, id: AgentId) {
        self.members.push(id);
        self.added.push(id);
    }

    #[inline]
    fn swap_remove(&mut self, index: usize) -> AgentId {
        let id = self.members.swap_remove(index);
        self.removed.push(id);
        id
    }

    pub fn index_of(&self, id: AgentId) -> Option<usize> {
        self.members.iter().position(|member| *member == id)
    }

    pub fn is_dirty(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }

    /// Drains the accumulated (added, removed) ids.
    pub fn take_changes(&mut self) -> (SmallVec<[AgentId; 4]>, SmallVec<[AgentId; 4]>) {
        (
            std::mem::take(&mut self.added),
            std::mem::take(&mut self.removed),
        )
    }
}

/// A managed group of formation units.
///
/// While a unit is under group management the group exclusively owns its
/// `position_in_formation`; mutating it behind the group's back leaves the
/// stored assignment stale.
#[derive(Debug, Default)]
pub struct FormationGroup {
    members: FormationMembers,
    units: Vec<FormationUnit>,
    pivot: FormationPivot,
    slotting: SlottingStrategy,
    /// Members beyond this many are not slotted.
    max_size: u32,
    /// Fixed formation size; `None` derives it from the member count.
    size_override: Option<u32>,
    last_assignment: Vec<usize>,
}

impl FormationGroup {
    pub fn new(slotting: SlottingStrategy, max_size: u32) -> Self {
        Self {
            slotting,
            max_size: max_size.max(1),
            ..Default::default()
        }
    }

    pub fn members(&self) -> &FormationMembers {
        &self.members
    }

    pub fn members_mut(&mut self) -> &mut FormationMembers {
        &mut self.members
    }

    pub fn units(&self) -> &[FormationUnit] {
        &self.units
    }

    pub fn unit_of(&self, id: AgentId) -> Option<&FormationUnit> {
        self.members.index_of(id).map(|ii| &self.units[ii])
    }

    pub fn pivot(&self) -> &FormationPivot {
        &self.pivot
    }

    pub fn set_pivot(&mut self, pivot: FormationPivot) {
        self.pivot = pivot;
    }

    pub fn set_slotting(&mut self, slotting: SlottingStrategy) {
        self.slotting = slotting;
    }

    /// Fixes the formation size regardless of member count. Cleared by
    /// passing `None`.
    pub fn set_size_override(&mut self, size: Option<u32>) {
        self.size_override = size;
    }

    pub fn last_assignment(&self) -> &[usize] {
        &self.last_assignment
    }

    pub fn add_member(
        &mut self,
        id: AgentId,
        spec: FormationSpec,
        catch_up: CatchUpSpec,
    ) -> ClampEvents {
        let (unit, events) = FormationUnit::new(spec, catch_up);
        for event in &events {
            tracing::warn!(
                member = id.0,
                field = event.field,
                requested = event.requested,
                applied = event.applied,
                "clamped formation parameter",
            );
        }
        self.members.push(id);
        self.units.push(unit);
        if self.units.len() == self.max_size as usize + 1 {
            // warn once when the roster crosses the limit, not per tick
            tracing::warn!(
                member = id.0,
                max_size = self.max_size,
                "formation over capacity, extra members will be left unslotted",
            );
        }
        events
    }

    pub fn remove_member(&mut self, id: AgentId) -> Option<FormationUnit> {
        let index = self.members.index_of(id)?;
        self.members.swap_remove(index);
        Some(self.units.swap_remove(index))
    }

    /// The number of members that actually get slotted.
    fn managed_count(&self) -> usize {
        let count = self.units.len();
        if count > self.max_size as usize {
            tracing::debug!(
                members = count,
                max_size = self.max_size,
                "formation over capacity, extra members left unslotted",
            );
        }
        count.min(self.max_size as usize)
    }

    /// One full configuration cycle.
    ///
    /// Sizes the formation, computes a candidate slot per member, solves the
    /// assignment and writes the resulting slot indices back into the units,
    /// recomputing their layouts. `agent_positions` must line up with the
    /// member roster.
    pub fn update_configuration(
        &mut self,
        agent_positions: &[TVec3],
    ) -> Result<&[usize], SlottingError> {
        if agent_positions.len() != self.units.len() {
            return Err(SlottingError::CountMismatch {
                agents: agent_positions.len(),
                slots: self.units.len(),
            });
        }
        let managed = self.managed_count();
        if managed == 0 {
            self.last_assignment.clear();
            return Ok(&self.last_assignment);
        }

        let size = self.formation_size(managed);

        // candidate slot per member: list index stands in for the real slot
        let mut slot_positions = Vec::with_capacity(managed);
        for (ii, unit) in self.units.iter_mut().take(managed).enumerate() {
            unit.set_position_in_formation(ii as u32, size);
            unit.recompute();
            slot_positions.push(self.pivot.slot_world_pos(unit.layout().local_offset));
        }

        let assignment = self
            .slotting
            .slot(&agent_positions[..managed], &slot_positions)?;

        // the size must not have drifted between laying out candidates and
        // writing the final assignment back
        debug_assert_eq!(size, self.formation_size(managed));
        debug_assert_eq!(assignment.len(), managed);
        for (ii, slot) in assignment.iter().enumerate() {
            debug_assert_eq!(self.units[ii].spec().size, size);
            self.units[ii].set_position_in_formation(*slot as u32, size);
            self.units[ii].recompute();
        }

        self.last_assignment = assignment;
        Ok(&self.last_assignment)
    }

    fn formation_size(&self, managed: usize) -> u32 {
        let derived = managed as u32;
        match self.size_override {
            None => derived,
            Some(fixed) if fixed >= derived => fixed,
            Some(fixed) => {
                tracing::warn!(
                    fixed,
                    members = derived,
                    "fixed formation size below member count, growing to fit",
                );
                derived
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formation::shapes;
    use crate::formation::ShapeVariant;

    fn line_group(slotting: SlottingStrategy, count: u64) -> FormationGroup {
        let mut group = FormationGroup::new(slotting, 64);
        for id in 0..count {
            group.add_member(
                AgentId(id),
                FormationSpec {
                    spacing: 2.,
                    shape: ShapeVariant::Line,
                    ..Default::default()
                },
                CatchUpSpec::default(),
            );
        }
        group
    }

    #[test]
    fn members_track_changes() {
        let mut members = FormationMembers::default();
        members.push(AgentId(1));
        members.push(AgentId(2));
        assert!(members.is_dirty());
        let (added, removed) = members.take_changes();
        assert_eq!(added.as_slice(), &[AgentId(1), AgentId(2)]);
        assert!(removed.is_empty());
        assert!(!members.is_dirty());

        let index = members.index_of(AgentId(1)).unwrap();
        members.swap_remove(index);
        let (added, removed) = members.take_changes();
        assert!(added.is_empty());
        assert_eq!(removed.as_slice(), &[AgentId(1)]);
        assert_eq!(members.len(), 1);
    }

    #[test]
    fn update_assigns_every_member_a_distinct_slot() {
        let mut group = line_group(
            SlottingStrategy::CostOptimized {
                complexity_ratio: 1.,
            },
            5,
        );
        let positions: Vec<TVec3> = (0..5).map(|ii| TVec3::new(ii as TReal * 3., 0., 1.)).collect();
        let assignment = group.update_configuration(&positions).unwrap().to_vec();

        let mut sorted = assignment.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3, 4]);

        for (ii, unit) in group.units().iter().enumerate() {
            assert_eq!(unit.position_in_formation() as usize, assignment[ii]);
            assert_eq!(unit.spec().size, 5);
            // layout was recomputed for the final slot
            let expected = shapes::compute_position(unit.spec());
            assert_eq!(*unit.layout(), expected);
        }
    }

    #[test]
    fn optimal_slotting_matches_a_sorted_line() {
        // agents already standing on a line get their own slot back
        let mut group = line_group(
            SlottingStrategy::CostOptimized {
                complexity_ratio: 1.,
            },
            5,
        );
        let positions: Vec<TVec3> = (0..5u32)
            .map(|ii| TVec3::new(2. * (ii as TReal - 2.), 0., 0.))
            .collect();
        let assignment = group.update_configuration(&positions).unwrap();
        assert_eq!(assignment, &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn simple_slotting_keeps_roster_order() {
        let mut group = line_group(SlottingStrategy::Simple, 4);
        let positions = vec![TVec3::ZERO; 4];
        let assignment = group.update_configuration(&positions).unwrap();
        assert_eq!(assignment, &[0, 1, 2, 3]);
    }

    #[test]
    fn position_count_mismatch_is_fatal() {
        let mut group = line_group(SlottingStrategy::Simple, 3);
        let positions = vec![TVec3::ZERO; 2];
        assert_eq!(
            group.update_configuration(&positions),
            Err(SlottingError::CountMismatch {
                agents: 2,
                slots: 3
            })
        );
    }

    #[test]
    fn size_override_widens_the_formation() {
        let mut group = line_group(SlottingStrategy::Simple, 3);
        group.set_size_override(Some(7));
        let positions = vec![TVec3::ZERO; 3];
        group.update_configuration(&positions).unwrap();
        for unit in group.units() {
            assert_eq!(unit.spec().size, 7);
            assert!(unit.position_in_formation() < 3);
        }
    }

    #[test]
    fn over_capacity_members_are_left_unslotted() {
        let mut group = FormationGroup::new(SlottingStrategy::Simple, 2);
        for id in 0..4u64 {
            group.add_member(AgentId(id), FormationSpec::default(), CatchUpSpec::default());
        }
        let positions = vec![TVec3::ZERO; 4];
        let assignment = group.update_configuration(&positions).unwrap();
        assert_eq!(assignment.len(), 2);

        // steady state over capacity keeps clamping the same way
        let assignment = group.update_configuration(&positions).unwrap();
        assert_eq!(assignment.len(), 2);
        for unit in &group.units()[..2] {
            assert_eq!(unit.spec().size, 2);
        }
    }

    #[test]
    fn empty_group_is_a_no_op() {
        let mut group = FormationGroup::new(SlottingStrategy::Simple, 8);
        assert_eq!(group.update_configuration(&[]).unwrap(), &[] as &[usize]);
    }

    #[test]
    fn removal_keeps_units_aligned_with_members() {
        let mut group = line_group(SlottingStrategy::Simple, 3);
        group.remove_member(AgentId(0)).unwrap();
        assert_eq!(group.members().len(), 2);
        assert_eq!(group.units().len(), 2);
        assert!(group.unit_of(AgentId(2)).is_some());
        assert!(group.unit_of(AgentId(0)).is_none());
        assert!(group.remove_member(AgentId(0)).is_none());
    }
}
