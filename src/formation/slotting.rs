//! Decides which agent occupies which formation slot.
//!
//! The cost-optimized strategy blends a cheap greedy pass with an optimal
//! Hungarian pass over whatever the greedy pass left, keyed by a
//! `complexity_ratio` in `[0, 1]`: 0 is all-greedy, 1 is all-optimal. The
//! Hungarian sub-solver is O(m^3); large flocks should keep the ratio low.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::*;

/// Distances are scaled by this before flooring into integer costs.
const COST_SCALE: TReal = 1000.;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlottingError {
    /// Agent and slot counts must match; truncating silently would leave
    /// agents or slots dangling.
    #[error("agent/slot count mismatch: {agents} agents for {slots} slots")]
    CountMismatch { agents: usize, slots: usize },
}

/// How a formation assigns its members to slots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SlottingStrategy {
    /// Members keep their list order.
    Simple,
    /// Travel-cost minimizing assignment.
    CostOptimized { complexity_ratio: TReal },
}

impl Default for SlottingStrategy {
    fn default() -> Self {
        Self::Simple
    }
}

impl SlottingStrategy {
    /// Returns `assignment[agent] = slot` over equal-length position arrays.
    pub fn slot(
        &self,
        agent_positions: &[TVec3],
        slot_positions: &[TVec3],
    ) -> Result<Vec<usize>, SlottingError> {
        match self {
            Self::Simple => {
                check_counts(agent_positions.len(), slot_positions.len())?;
                Ok((0..agent_positions.len()).collect())
            }
            Self::CostOptimized { complexity_ratio } => {
                assign_slots(agent_positions, slot_positions, *complexity_ratio)
            }
        }
    }
}

#[inline]
fn check_counts(agents: usize, slots: usize) -> Result<(), SlottingError> {
    if agents != slots {
        return Err(SlottingError::CountMismatch { agents, slots });
    }
    Ok(())
}

/// Computes a bijection `assignment[agent] = slot` minimizing travel cost.
///
/// `ceil(n * (1 - complexity_ratio))` slots are filled greedily in slot
/// order, the rest optimally over the remaining agents.
pub fn assign_slots(
    agent_positions: &[TVec3],
    slot_positions: &[TVec3],
    complexity_ratio: TReal,
) -> Result<Vec<usize>, SlottingError> {
    check_counts(agent_positions.len(), slot_positions.len())?;
    let n = agent_positions.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let ratio = if (0. ..=1.).contains(&complexity_ratio) {
        complexity_ratio
    } else {
        let clamped = complexity_ratio.clamp(0., 1.);
        tracing::warn!(
            requested = complexity_ratio,
            applied = clamped,
            "complexity_ratio out of range, clamping",
        );
        clamped
    };
    let simple_count = ((n as TReal) * (1. - ratio)).ceil() as usize;
    let simple_count = simple_count.min(n);

    let mut assignment = vec![usize::MAX; n];
    let mut agent_taken = vec![false; n];

    // greedy pass: nearest free agent per slot, in slot order, lowest agent
    // index winning ties
    for (slot, slot_pos) in slot_positions.iter().enumerate().take(simple_count) {
        let mut best = usize::MAX;
        let mut best_dist = TReal::INFINITY;
        for (agent, taken) in agent_taken.iter().enumerate() {
            if *taken {
                continue;
            }
            let dist = agent_positions[agent].distance_squared(*slot_pos);
            if dist < best_dist {
                best_dist = dist;
                best = agent;
            }
        }
        agent_taken[best] = true;
        assignment[best] = slot;
    }

    if simple_count < n {
        // optimal pass over whatever the greedy pass left
        let agent_map = IndexMap::complement(n, &agent_taken);
        let slot_map = IndexMap::from_range(simple_count..n);
        let m = agent_map.len();

        let mut cost = vec![0i64; m * m];
        for row in 0..m {
            let agent_pos = agent_positions[agent_map.to_global(row)];
            for col in 0..m {
                let dist = agent_pos.distance(slot_positions[slot_map.to_global(col)]);
                cost[row * m + col] = (dist * COST_SCALE).floor() as i64;
            }
        }

        let optimal = Munkres::new(m, cost).solve();
        for (row, col) in optimal.into_iter().enumerate() {
            assignment[agent_map.to_global(row)] = slot_map.to_global(col);
        }
    }

    debug_assert!(assignment.iter().all(|slot| *slot < n));
    Ok(assignment)
}

/// Mapping from a dense local index space back to global indices.
///
/// The solver re-indexes the sub-problem left over by the greedy pass; doing
/// the remapping through an explicit table keeps it testable on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IndexMap {
    to_global: Vec<usize>,
}

impl IndexMap {
    /// Locals for every global index in `0..n` not marked used, in order.
    pub(crate) fn complement(n: usize, used: &[bool]) -> Self {
        Self {
            to_global: (0..n).filter(|ii| !used[*ii]).collect(),
        }
    }

    pub(crate) fn from_range(range: std::ops::Range<usize>) -> Self {
        Self {
            to_global: range.collect(),
        }
    }

    #[inline]
    pub(crate) fn to_global(&self, local: usize) -> usize {
        self.to_global[local]
    }

    pub(crate) fn len(&self) -> usize {
        self.to_global.len()
    }
}

/// Hungarian algorithm over a dense integer cost matrix.
struct Munkres {
    n: usize,
    cost: Vec<i64>,
    /// Starred zero per row, the tentative assignment.
    starred: Vec<Option<usize>>,
    primed: Vec<Option<usize>>,
    row_cover: Vec<bool>,
    col_cover: Vec<bool>,
}

impl Munkres {
    fn new(n: usize, cost: Vec<i64>) -> Self {
        debug_assert_eq!(cost.len(), n * n);
        Self {
            n,
            cost,
            starred: vec![None; n],
            primed: vec![None; n],
            row_cover: vec![false; n],
            col_cover: vec![false; n],
        }
    }

    /// Returns `result[row] = col` with minimum total cost.
    fn solve(mut self) -> Vec<usize> {
        if self.n == 0 {
            return Vec::new();
        }
        self.reduce_rows();
        self.star_independent_zeros();
        loop {
            if self.cover_starred_columns() == self.n {
                break;
            }
            loop {
                if let Some((row, col)) = self.find_uncovered_zero() {
                    self.primed[row] = Some(col);
                    if let Some(star_col) = self.starred[row] {
                        self.row_cover[row] = true;
                        self.col_cover[star_col] = false;
                    } else {
                        self.augment(row, col);
                        self.clear_marks();
                        break;
                    }
                } else {
                    self.adjust_costs();
                }
            }
        }
        self.starred
            .iter()
            .map(|star| star.expect("munkres: unstarred row after termination"))
            .collect()
    }

    fn reduce_rows(&mut self) {
        for row in 0..self.n {
            let cells = &mut self.cost[row * self.n..(row + 1) * self.n];
            let min = cells.iter().copied().min().expect("munkres: empty row");
            for cell in cells {
                *cell -= min;
            }
        }
    }

    fn star_independent_zeros(&mut self) {
        let mut col_has_star = vec![false; self.n];
        for row in 0..self.n {
            for col in 0..self.n {
                if self.cost[row * self.n + col] == 0 && !col_has_star[col] {
                    self.starred[row] = Some(col);
                    col_has_star[col] = true;
                    break;
                }
            }
        }
    }

    /// Covers every column holding a star; returns how many are covered.
    fn cover_starred_columns(&mut self) -> usize {
        for star in self.starred.iter().flatten() {
            self.col_cover[*star] = true;
        }
        self.col_cover.iter().filter(|cov| **cov).count()
    }

    fn find_uncovered_zero(&self) -> Option<(usize, usize)> {
        for row in 0..self.n {
            if self.row_cover[row] {
                continue;
            }
            for col in 0..self.n {
                if !self.col_cover[col] && self.cost[row * self.n + col] == 0 {
                    return Some((row, col));
                }
            }
        }
        None
    }

    fn star_in_col(&self, col: usize) -> Option<usize> {
        (0..self.n).find(|row| self.starred[*row] == Some(col))
    }

    /// Flips stars and primes along the alternating path rooted at the
    /// uncovered primed zero `(row, col)`, growing the assignment by one.
    fn augment(&mut self, mut row: usize, mut col: usize) {
        loop {
            let displaced = self.star_in_col(col);
            self.starred[row] = Some(col);
            match displaced {
                Some(star_row) if star_row != row => {
                    let Some(prime_col) = self.primed[star_row] else {
                        break;
                    };
                    row = star_row;
                    col = prime_col;
                }
                _ => break,
            }
        }
    }

    fn clear_marks(&mut self) {
        self.primed.iter_mut().for_each(|prime| *prime = None);
        self.row_cover.iter_mut().for_each(|cov| *cov = false);
        self.col_cover.iter_mut().for_each(|cov| *cov = false);
    }

    /// No uncovered zero left: shift the minimum uncovered cost into the
    /// covered rows and out of the uncovered columns.
    fn adjust_costs(&mut self) {
        let mut min = i64::MAX;
        for row in 0..self.n {
            if self.row_cover[row] {
                continue;
            }
            for col in 0..self.n {
                if !self.col_cover[col] {
                    min = min.min(self.cost[row * self.n + col]);
                }
            }
        }
        for row in 0..self.n {
            for col in 0..self.n {
                if self.row_cover[row] {
                    self.cost[row * self.n + col] += min;
                }
                if !self.col_cover[col] {
                    self.cost[row * self.n + col] -= min;
                }
            }
        }
    }
}
