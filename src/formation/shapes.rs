//! Pure slot geometry for every [`ShapeVariant`].
//!
//! Shapes are authored with +X lateral, +Z towards the back of the formation
//! and +Y up; [`orient_to_up`] then swaps the vertical axis to match the
//! spec's `up_axis`. Everything here is a pure function of its inputs so
//! callers may evaluate layouts from worker threads without locking.
//!
//! Slot 0 is always the back/outer-most slot. The one deliberate exception
//! is the solid circle: it fills geometrically from the center out but keeps
//! the inverted indexing of the boundary circle, so slot 0 lands on the
//! outer ring and the largest index on the filled center.

use crate::formation::{ComputedLayout, FormationSpec, ShapeMode, ShapeVariant};
use crate::math::*;

use real::consts::TAU;

/// Computes the slot offset and layer structure for one agent.
///
/// Deterministic and total: out-of-range fields are clamped locally (use
/// [`FormationSpec::sanitize`] to get clamping reported).
pub fn compute_position(spec: &FormationSpec) -> ComputedLayout {
    let size = spec.size.max(1);
    let index = spec.position_in_formation.min(size - 1);
    let spacing = spec.spacing.max(0.);

    let (offset, layer_count, sparse_layer_count) = if size == 1 {
        // every variant collapses to the formation center
        (TVec3::ZERO, 1, 0)
    } else {
        match spec.shape {
            ShapeVariant::Line => line(index, size, spacing),
            ShapeVariant::Circle { solid: false } => circle_boundary(index, size, spacing),
            ShapeVariant::Circle { solid: true } => circle_solid(index, size, spacing),
            ShapeVariant::Box {
                agents_per_line,
                solid,
                mode,
            } => {
                let (ax, az) = (agents_per_line.0.max(1), agents_per_line.1.max(1));
                match mode {
                    // a one-wide box is a line
                    ShapeMode::Planar if ax == 1 => line(index, size, spacing),
                    ShapeMode::Planar => box_planar(index, size, spacing, ax, solid),
                    // a one-wide spatial box is a wall, i.e. a planar box
                    ShapeMode::Spatial if ax == 1 && az == 1 => line(index, size, spacing),
                    ShapeMode::Spatial if ax == 1 => box_planar(index, size, spacing, az, solid),
                    ShapeMode::Spatial => box_spatial(index, size, spacing, ax, az, solid),
                }
            }
            ShapeVariant::Cross { mode } => cross(index, size, spacing, mode),
            ShapeVariant::Arrow { solid, mode } => match (mode, solid) {
                (ShapeMode::Planar, true) => arrow_planar_solid(index, size, spacing),
                (ShapeMode::Planar, false) => arrow_planar_boundary(index, size, spacing),
                (ShapeMode::Spatial, true) => arrow_spatial_solid(index, size, spacing),
                (ShapeMode::Spatial, false) => arrow_spatial_boundary(index, size, spacing),
            },
            ShapeVariant::Vee {
                agents_per_line,
                solid,
                mode,
            } => {
                let thickness = agents_per_line.0.max(1);
                let height = match mode {
                    ShapeMode::Planar => 1,
                    ShapeMode::Spatial => agents_per_line.1.max(1),
                };
                vee(index, size, spacing, thickness, height, solid)
            }
        }
    };

    ComputedLayout {
        local_offset: orient_to_up(offset, spec.up_axis),
        layer_count,
        sparse_layer_count,
    }
}

fn line(index: u32, size: u32, spacing: TReal) -> (TVec3, u32, u32) {
    let x = spacing * centered_offset(index, size);
    (TVec3::new(x, 0., 0.), 1, 0)
}

fn circle_boundary(index: u32, size: u32, spacing: TReal) -> (TVec3, u32, u32) {
    // radius that puts neighbours one spacing apart along the arc
    let radius = spacing * size as TReal / TAU;
    let angle = spread_angle(index, size);
    (
        TVec3::new(radius * angle.cos(), 0., radius * angle.sin()),
        1,
        0,
    )
}

/// Capacity of the solid-circle ring at radius `spacing * m` (`m >= 1`).
#[inline]
fn circle_ring_cap(m: u32) -> u32 {
    (TAU * m as TReal).floor() as u32
}

fn circle_solid(index: u32, size: u32, spacing: TReal) -> (TVec3, u32, u32) {
    // rings fill from the center point out; indexing runs the other way
    let mut rings = 0u32;
    let mut capacity = 1u32; // center point
    while capacity < size {
        rings += 1;
        capacity += circle_ring_cap(rings);
    }
    let outer_cap = circle_ring_cap(rings);
    let outer_count = size - (capacity - outer_cap);

    let at_ring = |ring: u32, ii: u32, count: u32| {
        let angle = spread_angle(ii, count);
        let radius = spacing * ring as TReal;
        TVec3::new(radius * angle.cos(), 0., radius * angle.sin())
    };

    let layer_count = rings + 1;
    let sparse = u32::from(outer_count < outer_cap);
    if index < outer_count {
        // sparse outer ring, re-spread over equal angles
        return (at_ring(rings, index, outer_count), layer_count, sparse);
    }
    let mut idx = index - outer_count;
    for ring in (1..rings).rev() {
        let cap = circle_ring_cap(ring);
        if idx < cap {
            return (at_ring(ring, idx, cap), layer_count, sparse);
        }
        idx -= cap;
    }
    // largest index sits on the filled center
    (TVec3::ZERO, layer_count, sparse)
}

/// Depth position of row `row` when `rows` rows fill back (+Z) to front.
#[inline]
fn row_depth(row: u32, rows: u32, spacing: TReal) -> TReal {
    spacing * centered_offset(rows - 1 - row, rows)
}

fn box_planar(index: u32, size: u32, spacing: TReal, ax: u32, solid: bool) -> (TVec3, u32, u32) {
    if solid {
        let rows = (size + ax - 1) / ax;
        let row = index / ax;
        let count = if row == rows - 1 { size - row * ax } else { ax };
        let x = spacing * centered_offset(index % ax, count);
        let z = row_depth(row, rows, spacing);
        (TVec3::new(x, 0., z), rows, u32::from(size % ax != 0))
    } else {
        box_planar_boundary(index, size, spacing, ax)
    }
}

fn box_planar_boundary(index: u32, size: u32, spacing: TReal, ax: u32) -> (TVec3, u32, u32) {
    // width stays fixed, depth grows until the perimeter fits everyone
    let mut depth = 1u32;
    while rect_perim_cap(ax, depth) < size {
        depth += 1;
    }
    let back = ax.min(size);
    let side_rows = depth.saturating_sub(2);
    let front_count = size.saturating_sub(ax + 2 * side_rows);
    let last_row_count = if depth == 1 { back } else { front_count };
    let sparse = u32::from(last_row_count < ax);

    if depth == 1 {
        // a single sparse row, kept centered
        let x = spacing * centered_offset(index, back);
        return (TVec3::new(x, 0., 0.), 1, sparse);
    }
    if index < ax {
        // back row
        let x = spacing * centered_offset(index, ax);
        return (TVec3::new(x, 0., row_depth(0, depth, spacing)), depth, sparse);
    }
    let idx = index - ax;
    if idx < 2 * side_rows {
        // side columns, paired left/right per row
        let row = 1 + idx / 2;
        let col = if idx % 2 == 0 { 0 } else { ax - 1 };
        let x = spacing * centered_offset(col, ax);
        return (
            TVec3::new(x, 0., row_depth(row, depth, spacing)),
            depth,
            sparse,
        );
    }
    // front row; a partial one is re-centered
    let jj = idx - 2 * side_rows;
    let x = spacing * centered_offset(jj, front_count);
    (
        TVec3::new(x, 0., row_depth(depth - 1, depth, spacing)),
        depth,
        sparse,
    )
}

/// Splits `remaining` agents over a sub-grid no wider than `ax` and no deeper
/// than `az`, keeping the patch as square as possible.
fn sparse_grid_extent(remaining: u32, ax: u32, az: u32) -> (u32, u32) {
    let mut sx = (remaining as TReal).sqrt().ceil() as u32;
    sx = sx.clamp(1, ax);
    let mut rows = (remaining + sx - 1) / sx;
    if rows > az {
        rows = az;
        sx = ((remaining + rows - 1) / rows).min(ax);
    }
    (sx, rows)
}

fn box_spatial(
    index: u32,
    size: u32,
    spacing: TReal,
    ax: u32,
    az: u32,
    solid: bool,
) -> (TVec3, u32, u32) {
    if !solid {
        return box_spatial_boundary(index, size, spacing, ax, az);
    }
    let per_layer = ax * az;
    let layers = (size + per_layer - 1) / per_layer;
    let layer = index / per_layer;
    let li = index % per_layer;
    let remaining = if layer == layers - 1 {
        size - layer * per_layer
    } else {
        per_layer
    };
    let (sx, rows) = if remaining == per_layer {
        (ax, az)
    } else {
        sparse_grid_extent(remaining, ax, az)
    };
    let row = li / sx;
    let count = (remaining - row * sx).min(sx);
    let x = spacing * centered_offset(li % sx, count);
    let z = row_depth(row, rows, spacing);
    let y = spacing * centered_offset(layer, layers);
    (
        TVec3::new(x, y, z),
        layers,
        u32::from(size % per_layer != 0),
    )
}

fn box_spatial_boundary(
    index: u32,
    size: u32,
    spacing: TReal,
    ax: u32,
    az: u32,
) -> (TVec3, u32, u32) {
    let full = ax * az;
    let ring = rect_perim_cap(ax, az);
    let layer_cap = |layer: u32, layers: u32| {
        if layer == 0 || layer == layers - 1 {
            full
        } else {
            ring
        }
    };
    let cap = |layers: u32| {
        if layers == 1 {
            full
        } else {
            2 * full + (layers - 2) * ring
        }
    };
    let mut layers = 1u32;
    while cap(layers) < size {
        layers += 1;
    }

    let mut idx = index;
    let mut placed = 0u32;
    for layer in 0..layers {
        let this_cap = layer_cap(layer, layers).min(size - placed);
        if idx < this_cap {
            let (col, row) = if layer_cap(layer, layers) == full {
                (idx % ax, idx / ax)
            } else {
                rect_perim_cell(idx, ax, az)
            };
            let x = spacing * centered_offset(col, ax);
            let z = row_depth(row, az, spacing);
            let y = spacing * centered_offset(layer, layers);
            let top_count = size - (cap(layers) - layer_cap(layers - 1, layers)).min(size);
            let sparse = u32::from(top_count < layer_cap(layers - 1, layers));
            return (TVec3::new(x, y, z), layers, sparse);
        }
        idx -= this_cap;
        placed += this_cap;
    }
    // unreachable for index < size; keep the function total
    (TVec3::ZERO, layers, 0)
}

fn cross(index: u32, size: u32, spacing: TReal, mode: ShapeMode) -> (TVec3, u32, u32) {
    const PLANAR_ARMS: [TVec3; 4] = [TVec3::Z, TVec3::NEG_Z, TVec3::X, TVec3::NEG_X];
    const SPATIAL_ARMS: [TVec3; 6] = [
        TVec3::Z,
        TVec3::NEG_Z,
        TVec3::X,
        TVec3::NEG_X,
        TVec3::Y,
        TVec3::NEG_Y,
    ];
    let dirs: &[TVec3] = match mode {
        ShapeMode::Planar => &PLANAR_ARMS,
        ShapeMode::Spatial => &SPATIAL_ARMS,
    };
    let arms = dirs.len() as u32;
    let rings = (size - 1 + arms - 1) / arms;
    let outer_count = size - 1 - arms * (rings - 1);
    let sparse = u32::from(outer_count < arms);

    if index < outer_count {
        let offset = dirs[index as usize] * (spacing * rings as TReal);
        return (offset, rings + 1, sparse);
    }
    let idx = index - outer_count;
    // rings below the outer one are full; ring 0 is the center slot
    let ring = rings - 1 - idx / arms;
    let offset = dirs[(idx % arms) as usize] * (spacing * ring as TReal);
    (offset, rings + 1, sparse)
}

fn arrow_planar_solid(index: u32, size: u32, spacing: TReal) -> (TVec3, u32, u32) {
    // row k holds k agents; the wide back row is the sparse one
    let mut rows = 1u32;
    let mut capacity = 1u32;
    while capacity < size {
        rows += 1;
        capacity += rows;
    }
    let back_count = size - (capacity - rows);
    let sparse = u32::from(back_count < rows);

    if index < back_count {
        let x = spacing * centered_offset(index, back_count);
        return (TVec3::new(x, 0., row_depth(0, rows, spacing)), rows, sparse);
    }
    let mut idx = index - back_count;
    for k in (1..rows).rev() {
        if idx < k {
            let x = spacing * centered_offset(idx, k);
            return (
                TVec3::new(x, 0., row_depth(rows - k, rows, spacing)),
                rows,
                sparse,
            );
        }
        idx -= k;
    }
    (TVec3::ZERO, rows, sparse)
}

fn arrow_planar_boundary(index: u32, size: u32, spacing: TReal) -> (TVec3, u32, u32) {
    // full back row plus the two slanted edges and the tip
    let mut rows = 2u32;
    while 3 * rows - 3 < size {
        rows += 1;
    }
    let edge_count = 1 + 2 * (rows - 2);
    let back_count = size - edge_count;
    let sparse = u32::from(back_count < rows);

    if index < back_count {
        let x = spacing * centered_offset(index, back_count);
        return (TVec3::new(x, 0., row_depth(0, rows, spacing)), rows, sparse);
    }
    let idx = index - back_count;
    if idx < 2 * (rows - 2) {
        let k = rows - 1 - idx / 2;
        let half_width = (k - 1) as TReal * 0.5;
        let x = if idx % 2 == 0 {
            -spacing * half_width
        } else {
            spacing * half_width
        };
        return (
            TVec3::new(x, 0., row_depth(rows - k, rows, spacing)),
            rows,
            sparse,
        );
    }
    // tip
    (
        TVec3::new(0., 0., row_depth(rows - 1, rows, spacing)),
        rows,
        sparse,
    )
}

fn arrow_spatial_solid(index: u32, size: u32, spacing: TReal) -> (TVec3, u32, u32) {
    // layer k is a k by k wall of agents; a pyramid pointing forward
    let mut layers = 1u32;
    let mut capacity = 1u32;
    while capacity < size {
        layers += 1;
        capacity += layers * layers;
    }
    let back_count = size - (capacity - layers * layers);
    let sparse = u32::from(back_count < layers * layers);

    let wall = |ii: u32, sx: u32, count: u32, rows: u32, k: u32| {
        let row = ii / sx;
        let row_count = (count - row * sx).min(sx);
        let x = spacing * centered_offset(ii % sx, row_count);
        let y = spacing * centered_offset(row, rows);
        TVec3::new(x, y, row_depth(layers - k, layers, spacing))
    };

    if index < back_count {
        let (sx, rows) = if back_count == layers * layers {
            (layers, layers)
        } else {
            sparse_grid_extent(back_count, layers, layers)
        };
        return (wall(index, sx, back_count, rows, layers), layers, sparse);
    }
    let mut idx = index - back_count;
    for k in (1..layers).rev() {
        let cap = k * k;
        if idx < cap {
            return (wall(idx, k, cap, k, k), layers, sparse);
        }
        idx -= cap;
    }
    (TVec3::ZERO, layers, sparse)
}

fn arrow_spatial_boundary(index: u32, size: u32, spacing: TReal) -> (TVec3, u32, u32) {
    // hollow pyramid: the perimeter ring of each layer plus the tip
    let ring_cap = |k: u32| if k <= 1 { 1 } else { 4 * (k - 1) };
    let mut layers = 2u32;
    let mut capacity = 1 + ring_cap(2);
    while capacity < size {
        layers += 1;
        capacity += ring_cap(layers);
    }
    let back_count = size - (capacity - ring_cap(layers));
    let sparse = u32::from(back_count < ring_cap(layers));

    let at_ring = |ii: u32, k: u32| {
        let (col, row) = rect_perim_cell(ii, k, k);
        TVec3::new(
            spacing * centered_offset(col, k),
            spacing * centered_offset(row, k),
            row_depth(layers - k, layers, spacing),
        )
    };

    if index < back_count {
        return (at_ring(index, layers), layers, sparse);
    }
    let mut idx = index - back_count;
    for k in (2..layers).rev() {
        let cap = ring_cap(k);
        if idx < cap {
            return (at_ring(idx, k), layers, sparse);
        }
        idx -= cap;
    }
    // tip
    (
        TVec3::new(0., 0., row_depth(layers - 1, layers, spacing)),
        layers,
        sparse,
    )
}

fn vee(
    index: u32,
    size: u32,
    spacing: TReal,
    thickness: u32,
    height: u32,
    solid: bool,
) -> (TVec3, u32, u32) {
    let diag = real::consts::FRAC_1_SQRT_2;
    // wing thickness is modelled as nested chevrons shifted towards the back;
    // spatial mode extrudes each chevron vertically
    let section = cross_section_cells(thickness, height, solid);
    let per_cell = section.len() as u32;
    let rank_cap = 2 * per_cell;

    let ranks = if size <= per_cell {
        0
    } else {
        (size - per_cell + rank_cap - 1) / rank_cap
    };
    let outer_count = if ranks == 0 {
        0
    } else {
        size - per_cell - rank_cap * (ranks - 1)
    };
    let layer_count = ranks + 1;
    let sparse = if ranks == 0 {
        u32::from(size < per_cell)
    } else {
        u32::from(outer_count < rank_cap)
    };

    let cell_pos = |rank: u32, side: u32, cell: (u32, u32)| {
        let along = spacing * rank as TReal * diag;
        let x = if side == 0 { -along } else { along };
        TVec3::new(
            x,
            spacing * centered_offset(cell.1, height),
            along + spacing * cell.0 as TReal,
        )
    };

    if index < outer_count {
        // sparse outermost rank alternates wings to stay balanced
        let side = index % 2;
        let cell = section[(index / 2) as usize];
        return (cell_pos(ranks, side, cell), layer_count, sparse);
    }
    let mut idx = index - outer_count;
    for rank in (1..ranks).rev() {
        if idx < rank_cap {
            let side = idx % 2;
            let cell = section[(idx / 2) as usize];
            return (cell_pos(rank, side, cell), layer_count, sparse);
        }
        idx -= rank_cap;
    }
    // apex column, last indices
    let cell = section[idx as usize % section.len()];
    (
        TVec3::new(
            0.,
            spacing * centered_offset(cell.1, height),
            spacing * cell.0 as TReal,
        ),
        layer_count,
        sparse,
    )
}

/// Cells of a `nx` by `nz` cross-section in fill order, full or
/// perimeter-only.
fn cross_section_cells(nx: u32, nz: u32, solid: bool) -> Vec<(u32, u32)> {
    if solid || nx <= 2 || nz <= 2 {
        (0..nx * nz).map(|ii| (ii % nx, ii / nx)).collect()
    } else {
        (0..rect_perim_cap(nx, nz))
            .map(|ii| rect_perim_cell(ii, nx, nz))
            .collect()
    }
}

/// Number of cells on the perimeter of a `nx` by `nz` rectangle.
#[inline]
fn rect_perim_cap(nx: u32, nz: u32) -> u32 {
    if nz == 1 {
        nx
    } else if nx == 1 {
        nz
    } else {
        2 * nx + 2 * (nz - 2)
    }
}

/// The `ii`-th perimeter cell of a `nx` by `nz` rectangle: back row first,
/// then left/right column pairs, then the front row.
fn rect_perim_cell(ii: u32, nx: u32, nz: u32) -> (u32, u32) {
    if nz == 1 {
        return (ii, 0);
    }
    if nx == 1 {
        return (0, ii);
    }
    if ii < nx {
        return (ii, 0);
    }
    let idx = ii - nx;
    let side_cells = 2 * (nz - 2);
    if idx < side_cells {
        let row = 1 + idx / 2;
        let col = if idx % 2 == 0 { 0 } else { nx - 1 };
        return (col, row);
    }
    (idx - side_cells, nz - 1)
}
