use glam::{Quat, Vec3};

pub mod real {
    pub use std::f32::*;
}

pub type TReal = f32;
pub type TVec3 = Vec3;
pub type TQuat = Quat;

use real::consts::TAU;

/// Offset of item `ii` in a row of `count` items kept centered on zero,
/// in units of one spacing.
#[inline]
pub fn centered_offset(ii: u32, count: u32) -> TReal {
    ii as TReal - ((count.max(1) - 1) as TReal * 0.5)
}

/// Angle of item `ii` when `count` items are spread over a full turn.
#[inline]
pub fn spread_angle(ii: u32, count: u32) -> TReal {
    TAU * ii as TReal / count.max(1) as TReal
}

/// Swaps the vertically computed axis of `offset` into whichever axis carries
/// the dominant component of `up_axis`, taking the sign from that component.
///
/// Shapes are authored with +Y as up; this lets the consumer present them
/// against any world up.
#[inline]
pub fn orient_to_up(offset: TVec3, up_axis: TVec3) -> TVec3 {
    let abs = up_axis.abs();
    let axis = if abs.x > abs.y && abs.x > abs.z {
        0
    } else if abs.z > abs.y && abs.z > abs.x {
        2
    } else {
        1
    };
    let sign = if up_axis[axis] < 0. { -1. } else { 1. };
    let mut out = offset;
    out[axis] = offset.y * sign;
    if axis != 1 {
        out.y = offset[axis];
    }
    out
}

#[test]
fn centered_offset_test() {
    assert!((centered_offset(0, 5) - -2.).abs() < TReal::EPSILON);
    assert!((centered_offset(2, 5) - 0.).abs() < TReal::EPSILON);
    assert!((centered_offset(4, 5) - 2.).abs() < TReal::EPSILON);
    assert!((centered_offset(0, 4) - -1.5).abs() < TReal::EPSILON);
    assert!((centered_offset(0, 1) - 0.).abs() < TReal::EPSILON);
}

#[test]
fn orient_to_up_test() {
    let v = TVec3::new(1., 2., 3.);
    assert_eq!(orient_to_up(v, TVec3::Y), v);
    assert_eq!(orient_to_up(v, TVec3::Z), TVec3::new(1., 3., 2.));
    assert_eq!(orient_to_up(v, TVec3::X), TVec3::new(2., 1., 3.));
    assert_eq!(orient_to_up(v, -TVec3::Z), TVec3::new(1., 3., -2.));
    assert_eq!(orient_to_up(v, -TVec3::X), TVec3::new(-2., 1., 3.));
    // a negative Y up mirrors the vertical component in place
    assert_eq!(orient_to_up(v, -TVec3::Y), TVec3::new(1., -2., 3.));
    // zero up is treated as +Y
    assert_eq!(orient_to_up(v, TVec3::ZERO), v);
}
