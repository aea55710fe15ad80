//! Induced-velocity kernels for unit-strength vortex elements
//!
//! All kernels are regularised: points inside the core radius of a filament
//! endpoint, or on a zero-length segment, get zero velocity, and the
//! perpendicular distance is smoothed by the core radius so nothing diverges.

use crate::core::constants::{INV_PI4, PI2};
use crate::core::types::Vec3;

const TINY: f64 = 1e-300;

/// Velocity at `p` from a straight filament `a -> b`
///
/// v = 1/(4π) (r1 × r2) r0·(r1/|r1| − r2/|r2|) / (|r1 × r2|² + (core |r0|)²)
#[inline]
pub fn segment_velocity(p: Vec3, a: Vec3, b: Vec3, core: f64) -> Vec3 {
    let r0 = b - a;
    let r1 = p - a;
    let r2 = p - b;
    let l0_sqr = r0.length_sqr();
    let l1 = r1.length();
    let l2 = r2.length();
    if l0_sqr <= TINY || l1 <= core || l2 <= core || l1 <= TINY || l2 <= TINY {
        return Vec3::zero();
    }
    let cross = r1.cross(&r2);
    let denom = cross.length_sqr() + core * core * l0_sqr;
    if denom <= TINY {
        return Vec3::zero();
    }
    let k = INV_PI4 * r0.dot(&(r1 / l1 - r2 / l2)) / denom;
    cross * k
}

/// Velocity at `p` from a filament starting at `a` and running to infinity
/// along the unit direction `d`
#[inline]
pub fn semi_infinite_velocity(p: Vec3, a: Vec3, d: Vec3, core: f64) -> Vec3 {
    let r = p - a;
    let lr = r.length();
    if lr <= core || lr <= TINY {
        return Vec3::zero();
    }
    let cross = d.cross(&r);
    let denom = cross.length_sqr() + core * core;
    if denom <= TINY {
        return Vec3::zero();
    }
    cross * (INV_PI4 * (1.0 + d.dot(&r) / lr) / denom)
}

/// Velocity from a polyline through `points` followed by a semi-infinite
/// tail along `tail`
pub fn polyline_velocity(p: Vec3, points: &[Vec3], tail: Vec3, core: f64) -> Vec3 {
    let mut v = Vec3::zero();
    for pair in points.windows(2) {
        v += segment_velocity(p, pair[0], pair[1], core);
    }
    if let Some(&last) = points.last() {
        v += semi_infinite_velocity(p, last, tail, core);
    }
    v
}

/// Far-field velocity of a point doublet with moment `m` (circulation times
/// vector area)
#[inline]
pub fn doublet_velocity(p: Vec3, center: Vec3, m: Vec3) -> Vec3 {
    let r = p - center;
    let r2 = r.length_sqr();
    if r2 <= TINY {
        return Vec3::zero();
    }
    let inv_r = 1.0 / r2.sqrt();
    let inv_r3 = inv_r * inv_r * inv_r;
    (r * (3.0 * m.dot(&r) / r2) - m) * (INV_PI4 * inv_r3)
}

/// Velocity of an infinite straight vortex along unit `d` through `origin`,
/// seen in the plane normal to `d`
#[inline]
pub fn point_vortex_2d(p: Vec3, origin: Vec3, d: Vec3, core: f64) -> Vec3 {
    let r = p - origin;
    let r = r - d * d.dot(&r);
    let denom = r.length_sqr() + core * core;
    if denom <= TINY {
        return Vec3::zero();
    }
    d.cross(&r) / (PI2 * denom)
}
