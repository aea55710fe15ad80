//! Core geometric types and arena handles

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

// ============================================================================
// Vectors
// ============================================================================

/// 3D point or vector
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    /// X coordinate (streamwise)
    pub x: f64,
    /// Y coordinate (spanwise)
    pub y: f64,
    /// Z coordinate (vertical)
    pub z: f64,
}

impl Vec3 {
    /// Create a new vector
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The zero vector
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn dot(&self, other: &Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Vec3) -> Vec3 {
        Vec3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn length_sqr(&self) -> f64 {
        self.dot(self)
    }

    pub fn length(&self) -> f64 {
        self.length_sqr().sqrt()
    }

    /// Unit vector, `None` for (near) zero length
    pub fn normalize(&self) -> Option<Vec3> {
        let len = self.length();
        if len > 1e-14 && len.is_finite() {
            Some(*self / len)
        } else {
            None
        }
    }

    pub fn distance(&self, other: &Vec3) -> f64 {
        (*self - *other).length()
    }

    /// Component by axis index (0 = x, 1 = y, 2 = z)
    pub fn component(&self, axis: usize) -> f64 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Copy with one component replaced
    pub fn with_component(mut self, axis: usize, value: f64) -> Vec3 {
        match axis {
            0 => self.x = value,
            1 => self.y = value,
            _ => self.z = value,
        }
        self
    }

    /// Scale the streamwise coordinate
    pub fn stretch_x(&self, factor: f64) -> Vec3 {
        Vec3::new(self.x * factor, self.y, self.z)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;
    fn mul(self, s: f64) -> Vec3 {
        Vec3::new(self.x * s, self.y * s, self.z * s)
    }
}

impl Div<f64> for Vec3 {
    type Output = Vec3;
    fn div(self, s: f64) -> Vec3 {
        Vec3::new(self.x / s, self.y / s, self.z / s)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, other: Vec3) {
        self.x += other.x;
        self.y += other.y;
        self.z += other.z;
    }
}

impl SubAssign for Vec3 {
    fn sub_assign(&mut self, other: Vec3) {
        self.x -= other.x;
        self.y -= other.y;
        self.z -= other.z;
    }
}

impl std::iter::Sum for Vec3 {
    fn sum<I: Iterator<Item = Vec3>>(iter: I) -> Vec3 {
        iter.fold(Vec3::zero(), |acc, v| acc + v)
    }
}

// ============================================================================
// Symmetry
// ============================================================================

/// Plane of geometric symmetry, named by its normal axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymmetryPlane {
    /// x = 0
    X,
    /// y = 0 (usual half-span model)
    Y,
    /// z = 0 (ground effect image)
    Z,
}

impl SymmetryPlane {
    /// Index of the normal axis
    pub fn axis(&self) -> usize {
        match self {
            SymmetryPlane::X => 0,
            SymmetryPlane::Y => 1,
            SymmetryPlane::Z => 2,
        }
    }

    /// Mirror image of a point or vector
    pub fn reflect(&self, v: Vec3) -> Vec3 {
        match self {
            SymmetryPlane::X => Vec3::new(-v.x, v.y, v.z),
            SymmetryPlane::Y => Vec3::new(v.x, -v.y, v.z),
            SymmetryPlane::Z => Vec3::new(v.x, v.y, -v.z),
        }
    }

    /// Signed distance of a point from the plane
    pub fn coordinate(&self, v: &Vec3) -> f64 {
        v.component(self.axis())
    }

    /// Project a point onto the plane
    pub fn project(&self, v: Vec3) -> Vec3 {
        v.with_component(self.axis(), 0.0)
    }
}

// ============================================================================
// Bounding boxes
// ============================================================================

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Empty (inverted) box
    pub fn empty() -> Self {
        Self {
            min: Vec3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Vec3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Self {
        let mut bb = Self::empty();
        for p in points {
            bb.expand(p);
        }
        bb
    }

    /// Expand the box to include a point
    pub fn expand(&mut self, p: &Vec3) {
        self.min = Vec3::new(self.min.x.min(p.x), self.min.y.min(p.y), self.min.z.min(p.z));
        self.max = Vec3::new(self.max.x.max(p.x), self.max.y.max(p.y), self.max.z.max(p.z));
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Largest side length
    pub fn max_extent(&self) -> f64 {
        let s = self.size();
        s.x.max(s.y).max(s.z).max(0.0)
    }

    /// Axis index of the largest side
    pub fn longest_axis(&self) -> usize {
        let s = self.size();
        if s.x >= s.y && s.x >= s.z {
            0
        } else if s.y >= s.z {
            1
        } else {
            2
        }
    }
}

// ============================================================================
// Arena handles
// ============================================================================

macro_rules! arena_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub usize);

        impl $name {
            /// Position in the owning arena
            #[inline]
            pub fn index(self) -> usize {
                self.0
            }
        }
    };
}

arena_handle!(
    /// Mesh node
    NodeId
);
arena_handle!(
    /// Bound vortex edge
    EdgeId
);
arena_handle!(
    /// Vortex loop (panel), one circulation unknown
    LoopId
);
arena_handle!(
    /// Trailing vortex line
    LineId
);
arena_handle!(
    /// Vortex sheet (wake of one lifting surface)
    SheetId
);

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cross_and_dot() {
        let x = Vec3::new(1.0, 0.0, 0.0);
        let y = Vec3::new(0.0, 1.0, 0.0);
        assert_eq!(x.cross(&y), Vec3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(x.dot(&y), 0.0);
    }

    #[test]
    fn test_normalize_zero() {
        assert!(Vec3::zero().normalize().is_none());
        let n = Vec3::new(0.0, 3.0, 4.0).normalize().unwrap();
        assert_relative_eq!(n.length(), 1.0);
    }

    #[test]
    fn test_reflection() {
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(SymmetryPlane::Y.reflect(p), Vec3::new(1.0, -2.0, 3.0));
        assert_eq!(SymmetryPlane::Z.project(p), Vec3::new(1.0, 2.0, 0.0));
        assert_relative_eq!(SymmetryPlane::X.coordinate(&p), 1.0);
    }

    #[test]
    fn test_aabb() {
        let pts = [Vec3::new(0.0, -1.0, 0.0), Vec3::new(2.0, 3.0, 0.5)];
        let bb = Aabb::from_points(pts.iter());
        assert_relative_eq!(bb.max_extent(), 4.0);
        assert_eq!(bb.longest_axis(), 1);
        assert_eq!(bb.center(), Vec3::new(1.0, 1.0, 0.25));
    }
}
