//! 3D vector type used for tracker positions and displacements.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};

/// Position or displacement in tracking space (meters, f32).
///
/// Deserializes from either `[x, y, z]` or `{ x = .., y = .., z = .. }`.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// A tracked point's position snapshot for one tick
pub type Position = Vec3;

impl Vec3 {
    /// Create a new vector
    #[inline]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Zero vector (origin)
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Length (magnitude)
    #[inline]
    pub fn length(&self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Squared length (avoids sqrt)
    #[inline]
    pub fn length_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Normalize to unit length.
    ///
    /// A zero-length (or non-finite) vector normalizes to [`Vec3::ZERO`]
    /// instead of producing NaN components.
    #[inline]
    pub fn normalize(&self) -> Vec3 {
        let len = self.length();
        if len > 0.0 && len.is_finite() {
            Vec3::new(self.x / len, self.y / len, self.z / len)
        } else {
            Vec3::ZERO
        }
    }

    /// Euclidean distance to another point
    #[inline]
    pub fn distance(&self, other: &Vec3) -> f32 {
        (*other - *self).length()
    }

    /// True if every component is finite
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f32) -> Self {
        Vec3::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

/// Formats as `(x, y, z)`; honors the precision flag (`{:.3}`).
impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match f.precision() {
            Some(p) => write!(f, "({:.p$}, {:.p$}, {:.p$})", self.x, self.y, self.z, p = p),
            None => write!(f, "({}, {}, {})", self.x, self.y, self.z),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_vec3_sub() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 6.0, 8.0);
        assert_eq!(b - a, Vec3::new(3.0, 4.0, 5.0));
    }

    #[test]
    fn test_vec3_length() {
        let v = Vec3::new(2.0, 3.0, 6.0);
        assert_relative_eq!(v.length(), 7.0, epsilon = 1e-6);
        assert_relative_eq!(v.length_squared(), 49.0, epsilon = 1e-6);
    }

    #[test]
    fn test_normalize_unit_length() {
        let n = Vec3::new(-3.0, 0.5, 12.0).normalize();
        assert_relative_eq!(n.length(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_normalize_zero_is_zero() {
        let n = Vec3::ZERO.normalize();
        assert_eq!(n, Vec3::ZERO);
        assert!(n.is_finite());
    }

    #[test]
    fn test_normalize_non_finite_is_zero() {
        let n = Vec3::new(f32::INFINITY, 0.0, 0.0).normalize();
        assert_eq!(n, Vec3::ZERO);
    }

    #[test]
    fn test_deserialize_from_array_or_table() {
        #[derive(serde::Deserialize)]
        struct Holder {
            a: Vec3,
            b: Vec3,
        }
        let h: Holder = toml::from_str("a = [1.0, 2.0, 3.0]\nb = { x = -1.0, y = 0.5, z = 0.0 }").unwrap();
        assert_eq!(h.a, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(h.b, Vec3::new(-1.0, 0.5, 0.0));
    }

    #[test]
    fn test_display_precision() {
        let v = Vec3::new(1.0, -0.5, 0.126);
        assert_eq!(format!("{:.2}", v), "(1.00, -0.50, 0.13)");
        assert_eq!(format!("{}", v), "(1, -0.5, 0.126)");
    }
}
