//! 3D vectors used for coordinates, headings, velocities and forces.
//!
//! Angles are in degrees. Headings are measured counter-clockwise from east
//! (+x) so that north (+y) is 90°, the usual mathematical convention.

use serde::{Deserialize, Serialize};

use crate::coords::Coords;
use crate::direction::Direction;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn norm_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn norm(&self) -> f64 {
        self.norm_squared().sqrt()
    }

    pub fn distance(&self, other: &Self) -> f64 {
        (*self - *other).norm()
    }

    pub fn normalize(&self) -> Self {
        let len = self.norm();
        if len > 0.0 {
            *self * (1.0 / len)
        } else {
            Self::ZERO
        }
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    /// Horizontal heading in `[0, 360)`.
    pub fn direction(&self) -> f64 {
        if self.x == 0.0 && self.y == 0.0 {
            return 0.0;
        }
        self.y.atan2(self.x).to_degrees().rem_euclid(360.0)
    }

    /// Angle above the horizontal plane, in `[-90, 90]`.
    pub fn inclination(&self) -> f64 {
        let horizontal = self.x.hypot(self.y);
        if horizontal == 0.0 && self.z == 0.0 {
            return 0.0;
        }
        self.z.atan2(horizontal).to_degrees()
    }

    /// Rotates around the vertical axis, counter-clockwise.
    pub fn rotate_z(&self, degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self {
            x: self.x * cos - self.y * sin,
            y: self.x * sin + self.y * cos,
            z: self.z,
        }
    }

    /// Tilts the vector up (positive) or down inside the vertical plane that
    /// contains it. Length is preserved.
    pub fn incline(&self, degrees: f64) -> Self {
        if degrees == 0.0 {
            return *self;
        }
        let norm = self.norm();
        if norm == 0.0 {
            return *self;
        }
        let horizontal = self.x.hypot(self.y);
        let (ux, uy) = if horizontal > 0.0 {
            (self.x / horizontal, self.y / horizontal)
        } else {
            (1.0, 0.0)
        };
        let angle = self.z.atan2(horizontal) + degrees.to_radians();
        let h = norm * angle.cos();
        Self {
            x: ux * h,
            y: uy * h,
            z: norm * angle.sin(),
        }
    }

    /// Compass name of the direction this vector points to.
    pub fn direction_name(&self) -> Direction {
        Direction::from_vector(*self)
    }

    pub fn round(&self) -> Coords {
        Coords::new(
            self.x.round() as i32,
            self.y.round() as i32,
            self.z.round() as i32,
        )
    }
}

impl From<Coords> for Vec3 {
    fn from(c: Coords) -> Self {
        Vec3::new(c.x as f64, c.y as f64, c.z as f64)
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

impl std::ops::AddAssign for Vec3 {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

impl std::ops::Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }
}

impl std::ops::Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, scalar: f64) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
            z: self.z * scalar,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        let sum = a + b;
        assert_eq!(sum, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(b - a, Vec3::new(3.0, 3.0, 3.0));
        assert_eq!(a * 2.0, Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(-a, Vec3::new(-1.0, -2.0, -3.0));
    }

    #[test]
    fn test_direction_and_rotation() {
        let east = Vec3::new(1.0, 0.0, 0.0);
        assert!(close(east.direction(), 0.0));

        let north = east.rotate_z(90.0);
        assert!(close(north.x, 0.0));
        assert!(close(north.y, 1.0));
        assert!(close(north.direction(), 90.0));

        let south = Vec3::new(0.0, -3.0, 0.0);
        assert!(close(south.direction(), 270.0));
    }

    #[test]
    fn test_incline_preserves_length() {
        let v = Vec3::new(3.0, 4.0, 0.0);
        let tilted = v.incline(30.0);
        assert!(close(tilted.norm(), 5.0));
        assert!(close(tilted.inclination(), 30.0));
        assert!(close(tilted.direction(), v.direction()));
    }

    #[test]
    fn test_normalize_zero_is_zero() {
        assert_eq!(Vec3::ZERO.normalize(), Vec3::ZERO);
        let n = Vec3::new(0.0, 0.0, 2.0).normalize();
        assert!(close(n.norm(), 1.0));
    }
}
