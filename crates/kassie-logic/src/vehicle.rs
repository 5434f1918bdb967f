//! Vehicle kinematics and the forces acting on a ship.

use serde::{Deserialize, Serialize};

use crate::constants::{oars, ship, KNOTS_PER_UNIT, SAIL_EFFICIENCY};
use crate::sailing::{Allure, Oars, Sail};
use crate::vector::Vec3;

/// Position, motion and heading of a vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kinematics {
    pub position: Vec3,
    pub velocity: Vec3,
    pub acceleration: Vec3,
    /// Unit vector the bow points to.
    pub heading: Vec3,
    pub mass: f64,
    /// Exponential damping rate of the velocity, per second.
    pub drag: f64,
}

impl Default for Kinematics {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            heading: Vec3::new(1.0, 0.0, 0.0),
            mass: ship::MASS,
            drag: ship::DRAG,
        }
    }
}

impl Kinematics {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn speed(&self) -> f64 {
        self.velocity.norm()
    }

    pub fn speed_knots(&self) -> f64 {
        self.speed() * KNOTS_PER_UNIT
    }

    /// Horizontal heading in degrees.
    pub fn heading_degrees(&self) -> f64 {
        self.heading.direction()
    }

    /// Integrates `force` over `dt` seconds and moves the vehicle.
    pub fn advance(&mut self, force: Vec3, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let mass = if self.mass > 0.0 { self.mass } else { ship::MASS };
        self.acceleration = force * (1.0 / mass);
        self.velocity = self.velocity * (-self.drag * dt).exp() + self.acceleration * dt;
        self.position += self.velocity * dt;
    }

    /// Turns the heading by `degrees`, counter-clockwise.
    pub fn turn(&mut self, degrees: f64) {
        self.heading = self.heading.rotate_z(degrees).normalize();
    }

    pub fn stop(&mut self) {
        self.velocity = Vec3::ZERO;
        self.acceleration = Vec3::ZERO;
    }
}

/// Force of the hoisted sails under `wind`.
///
/// The mean orientation factor of hoisted sails, scaled by the allure
/// factor and the wind strength, pushes along the heading.
pub fn propulsion(sails: &[&Sail], heading: Vec3, wind: Vec3) -> Vec3 {
    let hoisted: Vec<&Sail> = sails.iter().copied().filter(|s| s.hoisted).collect();
    if hoisted.is_empty() || wind.is_zero() {
        return Vec3::ZERO;
    }
    let degrees = heading.direction();
    let trim = hoisted
        .iter()
        .map(|s| s.orientation_factor(degrees, wind))
        .sum::<f64>()
        / hoisted.len() as f64
        * SAIL_EFFICIENCY;
    let allure = Allure::of(degrees, wind);
    heading * (allure.speed_factor() * trim * wind.norm())
}

/// Force of the oars, along the heading.
pub fn rowing(oars: &[&Oars], heading: Vec3) -> Vec3 {
    let steps: i32 = oars.iter().map(|o| o.speed as i32).sum();
    heading * (steps as f64 * oars::FORCE_PER_STEP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_without_drag() {
        let mut k = Kinematics::at(Vec3::ZERO);
        k.drag = 0.0;
        k.advance(Vec3::new(2.0, 0.0, 0.0), 1.0);
        assert_eq!(k.velocity, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(k.position, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(k.acceleration, Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_drag_slows_down() {
        let mut k = Kinematics::default();
        k.velocity = Vec3::new(4.0, 0.0, 0.0);
        k.advance(Vec3::ZERO, 1.0);
        assert!(k.speed() < 4.0);
        assert!(k.speed() > 0.0);
    }

    #[test]
    fn test_propulsion_needs_hoisted_sail() {
        let wind = Vec3::new(0.0, 2.0, 0.0);
        let heading = Vec3::new(1.0, 0.0, 0.0);
        let mut sail = Sail::default();
        assert_eq!(propulsion(&[&sail], heading, wind), Vec3::ZERO);

        sail.hoisted = true;
        sail.orient(0.0, wind);
        let force = propulsion(&[&sail], heading, wind);
        // beam reach, perfectly trimmed: 1.2 * 0.7 * 2
        assert!((force.x - 1.68).abs() < 1e-9);
        assert!(force.y.abs() < 1e-9);
    }

    #[test]
    fn test_rowing_follows_heading() {
        let oars = Oars { speed: 2 };
        let force = rowing(&[&oars], Vec3::new(0.0, 1.0, 0.0));
        assert!((force.y - 0.8).abs() < 1e-9);
    }
}
