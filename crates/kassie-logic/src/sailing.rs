//! Allures, ship elements and wind composition.

use serde::{Deserialize, Serialize};

use crate::constants::{allure, oars, sail_angle, wind, RUDDER_MAX, SAIL_TOLERANCE};
use crate::ids::EntityId;
use crate::vector::Vec3;

/// A ship's heading classified relative to the wind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Allure {
    Headwind,
    CloseHauled,
    CloseReach,
    BeamReach,
    BroadReach,
    Running,
}

impl Allure {
    /// Angle between heading and wind direction, in `[0, 360)`.
    pub fn angle(heading: f64, wind_direction: f64) -> f64 {
        (heading - wind_direction).rem_euclid(360.0)
    }

    pub fn from_angle(angle: f64) -> Allure {
        let within = |threshold: f64| threshold < angle && angle < 360.0 - threshold;
        if within(allure::HEADWIND) {
            Allure::Headwind
        } else if within(allure::CLOSE_HAULED) {
            Allure::CloseHauled
        } else if within(allure::CLOSE_REACH) {
            Allure::CloseReach
        } else if within(allure::BEAM_REACH) {
            Allure::BeamReach
        } else if within(allure::BROAD_REACH) {
            Allure::BroadReach
        } else {
            Allure::Running
        }
    }

    /// Allure of a ship heading `heading` under `wind`.
    pub fn of(heading: f64, wind: Vec3) -> Allure {
        Allure::from_angle(Allure::angle(heading, wind.direction()))
    }

    pub fn speed_factor(&self) -> f64 {
        match self {
            Allure::Headwind => -0.3,
            Allure::CloseHauled => 0.5,
            Allure::CloseReach => 0.8,
            Allure::BeamReach => 1.2,
            Allure::BroadReach => 0.9,
            Allure::Running => 0.7,
        }
    }

    /// Best sail orientation, before the tack sign is applied.
    pub fn sail_angle(&self) -> f64 {
        match self {
            Allure::Headwind => sail_angle::HEADWIND,
            Allure::CloseHauled => sail_angle::CLOSE_HAULED,
            Allure::CloseReach => sail_angle::CLOSE_REACH,
            Allure::BeamReach => sail_angle::BEAM_REACH,
            Allure::BroadReach => sail_angle::BROAD_REACH,
            Allure::Running => sail_angle::RUNNING,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Allure::Headwind => "headwind",
            Allure::CloseHauled => "close-hauled",
            Allure::CloseReach => "close reach",
            Allure::BeamReach => "beam reach",
            Allure::BroadReach => "broad reach",
            Allure::Running => "running",
        }
    }
}

/// Signed sail angle the wind asks for, and the sail's own angle in the
/// same frame.
fn target_angle(heading: f64, wind: Vec3, orientation: f64) -> (f64, f64) {
    let allure_angle = Allure::angle(heading, wind.direction());
    let current = -orientation;
    let mut angle = Allure::from_angle(allure_angle).sail_angle();
    if allure_angle < 180.0 {
        angle = -angle;
    }
    if angle == sail_angle::RUNNING && current < 0.0 {
        angle = -sail_angle::RUNNING;
    }
    (angle, current)
}

/// A sail: orientation in degrees (positive to starboard) and whether it
/// is hoisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sail {
    pub orientation: f64,
    pub hoisted: bool,
}

impl Default for Sail {
    fn default() -> Self {
        Self {
            orientation: 5.0,
            hoisted: false,
        }
    }
}

impl Sail {
    /// How well the sail is trimmed, from 0 (useless) to 1 (perfect).
    pub fn orientation_factor(&self, heading: f64, wind: Vec3) -> f64 {
        let (angle, current) = target_angle(heading, wind, self.orientation);
        (1.0 - ((angle - current) / SAIL_TOLERANCE).abs()).max(0.0)
    }

    /// Trims the sail to the best angle for the current allure.
    pub fn orient(&mut self, heading: f64, wind: Vec3) {
        let (mut angle, _) = target_angle(heading, wind, self.orientation);
        if -5.0 < angle && angle < 5.0 {
            angle = if angle >= 0.0 { 5.0 } else { -5.0 };
        }
        self.orientation = -angle;
    }
}

/// Rudder orientation, clamped to `-RUDDER_MAX..=RUDDER_MAX`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rudder {
    pub orientation: i8,
    /// Character currently at the helm.
    pub held_by: Option<EntityId>,
}

impl Rudder {
    pub fn turn_port(&mut self, steps: i8) {
        self.orientation = self.orientation.saturating_sub(steps).max(-RUDDER_MAX);
    }

    pub fn turn_starboard(&mut self, steps: i8) {
        self.orientation = self.orientation.saturating_add(steps).min(RUDDER_MAX);
    }

    pub fn center(&mut self) {
        self.orientation = 0;
    }
}

/// Oars, with a speed setting from `-MAX_SPEED` (backing) to `MAX_SPEED`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Oars {
    pub speed: i8,
}

impl Oars {
    pub fn set_speed(&mut self, speed: i8) {
        self.speed = speed.clamp(-oars::MAX_SPEED, oars::MAX_SPEED);
    }
}

/// Installed ship equipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Element {
    Sail(Sail),
    Rudder(Rudder),
    Gangway { lowered: bool },
    Oars(Oars),
}

impl Element {
    pub fn type_name(&self) -> &'static str {
        match self {
            Element::Sail(_) => "sail",
            Element::Rudder(_) => "rudder",
            Element::Gangway { .. } => "gangway",
            Element::Oars(_) => "oars",
        }
    }
}

/// A wind blowing over part of an expanse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Reach of full influence.
    pub length: f64,
}

/// Wind felt at `position`: every wind of the expanse contributes, weighted
/// by how far its origin lies.
pub fn resultant_wind(position: Vec3, winds: &[Wind]) -> Vec3 {
    winds.iter().fold(Vec3::ZERO, |total, w| {
        let distance = w.position.distance(&position);
        let weight = if distance < w.length {
            wind::NEAR
        } else if distance < w.length * w.length {
            wind::MEDIUM
        } else {
            wind::FAR
        };
        total + w.velocity * weight
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allure_thresholds() {
        assert_eq!(Allure::from_angle(180.0), Allure::Headwind);
        assert_eq!(Allure::from_angle(150.0), Allure::CloseHauled);
        assert_eq!(Allure::from_angle(120.0), Allure::CloseReach);
        assert_eq!(Allure::from_angle(90.0), Allure::BeamReach);
        assert_eq!(Allure::from_angle(270.0), Allure::BeamReach);
        assert_eq!(Allure::from_angle(45.0), Allure::BroadReach);
        assert_eq!(Allure::from_angle(0.0), Allure::Running);
        assert_eq!(Allure::from_angle(20.0), Allure::Running);
    }

    #[test]
    fn test_allure_of_heading() {
        // heading east, wind blowing towards the west: sailing into it
        let wind = Vec3::new(-1.0, 0.0, 0.0);
        assert_eq!(Allure::of(0.0, wind), Allure::Headwind);
        // wind blowing the same way as the ship
        assert_eq!(Allure::of(180.0, wind), Allure::Running);
        assert!(Allure::Headwind.speed_factor() < 0.0);
    }

    #[test]
    fn test_oriented_sail_pulls_fully() {
        let wind = Vec3::new(0.0, 1.0, 0.0);
        let mut sail = Sail {
            orientation: -60.0,
            hoisted: true,
        };
        sail.orient(0.0, wind);
        assert!((sail.orientation_factor(0.0, wind) - 1.0).abs() < 1e-9);

        sail.orientation += 30.0;
        assert_eq!(sail.orientation_factor(0.0, wind), 0.0);
    }

    #[test]
    fn test_rudder_clamped() {
        let mut rudder = Rudder::default();
        rudder.turn_starboard(3);
        rudder.turn_starboard(4);
        assert_eq!(rudder.orientation, RUDDER_MAX);
        rudder.turn_port(20);
        assert_eq!(rudder.orientation, -RUDDER_MAX);
        rudder.center();
        assert_eq!(rudder.orientation, 0);
    }

    #[test]
    fn test_wind_weights() {
        let winds = vec![
            Wind {
                position: Vec3::ZERO,
                velocity: Vec3::new(1.0, 0.0, 0.0),
                length: 3.0,
            },
            Wind {
                position: Vec3::new(5.0, 0.0, 0.0),
                velocity: Vec3::new(0.0, 1.0, 0.0),
                length: 2.5,
            },
        ];
        // 1 from the first (distance 1 < 3), 0.6 from the second (4 < 2.5²)
        let felt = resultant_wind(Vec3::new(1.0, 0.0, 0.0), &winds);
        assert!((felt.x - 1.0).abs() < 1e-9);
        assert!((felt.y - 0.6).abs() < 1e-9);

        let far = resultant_wind(Vec3::new(100.0, 0.0, 0.0), &winds);
        assert!((far.x - 0.3).abs() < 1e-9);
        assert!((far.y - 0.3).abs() < 1e-9);
    }
}
