//! Swept collision of a ship's rooms against expanse obstacles.

use crate::constants::{acceleration, impact, COLLISION_DISTANCE};
use crate::vector::Vec3;

/// Positions a mover goes through from `origin` to `arrival`, one per unit
/// of distance, both ends included.
pub fn sample_positions(origin: Vec3, arrival: Vec3) -> Vec<Vec3> {
    let displacement = arrival - origin;
    let steps = displacement.norm().ceil().max(1.0) as usize;
    (0..=steps)
        .map(|i| origin + displacement * (i as f64 / steps as f64))
        .collect()
}

/// Result of a swept move.
#[derive(Debug, Clone, PartialEq)]
pub enum Sweep {
    Clear,
    Blocked {
        /// Last sample where no room touched an obstacle.
        safe: Vec3,
        obstacle: Vec3,
    },
}

/// Checks every sample against every obstacle.
///
/// `footprint` maps a sampled root position to the points the mover then
/// occupies. The first sample that brings a point within
/// [`COLLISION_DISTANCE`] of an obstacle stops the sweep.
pub fn sweep<F>(samples: &[Vec3], footprint: F, obstacles: &[Vec3]) -> Sweep
where
    F: Fn(Vec3) -> Vec<Vec3>,
{
    let mut safe = match samples.first() {
        Some(first) => *first,
        None => return Sweep::Clear,
    };
    for sample in samples {
        for point in footprint(*sample) {
            if let Some(obstacle) = obstacles
                .iter()
                .find(|o| o.distance(&point) < COLLISION_DISTANCE)
            {
                return Sweep::Blocked {
                    safe,
                    obstacle: *obstacle,
                };
            }
        }
        safe = *sample;
    }
    Sweep::Clear
}

/// Severity of a collision, from the speed just before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Impact {
    Light,
    Violent,
    Crash,
}

impl Impact {
    /// `None` when the contact is too slow to be felt.
    pub fn from_knots(knots: f64) -> Option<Impact> {
        if knots < impact::LIGHT {
            None
        } else if knots < impact::VIOLENT {
            Some(Impact::Light)
        } else if knots < impact::CRASH {
            Some(Impact::Violent)
        } else {
            Some(Impact::Crash)
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Impact::Light => "A light shock shakes the ship.",
            Impact::Violent => "A violent shock shakes the whole ship!",
            Impact::Crash => "Craaash!",
        }
    }
}

/// Message felt aboard when a ship leaves rest, if any.
pub fn acceleration_message(knots_before: f64, knots_after: f64) -> Option<&'static str> {
    if knots_before != 0.0 || knots_after <= acceleration::NOTICEABLE {
        return None;
    }
    if knots_after < acceleration::RAPID {
        Some("You feel the ship gently gather speed.")
    } else {
        Some("You feel the ship rapidly gather speed.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_include_both_ends() {
        let samples = sample_positions(Vec3::ZERO, Vec3::new(2.5, 0.0, 0.0));
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[0], Vec3::ZERO);
        assert_eq!(samples[3], Vec3::new(2.5, 0.0, 0.0));

        let still = sample_positions(Vec3::ZERO, Vec3::ZERO);
        assert_eq!(still.len(), 2);
    }

    #[test]
    fn test_sweep_stops_before_obstacle() {
        let samples = sample_positions(Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0));
        let obstacles = [Vec3::new(2.5, 0.0, 0.0)];
        let result = sweep(&samples, |p| vec![p], &obstacles);
        assert_eq!(
            result,
            Sweep::Blocked {
                safe: Vec3::new(1.0, 0.0, 0.0),
                obstacle: obstacles[0],
            }
        );
        assert_eq!(sweep(&samples, |p| vec![p], &[]), Sweep::Clear);
    }

    #[test]
    fn test_impact_tiers() {
        assert_eq!(Impact::from_knots(0.05), None);
        assert_eq!(Impact::from_knots(0.3), Some(Impact::Light));
        assert_eq!(Impact::from_knots(1.25), Some(Impact::Violent));
        assert_eq!(Impact::from_knots(2.0), Some(Impact::Crash));
    }

    #[test]
    fn test_acceleration_message() {
        assert!(acceleration_message(0.0, 0.01).is_none());
        assert!(acceleration_message(0.2, 0.9).is_none());
        assert!(acceleration_message(0.0, 0.3).unwrap().contains("gently"));
        assert!(acceleration_message(0.0, 0.7).unwrap().contains("rapidly"));
    }
}
