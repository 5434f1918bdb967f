//! A ship as a rigid body: kinematics, room layout and equipment.
//!
//! Room offsets are expressed in the ship's own frame, `x` to starboard and
//! `y` towards the bow. Each tick the offsets are rotated to the current
//! heading, inclined, and added to the root position to place every room.

use serde::{Deserialize, Serialize};

use crate::collision::{acceleration_message, sample_positions, sweep, Impact, Sweep};
use crate::coords::Coords;
use crate::expanse::Expanse;
use crate::sailing::{Allure, Element, Oars, Rudder, Sail};
use crate::vector::Vec3;
use crate::vehicle::{propulsion, rowing, Kinematics};

/// Equipment installed in one of the ship's rooms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mounted {
    pub room: Coords,
    pub element: Element,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vessel {
    pub kinematics: Kinematics,
    /// Offsets of the ship's rooms in the ship frame.
    pub offsets: Vec<Coords>,
    pub elements: Vec<Mounted>,
    pub immobilized: bool,
    pub in_collision: bool,
}

/// What happened during one [`Vessel::advance`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvanceOutcome {
    pub impact: Option<Impact>,
    pub collided: bool,
    /// Messages for everyone aboard.
    pub messages: Vec<String>,
}

impl Vessel {
    pub fn new(position: Vec3, offsets: Vec<Coords>) -> Self {
        Self {
            kinematics: Kinematics::at(position),
            offsets,
            ..Self::default()
        }
    }

    pub fn position(&self) -> Vec3 {
        self.kinematics.position
    }

    /// Where a ship-frame offset lies when the root stands at `root`.
    pub fn place(&self, root: Vec3, offset: Coords) -> Vec3 {
        let heading = self.kinematics.heading;
        root + Vec3::from(offset)
            .rotate_z(heading.direction() - 90.0)
            .incline(heading.inclination())
    }

    fn footprint(&self, root: Vec3) -> Vec<Vec3> {
        self.offsets.iter().map(|o| self.place(root, *o)).collect()
    }

    /// Current world position of every room, by ship-frame offset.
    pub fn room_positions(&self) -> Vec<(Coords, Vec3)> {
        let root = self.position();
        self.offsets.iter().map(|o| (*o, self.place(root, *o))).collect()
    }

    pub fn sails(&self) -> Vec<&Sail> {
        self.elements
            .iter()
            .filter_map(|m| match &m.element {
                Element::Sail(sail) => Some(sail),
                _ => None,
            })
            .collect()
    }

    /// Sail mounted in `room`, if any.
    pub fn sail_mut(&mut self, room: Coords) -> Option<&mut Sail> {
        self.elements
            .iter_mut()
            .filter(|m| m.room == room)
            .find_map(|m| match &mut m.element {
                Element::Sail(sail) => Some(sail),
                _ => None,
            })
    }

    fn oars(&self) -> Vec<&Oars> {
        self.elements
            .iter()
            .filter_map(|m| match &m.element {
                Element::Oars(oars) => Some(oars),
                _ => None,
            })
            .collect()
    }

    pub fn rudder(&self) -> Option<&Rudder> {
        self.elements.iter().find_map(|m| match &m.element {
            Element::Rudder(rudder) => Some(rudder),
            _ => None,
        })
    }

    pub fn rudder_mut(&mut self) -> Option<&mut Rudder> {
        self.elements.iter_mut().find_map(|m| match &mut m.element {
            Element::Rudder(rudder) => Some(rudder),
            _ => None,
        })
    }

    /// True when the ship has a gangway and it is lowered.
    pub fn gangway_lowered(&self) -> bool {
        self.elements.iter().any(|m| match m.element {
            Element::Gangway { lowered } => lowered,
            _ => false,
        })
    }

    pub fn allure(&self, wind: Vec3) -> Allure {
        Allure::of(self.kinematics.heading_degrees(), wind)
    }

    /// Turns by `degrees`; positive is starboard.
    pub fn veer(&mut self, degrees: f64) {
        self.kinematics.turn(-degrees);
    }

    /// Moves the ship by `dt` seconds of simulated time.
    ///
    /// Sails, oars and the rudder act first. The move is then swept against
    /// the expanse: on a hit the ship stops at the last safe sample.
    pub fn advance(&mut self, dt: f64, expanse: Option<&Expanse>) -> AdvanceOutcome {
        let mut outcome = AdvanceOutcome::default();
        if self.immobilized {
            self.in_collision = false;
            return outcome;
        }

        let wind = expanse
            .map(|e| e.wind_at(self.position()))
            .unwrap_or(Vec3::ZERO);
        let heading = self.kinematics.heading;
        let force = propulsion(&self.sails(), heading, wind) + rowing(&self.oars(), heading);

        let knots_before = self.kinematics.speed_knots();
        let origin = self.position();
        self.kinematics.advance(force, dt);
        let knots_after = self.kinematics.speed_knots();

        if let Some(expanse) = expanse {
            let samples = sample_positions(origin, self.position());
            let result = sweep(&samples, |root| self.footprint(root), &expanse.points());
            if let Sweep::Blocked { safe, .. } = result {
                self.kinematics.position = safe;
                self.kinematics.stop();
                self.in_collision = true;
                outcome.collided = true;
                outcome.impact = Impact::from_knots(knots_after);
                if let Some(impact) = outcome.impact {
                    outcome.messages.push(impact.message().to_string());
                }
                return outcome;
            }
        }

        if let Some(turn) = self.rudder().map(|r| r.orientation) {
            if turn != 0 && self.kinematics.speed() > 0.0 {
                self.veer(turn as f64 * dt);
            }
        }

        if let Some(message) = acceleration_message(knots_before, knots_after) {
            outcome.messages.push(message.to_string());
        }
        self.in_collision = false;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        a.distance(&b) < 1e-9
    }

    #[test]
    fn test_rooms_follow_heading() {
        // bow room one unit forward of the root
        let mut vessel = Vessel::new(Vec3::new(10.0, 10.0, 0.0), vec![Coords::new(0, 1, 0)]);
        let east = vessel.room_positions()[0].1;
        assert!(close(east, Vec3::new(11.0, 10.0, 0.0)));

        vessel.kinematics.heading = Vec3::new(0.0, 1.0, 0.0);
        let north = vessel.room_positions()[0].1;
        assert!(close(north, Vec3::new(10.0, 11.0, 0.0)));
    }

    #[test]
    fn test_immobilized_does_not_move() {
        let mut vessel = Vessel::new(Vec3::ZERO, vec![Coords::default()]);
        vessel.immobilized = true;
        vessel.kinematics.velocity = Vec3::new(1.0, 0.0, 0.0);
        let outcome = vessel.advance(1.0, None);
        assert_eq!(vessel.position(), Vec3::ZERO);
        assert!(!outcome.collided);
    }

    #[test]
    fn test_rudder_turns_moving_ship() {
        let mut vessel = Vessel::new(Vec3::ZERO, vec![Coords::default()]);
        vessel.elements.push(Mounted {
            room: Coords::default(),
            element: Element::Rudder(Rudder {
                orientation: 5,
                held_by: None,
            }),
        });
        vessel.kinematics.velocity = Vec3::new(1.0, 0.0, 0.0);
        vessel.advance(1.0, None);
        // starboard from east is clockwise
        assert!((vessel.kinematics.heading_degrees() - 355.0).abs() < 1e-9);
    }

    #[test]
    fn test_leaving_rest_is_felt() {
        let mut vessel = Vessel::new(Vec3::ZERO, vec![Coords::default()]);
        vessel.elements.push(Mounted {
            room: Coords::default(),
            element: Element::Oars(Oars { speed: 3 }),
        });
        let outcome = vessel.advance(1.0, None);
        assert_eq!(outcome.messages.len(), 1);
        assert!(vessel.kinematics.speed() > 0.0);
    }
}
