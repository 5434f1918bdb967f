//! Navigation constants: allure thresholds, sail angles, speed tiers.
//!
//! Angles are in degrees; distances in room units.

/// Upper bounds of the angle between heading and wind for each allure.
///
/// The allure angle is `(heading - wind) mod 360`; an allure applies when
/// the angle lies strictly between its threshold and `360 - threshold`.
pub mod allure {
    pub const HEADWIND: f64 = 160.0;
    pub const CLOSE_HAULED: f64 = 130.0;
    pub const CLOSE_REACH: f64 = 110.0;
    pub const BEAM_REACH: f64 = 80.0;
    pub const BROAD_REACH: f64 = 20.0;
}

/// Best sail orientation for each allure.
pub mod sail_angle {
    pub const HEADWIND: f64 = 0.0;
    pub const CLOSE_HAULED: f64 = 5.0;
    pub const CLOSE_REACH: f64 = 20.0;
    pub const BEAM_REACH: f64 = 40.0;
    pub const BROAD_REACH: f64 = 70.0;
    pub const RUNNING: f64 = 90.0;
}

/// Orientation gap, in degrees, at which a sail stops pulling.
pub const SAIL_TOLERANCE: f64 = 20.0;
/// Share of the mean sail factor turned into propulsion.
pub const SAIL_EFFICIENCY: f64 = 0.7;

/// Rudder orientation range (negative is port).
pub const RUDDER_MAX: i8 = 5;

/// Oar settings and the force each one gives.
pub mod oars {
    pub const MAX_SPEED: i8 = 3;
    pub const FORCE_PER_STEP: f64 = 0.4;
}

/// Wind influence by distance: full within the wind length, reduced
/// within its square, residual beyond.
pub mod wind {
    pub const NEAR: f64 = 1.0;
    pub const MEDIUM: f64 = 0.6;
    pub const FAR: f64 = 0.3;
}

/// Obstacle proximity, in units, that counts as a hit.
pub const COLLISION_DISTANCE: f64 = 1.0;

/// Conversion from units per second to knots.
pub const KNOTS_PER_UNIT: f64 = 0.25;

/// Impact tiers in knots; below `LIGHT` a contact goes unnoticed.
pub mod impact {
    pub const LIGHT: f64 = 0.1;
    pub const VIOLENT: f64 = 0.6;
    pub const CRASH: f64 = 1.5;
}

/// Speed, in knots, above which a ship leaving rest is said to accelerate,
/// and above which the acceleration is rapid.
pub mod acceleration {
    pub const NOTICEABLE: f64 = 0.05;
    pub const RAPID: f64 = 0.5;
}

/// Default kinematic parameters of a ship.
pub mod ship {
    pub const MASS: f64 = 1.0;
    pub const DRAG: f64 = 0.5;
}

/// Delay, in seconds, of hoisting or folding a sail.
pub const SAIL_HANDLING_DELAY: f64 = 7.0;
