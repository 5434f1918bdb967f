//! Systems - logic that operates on the world

mod navigation;

pub use navigation::*;
