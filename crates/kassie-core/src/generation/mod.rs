//! Generation - procedural creation of the demo world

mod harbour;
mod names;

pub use harbour::*;
pub use names::*;
