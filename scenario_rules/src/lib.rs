//! # Scenario Rules
//!
//! The "Scenario Bible" crate - identifiers, scenario definitions, effect bundles and
//! the typed shape of simulation state. Everything here is data plus pure helpers;
//! the engine that mutates state lives in `simulation_core`.

pub mod effects;
pub mod error;
pub mod ids;
pub mod scenario;
pub mod state;

pub use effects::*;
pub use error::*;
pub use ids::*;
pub use scenario::*;
pub use state::*;
