//! # Simulation Core
//!
//! The engine of the workshop simulation. It owns the authoritative session state,
//! applies the effects of decisions and events, presents scenario events one at a
//! time, and moves the session through its phases.
//!
//! ## Core Components
//!
//! - **store**: The single state tree, path-addressed, with optional persistence
//! - **events**: Typed events and the synchronous bus every component talks over
//! - **rules**: Effect application, phase completion criteria and outcome scoring
//! - **event_queue**: The single-active-event queue, delayed activation and curveballs
//! - **phase**: Phase sequencing with exit gating and history
//! - **simulation**: The assembled engine and its builder
//!
//! ## Design Philosophy
//!
//! - **Single Source of Truth**: Components read and write state only through the store
//! - **Event-Driven**: Components announce facts on the bus instead of calling each other
//! - **Deterministic**: Time and randomness are injected, so sessions replay exactly under test

pub mod config;
pub mod error;
pub mod event_queue;
pub mod events;
pub mod logging;
pub mod phase;
pub mod rules;
pub mod simulation;
pub mod store;

pub use config::*;
pub use error::*;
pub use event_queue::*;
pub use events::*;
pub use logging::*;
pub use phase::*;
pub use rules::*;
pub use simulation::*;
pub use store::*;
