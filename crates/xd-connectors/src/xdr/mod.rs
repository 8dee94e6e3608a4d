//! Cortex XDR incident sources.

pub mod cortex;
pub mod mock;

pub use cortex::{CortexXdrConfig, CortexXdrConnector};
pub use mock::{MockBehavior, MockIncidentSource};
