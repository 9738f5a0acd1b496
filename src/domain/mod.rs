//! Domain layer - Value types and port definitions
//!
//! This module defines the specs, outcomes and core traits (ports) that the
//! orchestrators and cluster adapters share.

pub mod model;
pub mod ports;

pub use model::*;
pub use ports::*;
