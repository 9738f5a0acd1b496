//! API Module
//!
//! REST surface over the backup and restore orchestrators.

pub mod rest;
pub mod server;

pub use rest::*;
pub use server::*;
