//! Pipeline components.
//!
//! Each module owns one stage of the acquisition path; `session` wires
//! them together.

pub mod connection;
pub mod decoder;
pub mod features;
pub mod frame;
pub mod gate;
pub mod latest;
pub mod mock;
pub mod session;
pub mod stats;
