//! # filswap Core
//!
//! Core types shared by the filswap crates.
//! Provides the error types and the machine state tracked while scanning a
//! sliced document.

pub mod data;
pub mod error;

pub use data::{MachineState, Position};
pub use error::{Error, GcodeError, Result};
