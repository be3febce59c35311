//! papertrader — paper-trading signal engine for 5-minute crypto bars.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`]. [`runtime`] drives the domain
//! from a single FIFO queue and [`cli`] wires everything together.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
pub mod runtime;
