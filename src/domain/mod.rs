//! Core domain types and logic.

pub mod config;
pub mod error;
pub mod events;
pub mod features;
pub mod liquidation;
pub mod market;
pub mod orchestrator;
pub mod rank;
pub mod signal;
pub mod signal_eval;
pub mod slope;
pub mod trade;
pub mod trade_manager;
