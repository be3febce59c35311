//! Concrete adapter implementations for ports.

pub mod broadcast_adapter;
pub mod csv_adapter;
pub mod file_config_adapter;
pub mod jsonl_event_adapter;
pub mod sqlite_adapter;
