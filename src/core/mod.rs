//! Core types: errors, configuration, dynamic values, contracts.

pub mod config;
pub mod contract;
pub mod errors;
pub mod value;
