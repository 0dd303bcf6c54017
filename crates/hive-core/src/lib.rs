//! # hive-core
//!
//! Core types, traits, configuration, and error handling for Hive.

pub mod config;
pub mod error;
pub mod message;
pub mod traits;

pub use config::shellexpand;
