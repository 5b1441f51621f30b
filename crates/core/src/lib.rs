//! Core types and utilities for the FTSO price service
//!
//! This crate provides shared types used across all components:
//! - Asset, quote and history types
//! - Quote source and feed health classification
//! - Error taxonomy for price source attempts
//! - Service configuration and loading

pub mod types;
pub mod config;
pub mod errors;

pub use types::*;
pub use config::*;
pub use errors::*;
