//! Per-census-tract feature table builder for site selection.
//!
//! The binary is a thin wrapper around this library so the pipeline stays
//! testable without spawning processes.

pub mod config;
pub mod error;
pub mod export;
pub mod features;
pub mod normalize;
pub mod places;
pub mod tracts;
pub mod types;
