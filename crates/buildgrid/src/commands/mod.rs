//! Commands module for the buildgrid CLI
//!
//! Provides command implementations for simulation and configuration.

pub mod config;
pub mod simulate;
