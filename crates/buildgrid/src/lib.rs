//! Buildgrid - operator CLI for the local build-job coordination backend
//!
//! Runs build-job simulations against the in-process data provider and
//! inspects the resolved configuration.

pub mod cli;
pub mod commands;
