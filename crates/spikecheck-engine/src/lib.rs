#![doc = include_str!("../README.md")]

//! spikecheck verification engine.
//!
//! This crate validates the run configuration, draws and rate-codes the
//! samples, and sweeps every perturbation bound over them either
//! sequentially or on a fixed-size worker pool.

pub mod config;
pub mod pipeline;
pub mod result;
