#![doc = include_str!("../README.md")]

//! Spiking network model and the concrete collaborators of the verifier.
//!
//! This crate defines the feed-forward leaky integrate-and-fire network
//! description, its concrete forward simulation, spike trains with rate
//! coding, and the dataset provider the sample orchestrator draws from.

pub mod dataset;
pub mod network;
#[cfg(any(test, feature = "proptest"))]
pub mod proptest_generators;
pub mod spike_train;
