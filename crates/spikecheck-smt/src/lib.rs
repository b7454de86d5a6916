#![doc = include_str!("../README.md")]

//! SMT encoding of spiking neural network dynamics and δ-robustness
//! queries, with pluggable Z3 and cvc5 backends.

pub mod backends;
pub mod encoder;
pub mod robustness;
pub mod solver;
pub mod sorts;
pub mod terms;
