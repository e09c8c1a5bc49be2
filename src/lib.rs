//! Iterative refinement controller for metagenomic genome bins.
//!
//! Drives an external refinement tool and an external quality-assessment
//! tool in a loop: bins that pass the contamination threshold accumulate in
//! a final collection, the rest are staged and re-refined until nothing
//! contaminated remains, assessment finds no bins, or the iteration budget
//! is exhausted.

pub mod checkm;
pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
mod exec;
pub mod finalize;
pub mod refine;
pub mod report;
pub mod workspace;
