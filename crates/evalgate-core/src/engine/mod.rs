//! Pipeline components C4-C9: run, aggregate, resolve baseline, diff,
//! evaluate the gate, and analyze flakiness.

pub mod aggregator;
pub mod baseline;
pub mod diff;
pub mod flakiness;
pub mod gate;
pub mod runner;
