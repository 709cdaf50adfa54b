//! Core pipeline for the regression gate: load cases, resolve config, run
//! cases against an injected agent invoker, persist records, aggregate,
//! diff against a baseline, and evaluate a pass/fail verdict.

pub mod case_loader;
pub mod config;
pub mod engine;
pub mod errors;
pub mod invoker;
pub mod model;
pub mod report;
pub mod store;
