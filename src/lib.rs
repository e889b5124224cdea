//! securecode library crate
//!
//! Exposes the chunking, budgeting and orchestration modules so benchmarks and
//! external tooling can drive them without going through the CLI.

pub mod budget;
pub mod config;
pub mod input;
pub mod llm;
pub mod report;
pub mod rules;
pub mod scanner;
pub mod session;
pub mod util;
