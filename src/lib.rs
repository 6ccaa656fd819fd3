//! Karakuri core library.
//!
//! This library provides the command line interface definitions and the
//! engine for executing `Makefile`-style control files: parsing, variable
//! resolution, execution planning, and recipe execution.

pub mod ast;
pub mod cli;
pub mod graph;
pub mod makefile;
pub mod plan;
pub mod runner;
pub mod vars;
