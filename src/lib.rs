//! Interactive explorer for causal attribution between the steps of a
//! reasoning trace.
//!
//! The crate is split into a pure core (`trace`, `graph`, `session`) that
//! owns data loading, score normalization, graph construction and the
//! interaction state machine, and an `eframe` front end (`app`) that only
//! projects that state onto the circular view, the attribution tree and the
//! chain-of-thought list.

pub mod app;
pub mod config;
pub mod graph;
pub mod session;
pub mod trace;
pub mod util;
