//! Evidence-based ancestry research engine (see `SPEC_FULL.md` at the
//! workspace root for the full requirements document).
//!
//! The engine turns a subject's identifying data into a calibrated,
//! evidence-backed ascendancy tree by correlating civil-record indices and
//! genealogy-tree APIs. This crate owns the core pipeline (C1–C11); HTTP
//! adapters live in `ancestry-sources`, and a runnable demo lives in
//! `apps/ancestry-cli`.

pub mod config;
pub mod confidence;
pub mod couple;
pub mod crosscheck;
pub mod error;
pub mod household;
pub mod hypothesis;
pub mod model;
pub mod normalize;
pub mod notes;
pub mod orchestrator;
pub mod repository;
pub mod sources;

pub use error::{EngineError, EngineResult};
