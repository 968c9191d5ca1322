//! Shift roster generation.
//!
//! Builds multi-week rosters under rest cadence, shift continuity,
//! transition and staffing rules. Each run walks a fixed four-step
//! relaxation ladder; every attempt is sent to an optimization backend as
//! LP text and falls back to a deterministic heuristic when the backend is
//! unavailable or fails. Every resulting draft is checked by an independent
//! validator, and the best draft is selected by violation counts.

pub mod api;
pub mod config;
pub mod demo_data;
pub mod domain;
pub mod dto;
pub mod engine;
pub mod error;
pub mod heuristic;
pub mod model;
pub mod relaxation;
pub mod report;
pub mod solver;
pub mod validation;

pub use error::{ConfigError, Result, RosterError};
