//! fxconvert library
//!
//! Currency conversion with live exchange rates and a cached fallback. The
//! binary adds the terminal UI on top of these modules; they are exposed here
//! for use in integration tests.

pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod data;
pub mod engine;
